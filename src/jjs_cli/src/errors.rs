//! Pretty/JSON error output for parse failures, grounded on
//! `bsharp_cli::errors`'s dual `emit_json_error`/`print_pretty_error`
//! pair -- here rendering a [`jjs_parser::error::ParserError`] through
//! `miette` instead of walking an `nom_supreme::error::ErrorTree`.

use jjs_parser::error::ParserError;
use miette::{GraphicalReportHandler, GraphicalTheme, NamedSource};

pub fn emit_json_error(source_name: &str, source: &str, err: &ParserError) {
    let (line, column) = line_and_column(source, err.span.offset());
    let line_text = source.lines().nth(line.saturating_sub(1)).unwrap_or("").to_string();

    let payload = serde_json::json!({
        "error": {
            "kind": "parse_error",
            "file": source_name,
            "line": line,
            "column": column,
            "line_text": line_text,
            "message": err.kind.to_string(),
        }
    });
    println!(
        "{}",
        serde_json::to_string(&payload).unwrap_or_else(|_| "{\"error\":{\"message\":\"parse error\"}}".to_string())
    );
}

pub fn print_pretty_error(source_name: &str, source: &str, err: &ParserError, no_color: bool) {
    let handler = if no_color {
        GraphicalReportHandler::new_themed(GraphicalTheme::none())
    } else {
        GraphicalReportHandler::new()
    };
    let report = miette::Report::new(err.clone()).with_source_code(NamedSource::new(source_name, source.to_string()));
    let mut rendered = String::new();
    let _ = handler.render_report(&mut rendered, report.as_ref());
    eprintln!("{rendered}");
}

fn line_and_column(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1usize;
    let mut column = 1usize;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
