use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use jjs_parser::{parse, ParseOptions};

use crate::errors::{emit_json_error, print_pretty_error};

#[derive(clap::Args)]
#[clap(author, version, about, long_about = None)]
pub struct ParseArgs {
    /// The input script to parse
    #[arg(short, long, required = true, value_name = "INPUT")]
    pub input: PathBuf,

    /// Parse in strict mode
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Parse as a module rather than a script
    #[arg(long, default_value_t = false)]
    pub module: bool,

    /// Emit errors as JSON to stdout and exit with non-zero status (disables pretty errors)
    #[arg(long, default_value_t = false)]
    pub errors_json: bool,

    /// Disable ANSI colors in error output (pretty mode only)
    #[arg(long, default_value_t = false)]
    pub no_color: bool,
}

/// Parses `args.input` and prints a JSON summary of the resulting
/// compiled-code tree; on failure, pretty-prints (or JSON-emits) the
/// `ParserError` and exits non-zero, mirroring `bsharp_cli`'s `parse`
/// command.
pub fn execute(args: ParseArgs) -> Result<()> {
    let source =
        fs::read_to_string(&args.input).with_context(|| format!("failed to read file: {}", args.input.display()))?;
    let source_name = args.input.display().to_string();

    let options = if args.module {
        ParseOptions::module(source_name.clone())
    } else {
        ParseOptions { source_name: source_name.clone(), strict: args.strict, is_module: false, line_info: false }
    };

    match parse(&source, options) {
        Ok(parsed) => {
            let entry = &parsed.script.functions[parsed.script.entry.0 as usize];
            let summary = serde_json::json!({
                "source": source_name,
                "function_count": parsed.script.functions.len(),
                "entry_kind": format!("{:?}", entry.kind),
                "entry_bytecode_len": entry.bytecode.len(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(err) => {
            if args.errors_json {
                emit_json_error(&source_name, &source, &err);
            } else {
                print_pretty_error(&source_name, &source, &err, args.no_color);
            }
            std::process::exit(1);
        }
    }
}
