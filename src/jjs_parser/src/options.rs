//! Entry-point configuration (spec §4.5/§6).

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Name shown in diagnostics, e.g. a file path or `"<eval>"`.
    pub source_name: String,
    pub strict: bool,
    pub is_module: bool,
    /// Mirrors `StatusFlags::USES_LINE_INFO`: whether `parser_post_processing`
    /// should populate `CompiledCodeTail::line_info`.
    pub line_info: bool,
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions { source_name: String::from("<anonymous>"), strict: false, is_module: false, line_info: false }
    }
}

impl ParseOptions {
    pub fn module(source_name: impl Into<String>) -> ParseOptions {
        ParseOptions { source_name: source_name.into(), strict: true, is_module: true, line_info: false }
    }
}
