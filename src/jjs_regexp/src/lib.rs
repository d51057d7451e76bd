//! Regexp pattern compiler (spec §4.6): a purpose-built grammar and a
//! byte-code form separate from the main [`jjs_bytecode`] opcode
//! space. Disabled at compile time unless the `builtin-regexp`
//! workspace feature pulls this crate in.

pub mod ast;
pub mod emitter;
pub mod error;
pub mod flags;
pub mod opcode;
pub mod parser;

pub use ast::RegexAst;
pub use emitter::{emit, CompiledRegexp};
pub use error::{RegexpError, RegexpResult};
pub use flags::RegexpFlags;

/// Compiles a pattern source and a flag string (e.g. `/ab+/gi` splits
/// into `pattern = "ab+"`, `flag_source = "gi"`) into byte-code.
pub fn compile_pattern(pattern: &str, flag_source: &str) -> RegexpResult<CompiledRegexp> {
    let flags = RegexpFlags::parse(flag_source)?;
    let ast = parser::parse_pattern(pattern)?;
    Ok(emit(&ast, flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_pattern_compile_together() {
        let compiled = compile_pattern("ab|cd", "gi").unwrap();
        assert!(compiled.flags.contains(RegexpFlags::GLOBAL));
        assert!(compiled.flags.contains(RegexpFlags::IGNORE_CASE));
    }

    #[test]
    fn slash_inside_character_class_is_literal() {
        assert!(compile_pattern("[/]", "").is_ok());
    }

    #[test]
    fn duplicate_flags_are_rejected() {
        assert!(compile_pattern("a", "gg").is_err());
    }
}
