//! Parser failure taxonomy (spec §4.5/§7). Unlike the lexer's position-
//! tagged [`jjs_lexer::LexError`], these carry a byte offset + length so
//! `miette` can underline the offending span directly in the source.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("{kind}")]
pub struct ParserError {
    pub kind: ParserErrorKind,
    #[label("here")]
    pub span: SourceSpan,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParserErrorKind {
    #[error("unexpected token")]
    UnexpectedToken,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("duplicated parameter name")]
    DuplicatedParameterName,
    #[error("duplicated lexical declaration")]
    DuplicatedLexicalDeclaration,
    #[error("duplicated import identifier")]
    DuplicatedImportIdentifier,
    #[error("duplicated export identifier")]
    DuplicatedExportIdentifier,
    #[error("reserved word used as identifier in strict mode")]
    ReservedWordAsIdentifier,
    #[error("'{0}' is not allowed as an identifier in strict mode")]
    StrictIdentNotAllowed(String),
    #[error("undeclared private field")]
    UndeclaredPrivateField,
    #[error("import.meta used outside a module")]
    ImportMetaOutsideModule,
    #[error("illegal break statement")]
    IllegalBreak,
    #[error("illegal continue statement")]
    IllegalContinue,
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),
    #[error("invalid regular expression: {0}")]
    Regexp(String),
    #[error("{feature} is not supported by this build")]
    NotSupported { feature: &'static str },
    #[error("{0}")]
    Lex(String),
    #[error("{0}")]
    Emit(String),
    #[error("scanner pre-pass and emission pass disagree about the next declaration")]
    ScannerMismatch,
}

pub type ParserResult<T> = Result<T, ParserError>;

impl From<jjs_lexer::LexError> for ParserErrorKind {
    fn from(e: jjs_lexer::LexError) -> Self {
        ParserErrorKind::Lex(e.to_string())
    }
}

impl From<jjs_bytecode::EmitError> for ParserErrorKind {
    fn from(e: jjs_bytecode::EmitError) -> Self {
        ParserErrorKind::Emit(e.to_string())
    }
}

/// Blanket conversions so `?` works directly on lexer/emitter results
/// inside functions that don't have a more specific span to attach --
/// callers with better position information build a `ParserError`
/// explicitly instead (see `Parser::error_here`).
impl From<jjs_lexer::LexError> for ParserError {
    fn from(e: jjs_lexer::LexError) -> Self {
        ParserError { kind: ParserErrorKind::from(e), span: (0usize, 0).into() }
    }
}

impl From<jjs_bytecode::EmitError> for ParserError {
    fn from(e: jjs_bytecode::EmitError) -> Self {
        ParserError { kind: ParserErrorKind::from(e), span: (0usize, 0).into() }
    }
}

#[cfg(feature = "builtin-regexp")]
impl From<jjs_regexp::RegexpError> for ParserErrorKind {
    fn from(e: jjs_regexp::RegexpError) -> Self {
        ParserErrorKind::Regexp(e.to_string())
    }
}
