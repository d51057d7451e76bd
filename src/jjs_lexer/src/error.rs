use thiserror::Error;

use crate::span::Position;

/// The lexer's failure taxonomy (spec §4.3), one variant per named error
/// kind. `at` is always the position where scanning noticed the problem,
/// not necessarily the start of the offending token.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind} at {at}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub at: Position,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("newline not allowed in string literal")]
    NewlineNotAllowed,
    #[error("invalid unicode escape sequence")]
    InvalidUnicodeEscapeSequence,
    #[error("invalid binary digit")]
    InvalidBinDigit,
    #[error("invalid hex digit")]
    InvalidHexDigit,
    #[error("invalid octal digit")]
    InvalidOctalDigit,
    #[error("invalid bigint literal")]
    InvalidBigint,
    #[error("missing exponent digits")]
    MissingExponent,
    #[error("identifier too long")]
    IdentifierTooLong,
    #[error("string too long")]
    StringTooLong,
    #[error("number too long")]
    NumberTooLong,
    #[error("invalid character")]
    InvalidCharacter,
    #[error("escape sequence not allowed in keyword")]
    InvalidKeyword,
    #[error("octal escape not allowed in template literal")]
    TemplateOctalEscape,
    #[error("duplicated regexp flag")]
    DuplicatedRegexpFlag,
}

pub type LexResult<T> = Result<T, LexError>;
