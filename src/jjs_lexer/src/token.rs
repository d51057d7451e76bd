use bitflags::bitflags;

use crate::keyword::Keyword;
use crate::span::ByteRange;
use jjs_literal::PoolIndex;

bitflags! {
    /// Per-token status flags (spec §4.3's "attached literal-location
    /// records ... with status flags").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TokenFlags: u8 {
        /// Token was preceded by a line terminator (drives ASI).
        const PRECEDED_BY_NEWLINE = 1 << 0;
        /// Identifier/string contained an escape sequence.
        const HAD_ESCAPE          = 1 << 1;
        /// Numeric literal carries the BigInt `n` suffix.
        const IS_BIGINT           = 1 << 2;
        /// String/template literal, as opposed to a bare identifier.
        const IS_STRING_LITERAL   = 1 << 3;
        /// Template literal has cooked value `undefined` (a `\0`-free
        /// invalid escape occurred but the raw text is still needed).
        const TEMPLATE_COOKED_NONE = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    Hex,
    Octal,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    PrivateIdentifier,
    Keyword(Keyword),
    NumericLiteral { radix: Radix, literal: PoolIndex },
    StringLiteral { literal: PoolIndex },
    TemplateSpan { literal: PoolIndex, tail: bool },
    RegexpLiteral { pattern: PoolIndex, flags: PoolIndex },
    Punctuator(Punctuator),
    Eof,
}

/// Punctuators recognised outside the literal/identifier/number paths.
/// Maximal-munch: the lexer always tries the longest match first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuator {
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDotDot,
    Semicolon,
    Comma,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Plus,
    Minus,
    Star,
    Percent,
    StarStar,
    PlusPlus,
    MinusMinus,
    Shl,
    Shr,
    Sar,
    Amp,
    Pipe,
    Caret,
    Bang,
    Tilde,
    AmpAmp,
    PipePipe,
    QuestionQuestion,
    Question,
    QuestionDot,
    Colon,
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    PercentEq,
    StarStarEq,
    ShlEq,
    ShrEq,
    SarEq,
    AmpEq,
    PipeEq,
    CaretEq,
    AmpAmpEq,
    PipePipeEq,
    QuestionQuestionEq,
    Arrow,
    Slash,
    SlashEq,
    At,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: ByteRange,
    pub flags: TokenFlags,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
