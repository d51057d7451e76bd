//! Lexer (spec §4.3): UTF-8 source bytes to a token stream, with
//! two-tier keyword recognition, escape decoding, and regexp-literal
//! scanning.

pub mod error;
pub mod keyword;
pub mod lexer;
pub mod numbers;
pub mod span;
pub mod strings;
pub mod token;

pub use error::{LexError, LexErrorKind, LexResult};
pub use keyword::Keyword;
pub use lexer::{Lexer, LexerContext};
pub use span::{ByteRange, LineTracker, Position};
pub use token::{Punctuator, Radix, Token, TokenFlags, TokenKind};
