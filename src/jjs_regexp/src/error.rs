use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegexpError {
    #[error("duplicated regexp flag")]
    DuplicatedFlag,
    #[error("unknown regexp flag '{0}'")]
    UnknownFlag(char),
    #[error("unterminated character class")]
    UnterminatedClass,
    #[error("nothing to repeat")]
    NothingToRepeat,
    #[error("unmatched parenthesis")]
    UnmatchedParen,
    #[error("invalid group name")]
    InvalidGroupName,
    #[error("invalid quantifier")]
    InvalidQuantifier,
    #[error("pattern did not fully parse (trailing input at byte {0})")]
    TrailingInput(usize),
    #[error("malformed pattern")]
    Malformed,
}

pub type RegexpResult<T> = Result<T, RegexpError>;
