use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("duplicate insertion of an already-interned string")]
    DuplicateStringInsertion,
    #[error("late-init literal slot resolved after its source buffer was discarded")]
    SourceBufferGone,
}

pub type LiteralResult<T> = Result<T, LiteralError>;
