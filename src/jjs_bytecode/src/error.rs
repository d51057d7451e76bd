use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EmitError {
    #[error("literal limit reached")]
    LiteralLimitReached,
    #[error("argument limit reached")]
    ArgumentLimitReached,
    #[error("stack limit reached")]
    StackLimitReached,
    #[error("branch offset exceeds the maximum encodable delta")]
    BranchOffsetTooLarge,
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid block target")]
    InvalidBlockTarget,
}

pub type EmitResult<T> = Result<T, EmitError>;
