//! Snapshot failure taxonomy (spec §4.7/§7). These surface as exception
//! `value`s at the host boundary; here they're a plain `thiserror` enum
//! the root `jjs` crate wraps into `Value::Exception` at its edge.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("output buffer too small: needed at least {needed} bytes")]
    BufferTooSmall { needed: usize },
    #[error("snapshot would exceed the maximum supported size")]
    MaxSnapshotSizeExceeded,
    #[error("compiled-code cannot be snapshotted: {reason}")]
    UnsupportedCompiledCode { reason: &'static str },
    #[error("tagged-template literals cannot be snapshotted")]
    TaggedTemplateLiterals,
    #[error("regexp literals are not supported in a static snapshot")]
    RegexpNotSupportedInStatic,
    #[error("not a valid snapshot image")]
    InvalidSnapshotFormat,
    #[error("unsupported snapshot version or feature bits")]
    InvalidVersionOrFeatures,
    #[error("function index {index} out of range (snapshot has {available} functions)")]
    FunctionIndexOutOfRange { index: u32, available: u32 },
    #[error("a static snapshot's function records cannot be copied into the heap")]
    StaticSnapshotsCannotBeCopied,
    #[error("loading a static snapshot's function requires the ALLOW_STATIC exec flag")]
    StaticSnapshotRequiresAllowStatic,
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
