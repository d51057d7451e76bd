use thiserror::Error;

/// Failures the Context & arena component itself can raise. Most engine
/// errors (parse errors, snapshot errors) live in their own crates; this
/// enum only covers context construction and heap exhaustion (spec §4.1
/// "Failure semantics").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("out of memory: initial heap reservation of {requested} bytes could not be met")]
    OutOfMemory { requested: usize },
}
