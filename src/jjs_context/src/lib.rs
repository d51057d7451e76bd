//! Context & arena (spec §4.1): the engine-wide root holding the heap, the
//! cell allocator, the scratch arena, and the tagged `Value` type every
//! other crate in the workspace builds on.

pub mod context;
pub mod error;
pub mod heap;
pub mod scratch;
pub mod value;

pub use context::{Context, ContextFlags, EngineOptions};
pub use error::ContextError;
pub use heap::{CellAllocator, Heap, HeapObject, CELL_SIZE};
pub use scratch::{ScratchArena, ScratchGuard};
pub use value::{CompressedPtr, ShortString, Value, DIRECT_STRING_MAX_LEN};
