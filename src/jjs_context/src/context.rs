//! The engine context: the process-local root that owns the heap, the
//! cell allocator, the scratch arena, and the current exception (spec
//! §4.1). Larger sub-contexts (literal storage, the module loader state,
//! the debugger) are composed on top of this by the root `jjs` crate --
//! see SPEC_FULL.md §9 "Global state" and DESIGN.md's crate map.

use crate::error::ContextError;
use crate::heap::{CellAllocator, Heap};
use crate::scratch::ScratchArena;
use crate::value::Value;

/// Per-request flags threaded through the context (spec §4.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFlags {
    pub show_opcodes: bool,
    pub mem_stats: bool,
    pub strict_memory_layout: bool,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Initial heap reservation, in object slots. `None` leaves the heap
    /// unbounded, which is what the CLI harness and tests use.
    pub heap_slot_limit: Option<usize>,
    pub scratch_capacity: usize,
    pub flags: ContextFlags,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions { heap_slot_limit: None, scratch_capacity: 4096, flags: ContextFlags::default() }
    }
}

/// The pre-allocated out-of-memory exception, shared across the context so
/// that reporting OOM never itself needs to allocate (spec §4.1 "if that
/// cannot itself be allocated, a shared pre-allocated singleton is
/// thrown").
fn out_of_memory_singleton() -> Value {
    Value::Exception(Box::new(Value::SmallInt(i32::MIN)))
}

pub struct Context {
    pub heap: Heap,
    pub cells: CellAllocator,
    pub scratch: ScratchArena,
    pub flags: ContextFlags,
    exception: Option<Value>,
    oom_singleton: Value,
}

impl Context {
    pub fn new(options: EngineOptions) -> Result<Context, ContextError> {
        if let Some(limit) = options.heap_slot_limit {
            if limit == 0 {
                return Err(ContextError::OutOfMemory { requested: 0 });
            }
        }
        log::debug!("creating engine context with options {options:?}");
        Ok(Context {
            heap: Heap::new(options.heap_slot_limit),
            cells: CellAllocator::new(),
            scratch: ScratchArena::new(options.scratch_capacity),
            flags: options.flags,
            exception: None,
            oom_singleton: out_of_memory_singleton(),
        })
    }

    /// Sets the current exception. Overwrites any previously pending one,
    /// mirroring the single-slot `JERRY_CONTEXT (error_value)` field.
    pub fn set_exception(&mut self, value: Value) {
        self.exception = Some(value.into_exception());
    }

    pub fn take_pending_exception(&mut self) -> Option<Value> {
        self.exception.take()
    }

    pub fn has_pending_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// Raises the shared out-of-memory exception without allocating.
    pub fn raise_out_of_memory(&mut self) -> Value {
        self.exception = Some(self.oom_singleton.clone());
        self.oom_singleton.clone()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("heap_live", &self.heap.live_count())
            .field("cells", &self.cells.len())
            .field("has_pending_exception", &self.has_pending_exception())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_pending_exception() {
        let ctx = Context::new(EngineOptions::default()).unwrap();
        assert!(!ctx.has_pending_exception());
    }

    #[test]
    fn zero_heap_reservation_fails() {
        let options = EngineOptions { heap_slot_limit: Some(0), ..Default::default() };
        assert_eq!(
            Context::new(options).unwrap_err(),
            ContextError::OutOfMemory { requested: 0 }
        );
    }

    #[test]
    fn out_of_memory_is_observable_via_is_exception_only() {
        let mut ctx = Context::new(EngineOptions::default()).unwrap();
        let v = ctx.raise_out_of_memory();
        assert!(v.is_exception());
        assert!(ctx.has_pending_exception());
    }
}
