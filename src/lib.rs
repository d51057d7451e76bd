//! Host-facing API (spec §6). [`Engine`] owns the [`jjs_context::Context`]
//! plus the arena of parsed scripts; its methods are the host API spec.md
//! names directly (`parse`, `run`, `generate_snapshot`, `exec_snapshot`,
//! `merge_snapshots`, `get_literals_from_snapshot`,
//! `snapshot_get_string_literals`). Grounded on
//! `bsharp::compiler::Compiler`, generalised from a one-shot
//! `compile_file` into a host object that keeps parsed scripts
//! addressable through a `Value::CompiledCode` handle instead of
//! returning them directly.

mod engine;

pub use engine::Engine;
pub use jjs_bytecode::{CompiledCodeRecord, FuncIndex, FunctionKind, ScriptRecord};
pub use jjs_context::{CompressedPtr, Context, ContextError, ContextFlags, EngineOptions, Value};
pub use jjs_literal::LiteralStorage;
pub use jjs_parser::{options::ParseOptions, ParsedScript};
pub use jjs_snapshot::{ExecFlags, GlobalFlags, SaveFlags, SnapshotError};
