//! [`Engine`]: the host-facing facade (spec §6). Parsing hands back a
//! `Value::CompiledCode` handle rather than a raw `ScriptRecord` so the
//! rest of the API can address "the thing `parse` returned" the same way
//! a real embedder would, through the tagged `Value` union instead of a
//! borrowed Rust reference.

use jjs_context::{CompressedPtr, Context, ContextError, EngineOptions, HeapObject, Value};
use jjs_literal::LiteralStorage;
use jjs_parser::error::ParserError;
use jjs_parser::{ParseOptions, ParsedScript};
use jjs_snapshot::{ExecFlags, GlobalFlags, SaveFlags, SnapshotError};

/// Owns the engine context and every script `parse`/`exec_snapshot` has
/// produced so far. Scripts never move once pushed, so a
/// `Value::CompiledCode` handle into this arena stays valid for the
/// engine's whole lifetime (spec §3 "Ownership"), mirroring
/// `ScriptRecord.functions`' own append-only arena discipline one level
/// up.
pub struct Engine {
    context: Context,
    scripts: Vec<ParsedScript>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Result<Engine, ContextError> {
        Ok(Engine { context: Context::new(options)?, scripts: Vec::new() })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Parses `source` and returns a `value(compiled-code | exception)`
    /// (spec §6). A successful parse's `ScriptRecord`/`LiteralStorage`
    /// pair lands in `self.scripts`; the returned `Value::CompiledCode`
    /// wraps a heap-allocated forwarding pointer to its arena slot.
    pub fn parse(&mut self, source: &str, options: ParseOptions) -> Value {
        let source_name = options.source_name.clone();
        match jjs_parser::parse(source, options) {
            Ok(parsed) => self.register_script(parsed),
            Err(err) => {
                let message = format_parser_error(source, &source_name, &err);
                self.error_value("SyntaxError", message)
            }
        }
    }

    fn register_script(&mut self, parsed: ParsedScript) -> Value {
        let arena_index = self.scripts.len() as u32;
        self.scripts.push(parsed);
        match self.context.heap.allocate(HeapObject::CompiledCode(CompressedPtr::from_index(arena_index))) {
            Some(ptr) => Value::CompiledCode(ptr),
            None => self.context.raise_out_of_memory(),
        }
    }

    fn script_at(&self, value: &Value) -> Option<&ParsedScript> {
        let Value::CompiledCode(ptr) = value else { return None };
        match self.context.heap.get(*ptr)? {
            HeapObject::CompiledCode(inner) => inner.as_index().and_then(|i| self.scripts.get(i as usize)),
            _ => None,
        }
    }

    /// External-collaborator stub (SPEC_FULL.md §6 "[ADDED]"): the
    /// byte-code interpreter is out of scope (§1 "excludes the runtime
    /// interpreter"). This validates its argument the way a real `run`
    /// would before dispatching, then always returns `Value::Undefined`
    /// rather than executing anything, mirroring `bsharp_vm::vm::Vm`'s own
    /// `VmError::NotImplemented` stub kept as the grounding for this
    /// contract.
    pub fn run(&mut self, compiled_code: &Value) -> Value {
        if compiled_code.is_exception() {
            return compiled_code.clone();
        }
        if self.script_at(compiled_code).is_none() {
            return self.error_value("TypeError", "run() argument is not a compiled-code value".to_string());
        }
        Value::Undefined
    }

    #[cfg(feature = "snapshot-save")]
    pub fn generate_snapshot(&mut self, compiled_code: &Value, flags: SaveFlags) -> Result<Vec<u8>, Value> {
        let Some(parsed) = self.script_at(compiled_code) else {
            return Err(self.error_value("TypeError", "generate_snapshot() argument is not a compiled-code value".to_string()));
        };
        let bytes = jjs_snapshot::generate_snapshot(&parsed.script.functions, &parsed.storage, parsed.script.entry, flags)
            .map_err(|e| self.snapshot_error_value(&e))?;
        Ok(bytes)
    }

    #[cfg(not(feature = "snapshot-save"))]
    pub fn generate_snapshot(&mut self, _compiled_code: &Value, _flags: SaveFlags) -> Result<Vec<u8>, Value> {
        Err(self.error_value("TypeError", "generate_snapshot is not supported by this build".to_string()))
    }

    #[cfg(feature = "snapshot-exec")]
    pub fn exec_snapshot(&mut self, buffer: &[u8], func_index: u32, flags: ExecFlags, supported: GlobalFlags) -> Value {
        match jjs_snapshot::exec_snapshot(buffer, func_index, flags, supported) {
            Ok(loaded) => self.register_script(ParsedScript { script: loaded.script, storage: loaded.storage }),
            Err(err) => self.snapshot_error_value(&err),
        }
    }

    #[cfg(not(feature = "snapshot-exec"))]
    pub fn exec_snapshot(&mut self, _buffer: &[u8], _func_index: u32, _flags: ExecFlags, _supported: GlobalFlags) -> Value {
        self.error_value("TypeError", "exec_snapshot is not supported by this build".to_string())
    }

    #[cfg(feature = "snapshot-save")]
    pub fn merge_snapshots(&mut self, inputs: &[&[u8]], supported: GlobalFlags) -> Result<Vec<u8>, Value> {
        jjs_snapshot::merge_snapshots(inputs, supported).map_err(|e| self.snapshot_error_value(&e))
    }

    #[cfg(not(feature = "snapshot-save"))]
    pub fn merge_snapshots(&mut self, _inputs: &[&[u8]], _supported: GlobalFlags) -> Result<Vec<u8>, Value> {
        Err(self.error_value("TypeError", "merge_snapshots is not supported by this build".to_string()))
    }

    /// Diagnostic extractor (spec §6): every literal in a snapshot's
    /// literal table, rendered for inspection rather than re-interned.
    #[cfg(feature = "snapshot-exec")]
    pub fn get_literals_from_snapshot(&mut self, buffer: &[u8], supported: GlobalFlags) -> Result<Vec<String>, Value> {
        let (_header, _roots, _records, storage) =
            jjs_snapshot::decode_image(buffer, supported).map_err(|e| self.snapshot_error_value(&e))?;
        Ok(describe_all_literals(&storage))
    }

    #[cfg(not(feature = "snapshot-exec"))]
    pub fn get_literals_from_snapshot(&mut self, _buffer: &[u8], _supported: GlobalFlags) -> Result<Vec<String>, Value> {
        Err(self.error_value("TypeError", "get_literals_from_snapshot is not supported by this build".to_string()))
    }

    /// Diagnostic extractor (spec §6): just the string literals, the
    /// narrower sibling of [`Engine::get_literals_from_snapshot`].
    #[cfg(feature = "snapshot-exec")]
    pub fn snapshot_get_string_literals(&mut self, buffer: &[u8], supported: GlobalFlags) -> Result<Vec<String>, Value> {
        let (_header, _roots, _records, storage) =
            jjs_snapshot::decode_image(buffer, supported).map_err(|e| self.snapshot_error_value(&e))?;
        Ok((0..storage.string_count() as u32).map(|i| storage.get_string(jjs_literal::StringId(i)).to_string()).collect())
    }

    #[cfg(not(feature = "snapshot-exec"))]
    pub fn snapshot_get_string_literals(&mut self, _buffer: &[u8], _supported: GlobalFlags) -> Result<Vec<String>, Value> {
        Err(self.error_value("TypeError", "snapshot_get_string_literals is not supported by this build".to_string()))
    }

    /// Allocates `"<category>: <message>"` as a heap string and wraps it
    /// in the exception bit (spec §7 "exception-tagged values"), falling
    /// back to the shared out-of-memory singleton if the heap itself is
    /// full -- reporting a failure must never be the thing that
    /// triggers another one.
    fn error_value(&mut self, category: &str, message: String) -> Value {
        let text = format!("{category}: {message}");
        match self.context.heap.allocate(HeapObject::String(text)) {
            Some(ptr) => Value::String(ptr).into_exception(),
            None => self.context.raise_out_of_memory(),
        }
    }

    fn snapshot_error_value(&mut self, err: &SnapshotError) -> Value {
        self.error_value(snapshot_error_category(err), err.to_string())
    }
}

/// Maps a [`SnapshotError`] to the exception category spec §7 names for
/// it: buffer-too-small is a `RangeError`, version/feature mismatches and
/// malformed images are `TypeError`, everything else a generic `Error`.
fn snapshot_error_category(err: &SnapshotError) -> &'static str {
    match err {
        SnapshotError::BufferTooSmall { .. } | SnapshotError::MaxSnapshotSizeExceeded => "RangeError",
        SnapshotError::InvalidSnapshotFormat
        | SnapshotError::InvalidVersionOrFeatures
        | SnapshotError::FunctionIndexOutOfRange { .. }
        | SnapshotError::StaticSnapshotsCannotBeCopied
        | SnapshotError::StaticSnapshotRequiresAllowStatic => "TypeError",
        SnapshotError::UnsupportedCompiledCode { .. }
        | SnapshotError::TaggedTemplateLiterals
        | SnapshotError::RegexpNotSupportedInStatic => "Error",
    }
}

fn describe_all_literals(storage: &LiteralStorage) -> Vec<String> {
    let mut out = Vec::with_capacity(storage.string_count());
    for i in 0..storage.string_count() as u32 {
        out.push(format!("{:?}", storage.get_string(jjs_literal::StringId(i))));
    }
    out
}

/// Renders a parser error the way spec §7 specifies: `"<message>
/// [<source_name>:<line>:<column>]"`. `miette`'s `SourceSpan` only
/// carries a byte offset, so line/column are recovered here by walking
/// `source` up to that offset -- the same one-pass counting a real
/// `source_name`-tagged diagnostic would do.
fn format_parser_error(source: &str, source_name: &str, err: &ParserError) -> String {
    let offset = err.span.offset();
    let (line, column) = line_and_column(source, offset);
    format!("{} [{source_name}:{line}:{column}]", err.kind)
}

fn line_and_column(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1usize;
    let mut column = 1usize;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jjs_context::EngineOptions;

    #[test]
    fn parsing_valid_source_returns_a_compiled_code_value() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        let value = engine.parse("let x = 1;", ParseOptions::default());
        assert!(matches!(value, Value::CompiledCode(_)));
        assert!(!value.is_exception());
    }

    #[test]
    fn parsing_invalid_source_returns_a_syntax_error_exception() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        let value = engine.parse("let let = 1;", ParseOptions::default());
        assert!(value.is_exception());
    }

    #[test]
    fn run_is_a_stub_that_returns_undefined_for_a_valid_script() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        let script = engine.parse("1 + 1;", ParseOptions::default());
        assert_eq!(engine.run(&script), Value::Undefined);
    }

    #[test]
    fn run_rejects_a_value_that_is_not_compiled_code() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        assert!(engine.run(&Value::SmallInt(1)).is_exception());
    }

    #[cfg(feature = "snapshot-save")]
    #[test]
    fn generate_snapshot_then_exec_snapshot_round_trips_through_the_engine() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        let script = engine.parse(r#"let greeting = "hi";"#, ParseOptions::default());
        let bytes = engine.generate_snapshot(&script, SaveFlags::empty()).expect("save should succeed");

        let loaded = engine.exec_snapshot(&bytes, 0, ExecFlags::empty(), GlobalFlags::all());
        assert!(matches!(loaded, Value::CompiledCode(_)));
    }

    #[cfg(feature = "snapshot-save")]
    #[test]
    fn generate_snapshot_rejects_a_value_that_is_not_compiled_code() {
        let mut engine = Engine::new(EngineOptions::default()).unwrap();
        assert!(engine.generate_snapshot(&Value::Undefined, SaveFlags::empty()).is_err());
    }
}
