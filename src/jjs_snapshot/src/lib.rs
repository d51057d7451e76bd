//! Snapshot codec (spec §4.7): serialise a compiled-code graph to a
//! relocatable binary image, reload it, and merge several images into
//! one. Grounded on `bsharp_il::{loader, resolver, model, errors}`'s
//! shape and `examples/messense-llvm-bitcode-rs`'s byte-cursor idiom
//! (see `cursor.rs`).

pub mod cursor;
pub mod error;
pub mod header;
pub mod literal_table;
pub mod load;
pub mod merge;
pub mod save;
pub mod wire;

pub use error::{SnapshotError, SnapshotResult};
pub use header::{ExecFlags, GlobalFlags, SaveFlags, SnapshotHeader, MAGIC, VERSION};
pub use load::{decode_image, exec_snapshot, LoadedScript};
pub use merge::merge_snapshots;
pub use save::generate_snapshot;

#[cfg(test)]
mod tests {
    use super::*;
    use jjs_bytecode::{CompiledCodeRecord, CompiledCodeTail, FuncIndex, FunctionKind, LiteralSlot, StatusFlags};
    use jjs_literal::LiteralStorage;

    fn leaf_script(value: &str) -> (Vec<CompiledCodeRecord>, LiteralStorage, FuncIndex) {
        let mut storage = LiteralStorage::new();
        let id = storage.find_or_create_string(value.as_bytes()).unwrap();
        let record = CompiledCodeRecord {
            kind: FunctionKind::Script,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 1,
            literal_end: 1,
            regexp: None,
            literals: vec![LiteralSlot::String(id)],
            bytecode: vec![1, 2, 3],
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        (vec![record], storage, FuncIndex(0))
    }

    #[test]
    fn generate_then_exec_round_trips_a_single_string_literal() {
        let (records, storage, entry) = leaf_script("hello");
        let bytes = generate_snapshot(&records, &storage, entry, SaveFlags::empty()).unwrap();

        let loaded = exec_snapshot(&bytes, 0, ExecFlags::empty(), GlobalFlags::all()).unwrap();
        let rec = &loaded.script.functions[loaded.script.entry.0 as usize];
        assert_eq!(rec.bytecode, vec![1, 2, 3]);
        match &rec.literals[0] {
            LiteralSlot::String(id) => assert_eq!(loaded.storage.get_string(*id), "hello"),
            other => panic!("expected a string literal, got {other:?}"),
        }
    }

    #[test]
    fn repeated_save_cycles_are_byte_identical() {
        let (records, storage, entry) = leaf_script("idempotent");
        let first = generate_snapshot(&records, &storage, entry, SaveFlags::empty()).unwrap();
        let second = generate_snapshot(&records, &storage, entry, SaveFlags::empty()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nested_function_slot_survives_a_round_trip() {
        let mut storage = LiteralStorage::new();
        let name = storage.find_or_create_string(b"inner").unwrap();
        let inner = CompiledCodeRecord {
            kind: FunctionKind::Normal,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 1,
            literal_end: 1,
            regexp: None,
            literals: vec![LiteralSlot::String(name)],
            bytecode: vec![9],
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let outer = CompiledCodeRecord {
            kind: FunctionKind::Script,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 0,
            literal_end: 1,
            regexp: None,
            literals: vec![LiteralSlot::CompiledCode(FuncIndex(1))],
            bytecode: vec![7],
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let records = vec![outer, inner];

        let bytes = generate_snapshot(&records, &storage, FuncIndex(0), SaveFlags::empty()).unwrap();
        let loaded = exec_snapshot(&bytes, 0, ExecFlags::empty(), GlobalFlags::all()).unwrap();

        let root = &loaded.script.functions[loaded.script.entry.0 as usize];
        let nested_idx = match root.literals[0] {
            LiteralSlot::CompiledCode(idx) => idx,
            _ => panic!("expected a nested compiled-code slot"),
        };
        let nested = &loaded.script.functions[nested_idx.0 as usize];
        assert_eq!(nested.bytecode, vec![9]);
    }

    #[test]
    fn self_referencing_record_decodes_without_duplicating_it() {
        let storage = LiteralStorage::new();
        let record = CompiledCodeRecord {
            kind: FunctionKind::Normal,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 0,
            literal_end: 1,
            regexp: None,
            literals: vec![LiteralSlot::CompiledCode(FuncIndex(0))],
            bytecode: vec![5],
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let records = vec![record];
        let bytes = generate_snapshot(&records, &storage, FuncIndex(0), SaveFlags::empty()).unwrap();
        let loaded = exec_snapshot(&bytes, 0, ExecFlags::empty(), GlobalFlags::all()).unwrap();
        assert_eq!(loaded.script.functions.len(), 1);
        match loaded.script.functions[0].literals[0] {
            LiteralSlot::CompiledCode(idx) => assert_eq!(idx, loaded.script.entry),
            _ => panic!("expected self-reference to survive the round trip"),
        }
    }

    #[test]
    fn a_regexp_bearing_snapshot_is_rejected_by_a_loader_missing_that_feature_bit() {
        let mut storage = LiteralStorage::new();
        let pattern = storage.find_or_create_string(b"a+").unwrap();
        let regexp_leaf = CompiledCodeRecord {
            kind: FunctionKind::Normal,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 0,
            literal_end: 0,
            regexp: Some(jjs_bytecode::RegexpMeta { pattern, flags: 0 }),
            literals: Vec::new(),
            bytecode: Vec::new(),
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let outer = CompiledCodeRecord {
            kind: FunctionKind::Script,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 0,
            literal_end: 1,
            regexp: None,
            literals: vec![LiteralSlot::Regexp(FuncIndex(1))],
            bytecode: Vec::new(),
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let records = vec![outer, regexp_leaf];

        let bytes = generate_snapshot(&records, &storage, FuncIndex(0), SaveFlags::empty()).unwrap();
        let err = exec_snapshot(&bytes, 0, ExecFlags::empty(), GlobalFlags::HAS_CLASS).unwrap_err();
        assert_eq!(err, SnapshotError::InvalidVersionOrFeatures);

        exec_snapshot(&bytes, 0, ExecFlags::empty(), GlobalFlags::all()).expect("a loader advertising HAS_REGEXP should accept it");
    }

    #[test]
    fn function_index_out_of_range_is_rejected() {
        let (records, storage, entry) = leaf_script("x");
        let bytes = generate_snapshot(&records, &storage, entry, SaveFlags::empty()).unwrap();
        let err = exec_snapshot(&bytes, 5, ExecFlags::empty(), GlobalFlags::all()).unwrap_err();
        assert!(matches!(err, SnapshotError::FunctionIndexOutOfRange { index: 5, .. }));
    }

    #[test]
    fn merging_two_scripts_keeps_one_literal_table_entry_per_distinct_string() {
        let (records_a, storage_a, entry_a) = leaf_script("shared");
        let (records_b, storage_b, entry_b) = leaf_script("shared");
        let a = generate_snapshot(&records_a, &storage_a, entry_a, SaveFlags::empty()).unwrap();
        let b = generate_snapshot(&records_b, &storage_b, entry_b, SaveFlags::empty()).unwrap();

        let merged = merge_snapshots(&[&a, &b], GlobalFlags::all()).unwrap();
        let loaded_a = exec_snapshot(&merged, 0, ExecFlags::empty(), GlobalFlags::all()).unwrap();
        let loaded_b = exec_snapshot(&merged, 1, ExecFlags::empty(), GlobalFlags::all()).unwrap();

        let string_at = |loaded: &LoadedScript| match &loaded.script.functions[loaded.script.entry.0 as usize].literals[0] {
            LiteralSlot::String(id) => loaded.storage.get_string(*id).to_string(),
            other => panic!("expected a string literal, got {other:?}"),
        };
        assert_eq!(string_at(&loaded_a), "shared");
        assert_eq!(string_at(&loaded_b), "shared");
    }

    #[test]
    fn static_snapshot_requires_allow_static_to_load() {
        let (records, storage, entry) = leaf_script("static");
        let bytes = generate_snapshot(&records, &storage, entry, SaveFlags::SAVE_STATIC).unwrap();
        let err = exec_snapshot(&bytes, 0, ExecFlags::empty(), GlobalFlags::all()).unwrap_err();
        assert_eq!(err, SnapshotError::StaticSnapshotRequiresAllowStatic);

        let err = exec_snapshot(&bytes, 0, ExecFlags::ALLOW_STATIC | ExecFlags::COPY_DATA, GlobalFlags::all()).unwrap_err();
        assert_eq!(err, SnapshotError::StaticSnapshotsCannotBeCopied);

        exec_snapshot(&bytes, 0, ExecFlags::ALLOW_STATIC, GlobalFlags::all()).expect("ALLOW_STATIC alone should succeed");
    }

    #[test]
    fn regexp_leaf_is_rejected_in_static_mode() {
        let mut storage = LiteralStorage::new();
        let pattern = storage.find_or_create_string(b"ab+c").unwrap();
        let regexp_leaf = CompiledCodeRecord {
            kind: FunctionKind::Normal,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 0,
            literal_end: 0,
            regexp: Some(jjs_bytecode::RegexpMeta { pattern, flags: 0 }),
            literals: Vec::new(),
            bytecode: Vec::new(),
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let outer = CompiledCodeRecord {
            kind: FunctionKind::Script,
            flags: StatusFlags::empty(),
            stack_limit: 0,
            register_end: 0,
            argument_end: 0,
            ident_end: 0,
            const_literal_end: 0,
            literal_end: 1,
            regexp: None,
            literals: vec![LiteralSlot::Regexp(FuncIndex(1))],
            bytecode: Vec::new(),
            tail: CompiledCodeTail::default(),
            refs: 1,
        };
        let records = vec![outer, regexp_leaf];

        let err = generate_snapshot(&records, &storage, FuncIndex(0), SaveFlags::SAVE_STATIC).unwrap_err();
        assert_eq!(err, SnapshotError::RegexpNotSupportedInStatic);

        generate_snapshot(&records, &storage, FuncIndex(0), SaveFlags::empty())
            .expect("a non-static snapshot may carry a regexp leaf");
    }
}
