//! `merge_snapshots` (spec §4.7 "Merge"): decode every input, fold their
//! literal storages into one, then re-run the save-side encoder over the
//! concatenated arena so each input's root keeps its own `func_offsets`
//! slot in the merged image.

use std::collections::HashMap;

use jjs_bytecode::{CompiledCodeRecord, FuncIndex, FunctionKind, LiteralSlot};
use jjs_literal::{BigintId, LiteralStorage, NumberId, StringId};

use crate::cursor::Writer;
use crate::error::SnapshotResult;
use crate::header::{GlobalFlags, SnapshotHeader};
use crate::literal_table::{build_literal_table, collect_refs};
use crate::load::decode_image;
use crate::save::encode_functions_region;

/// Re-interns every entry of `from` into `into`, returning the id
/// translation maps needed to rewrite a decoded image's literal slots
/// against the combined storage.
fn merge_storage(
    into: &mut LiteralStorage,
    from: &LiteralStorage,
) -> (HashMap<StringId, StringId>, HashMap<NumberId, NumberId>, HashMap<BigintId, BigintId>) {
    let mut strings = HashMap::new();
    for old_id in 0..from.string_count() as u32 {
        let old_id = StringId(old_id);
        let new_id = into.find_or_create_string(from.get_string(old_id).as_bytes()).expect("interning never fails");
        strings.insert(old_id, new_id);
    }
    // `LiteralStorage` has no public number/bigint counts; both are
    // recovered by walking the decoded records instead (see
    // `remap_record`'s callers), so only the string map is built eagerly
    // here -- numbers/bigints get translated lazily the first time a
    // record references them.
    (strings, HashMap::new(), HashMap::new())
}

#[allow(clippy::too_many_arguments)]
fn remap_slot(
    slot: &LiteralSlot,
    index_offset: u32,
    strings: &HashMap<StringId, StringId>,
    numbers: &mut HashMap<NumberId, NumberId>,
    bigints: &mut HashMap<BigintId, BigintId>,
    from_storage: &LiteralStorage,
    into_storage: &mut LiteralStorage,
) -> LiteralSlot {
    match slot {
        LiteralSlot::Empty => LiteralSlot::Empty,
        LiteralSlot::SmallInt(v) => LiteralSlot::SmallInt(*v),
        LiteralSlot::String(id) => LiteralSlot::String(strings[id]),
        LiteralSlot::HeapNumber(id) => {
            let new_id = *numbers.entry(*id).or_insert_with(|| {
                let value = from_storage.get_number(*id);
                let _ = into_storage.find_or_create_number(value);
                into_storage.number_id_of(value).expect("just interned")
            });
            LiteralSlot::HeapNumber(new_id)
        }
        LiteralSlot::BigInt(id) => {
            let new_id = *bigints.entry(*id).or_insert_with(|| {
                let digits = from_storage.get_bigint(*id);
                into_storage.find_or_create_bigint(digits.negative, digits.digits.clone())
            });
            LiteralSlot::BigInt(new_id)
        }
        LiteralSlot::CompiledCode(t) => LiteralSlot::CompiledCode(FuncIndex(t.0 + index_offset)),
        LiteralSlot::Regexp(t) => LiteralSlot::Regexp(FuncIndex(t.0 + index_offset)),
    }
}

#[allow(clippy::too_many_arguments)]
fn remap_record(
    rec: &CompiledCodeRecord,
    index_offset: u32,
    strings: &HashMap<StringId, StringId>,
    numbers: &mut HashMap<NumberId, NumberId>,
    bigints: &mut HashMap<BigintId, BigintId>,
    from_storage: &LiteralStorage,
    into_storage: &mut LiteralStorage,
) -> CompiledCodeRecord {
    let mut out = rec.clone();
    for slot in out.literals.iter_mut() {
        *slot = remap_slot(slot, index_offset, strings, numbers, bigints, from_storage, into_storage);
    }
    if let Some(meta) = out.regexp.as_mut() {
        meta.pattern = strings[&meta.pattern];
    }
    if let Some(id) = out.tail.function_name.as_mut() {
        *id = strings[id];
    }
    if let Some(names) = out.tail.mapped_argument_names.as_mut() {
        for id in names.iter_mut() {
            *id = strings[id];
        }
    }
    out
}

/// Merges `inputs` into one snapshot image (spec §4.7 "Merge"). Inputs
/// must already be validated images; invalid bytes surface the same
/// [`crate::error::SnapshotError`] `exec_snapshot` would raise on them.
pub fn merge_snapshots(inputs: &[&[u8]], supported: GlobalFlags) -> SnapshotResult<Vec<u8>> {
    let mut combined_storage = LiteralStorage::new();
    let mut combined_records: Vec<CompiledCodeRecord> = Vec::new();
    let mut combined_roots: Vec<FuncIndex> = Vec::new();
    let mut static_mode = false;

    for &input in inputs {
        let (header, roots, records, storage) = decode_image(input, supported)?;
        static_mode |= header.global_flags.contains(GlobalFlags::STATIC);

        let (strings, mut numbers, mut bigints) = merge_storage(&mut combined_storage, &storage);
        let index_offset = combined_records.len() as u32;

        for rec in &records {
            combined_records.push(remap_record(
                rec,
                index_offset,
                &strings,
                &mut numbers,
                &mut bigints,
                &storage,
                &mut combined_storage,
            ));
        }
        for root in roots {
            combined_roots.push(FuncIndex(root.0 + index_offset));
        }
    }

    let refs = collect_refs(combined_records.iter());
    let (lit_bytes, lit_map) = build_literal_table(&combined_storage, &refs);

    let (region_bytes, root_offsets) =
        encode_functions_region(&combined_records, &combined_storage, &combined_roots, &lit_map, static_mode)?;

    let has_regexp = combined_records.iter().any(|r| r.regexp.is_some());
    let has_class = combined_records.iter().any(|r| {
        matches!(
            r.kind,
            FunctionKind::Constructor | FunctionKind::Method | FunctionKind::ClassStaticBlock | FunctionKind::Accessor
        )
    });
    let mut global_flags = GlobalFlags::empty();
    if has_regexp {
        global_flags |= GlobalFlags::HAS_REGEXP;
    }
    if has_class {
        global_flags |= GlobalFlags::HAS_CLASS;
    }
    if static_mode {
        global_flags |= GlobalFlags::STATIC;
    }

    let header_len = SnapshotHeader::FIXED_LEN + 4 * root_offsets.len();
    let functions_start = align8(header_len);
    let lit_table_offset = align8(functions_start + region_bytes.len());

    let header = SnapshotHeader {
        global_flags,
        lit_table_offset: lit_table_offset as u32,
        func_offsets: root_offsets.iter().map(|o| o + functions_start as u32).collect(),
    };

    let mut out = Writer::new();
    header.write(&mut out);
    out.align_to(8);
    out.write_bytes(&region_bytes);
    out.align_to(8);
    out.write_bytes(&lit_bytes);

    Ok(out.into_vec())
}

fn align8(n: usize) -> usize {
    (n + 7) / 8 * 8
}
