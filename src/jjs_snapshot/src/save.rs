//! `generate_snapshot` (spec §4.7 "Save"). Also exposes
//! [`encode_functions_region`], the multi-root variant `merge_snapshots`
//! reuses so both entry points share one encoder.

use std::collections::{HashMap, HashSet};

use jjs_bytecode::{CompiledCodeRecord, FuncIndex, FunctionKind, LiteralSlot, StatusFlags};
use jjs_literal::LiteralStorage;

use crate::cursor::Writer;
use crate::error::{SnapshotError, SnapshotResult};
use crate::header::{GlobalFlags, SaveFlags, SnapshotHeader};
use crate::literal_table::{build_literal_table, collect_refs, LiteralOffsetMap};
use crate::wire::{
    kind_to_u8, RECORD_FUNCTION, RECORD_REGEXP, TAG_BIGINT, TAG_EMPTY, TAG_NESTED_FUNCTION,
    TAG_NESTED_REGEXP, TAG_NUMBER, TAG_SMALL_INT, TAG_STRING,
};

/// Depth-first pre-order walk recording every arena index reachable from
/// `entry`, rejecting at the first record this snapshot mode can't carry
/// (spec step 1 rejection list; `SAVE_STATIC`'s "forbids ... regexps").
fn collect_reachable(
    records: &[CompiledCodeRecord],
    entry: FuncIndex,
    static_mode: bool,
    visited: &mut HashSet<FuncIndex>,
    order: &mut Vec<FuncIndex>,
) -> SnapshotResult<()> {
    if !visited.insert(entry) {
        return Ok(());
    }
    let rec = &records[entry.0 as usize];
    if rec.tail.tagged_template_literal.is_some() {
        return Err(SnapshotError::TaggedTemplateLiterals);
    }
    if rec.regexp.is_some() && static_mode {
        return Err(SnapshotError::RegexpNotSupportedInStatic);
    }
    order.push(entry);
    for nested in rec.nested_function_slots() {
        collect_reachable(records, nested, static_mode, visited, order)?;
    }
    Ok(())
}

fn write_const_literal(out: &mut Writer, slot: &LiteralSlot, map: &LiteralOffsetMap) -> SnapshotResult<()> {
    match slot {
        LiteralSlot::Empty => {
            out.write_u8(TAG_EMPTY);
            out.write_u32(0);
        }
        LiteralSlot::SmallInt(v) => {
            out.write_u8(TAG_SMALL_INT);
            out.write_u32(*v as u32);
        }
        LiteralSlot::String(id) => {
            let off = *map.strings.get(id).ok_or(SnapshotError::UnsupportedCompiledCode {
                reason: "string literal missing from the snapshot's literal table",
            })?;
            out.write_u8(TAG_STRING);
            out.write_u32(off);
        }
        LiteralSlot::HeapNumber(id) => {
            let off = *map.numbers.get(id).ok_or(SnapshotError::UnsupportedCompiledCode {
                reason: "number literal missing from the snapshot's literal table",
            })?;
            out.write_u8(TAG_NUMBER);
            out.write_u32(off);
        }
        LiteralSlot::BigInt(id) => {
            let off = *map.bigints.get(id).ok_or(SnapshotError::UnsupportedCompiledCode {
                reason: "bigint literal missing from the snapshot's literal table",
            })?;
            out.write_u8(TAG_BIGINT);
            out.write_u32(off);
        }
        LiteralSlot::CompiledCode(_) | LiteralSlot::Regexp(_) => {
            unreachable!("nested-function slots are written by write_record's own loop")
        }
    }
    Ok(())
}

/// Writes one record (spec step 2's depth-first copy), recursing into
/// its nested compiled-code slots after its own header/literals/
/// bytecode/tail have been appended. `patches` accumulates
/// `(byte offset of the placeholder, owner index, target index)` for
/// [`apply_patches`] to resolve once every reachable record has a known
/// start offset.
#[allow(clippy::too_many_arguments)]
fn write_record(
    out: &mut Writer,
    idx: FuncIndex,
    records: &[CompiledCodeRecord],
    storage: &LiteralStorage,
    lit_map: &LiteralOffsetMap,
    static_mode: bool,
    offsets: &mut HashMap<FuncIndex, u32>,
    patches: &mut Vec<(usize, FuncIndex, FuncIndex)>,
    written: &mut HashSet<FuncIndex>,
) -> SnapshotResult<()> {
    if !written.insert(idx) {
        return Ok(());
    }
    let rec = &records[idx.0 as usize];

    out.align_to(8);
    let start = out.position() as u32;
    offsets.insert(idx, start);

    if let Some(meta) = &rec.regexp {
        out.write_u8(RECORD_REGEXP);
        out.write_u8(kind_to_u8(rec.kind));
        out.write_u16(rec.flags.bits());
        let pattern = storage.get_string(meta.pattern);
        out.write_u32(pattern.len() as u32);
        out.write_bytes(pattern.as_bytes());
        out.write_u8(meta.flags);
        return Ok(());
    }

    let mut flags = rec.flags;
    if static_mode {
        flags |= StatusFlags::STATIC_SNAPSHOT;
    }

    out.write_u8(RECORD_FUNCTION);
    out.write_u8(kind_to_u8(rec.kind));
    out.write_u16(flags.bits());
    out.write_u16(rec.stack_limit);
    out.write_u16(rec.register_end);
    out.write_u16(rec.argument_end);
    out.write_u16(rec.ident_end);
    out.write_u16(rec.const_literal_end);
    out.write_u16(rec.literal_end);

    for slot in &rec.literals[..rec.const_literal_end as usize] {
        write_const_literal(out, slot, lit_map)?;
    }

    let nested_slots = &rec.literals[rec.const_literal_end as usize..rec.literal_end as usize];
    for slot in nested_slots {
        let tag = match slot {
            LiteralSlot::CompiledCode(_) => TAG_NESTED_FUNCTION,
            LiteralSlot::Regexp(_) => TAG_NESTED_REGEXP,
            _ => {
                return Err(SnapshotError::UnsupportedCompiledCode {
                    reason: "non-function literal found in the nested-compiled-code range",
                })
            }
        };
        out.write_u8(tag);
        let pos = out.position();
        out.write_u32(0); // patched below, once every target's start offset is known
        let target = match slot {
            LiteralSlot::CompiledCode(t) | LiteralSlot::Regexp(t) => *t,
            _ => unreachable!(),
        };
        patches.push((pos, idx, target));
    }

    out.write_u32(rec.bytecode.len() as u32);
    out.write_bytes(&rec.bytecode);

    const HAS_NAME: u8 = 1 << 0;
    const HAS_ARGS: u8 = 1 << 1;
    const HAS_LINE: u8 = 1 << 2;
    const HAS_EXT: u8 = 1 << 3;
    let mut tail_flags = 0u8;
    if rec.tail.function_name.is_some() {
        tail_flags |= HAS_NAME;
    }
    if rec.tail.mapped_argument_names.is_some() {
        tail_flags |= HAS_ARGS;
    }
    if rec.tail.line_info.is_some() {
        tail_flags |= HAS_LINE;
    }
    if rec.tail.extended_info.is_some() {
        tail_flags |= HAS_EXT;
    }
    out.write_u8(tail_flags);
    if let Some(id) = rec.tail.function_name {
        write_const_literal(out, &LiteralSlot::String(id), lit_map)?;
    }
    if let Some(names) = &rec.tail.mapped_argument_names {
        out.write_u16(names.len() as u16);
        for id in names {
            write_const_literal(out, &LiteralSlot::String(*id), lit_map)?;
        }
    }
    if let Some(entries) = &rec.tail.line_info {
        out.write_u32(entries.len() as u32);
        for e in entries {
            out.write_u32(e.bytecode_offset);
            out.write_u32(e.source_line);
        }
    }
    if let Some(ext) = &rec.tail.extended_info {
        out.write_u16(ext.argument_length);
        out.write_u32(ext.source_range.0);
        out.write_u32(ext.source_range.1);
    }

    // Children are written after this record's own body; `offsets`
    // already carries this record's start, so a self-reference (this
    // record appearing among its own nested slots) resolves to offset 0
    // without any special-casing in `apply_patches`.
    for target in nested_slots.iter().map(|slot| match slot {
        LiteralSlot::CompiledCode(t) | LiteralSlot::Regexp(t) => *t,
        _ => unreachable!(),
    }) {
        write_record(out, target, records, storage, lit_map, static_mode, offsets, patches, written)?;
    }

    Ok(())
}

fn apply_patches(out: &mut Writer, region_start: usize, offsets: &HashMap<FuncIndex, u32>, patches: &[(usize, FuncIndex, FuncIndex)]) {
    for (pos, owner, target) in patches {
        let relative = offsets[target] as i64 - offsets[owner] as i64;
        out.patch_u32(region_start + pos, relative as i32 as u32);
    }
}

/// Encodes the functions region for one or more independently-rooted
/// trees (spec step 2, generalised so `merge_snapshots` can lay several
/// inputs' trees into one buffer). Returns the region bytes and each
/// root's offset within them.
pub fn encode_functions_region(
    records: &[CompiledCodeRecord],
    storage: &LiteralStorage,
    roots: &[FuncIndex],
    lit_map: &LiteralOffsetMap,
    static_mode: bool,
) -> SnapshotResult<(Vec<u8>, Vec<u32>)> {
    let mut out = Writer::new();
    let mut offsets = HashMap::new();
    let mut written = HashSet::new();
    // `patches` pairs a placeholder's byte position with the index that
    // owns it and the index it targets, resolved once every record's
    // start offset is known -- the same two-pass shape `jjs_bytecode`'s
    // branch back-patching already uses, applied to a second
    // until-the-end unknown (spec §4.4/§9).
    let mut patches: Vec<(usize, FuncIndex, FuncIndex)> = Vec::new();

    for &root in roots {
        write_record(&mut out, root, records, storage, lit_map, static_mode, &mut offsets, &mut patches, &mut written)?;
    }

    let mut root_offsets = Vec::with_capacity(roots.len());
    for &root in roots {
        root_offsets.push(offsets[&root]);
    }

    apply_patches(&mut out, 0, &offsets, &patches);
    Ok((out.into_vec(), root_offsets))
}

/// Saves `entry`'s compiled-code tree to a portable byte image (spec
/// §4.7 "Save"/`generate_snapshot`).
pub fn generate_snapshot(
    records: &[CompiledCodeRecord],
    storage: &LiteralStorage,
    entry: FuncIndex,
    flags: SaveFlags,
) -> SnapshotResult<Vec<u8>> {
    let static_mode = flags.contains(SaveFlags::SAVE_STATIC);

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    collect_reachable(records, entry, static_mode, &mut visited, &mut order)?;

    let refs = collect_refs(order.iter().map(|idx| &records[idx.0 as usize]));
    let (lit_bytes, lit_map) = build_literal_table(storage, &refs);

    let (region_bytes, root_offsets) = encode_functions_region(records, storage, &[entry], &lit_map, static_mode)?;

    let has_regexp = order.iter().any(|idx| records[idx.0 as usize].regexp.is_some());
    let has_class = order.iter().any(|idx| {
        matches!(
            records[idx.0 as usize].kind,
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
    debug_assert_eq!(out.position(), functions_start);
    out.write_bytes(&region_bytes);
    out.align_to(8);
    debug_assert_eq!(out.position(), lit_table_offset);
    out.write_bytes(&lit_bytes);

    Ok(out.into_vec())
}

fn align8(n: usize) -> usize {
    (n + 7) / 8 * 8
}
