//! `exec_snapshot` (spec §4.7 "Load") and the shared `decode_image` walk
//! `merge_snapshots` reuses to read every input before re-encoding it.

use std::collections::HashMap;

use jjs_bytecode::{
    CompiledCodeRecord, CompiledCodeTail, ExtendedInfo, FuncIndex, FunctionKind, LineInfoEntry,
    LiteralSlot, RegexpMeta, ScriptFlags, ScriptRecord, StatusFlags,
};
use jjs_literal::{BigintId, LiteralStorage, NumberId, StringId};

use crate::cursor::Cursor;
use crate::error::{SnapshotError, SnapshotResult};
use crate::header::{ExecFlags, GlobalFlags, SnapshotHeader};
use crate::literal_table::{decode_literal_table, DecodedLiteral};
use crate::wire::{
    kind_from_u8, RECORD_FUNCTION, RECORD_REGEXP, TAG_BIGINT, TAG_EMPTY, TAG_NESTED_FUNCTION,
    TAG_NUMBER, TAG_SMALL_INT, TAG_STRING,
};

/// A fully decoded image, ready either to run (the root crate's `run`
/// stub, see SPEC_FULL.md §6) or to feed back into `merge_snapshots`.
pub struct LoadedScript {
    pub script: ScriptRecord,
    pub storage: LiteralStorage,
}

/// Interns each literal-table entry into `storage` on first use, caching
/// by table byte offset so repeated references to the same entry share
/// one id (spec §4.2 "two interned strings are equal iff pointer-equal").
struct LiteralInterner<'a> {
    table: &'a HashMap<u32, DecodedLiteral>,
    strings: HashMap<u32, StringId>,
    numbers: HashMap<u32, NumberId>,
    bigints: HashMap<u32, BigintId>,
}

impl<'a> LiteralInterner<'a> {
    fn new(table: &'a HashMap<u32, DecodedLiteral>) -> LiteralInterner<'a> {
        LiteralInterner { table, strings: HashMap::new(), numbers: HashMap::new(), bigints: HashMap::new() }
    }

    fn string_at(&mut self, storage: &mut LiteralStorage, offset: u32) -> SnapshotResult<StringId> {
        if let Some(id) = self.strings.get(&offset) {
            return Ok(*id);
        }
        let id = match self.table.get(&offset) {
            Some(DecodedLiteral::String(s)) => storage
                .find_or_create_string(s.as_bytes())
                .map_err(|_| SnapshotError::InvalidSnapshotFormat)?,
            _ => return Err(SnapshotError::InvalidSnapshotFormat),
        };
        self.strings.insert(offset, id);
        Ok(id)
    }

    fn number_at(&mut self, storage: &mut LiteralStorage, offset: u32) -> SnapshotResult<NumberId> {
        if let Some(id) = self.numbers.get(&offset) {
            return Ok(*id);
        }
        let value = match self.table.get(&offset) {
            Some(DecodedLiteral::Number(n)) => *n,
            _ => return Err(SnapshotError::InvalidSnapshotFormat),
        };
        let _ = storage.find_or_create_number(value);
        let id = storage.number_id_of(value).expect("just interned above");
        self.numbers.insert(offset, id);
        Ok(id)
    }

    fn bigint_at(&mut self, storage: &mut LiteralStorage, offset: u32) -> SnapshotResult<BigintId> {
        if let Some(id) = self.bigints.get(&offset) {
            return Ok(*id);
        }
        let id = match self.table.get(&offset) {
            Some(DecodedLiteral::Bigint(b)) => storage.find_or_create_bigint(b.negative, b.digits.clone()),
            _ => return Err(SnapshotError::InvalidSnapshotFormat),
        };
        self.bigints.insert(offset, id);
        Ok(id)
    }
}

fn read_const_literal(
    cur: &mut Cursor,
    interner: &mut LiteralInterner,
    storage: &mut LiteralStorage,
) -> SnapshotResult<LiteralSlot> {
    let tag = cur.read_u8()?;
    let payload = cur.read_u32()?;
    Ok(match tag {
        t if t == TAG_EMPTY => LiteralSlot::Empty,
        t if t == TAG_SMALL_INT => LiteralSlot::SmallInt(payload as i32),
        t if t == TAG_STRING => LiteralSlot::String(interner.string_at(storage, payload)?),
        t if t == TAG_NUMBER => LiteralSlot::HeapNumber(interner.number_at(storage, payload)?),
        t if t == TAG_BIGINT => LiteralSlot::BigInt(interner.bigint_at(storage, payload)?),
        _ => return Err(SnapshotError::InvalidSnapshotFormat),
    })
}

fn empty_record() -> CompiledCodeRecord {
    CompiledCodeRecord {
        kind: FunctionKind::Normal,
        flags: StatusFlags::empty(),
        stack_limit: 0,
        register_end: 0,
        argument_end: 0,
        ident_end: 0,
        const_literal_end: 0,
        literal_end: 0,
        regexp: None,
        literals: Vec::new(),
        bytecode: Vec::new(),
        tail: CompiledCodeTail::default(),
        refs: 1,
    }
}

/// Decodes the record starting at `offset`, recursing into nested slots
/// (spec step 5: "resolve nested function slots recursively (self-
/// reference slots, those with value 0, become pointers back to the
/// enclosing record)"). `offset_to_idx` both memoizes shared targets and
/// lets an in-progress record's own offset resolve a self-reference
/// before its body finishes decoding.
#[allow(clippy::too_many_arguments)]
fn decode_function(
    buffer: &[u8],
    offset: u32,
    interner: &mut LiteralInterner,
    storage: &mut LiteralStorage,
    arena: &mut Vec<CompiledCodeRecord>,
    offset_to_idx: &mut HashMap<u32, FuncIndex>,
) -> SnapshotResult<FuncIndex> {
    if let Some(&idx) = offset_to_idx.get(&offset) {
        return Ok(idx);
    }
    let idx = FuncIndex(arena.len() as u32);
    arena.push(empty_record());
    offset_to_idx.insert(offset, idx);

    let mut cur = Cursor::new(buffer);
    cur.seek(offset as usize)?;
    let record_tag = cur.read_u8()?;
    let kind = kind_from_u8(cur.read_u8()?).ok_or(SnapshotError::InvalidSnapshotFormat)?;
    let flags = StatusFlags::from_bits_truncate(cur.read_u16()?);

    if record_tag == RECORD_REGEXP {
        let pattern_len = cur.read_u32()? as usize;
        let pattern_bytes = cur.read_bytes(pattern_len)?;
        let regexp_flags = cur.read_u8()?;
        // A regexp pattern is stored inline rather than through the
        // shared literal table (spec: "pattern_utf8_bytes"), so intern it
        // directly instead of looking up a table offset.
        let pattern = storage.find_or_create_string(pattern_bytes).map_err(|_| SnapshotError::InvalidSnapshotFormat)?;
        arena[idx.0 as usize] = CompiledCodeRecord {
            kind,
            flags,
            regexp: Some(RegexpMeta { pattern, flags: regexp_flags }),
            ..empty_record()
        };
        return Ok(idx);
    }
    if record_tag != RECORD_FUNCTION {
        return Err(SnapshotError::InvalidSnapshotFormat);
    }

    let stack_limit = cur.read_u16()?;
    let register_end = cur.read_u16()?;
    let argument_end = cur.read_u16()?;
    let ident_end = cur.read_u16()?;
    let const_literal_end = cur.read_u16()?;
    let literal_end = cur.read_u16()?;

    let mut literals = Vec::with_capacity(literal_end as usize);
    for _ in 0..const_literal_end {
        literals.push(read_const_literal(&mut cur, interner, storage)?);
    }

    let mut nested_targets: Vec<(u8, i32)> = Vec::with_capacity((literal_end - const_literal_end) as usize);
    for _ in const_literal_end..literal_end {
        let tag = cur.read_u8()?;
        let relative = cur.read_u32()? as i32;
        nested_targets.push((tag, relative));
    }

    let bytecode_len = cur.read_u32()? as usize;
    let bytecode = cur.read_bytes(bytecode_len)?.to_vec();

    const HAS_NAME: u8 = 1 << 0;
    const HAS_ARGS: u8 = 1 << 1;
    const HAS_LINE: u8 = 1 << 2;
    const HAS_EXT: u8 = 1 << 3;
    let tail_flags = cur.read_u8()?;
    let mut tail = CompiledCodeTail::default();
    if tail_flags & HAS_NAME != 0 {
        match read_const_literal(&mut cur, interner, storage)? {
            LiteralSlot::String(id) => tail.function_name = Some(id),
            _ => return Err(SnapshotError::InvalidSnapshotFormat),
        }
    }
    if tail_flags & HAS_ARGS != 0 {
        let count = cur.read_u16()?;
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match read_const_literal(&mut cur, interner, storage)? {
                LiteralSlot::String(id) => names.push(id),
                _ => return Err(SnapshotError::InvalidSnapshotFormat),
            }
        }
        tail.mapped_argument_names = Some(names);
    }
    if tail_flags & HAS_LINE != 0 {
        let count = cur.read_u32()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let bytecode_offset = cur.read_u32()?;
            let source_line = cur.read_u32()?;
            entries.push(LineInfoEntry { bytecode_offset, source_line });
        }
        tail.line_info = Some(entries);
    }
    if tail_flags & HAS_EXT != 0 {
        let argument_length = cur.read_u16()?;
        let start = cur.read_u32()?;
        let end = cur.read_u32()?;
        tail.extended_info = Some(ExtendedInfo { argument_length, source_range: (start, end) });
    }

    let mut nested_slots = Vec::with_capacity(nested_targets.len());
    for (tag, relative) in nested_targets {
        let target_offset = (offset as i64 + relative as i64) as u32;
        let nested_idx = decode_function(buffer, target_offset, interner, storage, arena, offset_to_idx)?;
        nested_slots.push(if tag == TAG_NESTED_FUNCTION {
            LiteralSlot::CompiledCode(nested_idx)
        } else {
            LiteralSlot::Regexp(nested_idx)
        });
    }
    literals.extend(nested_slots);

    arena[idx.0 as usize] = CompiledCodeRecord {
        kind,
        flags,
        stack_limit,
        register_end,
        argument_end,
        ident_end,
        const_literal_end,
        literal_end,
        regexp: None,
        literals,
        bytecode,
        tail,
        refs: 1,
    };
    Ok(idx)
}

/// Decodes a whole image's functions region into a fresh arena, one
/// entry per `func_offsets` slot (spec step 4 applied once per root;
/// `merge_snapshots` calls this for every input before re-encoding).
pub fn decode_image(buffer: &[u8], supported: GlobalFlags) -> SnapshotResult<(SnapshotHeader, Vec<FuncIndex>, Vec<CompiledCodeRecord>, LiteralStorage)> {
    let mut cur = Cursor::new(buffer);
    let header = SnapshotHeader::read(&mut cur, supported)?;
    if header.lit_table_offset as usize > buffer.len() {
        return Err(SnapshotError::InvalidSnapshotFormat);
    }
    let header_end = SnapshotHeader::FIXED_LEN + 4 * header.func_offsets.len();
    for &offset in &header.func_offsets {
        if (offset as usize) < header_end || offset >= header.lit_table_offset {
            return Err(SnapshotError::InvalidSnapshotFormat);
        }
    }

    let table = decode_literal_table(buffer, header.lit_table_offset)?;
    let mut interner = LiteralInterner::new(&table);
    let mut storage = LiteralStorage::new();
    let mut arena = Vec::new();
    let mut offset_to_idx = HashMap::new();

    let mut roots = Vec::with_capacity(header.func_offsets.len());
    for &offset in &header.func_offsets {
        roots.push(decode_function(buffer, offset, &mut interner, &mut storage, &mut arena, &mut offset_to_idx)?);
    }

    Ok((header, roots, arena, storage))
}

/// Loads `func_index`'s tree out of a snapshot image into executable
/// form (spec §4.7 "Load"/`exec_snapshot`).
pub fn exec_snapshot(
    buffer: &[u8],
    func_index: u32,
    exec_flags: ExecFlags,
    supported: GlobalFlags,
) -> SnapshotResult<LoadedScript> {
    let mut peek = Cursor::new(buffer);
    let header = SnapshotHeader::read(&mut peek, supported)?;
    let offset = *header
        .func_offsets
        .get(func_index as usize)
        .ok_or(SnapshotError::FunctionIndexOutOfRange { index: func_index, available: header.func_offsets.len() as u32 })?;

    peek.seek(offset as usize)?;
    let _record_tag = peek.read_u8()?;
    let _kind = peek.read_u8()?;
    let record_flags = StatusFlags::from_bits_truncate(peek.read_u16()?);
    if record_flags.contains(StatusFlags::STATIC_SNAPSHOT) {
        if !exec_flags.contains(ExecFlags::ALLOW_STATIC) {
            return Err(SnapshotError::StaticSnapshotRequiresAllowStatic);
        }
        if exec_flags.contains(ExecFlags::COPY_DATA) {
            return Err(SnapshotError::StaticSnapshotsCannotBeCopied);
        }
    }

    let (_header, roots, arena, storage) = decode_image(buffer, supported)?;
    let entry = roots[func_index as usize];

    let script = ScriptRecord {
        flags: ScriptFlags::default(),
        refs: 1,
        source_name: String::new(),
        functions: arena,
        entry,
        argument_list: None,
        has_import_meta_object: false,
    };
    Ok(LoadedScript { script, storage })
}
