//! The snapshot literal table (spec §3 "literal table" diagram) plus the
//! collection pass that decides which literals are reachable from a set
//! of functions (spec §4.7 step 3: "Collect every string/number/bigint
//! literal reachable through each function's `[0, const_literal_end)`
//! and its tail serialisable values ... sorted by size then
//! lexicographically for determinism").

use std::collections::{BTreeSet, HashMap};

use jjs_bytecode::{CompiledCodeRecord, LiteralSlot};
use jjs_literal::{BigintDigits, BigintId, LiteralStorage, NumberId, StringId};

use crate::cursor::{Cursor, Writer};
use crate::error::{SnapshotError, SnapshotResult};
use crate::wire::{LIT_TABLE_BIGINT, LIT_TABLE_NUMBER, LIT_TABLE_STRING};

/// Every literal reachable from a set of records, deduplicated by id.
/// `BTreeSet` keeps iteration order deterministic independent of
/// `HashMap` iteration order elsewhere in the crate.
#[derive(Default)]
pub struct LiteralRefs {
    pub strings: BTreeSet<StringId>,
    pub numbers: BTreeSet<NumberId>,
    pub bigints: BTreeSet<BigintId>,
}

impl LiteralRefs {
    fn note_slot(&mut self, slot: &LiteralSlot) {
        match slot {
            LiteralSlot::String(id) => {
                self.strings.insert(*id);
            }
            LiteralSlot::HeapNumber(id) => {
                self.numbers.insert(*id);
            }
            LiteralSlot::BigInt(id) => {
                self.bigints.insert(*id);
            }
            LiteralSlot::SmallInt(_) | LiteralSlot::Empty => {}
            LiteralSlot::CompiledCode(_) | LiteralSlot::Regexp(_) => {
                unreachable!("nested-function slots never appear in [0, const_literal_end)")
            }
        }
    }

    fn merge(&mut self, other: &LiteralRefs) {
        self.strings.extend(other.strings.iter().copied());
        self.numbers.extend(other.numbers.iter().copied());
        self.bigints.extend(other.bigints.iter().copied());
    }
}

/// Walks `record`'s `[0, const_literal_end)` range and tail serialisable
/// values, noting every string/number/bigint literal it reaches.
pub fn collect_record_refs(record: &CompiledCodeRecord) -> LiteralRefs {
    let mut refs = LiteralRefs::default();
    for slot in &record.literals[..record.const_literal_end as usize] {
        refs.note_slot(slot);
    }
    if let Some(id) = record.tail.function_name {
        refs.strings.insert(id);
    }
    if let Some(names) = &record.tail.mapped_argument_names {
        refs.strings.extend(names.iter().copied());
    }
    if let Some(meta) = &record.regexp {
        refs.strings.insert(meta.pattern);
    }
    refs
}

pub fn collect_refs<'a>(records: impl IntoIterator<Item = &'a CompiledCodeRecord>) -> LiteralRefs {
    let mut refs = LiteralRefs::default();
    for record in records {
        refs.merge(&collect_record_refs(record));
    }
    refs
}

/// Maps a runtime literal id to its byte offset inside the snapshot's
/// literal table (spec: "build a map from runtime literal value to
/// snapshot offset").
#[derive(Default)]
pub struct LiteralOffsetMap {
    pub strings: HashMap<StringId, u32>,
    pub numbers: HashMap<NumberId, u32>,
    pub bigints: HashMap<BigintId, u32>,
}

/// Builds the literal table bytes plus the offset map used to rewrite
/// every function record's literal slots (spec §4.7 steps 3-4).
pub fn build_literal_table(storage: &LiteralStorage, refs: &LiteralRefs) -> (Vec<u8>, LiteralOffsetMap) {
    let mut strings: Vec<StringId> = refs.strings.iter().copied().collect();
    strings.sort_by(|a, b| {
        let (sa, sb) = (storage.get_string(*a), storage.get_string(*b));
        sa.len().cmp(&sb.len()).then_with(|| sa.cmp(sb))
    });

    let mut numbers: Vec<NumberId> = refs.numbers.iter().copied().collect();
    numbers.sort_by(|a, b| storage.get_number(*a).total_cmp(&storage.get_number(*b)));

    let mut bigints: Vec<BigintId> = refs.bigints.iter().copied().collect();
    bigints.sort_by(|a, b| {
        let (ba, bb) = (storage.get_bigint(*a), storage.get_bigint(*b));
        ba.digits.len().cmp(&bb.digits.len()).then_with(|| ba.digits.cmp(&bb.digits))
    });

    let mut out = Writer::new();
    let mut map = LiteralOffsetMap::default();

    for id in strings {
        out.align_to(2);
        let offset = out.position() as u32;
        let text = storage.get_string(id);
        out.write_u8(LIT_TABLE_STRING);
        out.write_u16(text.len() as u16);
        out.write_bytes(text.as_bytes());
        map.strings.insert(id, offset);
    }
    for id in numbers {
        out.align_to(2);
        let offset = out.position() as u32;
        out.write_u8(LIT_TABLE_NUMBER);
        out.write_f64(storage.get_number(id));
        map.numbers.insert(id, offset);
    }
    for id in bigints {
        out.align_to(2);
        let offset = out.position() as u32;
        let digits = storage.get_bigint(id);
        out.write_u8(LIT_TABLE_BIGINT);
        let sign_size = (if digits.negative { 1u32 << 31 } else { 0 }) | digits.digits.len() as u32;
        out.write_u32(sign_size);
        for d in &digits.digits {
            out.write_u32(*d);
        }
        map.bigints.insert(id, offset);
    }

    (out.into_vec(), map)
}

/// A literal table entry decoded back from snapshot bytes (spec §4.7
/// load step 5: "decode `SNAPSHOT_OFFSET`-tagged slots into real values
/// by re-interning strings/numbers/bigints from the image's literal
/// table").
pub enum DecodedLiteral {
    String(String),
    Number(f64),
    Bigint(BigintDigits),
}

/// Decodes every entry starting at `lit_table_offset` through the end of
/// `buffer`, returning a map from byte offset to decoded value so
/// `read_const_literal` can look entries up by the offset embedded in a
/// function record.
pub fn decode_literal_table(buffer: &[u8], lit_table_offset: u32) -> SnapshotResult<HashMap<u32, DecodedLiteral>> {
    let mut cur = Cursor::new(buffer);
    cur.seek(lit_table_offset as usize)?;
    let mut out = HashMap::new();
    while cur.remaining() > 0 {
        let aligned = (cur.position() + 1) / 2 * 2;
        cur.seek(aligned)?;
        if cur.remaining() == 0 {
            break;
        }
        let offset = cur.position() as u32;
        let tag = cur.read_u8()?;
        let decoded = match tag {
            LIT_TABLE_STRING => {
                let len = cur.read_u16()? as usize;
                let bytes = cur.read_bytes(len)?;
                DecodedLiteral::String(String::from_utf8_lossy(bytes).into_owned())
            }
            LIT_TABLE_NUMBER => DecodedLiteral::Number(cur.read_f64()?),
            LIT_TABLE_BIGINT => {
                let sign_size = cur.read_u32()?;
                let negative = sign_size & (1 << 31) != 0;
                let size = (sign_size & !(1 << 31)) as usize;
                let mut digits = Vec::with_capacity(size);
                for _ in 0..size {
                    digits.push(cur.read_u32()?);
                }
                DecodedLiteral::Bigint(BigintDigits { negative, digits })
            }
            _ => return Err(SnapshotError::InvalidSnapshotFormat),
        };
        out.insert(offset, decoded);
    }
    Ok(out)
}
