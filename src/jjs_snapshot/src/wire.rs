//! Wire-level tag bytes shared by the save, load, and merge paths (spec
//! §3 "Snapshot image": literal slots are "tagged values with type bits").
//! The C original packs type bits into the high bits of a 32-bit word;
//! here each literal reference is an explicit `(tag: u8, payload: u32)`
//! pair, a more literal rendering of spec §9's "Tagged union of literals"
//! note applied to the wire format, not just the in-memory one.

use jjs_bytecode::FunctionKind;

/// Literal-slot tags for entries in a record's `[0, const_literal_end)`
/// range.
pub const TAG_EMPTY: u8 = 0;
pub const TAG_SMALL_INT: u8 = 1;
pub const TAG_STRING: u8 = 2;
pub const TAG_NUMBER: u8 = 3;
pub const TAG_BIGINT: u8 = 4;

/// Literal-slot tags for entries in a record's `[const_literal_end,
/// literal_end)` range (spec: "nested compiled-code literal slots").
pub const TAG_NESTED_FUNCTION: u8 = 0;
pub const TAG_NESTED_REGEXP: u8 = 1;

/// Literal-table entry tags (spec §3 "literal table" diagram: `STRING=0,
/// NUMBER=1, BIGINT=2`).
pub const LIT_TABLE_STRING: u8 = 0;
pub const LIT_TABLE_NUMBER: u8 = 1;
pub const LIT_TABLE_BIGINT: u8 = 2;

/// Whole-record discriminator: an ordinary function record vs. a regexp
/// leaf (spec §4.7 "Regexp leaves serialise as `{ compiled_code_header,
/// pattern_utf8_bytes }`").
pub const RECORD_FUNCTION: u8 = 0;
pub const RECORD_REGEXP: u8 = 1;

pub fn kind_to_u8(kind: FunctionKind) -> u8 {
    match kind {
        FunctionKind::Script => 0,
        FunctionKind::Normal => 1,
        FunctionKind::Arrow => 2,
        FunctionKind::Generator => 3,
        FunctionKind::Async => 4,
        FunctionKind::AsyncGenerator => 5,
        FunctionKind::Accessor => 6,
        FunctionKind::Constructor => 7,
        FunctionKind::Method => 8,
        FunctionKind::ClassStaticBlock => 9,
    }
}

pub fn kind_from_u8(v: u8) -> Option<FunctionKind> {
    Some(match v {
        0 => FunctionKind::Script,
        1 => FunctionKind::Normal,
        2 => FunctionKind::Arrow,
        3 => FunctionKind::Generator,
        4 => FunctionKind::Async,
        5 => FunctionKind::AsyncGenerator,
        6 => FunctionKind::Accessor,
        7 => FunctionKind::Constructor,
        8 => FunctionKind::Method,
        9 => FunctionKind::ClassStaticBlock,
        _ => return None,
    })
}
