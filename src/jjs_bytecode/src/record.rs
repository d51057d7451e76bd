//! The compiled-code record and its owning script record (spec §3 "Data
//! model"). Grounded on `bsharp_vm_ir::module::{IrModule, IrFunction}`,
//! generalised from a typed IR function into the header-plus-tail shape
//! the spec's binary layout requires, and on the "arena + index" mapping
//! from SPEC_FULL.md/DESIGN NOTES §9: a script owns a flat `Vec` of
//! records; nested-function literal slots are indices into that arena, not
//! raw references, so a record can reference itself (a named function
//! expression binding its own name) without an `Rc` cycle.

use bitflags::bitflags;

use jjs_literal::{BigintId, NumberId, StringId};

/// Index into a `ScriptRecord`'s function arena. `LiteralSlot::CompiledCode`
/// holding the arena index of the record that contains it *is* the
/// self-reference case (spec §9 "Self-reference is expressible as
/// `Some(current_index)`"; here expressed without the `Option` wrapper
/// since the arena index space has no other sentinel use).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FuncIndex(pub u32);

/// Function-kind subfield of `status_flags` (spec §3): a closed set of
/// mutually exclusive categories, modelled as an enum rather than more
/// flag bits since at most one applies to any record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Script,
    Normal,
    Arrow,
    Generator,
    Async,
    AsyncGenerator,
    Accessor,
    Constructor,
    Method,
    ClassStaticBlock,
}

bitflags! {
    /// Boolean subfields of `status_flags` (spec §3), excluding the
    /// function-kind subfield which is its own enum above.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u16 {
        const HAS_TAGGED_LITERALS      = 1 << 0;
        const UINT16_ARGUMENTS         = 1 << 1;
        const STRICT                   = 1 << 2;
        const MAPPED_ARGUMENTS_NEEDED  = 1 << 3;
        const LEXICAL_BLOCK_NEEDED     = 1 << 4;
        const USES_LINE_INFO           = 1 << 5;
        const STATIC_SNAPSHOT          = 1 << 6;
        const DEBUGGER_IGNORE          = 1 << 7;
        const HAS_EXTENDED_INFO        = 1 << 8;
    }
}

/// A literal-table slot (spec §9 "Tagged union of literals"), replacing
/// the C original's bit-packed tagged value with an explicit sum type.
/// `CompiledCode` holds an arena index rather than a pointer/reference.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralSlot {
    Empty,
    SmallInt(i32),
    HeapNumber(NumberId),
    String(StringId),
    BigInt(BigintId),
    CompiledCode(FuncIndex),
    /// A nested regexp literal, stored by its own record's arena index
    /// (its record holds pattern bytes + flags, see `jjs_regexp`'s
    /// byte-code as the record's `bytecode` field).
    Regexp(FuncIndex),
}

#[derive(Debug, Clone, Default)]
pub struct ExtendedInfo {
    pub argument_length: u16,
    pub source_range: (u32, u32),
}

#[derive(Debug, Clone, Copy)]
pub struct LineInfoEntry {
    pub bytecode_offset: u32,
    pub source_line: u32,
}

/// Tail "serialisable values" (spec §3): mapped-argument names, function
/// name, tagged-template pointer, line-info, extended info -- present
/// only when the corresponding `StatusFlags`/`has-*` bit is set.
#[derive(Debug, Clone, Default)]
pub struct CompiledCodeTail {
    pub mapped_argument_names: Option<Vec<StringId>>,
    pub function_name: Option<StringId>,
    /// Arena index of a synthetic record holding the tagged-template
    /// cooked/raw string arrays; out of scope in detail, see spec §4.7
    /// "Reject ... whose compiled-code has no tagged templates" for
    /// snapshot's treatment.
    pub tagged_template_literal: Option<FuncIndex>,
    pub line_info: Option<Vec<LineInfoEntry>>,
    pub extended_info: Option<ExtendedInfo>,
}

/// Marks a record as a regexp leaf rather than a function (spec §4.6,
/// §4.7 "Regexp leaves serialise as `{ compiled_code_header,
/// pattern_utf8_bytes }`"). Kept as an explicit field rather than
/// repurposing `refs` as the C original does -- `refs` keeps its normal
/// refcounting meaning in this record's in-memory lifetime; only the
/// snapshot codec's on-disk encoding repurposes a `refs`-shaped slot as
/// a byte length, and it does so at write time rather than by lying
/// about what this struct's field means.
#[derive(Debug, Clone)]
pub struct RegexpMeta {
    pub pattern: StringId,
    pub flags: u8,
}

/// The compiled-code record (spec §3). Header fields keep the spec's
/// names; `register_end..ident_end..const_literal_end..literal_end`
/// invariant is checked by `validate_literal_ranges`.
#[derive(Debug, Clone)]
pub struct CompiledCodeRecord {
    pub kind: FunctionKind,
    pub flags: StatusFlags,
    pub stack_limit: u16,
    pub register_end: u16,
    pub argument_end: u16,
    pub ident_end: u16,
    pub const_literal_end: u16,
    pub literal_end: u16,
    /// Present only for a regexp leaf (spec §4.6/§4.7); `None` for every
    /// ordinary function record.
    pub regexp: Option<RegexpMeta>,
    pub literals: Vec<LiteralSlot>,
    pub bytecode: Vec<u8>,
    pub tail: CompiledCodeTail,
    /// Reference count (spec §3 "Ownership"): counts lexical holders
    /// beyond the one owning script. Decrementing to zero must release
    /// any nested compiled-code the record references.
    pub refs: u16,
}

#[derive(Debug)]
pub enum RecordError {
    LiteralRangesOutOfOrder,
}

impl CompiledCodeRecord {
    /// Checks spec §3's `register_end ≤ ident_end ≤ const_literal_end ≤
    /// literal_end` invariant.
    pub fn validate_literal_ranges(&self) -> Result<(), RecordError> {
        if self.register_end <= self.ident_end
            && self.ident_end <= self.const_literal_end
            && self.const_literal_end <= self.literal_end
        {
            Ok(())
        } else {
            Err(RecordError::LiteralRangesOutOfOrder)
        }
    }

    /// Nested compiled-code literal slots: `[const_literal_end,
    /// literal_end)` (spec §3). Used by refcount release and by the
    /// snapshot codec's depth-first walk.
    pub fn nested_function_slots(&self) -> impl Iterator<Item = FuncIndex> + '_ {
        self.literals[self.const_literal_end as usize..self.literal_end as usize].iter().filter_map(|slot| {
            match slot {
                LiteralSlot::CompiledCode(idx) | LiteralSlot::Regexp(idx) => Some(*idx),
                _ => None,
            }
        })
    }
}

bitflags! {
    /// Script record refs-and-type bit flags (spec §3), packed alongside
    /// a 30-bit refcount in the original; kept as a separate field here
    /// since Rust has no trouble with an explicit `refs: u32`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScriptFlags: u8 {
        const EVAL_CODE             = 1 << 0;
        const HAS_FUNCTION_ARGUMENTS = 1 << 1;
        const HAS_USER_VALUE        = 1 << 2;
        const HAS_IMPORT_META       = 1 << 3;
        const STATIC                = 1 << 4;
    }
}

/// The script record (spec §3): owns the compiled-code tree produced by
/// one parse invocation as a flat arena, plus optional trailing slots.
#[derive(Debug, Clone, Default)]
pub struct ScriptRecord {
    pub flags: ScriptFlags,
    pub refs: u32,
    pub source_name: String,
    /// Flat arena of every compiled-code record reachable from this
    /// parse. `entry` is the top-level script/function's index.
    pub functions: Vec<CompiledCodeRecord>,
    pub entry: FuncIndex,
    /// For `new Function(...)`: the synthesized argument-list string.
    pub argument_list: Option<String>,
    /// Present when `HAS_IMPORT_META` is set; opaque to this crate.
    pub has_import_meta_object: bool,
}

impl ScriptRecord {
    pub fn push_function(&mut self, record: CompiledCodeRecord) -> FuncIndex {
        let idx = FuncIndex(self.functions.len() as u32);
        self.functions.push(record);
        idx
    }

    pub fn get(&self, idx: FuncIndex) -> &CompiledCodeRecord {
        &self.functions[idx.0 as usize]
    }

    pub fn get_mut(&mut self, idx: FuncIndex) -> &mut CompiledCodeRecord {
        &mut self.functions[idx.0 as usize]
    }

    /// Releases `idx`'s refcount, recursively releasing nested
    /// compiled-code slots once a record's `refs` reaches zero (spec §3
    /// "Decrement to zero must release any nested compiled-code records
    /// it references"). Self-references (a record nesting its own arena
    /// index) are skipped to avoid decrementing past zero.
    pub fn dec_ref(&mut self, idx: FuncIndex) {
        let nested: Vec<FuncIndex> = {
            let record = self.get_mut(idx);
            if record.refs > 0 {
                record.refs -= 1;
            }
            if record.refs != 0 {
                return;
            }
            record.nested_function_slots().filter(|n| *n != idx).collect()
        };
        for n in nested {
            self.dec_ref(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn literal_ranges_out_of_order_is_rejected() {
        let mut r = empty_record();
        r.ident_end = 5;
        r.register_end = 6;
        assert!(r.validate_literal_ranges().is_err());
    }

    #[test]
    fn self_referencing_record_does_not_double_free() {
        let mut script = ScriptRecord::default();
        let mut r = empty_record();
        r.const_literal_end = 0;
        r.literal_end = 1;
        r.literals.push(LiteralSlot::Empty);
        let idx = script.push_function(r);
        // Patch in the self-reference now that the index is known.
        script.get_mut(idx).literals[0] = LiteralSlot::CompiledCode(idx);
        script.dec_ref(idx);
        assert_eq!(script.get(idx).refs, 0);
    }

    #[test]
    fn dec_ref_cascades_to_nested_functions() {
        let mut script = ScriptRecord::default();
        let mut child = empty_record();
        child.refs = 1;
        let child_idx = script.push_function(child);

        let mut parent = empty_record();
        parent.const_literal_end = 0;
        parent.literal_end = 1;
        parent.literals.push(LiteralSlot::CompiledCode(child_idx));
        parent.refs = 1;
        let parent_idx = script.push_function(parent);

        script.dec_ref(parent_idx);
        assert_eq!(script.get(parent_idx).refs, 0);
        assert_eq!(script.get(child_idx).refs, 0);
    }
}
