//! The opcode model (spec §4.4): two disjoint byte spaces -- basic
//! opcodes, and extended opcodes behind an `EXT_OPCODE` prefix byte --
//! each basic/extended opcode carrying static flag bits describing its
//! operand shape. Generalises `bsharp_vm_ir::instr::IrInstr`'s
//! instruction enum (there, a typed Rust enum with named fields) into
//! the flatter byte-oriented encoding a real byte-code stream needs:
//! flags drive encoding/decoding instead of pattern matching on enum
//! variants.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The prefix byte marking "the next byte selects an extended opcode"
/// (spec §4.4).
pub const EXT_OPCODE_PREFIX: u8 = 0xff;

/// High bit set on an emitted opcode byte to mark "this instruction has
/// a branch argument pending resolution" (spec: "marked by setting the
/// high bit on the opcode byte during emission").
pub const BRANCH_MARK_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BasicOpcode {
    Nop = 0,
    PushLiteral = 1,
    PushTwoLiterals = 2,
    PushThreeLiterals = 3,
    Pop = 4,
    Add = 5,
    Sub = 6,
    Mul = 7,
    Div = 8,
    Mod = 9,
    Neg = 10,
    Not = 11,
    Eq = 12,
    StrictEq = 13,
    Lt = 14,
    Gt = 15,
    Jump = 16,
    JumpBackward = 17,
    JumpIfTrue = 18,
    JumpIfTrueBackward = 19,
    JumpIfFalse = 20,
    JumpIfFalseBackward = 21,
    Call = 22,
    Return = 23,
    ReturnFunctionEnd = 24,
    AssignSetIdent = 25,
    MovIdent = 26,
    PostIncr = 27,
    PreIncr = 28,
    PostDecr = 29,
    PreDecr = 30,
    PushRestObject = 31,
    /// Short jump variants written back by branch resolution when the
    /// offset fits in one byte (spec: "rewrites the opcode to the
    /// shorter variant").
    JumpShort = 32,
    JumpBackwardShort = 33,
    /// Pushes a register's current value. The counterpart read to
    /// `MovIdent`'s write, needed once the parser emits expressions that
    /// reference an already-bound identifier.
    PushRegister = 34,
    /// Duplicates the top of the evaluation stack, used by logical
    /// short-circuit operators (`&&`, `||`, `??`) to test-then-keep a
    /// value without re-evaluating its expression.
    Dup = 35,
    Throw = 36,
    TypeOf = 37,
    Void = 38,
    Delete = 39,
    InstanceOf = 40,
    In = 41,
    BitAnd = 42,
    BitOr = 43,
    BitXor = 44,
    Shl = 45,
    Shr = 46,
    Sar = 47,
    NotEq = 48,
    NotStrictEq = 49,
    LtEq = 50,
    GtEq = 51,
    /// `new Target(args...)`; byte arg is the argument count, mirroring
    /// `Call`.
    New = 52,
    /// Reads a named property off the object on top of the stack;
    /// literal arg is the property-name literal index.
    GetProp = 53,
    /// Pops a value then an object, writes the value to the named
    /// property, and pushes the object back (so a chain of member
    /// assignments, e.g. class member installation, can keep operating
    /// on the same target without re-fetching it).
    SetProp = 54,
    /// As `GetProp`/`SetProp`, but the property key is itself a
    /// evaluated expression already on the stack rather than a literal.
    GetElem = 55,
    SetElem = 56,
    /// Byte arg is the element count; pops that many values and pushes
    /// one array value.
    CreateArray = 57,
    /// Byte arg is the key/value pair count; pops `2 * count` values
    /// (key, value, key, value, ...) and pushes one object value.
    CreateObject = 58,
    PushThis = 59,
    PushUndefined = 60,
    PushNull = 61,
    PushTrue = 62,
    PushFalse = 63,
    /// Marks the value just pushed as a spread element for the
    /// enclosing `CreateArray`/`Call`/`New` to splice rather than place
    /// positionally.
    Spread = 64,
    /// Concatenates `arg` values already pushed (a template literal's
    /// cooked spans and substitution expressions, interleaved) into one
    /// string.
    ConcatTemplate = 65,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ExtOpcode {
    TryCreateContext = 0,
    TryEnd = 1,
    AsyncExit = 2,
    PushClosure = 3,
    CreateClass = 4,
    /// Advances a `for-in` enumerator; branch arg is where to jump once
    /// the enumerator is exhausted.
    ForInGetNext = 5,
    /// Advances a `for-of` iterator; branch arg is where to jump once
    /// the iterator is exhausted.
    ForOfGetNext = 6,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpcodeFlags: u16 {
        const HAS_LITERAL_ARG      = 1 << 0;
        const HAS_LITERAL_ARG2     = 1 << 1;
        const HAS_BYTE_ARG         = 1 << 2;
        const POP_STACK_BYTE_ARG   = 1 << 3;
        const HAS_BRANCH_ARG       = 1 << 4;
        const BRANCH_IS_FORWARD    = 1 << 5;
    }
}

/// Static metadata describing an opcode's operand shape (spec §4.4:
/// "each opcode carries static flag bits"). `stack_adjust` is signed and
/// biased the way the spec describes, stored here as a plain `i8` since
/// Rust has no trouble with signed fields.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub flags: OpcodeFlags,
    pub stack_adjust: i8,
}

pub fn basic_opcode_info(op: BasicOpcode) -> OpcodeInfo {
    use BasicOpcode::*;
    use OpcodeFlags as F;
    match op {
        Nop => OpcodeInfo { flags: F::empty(), stack_adjust: 0 },
        PushLiteral => OpcodeInfo { flags: F::HAS_LITERAL_ARG, stack_adjust: 1 },
        PushTwoLiterals => OpcodeInfo { flags: F::HAS_LITERAL_ARG | F::HAS_LITERAL_ARG2, stack_adjust: 2 },
        PushThreeLiterals => {
            OpcodeInfo { flags: F::HAS_LITERAL_ARG | F::HAS_LITERAL_ARG2 | F::HAS_BYTE_ARG, stack_adjust: 3 }
        }
        Pop => OpcodeInfo { flags: F::empty(), stack_adjust: -1 },
        Add | Sub | Mul | Div | Mod | Eq | StrictEq | Lt | Gt => {
            OpcodeInfo { flags: F::empty(), stack_adjust: -1 }
        }
        Neg | Not => OpcodeInfo { flags: F::empty(), stack_adjust: 0 },
        Jump => OpcodeInfo { flags: F::HAS_BRANCH_ARG | F::BRANCH_IS_FORWARD, stack_adjust: 0 },
        JumpBackward => OpcodeInfo { flags: F::HAS_BRANCH_ARG, stack_adjust: 0 },
        JumpShort => OpcodeInfo { flags: F::HAS_BRANCH_ARG | F::BRANCH_IS_FORWARD, stack_adjust: 0 },
        JumpBackwardShort => OpcodeInfo { flags: F::HAS_BRANCH_ARG, stack_adjust: 0 },
        JumpIfTrue | JumpIfFalse => {
            OpcodeInfo { flags: F::HAS_BRANCH_ARG | F::BRANCH_IS_FORWARD, stack_adjust: -1 }
        }
        JumpIfTrueBackward | JumpIfFalseBackward => {
            OpcodeInfo { flags: F::HAS_BRANCH_ARG, stack_adjust: -1 }
        }
        Call => OpcodeInfo { flags: F::HAS_BYTE_ARG | F::POP_STACK_BYTE_ARG, stack_adjust: 0 },
        Return | ReturnFunctionEnd => OpcodeInfo { flags: F::empty(), stack_adjust: -1 },
        AssignSetIdent => OpcodeInfo { flags: F::HAS_LITERAL_ARG, stack_adjust: -1 },
        MovIdent => OpcodeInfo { flags: F::HAS_BYTE_ARG, stack_adjust: -1 },
        PostIncr | PreIncr | PostDecr | PreDecr => OpcodeInfo { flags: F::empty(), stack_adjust: 0 },
        PushRestObject => OpcodeInfo { flags: F::empty(), stack_adjust: 1 },
        PushRegister => OpcodeInfo { flags: F::HAS_BYTE_ARG, stack_adjust: 1 },
        Dup => OpcodeInfo { flags: F::empty(), stack_adjust: 1 },
        Throw => OpcodeInfo { flags: F::empty(), stack_adjust: -1 },
        TypeOf | Void | Delete => OpcodeInfo { flags: F::empty(), stack_adjust: 0 },
        InstanceOf | In | BitAnd | BitOr | BitXor | Shl | Shr | Sar | NotEq | NotStrictEq | LtEq | GtEq => {
            OpcodeInfo { flags: F::empty(), stack_adjust: -1 }
        }
        New => OpcodeInfo { flags: F::HAS_BYTE_ARG | F::POP_STACK_BYTE_ARG, stack_adjust: 0 },
        GetProp => OpcodeInfo { flags: F::HAS_LITERAL_ARG, stack_adjust: 0 },
        SetProp => OpcodeInfo { flags: F::HAS_LITERAL_ARG, stack_adjust: -1 },
        GetElem => OpcodeInfo { flags: F::empty(), stack_adjust: -1 },
        SetElem => OpcodeInfo { flags: F::empty(), stack_adjust: -2 },
        CreateArray | CreateObject => OpcodeInfo { flags: F::HAS_BYTE_ARG | F::POP_STACK_BYTE_ARG, stack_adjust: 1 },
        PushThis | PushUndefined | PushNull | PushTrue | PushFalse => {
            OpcodeInfo { flags: F::empty(), stack_adjust: 1 }
        }
        Spread => OpcodeInfo { flags: F::empty(), stack_adjust: 0 },
        ConcatTemplate => OpcodeInfo { flags: F::HAS_BYTE_ARG | F::POP_STACK_BYTE_ARG, stack_adjust: 1 },
    }
}

impl BasicOpcode {
    pub fn is_branch(self) -> bool {
        basic_opcode_info(self).flags.contains(OpcodeFlags::HAS_BRANCH_ARG)
    }

    pub fn is_forward_branch(self) -> bool {
        basic_opcode_info(self).flags.contains(OpcodeFlags::BRANCH_IS_FORWARD)
    }

    /// The opcode's shortened form, written back during branch
    /// resolution once the final delta is known to fit in one byte.
    pub fn shortened(self) -> Option<BasicOpcode> {
        match self {
            BasicOpcode::Jump => Some(BasicOpcode::JumpShort),
            BasicOpcode::JumpBackward => Some(BasicOpcode::JumpBackwardShort),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_opcode_byte_round_trips() {
        let byte: u8 = BasicOpcode::PushLiteral.into();
        assert_eq!(BasicOpcode::try_from(byte).unwrap(), BasicOpcode::PushLiteral);
    }

    #[test]
    fn unknown_byte_fails_conversion() {
        assert!(BasicOpcode::try_from(250u8).is_err());
    }

    #[test]
    fn push_two_literals_has_both_literal_flags() {
        let info = basic_opcode_info(BasicOpcode::PushTwoLiterals);
        assert!(info.flags.contains(OpcodeFlags::HAS_LITERAL_ARG));
        assert!(info.flags.contains(OpcodeFlags::HAS_LITERAL_ARG2));
    }
}
