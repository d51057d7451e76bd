//! Byte-code emitter (spec §4.4): opcode model, page-chunked stream,
//! peephole fusion, and branch resolution.

pub mod emitter;
pub mod error;
pub mod ids;
pub mod opcode;
pub mod record;
pub mod stream;

pub use emitter::{compress_literal_index, FunctionEmitter, ScopeMapping, ONE_BYTE_LITERAL_THRESHOLD};
pub use error::{EmitError, EmitResult};
pub use ids::{FunctionId, LabelId, RegisterId, REGISTER_START, SCOPE_STACK_FUNC_SENTINEL};
pub use opcode::{basic_opcode_info, BasicOpcode, ExtOpcode, OpcodeFlags, OpcodeInfo, EXT_OPCODE_PREFIX};
pub use record::{
    CompiledCodeRecord, CompiledCodeTail, ExtendedInfo, FuncIndex, FunctionKind, LineInfoEntry,
    LiteralSlot, RecordError, RegexpMeta, ScriptFlags, ScriptRecord, StatusFlags,
};
pub use stream::PageStream;
