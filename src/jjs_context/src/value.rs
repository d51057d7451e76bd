//! The tagged `Value` used throughout the engine (spec §3 "Value").
//!
//! The C original packs tag + payload into one 32-bit word. Here the tag
//! lives in the enum discriminant and payloads that previously lived in a
//! compressed pointer become a `CompressedPtr` index into whichever arena
//! the tag implies (heap objects vs. interned literals) -- see DESIGN.md's
//! "Tagged union of literals" note.

use std::fmt;

/// Offset into a single aligned arena. `0` is reserved for NULL and is
/// never handed out by an allocator (spec §3 "Compressed pointer").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompressedPtr(u32);

impl CompressedPtr {
    pub const NULL: CompressedPtr = CompressedPtr(0);

    /// Builds a pointer from a zero-based arena index, reserving offset 0.
    pub fn from_index(index: u32) -> CompressedPtr {
        CompressedPtr(index.checked_add(1).expect("compressed pointer overflow"))
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn as_index(self) -> Option<u32> {
        self.0.checked_sub(1)
    }
}

impl fmt::Display for CompressedPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cp:{:#x}", self.0)
    }
}

/// Maximum number of ASCII bytes packed directly into a `Value::ShortString`
/// without touching the heap.
pub const DIRECT_STRING_MAX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortString {
    len: u8,
    bytes: [u8; DIRECT_STRING_MAX_LEN],
}

impl ShortString {
    pub fn try_pack(s: &str) -> Option<ShortString> {
        if s.len() > DIRECT_STRING_MAX_LEN || !s.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; DIRECT_STRING_MAX_LEN];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Some(ShortString { len: s.len() as u8, bytes })
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

/// The tagged value. Singleton tags (`Undefined`/`Null`/`True`/`False`)
/// have no payload; `Empty` and `NotFound` are internal sentinels never
/// observable from script (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    True,
    False,
    /// Internal sentinel distinct from `undefined`; never observable.
    Empty,
    /// Internal "property not found" sentinel.
    NotFound,
    SmallInt(i32),
    ShortString(ShortString),
    HeapNumber(CompressedPtr),
    String(CompressedPtr),
    Object(CompressedPtr),
    Symbol(CompressedPtr),
    Bigint(CompressedPtr),
    CompiledCode(CompressedPtr),
    /// Wraps any of the above with the exception bit set. Holders must
    /// propagate or explicitly clear (spec §3 "Exceptional results").
    Exception(Box<Value>),
}

impl Value {
    pub fn is_exception(&self) -> bool {
        matches!(self, Value::Exception(_))
    }

    /// Unwraps the payload of an exception value. Panics if not an
    /// exception -- callers must check `is_exception` first, mirroring the
    /// C API's `take_exception` discipline.
    pub fn take_exception(self) -> Value {
        match self {
            Value::Exception(inner) => *inner,
            other => panic!("take_exception called on non-exception value: {other:?}"),
        }
    }

    pub fn into_exception(self) -> Value {
        match self {
            Value::Exception(_) => self,
            other => Value::Exception(Box::new(other)),
        }
    }

    pub fn is_truthy_singleton(&self) -> Option<bool> {
        match self {
            Value::True => Some(true),
            Value::False => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::True => write!(f, "true"),
            Value::False => write!(f, "false"),
            Value::Empty => write!(f, "<empty>"),
            Value::NotFound => write!(f, "<not-found>"),
            Value::SmallInt(i) => write!(f, "{i}"),
            Value::ShortString(s) => write!(f, "{}", s.as_str()),
            Value::HeapNumber(p) => write!(f, "<number {p}>"),
            Value::String(p) => write!(f, "<string {p}>"),
            Value::Object(p) => write!(f, "<object {p}>"),
            Value::Symbol(p) => write!(f, "<symbol {p}>"),
            Value::Bigint(p) => write!(f, "<bigint {p}>"),
            Value::CompiledCode(p) => write!(f, "<compiled-code {p}>"),
            Value::Exception(inner) => write!(f, "<exception {inner}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_pointer_reserves_zero() {
        let p = CompressedPtr::from_index(0);
        assert!(!p.is_null());
        assert_eq!(p.as_index(), Some(0));
        assert!(CompressedPtr::NULL.is_null());
    }

    #[test]
    fn short_string_roundtrips_ascii() {
        let s = ShortString::try_pack("abcdef").unwrap();
        assert_eq!(s.as_str(), "abcdef");
        assert!(ShortString::try_pack("toolongstring").is_none());
        assert!(ShortString::try_pack("caf\u{e9}").is_none());
    }

    #[test]
    fn exception_bit_is_observable_only_via_is_exception() {
        let v = Value::SmallInt(42).into_exception();
        assert!(v.is_exception());
        assert_eq!(v.take_exception(), Value::SmallInt(42));
    }
}
