//! Regexp byte-code opcodes (spec §4.6): a separate opcode space from
//! the main [`jjs_bytecode`] one, with its own quantifier-count bias
//! and integer-encoding scheme.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Quantifier repeat counts are biased by this offset so that the
/// common "unbounded" case (`max == None`) can be represented as `0`
/// without colliding with a real small count.
pub const RE_QMAX_OFFSET: u32 = 1;

/// Integers up to this value are encoded in a single byte; anything
/// larger uses the 5-byte marker form (marker byte + 4-byte
/// big-endian value).
pub const RE_SMALL_INT_MAX: u32 = 0xFE;

/// Marker byte preceding a 4-byte big-endian integer.
pub const RE_WIDE_INT_MARKER: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RegexOpcode {
    Char = 0,
    Period,
    Class,
    ClassEscape,
    StartOfInput,
    EndOfInput,
    WordBoundary,
    NotWordBoundary,
    SaveStart,
    SaveEnd,
    Backreference,
    Alternative,
    Jump,
    Lookahead,
    NegLookahead,
    Quantifier,
    QuantifierLazy,
    Match,
}

/// Encodes an unsigned integer using the small-int/wide-int scheme
/// described above, writing into `out`.
pub fn encode_int(value: u32, out: &mut Vec<u8>) {
    if value <= RE_SMALL_INT_MAX {
        out.push(value as u8);
    } else {
        out.push(RE_WIDE_INT_MARKER);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// Decodes an integer encoded by [`encode_int`] starting at `pos`,
/// returning the value and the number of bytes consumed.
pub fn decode_int(bytes: &[u8], pos: usize) -> Option<(u32, usize)> {
    let marker = *bytes.get(pos)?;
    if marker == RE_WIDE_INT_MARKER {
        let word = bytes.get(pos + 1..pos + 5)?;
        let value = u32::from_be_bytes(word.try_into().ok()?);
        Some((value, 5))
    } else {
        Some((marker as u32, 1))
    }
}

/// Encodes a quantifier's `max` repeat count (`None` = unbounded, the
/// reserved `0` sentinel).
pub fn encode_qmax(max: Option<u32>, out: &mut Vec<u8>) {
    match max {
        None => encode_int(0, out),
        Some(n) => encode_int(n + RE_QMAX_OFFSET, out),
    }
}

pub fn decode_qmax(bytes: &[u8], pos: usize) -> Option<(Option<u32>, usize)> {
    let (raw, len) = decode_int(bytes, pos)?;
    Some((if raw == 0 { None } else { Some(raw - RE_QMAX_OFFSET) }, len))
}

/// A forward offset is stored as a delta counted from the byte
/// immediately after the offset field itself (spec §4.6).
pub fn encode_offset(delta: i32, out: &mut Vec<u8>) {
    out.extend_from_slice(&delta.to_be_bytes());
}

pub fn decode_offset(bytes: &[u8], pos: usize) -> Option<i32> {
    let word = bytes.get(pos..pos + 4)?;
    Some(i32::from_be_bytes(word.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_int_round_trips_in_one_byte() {
        let mut buf = Vec::new();
        encode_int(42, &mut buf);
        assert_eq!(buf.len(), 1);
        assert_eq!(decode_int(&buf, 0), Some((42, 1)));
    }

    #[test]
    fn wide_int_round_trips_in_five_bytes() {
        let mut buf = Vec::new();
        encode_int(100_000, &mut buf);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], RE_WIDE_INT_MARKER);
        assert_eq!(decode_int(&buf, 0), Some((100_000, 5)));
    }

    #[test]
    fn unbounded_qmax_round_trips_as_none() {
        let mut buf = Vec::new();
        encode_qmax(None, &mut buf);
        assert_eq!(decode_qmax(&buf, 0), Some((None, 1)));
    }

    #[test]
    fn bounded_qmax_round_trips() {
        let mut buf = Vec::new();
        encode_qmax(Some(3), &mut buf);
        assert_eq!(decode_qmax(&buf, 0), Some((Some(3), 1)));
    }
}
