//! Engine-global literal storage (spec §4.2): O(1) interning for every
//! literal string, number, and bigint. Grounded on the tagged-literal
//! union in `bsharp_vm_ir::module::IrConstant`, generalised here into
//! three separate intern arenas plus the hashset/linear-scan lookup
//! structures the spec requires.
//!
//! Three "intrusive singly linked chunks" in the C original become three
//! plain `Vec`s: entries never move once pushed, so an index handed out by
//! `find_or_create_*` stays valid for the storage's whole lifetime (spec:
//! "entries live until context teardown").

use std::collections::HashMap;

use crate::error::LiteralResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumberId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BigintId(pub u32);

#[derive(Debug, Clone)]
pub struct BigintDigits {
    pub negative: bool,
    pub digits: Vec<u32>,
}

impl PartialEq for BigintDigits {
    fn eq(&self, other: &Self) -> bool {
        self.negative == other.negative && self.digits == other.digits
    }
}
impl Eq for BigintDigits {}

/// Smallest/largest value representable by `Value::SmallInt` without
/// falling back to an interned heap number (spec §3's "direct-integer
/// range"). Mirrors JerryScript's ECMA_INTEGER_NUMBER range, scaled down
/// to fit comfortably in `i32`.
///
/// This range governs two independent things that happen to share one
/// constant: the runtime `Value::SmallInt` representation (no arena
/// slot), and the snapshot wire format's `TAG_SMALL_INT` literal slot
/// (`jjs_snapshot::wire`), which writes the value inline in the
/// functions region instead of allocating a literal-table entry tagged
/// `TAG_NUMBER`. A numeric literal token in the direct range -- `42`,
/// say -- therefore never reaches the literal table at all; only a
/// literal outside the range (or one produced at runtime and boxed)
/// goes through `TAG_NUMBER` with a literal-table offset.
pub const DIRECT_INT_MIN: i64 = -(1 << 24);
pub const DIRECT_INT_MAX: i64 = (1 << 24) - 1;

#[derive(Debug, Clone, PartialEq)]
pub enum NumberLiteral {
    Direct(i32),
    Heap(f64),
}

#[derive(Default)]
pub struct LiteralStorage {
    strings: Vec<String>,
    string_index: HashMap<Box<[u8]>, StringId>,
    /// Secondary index satisfying the "numeric-string parity" invariant
    /// (spec §8): a decimal 32-bit unsigned integer's canonical string is
    /// reachable both by interning the string and by formatting the
    /// number.
    numeric_string_index: HashMap<u32, StringId>,

    numbers: Vec<f64>,

    bigints: Vec<BigintDigits>,
}

impl LiteralStorage {
    pub fn new() -> LiteralStorage {
        LiteralStorage::default()
    }

    /// Looks up by raw byte sequence; inserts on miss. Ownership of the
    /// returned id is the pool's alone -- callers never free it (spec
    /// §4.2).
    pub fn find_or_create_string(&mut self, bytes: &[u8]) -> LiteralResult<StringId> {
        if let Some(&id) = self.string_index.get(bytes) {
            return Ok(id);
        }
        let s = String::from_utf8_lossy(bytes).into_owned();
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s);
        self.string_index.insert(bytes.into(), id);
        if let Some(n) = canonical_decimal_u32(bytes) {
            self.numeric_string_index.entry(n).or_insert(id);
        }
        Ok(id)
    }

    pub fn get_string(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    /// Finds the string id for a string already known to be interned,
    /// without inserting. Used by invariant tests.
    pub fn lookup_string(&self, bytes: &[u8]) -> Option<StringId> {
        self.string_index.get(bytes).copied()
    }

    /// Finds (or creates, via the decimal formatting path) the canonical
    /// string literal for a 32-bit unsigned integer, satisfying
    /// "either direction of lookup finds the same entry" (spec §8).
    pub fn find_or_create_string_for_u32(&mut self, n: u32) -> StringId {
        if let Some(&id) = self.numeric_string_index.get(&n) {
            return id;
        }
        let s = n.to_string();
        self.find_or_create_string(s.as_bytes())
            .expect("interning a freshly formatted decimal string cannot fail")
    }

    /// If `x` fits the direct-integer range, no allocation happens and the
    /// literal is returned by value; otherwise the number list is scanned
    /// linearly for an existing match before allocating (spec §4.2).
    pub fn find_or_create_number(&mut self, x: f64) -> NumberLiteral {
        if x.fract() == 0.0 && x.is_finite() {
            let as_i64 = x as i64;
            if (as_i64 as f64) == x && (DIRECT_INT_MIN..=DIRECT_INT_MAX).contains(&as_i64) {
                return NumberLiteral::Direct(as_i64 as i32);
            }
        }
        NumberLiteral::Heap(self.intern_heap_number(x))
    }

    fn intern_heap_number(&mut self, x: f64) -> f64 {
        for existing in &self.numbers {
            if bits_eq(*existing, x) {
                return *existing;
            }
        }
        self.numbers.push(x);
        x
    }

    pub fn number_id_of(&self, x: f64) -> Option<NumberId> {
        self.numbers.iter().position(|n| bits_eq(*n, x)).map(|i| NumberId(i as u32))
    }

    pub fn get_number(&self, id: NumberId) -> f64 {
        self.numbers[id.0 as usize]
    }

    pub fn find_or_create_bigint(&mut self, negative: bool, digits: Vec<u32>) -> BigintId {
        let candidate = BigintDigits { negative, digits };
        if let Some(pos) = self.bigints.iter().position(|b| *b == candidate) {
            return BigintId(pos as u32);
        }
        let id = BigintId(self.bigints.len() as u32);
        self.bigints.push(candidate);
        id
    }

    pub fn get_bigint(&self, id: BigintId) -> &BigintDigits {
        &self.bigints[id.0 as usize]
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }
}

fn bits_eq(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}

/// Parses `bytes` as the canonical decimal representation of a `u32`:
/// no leading zero (other than "0" itself), no sign, ASCII digits only.
/// This mirrors JerryScript's `ecma_string_to_array_index` fast path.
fn canonical_decimal_u32(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    if bytes[0] == b'0' && bytes.len() > 1 {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_identical_bytes_yields_the_same_id() {
        let mut storage = LiteralStorage::new();
        let a = storage.find_or_create_string(b"hello").unwrap();
        let b = storage.find_or_create_string(b"hello").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn numeric_string_parity_both_directions() {
        let mut storage = LiteralStorage::new();
        let via_string = storage.find_or_create_string(b"123").unwrap();
        let via_number = storage.find_or_create_string_for_u32(123);
        assert_eq!(via_string, via_number);
    }

    #[test]
    fn leading_zero_is_not_canonical() {
        let mut storage = LiteralStorage::new();
        let a = storage.find_or_create_string(b"007").unwrap();
        let b = storage.find_or_create_string_for_u32(7);
        assert_ne!(a, b);
    }

    #[test]
    fn small_integers_never_allocate_a_heap_number() {
        let mut storage = LiteralStorage::new();
        match storage.find_or_create_number(42.0) {
            NumberLiteral::Direct(42) => {}
            other => panic!("expected Direct(42), got {other:?}"),
        }
        assert_eq!(storage.numbers.len(), 0);
    }

    #[test]
    fn large_numbers_are_deduplicated() {
        let mut storage = LiteralStorage::new();
        let big = 1.0e300;
        let a = storage.find_or_create_number(big);
        let b = storage.find_or_create_number(big);
        assert_eq!(a, b);
        assert_eq!(storage.numbers.len(), 1);
    }

    #[test]
    fn bigints_compare_digit_by_digit() {
        let mut storage = LiteralStorage::new();
        let a = storage.find_or_create_bigint(false, vec![1, 2, 3]);
        let b = storage.find_or_create_bigint(false, vec![1, 2, 3]);
        let c = storage.find_or_create_bigint(true, vec![1, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
