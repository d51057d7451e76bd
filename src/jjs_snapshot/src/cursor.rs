//! Byte-level reader over a snapshot image (spec §3 "little-endian,
//! aligned to 8 bytes"). Grounded on
//! `examples/messense-llvm-bitcode-rs`'s `bits::Cursor` -- buffer plus a
//! running offset, `Result`-returning reads that report an overflow
//! rather than panicking -- simplified from bit-granularity reads down
//! to the byte/2-byte-aligned reads this format actually uses.

use crate::error::{SnapshotError, SnapshotResult};

#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Cursor<'a> {
        Cursor { buffer, offset: 0 }
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, offset: usize) -> SnapshotResult<()> {
        if offset > self.buffer.len() {
            return Err(SnapshotError::InvalidSnapshotFormat);
        }
        self.offset = offset;
        Ok(())
    }

    fn take(&mut self, n: usize) -> SnapshotResult<&'a [u8]> {
        let end = self.offset.checked_add(n).ok_or(SnapshotError::InvalidSnapshotFormat)?;
        let bytes = self.buffer.get(self.offset..end).ok_or(SnapshotError::InvalidSnapshotFormat)?;
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> SnapshotResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> SnapshotResult<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().expect("exactly 2 bytes")))
    }

    pub fn read_u32(&mut self) -> SnapshotResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("exactly 4 bytes")))
    }

    pub fn read_f64(&mut self) -> SnapshotResult<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().expect("exactly 8 bytes")))
    }

    pub fn read_bytes(&mut self, n: usize) -> SnapshotResult<&'a [u8]> {
        self.take(n)
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }
}

/// Append-only little-endian byte writer, the save-side counterpart to
/// [`Cursor`]. Tracks its own position so callers can patch forward
/// references (e.g. a relative offset computed after the callee has
/// already been emitted) via [`Writer::patch_u32`].
#[derive(Default)]
pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    pub fn new() -> Writer {
        Writer::default()
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buffer.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pads with zero bytes until `position()` is a multiple of `align`.
    pub fn align_to(&mut self, align: usize) {
        while self.buffer.len() % align != 0 {
            self.buffer.push(0);
        }
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        self.buffer[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitive_reads() {
        let mut w = Writer::new();
        w.write_u32(0xdead_beef);
        w.write_f64(1.5);
        w.write_bytes(b"hi");
        let bytes = w.into_vec();

        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(c.read_f64().unwrap(), 1.5);
        assert_eq!(c.read_bytes(2).unwrap(), b"hi");
    }

    #[test]
    fn reading_past_the_end_is_an_error() {
        let bytes = [1u8, 2, 3];
        let mut c = Cursor::new(&bytes);
        assert!(c.read_u32().is_err());
    }

    #[test]
    fn patch_u32_rewrites_an_already_written_slot() {
        let mut w = Writer::new();
        let at = w.position();
        w.write_u32(0);
        w.write_u32(7);
        w.patch_u32(at, 99);
        let bytes = w.into_vec();
        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap(), 99);
        assert_eq!(c.read_u32().unwrap(), 7);
    }
}
