//! Snapshot header (spec §3 "Snapshot image"): magic, version, feature
//! bits, and the table of per-function byte offsets.

use bitflags::bitflags;

use crate::cursor::{Cursor, Writer};
use crate::error::{SnapshotError, SnapshotResult};

pub const MAGIC: u32 = 0x4A4A_5331; // "JJS1"
pub const VERSION: u32 = 1;

bitflags! {
    /// Feature bits a loader must recognise before trusting a record
    /// (spec: "Global-flags bits record presence of regex and class
    /// constructors so loaders can reject images that exceed their
    /// feature set").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GlobalFlags: u32 {
        const HAS_REGEXP = 1 << 0;
        const HAS_CLASS  = 1 << 1;
        const STATIC     = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SaveFlags: u32 {
        const SAVE_STATIC = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExecFlags: u32 {
        const COPY_DATA       = 1 << 0;
        const ALLOW_STATIC    = 1 << 1;
        const LOAD_AS_FUNCTION = 1 << 2;
        const HAS_SOURCE_NAME  = 1 << 3;
        const HAS_USER_VALUE   = 1 << 4;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHeader {
    pub global_flags: GlobalFlags,
    pub lit_table_offset: u32,
    pub func_offsets: Vec<u32>,
}

impl SnapshotHeader {
    /// Size in bytes of the fixed portion, before the per-function offset
    /// table (spec §3: magic, version, global_flags, lit_table_offset,
    /// number_of_funcs, each a `u32`).
    pub const FIXED_LEN: usize = 4 * 5;

    pub fn write(&self, out: &mut Writer) {
        out.write_u32(MAGIC);
        out.write_u32(VERSION);
        out.write_u32(self.global_flags.bits());
        out.write_u32(self.lit_table_offset);
        out.write_u32(self.func_offsets.len() as u32);
        for &offset in &self.func_offsets {
            out.write_u32(offset);
        }
    }

    /// Reads and validates the header, checking magic/version and
    /// masking `supported` out of `global_flags` before requiring the
    /// remainder to be empty (spec: "mask out bits the runtime *does*
    /// support, then require the remainder to equal the no-feature
    /// baseline").
    pub fn read(cur: &mut Cursor, supported: GlobalFlags) -> SnapshotResult<SnapshotHeader> {
        let magic = cur.read_u32()?;
        if magic != MAGIC {
            return Err(SnapshotError::InvalidSnapshotFormat);
        }
        let version = cur.read_u32()?;
        if version != VERSION {
            return Err(SnapshotError::InvalidVersionOrFeatures);
        }
        let global_flags = GlobalFlags::from_bits_truncate(cur.read_u32()?);
        if !(global_flags & !supported).is_empty() {
            return Err(SnapshotError::InvalidVersionOrFeatures);
        }
        let lit_table_offset = cur.read_u32()?;
        let number_of_funcs = cur.read_u32()?;
        let mut func_offsets = Vec::with_capacity(number_of_funcs as usize);
        for _ in 0..number_of_funcs {
            func_offsets.push(cur.read_u32()?);
        }
        Ok(SnapshotHeader { global_flags, lit_table_offset, func_offsets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header =
            SnapshotHeader { global_flags: GlobalFlags::HAS_REGEXP, lit_table_offset: 64, func_offsets: vec![24, 40] };
        let mut w = Writer::new();
        header.write(&mut w);
        let bytes = w.into_vec();
        let mut cur = Cursor::new(&bytes);
        let read = SnapshotHeader::read(&mut cur, GlobalFlags::all()).unwrap();
        assert_eq!(read, header);
    }

    #[test]
    fn unrecognised_feature_bits_are_rejected() {
        let header = SnapshotHeader { global_flags: GlobalFlags::HAS_CLASS, lit_table_offset: 0, func_offsets: vec![] };
        let mut w = Writer::new();
        header.write(&mut w);
        let bytes = w.into_vec();
        let mut cur = Cursor::new(&bytes);
        let err = SnapshotHeader::read(&mut cur, GlobalFlags::HAS_REGEXP).unwrap_err();
        assert_eq!(err, SnapshotError::InvalidVersionOrFeatures);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut w = Writer::new();
        w.write_u32(0xbad);
        let bytes = w.into_vec();
        let mut cur = Cursor::new(&bytes);
        assert_eq!(SnapshotHeader::read(&mut cur, GlobalFlags::all()).unwrap_err(), SnapshotError::InvalidSnapshotFormat);
    }
}
