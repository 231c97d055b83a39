//! Inode decoding and materialization.
//!
//! An inode is decoded as a fixed 128-byte base record, optionally extended with a tail (present
//! when `inode_size > 128`) carrying nanosecond-precision timestamps, creation time, and a few
//! extra fields. The 60-byte `data` area is handed back uninterpreted — it's read again as an
//! extent-tree root, a block-map pointer array, or a short symlink target depending on the
//! dispatch in [`crate::fs::ext4::reader`].

use crate::error::Error;
use crate::fs::ext4::decode::Cursor;
use crate::fs::ext4::sb::Superblock;

/// Inode flag bit: file data is indexed by an extent tree rather than a classical block map.
pub const FLAG_EXTENTS: u32 = 0x0008_0000;
/// Inode flag bit: directory uses an htree hash index (this engine exposes no entries for it).
pub const FLAG_INDEX: u32 = 0x0000_1000;

/// High-level type of the file-system object an inode represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Regular,
    Directory,
    Symlink,
    /// FIFO, char/block device, or socket: metadata only, reads are refused.
    Other,
}

impl Kind {
    fn from_mode(mode: u16) -> Self {
        match mode & 0xF000 {
            0x8000 => Kind::Regular,
            0x4000 => Kind::Directory,
            0xA000 => Kind::Symlink,
            _ => Kind::Other,
        }
    }
}

/// An inode timestamp, extended with nanosecond precision when the extended inode record carries
/// the corresponding `*_extra` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timestamp {
    /// Signed seconds since the epoch; old (non-extended) inodes wrap at 2038 like the raw i32.
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    fn old(raw: u32) -> Self {
        Timestamp { seconds: raw as i32 as i64, nanos: 0 }
    }

    /// `seconds = ((extra & 0x3) << 32) | lo32`, `nanos = extra >> 2`, per the extended-inode
    /// timestamp encoding.
    fn extended(lo32: u32, extra: u32) -> Self {
        let seconds = (((extra & 0x3) as i64) << 32) | (lo32 as i64);
        Timestamp { seconds, nanos: extra >> 2 }
    }
}

/// A decoded inode record.
#[derive(Clone, Debug)]
pub struct Inode {
    pub number: u32,
    pub mode: u16,
    pub kind: Kind,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub links_count: u16,
    pub flags: u32,
    /// The 60-byte `data` area: extent-tree root, block-map pointers, or short symlink target.
    pub data: [u8; 60],
    pub atime: Timestamp,
    pub ctime: Timestamp,
    pub mtime: Timestamp,
    pub dtime: Timestamp,
}

impl Inode {
    pub fn uses_extents(&self) -> bool {
        self.flags & FLAG_EXTENTS != 0
    }

    pub fn is_htree_indexed(&self) -> bool {
        self.flags & FLAG_INDEX != 0
    }

    /// Decodes the inode numbered `number` (1-based) at its byte offset within `raw`, a buffer
    /// holding exactly `sb.inode_size` bytes read from the on-disk inode table.
    pub fn decode(sb: &Superblock, number: u32, raw: &[u8]) -> Result<Self, Error> {
        assert_ne!(number, 0, "inode number 0 is reserved and never a valid load target");

        if raw.len() < 128 {
            return Err(Error::ShortBuffer { needed: 128, got: raw.len() });
        }

        let mut c = Cursor::new(raw);
        let mode = c.u16()?;
        let uid_lo = c.u16()?;
        let size_lo = c.u32()?;
        let atime_lo = c.u32()?;
        let ctime_lo = c.u32()?;
        let mtime_lo = c.u32()?;
        let dtime_lo = c.u32()?;
        let gid_lo = c.u16()?;
        let links_count = c.u16()?;
        c.skip(4)?; // i_blocks_lo
        let flags = c.u32()?;
        c.skip(4)?; // osd1
        let data = c.array::<60>()?;
        c.skip(4)?; // i_generation
        c.skip(4)?; // i_file_acl_lo
        let size_hi = c.u32()?;
        c.skip(4)?; // i_obso_faddr
        c.skip(2)?; // osd2: i_blocks_hi
        c.skip(2)?; // osd2: i_file_acl_hi
        let uid_hi = c.u16()?;
        let gid_hi = c.u16()?;
        c.skip(4)?; // osd2: i_checksum_lo, i_reserved

        debug_assert_eq!(c.pos(), 128);

        let kind = Kind::from_mode(mode);

        let size = match kind {
            Kind::Regular if sb.revision != 0 => (size_lo as u64) | ((size_hi as u64) << 32),
            _ => size_lo as u64,
        };

        let mut atime = Timestamp::old(atime_lo);
        let mut ctime = Timestamp::old(ctime_lo);
        let mut mtime = Timestamp::old(mtime_lo);
        let dtime = Timestamp::old(dtime_lo);

        if sb.inode_size > 128 && raw.len() >= 130 {
            let mut ext = Cursor::new(&raw[128..]);
            let extra_isize = ext.u16()?;
            let avail = raw.len() - 128;

            if extra_isize >= 4 && avail >= 4 {
                ext.skip(2)?; // checksum_hi
                if extra_isize >= 8 && avail >= 8 {
                    let ctime_extra = ext.u32()?;
                    ctime = Timestamp::extended(ctime_lo, ctime_extra);
                }
                if extra_isize >= 12 && avail >= 12 {
                    let mtime_extra = ext.u32()?;
                    mtime = Timestamp::extended(mtime_lo, mtime_extra);
                }
                if extra_isize >= 16 && avail >= 16 {
                    let atime_extra = ext.u32()?;
                    atime = Timestamp::extended(atime_lo, atime_extra);
                }
            }
        }

        Ok(Inode {
            number,
            mode,
            kind,
            uid: (uid_lo as u32) | ((uid_hi as u32) << 16),
            gid: (gid_lo as u32) | ((gid_hi as u32) << 16),
            size,
            links_count,
            flags,
            data,
            atime,
            ctime,
            mtime,
            dtime,
        })
    }

    /// Computes `(group, index)` for inode `number`, per the addressing scheme:
    /// `group = (n-1)/ipg`, `index = (n-1)%ipg`. The caller combines `index` with the group's
    /// inode table pointer and `sb.inode_size` to get a byte offset.
    pub fn locate(sb: &Superblock, number: u32) -> Result<(u64, u64), Error> {
        if number == 0 {
            return Err(Error::invalid("inode number 0 is reserved"));
        }
        let group = (number as u64 - 1) / sb.inodes_per_group as u64;
        let index = (number as u64 - 1) % sb.inodes_per_group as u64;
        Ok((group, index))
    }
}
