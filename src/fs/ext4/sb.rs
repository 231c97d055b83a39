//! Superblock dispatch across the three on-disk layout revisions.
//!
//! The superblock always lives at absolute byte offset 1024, regardless of block size. A
//! revision-0 ("old", `EXT2_GOOD_OLD_REV`) image only defines the first 84 bytes; everything past
//! that is the dynamic-revision extension, itself only partially populated unless the `64BIT`
//! incompat feature is set. [`Superblock::decode`] performs the three-step probe described in the
//! design: old layout first, then the 32-bit extension, then the 64-bit extension.

use crate::error::Error;
use crate::fs::ext4::decode::Cursor;

/// `ext4` magic signature.
pub const EXT4_MAGIC: u16 = 0xEF53;

/// Root directory inode number — a true invariant of the on-disk format, not a policy choice.
pub const ROOT_INODE: u32 = 2;

/// Byte offset of the superblock within the image, regardless of block size.
pub const SUPERBLOCK_OFFSET: u64 = 1024;

macro_rules! feature_bitset {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn has(self, bit: u32) -> bool {
                self.0 & bit != 0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

feature_bitset!(CompatFeatures);
feature_bitset!(IncompatFeatures);
feature_bitset!(RoCompatFeatures);

impl CompatFeatures {
    pub const HAS_JOURNAL: u32 = 0x0004;
    pub const DIR_INDEX: u32 = 0x0020;
}

impl IncompatFeatures {
    pub const COMPRESSION: u32 = 0x0001;
    pub const FILETYPE: u32 = 0x0002;
    pub const RECOVER: u32 = 0x0004;
    pub const JOURNAL_DEV: u32 = 0x0008;
    pub const META_BG: u32 = 0x0010;
    pub const EXTENTS: u32 = 0x0040;
    pub const SIXTY_FOUR_BIT: u32 = 0x0080;
    pub const MMP: u32 = 0x0100;
    pub const FLEX_BG: u32 = 0x0200;
    pub const ENCRYPT: u32 = 0x10000;
    pub const INLINE_DATA: u32 = 0x8000;

    /// Features this engine refuses to operate on: without them, read-only correctness of the
    /// block/inode addressing scheme cannot be guaranteed.
    const REFUSED: u32 = Self::META_BG | Self::MMP | Self::ENCRYPT | Self::INLINE_DATA;

    pub fn refused(self) -> Option<&'static str> {
        if self.has(Self::META_BG) {
            Some("META_BG")
        } else if self.has(Self::MMP) {
            Some("MMP")
        } else if self.has(Self::ENCRYPT) {
            Some("ENCRYPT")
        } else if self.has(Self::INLINE_DATA) {
            Some("INLINE_DATA")
        } else {
            None
        }
    }
}

impl RoCompatFeatures {
    pub const SPARSE_SUPER: u32 = 0x0001;
    pub const LARGE_FILE: u32 = 0x0002;
    pub const HUGE_FILE: u32 = 0x0008;
    pub const GDT_CSUM: u32 = 0x0010;
    pub const EXTRA_ISIZE: u32 = 0x0040;
    pub const METADATA_CSUM: u32 = 0x0400;
}

/// Informational classification of the opened filesystem. Never gates decode/traversal behavior —
/// that always dispatches on the individual feature bits and revision, as the underlying engine
/// does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsKind {
    Ext2,
    Ext3,
    Ext4,
}

/// The decoded, revision-normalized superblock. Immutable after [`Superblock::decode`] returns.
#[derive(Clone, Debug)]
pub struct Superblock {
    pub inodes_count: u32,
    pub blocks_count: u64,
    pub free_blocks_count: u64,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub revision: u32,
    pub inode_size: u16,
    pub bg_desc_size: u16,
    pub feature_compat: CompatFeatures,
    pub feature_incompat: IncompatFeatures,
    pub feature_ro_compat: RoCompatFeatures,
    pub uuid: [u8; 16],
    pub volume_name: [u8; 16],
}

impl Superblock {
    /// Block size in bytes: `1 << (10 + log_block_size)`.
    pub fn block_size(&self) -> u64 {
        1024u64 << self.log_block_size
    }

    /// Number of block groups: `ceil(blocks_count / blocks_per_group)`.
    pub fn group_count(&self) -> u64 {
        let bpg = self.blocks_per_group.max(1) as u64;
        (self.blocks_count + bpg - 1) / bpg
    }

    pub fn is_64bit(&self) -> bool {
        self.feature_incompat.has(IncompatFeatures::SIXTY_FOUR_BIT)
    }

    pub fn uses_filetype_dirent(&self) -> bool {
        self.feature_incompat.has(IncompatFeatures::FILETYPE)
    }

    pub fn volume_name_str(&self) -> String {
        let end = self.volume_name.iter().position(|&b| b == 0).unwrap_or(self.volume_name.len());
        String::from_utf8_lossy(&self.volume_name[..end]).into_owned()
    }

    /// Informational ext2/ext3/ext4 classification (added; the decode/traversal logic below
    /// never consults it). ext3 is ext2 plus a journal; ext4 is anything declaring extents,
    /// 64-bit addressing, or huge-file support and no external journal device.
    pub fn kind(&self) -> FsKind {
        if self.feature_incompat.has(IncompatFeatures::JOURNAL_DEV) {
            return FsKind::Ext2;
        }
        let ext4_markers = self.feature_incompat.has(IncompatFeatures::EXTENTS)
            || self.feature_incompat.has(IncompatFeatures::SIXTY_FOUR_BIT)
            || self.feature_ro_compat.has(RoCompatFeatures::HUGE_FILE);
        if ext4_markers {
            FsKind::Ext4
        } else if self.feature_compat.has(CompatFeatures::HAS_JOURNAL) {
            FsKind::Ext3
        } else {
            FsKind::Ext2
        }
    }

    /// Decodes the superblock from a 1024-byte (or larger) slice holding the superblock region,
    /// following the three-step probe: old layout, then 32-bit extension, then 64-bit extension.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 84 {
            return Err(Error::ShortBuffer { needed: 84, got: buf.len() });
        }

        let mut c = Cursor::new(buf);
        let inodes_count = c.u32()?;
        let blocks_count_lo = c.u32()?;
        c.skip(4)?; // r_blocks_count
        let free_blocks_count_lo = c.u32()?;
        let free_inodes_count = c.u32()?;
        let first_data_block = c.u32()?;
        let log_block_size = c.u32()?;
        c.skip(4)?; // log_cluster_size
        let blocks_per_group = c.u32()?;
        c.skip(4)?; // clusters_per_group
        let inodes_per_group = c.u32()?;
        c.skip(8)?; // mtime, wtime
        c.skip(4)?; // mnt_count, max_mnt_count
        let magic = c.u16()?;
        c.skip(10)?; // state, errors, minor_rev_level, lastcheck
        c.skip(4)?; // checkinterval
        c.skip(4)?; // creator_os
        let revision = c.u32()?;
        // def_resuid, def_resgid: 4 bytes, brings us to offset 84.

        if magic != EXT4_MAGIC {
            return Err(Error::invalid(format!(
                "bad superblock magic {magic:#06x}, expected {EXT4_MAGIC:#06x}"
            )));
        }

        let (
            mut inode_size,
            mut bg_desc_size,
            mut feature_compat,
            mut feature_incompat,
            mut feature_ro_compat,
            mut uuid,
            mut volume_name,
        ) = (128u16, 32u16, CompatFeatures::default(), IncompatFeatures::default(), RoCompatFeatures::default(), [0u8; 16], [0u8; 16]);

        if revision != 0 {
            // 32-bit extended layout: decode the dynamic-revision header starting at offset 84.
            const DYNAMIC_MIN: usize = 0x68 + 16 + 16; // through volume_name
            if buf.len() < DYNAMIC_MIN {
                return Err(Error::ShortBuffer { needed: DYNAMIC_MIN, got: buf.len() });
            }
            let mut d = Cursor::new(&buf[84..]);
            d.skip(4)?; // first_ino
            inode_size = d.u16()?;
            d.skip(2)?; // block_group_nr
            feature_compat = CompatFeatures(d.u32()?);
            feature_incompat = IncompatFeatures(d.u32()?);
            feature_ro_compat = RoCompatFeatures(d.u32()?);
            uuid = d.array::<16>()?;
            volume_name = d.array::<16>()?;

            if let Some(f) = feature_incompat.refused() {
                return Err(Error::unsupported(f));
            }

            // desc_size lives at absolute offset 0xFE when present (dynamic rev only).
            bg_desc_size = if buf.len() >= 0x100 {
                let v = crate::fs::ext4::decode::read_u16_le(buf, 0xFE)?;
                if v == 0 { 32 } else { v }
            } else {
                32
            };
        }

        let mut blocks_count = blocks_count_lo as u64;
        let mut free_blocks_count = free_blocks_count_lo as u64;

        let is_64bit = feature_incompat.has(IncompatFeatures::SIXTY_FOUR_BIT);
        if is_64bit {
            if bg_desc_size < 64 {
                return Err(Error::corrupt(format!(
                    "64BIT incompat feature set but bg_desc_size is {bg_desc_size} (expected >= 64)"
                )));
            }
            const SIXFOUR_MIN: usize = 0x15C;
            if buf.len() < SIXFOUR_MIN {
                return Err(Error::ShortBuffer { needed: SIXFOUR_MIN, got: buf.len() });
            }
            let blocks_count_hi = crate::fs::ext4::decode::read_u32_le(buf, 0x150)?;
            let free_blocks_count_hi = crate::fs::ext4::decode::read_u32_le(buf, 0x158)?;
            blocks_count |= (blocks_count_hi as u64) << 32;
            free_blocks_count |= (free_blocks_count_hi as u64) << 32;
        }

        if revision == 0 {
            inode_size = 128;
            bg_desc_size = 32;
        }

        if inode_size < 128 || !inode_size.is_power_of_two() {
            return Err(Error::corrupt(format!("invalid inode_size {inode_size}")));
        }
        if blocks_per_group == 0 || inodes_per_group == 0 {
            return Err(Error::corrupt("blocks_per_group/inodes_per_group is zero"));
        }

        Ok(Superblock {
            inodes_count,
            blocks_count,
            free_blocks_count,
            free_inodes_count,
            first_data_block,
            log_block_size,
            blocks_per_group,
            inodes_per_group,
            revision,
            inode_size,
            bg_desc_size,
            feature_compat,
            feature_incompat,
            feature_ro_compat,
            uuid,
            volume_name,
        })
    }
}
