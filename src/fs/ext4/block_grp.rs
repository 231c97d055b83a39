//! Block-group descriptor table.
//!
//! Located starting at block `first_data_block + 1`, with `ceil(blocks_count / blocks_per_group)`
//! contiguous entries of `bg_desc_size` bytes each. Only the fields this engine actually consults
//! (the inode table pointer) are decoded; bitmap pointers and per-group counters are outside this
//! crate's scope (allocation and free-space accounting are not part of a read-only traversal
//! engine).

use crate::error::Error;
use crate::fs::ext4::decode::Cursor;
use crate::fs::ext4::sb::Superblock;
use crate::source::{read_exact_at, ByteSource};

/// A single block group's descriptor: just enough to locate its inode table.
#[derive(Clone, Copy, Debug)]
pub struct GroupDescriptor {
    /// Physical block number of this group's inode table.
    pub inode_table: u64,
}

impl GroupDescriptor {
    /// Decodes one descriptor from a `bg_desc_size`-byte slice. `size_is_64` selects whether the
    /// 16-bit high halves (present only in 64-bit-mode descriptors, size >= 64) are read.
    fn decode(buf: &[u8], size_is_64: bool) -> Result<Self, Error> {
        if buf.len() < 32 {
            return Err(Error::ShortBuffer { needed: 32, got: buf.len() });
        }
        let mut c = Cursor::new(buf);
        c.skip(8)?; // block_bitmap_lo, inode_bitmap_lo
        let inode_table_lo = c.u32()?;
        // remaining counters (free blocks/inodes, used dirs, flags, exclude bitmap, checksums,
        // itable_unused, checksum) are not consulted by this engine.

        let inode_table_hi = if size_is_64 && buf.len() >= 64 {
            // inode_table_hi sits at offset 0x28 (40) in the 64-bit descriptor layout.
            crate::fs::ext4::decode::read_u32_le(buf, 0x28)?
        } else {
            0
        };

        Ok(GroupDescriptor {
            inode_table: (inode_table_lo as u64) | ((inode_table_hi as u64) << 32),
        })
    }

    /// Reads and decodes the full block-group descriptor table for `sb` from `source`.
    pub fn load_table<S: ByteSource + ?Sized>(
        sb: &Superblock,
        source: &S,
    ) -> Result<Vec<GroupDescriptor>, Error> {
        let table_block = sb.first_data_block as u64 + 1;
        let table_offset = table_block * sb.block_size();
        let entry_size = sb.bg_desc_size as usize;
        let group_count = sb.group_count();

        let mut raw = vec![0u8; entry_size * group_count as usize];
        read_exact_at(source, &mut raw, table_offset)?;

        let mut groups = Vec::with_capacity(group_count as usize);
        for i in 0..group_count as usize {
            let entry = &raw[i * entry_size..(i + 1) * entry_size];
            groups.push(GroupDescriptor::decode(entry, sb.is_64bit())?);
        }
        Ok(groups)
    }
}
