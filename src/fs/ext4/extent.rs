//! Extent-tree file-data indexing.
//!
//! Each node is a 12-byte header followed by fixed 12-byte entries, sorted ascending by
//! `first_file_block`. The root node lives inside the inode's 60-byte `data` area; child nodes
//! live in their own disk blocks. [`resolve`] walks from a root buffer down to the leaf extent (or
//! hole) covering a given logical file block.

use crate::error::Error;
use crate::fs::ext4::decode::{read_u16_le, read_u32_le};
use crate::source::{read_exact_at, ByteSource};

/// Extent-tree node magic.
pub const MAGIC: u16 = 0xF30A;

/// A leaf extent, covering `[first_file_block, first_file_block + len)` where `len` is the
/// *initialized* length (see `uninitialized`).
#[derive(Clone, Copy, Debug)]
struct Extent {
    first_file_block: u32,
    len: u16,
    start_block: u64,
}

impl Extent {
    fn uninitialized(&self) -> bool {
        self.len > 32768
    }

    fn length(&self) -> u32 {
        if self.uninitialized() {
            (self.len - 32768) as u32
        } else {
            self.len as u32
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Index {
    first_file_block: u32,
    child_block: u64,
}

struct Header {
    entries: u16,
    height: u16,
}

fn parse_header(buf: &[u8]) -> Result<Header, Error> {
    if buf.len() < 12 {
        return Err(Error::ShortBuffer { needed: 12, got: buf.len() });
    }
    let magic = read_u16_le(buf, 0)?;
    if magic != MAGIC {
        return Err(Error::corrupt(format!(
            "extent node magic {magic:#06x}, expected {MAGIC:#06x}"
        )));
    }
    let entries = read_u16_le(buf, 2)?;
    let height = read_u16_le(buf, 6)?;
    Ok(Header { entries, height })
}

fn leaf_entry(buf: &[u8]) -> Result<Extent, Error> {
    let first_file_block = read_u32_le(buf, 0)?;
    let len = read_u16_le(buf, 4)?;
    let start_hi = read_u16_le(buf, 6)?;
    let start_lo = read_u32_le(buf, 8)?;
    Ok(Extent {
        first_file_block,
        len,
        start_block: (start_lo as u64) | ((start_hi as u64) << 32),
    })
}

fn index_entry(buf: &[u8]) -> Result<Index, Error> {
    let first_file_block = read_u32_le(buf, 0)?;
    let child_lo = read_u32_le(buf, 4)?;
    let child_hi = read_u16_le(buf, 8)?;
    Ok(Index {
        first_file_block,
        child_block: (child_lo as u64) | ((child_hi as u64) << 32),
    })
}

/// Binary-searches the `count` fixed-12-byte entries following the header for the largest one
/// whose `first_file_block <= target`. Returns its byte offset within `buf`, or `None` if every
/// entry's `first_file_block` exceeds `target` (the target falls before the node's first entry).
fn find_entry(buf: &[u8], count: u16, target: u32) -> Result<Option<usize>, Error> {
    let mut lo = 0i64;
    let mut hi = count as i64 - 1;
    let mut result = None;

    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let offset = 12 + mid as usize * 12;
        if offset + 12 > buf.len() {
            return Err(Error::corrupt("extent entry offset overruns node buffer"));
        }
        let ffb = read_u32_le(buf, offset)?;
        if ffb <= target {
            result = Some(offset);
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }

    Ok(result)
}

/// The outcome of resolving a logical file block through the extent tree.
#[derive(Clone, Copy, Debug)]
pub struct Mapping {
    /// Physical block number, if the logical block falls inside a mapped extent.
    pub physical_block: Option<u64>,
    /// True if the mapped extent is marked uninitialized (reads as zero despite being mapped).
    pub uninitialized: bool,
}

const HOLE: Mapping = Mapping { physical_block: None, uninitialized: false };

/// Resolves `logical_block` starting from the root node in `root` (the inode's 60-byte data area).
/// Descends into child blocks read through `source` as needed. Child nodes are not cached across
/// calls.
pub fn resolve<S: ByteSource + ?Sized>(
    root: &[u8],
    logical_block: u32,
    source: &S,
    block_size: u64,
) -> Result<Mapping, Error> {
    resolve_node(root, logical_block, source, block_size)
}

fn resolve_node<S: ByteSource + ?Sized>(
    buf: &[u8],
    logical_block: u32,
    source: &S,
    block_size: u64,
) -> Result<Mapping, Error> {
    let header = parse_header(buf)?;
    let Some(offset) = find_entry(buf, header.entries, logical_block)? else {
        return Ok(HOLE);
    };

    if header.height == 0 {
        let extent = leaf_entry(&buf[offset..offset + 12])?;
        let covered_end = extent.first_file_block as u64 + extent.length() as u64;
        if (logical_block as u64) >= covered_end {
            return Ok(HOLE);
        }
        if extent.uninitialized() {
            return Ok(Mapping { physical_block: None, uninitialized: true });
        }
        let delta = logical_block as u64 - extent.first_file_block as u64;
        Ok(Mapping {
            physical_block: Some(extent.start_block + delta),
            uninitialized: false,
        })
    } else {
        let idx = index_entry(&buf[offset..offset + 12])?;
        let mut child = vec![0u8; block_size as usize];
        read_exact_at(source, &mut child, idx.child_block * block_size)?;
        resolve_node(&child, logical_block, source, block_size)
    }
}
