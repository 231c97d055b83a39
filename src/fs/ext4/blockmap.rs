//! Classical block-map file-data indexing (used when the inode's `Extents` flag is clear).
//!
//! The inode's 60-byte `data` area is read as 15 little-endian `u32` block pointers: 12 direct,
//! then singly/doubly/triply indirect. A zero pointer at any level is a hole.

use crate::error::Error;
use crate::fs::ext4::decode::read_u32_le;
use crate::source::{read_exact_at, ByteSource};

const DIRECT: u64 = 12;

/// Resolves logical file block `logical_block` to a physical block number, or `None` for a hole.
/// `pointers` are the 15 `u32`s decoded from the inode's `data` area; `k = block_size / 4` is the
/// fan-out of one indirect block.
pub fn resolve<S: ByteSource + ?Sized>(
    pointers: &[u32; 15],
    logical_block: u64,
    source: &S,
    block_size: u64,
) -> Result<Option<u64>, Error> {
    let k = block_size / 4;

    if logical_block < DIRECT {
        return Ok(nonzero(pointers[logical_block as usize]));
    }

    let l = logical_block - DIRECT;
    if l < k {
        return follow(pointers[12], l, source, block_size);
    }

    let l = l - k;
    if l < k * k {
        return follow_double(pointers[13], l, k, source, block_size);
    }

    let l = l - k * k;
    if l < k * k * k {
        return follow_triple(pointers[14], l, k, source, block_size);
    }

    Err(Error::invalid(format!(
        "logical block {logical_block} exceeds the triple-indirect addressing range"
    )))
}

fn nonzero(ptr: u32) -> Option<u64> {
    if ptr == 0 {
        None
    } else {
        Some(ptr as u64)
    }
}

fn read_indirect<S: ByteSource + ?Sized>(
    block: u32,
    source: &S,
    block_size: u64,
) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; block_size as usize];
    read_exact_at(source, &mut buf, block as u64 * block_size)?;
    Ok(buf)
}

fn follow<S: ByteSource + ?Sized>(
    block: u32,
    index: u64,
    source: &S,
    block_size: u64,
) -> Result<Option<u64>, Error> {
    if block == 0 {
        return Ok(None);
    }
    let buf = read_indirect(block, source, block_size)?;
    Ok(nonzero(read_u32_le(&buf, index as usize * 4)?))
}

fn follow_double<S: ByteSource + ?Sized>(
    block: u32,
    index: u64,
    k: u64,
    source: &S,
    block_size: u64,
) -> Result<Option<u64>, Error> {
    if block == 0 {
        return Ok(None);
    }
    let buf = read_indirect(block, source, block_size)?;
    let outer = index / k;
    let inner = index % k;
    let next = read_u32_le(&buf, outer as usize * 4)?;
    follow(next, inner, source, block_size)
}

fn follow_triple<S: ByteSource + ?Sized>(
    block: u32,
    index: u64,
    k: u64,
    source: &S,
    block_size: u64,
) -> Result<Option<u64>, Error> {
    if block == 0 {
        return Ok(None);
    }
    let buf = read_indirect(block, source, block_size)?;
    let outer = index / (k * k);
    let inner = index % (k * k);
    let next = read_u32_le(&buf, outer as usize * 4)?;
    follow_double(next, inner, k, source, block_size)
}
