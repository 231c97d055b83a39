//! Positional file-data reads, unifying the extent-tree and block-map indexing schemes behind one
//! contract, and the `std::io::Read`/`Seek` reader handle built on top of it.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::Error;
use crate::fs::ext4::decode::read_u32_le;
use crate::fs::ext4::inode::Inode;
use crate::fs::ext4::sb::Superblock;
use crate::fs::ext4::{blockmap, extent};
use crate::source::{read_exact_at, ByteSource};

/// Whether a logical file block fell into a live mapping, a hole, or an uninitialized extent.
///
/// Exposed in addition to the zeroed bytes a read returns for holes/uninitialized ranges — a
/// cheap addition to the mapping already in hand, and useful to `filefrag`-like callers that want
/// to distinguish "sparse" from "allocated but not yet written".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockStatus {
    Mapped,
    Hole,
    Uninitialized,
}

/// Positionally reads up to `dst.len()` bytes of `inode`'s file data starting at `offset`,
/// zero-filling holes and the tail past EOF. Returns the number of bytes written into `dst`
/// (always `min(dst.len(), size - offset)` on success, never more).
pub(crate) fn read_at<S: ByteSource + ?Sized>(
    sb: &Superblock,
    source: &S,
    inode: &Inode,
    dst: &mut [u8],
    offset: u64,
) -> Result<usize, Error> {
    if inode.kind == crate::fs::ext4::inode::Kind::Symlink && (inode.size as usize) < 60 {
        let size = inode.size as usize;
        if offset >= size as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = dst.len().min(size - start);
        dst[..n].copy_from_slice(&inode.data[start..start + n]);
        return Ok(n);
    }

    if offset >= inode.size {
        return Ok(0);
    }
    let want = dst.len().min((inode.size - offset) as usize);
    if want == 0 {
        return Ok(0);
    }

    let block_size = sb.block_size();
    let mut written = 0usize;

    while written < want {
        let abs_offset = offset + written as usize as u64;
        let logical_block = abs_offset / block_size;
        let in_block_offset = (abs_offset % block_size) as usize;
        let chunk = (block_size as usize - in_block_offset).min(want - written);

        let status = block_status(sb, source, inode, logical_block)?;
        match status.0 {
            Some(physical) => {
                let byte_offset = physical * block_size + in_block_offset as u64;
                read_exact_at(source, &mut dst[written..written + chunk], byte_offset)?;
            }
            None => {
                dst[written..written + chunk].fill(0);
            }
        }

        written += chunk;
    }

    Ok(written)
}

/// Resolves the status and, if mapped, physical block number of `logical_block` within `inode`.
pub(crate) fn block_status<S: ByteSource + ?Sized>(
    sb: &Superblock,
    source: &S,
    inode: &Inode,
    logical_block: u64,
) -> Result<(Option<u64>, BlockStatus), Error> {
    if inode.uses_extents() {
        let logical_block: u32 = logical_block
            .try_into()
            .map_err(|_| Error::invalid("logical block exceeds extent tree's 32-bit range"))?;
        let mapping = extent::resolve(&inode.data, logical_block, source, sb.block_size())?;
        let status = if mapping.uninitialized {
            BlockStatus::Uninitialized
        } else if mapping.physical_block.is_some() {
            BlockStatus::Mapped
        } else {
            BlockStatus::Hole
        };
        Ok((mapping.physical_block, status))
    } else {
        let mut pointers = [0u32; 15];
        for (i, p) in pointers.iter_mut().enumerate() {
            *p = read_u32_le(&inode.data, i * 4)?;
        }
        let physical = blockmap::resolve(&pointers, logical_block, source, sb.block_size())?;
        let status = if physical.is_some() { BlockStatus::Mapped } else { BlockStatus::Hole };
        Ok((physical, status))
    }
}

/// Reads the full target of a symlink `inode`: in-inode if `size < 60`, otherwise read through the
/// regular-file positional reader at offset 0.
pub(crate) fn symlink_target<S: ByteSource + ?Sized>(
    sb: &Superblock,
    source: &S,
    inode: &Inode,
) -> Result<String, Error> {
    let size = inode.size as usize;
    let mut buf = vec![0u8; size];
    let n = read_at(sb, source, inode, &mut buf, 0)?;
    buf.truncate(n);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// A readable, seekable handle onto a regular file's data.
///
/// Implements [`std::io::Read`] and [`std::io::Seek`]: a stream offset private to this handle,
/// advancing with each read, plus the positional [`FileReader::read_at`] for random access. A
/// short read is always accompanied either by EOF (cursor reaches `size`) or a concrete
/// `io::Error`.
pub struct FileReader<'fs, S: ByteSource + ?Sized> {
    sb: &'fs Superblock,
    source: &'fs S,
    inode: Inode,
    cursor: u64,
}

impl<'fs, S: ByteSource + ?Sized> FileReader<'fs, S> {
    pub(crate) fn new(sb: &'fs Superblock, source: &'fs S, inode: Inode) -> Self {
        FileReader { sb, source, inode, cursor: 0 }
    }

    pub fn size(&self) -> u64 {
        self.inode.size
    }

    /// Positional read, independent of the stream cursor. Short reads are not an error — they
    /// signal the tail of the file was reached.
    pub fn read_at(&self, dst: &mut [u8], offset: u64) -> io::Result<usize> {
        read_at(self.sb, self.source, &self.inode, dst, offset).map_err(to_io)
    }

    /// The mapping status (mapped/hole/uninitialized) of the logical block containing `offset`.
    pub fn block_status_at(&self, offset: u64) -> io::Result<BlockStatus> {
        let block_size = self.sb.block_size();
        let (_, status) =
            block_status(self.sb, self.source, &self.inode, offset / block_size).map_err(to_io)?;
        Ok(status)
    }
}

impl<'fs, S: ByteSource + ?Sized> Read for FileReader<'fs, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.cursor)?;
        self.cursor += n as u64;
        Ok(n)
    }
}

impl<'fs, S: ByteSource + ?Sized> Seek for FileReader<'fs, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(x) => x as i128,
            SeekFrom::Current(x) => self.cursor as i128 + x as i128,
            SeekFrom::End(x) => self.inode.size as i128 + x as i128,
        };
        if new_pos < 0 || new_pos > u64::MAX as i128 {
            return Err(to_io(Error::invalid("seek resulted in a negative or overflowing position")));
        }
        self.cursor = new_pos as u64;
        Ok(self.cursor)
    }
}

fn to_io(e: Error) -> io::Error {
    match e {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}
