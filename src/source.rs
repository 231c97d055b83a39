//! Byte-source abstraction the decoder reads through.
//!
//! The engine is generic over anything that can perform a positional read. `std::fs::File` is the
//! common case (a disk image or block device); an in-memory byte slice is the harness used by
//! tests. A short `read_at` is retried by callers in [`crate::fs::ext4::decode`] until either the
//! destination buffer is full or the source reports end-of-data.

use std::fs::File;
use std::io;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// A block-addressable byte source supporting positional reads.
///
/// Implementations must be reentrant: a `read_at` call must not depend on, or mutate, any shared
/// cursor. This lets multiple readers borrow the same source concurrently (see the crate's
/// concurrency model).
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes starting at `offset`, returning the number of bytes read.
    ///
    /// A return value smaller than `buf.len()` that is not an error means end-of-data: the caller
    /// is responsible for retrying if more data might still be available, and for treating a
    /// persistent short read of a fixed-size on-disk structure as [`crate::Error::Io`].
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total length of the byte source, in bytes, if known.
    fn len(&self) -> Option<u64> {
        None
    }
}

#[cfg(unix)]
impl ByteSource for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(self, buf, offset)
    }

    fn len(&self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len())
    }
}

#[cfg(not(unix))]
impl ByteSource for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};
        // Windows' `File` has no thread-safe positional read without extra traits; this crate is
        // primarily exercised on unix byte sources, so fall back to a non-reentrant seek+read.
        let mut file = self.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }

    fn len(&self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len())
    }
}

impl ByteSource for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }

    fn len(&self) -> Option<u64> {
        Some(self.as_slice().len() as u64)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn len(&self) -> Option<u64> {
        (**self).len()
    }
}

impl ByteSource for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let offset = offset as usize;
        if offset >= self.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.len() - offset);
        buf[..n].copy_from_slice(&self[offset..offset + n]);
        Ok(n)
    }

    fn len(&self) -> Option<u64> {
        Some(<[u8]>::len(self) as u64)
    }
}

/// Reads exactly `buf.len()` bytes at `offset`, retrying short reads, and failing with
/// [`crate::Error::Io`] (unexpected EOF) if the source runs dry first.
pub(crate) fn read_exact_at<S: ByteSource + ?Sized>(
    source: &S,
    buf: &mut [u8],
    offset: u64,
) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read_at(&mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "byte source exhausted before the requested structure was fully read",
            ));
        }
        filled += n;
    }
    Ok(())
}
