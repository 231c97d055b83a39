//! Closed error enumeration surfaced by every operation in this crate.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while decoding or traversing an ext2/ext3/ext4 image.
///
/// This enum is closed: no raw strings or `Box<dyn Error>` escape the public surface. Short reads
/// past end-of-file are not represented here — they are conveyed in-band through `std::io::Read`
/// semantics on the reader types (see [`crate::fs::ext4::FileReader`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fixed-size structure was decoded from a slice shorter than its declared size.
    #[error("short buffer: needed at least {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },

    /// A structural invariant was violated: bad magic, malformed seek, malformed path, and
    /// similar decode-time or argument-time rejections that are not disk corruption per se.
    #[error("invalid: {0}")]
    Invalid(String),

    /// An incompat feature this engine refuses to operate on is set (meta_bg, mmp, encrypt,
    /// inline_data), or a directory structure (htree) beyond `.`/`..` is requested.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// A path component, or an inode slot marked unused, does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation requires a file but the target is a directory.
    #[error("is a directory")]
    IsDirectory,

    /// The operation requires a directory but the target is a file.
    #[error("is a file")]
    IsFile,

    /// A structural invariant was violated in on-disk data: overrunning length fields,
    /// unaligned or past-end `rec_len`, a bad extent header magic, an inconsistent
    /// `bg_desc_size`.
    #[error("corrupt on-disk structure: {0}")]
    Corrupt(String),

    /// The byte source reported a failure, or a short read could not be completed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::Invalid(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}

