//! Read-only parser and lookup engine for the ext2/ext3/ext4 family of on-disk file systems.
//!
//! Given a block-addressable byte source ([`source::ByteSource`]) — typically a [`std::fs::File`]
//! opened on a disk image or block device, or an in-memory byte slice in tests — this crate decodes
//! the on-disk structures (superblock, block-group descriptor table, inodes, directory entries,
//! extent trees, block maps) and exposes a hierarchical, read-only view: directory listing, path
//! resolution, file open, and positional/stream reads.
//!
//! This crate does not mount, write, journal, or repair a file system. See [`fs::ext4`] for the
//! decoding engine and [`fs::ext4::Filesystem`] for the public entry point.

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod fs;
pub mod source;

pub use error::{Error, Result};
pub use fs::ext4::Filesystem;
