//! File-system decoding engine.
//!
//! Contains the implementation of the ext2/ext3/ext4 family of on-disk layouts. [`ext4::Filesystem`]
//! is the public entry point; everything else in [`ext4`] is the decoding machinery it is built on.

pub mod ext4;
