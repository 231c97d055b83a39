//! Directory-entry decoding.
//!
//! Two on-disk dirent shapes share one decoding contract: the old shape carries a 16-bit name
//! length and no file-type byte, the new shape (gated on the `FILETYPE` incompat feature) trades
//! one byte of that length field for a file-type nibble. Both normalize into the same in-memory
//! [`DirEntry`]. A directory's data is a linear stream of these records; decoding it eagerly
//! produces a stable name -> entry map, built once when the directory's inode is opened.

use std::collections::HashMap;

use crate::error::Error;
use crate::fs::ext4::inode::Kind as InodeKind;

/// File-type byte/nibble carried by new-style dirents (meaningless, left `None`, for old-style
/// ones).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Unknown,
    Regular,
    Directory,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Symlink,
}

impl EntryKind {
    fn from_file_type(t: u8) -> Self {
        match t {
            1 => EntryKind::Regular,
            2 => EntryKind::Directory,
            3 => EntryKind::CharDevice,
            4 => EntryKind::BlockDevice,
            5 => EntryKind::Fifo,
            6 => EntryKind::Socket,
            7 => EntryKind::Symlink,
            _ => EntryKind::Unknown,
        }
    }

    pub fn from_inode_kind(k: InodeKind) -> Self {
        match k {
            InodeKind::Regular => EntryKind::Regular,
            InodeKind::Directory => EntryKind::Directory,
            InodeKind::Symlink => EntryKind::Symlink,
            InodeKind::Other => EntryKind::Unknown,
        }
    }
}

/// One decoded, normalized directory entry.
#[derive(Clone, Debug)]
pub struct DirEntry {
    pub inode: u32,
    pub name: String,
    /// `Some` only when the directory's filesystem has the `FILETYPE` incompat feature set;
    /// otherwise the kind is unknown until the target inode is loaded.
    pub kind: Option<EntryKind>,
}

/// Walks the dirent stream in `data` (a directory's full file content, always a multiple of the
/// block size) and returns every entry in on-disk order, including `.`/`..` and unused slots are
/// skipped. `use_filetype` selects the new dirent shape.
fn decode_stream(data: &[u8], use_filetype: bool) -> Result<Vec<DirEntry>, Error> {
    let mut entries = Vec::new();
    let mut pos = 0usize;

    while pos + 8 <= data.len() {
        let inode = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
        let rec_len = u16::from_le_bytes(data[pos + 4..pos + 6].try_into().unwrap()) as usize;

        if rec_len < 8 || rec_len % 4 != 0 {
            return Err(Error::corrupt(format!(
                "dirent rec_len {rec_len} at offset {pos} is not a multiple of 4 or too short"
            )));
        }
        if pos + rec_len > data.len() {
            return Err(Error::corrupt(format!(
                "dirent rec_len {rec_len} at offset {pos} overruns the directory block"
            )));
        }

        let (name_len, kind, name_start) = if use_filetype {
            let name_len = data[pos + 6] as usize;
            let file_type = data[pos + 7];
            (name_len, Some(EntryKind::from_file_type(file_type)), pos + 8)
        } else {
            let name_len =
                u16::from_le_bytes(data[pos + 6..pos + 8].try_into().unwrap()) as usize;
            (name_len, None, pos + 8)
        };

        if inode != 0 && name_len > 0 {
            if name_start + name_len > pos + rec_len {
                return Err(Error::corrupt(format!(
                    "dirent name_len {name_len} at offset {pos} overruns its rec_len"
                )));
            }
            let name_bytes = &data[name_start..name_start + name_len];
            let name = String::from_utf8_lossy(name_bytes).into_owned();
            entries.push(DirEntry { inode, name, kind });
        }

        pos += rec_len;
    }

    Ok(entries)
}

/// A directory's decoded, immutable child map: name -> entry. Built eagerly when a directory
/// inode is opened, so every subsequent lookup is an O(1) hash probe.
#[derive(Clone, Debug)]
pub struct ChildMap {
    by_name: HashMap<String, DirEntry>,
}

impl ChildMap {
    /// Decodes `data` (the directory's full file content) into a child map.
    ///
    /// An htree-indexed directory (inode flag `Index`) never has its stream walked at all: the
    /// first block's `..` entry stretches its `rec_len` over the embedded hash-tree root that
    /// follows it, so treating the bytes after it as further dirents misparses the index as
    /// corruption. A warning is logged once and the directory is exposed with no entries, mirroring
    /// the original driver's short-circuit (it hands back the directory without ever parsing its
    /// stream).
    pub fn decode(data: &[u8], use_filetype: bool, htree_indexed: bool) -> Result<Self, Error> {
        if htree_indexed {
            log::warn!(
                "directory uses htree indexing, which this engine does not implement; \
                 exposing no entries"
            );
            return Ok(ChildMap { by_name: HashMap::new() });
        }

        let entries = decode_stream(data, use_filetype)?;

        let mut by_name = HashMap::with_capacity(entries.len());
        for entry in entries {
            if by_name.contains_key(&entry.name) {
                log::warn!(
                    "duplicate directory entry name {:?}, later entry wins",
                    entry.name
                );
            }
            by_name.insert(entry.name.clone(), entry);
        }

        Ok(ChildMap { by_name })
    }

    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.by_name.get(name)
    }

    /// Every entry except `.` and `..`, in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.by_name.values().filter(|e| e.name != "." && e.name != "..")
    }
}
