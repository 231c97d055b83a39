//! Filesystem façade: path resolution, directory listing, file open, stat, and the underlying
//! superblock/block-group/inode decoding machinery it is built on.
//!
//! Data flow on [`Filesystem::open_file`]`("/a/b/c")`: the path is split into components, each
//! resolved in turn against the owning directory's child map (built eagerly when that directory's
//! inode is loaded), and the final inode is classified and wrapped in a [`FileReader`].

pub mod block_grp;
pub mod blockmap;
pub mod decode;
pub mod dir;
pub mod extent;
pub mod inode;
pub mod reader;
pub mod sb;

use crate::error::{Error, Result};
use crate::source::{read_exact_at, ByteSource};

pub use dir::EntryKind;
pub use inode::{Kind, Timestamp};
pub use reader::{BlockStatus, FileReader};
pub use sb::FsKind;

use block_grp::GroupDescriptor;
use dir::ChildMap;
use inode::Inode;
use sb::{Superblock, ROOT_INODE, SUPERBLOCK_OFFSET};

/// One non-dot child of a directory, as returned by [`Filesystem::read_dir`].
#[derive(Clone, Debug)]
pub struct DirListEntry {
    pub name: String,
    pub inode_number: u32,
    /// Known without loading the target inode only when the owning filesystem has the
    /// `FILETYPE` incompat feature set; otherwise `EntryKind::Unknown` until [`Filesystem::stat`]
    /// (or open) loads the inode.
    pub kind: EntryKind,
}

/// Metadata about a file-system object, returned without reading its content.
#[derive(Clone, Debug)]
pub struct Stat {
    pub inode_number: u32,
    pub kind: Kind,
    pub size: u64,
    pub links_count: u16,
    pub uid: u32,
    pub gid: u32,
    pub atime: Timestamp,
    pub ctime: Timestamp,
    pub mtime: Timestamp,
    pub dtime: Timestamp,
}

impl Stat {
    fn from_inode(inode: &Inode) -> Self {
        Stat {
            inode_number: inode.number,
            kind: inode.kind,
            size: inode.size,
            links_count: inode.links_count,
            uid: inode.uid,
            gid: inode.gid,
            atime: inode.atime,
            ctime: inode.ctime,
            mtime: inode.mtime,
            dtime: inode.dtime,
        }
    }
}

/// An opened ext2/ext3/ext4 image: an immutable superblock and block-group descriptor table, plus
/// the byte source they were decoded from.
///
/// Exclusively owns the byte source and the descriptor array. Every other type in this crate
/// (inodes, file readers, child maps) borrows this filesystem non-owningly for the lifetime of a
/// read, or is built once from bytes read through it and then stands alone.
pub struct Filesystem<S: ByteSource> {
    source: S,
    sb: Superblock,
    groups: Vec<GroupDescriptor>,
}

impl<S: ByteSource> Filesystem<S> {
    /// Reads the superblock, validates it, and loads the block-group descriptor table.
    pub fn open(source: S) -> Result<Self> {
        let mut raw_sb = vec![0u8; 1024];
        read_exact_at(&source, &mut raw_sb, SUPERBLOCK_OFFSET)?;
        let sb = Superblock::decode(&raw_sb)?;
        let groups = GroupDescriptor::load_table(&sb, &source)?;
        Ok(Filesystem { source, sb, groups })
    }

    /// Informational ext2/ext3/ext4 classification; never consulted by decode/traversal logic.
    pub fn kind(&self) -> FsKind {
        self.sb.kind()
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    fn load_inode(&self, number: u32) -> Result<Inode> {
        if number == 0 {
            return Err(Error::invalid("inode number 0 is reserved"));
        }
        let (group, index) = Inode::locate(&self.sb, number)?;
        let descriptor = self.groups.get(group as usize).ok_or_else(|| {
            Error::corrupt(format!("inode {number} maps to out-of-range block group {group}"))
        })?;

        let byte_offset =
            descriptor.inode_table * self.sb.block_size() + index * self.sb.inode_size as u64;

        let mut raw = vec![0u8; self.sb.inode_size as usize];
        read_exact_at(&self.source, &mut raw, byte_offset)?;
        Inode::decode(&self.sb, number, &raw)
    }

    fn read_whole(&self, inode: &Inode) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; inode.size as usize];
        let n = reader::read_at(&self.sb, &self.source, inode, &mut buf, 0)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn child_map(&self, inode: &Inode) -> Result<ChildMap> {
        if inode.kind != Kind::Directory {
            return Err(Error::IsFile);
        }
        let data = self.read_whole(inode)?;
        ChildMap::decode(&data, self.sb.uses_filetype_dirent(), inode.is_htree_indexed())
    }

    /// Splits `path` on `/`, dropping empty components (collapsing `//` and a trailing `/`).
    /// There is no notion of a current working directory: any path, absolute or not, resolves
    /// starting from the image root.
    fn components(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|c| !c.is_empty())
    }

    /// Resolves `path` to its inode by walking component-by-component through directory child
    /// maps. `.` and `..` are ordinary lookups against the map (both are decoded entries of every
    /// real directory) — never synthesized, and never allowed to escape the image root, since a
    /// root directory's own `..` entry points back at itself on disk.
    fn resolve(&self, path: &str) -> Result<Inode> {
        let mut inode = self.load_inode(ROOT_INODE)?;
        for component in Self::components(path) {
            if inode.kind != Kind::Directory {
                return Err(Error::not_found(format!(
                    "{component:?}: not a directory"
                )));
            }
            let map = self.child_map(&inode)?;
            let entry = map
                .get(component)
                .ok_or_else(|| Error::not_found(component.to_string()))?;
            inode = self.load_inode(entry.inode)?;
        }
        Ok(inode)
    }

    /// Returns metadata for `path` without reading its content. `/` (and `""`) resolve to the
    /// root directory, inode 2.
    pub fn stat(&self, path: &str) -> Result<Stat> {
        Ok(Stat::from_inode(&self.resolve(path)?))
    }

    /// Resolves `path` to a directory and returns its non-dot, non-dotdot children.
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirListEntry>> {
        let inode = self.resolve(path)?;
        if inode.kind != Kind::Directory {
            return Err(Error::IsFile);
        }
        let map = self.child_map(&inode)?;
        Ok(map
            .entries()
            .map(|e| DirListEntry {
                name: e.name.clone(),
                inode_number: e.inode,
                kind: e.kind.unwrap_or(EntryKind::Unknown),
            })
            .collect())
    }

    /// Resolves `path` to a regular file or symlink and returns a positional/stream reader over
    /// it. Directories are refused with [`Error::IsDirectory`]; other inode kinds (device nodes,
    /// FIFOs, sockets) are refused with [`Error::Unsupported`] since this engine only decodes
    /// file data for regular files and symlinks.
    pub fn open_file(&self, path: &str) -> Result<FileReader<'_, S>> {
        let inode = self.resolve(path)?;
        match inode.kind {
            Kind::Directory => Err(Error::IsDirectory),
            Kind::Regular | Kind::Symlink => Ok(FileReader::new(&self.sb, &self.source, inode)),
            Kind::Other => Err(Error::unsupported("reads are refused for this inode kind")),
        }
    }

    /// Reads a symlink's target string. Does not follow the link — resolving the target path is
    /// the caller's responsibility and is out of scope for this engine.
    pub fn read_link(&self, path: &str) -> Result<String> {
        let inode = self.resolve(path)?;
        match inode.kind {
            Kind::Symlink => reader::symlink_target(&self.sb, &self.source, &inode),
            Kind::Directory => Err(Error::IsDirectory),
            Kind::Regular | Kind::Other => {
                Err(Error::invalid(format!("{path}: not a symlink")))
            }
        }
    }
}
