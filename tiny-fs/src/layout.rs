//! The on-disk records: superblock, inode, directory entry.

use core::fmt;

use crate::consts::{
    DIRENTS_PER_SECTOR, DIRENT_SIZE, FS_MAGIC, INODES_PER_SECTOR, INODE_RECORD_SIZE, MAX_NAME,
    MAX_SECTORS_PER_FILE, SECTOR_SIZE,
};

#[repr(C)]
pub struct SuperBlock {
    magic: u32,
}

impl SuperBlock {
    pub fn initialize(&mut self) {
        self.magic = FS_MAGIC;
    }

    pub fn is_valid(&self) -> bool {
        self.magic == FS_MAGIC
    }
}

pub type InodeKind = u32;

/// One inode record. `size` is bytes for files and the live entry count for
/// directories. `data[k] == 0` means the slot holds no sector; sector 0 is
/// the superblock and can never belong to a file.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DiskInode {
    pub size: u32,
    kind: InodeKind,
    pub data: [u32; MAX_SECTORS_PER_FILE],
}

const_assert_eq!(core::mem::size_of::<DiskInode>(), INODE_RECORD_SIZE);
const_assert_eq!(SECTOR_SIZE / INODE_RECORD_SIZE, INODES_PER_SECTOR);

impl DiskInode {
    pub const KIND_FILE: InodeKind = 0;
    pub const KIND_DIR: InodeKind = 1;

    pub fn init(&mut self, kind: InodeKind) {
        self.size = 0;
        self.kind = kind;
        self.data = [0; MAX_SECTORS_PER_FILE];
    }

    /// Zero the whole record (a cleared inode reads as an empty file).
    pub fn clear(&mut self) {
        self.init(Self::KIND_FILE);
    }

    pub fn kind(&self) -> InodeKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == Self::KIND_DIR
    }

    pub fn is_file(&self) -> bool {
        self.kind == Self::KIND_FILE
    }
}

/// A `(name, inode)` pair inside a directory's data sectors. The name is
/// NUL-terminated when shorter than `MAX_NAME`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DirEntry {
    name: [u8; MAX_NAME],
    inode: u32,
}

const_assert_eq!(core::mem::size_of::<DirEntry>(), DIRENT_SIZE);
const_assert_eq!(SECTOR_SIZE / DIRENT_SIZE, DIRENTS_PER_SECTOR);

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            name: [0; MAX_NAME],
            inode: 0,
        }
    }
}

impl DirEntry {
    pub fn new(name: &str, inode: u32) -> Self {
        let mut bytes = [0u8; MAX_NAME];
        let src = name.as_bytes();
        assert!(src.len() < MAX_NAME);
        bytes[..src.len()].copy_from_slice(src);
        Self { name: bytes, inode }
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    pub fn inode(&self) -> u32 {
        self.inode
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            core::slice::from_raw_parts(
                self as *const Self as *const _,
                core::mem::size_of::<Self>(),
            )
        }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe {
            core::slice::from_raw_parts_mut(
                self as *mut Self as *mut _,
                core::mem::size_of::<Self>(),
            )
        }
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DirEntry {{ name: {:?}, inode: {} }}",
            self.name(),
            self.inode
        )
    }
}
