#![no_std]

extern crate alloc;

#[macro_use]
extern crate static_assertions;

// disk layout: superblock, inode bitmap, sector bitmap, inode table, data
pub mod consts;
pub mod layout;

// bit allocators backing both the inode table and the data region
pub mod bitmap;

// sector-granular device contract and the transient sector buffer
pub mod block_dev;
pub mod sector;

// inode table access, directory entries, absolute-path resolution
pub mod dir;
pub mod inode;
pub mod path;

// the file-system handle: formatter, namespace mutators, open-file I/O
pub mod error;
pub mod file;
pub mod fs;

pub use bitmap::{Bitmap, BitmapAlloc, BitmapStat};
pub use block_dev::{BlockDevice, DiskError};
pub use error::{FsError, FsResult};
pub use file::OpenFile;
pub use fs::{FileSystem, FsStat};
pub use inode::InodeId;
