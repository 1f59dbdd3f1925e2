//! The file-system handle: formatter, mounter, namespace mutators and the
//! directory read surface. Byte-level file I/O lives in `file`.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use log::{debug, warn};

use crate::bitmap::{Bitmap, BitmapAlloc};
use crate::block_dev::BlockDevice;
use crate::consts::{
    DATA_START_SECTOR, DIRENT_SIZE, INODE_BITMAP_SECTORS, INODE_BITMAP_START,
    INODE_TABLE_SECTORS, INODE_TABLE_START, MAX_FILES, MAX_OPEN_FILES, ROOT_INODE,
    SECTOR_BITMAP_SECTORS, SECTOR_BITMAP_START, SUPERBLOCK_SECTOR, TOTAL_SECTORS,
};
use crate::dir;
use crate::error::{FsError, FsResult};
use crate::file::OpenFile;
use crate::inode::{modify_inode, read_inode, InodeId};
use crate::layout::{DiskInode, InodeKind, SuperBlock};
use crate::path;
use crate::sector::SectorBuf;

/// Everything the file system owns, behind one handle: the device, both
/// bitmap allocators and the open-file table. All public operations go
/// through `&mut self`; there is no hidden global state.
pub struct FileSystem {
    pub(crate) device: Arc<dyn BlockDevice>,
    pub(crate) inode_bitmap: Bitmap,
    pub(crate) sector_bitmap: Bitmap,
    pub(crate) open_files: [OpenFile; MAX_OPEN_FILES],
}

pub struct FsStat {
    pub total_inodes: usize,
    pub free_inodes: usize,
    pub total_sectors: usize,
    pub free_sectors: usize,
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("inode_bitmap", &self.inode_bitmap)
            .field("sector_bitmap", &self.sector_bitmap)
            .finish()
    }
}

impl FileSystem {
    fn bitmaps() -> (Bitmap, Bitmap) {
        (
            Bitmap::new(INODE_BITMAP_START, INODE_BITMAP_SECTORS, MAX_FILES),
            Bitmap::new(SECTOR_BITMAP_START, SECTOR_BITMAP_SECTORS, TOTAL_SECTORS),
        )
    }

    /// Write a fresh file system onto the device: superblock magic, both
    /// bitmaps with their reserved bits, a zeroed inode table and the root
    /// directory at inode 0.
    pub fn format(device: Arc<dyn BlockDevice>) -> FsResult<Self> {
        let (inode_bitmap, sector_bitmap) = Self::bitmaps();

        let mut sb = SectorBuf::zeroed();
        sb.get_mut::<SuperBlock>(0).initialize();
        sb.write_to(&device, SUPERBLOCK_SECTOR)
            .map_err(|_| FsError::General)?;

        // inode 0 is the root; the sectors of regions 1-4 are never handed out
        inode_bitmap.init(&device, 1).map_err(|_| FsError::General)?;
        sector_bitmap
            .init(&device, DATA_START_SECTOR)
            .map_err(|_| FsError::General)?;

        let zero = SectorBuf::zeroed();
        for s in 0..INODE_TABLE_SECTORS {
            zero.write_to(&device, INODE_TABLE_START + s)
                .map_err(|_| FsError::General)?;
        }
        modify_inode(&device, ROOT_INODE, |n| n.init(DiskInode::KIND_DIR))
            .map_err(|_| FsError::General)?;
        debug!(
            "format: {} sectors, {} inodes, data region starts at sector {}",
            TOTAL_SECTORS, MAX_FILES, DATA_START_SECTOR
        );

        Ok(Self {
            device,
            inode_bitmap,
            sector_bitmap,
            open_files: [OpenFile::FREE; MAX_OPEN_FILES],
        })
    }

    /// Attach to an already formatted device after verifying the superblock.
    pub fn mount(device: Arc<dyn BlockDevice>) -> FsResult<Self> {
        let sb = SectorBuf::read_from(&device, SUPERBLOCK_SECTOR).map_err(|_| FsError::General)?;
        if !sb.get_ref::<SuperBlock>(0).is_valid() {
            warn!("mount: bad superblock magic");
            return Err(FsError::General);
        }
        let (inode_bitmap, sector_bitmap) = Self::bitmaps();
        Ok(Self {
            device,
            inode_bitmap,
            sector_bitmap,
            open_files: [OpenFile::FREE; MAX_OPEN_FILES],
        })
    }

    /// Flush the device to its backstore.
    pub fn sync(&self) -> FsResult<()> {
        self.device.sync().map_err(|_| FsError::General)
    }

    pub fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.device
    }

    pub fn stat(&self) -> FsResult<FsStat> {
        let inodes = self.inode_bitmap.stat(&self.device).map_err(|_| FsError::General)?;
        let sectors = self.sector_bitmap.stat(&self.device).map_err(|_| FsError::General)?;
        Ok(FsStat {
            total_inodes: inodes.total_bits,
            free_inodes: inodes.total_bits - inodes.used_bits,
            total_sectors: sectors.total_bits,
            free_sectors: sectors.total_bits - sectors.used_bits,
        })
    }
}

impl FileSystem {
    pub fn create_file(&mut self, path: &str) -> FsResult<()> {
        self.create_node(DiskInode::KIND_FILE, path)
    }

    pub fn create_dir(&mut self, path: &str) -> FsResult<()> {
        self.create_node(DiskInode::KIND_DIR, path)
    }

    fn create_node(&mut self, kind: InodeKind, path: &str) -> FsResult<()> {
        let resolved = path::resolve(&self.device, path).map_err(|_| FsError::Create)?;
        if resolved.child.is_some() {
            debug!("create: '{}' already exists", path);
            return Err(FsError::Create);
        }
        let inode = match self.inode_bitmap.alloc(&self.device) {
            Ok(Some(i)) => i as InodeId,
            Ok(None) => {
                debug!("create: inode table is full");
                return Err(FsError::Create);
            }
            Err(_) => return Err(FsError::Create),
        };
        if modify_inode(&self.device, inode, |n| n.init(kind)).is_err() {
            self.release_inode_bit(inode);
            return Err(FsError::Create);
        }
        if let Err(e) = dir::append_child(
            &self.device,
            &self.sector_bitmap,
            resolved.parent,
            &resolved.last_name,
            inode,
        ) {
            debug!("create: appending '{}' failed: {}", resolved.last_name, e);
            self.release_inode_bit(inode);
            return Err(FsError::Create);
        }
        debug!("create: '{}' -> inode {}", path, inode);
        Ok(())
    }

    pub fn unlink_file(&mut self, path: &str) -> FsResult<()> {
        self.unlink_node(DiskInode::KIND_FILE, path)
    }

    pub fn unlink_dir(&mut self, path: &str) -> FsResult<()> {
        self.unlink_node(DiskInode::KIND_DIR, path)
    }

    fn unlink_node(&mut self, kind: InodeKind, path: &str) -> FsResult<()> {
        let missing = if kind == DiskInode::KIND_DIR {
            FsError::NoSuchDir
        } else {
            FsError::NoSuchFile
        };
        let resolved = path::resolve(&self.device, path).map_err(|_| missing)?;
        let child = resolved.child.ok_or(missing)?;
        if child == ROOT_INODE {
            // "/" is the only parentless inode; unlinking it as a file is
            // just a kind mismatch
            return Err(if kind == DiskInode::KIND_DIR {
                FsError::RootDir
            } else {
                FsError::General
            });
        }
        if self.is_open(child) {
            debug!("unlink: inode {} is open", child);
            return Err(FsError::FileInUse);
        }
        self.remove_inode(kind, resolved.parent, child)?;
        debug!("unlink: '{}' removed (inode {})", path, child);
        Ok(())
    }

    /// Free the child's data sectors and inode, then drop its entry from
    /// the parent. The caller has already ruled out the root and open files.
    fn remove_inode(&mut self, kind: InodeKind, parent: InodeId, child: InodeId) -> FsResult<()> {
        let node = read_inode(&self.device, child, |n| *n).map_err(|_| FsError::General)?;
        if node.kind() != kind {
            return Err(FsError::General);
        }
        if node.is_dir() && node.size != 0 {
            return Err(FsError::DirNotEmpty);
        }
        for &sector in node.data.iter().filter(|&&s| s != 0) {
            self.sector_bitmap
                .dealloc(&self.device, sector as usize)
                .map_err(|_| FsError::General)?;
        }
        self.inode_bitmap
            .dealloc(&self.device, child as usize)
            .map_err(|_| FsError::General)?;
        modify_inode(&self.device, child, |n| n.clear()).map_err(|_| FsError::General)?;
        dir::remove_child(&self.device, &self.sector_bitmap, parent, child)
    }

    /// Byte size of the packed entry array (`entries * DIRENT_SIZE`).
    pub fn dir_size(&self, path: &str) -> FsResult<usize> {
        let child = self.resolve_dir(path)?;
        read_inode(&self.device, child, |n| {
            if n.is_dir() {
                Ok(n.size as usize * DIRENT_SIZE)
            } else {
                Err(FsError::General)
            }
        })
        .map_err(|_| FsError::General)?
    }

    /// Copy the raw packed directory entries into `buf`, insertion order;
    /// returns the entry count. `buf` must hold at least `dir_size` bytes.
    pub fn dir_read(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        let child = self.resolve_dir(path)?;
        dir::read_entries(&self.device, child, buf)
    }

    /// Entry names in insertion order.
    pub fn list(&self, path: &str) -> FsResult<Vec<String>> {
        let child = self.resolve_dir(path)?;
        dir::list(&self.device, child)
    }

    fn resolve_dir(&self, path: &str) -> FsResult<InodeId> {
        let resolved = path::resolve(&self.device, path).map_err(|_| FsError::NoSuchDir)?;
        resolved.child.ok_or(FsError::NoSuchDir)
    }

    pub(crate) fn is_open(&self, inode: InodeId) -> bool {
        self.open_files.iter().any(|f| f.inode == inode)
    }

    fn release_inode_bit(&self, inode: InodeId) {
        if self.inode_bitmap.dealloc(&self.device, inode as usize).is_err() {
            warn!("failed to release provisional inode {}", inode);
        }
    }
}
