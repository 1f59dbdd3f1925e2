//! The open-file table and byte-level read/write/seek on top of an inode's
//! direct sector list.

use alloc::vec::Vec;

use log::{debug, warn};

use crate::bitmap::BitmapAlloc;
use crate::consts::{MAX_OPEN_FILES, MAX_SECTORS_PER_FILE, SECTOR_SIZE};
use crate::error::{FsError, FsResult};
use crate::fs::FileSystem;
use crate::inode::{modify_inode, read_inode};
use crate::path;
use crate::sector::SectorBuf;

/// One slot of the open-file table. `inode == 0` marks the slot unused;
/// inode 0 is the root directory, which can never be opened as a file.
/// `size` caches the file's length at open time and tracks every write
/// through this descriptor; `pos` is the next byte to read or write.
#[derive(Debug, Clone, Copy)]
pub struct OpenFile {
    pub inode: u32,
    pub size: u32,
    pub pos: u32,
}

impl OpenFile {
    pub const FREE: OpenFile = OpenFile {
        inode: 0,
        size: 0,
        pos: 0,
    };

    pub fn in_use(&self) -> bool {
        self.inode != 0
    }
}

impl FileSystem {
    /// Open an existing regular file and return its descriptor.
    pub fn open(&mut self, path: &str) -> FsResult<usize> {
        let resolved = path::resolve(&self.device, path).map_err(|_| FsError::NoSuchFile)?;
        let inode = resolved.child.ok_or(FsError::NoSuchFile)?;
        let node = read_inode(&self.device, inode, |n| *n).map_err(|_| FsError::General)?;
        if !node.is_file() {
            debug!("open: '{}' is not a regular file", path);
            return Err(FsError::General);
        }
        let fd = self
            .open_files
            .iter()
            .position(|f| !f.in_use())
            .ok_or(FsError::TooManyOpenFiles)?;
        self.open_files[fd] = OpenFile {
            inode,
            size: node.size,
            pos: 0,
        };
        debug!("open: '{}' -> fd {} (inode {}, {} bytes)", path, fd, inode, node.size);
        Ok(fd)
    }

    pub fn close(&mut self, fd: usize) -> FsResult<()> {
        self.checked_slot(fd)?;
        self.open_files[fd] = OpenFile::FREE;
        Ok(())
    }

    /// Reposition `fd`; the target must stay within `[0, size]`.
    pub fn seek(&mut self, fd: usize, offset: usize) -> FsResult<()> {
        let slot = self.checked_slot(fd)?;
        if offset > slot.size as usize {
            return Err(FsError::SeekOutOfBounds);
        }
        self.open_files[fd].pos = offset as u32;
        Ok(())
    }

    /// Read up to `buf.len()` bytes from the descriptor's position, stopping
    /// at end of file. Returns the byte count.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> FsResult<usize> {
        let slot = self.checked_slot(fd)?;
        let node = read_inode(&self.device, slot.inode, |n| *n).map_err(|_| FsError::General)?;
        let pos = slot.pos as usize;
        let end = (slot.size as usize).min(pos + buf.len());
        let mut count = 0;
        let mut group = pos / SECTOR_SIZE;
        let mut offset = pos % SECTOR_SIZE;
        while pos + count < end && group < MAX_SECTORS_PER_FILE && node.data[group] != 0 {
            let sbuf = SectorBuf::read_from(&self.device, node.data[group] as usize)
                .map_err(|_| FsError::General)?;
            let chunk = (SECTOR_SIZE - offset).min(end - pos - count);
            buf[count..count + chunk].copy_from_slice(&sbuf.bytes()[offset..offset + chunk]);
            count += chunk;
            group += 1;
            offset = 0;
        }
        self.open_files[fd].pos += count as u32;
        Ok(count)
    }

    /// Write `buf` at the descriptor's position. Sectors already assigned
    /// to the touched positions are overwritten in place; the rest are
    /// freshly allocated and zero-filled first. Everything written before a
    /// mid-stream failure stays linked and sized, so nothing leaks.
    pub fn write(&mut self, fd: usize, buf: &[u8]) -> FsResult<usize> {
        let slot = self.checked_slot(fd)?;
        let mut node = read_inode(&self.device, slot.inode, |n| *n).map_err(|_| FsError::General)?;
        let pos = slot.pos as usize;
        let total = buf.len();
        let mut count = 0;
        let mut group = pos / SECTOR_SIZE;
        let mut offset = pos % SECTOR_SIZE;
        let mut fresh_sectors: Vec<usize> = Vec::new();
        let mut dirty = false;
        let mut result = Ok(());
        while count < total {
            if group >= MAX_SECTORS_PER_FILE {
                result = Err(FsError::FileTooBig);
                break;
            }
            let chunk = (SECTOR_SIZE - offset).min(total - count);
            let sector;
            let mut sbuf;
            if node.data[group] == 0 {
                sector = match self.sector_bitmap.alloc(&self.device) {
                    Ok(Some(s)) => s,
                    Ok(None) => {
                        result = Err(FsError::NoSpace);
                        break;
                    }
                    Err(_) => {
                        result = Err(FsError::General);
                        break;
                    }
                };
                node.data[group] = sector as u32;
                fresh_sectors.push(sector);
                dirty = true;
                sbuf = SectorBuf::zeroed();
            } else {
                sector = node.data[group] as usize;
                sbuf = match SectorBuf::read_from(&self.device, sector) {
                    Ok(b) => b,
                    Err(_) => {
                        result = Err(FsError::General);
                        break;
                    }
                };
            }
            sbuf.bytes_mut()[offset..offset + chunk].copy_from_slice(&buf[count..count + chunk]);
            if sbuf.write_to(&self.device, sector).is_err() {
                result = Err(FsError::General);
                break;
            }
            dirty = true;
            count += chunk;
            group += 1;
            offset = 0;
        }
        if dirty {
            let new_size = (slot.size as usize).max(pos + count) as u32;
            node.size = new_size;
            if modify_inode(&self.device, slot.inode, |n| *n = node).is_err() {
                // the on-disk inode never saw these sectors; hand them back
                for sector in fresh_sectors {
                    if self.sector_bitmap.dealloc(&self.device, sector).is_err() {
                        warn!("write: failed to release provisional sector {}", sector);
                    }
                }
                return Err(FsError::General);
            }
            self.open_files[fd].size = new_size;
            self.open_files[fd].pos = (pos + count) as u32;
        }
        result?;
        debug!("write: fd {} wrote {} bytes at {}", fd, count, pos);
        Ok(count)
    }

    fn checked_slot(&self, fd: usize) -> FsResult<OpenFile> {
        if fd >= MAX_OPEN_FILES {
            return Err(FsError::BadFd);
        }
        let slot = self.open_files[fd];
        if !slot.in_use() {
            return Err(FsError::BadFd);
        }
        Ok(slot)
    }
}
