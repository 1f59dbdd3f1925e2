//! Directory-entry operations over a directory inode's data sectors.
//!
//! A directory with `size` entries keeps them packed: entry `e` lives in
//! group `e / DIRENTS_PER_SECTOR` at slot `e % DIRENTS_PER_SECTOR`, and
//! removal moves the last live entry into the vacated slot so the packing
//! never develops holes.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{debug, warn};

use crate::bitmap::{Bitmap, BitmapAlloc};
use crate::block_dev::BlockDevice;
use crate::consts::{DIRENTS_PER_SECTOR, DIRENT_SIZE, MAX_SECTORS_PER_FILE};
use crate::error::{FsError, FsResult};
use crate::inode::{modify_inode, read_inode, InodeId};
use crate::layout::DirEntry;
use crate::sector::SectorBuf;

fn group_of(entry: usize) -> usize {
    entry / DIRENTS_PER_SECTOR
}

fn slot_offset(entry: usize) -> usize {
    (entry % DIRENTS_PER_SECTOR) * DIRENT_SIZE
}

/// Look `name` up among the first `size` entries of `parent`.
pub fn find_child(
    device: &Arc<dyn BlockDevice>,
    parent: InodeId,
    name: &str,
) -> FsResult<Option<InodeId>> {
    let node = read_inode(device, parent, |n| *n).map_err(|_| FsError::General)?;
    if !node.is_dir() {
        return Err(FsError::General);
    }
    let mut remaining = node.size as usize;
    let mut group = 0;
    while remaining > 0 {
        let buf = SectorBuf::read_from(device, node.data[group] as usize)
            .map_err(|_| FsError::General)?;
        let in_this = remaining.min(DIRENTS_PER_SECTOR);
        for slot in 0..in_this {
            let entry = buf.get_ref::<DirEntry>(slot * DIRENT_SIZE);
            if entry.name() == name {
                debug!("dir: '{}' -> inode {}", name, entry.inode());
                return Ok(Some(entry.inode()));
            }
        }
        remaining -= in_this;
        group += 1;
    }
    Ok(None)
}

/// Append an entry for `child`, growing the directory by a fresh data
/// sector whenever the last one is full. The fresh sector is released again
/// if a later write fails.
pub fn append_child(
    device: &Arc<dyn BlockDevice>,
    sector_bitmap: &Bitmap,
    parent: InodeId,
    name: &str,
    child: InodeId,
) -> FsResult<()> {
    let node = read_inode(device, parent, |n| *n).map_err(|_| FsError::General)?;
    if !node.is_dir() {
        return Err(FsError::General);
    }
    let entries = node.size as usize;
    let group = group_of(entries);
    if group >= MAX_SECTORS_PER_FILE {
        debug!("dir: inode {} is full", parent);
        return Err(FsError::NoSpace);
    }

    let entry = DirEntry::new(name, child);
    let fresh = entries % DIRENTS_PER_SECTOR == 0;
    let sector;
    if fresh {
        sector = match sector_bitmap.alloc(device).map_err(|_| FsError::General)? {
            Some(s) => s,
            None => return Err(FsError::NoSpace),
        };
        let mut buf = SectorBuf::zeroed();
        *buf.get_mut::<DirEntry>(0) = entry;
        if buf.write_to(device, sector).is_err() {
            release(sector_bitmap, device, sector);
            return Err(FsError::General);
        }
    } else {
        sector = node.data[group] as usize;
        let mut buf = SectorBuf::read_from(device, sector).map_err(|_| FsError::General)?;
        *buf.get_mut::<DirEntry>(slot_offset(entries)) = entry;
        buf.write_to(device, sector).map_err(|_| FsError::General)?;
    }

    let persisted = modify_inode(device, parent, |n| {
        if fresh {
            n.data[group] = sector as u32;
        }
        n.size += 1;
    });
    if persisted.is_err() {
        if fresh {
            release(sector_bitmap, device, sector);
        }
        return Err(FsError::General);
    }
    debug!("dir: '{}' (inode {}) appended as entry {} of inode {}", name, child, entries, parent);
    Ok(())
}

/// Drop the entry pointing at `child`. The last live entry moves into the
/// vacated slot, and a dirent sector emptied by the removal goes back to
/// the allocator.
pub fn remove_child(
    device: &Arc<dyn BlockDevice>,
    sector_bitmap: &Bitmap,
    parent: InodeId,
    child: InodeId,
) -> FsResult<()> {
    let node = read_inode(device, parent, |n| *n).map_err(|_| FsError::General)?;
    if !node.is_dir() {
        return Err(FsError::General);
    }
    let entries = node.size as usize;

    let mut hole = None;
    let mut remaining = entries;
    let mut group = 0;
    'scan: while remaining > 0 {
        let buf = SectorBuf::read_from(device, node.data[group] as usize)
            .map_err(|_| FsError::General)?;
        let in_this = remaining.min(DIRENTS_PER_SECTOR);
        for slot in 0..in_this {
            if buf.get_ref::<DirEntry>(slot * DIRENT_SIZE).inode() == child {
                hole = Some(group * DIRENTS_PER_SECTOR + slot);
                break 'scan;
            }
        }
        remaining -= in_this;
        group += 1;
    }
    let hole = hole.ok_or(FsError::General)?;
    let last = entries - 1;
    let hole_group = group_of(hole);
    let last_group = group_of(last);
    let hole_sector = node.data[hole_group] as usize;
    let last_sector = node.data[last_group] as usize;

    let mut hole_buf =
        SectorBuf::read_from(device, hole_sector).map_err(|_| FsError::General)?;
    if hole != last {
        let moved = if hole_group == last_group {
            *hole_buf.get_ref::<DirEntry>(slot_offset(last))
        } else {
            let mut last_buf =
                SectorBuf::read_from(device, last_sector).map_err(|_| FsError::General)?;
            let entry = *last_buf.get_ref::<DirEntry>(slot_offset(last));
            *last_buf.get_mut::<DirEntry>(slot_offset(last)) = DirEntry::default();
            last_buf.write_to(device, last_sector).map_err(|_| FsError::General)?;
            entry
        };
        *hole_buf.get_mut::<DirEntry>(slot_offset(hole)) = moved;
    }
    if hole_group == last_group {
        *hole_buf.get_mut::<DirEntry>(slot_offset(last)) = DirEntry::default();
    }
    hole_buf.write_to(device, hole_sector).map_err(|_| FsError::General)?;

    // the last entry was alone in its group: that sector is now empty
    let free_trailing = last % DIRENTS_PER_SECTOR == 0;
    modify_inode(device, parent, |n| {
        if n.size > 0 {
            n.size -= 1;
        }
        if free_trailing {
            n.data[last_group] = 0;
        }
    })
    .map_err(|_| FsError::General)?;
    if free_trailing {
        sector_bitmap
            .dealloc(device, last_sector)
            .map_err(|_| FsError::General)?;
    }
    debug!("dir: inode {} removed from inode {}, {} entries left", child, parent, last);
    Ok(())
}

/// Copy the packed entry array into `buf`; returns the entry count.
pub fn read_entries(
    device: &Arc<dyn BlockDevice>,
    dir: InodeId,
    buf: &mut [u8],
) -> FsResult<usize> {
    let node = read_inode(device, dir, |n| *n).map_err(|_| FsError::General)?;
    if !node.is_dir() {
        return Err(FsError::General);
    }
    let entries = node.size as usize;
    if buf.len() < entries * DIRENT_SIZE {
        return Err(FsError::BufferTooSmall);
    }
    let mut copied = 0;
    let mut remaining = entries;
    let mut group = 0;
    while remaining > 0 {
        let sbuf = SectorBuf::read_from(device, node.data[group] as usize)
            .map_err(|_| FsError::General)?;
        let in_this = remaining.min(DIRENTS_PER_SECTOR);
        let bytes = in_this * DIRENT_SIZE;
        buf[copied..copied + bytes].copy_from_slice(&sbuf.bytes()[..bytes]);
        copied += bytes;
        remaining -= in_this;
        group += 1;
    }
    Ok(entries)
}

/// Entry names in insertion order.
pub fn list(device: &Arc<dyn BlockDevice>, dir: InodeId) -> FsResult<Vec<String>> {
    let node = read_inode(device, dir, |n| *n).map_err(|_| FsError::General)?;
    if !node.is_dir() {
        return Err(FsError::General);
    }
    let mut names = Vec::with_capacity(node.size as usize);
    let mut remaining = node.size as usize;
    let mut group = 0;
    while remaining > 0 {
        let buf = SectorBuf::read_from(device, node.data[group] as usize)
            .map_err(|_| FsError::General)?;
        let in_this = remaining.min(DIRENTS_PER_SECTOR);
        for slot in 0..in_this {
            names.push(buf.get_ref::<DirEntry>(slot * DIRENT_SIZE).name().to_string());
        }
        remaining -= in_this;
        group += 1;
    }
    Ok(names)
}

fn release(bitmap: &Bitmap, device: &Arc<dyn BlockDevice>, sector: usize) {
    if bitmap.dealloc(device, sector).is_err() {
        warn!("dir: failed to release provisional sector {}", sector);
    }
}
