use alloc::sync::Arc;

use crate::block_dev::{BlockDevice, DiskError};
use crate::consts::{INODES_PER_SECTOR, INODE_RECORD_SIZE, INODE_TABLE_START};
use crate::layout::DiskInode;
use crate::sector::SectorBuf;

/// Index of an inode in the inode table.
pub type InodeId = u32;

/// Owning sector and byte offset of inode `id`. Records never straddle a
/// sector boundary.
pub fn inode_pos(id: InodeId) -> (usize, usize) {
    let sector = INODE_TABLE_START + id as usize / INODES_PER_SECTOR;
    let offset = (id as usize % INODES_PER_SECTOR) * INODE_RECORD_SIZE;
    (sector, offset)
}

pub fn read_inode<V>(
    device: &Arc<dyn BlockDevice>,
    id: InodeId,
    f: impl FnOnce(&DiskInode) -> V,
) -> Result<V, DiskError> {
    let (sector, offset) = inode_pos(id);
    let buf = SectorBuf::read_from(device, sector)?;
    Ok(f(buf.get_ref::<DiskInode>(offset)))
}

/// Read-modify-write of one inode through its owning sector.
pub fn modify_inode<V>(
    device: &Arc<dyn BlockDevice>,
    id: InodeId,
    f: impl FnOnce(&mut DiskInode) -> V,
) -> Result<V, DiskError> {
    let (sector, offset) = inode_pos(id);
    let mut buf = SectorBuf::read_from(device, sector)?;
    let val = f(buf.get_mut::<DiskInode>(offset));
    buf.write_to(device, sector)?;
    Ok(val)
}
