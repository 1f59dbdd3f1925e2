use alloc::sync::Arc;

use crate::block_dev::{BlockDevice, DiskError};
use crate::consts::SECTOR_SIZE;

/// The transient one-sector buffer every read-modify-write goes through.
/// 8-aligned so the typed views below are always properly placed for the
/// on-disk records (whose offsets within a sector are all multiples of 4).
#[repr(C, align(8))]
pub struct SectorBuf([u8; SECTOR_SIZE]);

impl SectorBuf {
    pub const fn zeroed() -> Self {
        Self([0; SECTOR_SIZE])
    }

    pub fn read_from(device: &Arc<dyn BlockDevice>, sector: usize) -> Result<Self, DiskError> {
        let mut buf = Self::zeroed();
        device.read_sector(sector, &mut buf.0)?;
        Ok(buf)
    }

    pub fn write_to(&self, device: &Arc<dyn BlockDevice>, sector: usize) -> Result<(), DiskError> {
        device.write_sector(sector, &self.0)
    }

    pub fn bytes(&self) -> &[u8; SECTOR_SIZE] {
        &self.0
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; SECTOR_SIZE] {
        &mut self.0
    }

    pub fn get_ref<T>(&self, offset: usize) -> &T
    where
        T: Sized,
    {
        let type_size = core::mem::size_of::<T>();
        assert!(offset + type_size <= SECTOR_SIZE);
        let addr = &self.0[offset] as *const u8;
        debug_assert_eq!(addr as usize % core::mem::align_of::<T>(), 0);
        unsafe { &*(addr as *const T) }
    }

    pub fn get_mut<T>(&mut self, offset: usize) -> &mut T
    where
        T: Sized,
    {
        let type_size = core::mem::size_of::<T>();
        assert!(offset + type_size <= SECTOR_SIZE);
        let addr = &mut self.0[offset] as *mut u8;
        debug_assert_eq!(addr as usize % core::mem::align_of::<T>(), 0);
        unsafe { &mut *(addr as *mut T) }
    }
}
