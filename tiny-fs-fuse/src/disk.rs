use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use tiny_fs::consts::{SECTOR_SIZE, TOTAL_SECTORS};
use tiny_fs::{BlockDevice, DiskError};

/// Byte length of a full disk image.
pub const DISK_BYTES: usize = SECTOR_SIZE * TOTAL_SECTORS;

/// The simulated disk: every sector lives in memory, and the whole image is
/// loaded from / saved to a single backing file.
pub struct MemDisk {
    path: PathBuf,
    image: Mutex<Vec<u8>>,
}

impl MemDisk {
    /// A zero-filled disk that will save to `path`.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            image: Mutex::new(vec![0; DISK_BYTES]),
        }
    }

    /// Load an existing image; the backing file must be exactly one disk
    /// long.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_owned();
        let mut file = fs::File::open(&path)?;
        let mut image = Vec::with_capacity(DISK_BYTES);
        file.read_to_end(&mut image)?;
        if image.len() != DISK_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image is {} bytes, expected {}", image.len(), DISK_BYTES),
            ));
        }
        debug!("disk: loaded image from {}", path.display());
        Ok(Self {
            path,
            image: Mutex::new(image),
        })
    }

    /// Write the whole image back to the backing file.
    pub fn save(&self) -> io::Result<()> {
        let image = self.image.lock().unwrap();
        let mut file = fs::File::create(&self.path)?;
        file.write_all(&image)?;
        file.flush()?;
        debug!("disk: saved image to {}", self.path.display());
        Ok(())
    }
}

impl BlockDevice for MemDisk {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) -> Result<(), DiskError> {
        assert_eq!(buf.len(), SECTOR_SIZE, "not a complete sector");
        if sector >= TOTAL_SECTORS {
            return Err(DiskError::OutOfRange(sector));
        }
        let image = self.image.lock().unwrap();
        let start = sector * SECTOR_SIZE;
        buf.copy_from_slice(&image[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) -> Result<(), DiskError> {
        assert_eq!(buf.len(), SECTOR_SIZE, "not a complete sector");
        if sector >= TOTAL_SECTORS {
            return Err(DiskError::OutOfRange(sector));
        }
        let mut image = self.image.lock().unwrap();
        let start = sector * SECTOR_SIZE;
        image[start..start + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&self) -> Result<(), DiskError> {
        self.save().map_err(|e| {
            warn!("disk: save failed: {}", e);
            DiskError::Io
        })
    }
}
