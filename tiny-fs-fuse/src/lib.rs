mod disk;
pub use disk::{MemDisk, DISK_BYTES};

use std::io;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use tiny_fs::{FileSystem, FsError, FsResult};

/// Bring the file system up from `path`. A missing backing file gets a
/// freshly formatted image, persisted immediately; any other load failure
/// (wrong length, unreadable file, bad magic) is an error and never
/// triggers a reformat.
pub fn boot(path: impl AsRef<Path>) -> FsResult<FileSystem> {
    let path = path.as_ref();
    match MemDisk::load(path) {
        Ok(disk) => {
            debug!("boot: mounting existing image {}", path.display());
            FileSystem::mount(Arc::new(disk))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("boot: formatting new image {}", path.display());
            let fs = FileSystem::format(Arc::new(MemDisk::create(path)))?;
            fs.sync()?;
            Ok(fs)
        }
        Err(e) => {
            warn!("boot: cannot load {}: {}", path.display(), e);
            Err(FsError::General)
        }
    }
}

pub mod test_utils {
    use super::*;
    use log::LevelFilter;
    use simple_logger::SimpleLogger;
    use std::path::PathBuf;

    pub fn setup_logger(filter: LevelFilter) {
        let _ = SimpleLogger::new().with_level(filter).init();
    }

    /// Per-test image path under the system temp directory.
    pub fn img_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tiny_fs_{name}.img"))
    }

    /// Boot from a guaranteed-fresh image.
    pub fn fresh_fs(name: &str) -> FileSystem {
        let path = img_path(name);
        std::fs::remove_file(&path).ok();
        boot(&path).expect("boot on a fresh image")
    }

    /// Boot again from whatever the named image currently holds.
    pub fn reboot(name: &str) -> FsResult<FileSystem> {
        boot(img_path(name))
    }
}
