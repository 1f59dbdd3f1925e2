use thiserror::Error;

/// Failure kinds surfaced by the public API. Internal helpers report their
/// own sentinels; the operation that called them picks the kind the caller
/// sees, so the same low-level failure can surface differently per entry
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("create failed")]
    Create,
    #[error("no such file")]
    NoSuchFile,
    #[error("no such directory")]
    NoSuchDir,
    #[error("directory not empty")]
    DirNotEmpty,
    #[error("the root directory cannot be unlinked")]
    RootDir,
    #[error("file is in use")]
    FileInUse,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("bad file descriptor")]
    BadFd,
    #[error("seek out of bounds")]
    SeekOutOfBounds,
    #[error("file too big")]
    FileTooBig,
    #[error("no space left on disk")]
    NoSpace,
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("general failure")]
    General,
}

pub type FsResult<T> = Result<T, FsError>;
