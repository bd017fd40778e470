//! error type shared by every layer of the filesystem
use thiserror::Error;

/// coarse classification of a [FsError]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// malformed arguments
    Validation,
    /// no free inode or block, or a full directory / credential table
    Capacity,
    /// failure of the backing store
    Io,
    /// the image is foreign or corrupted
    Integrity,
    /// the operation needs a mounted volume
    State,
    /// the current user may not do this
    Permission,
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("no space left: {0}")]
    Capacity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted or foreign image: {0}")]
    Integrity(String),

    #[error("record codec error: {0}")]
    Codec(String),

    #[error("no filesystem is mounted")]
    NotMounted,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("authentication failed for user '{0}'")]
    Authentication(String),
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::Validation(_)
            | FsError::NotFound(_)
            | FsError::AlreadyExists(_)
            | FsError::Authentication(_) => ErrorKind::Validation,
            FsError::Capacity(_) => ErrorKind::Capacity,
            FsError::Io(_) => ErrorKind::Io,
            FsError::Integrity(_) | FsError::Codec(_) => ErrorKind::Integrity,
            FsError::NotMounted => ErrorKind::State,
            FsError::PermissionDenied(_) => ErrorKind::Permission,
        }
    }
}

impl From<bincode::error::EncodeError> for FsError {
    fn from(e: bincode::error::EncodeError) -> Self {
        FsError::Codec(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for FsError {
    fn from(e: bincode::error::DecodeError) -> Self {
        FsError::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
