use std::path::PathBuf;

use thiserror::Error;

/// stable classification carried by every cache failure; collaborators
/// branch on this rather than on message text
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheErrorKind {
    #[default]
    NoError,
    FileNotFound,
    FileCorrupted,
    VersionMismatch,
    ChecksumMismatch,
    PermissionDenied,
    DiskSpaceError,
    SerializationError,
    DeserializationError,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache file not found: {0}")]
    NotFound(PathBuf),
    #[error("cache file corrupted: {0}")]
    Corrupted(String),
    #[error("cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("source file checksum mismatch: {0}")]
    ChecksumMismatch(String),
    #[error("insufficient disk space: {0}")]
    DiskSpace(String),
    #[error("failure serializing cache: {0}")]
    Serialization(String),
    #[error("failure deserializing cache: {0}")]
    Deserialization(String),
    #[error("cache I/O failure: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl CacheError {
    pub fn kind(&self) -> CacheErrorKind {
        match self {
            CacheError::NotFound(_) => CacheErrorKind::FileNotFound,
            CacheError::Corrupted(_) => CacheErrorKind::FileCorrupted,
            CacheError::VersionMismatch { .. } => CacheErrorKind::VersionMismatch,
            CacheError::ChecksumMismatch(_) => CacheErrorKind::ChecksumMismatch,
            CacheError::DiskSpace(_) => CacheErrorKind::DiskSpaceError,
            CacheError::Serialization(_) => CacheErrorKind::SerializationError,
            CacheError::Deserialization(_) => CacheErrorKind::DeserializationError,
            CacheError::Io { source } => match source.kind() {
                std::io::ErrorKind::NotFound => CacheErrorKind::FileNotFound,
                std::io::ErrorKind::PermissionDenied => CacheErrorKind::PermissionDenied,
                _ => CacheErrorKind::FileCorrupted,
            },
        }
    }

    /// only transient I/O conditions are worth another attempt; corruption,
    /// version mismatches, and missing files never heal by retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            CacheError::Io { source } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// corruption-class failures cause the cache file to be deleted
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.kind(),
            CacheErrorKind::FileCorrupted | CacheErrorKind::DeserializationError
        )
    }
}

impl From<gisevo_spatial::SpatialError> for CacheError {
    fn from(error: gisevo_spatial::SpatialError) -> CacheError {
        if error.is_corruption() {
            CacheError::Corrupted(error.to_string())
        } else {
            CacheError::Deserialization(error.to_string())
        }
    }
}
