use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpatialError {
    #[error("invalid spatial index magic header")]
    InvalidMagic,
    #[error("unsupported spatial index version {0}")]
    UnsupportedVersion(u32),
    #[error("spatial index deserialization exceeded maximum depth {0}, stream is corrupted")]
    DepthExceeded(usize),
    #[error("unreasonable item count {count} in spatial index leaf at depth {depth}, stream is corrupted")]
    ItemCountExceeded { count: u64, depth: usize },
    #[error("unreasonable child count {count} in spatial index node at depth {depth}, stream is corrupted")]
    ChildCountExceeded { count: u64, depth: usize },
    #[error("non-finite bounding box coordinate in spatial index at depth {0}, stream is corrupted")]
    NonFiniteBounds(usize),
    #[error("failure reading spatial index stream: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl SpatialError {
    /// true when the error indicates a malformed stream rather than a
    /// transient I/O condition. corruption is never retried by callers.
    pub fn is_corruption(&self) -> bool {
        match self {
            SpatialError::InvalidMagic
            | SpatialError::UnsupportedVersion(_)
            | SpatialError::DepthExceeded(_)
            | SpatialError::ItemCountExceeded { .. }
            | SpatialError::ChildCountExceeded { .. }
            | SpatialError::NonFiniteBounds(_) => true,
            SpatialError::Io { source } => source.kind() == std::io::ErrorKind::UnexpectedEof,
        }
    }
}
