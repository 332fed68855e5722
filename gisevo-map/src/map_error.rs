use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("map file not found: {0}")]
    NotFound(PathBuf),
    #[error("invalid map file format: {0}")]
    InvalidFormat(String),
    #[error("a map load is already in progress")]
    LoadInProgress,
    #[error("failure reading map file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
