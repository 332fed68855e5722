mod binary_read;
mod mapped_file;
pub mod osm_format;
pub mod streets_format;

#[cfg(test)]
pub(crate) mod fixtures;

pub use binary_read::{BinaryRead, SliceReader, StreamReader};
pub use mapped_file::MappedFile;
