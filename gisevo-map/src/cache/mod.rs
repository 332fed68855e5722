mod cache_error;
mod checksum;
mod manager;
mod metadata;
mod serializer;
mod wire;

pub use cache_error::{CacheError, CacheErrorKind};
pub use checksum::{checksum_of_bytes, compute_file_checksum, CHECKSUM_LENGTH};
pub use manager::{CacheConfig, CacheLog, CacheManager, ValidationResult};
pub use metadata::{CacheMetadata, CACHE_MAGIC, CACHE_VERSION};
