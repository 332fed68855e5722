use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::Level;

use super::checksum;
use super::serializer;
use super::wire;
use super::{CacheError, CacheErrorKind, CacheMetadata, CACHE_MAGIC, CACHE_VERSION};
use crate::database::MapDatabase;

/// behavior switches for cache validation and recovery
#[derive(Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// recover automatically from cache errors instead of surfacing them
    pub enable_auto_recovery: bool,
    /// reject undersized or structurally damaged cache files
    pub enable_corruption_detection: bool,
    /// reject caches written by a different format version
    pub enable_version_validation: bool,
    /// reject caches whose source binaries have changed
    pub enable_checksum_validation: bool,
    /// fall back to a from-binaries rebuild when the cache cannot be used
    pub enable_fallback_loading: bool,
    /// delete cache files that failed validation or loading
    pub enable_cache_cleanup: bool,
    /// additionally dry-parse the serialized spatial indexes on validate
    pub enable_deep_validation: bool,
    pub max_retry_attempts: u32,
    /// files below this size cannot possibly be a cache
    pub corruption_threshold_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enable_auto_recovery: true,
            enable_corruption_detection: true,
            enable_version_validation: true,
            enable_checksum_validation: true,
            enable_fallback_loading: true,
            enable_cache_cleanup: true,
            enable_deep_validation: false,
            max_retry_attempts: 3,
            corruption_threshold_bytes: 1024,
        }
    }
}

/// structured log sink for cache events. the default forwards to the `log`
/// facade; embedders inject their own to capture status-line text.
pub trait CacheLog: Send + Sync {
    fn on_event(&self, level: Level, message: &str);
}

struct FacadeLog;

impl CacheLog for FacadeLog {
    fn on_event(&self, level: Level, message: &str) {
        log::log!(level, "{message}");
    }
}

/// outcome of cache validation: both the boolean and the error kind, plus
/// whatever was recoverable from the metadata block
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub exists: bool,
    pub reason: String,
    pub detailed_error: String,
    pub error_kind: CacheErrorKind,
    pub metadata: Option<CacheMetadata>,
    /// freshly computed source checksums, when checksum validation ran
    pub streets_checksum: String,
    pub osm_checksum: String,
}

/// validates, loads, writes, repairs, and backs up the single-file cache.
/// loads and saves run inside a bounded retry loop with exponential
/// backoff; corruption and version mismatches never retry.
pub struct CacheManager {
    config: CacheConfig,
    log: Box<dyn CacheLog>,
}

impl Default for CacheManager {
    fn default() -> Self {
        CacheManager::new()
    }
}

impl CacheManager {
    pub fn new() -> CacheManager {
        CacheManager::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> CacheManager {
        CacheManager {
            config,
            log: Box::new(FacadeLog),
        }
    }

    pub fn with_logger(config: CacheConfig, log: Box<dyn CacheLog>) -> CacheManager {
        CacheManager { config, log }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CacheConfig) {
        self.config = config;
    }

    pub fn set_logger(&mut self, log: Box<dyn CacheLog>) {
        self.log = log;
    }

    fn emit(&self, level: Level, message: &str) {
        self.log.on_event(level, message);
    }

    // ------------------------------------------------------------------
    // validation

    /// run the validation ladder: existence, size, magic, metadata,
    /// version, source checksums, then (optionally) a deep dry parse of
    /// the serialized spatial indexes
    pub fn validate_cache(
        &self,
        cache_path: &Path,
        streets_path: &Path,
        osm_path: &Path,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        if !cache_path.exists() {
            result.reason = "cache file missing".to_string();
            result.error_kind = CacheErrorKind::FileNotFound;
            self.emit(
                Level::Info,
                &format!("cache file not found: {}", cache_path.display()),
            );
            return result;
        }
        result.exists = true;

        if self.config.enable_corruption_detection {
            let size = self.cache_file_size(cache_path);
            if size < self.config.corruption_threshold_bytes {
                result.reason = "cache file too small (likely corrupted)".to_string();
                result.detailed_error = format!("file size: {size} bytes");
                result.error_kind = CacheErrorKind::FileCorrupted;
                self.emit(
                    Level::Error,
                    &format!("cache file appears corrupted (too small): {}", cache_path.display()),
                );
                return result;
            }
        }

        let file = match File::open(cache_path) {
            Ok(file) => file,
            Err(error) => {
                result.reason = "failed to open cache file".to_string();
                result.detailed_error = error.to_string();
                result.error_kind = CacheError::from(error).kind();
                self.emit(
                    Level::Error,
                    &format!("failed to open cache file: {}", cache_path.display()),
                );
                return result;
            }
        };
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        let magic_ok = wire::read_exact(&mut reader, &mut magic).is_ok() && &magic == CACHE_MAGIC;
        if !magic_ok {
            result.reason = "invalid cache magic header".to_string();
            result.error_kind = CacheErrorKind::FileCorrupted;
            self.emit(
                Level::Error,
                &format!("cache file has invalid magic header: {}", cache_path.display()),
            );
            return result;
        }

        let metadata = match CacheMetadata::read(&mut reader) {
            Ok(metadata) => metadata,
            Err(error) => {
                result.reason = "failed to read cache metadata".to_string();
                result.detailed_error = error.to_string();
                result.error_kind = CacheErrorKind::FileCorrupted;
                self.emit(
                    Level::Error,
                    &format!("failed to read cache metadata: {}", cache_path.display()),
                );
                return result;
            }
        };

        if self.config.enable_version_validation && metadata.version != CACHE_VERSION {
            result.reason = "cache version mismatch".to_string();
            result.detailed_error = format!(
                "expected version {CACHE_VERSION}, found {}",
                metadata.version
            );
            result.error_kind = CacheErrorKind::VersionMismatch;
            result.metadata = Some(metadata);
            self.emit(
                Level::Error,
                &format!("cache version mismatch: {}", result.detailed_error),
            );
            return result;
        }

        if self.config.enable_checksum_validation {
            let streets_checksum = match checksum::compute_file_checksum(streets_path) {
                Ok(digest) => digest,
                Err(error) => {
                    result.reason = "failed to compute source file checksums".to_string();
                    result.detailed_error = error.to_string();
                    result.error_kind = CacheErrorKind::FileCorrupted;
                    result.metadata = Some(metadata);
                    self.emit(Level::Error, "failed to checksum the streets binary");
                    return result;
                }
            };
            let osm_checksum = match checksum::compute_file_checksum(osm_path) {
                Ok(digest) => digest,
                Err(error) => {
                    result.reason = "failed to compute source file checksums".to_string();
                    result.detailed_error = error.to_string();
                    result.error_kind = CacheErrorKind::FileCorrupted;
                    result.metadata = Some(metadata);
                    self.emit(Level::Error, "failed to checksum the osm binary");
                    return result;
                }
            };

            result.streets_checksum = streets_checksum.clone();
            result.osm_checksum = osm_checksum.clone();

            if metadata.streets_checksum != streets_checksum {
                result.reason = "streets file checksum mismatch".to_string();
                result.detailed_error = format!(
                    "current: {streets_checksum}, cached: {}",
                    metadata.streets_checksum
                );
                result.error_kind = CacheErrorKind::ChecksumMismatch;
                result.metadata = Some(metadata);
                self.emit(Level::Error, "streets file checksum mismatch");
                return result;
            }
            if metadata.osm_checksum != osm_checksum {
                result.reason = "osm file checksum mismatch".to_string();
                result.detailed_error =
                    format!("current: {osm_checksum}, cached: {}", metadata.osm_checksum);
                result.error_kind = CacheErrorKind::ChecksumMismatch;
                result.metadata = Some(metadata);
                self.emit(Level::Error, "osm file checksum mismatch");
                return result;
            }
        }

        if self.config.enable_deep_validation {
            if let Err(error) = self.deep_validate(cache_path) {
                result.reason = "deep validation of serialized indexes failed".to_string();
                result.detailed_error = error.to_string();
                result.error_kind = CacheErrorKind::DeserializationError;
                result.metadata = Some(metadata);
                self.emit(
                    Level::Error,
                    &format!("deep cache validation failed: {}", result.detailed_error),
                );
                return result;
            }
        }

        result.valid = true;
        result.metadata = Some(metadata);
        self.emit(
            Level::Info,
            &format!("cache validation successful: {}", cache_path.display()),
        );
        result
    }

    /// dry parse: entity section skipped, then every serialized index run
    /// through the defensive stream validator
    fn deep_validate(&self, cache_path: &Path) -> Result<(), CacheError> {
        let file = File::open(cache_path)?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 8];
        wire::read_exact(&mut reader, &mut magic)?;
        let _metadata = CacheMetadata::read(&mut reader)?;
        serializer::skip_database(&mut reader)?;
        for _ in 0..4 {
            gisevo_spatial::rtree::validate_stream(&mut reader)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // load / save

    /// restore a database from the cache. fail-atomic: any error leaves
    /// the database empty rather than partially populated.
    pub fn load_cache(&self, cache_path: &Path, db: &mut MapDatabase) -> Result<(), CacheError> {
        self.retry("load_cache", || {
            let result = self.load_cache_once(cache_path, db);
            if result.is_err() {
                db.clear();
            }
            result
        })
    }

    fn load_cache_once(&self, cache_path: &Path, db: &mut MapDatabase) -> Result<(), CacheError> {
        let file = File::open(cache_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CacheError::NotFound(cache_path.to_path_buf()),
            _ => CacheError::from(e),
        })?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        wire::read_exact(&mut reader, &mut magic)?;
        if &magic != CACHE_MAGIC {
            return Err(CacheError::Corrupted(
                "invalid cache magic header".to_string(),
            ));
        }

        let metadata = CacheMetadata::read(&mut reader)?;
        if metadata.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_VERSION,
                found: metadata.version,
            });
        }

        serializer::deserialize_database(&mut reader, db, &metadata)?;
        self.emit(
            Level::Info,
            &format!("successfully loaded cache: {}", cache_path.display()),
        );
        Ok(())
    }

    /// write the cache through a temporary file and an atomic rename. the
    /// temporary is removed on any failure, so a crash or error never
    /// clobbers a pre-existing cache.
    pub fn save_cache(
        &self,
        cache_path: &Path,
        db: &MapDatabase,
        streets_checksum: &str,
        osm_checksum: &str,
    ) -> Result<(), CacheError> {
        self.retry("save_cache", || {
            self.save_cache_once(cache_path, db, streets_checksum, osm_checksum)
        })
    }

    fn save_cache_once(
        &self,
        cache_path: &Path,
        db: &MapDatabase,
        streets_checksum: &str,
        osm_checksum: &str,
    ) -> Result<(), CacheError> {
        ensure_parent_directory(cache_path)?;
        let temp_path = append_suffix(cache_path, ".tmp");

        let written = self.write_cache_file(&temp_path, db, streets_checksum, osm_checksum);
        if let Err(error) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }

        if let Err(error) = fs::rename(&temp_path, cache_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(error.into());
        }

        self.emit(
            Level::Info,
            &format!("successfully saved cache: {}", cache_path.display()),
        );
        Ok(())
    }

    fn write_cache_file(
        &self,
        temp_path: &Path,
        db: &MapDatabase,
        streets_checksum: &str,
        osm_checksum: &str,
    ) -> Result<(), CacheError> {
        let file = File::create(temp_path).map_err(map_write_error)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(CACHE_MAGIC).map_err(map_write_error)?;
        let metadata = CacheMetadata {
            version: CACHE_VERSION,
            creation_timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            min_lat: db.min_lat(),
            max_lat: db.max_lat(),
            min_lon: db.min_lon(),
            max_lon: db.max_lon(),
            avg_lat_rad: db.avg_lat_rad(),
            streets_checksum: streets_checksum.to_string(),
            osm_checksum: osm_checksum.to_string(),
        };
        metadata.write(&mut writer)?;
        serializer::serialize_database(&mut writer, db)?;

        writer.flush().map_err(map_write_error)?;
        writer.get_ref().sync_all().map_err(map_write_error)?;
        Ok(())
    }

    /// bounded retry with exponential backoff. only transient I/O errors
    /// are retried; corruption and version mismatches return immediately.
    fn retry<T>(
        &self,
        operation_name: &str,
        mut operation: impl FnMut() -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let max_attempts = self.config.max_retry_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if !error.is_retryable() || attempt >= max_attempts {
                        self.emit(
                            Level::Error,
                            &format!("{operation_name} failed after {attempt} attempt(s): {error}"),
                        );
                        return Err(error);
                    }
                    let delay_ms = 100u64 * (1u64 << attempt) + 50 * attempt as u64;
                    self.emit(
                        Level::Warn,
                        &format!(
                            "{operation_name} attempt {attempt} failed ({error}), retrying in {delay_ms} ms"
                        ),
                    );
                    std::thread::sleep(Duration::from_millis(delay_ms));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // cache slot management

    /// deleting an absent file counts as success
    pub fn delete_cache(&self, cache_path: &Path) -> Result<(), CacheError> {
        if cache_path.exists() {
            fs::remove_file(cache_path)?;
            self.emit(
                Level::Info,
                &format!("deleted cache file: {}", cache_path.display()),
            );
        }
        Ok(())
    }

    /// repair is currently delete-and-let-rebuild
    pub fn repair_cache(&self, cache_path: &Path) -> Result<(), CacheError> {
        self.emit(
            Level::Warn,
            "cache repair not implemented, deleting corrupted cache",
        );
        self.delete_cache(cache_path)
    }

    /// copy the cache aside; returns the backup path (`<cache>.bak` unless
    /// overridden)
    pub fn backup_cache(
        &self,
        cache_path: &Path,
        backup_path: Option<&Path>,
    ) -> Result<PathBuf, CacheError> {
        if !cache_path.exists() {
            return Err(CacheError::NotFound(cache_path.to_path_buf()));
        }
        let backup = backup_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| append_suffix(cache_path, ".bak"));
        fs::copy(cache_path, &backup)?;
        self.emit(
            Level::Info,
            &format!("backed up cache: {} -> {}", cache_path.display(), backup.display()),
        );
        Ok(backup)
    }

    pub fn restore_cache(&self, backup_path: &Path, cache_path: &Path) -> Result<(), CacheError> {
        if !backup_path.exists() {
            return Err(CacheError::NotFound(backup_path.to_path_buf()));
        }
        fs::copy(backup_path, cache_path)?;
        self.emit(
            Level::Info,
            &format!(
                "restored cache: {} -> {}",
                backup_path.display(),
                cache_path.display()
            ),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // probes

    pub fn read_metadata(&self, cache_path: &Path) -> Result<CacheMetadata, CacheError> {
        let file = File::open(cache_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CacheError::NotFound(cache_path.to_path_buf()),
            _ => CacheError::from(e),
        })?;
        let mut reader = BufReader::new(file);
        let mut magic = [0u8; 8];
        wire::read_exact(&mut reader, &mut magic)?;
        if &magic != CACHE_MAGIC {
            return Err(CacheError::Corrupted(
                "invalid cache magic header".to_string(),
            ));
        }
        CacheMetadata::read(&mut reader)
    }

    pub fn compute_file_checksum(&self, path: &Path) -> Result<String, CacheError> {
        checksum::compute_file_checksum(path)
    }

    pub fn cache_file_size(&self, cache_path: &Path) -> u64 {
        fs::metadata(cache_path).map(|m| m.len()).unwrap_or(0)
    }

    /// quick probe: size and magic only
    pub fn is_cache_file_corrupted(&self, cache_path: &Path) -> bool {
        if !cache_path.exists() {
            return true;
        }
        if self.cache_file_size(cache_path) < self.config.corruption_threshold_bytes {
            return true;
        }
        match File::open(cache_path) {
            Ok(file) => {
                let mut reader = BufReader::new(file);
                let mut magic = [0u8; 8];
                wire::read_exact(&mut reader, &mut magic).is_err() || &magic != CACHE_MAGIC
            }
            Err(_) => true,
        }
    }
}

fn ensure_parent_directory(cache_path: &Path) -> Result<(), CacheError> {
    if let Some(parent) = cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

fn map_write_error(error: std::io::Error) -> CacheError {
    match error.kind() {
        std::io::ErrorKind::StorageFull => CacheError::DiskSpace(error.to_string()),
        _ => CacheError::from(error),
    }
}
