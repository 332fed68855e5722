use std::path::{Path, PathBuf};

use super::MapDatabase;
use crate::cache::{CacheErrorKind, CacheManager};
use crate::MapError;

impl MapDatabase {
    /// cache file placed next to the streets binary: the streets file stem
    /// with a `.gisevo.cache` extension
    pub fn default_cache_path(streets_path: &Path) -> PathBuf {
        let stem = streets_path
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "map".into());
        let mut name = stem;
        name.push(".gisevo.cache");
        match streets_path.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        }
    }

    /// load through the cache with a default manager and the default cache
    /// path
    pub fn load_with_default_cache(
        &mut self,
        streets_path: &Path,
        osm_path: &Path,
    ) -> Result<(), MapError> {
        let cache_path = MapDatabase::default_cache_path(streets_path);
        let manager = CacheManager::new();
        self.load_with_cache(streets_path, osm_path, &cache_path, &manager)
    }

    /// orchestrate a cached load: validate the cache and restore from it
    /// when possible, otherwise rebuild from the binaries and write a fresh
    /// cache. a cache-write failure is non-fatal; missing or unreadable
    /// source binaries are.
    pub fn load_with_cache(
        &mut self,
        streets_path: &Path,
        osm_path: &Path,
        cache_path: &Path,
        manager: &CacheManager,
    ) -> Result<(), MapError> {
        self.begin_load()?;
        let result = self.load_with_cache_inner(streets_path, osm_path, cache_path, manager);
        self.end_load();
        if result.is_err() {
            self.clear_contents();
        }
        result
    }

    fn load_with_cache_inner(
        &mut self,
        streets_path: &Path,
        osm_path: &Path,
        cache_path: &Path,
        manager: &CacheManager,
    ) -> Result<(), MapError> {
        let validation = manager.validate_cache(cache_path, streets_path, osm_path);

        if validation.valid {
            match manager.load_cache(cache_path, self) {
                Ok(()) => {
                    if self.validate_spatial_indexes() {
                        log::info!("map restored from cache: {}", cache_path.display());
                        return Ok(());
                    }
                    // restored but structurally broken: treat like corruption
                    log::error!(
                        "restored spatial indexes failed validation, deleting cache and rebuilding"
                    );
                    if manager.config().enable_cache_cleanup {
                        if let Err(error) = manager.delete_cache(cache_path) {
                            log::warn!("failed to delete invalid cache: {error}");
                        }
                    }
                    self.clear_contents();
                }
                Err(error) => {
                    log::warn!("cache load failed ({error}), rebuilding from binaries");
                    if error.is_corruption() && manager.config().enable_cache_cleanup {
                        if let Err(delete_error) = manager.delete_cache(cache_path) {
                            log::warn!("failed to delete corrupted cache: {delete_error}");
                        }
                    }
                    if !manager.config().enable_fallback_loading {
                        return Err(MapError::InvalidFormat(format!(
                            "cache load failed and fallback loading is disabled: {error}"
                        )));
                    }
                }
            }
        } else if validation.exists {
            log::warn!(
                "cache invalid: {}{}",
                validation.reason,
                if validation.detailed_error.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", validation.detailed_error)
                }
            );
            if manager.config().enable_cache_cleanup {
                match validation.error_kind {
                    CacheErrorKind::FileCorrupted
                    | CacheErrorKind::VersionMismatch
                    | CacheErrorKind::DeserializationError => {
                        log::info!("deleting unusable cache file");
                        if let Err(error) = manager.delete_cache(cache_path) {
                            log::warn!("failed to delete unusable cache: {error}");
                        }
                    }
                    CacheErrorKind::ChecksumMismatch => {
                        log::info!("source files changed, cache will be regenerated");
                    }
                    _ => {}
                }
            }
        } else {
            log::info!("no cache found, building from binaries");
        }

        self.load_streets_guardless(streets_path)?;
        self.load_osm_guardless(osm_path)?;

        self.write_fresh_cache(streets_path, osm_path, cache_path, manager);
        Ok(())
    }

    /// best effort: a map that loaded fine must not fail because its cache
    /// could not be written
    fn write_fresh_cache(
        &self,
        streets_path: &Path,
        osm_path: &Path,
        cache_path: &Path,
        manager: &CacheManager,
    ) {
        let streets_checksum = match manager.compute_file_checksum(streets_path) {
            Ok(digest) => digest,
            Err(error) => {
                log::warn!("skipping cache write, cannot checksum streets binary: {error}");
                return;
            }
        };
        let osm_checksum = match manager.compute_file_checksum(osm_path) {
            Ok(digest) => digest,
            Err(error) => {
                log::warn!("skipping cache write, cannot checksum osm binary: {error}");
                return;
            }
        };
        match manager.save_cache(cache_path, self, &streets_checksum, &osm_checksum) {
            Ok(()) => log::info!("cache saved: {}", cache_path.display()),
            Err(error) => log::warn!("cache save failed (non-fatal): {error}"),
        }
    }
}
