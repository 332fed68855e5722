use serde::{Deserialize, Serialize};

use gisevo_map::cache::CacheConfig;
use gisevo_spatial::RTreeOptions;

use crate::CliError;

/// defines behaviors for the map engine: cache error handling and spatial
/// index tuning. loaded from a TOML or JSON file.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct AppConfiguration {
    pub cache: CacheSettings,
    pub spatial: SpatialSettings,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct CacheSettings {
    pub auto_recovery: bool,
    pub corruption_detection: bool,
    pub version_validation: bool,
    pub checksum_validation: bool,
    pub fallback_loading: bool,
    pub cache_cleanup: bool,
    pub deep_validation: bool,
    pub max_retry_attempts: u32,
    pub corruption_threshold_bytes: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct SpatialSettings {
    pub bulk_load: bool,
    pub query_cache: bool,
    pub node_pool: bool,
    pub space_filling_sort: bool,
    pub query_cache_capacity: usize,
    pub query_cache_quantum: f64,
}

impl Default for AppConfiguration {
    fn default() -> Self {
        AppConfiguration {
            cache: CacheSettings::default(),
            spatial: SpatialSettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        CacheSettings {
            auto_recovery: defaults.enable_auto_recovery,
            corruption_detection: defaults.enable_corruption_detection,
            version_validation: defaults.enable_version_validation,
            checksum_validation: defaults.enable_checksum_validation,
            fallback_loading: defaults.enable_fallback_loading,
            cache_cleanup: defaults.enable_cache_cleanup,
            deep_validation: defaults.enable_deep_validation,
            max_retry_attempts: defaults.max_retry_attempts,
            corruption_threshold_bytes: defaults.corruption_threshold_bytes,
        }
    }
}

impl Default for SpatialSettings {
    fn default() -> Self {
        let defaults = RTreeOptions::default();
        SpatialSettings {
            bulk_load: defaults.enable_bulk_load,
            query_cache: defaults.enable_query_cache,
            node_pool: defaults.enable_node_pool,
            space_filling_sort: defaults.enable_space_filling_sort,
            query_cache_capacity: defaults.cache_capacity,
            query_cache_quantum: defaults.cache_quantum,
        }
    }
}

impl AppConfiguration {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            enable_auto_recovery: self.cache.auto_recovery,
            enable_corruption_detection: self.cache.corruption_detection,
            enable_version_validation: self.cache.version_validation,
            enable_checksum_validation: self.cache.checksum_validation,
            enable_fallback_loading: self.cache.fallback_loading,
            enable_cache_cleanup: self.cache.cache_cleanup,
            enable_deep_validation: self.cache.deep_validation,
            max_retry_attempts: self.cache.max_retry_attempts,
            corruption_threshold_bytes: self.cache.corruption_threshold_bytes,
        }
    }

    pub fn spatial_options(&self) -> RTreeOptions {
        RTreeOptions {
            enable_bulk_load: self.spatial.bulk_load,
            enable_query_cache: self.spatial.query_cache,
            enable_node_pool: self.spatial.node_pool,
            enable_space_filling_sort: self.spatial.space_filling_sort,
            cache_capacity: self.spatial.query_cache_capacity,
            cache_quantum: self.spatial.query_cache_quantum,
        }
    }
}

impl TryFrom<&String> for AppConfiguration {
    type Error = CliError;

    fn try_from(f: &String) -> Result<Self, Self::Error> {
        if f.ends_with(".toml") {
            let s = std::fs::read_to_string(f)
                .map_err(|e| CliError::ConfigurationError(format!("failure reading {f}: {e}")))?;
            toml::from_str(&s)
                .map_err(|e| CliError::ConfigurationError(format!("failure decoding {f}: {e}")))
        } else if f.ends_with(".json") {
            let s = std::fs::read_to_string(f)
                .map_err(|e| CliError::ConfigurationError(format!("failure reading {f}: {e}")))?;
            serde_json::from_str(&s)
                .map_err(|e| CliError::ConfigurationError(format!("failure decoding {f}: {e}")))
        } else {
            Err(CliError::ConfigurationError(format!(
                "unsupported configuration file type (expected .toml or .json): {f}"
            )))
        }
    }
}
