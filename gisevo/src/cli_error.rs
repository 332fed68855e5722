use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    ConfigurationError(String),
    #[error("unable to locate the osm_converter executable; set GISEVO_OSM_CONVERTER or install the tool")]
    ConverterNotFound,
    #[error("converter failed: {0}")]
    ConverterFailed(String),
    #[error("map load failed: {source}")]
    Map {
        #[from]
        source: gisevo_map::MapError,
    },
    #[error("cache operation failed: {source}")]
    Cache {
        #[from]
        source: gisevo_map::cache::CacheError,
    },
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
