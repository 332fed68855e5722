use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use gisevo::app::{converter, maps};
use gisevo::config::AppConfiguration;
use gisevo::CliError;
use gisevo_map::cache::CacheManager;
use gisevo_map::MapDatabase;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct GisEvoArguments {
    #[command(subcommand)]
    app: App,
}

#[derive(Subcommand)]
pub enum App {
    /// list the maps discovered in the configured map directories
    Maps,
    /// convert an .osm.pbf extract into the paired map binaries
    Convert {
        #[arg(long, help = "path to the source .osm.pbf file")]
        input: String,
        #[arg(long, help = "directory for the generated binaries (default: maps dir or cwd)")]
        output_dir: Option<String>,
        #[arg(long, help = "base name for the generated files (default: input stem)")]
        map_name: Option<String>,
        #[arg(long, help = "regenerate even if binaries already exist")]
        force: bool,
    },
    /// validate a map's cache against its source binaries
    CacheValidate {
        #[arg(long, help = "path to the streets binary")]
        streets_file: String,
        #[arg(long, help = "path to the osm overlay binary")]
        osm_file: String,
        #[arg(long, help = "cache path (default: derived from the streets file)")]
        cache_file: Option<String>,
        #[arg(long, help = "path to a gisevo configuration file")]
        configuration_file: Option<String>,
    },
    /// load a map and (re)write its cache
    CacheRebuild {
        #[arg(long, help = "path to the streets binary")]
        streets_file: String,
        #[arg(long, help = "path to the osm overlay binary")]
        osm_file: String,
        #[arg(long, help = "cache path (default: derived from the streets file)")]
        cache_file: Option<String>,
        #[arg(long, help = "path to a gisevo configuration file")]
        configuration_file: Option<String>,
    },
    /// print the metadata block of a cache file
    CacheInfo {
        #[arg(long, help = "path to the cache file")]
        cache_file: String,
    },
}

pub fn run(app: &App) -> Result<(), CliError> {
    env_logger::init();
    match app {
        App::Maps => {
            let found = maps::discover_maps();
            if found.is_empty() {
                println!(
                    "no maps found; place .streets.bin/.osm.bin pairs in a maps \
                     directory or set {}",
                    maps::MAPS_DIR_ENV
                );
                return Ok(());
            }
            for map in found {
                println!("{}\t{}", map.display_name, map.streets_path.display());
            }
            Ok(())
        }
        App::Convert {
            input,
            output_dir,
            map_name,
            force,
        } => {
            let Some(converter_path) = converter::find_converter() else {
                return Err(CliError::ConverterNotFound);
            };
            let output_dir = output_dir
                .as_ref()
                .map(PathBuf::from)
                .or_else(|| maps::candidate_directories().into_iter().next())
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));

            let mut request = converter::ConversionRequest::new(Path::new(input), &output_dir);
            if let Some(map_name) = map_name {
                request.map_name = converter::sanitize_map_name(map_name);
            }
            request.force = *force;

            converter::run_converter(&converter_path, &request)?;
            println!(
                "converted {} -> {}",
                input,
                output_dir.join(&request.map_name).display()
            );
            Ok(())
        }
        App::CacheValidate {
            streets_file,
            osm_file,
            cache_file,
            configuration_file,
        } => {
            let conf = load_configuration(configuration_file)?;
            let manager = CacheManager::with_config(conf.cache_config());
            let cache_path = resolve_cache_path(streets_file, cache_file);
            let result = manager.validate_cache(
                &cache_path,
                Path::new(streets_file),
                Path::new(osm_file),
            );
            if result.valid {
                println!("cache valid: {}", cache_path.display());
            } else {
                println!(
                    "cache invalid ({:?}): {}{}",
                    result.error_kind,
                    result.reason,
                    if result.detailed_error.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", result.detailed_error)
                    }
                );
            }
            Ok(())
        }
        App::CacheRebuild {
            streets_file,
            osm_file,
            cache_file,
            configuration_file,
        } => {
            let conf = load_configuration(configuration_file)?;
            let manager = CacheManager::with_config(conf.cache_config());
            let cache_path = resolve_cache_path(streets_file, cache_file);

            // delete first so the rebuild cannot restore from a stale cache
            manager.delete_cache(&cache_path)?;

            let mut db = MapDatabase::with_spatial_options(conf.spatial_options());
            db.load_with_cache(
                Path::new(streets_file),
                Path::new(osm_file),
                &cache_path,
                &manager,
            )?;
            println!(
                "rebuilt {}: {} nodes, {} segments, {} intersections, {} POIs, {} features",
                cache_path.display(),
                db.node_count(),
                db.segment_count(),
                db.intersection_count(),
                db.poi_count(),
                db.feature_count()
            );
            Ok(())
        }
        App::CacheInfo { cache_file } => {
            let manager = CacheManager::new();
            let metadata = manager.read_metadata(Path::new(cache_file))?;
            println!("version:          {}", metadata.version);
            println!("created:          {}", metadata.creation_timestamp);
            println!(
                "bounds:           lat [{}, {}], lon [{}, {}]",
                metadata.min_lat, metadata.max_lat, metadata.min_lon, metadata.max_lon
            );
            println!("avg lat (rad):    {}", metadata.avg_lat_rad);
            println!("streets checksum: {}", metadata.streets_checksum);
            println!("osm checksum:     {}", metadata.osm_checksum);
            Ok(())
        }
    }
}

fn load_configuration(configuration_file: &Option<String>) -> Result<AppConfiguration, CliError> {
    match configuration_file {
        None => Ok(AppConfiguration::default()),
        Some(f) => {
            log::info!("reading gisevo configuration from {f}");
            AppConfiguration::try_from(f)
        }
    }
}

fn resolve_cache_path(streets_file: &str, cache_file: &Option<String>) -> PathBuf {
    match cache_file {
        Some(cache_file) => PathBuf::from(cache_file),
        None => MapDatabase::default_cache_path(Path::new(streets_file)),
    }
}

fn main() {
    let args = GisEvoArguments::parse();
    if let Err(e) = run(&args.app) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
