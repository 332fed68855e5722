//! map discovery. a map is a `<base>.streets.bin` file whose sibling
//! `<base>.osm.bin` exists in the same directory. candidate directories
//! come from `GISEVO_MAPS_DIR` and `resources/maps` folders near the
//! executable and the working directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const MAPS_DIR_ENV: &str = "GISEVO_MAPS_DIR";

const STREETS_SUFFIX: &str = ".streets.bin";
const OSM_SUFFIX: &str = ".osm.bin";

#[derive(Clone, Debug, PartialEq)]
pub struct MapEntry {
    pub display_name: String,
    pub streets_path: PathBuf,
    pub osm_path: PathBuf,
}

/// search roots in priority order, deduplicated by canonical path
pub fn candidate_directories() -> Vec<PathBuf> {
    let mut directories = Vec::new();
    let mut seen = HashSet::new();

    let mut add_directory = |path: PathBuf| {
        if !path.is_dir() {
            return;
        }
        let canonical = path.canonicalize().unwrap_or(path);
        if seen.insert(canonical.clone()) {
            directories.push(canonical);
        }
    };

    if let Ok(env_dir) = std::env::var(MAPS_DIR_ENV) {
        if !env_dir.is_empty() {
            add_directory(PathBuf::from(env_dir));
        }
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    if let Some(exe_dir) = exe_dir {
        add_directory(exe_dir.join("resources/maps"));
        add_directory(exe_dir.join("../resources/maps"));
        add_directory(exe_dir.join("../../resources/maps"));
    }

    if let Ok(cwd) = std::env::current_dir() {
        add_directory(cwd.join("resources/maps"));
        add_directory(cwd.join("../resources/maps"));
        add_directory(cwd.join("../../resources/maps"));
    }

    directories
}

pub fn discover_maps() -> Vec<MapEntry> {
    discover_maps_in(&candidate_directories())
}

/// scan the given directories for complete map pairs
pub fn discover_maps_in(directories: &[PathBuf]) -> Vec<MapEntry> {
    let mut maps = Vec::new();
    let mut seen = HashSet::new();

    for directory in directories {
        let Ok(entries) = std::fs::read_dir(directory) else {
            log::warn!("cannot read maps directory: {}", directory.display());
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(base) = file_name.strip_suffix(STREETS_SUFFIX) else {
                continue;
            };

            let osm_path = directory.join(format!("{base}{OSM_SUFFIX}"));
            if !osm_path.exists() {
                log::debug!("skipping {file_name}: no matching {base}{OSM_SUFFIX}");
                continue;
            }

            let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
            if !seen.insert(canonical) {
                continue;
            }

            maps.push(MapEntry {
                display_name: prettify_name(base),
                streets_path: path,
                osm_path,
            });
        }
    }

    maps.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    maps
}

/// turn a file base name into something fit for a selector list:
/// separators become spaces and each word is capitalized
pub fn prettify_name(base: &str) -> String {
    base.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prettify_name() {
        assert_eq!(prettify_name("toronto"), "Toronto");
        assert_eq!(prettify_name("new_york_city"), "New York City");
        assert_eq!(prettify_name("rio-de-janeiro"), "Rio De Janeiro");
        assert_eq!(prettify_name("__odd__name__"), "Odd Name");
    }

    #[test]
    fn test_discovery_requires_both_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("toronto.streets.bin"), b"s").expect("write");
        std::fs::write(dir.path().join("toronto.osm.bin"), b"o").expect("write");
        // orphan streets file without its overlay
        std::fs::write(dir.path().join("orphan.streets.bin"), b"s").expect("write");
        // unrelated file
        std::fs::write(dir.path().join("notes.txt"), b"n").expect("write");

        let maps = discover_maps_in(&[dir.path().to_path_buf()]);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].display_name, "Toronto");
        assert!(maps[0].streets_path.ends_with("toronto.streets.bin"));
        assert!(maps[0].osm_path.ends_with("toronto.osm.bin"));
    }

    #[test]
    fn test_discovery_deduplicates_repeated_directories() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("a.streets.bin"), b"s").expect("write");
        std::fs::write(dir.path().join("a.osm.bin"), b"o").expect("write");

        let root = dir.path().to_path_buf();
        let maps = discover_maps_in(&[root.clone(), root]);
        assert_eq!(maps.len(), 1);
    }

    #[test]
    fn test_discovery_sorts_by_display_name() {
        let dir = tempfile::tempdir().expect("create temp dir");
        for base in ["zagreb", "ankara", "montreal"] {
            std::fs::write(dir.path().join(format!("{base}.streets.bin")), b"s")
                .expect("write");
            std::fs::write(dir.path().join(format!("{base}.osm.bin")), b"o").expect("write");
        }
        let maps = discover_maps_in(&[dir.path().to_path_buf()]);
        let names: Vec<&str> = maps.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ankara", "Montreal", "Zagreb"]);
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let maps = discover_maps_in(&[PathBuf::from("/definitely/not/a/maps/dir")]);
        assert!(maps.is_empty());
    }
}
