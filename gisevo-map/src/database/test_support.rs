//! shared helpers for database tests: write fixture binaries to a temp
//! directory and load them the way production code does.

use super::MapDatabase;
use crate::io::fixtures::StreetsFileBuilder;

/// write the given binaries to disk and load them into a fresh database.
/// the temp directory is removed when this returns; the database keeps its
/// own mapping of the (now unlinked) files, which is fine on this platform.
pub(crate) fn build_database(streets_bytes: &[u8], osm_bytes: Option<&[u8]>) -> MapDatabase {
    let dir = tempfile::tempdir().expect("create temp dir");
    let streets_path = dir.path().join("fixture.streets.bin");
    std::fs::write(&streets_path, streets_bytes).expect("write streets fixture");

    let mut db = MapDatabase::new();
    db.load_streets(&streets_path).expect("load streets fixture");

    if let Some(osm_bytes) = osm_bytes {
        let osm_path = dir.path().join("fixture.osm.bin");
        std::fs::write(&osm_path, osm_bytes).expect("write osm fixture");
        db.load_osm(&osm_path).expect("load osm fixture");
    }
    db
}

/// 3x3 grid of nodes with a segment along every row and column edge.
/// node ids are 1..=9, lat = row, lon = column. every interior meeting
/// point touches at least two segments, so the grid has intersections.
pub(crate) fn small_grid_streets() -> Vec<u8> {
    let mut builder = StreetsFileBuilder::new(2);
    for row in 0..3i64 {
        for col in 0..3i64 {
            let id = row * 3 + col + 1;
            builder.node(id, row as f64, col as f64, &[]);
        }
    }
    let mut way_id = 100;
    for row in 0..3i64 {
        for col in 0..2i64 {
            let a = row * 3 + col + 1;
            builder.segment(way_id, 6, 40.0, &format!("Row {row}"), &[a, a + 1], &[]);
            way_id += 1;
        }
    }
    for col in 0..3i64 {
        for row in 0..2i64 {
            let a = row * 3 + col + 1;
            builder.segment(way_id, 6, 40.0, &format!("Col {col}"), &[a, a + 3], &[]);
            way_id += 1;
        }
    }
    builder.build()
}
