use super::BinaryRead;
use crate::model::{HighwayCategory, MapNode, StreetSegment};
use crate::MapError;

pub const STREETS_MAGIC_V1: &[u8; 8] = b"GISEVOS1";
pub const STREETS_MAGIC_V2: &[u8; 8] = b"GISEVOS2";

/// parsed contents of a streets binary
#[derive(Debug, Default)]
pub struct StreetsData {
    pub version: u32,
    pub nodes: Vec<MapNode>,
    pub segments: Vec<StreetSegment>,
}

/// parse a streets binary. version 1 carries bare nodes and segments;
/// version 2 adds a tag vector to both.
pub fn parse_streets<R: BinaryRead>(reader: &mut R) -> Result<StreetsData, MapError> {
    let version = read_streets_header(reader)?;

    let node_count = reader.read_u64()?;
    let segment_count = reader.read_u64()?;
    log::info!("streets binary v{version}: {node_count} nodes, {segment_count} segments");

    let mut nodes = Vec::with_capacity(clamp_reserve(node_count));
    for _ in 0..node_count {
        let osm_id = reader.read_i64()?;
        let lat = reader.read_f64()?;
        let lon = reader.read_f64()?;
        let tags = if version >= 2 {
            reader.read_tags()?
        } else {
            Vec::new()
        };
        nodes.push(MapNode {
            osm_id,
            lat,
            lon,
            tags,
        });
    }

    let mut segments = Vec::with_capacity(clamp_reserve(segment_count));
    for _ in 0..segment_count {
        let osm_id = reader.read_i64()?;
        let category = HighwayCategory::from_u8(reader.read_u8()?);
        let max_speed_kph = reader.read_f32()?;
        let name = reader.read_string()?;
        let node_refs = reader.read_id_vec_u32()?;
        let is_closed = StreetSegment::derive_is_closed(&node_refs);
        let tags = if version >= 2 {
            reader.read_tags()?
        } else {
            Vec::new()
        };
        segments.push(StreetSegment {
            osm_id,
            category,
            max_speed_kph,
            name,
            node_refs,
            is_closed,
            tags,
        });
    }

    Ok(StreetsData {
        version,
        nodes,
        segments,
    })
}

fn read_streets_header<R: BinaryRead>(reader: &mut R) -> Result<u32, MapError> {
    let mut magic = [0u8; 8];
    reader.read_exact_bytes(&mut magic)?;
    let magic_version = match &magic {
        m if m == STREETS_MAGIC_V1 => 1,
        m if m == STREETS_MAGIC_V2 => 2,
        _ => {
            return Err(MapError::InvalidFormat(
                "invalid streets binary magic header".to_string(),
            ))
        }
    };
    let version = reader.read_u32()?;
    if version != magic_version {
        return Err(MapError::InvalidFormat(format!(
            "streets binary version {version} does not match magic version {magic_version}"
        )));
    }
    Ok(version)
}

/// cap upfront reservations so a corrupt count cannot balloon memory before
/// the short read surfaces
pub(crate) fn clamp_reserve(count: u64) -> usize {
    count.min(1 << 20) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fixtures::StreetsFileBuilder;
    use crate::io::{SliceReader, StreamReader};

    fn tiny_map(version: u32) -> Vec<u8> {
        let mut builder = StreetsFileBuilder::new(version);
        builder.node(1, 43.6532, -79.3832, &[("crossing", "marked")]);
        builder.node(2, 43.6542, -79.3842, &[]);
        builder.segment(11, 3, 50.0, "Test", &[1, 2], &[("highway", "primary")]);
        builder.build()
    }

    #[test]
    fn test_parse_v2_round_trip() {
        let bytes = tiny_map(2);
        let mut reader = SliceReader::new(&bytes);
        let data = parse_streets(&mut reader).expect("valid file");

        assert_eq!(data.version, 2);
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.segments.len(), 1);
        assert_eq!(data.nodes[0].osm_id, 1);
        assert_eq!(data.nodes[0].lat, 43.6532);
        assert_eq!(data.nodes[0].tags[0].0, "crossing");
        let seg = &data.segments[0];
        assert_eq!(seg.osm_id, 11);
        assert_eq!(seg.category, HighwayCategory::Primary);
        assert_eq!(seg.max_speed_kph, 50.0);
        assert_eq!(seg.name, "Test");
        assert_eq!(seg.node_refs, vec![1, 2]);
        assert!(!seg.is_closed);
        assert_eq!(seg.tags[0].1, "primary");
    }

    #[test]
    fn test_parse_v1_has_no_tags() {
        let bytes = tiny_map(1);
        let mut reader = SliceReader::new(&bytes);
        let data = parse_streets(&mut reader).expect("valid file");
        assert_eq!(data.version, 1);
        assert!(data.nodes[0].tags.is_empty());
        assert!(data.segments[0].tags.is_empty());
    }

    #[test]
    fn test_stream_parse_is_identical_to_slice_parse() {
        let bytes = tiny_map(2);
        let mut slice_reader = SliceReader::new(&bytes);
        let from_slice = parse_streets(&mut slice_reader).expect("valid file");
        let mut stream_reader = StreamReader::new(std::io::Cursor::new(bytes));
        let from_stream = parse_streets(&mut stream_reader).expect("valid file");
        assert_eq!(from_slice.nodes, from_stream.nodes);
        assert_eq!(from_slice.segments, from_stream.segments);
    }

    #[test]
    fn test_closed_loop_is_derived() {
        let mut builder = StreetsFileBuilder::new(2);
        builder.node(1, 0.0, 0.0, &[]);
        builder.node(2, 0.0, 1.0, &[]);
        builder.node(3, 1.0, 1.0, &[]);
        builder.segment(20, 6, -1.0, "Loop", &[1, 2, 3, 1], &[]);
        let bytes = builder.build();
        let mut reader = SliceReader::new(&bytes);
        let data = parse_streets(&mut reader).expect("valid file");
        assert!(data.segments[0].is_closed);
        assert_eq!(data.segments[0].curve_point_count(), 2);
    }

    #[test]
    fn test_bad_magic_fails() {
        let mut bytes = tiny_map(2);
        bytes[0] = b'X';
        let mut reader = SliceReader::new(&bytes);
        assert!(matches!(
            parse_streets(&mut reader),
            Err(MapError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_version_magic_mismatch_fails() {
        let mut bytes = tiny_map(2);
        // flip the stated version to 1 while the magic says 2
        bytes[8..12].copy_from_slice(&1u32.to_le_bytes());
        let mut reader = SliceReader::new(&bytes);
        assert!(matches!(
            parse_streets(&mut reader),
            Err(MapError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_file_fails() {
        let bytes = tiny_map(2);
        let mut reader = SliceReader::new(&bytes[..bytes.len() - 5]);
        assert!(matches!(
            parse_streets(&mut reader),
            Err(MapError::InvalidFormat(_))
        ));
    }
}
