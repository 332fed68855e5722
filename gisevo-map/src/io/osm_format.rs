use super::streets_format::clamp_reserve;
use super::BinaryRead;
use crate::model::{FeatureType, MapFeature, Poi, Relation, RelationMemberType};
use crate::MapError;

pub const OSM_MAGIC_V1: &[u8; 8] = b"GISEVOO1";
pub const OSM_MAGIC_V2: &[u8; 8] = b"GISEVOO2";

/// parsed contents of an OSM overlay binary
#[derive(Debug, Default)]
pub struct OsmData {
    pub version: u32,
    pub pois: Vec<Poi>,
    pub features: Vec<MapFeature>,
    pub relations: Vec<Relation>,
}

/// parse an OSM overlay binary. version 2 adds tag vectors and the
/// relation section.
pub fn parse_osm<R: BinaryRead>(reader: &mut R) -> Result<OsmData, MapError> {
    let version = read_osm_header(reader)?;

    let poi_count = reader.read_u64()?;
    let mut pois = Vec::with_capacity(clamp_reserve(poi_count));
    for _ in 0..poi_count {
        let osm_id = reader.read_i64()?;
        let lat = reader.read_f64()?;
        let lon = reader.read_f64()?;
        let category = reader.read_string()?;
        let name = reader.read_string()?;
        let tags = if version >= 2 {
            reader.read_tags()?
        } else {
            Vec::new()
        };
        pois.push(Poi {
            osm_id,
            lat,
            lon,
            category,
            name,
            tags,
        });
    }

    let feature_count = reader.read_u64()?;
    let mut features = Vec::with_capacity(clamp_reserve(feature_count));
    for _ in 0..feature_count {
        let osm_id = reader.read_i64()?;
        let feature_type = FeatureType::from_u8(reader.read_u8()?);
        let name = reader.read_string()?;
        let node_refs = reader.read_id_vec_u64()?;
        let is_closed = reader.read_bool()?;
        let tags = if version >= 2 {
            reader.read_tags()?
        } else {
            Vec::new()
        };
        features.push(MapFeature {
            osm_id,
            feature_type,
            name,
            node_refs,
            is_closed,
            tags,
        });
    }

    let mut relations = Vec::new();
    if version >= 2 {
        let relation_count = reader.read_u64()?;
        relations.reserve(clamp_reserve(relation_count));
        for _ in 0..relation_count {
            let osm_id = reader.read_i64()?;
            let tags = reader.read_tags()?;
            let member_count = reader.read_u32()? as usize;
            let mut member_ids = Vec::with_capacity(member_count);
            let mut member_types = Vec::with_capacity(member_count);
            let mut member_roles = Vec::with_capacity(member_count);
            for _ in 0..member_count {
                member_ids.push(reader.read_i64()?);
                member_types.push(RelationMemberType::from_u8(reader.read_u8()?));
                member_roles.push(reader.read_string()?);
            }
            relations.push(Relation {
                osm_id,
                tags,
                member_ids,
                member_types,
                member_roles,
            });
        }
    }

    log::info!(
        "osm binary v{version}: {} POIs, {} features, {} relations",
        pois.len(),
        features.len(),
        relations.len()
    );

    Ok(OsmData {
        version,
        pois,
        features,
        relations,
    })
}

fn read_osm_header<R: BinaryRead>(reader: &mut R) -> Result<u32, MapError> {
    let mut magic = [0u8; 8];
    reader.read_exact_bytes(&mut magic)?;
    let magic_version = match &magic {
        m if m == OSM_MAGIC_V1 => 1,
        m if m == OSM_MAGIC_V2 => 2,
        _ => {
            return Err(MapError::InvalidFormat(
                "invalid osm binary magic header".to_string(),
            ))
        }
    };
    let version = reader.read_u32()?;
    if version != magic_version {
        return Err(MapError::InvalidFormat(format!(
            "osm binary version {version} does not match magic version {magic_version}"
        )));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fixtures::OsmFileBuilder;
    use crate::io::{SliceReader, StreamReader};

    fn tiny_overlay(version: u32) -> Vec<u8> {
        let mut builder = OsmFileBuilder::new(version);
        builder.poi(
            100,
            43.65,
            -79.38,
            "amenity:cafe",
            "Corner Cafe",
            &[("cuisine", "coffee_shop")],
        );
        builder.feature(200, 1, "High Park", &[1, 2, 3], true, &[("leisure", "park")]);
        builder.relation(
            300,
            &[("type", "multipolygon")],
            &[(1, 0, "outer"), (11, 1, "inner")],
        );
        builder.build()
    }

    #[test]
    fn test_parse_v2_round_trip() {
        let bytes = tiny_overlay(2);
        let mut reader = SliceReader::new(&bytes);
        let data = parse_osm(&mut reader).expect("valid file");

        assert_eq!(data.version, 2);
        assert_eq!(data.pois.len(), 1);
        assert_eq!(data.pois[0].category, "amenity:cafe");
        assert_eq!(data.pois[0].name, "Corner Cafe");
        assert_eq!(data.pois[0].tags.len(), 1);

        assert_eq!(data.features.len(), 1);
        assert_eq!(data.features[0].feature_type, FeatureType::Park);
        assert_eq!(data.features[0].node_refs, vec![1, 2, 3]);
        assert!(data.features[0].is_closed);

        assert_eq!(data.relations.len(), 1);
        let relation = &data.relations[0];
        assert_eq!(relation.member_ids, vec![1, 11]);
        assert_eq!(
            relation.member_types,
            vec![RelationMemberType::Node, RelationMemberType::Way]
        );
        assert_eq!(relation.member_roles, vec!["outer", "inner"]);
    }

    #[test]
    fn test_v1_skips_tags_and_relations() {
        let bytes = tiny_overlay(1);
        let mut reader = SliceReader::new(&bytes);
        let data = parse_osm(&mut reader).expect("valid file");
        assert!(data.pois[0].tags.is_empty());
        assert!(data.features[0].tags.is_empty());
        assert!(data.relations.is_empty());
    }

    #[test]
    fn test_stream_parse_is_identical_to_slice_parse() {
        let bytes = tiny_overlay(2);
        let mut slice_reader = SliceReader::new(&bytes);
        let from_slice = parse_osm(&mut slice_reader).expect("valid file");
        let mut stream_reader = StreamReader::new(std::io::Cursor::new(bytes));
        let from_stream = parse_osm(&mut stream_reader).expect("valid file");
        assert_eq!(from_slice.pois, from_stream.pois);
        assert_eq!(from_slice.features, from_stream.features);
        assert_eq!(from_slice.relations, from_stream.relations);
    }

    #[test]
    fn test_wrong_family_magic_fails() {
        // a streets header handed to the osm parser must be rejected
        let mut bytes = tiny_overlay(2);
        bytes[..8].copy_from_slice(b"GISEVOS2");
        let mut reader = SliceReader::new(&bytes);
        assert!(matches!(
            parse_osm(&mut reader),
            Err(MapError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_relation_section_fails() {
        let bytes = tiny_overlay(2);
        let mut reader = SliceReader::new(&bytes[..bytes.len() - 3]);
        assert!(matches!(
            parse_osm(&mut reader),
            Err(MapError::InvalidFormat(_))
        ));
    }
}
