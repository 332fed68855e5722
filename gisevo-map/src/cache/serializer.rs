//! serialization of the database body inside a cache file: the five entity
//! vectors in fixed order, then the four spatial indexes. lookup maps and
//! intersection tables are never stored; they are rebuilt from the entity
//! vectors on load.

use std::io::{Read, Write};

use super::wire;
use super::{CacheError, CacheMetadata};
use crate::database::MapDatabase;
use crate::model::{
    FeatureType, HighwayCategory, MapFeature, MapNode, Poi, Relation, RelationMemberType,
    StreetSegment,
};

pub(crate) fn serialize_database<W: Write>(
    out: &mut W,
    db: &MapDatabase,
) -> Result<(), CacheError> {
    wire::write_u64(out, db.node_count() as u64)?;
    for node in db.nodes() {
        wire::write_i64(out, node.osm_id)?;
        wire::write_f64(out, node.lat)?;
        wire::write_f64(out, node.lon)?;
        wire::write_tags(out, &node.tags)?;
    }

    wire::write_u64(out, db.segment_count() as u64)?;
    for segment in db.segments() {
        wire::write_i64(out, segment.osm_id)?;
        wire::write_u8(out, segment.category.as_u8())?;
        wire::write_f32(out, segment.max_speed_kph)?;
        wire::write_string(out, &segment.name)?;
        wire::write_id_vec(out, &segment.node_refs)?;
        wire::write_bool(out, segment.is_closed)?;
        wire::write_tags(out, &segment.tags)?;
    }

    wire::write_u64(out, db.poi_count() as u64)?;
    for poi in db.pois() {
        wire::write_i64(out, poi.osm_id)?;
        wire::write_f64(out, poi.lat)?;
        wire::write_f64(out, poi.lon)?;
        wire::write_string(out, &poi.category)?;
        wire::write_string(out, &poi.name)?;
        wire::write_tags(out, &poi.tags)?;
    }

    wire::write_u64(out, db.feature_count() as u64)?;
    for feature in db.features() {
        wire::write_i64(out, feature.osm_id)?;
        wire::write_u8(out, feature.feature_type.as_u8())?;
        wire::write_string(out, &feature.name)?;
        wire::write_id_vec(out, &feature.node_refs)?;
        wire::write_bool(out, feature.is_closed)?;
        wire::write_tags(out, &feature.tags)?;
    }

    wire::write_u64(out, db.relation_count() as u64)?;
    for relation in db.relations() {
        wire::write_i64(out, relation.osm_id)?;
        wire::write_tags(out, &relation.tags)?;
        wire::write_id_vec(out, &relation.member_ids)?;
        wire::write_u64(out, relation.member_types.len() as u64)?;
        for member_type in &relation.member_types {
            wire::write_u8(out, member_type.as_u8())?;
        }
        wire::write_u64(out, relation.member_roles.len() as u64)?;
        for role in &relation.member_roles {
            wire::write_string(out, role)?;
        }
    }

    for index in db.spatial_indexes() {
        index
            .serialize(out)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
    }

    Ok(())
}

/// restore a database from the cache body. bounds come from the metadata
/// block; derived tables are rebuilt; the four indexes are restored from
/// their serialized streams in the same fixed order they were written.
pub(crate) fn deserialize_database<R: Read>(
    input: &mut R,
    db: &mut MapDatabase,
    metadata: &CacheMetadata,
) -> Result<(), CacheError> {
    let nodes = read_nodes(input)?;
    let segments = read_segments(input)?;
    let pois = read_pois(input)?;
    let features = read_features(input)?;
    let relations = read_relations(input)?;

    db.replace_entities(nodes, segments, pois, features, relations);
    db.set_map_bounds(
        metadata.min_lat,
        metadata.max_lat,
        metadata.min_lon,
        metadata.max_lon,
        metadata.avg_lat_rad,
    );
    db.rebuild_lookup_tables();

    for index in db.spatial_indexes_mut() {
        index.deserialize(input)?;
    }

    Ok(())
}

/// dry read of the database body, used by deep validation to position the
/// stream at the spatial index section without building anything
pub(crate) fn skip_database<R: Read>(input: &mut R) -> Result<(), CacheError> {
    let _ = read_nodes(input)?;
    let _ = read_segments(input)?;
    let _ = read_pois(input)?;
    let _ = read_features(input)?;
    let _ = read_relations(input)?;
    Ok(())
}

fn clamp_reserve(count: u64) -> usize {
    count.min(1 << 20) as usize
}

fn read_nodes<R: Read>(input: &mut R) -> Result<Vec<MapNode>, CacheError> {
    let count = wire::read_u64(input)?;
    let mut nodes = Vec::with_capacity(clamp_reserve(count));
    for _ in 0..count {
        let osm_id = wire::read_i64(input)?;
        let lat = wire::read_f64(input)?;
        let lon = wire::read_f64(input)?;
        let tags = wire::read_tags(input)?;
        nodes.push(MapNode {
            osm_id,
            lat,
            lon,
            tags,
        });
    }
    Ok(nodes)
}

fn read_segments<R: Read>(input: &mut R) -> Result<Vec<StreetSegment>, CacheError> {
    let count = wire::read_u64(input)?;
    let mut segments = Vec::with_capacity(clamp_reserve(count));
    for _ in 0..count {
        let osm_id = wire::read_i64(input)?;
        let category = HighwayCategory::from_u8(wire::read_u8(input)?);
        let max_speed_kph = wire::read_f32(input)?;
        let name = wire::read_string(input)?;
        let node_refs = wire::read_id_vec(input)?;
        // the stored flag is read for layout compatibility and then
        // recomputed; the derived value is authoritative
        let _stored_is_closed = wire::read_bool(input)?;
        let is_closed = StreetSegment::derive_is_closed(&node_refs);
        let tags = wire::read_tags(input)?;
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
    Ok(segments)
}

fn read_pois<R: Read>(input: &mut R) -> Result<Vec<Poi>, CacheError> {
    let count = wire::read_u64(input)?;
    let mut pois = Vec::with_capacity(clamp_reserve(count));
    for _ in 0..count {
        let osm_id = wire::read_i64(input)?;
        let lat = wire::read_f64(input)?;
        let lon = wire::read_f64(input)?;
        let category = wire::read_string(input)?;
        let name = wire::read_string(input)?;
        let tags = wire::read_tags(input)?;
        pois.push(Poi {
            osm_id,
            lat,
            lon,
            category,
            name,
            tags,
        });
    }
    Ok(pois)
}

fn read_features<R: Read>(input: &mut R) -> Result<Vec<MapFeature>, CacheError> {
    let count = wire::read_u64(input)?;
    let mut features = Vec::with_capacity(clamp_reserve(count));
    for _ in 0..count {
        let osm_id = wire::read_i64(input)?;
        let feature_type = FeatureType::from_u8(wire::read_u8(input)?);
        let name = wire::read_string(input)?;
        let node_refs = wire::read_id_vec(input)?;
        let is_closed = wire::read_bool(input)?;
        let tags = wire::read_tags(input)?;
        features.push(MapFeature {
            osm_id,
            feature_type,
            name,
            node_refs,
            is_closed,
            tags,
        });
    }
    Ok(features)
}

fn read_relations<R: Read>(input: &mut R) -> Result<Vec<Relation>, CacheError> {
    let count = wire::read_u64(input)?;
    let mut relations = Vec::with_capacity(clamp_reserve(count));
    for _ in 0..count {
        let osm_id = wire::read_i64(input)?;
        let tags = wire::read_tags(input)?;
        let member_ids = wire::read_id_vec(input)?;

        let type_count = wire::read_u64(input)? as usize;
        let mut member_types = Vec::with_capacity(type_count.min(1 << 16));
        for _ in 0..type_count {
            member_types.push(RelationMemberType::from_u8(wire::read_u8(input)?));
        }

        let role_count = wire::read_u64(input)? as usize;
        let mut member_roles = Vec::with_capacity(role_count.min(1 << 16));
        for _ in 0..role_count {
            member_roles.push(wire::read_string(input)?);
        }

        if member_types.len() != member_ids.len() || member_roles.len() != member_ids.len() {
            return Err(CacheError::Corrupted(format!(
                "relation {osm_id} member arrays disagree on length"
            )));
        }

        relations.push(Relation {
            osm_id,
            tags,
            member_ids,
            member_types,
            member_roles,
        });
    }
    Ok(relations)
}
