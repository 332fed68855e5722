//! test-only writers for the two map binary formats. production code never
//! writes these files (the converter tool does); tests use the builders to
//! assemble real on-disk inputs.

use crate::model::Osmid;

type OwnedTags = Vec<(String, String)>;

fn owned_tags(tags: &[(&str, &str)]) -> OwnedTags {
    tags.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn write_string(buffer: &mut Vec<u8>, value: &str) {
    buffer.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
}

fn write_tags(buffer: &mut Vec<u8>, tags: &OwnedTags) {
    buffer.extend_from_slice(&(tags.len() as u32).to_le_bytes());
    for (key, value) in tags {
        write_string(buffer, key);
        write_string(buffer, value);
    }
}

pub(crate) struct StreetsFileBuilder {
    version: u32,
    nodes: Vec<(Osmid, f64, f64, OwnedTags)>,
    segments: Vec<(Osmid, u8, f32, String, Vec<Osmid>, OwnedTags)>,
}

impl StreetsFileBuilder {
    pub(crate) fn new(version: u32) -> StreetsFileBuilder {
        StreetsFileBuilder {
            version,
            nodes: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub(crate) fn node(&mut self, osm_id: Osmid, lat: f64, lon: f64, tags: &[(&str, &str)]) {
        self.nodes.push((osm_id, lat, lon, owned_tags(tags)));
    }

    pub(crate) fn segment(
        &mut self,
        osm_id: Osmid,
        category: u8,
        max_speed_kph: f32,
        name: &str,
        node_refs: &[Osmid],
        tags: &[(&str, &str)],
    ) {
        self.segments.push((
            osm_id,
            category,
            max_speed_kph,
            name.to_string(),
            node_refs.to_vec(),
            owned_tags(tags),
        ));
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(if self.version >= 2 {
            b"GISEVOS2"
        } else {
            b"GISEVOS1"
        });
        buffer.extend_from_slice(&self.version.to_le_bytes());
        buffer.extend_from_slice(&(self.nodes.len() as u64).to_le_bytes());
        buffer.extend_from_slice(&(self.segments.len() as u64).to_le_bytes());

        for (osm_id, lat, lon, tags) in &self.nodes {
            buffer.extend_from_slice(&osm_id.to_le_bytes());
            buffer.extend_from_slice(&lat.to_le_bytes());
            buffer.extend_from_slice(&lon.to_le_bytes());
            if self.version >= 2 {
                write_tags(&mut buffer, tags);
            }
        }

        for (osm_id, category, max_speed, name, node_refs, tags) in &self.segments {
            buffer.extend_from_slice(&osm_id.to_le_bytes());
            buffer.push(*category);
            buffer.extend_from_slice(&max_speed.to_le_bytes());
            write_string(&mut buffer, name);
            buffer.extend_from_slice(&(node_refs.len() as u32).to_le_bytes());
            for node_ref in node_refs {
                buffer.extend_from_slice(&node_ref.to_le_bytes());
            }
            if self.version >= 2 {
                write_tags(&mut buffer, tags);
            }
        }

        buffer
    }
}

pub(crate) struct OsmFileBuilder {
    version: u32,
    pois: Vec<(Osmid, f64, f64, String, String, OwnedTags)>,
    features: Vec<(Osmid, u8, String, Vec<Osmid>, bool, OwnedTags)>,
    relations: Vec<(Osmid, OwnedTags, Vec<(Osmid, u8, String)>)>,
}

impl OsmFileBuilder {
    pub(crate) fn new(version: u32) -> OsmFileBuilder {
        OsmFileBuilder {
            version,
            pois: Vec::new(),
            features: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub(crate) fn poi(
        &mut self,
        osm_id: Osmid,
        lat: f64,
        lon: f64,
        category: &str,
        name: &str,
        tags: &[(&str, &str)],
    ) {
        self.pois.push((
            osm_id,
            lat,
            lon,
            category.to_string(),
            name.to_string(),
            owned_tags(tags),
        ));
    }

    pub(crate) fn feature(
        &mut self,
        osm_id: Osmid,
        feature_type: u8,
        name: &str,
        node_refs: &[Osmid],
        is_closed: bool,
        tags: &[(&str, &str)],
    ) {
        self.features.push((
            osm_id,
            feature_type,
            name.to_string(),
            node_refs.to_vec(),
            is_closed,
            owned_tags(tags),
        ));
    }

    pub(crate) fn relation(
        &mut self,
        osm_id: Osmid,
        tags: &[(&str, &str)],
        members: &[(Osmid, u8, &str)],
    ) {
        self.relations.push((
            osm_id,
            owned_tags(tags),
            members
                .iter()
                .map(|(id, kind, role)| (*id, *kind, role.to_string()))
                .collect(),
        ));
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(if self.version >= 2 {
            b"GISEVOO2"
        } else {
            b"GISEVOO1"
        });
        buffer.extend_from_slice(&self.version.to_le_bytes());

        buffer.extend_from_slice(&(self.pois.len() as u64).to_le_bytes());
        for (osm_id, lat, lon, category, name, tags) in &self.pois {
            buffer.extend_from_slice(&osm_id.to_le_bytes());
            buffer.extend_from_slice(&lat.to_le_bytes());
            buffer.extend_from_slice(&lon.to_le_bytes());
            write_string(&mut buffer, category);
            write_string(&mut buffer, name);
            if self.version >= 2 {
                write_tags(&mut buffer, tags);
            }
        }

        buffer.extend_from_slice(&(self.features.len() as u64).to_le_bytes());
        for (osm_id, feature_type, name, node_refs, is_closed, tags) in &self.features {
            buffer.extend_from_slice(&osm_id.to_le_bytes());
            buffer.push(*feature_type);
            write_string(&mut buffer, name);
            buffer.extend_from_slice(&(node_refs.len() as u64).to_le_bytes());
            for node_ref in node_refs {
                buffer.extend_from_slice(&node_ref.to_le_bytes());
            }
            buffer.push(*is_closed as u8);
            if self.version >= 2 {
                write_tags(&mut buffer, tags);
            }
        }

        if self.version >= 2 {
            buffer.extend_from_slice(&(self.relations.len() as u64).to_le_bytes());
            for (osm_id, tags, members) in &self.relations {
                buffer.extend_from_slice(&osm_id.to_le_bytes());
                write_tags(&mut buffer, tags);
                buffer.extend_from_slice(&(members.len() as u32).to_le_bytes());
                for (member_id, member_type, role) in members {
                    buffer.extend_from_slice(&member_id.to_le_bytes());
                    buffer.push(*member_type);
                    write_string(&mut buffer, role);
                }
            }
        }

        buffer
    }
}
