use std::collections::HashMap;
use std::f64::consts::PI;

use kdam::tqdm;

use gisevo_spatial::BoundingBox;

use super::MapDatabase;
use crate::model::Osmid;

impl MapDatabase {
    /// derive everything that follows from the entity vectors: global
    /// bounds, lookup tables, intersections, then the spatial indexes
    pub(super) fn build_indexes(&mut self) {
        self.compute_map_bounds();
        self.rebuild_lookup_tables();
        self.build_spatial_indexes();
    }

    fn compute_map_bounds(&mut self) {
        if self.nodes.is_empty() {
            self.min_lat = 0.0;
            self.max_lat = 0.0;
            self.min_lon = 0.0;
            self.max_lon = 0.0;
            self.avg_lat_rad = 0.0;
            return;
        }

        let mut min_lat = self.nodes[0].lat;
        let mut max_lat = self.nodes[0].lat;
        let mut min_lon = self.nodes[0].lon;
        let mut max_lon = self.nodes[0].lon;
        let mut lat_sum = 0.0;

        let iter = tqdm!(
            self.nodes.iter(),
            desc = "scan node bounds",
            total = self.nodes.len()
        );
        for node in iter {
            min_lat = min_lat.min(node.lat);
            max_lat = max_lat.max(node.lat);
            min_lon = min_lon.min(node.lon);
            max_lon = max_lon.max(node.lon);
            lat_sum += node.lat;
        }

        self.min_lat = min_lat;
        self.max_lat = max_lat;
        self.min_lon = min_lon;
        self.max_lon = max_lon;
        self.avg_lat_rad = (lat_sum / self.nodes.len() as f64) * (PI / 180.0);

        log::info!(
            "map bounds: lat=[{min_lat}, {max_lat}], lon=[{min_lon}, {max_lon}], avg_lat_rad={}",
            self.avg_lat_rad
        );
    }

    /// rebuild the id maps, street-name map, and intersection tables from
    /// the entity vectors. intersections are emitted in node-index order so
    /// the derivation is deterministic for a given map, which keeps
    /// serialized index payloads valid across a cache round-trip.
    pub(crate) fn rebuild_lookup_tables(&mut self) {
        self.node_id_to_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.osm_id, index))
            .collect();

        self.way_id_to_segment_index = self
            .segments
            .iter()
            .enumerate()
            .map(|(index, segment)| (segment.osm_id, index))
            .collect();

        self.relation_id_to_index = self
            .relations
            .iter()
            .enumerate()
            .map(|(index, relation)| (relation.osm_id, index))
            .collect();

        // first occurrence wins; unnamed segments are skipped
        self.street_name_to_first_segment.clear();
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.name.is_empty() {
                continue;
            }
            self.street_name_to_first_segment
                .entry(segment.name.clone())
                .or_insert(index);
        }

        // collect the segments touching each endpoint node
        let mut node_to_segments: HashMap<Osmid, Vec<usize>> = HashMap::new();
        for (segment_index, segment) in self.segments.iter().enumerate() {
            if segment.node_refs.len() < 2 {
                continue;
            }
            if let Some(first) = segment.from_node_ref() {
                node_to_segments.entry(first).or_default().push(segment_index);
            }
            if let Some(last) = segment.to_node_ref() {
                node_to_segments.entry(last).or_default().push(segment_index);
            }
        }

        self.intersection_node_ids.clear();
        self.intersection_segments.clear();
        for node in &self.nodes {
            if let Some(touching) = node_to_segments.get(&node.osm_id) {
                if touching.len() >= 2 {
                    self.intersection_node_ids.push(node.osm_id);
                    self.intersection_segments.push(touching.clone());
                }
            }
        }
    }

    /// bulk-load the four spatial indexes from the current entities.
    /// unresolved node refs drop an entity from its index, never from the
    /// entity vector itself.
    pub(crate) fn build_spatial_indexes(&mut self) {
        let street_entries = self.street_index_entries();
        let intersection_entries = self.intersection_index_entries();
        let poi_entries = self.poi_index_entries();
        let feature_entries = self.feature_index_entries();

        self.street_index.bulk_load(street_entries);
        self.intersection_index.bulk_load(intersection_entries);
        self.poi_index.bulk_load(poi_entries);
        self.feature_index.bulk_load(feature_entries);

        log::info!(
            "spatial indexes: streets={} (depth {}), intersections={} (depth {}), pois={} (depth {}), features={} (depth {})",
            self.street_index.len(),
            self.street_index.depth(),
            self.intersection_index.len(),
            self.intersection_index.depth(),
            self.poi_index.len(),
            self.poi_index.depth(),
            self.feature_index.len(),
            self.feature_index.depth()
        );

        if !self.validate_spatial_indexes() {
            log::error!("spatial index structure validation failed after build");
        }
    }

    /// tight box over the two endpoint nodes of each segment
    fn street_index_entries(&self) -> Vec<(usize, BoundingBox)> {
        let mut entries = Vec::with_capacity(self.segments.len());
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.node_refs.len() < 2 {
                continue;
            }
            let (Some(from_ref), Some(to_ref)) =
                (segment.from_node_ref(), segment.to_node_ref())
            else {
                continue;
            };
            let (Some(from), Some(to)) = (
                self.position_of_ref(from_ref),
                self.position_of_ref(to_ref),
            ) else {
                continue;
            };
            let bounds = BoundingBox::new(
                from.lon.min(to.lon),
                from.lat.min(to.lat),
                from.lon.max(to.lon),
                from.lat.max(to.lat),
            );
            entries.push((index, bounds));
        }
        entries
    }

    fn intersection_index_entries(&self) -> Vec<(usize, BoundingBox)> {
        let mut entries = Vec::with_capacity(self.intersection_node_ids.len());
        for (index, node_id) in self.intersection_node_ids.iter().enumerate() {
            if let Some(position) = self.position_of_ref(*node_id) {
                entries.push((index, BoundingBox::from_point(position.lon, position.lat)));
            }
        }
        entries
    }

    fn poi_index_entries(&self) -> Vec<(usize, BoundingBox)> {
        self.pois
            .iter()
            .enumerate()
            .map(|(index, poi)| (index, BoundingBox::from_point(poi.lon, poi.lat)))
            .collect()
    }

    /// tight box over all resolvable refs; features with none resolvable
    /// are omitted
    fn feature_index_entries(&self) -> Vec<(usize, BoundingBox)> {
        let mut entries = Vec::with_capacity(self.features.len());
        for (index, feature) in self.features.iter().enumerate() {
            let mut bounds: Option<BoundingBox> = None;
            for node_ref in &feature.node_refs {
                let Some(position) = self.position_of_ref(*node_ref) else {
                    continue;
                };
                let point = BoundingBox::from_point(position.lon, position.lat);
                match bounds.as_mut() {
                    Some(bounds) => bounds.expand(&point),
                    None => bounds = Some(point),
                }
            }
            if let Some(bounds) = bounds {
                entries.push((index, bounds));
            }
        }
        entries
    }
}
