mod geometry_ops;
mod index_ops;
mod load;
mod query;

#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use gisevo_spatial::{BoundingBox, RTree, RTreeOptions};

use crate::io::osm_format::{self, OsmData};
use crate::io::streets_format::{self, StreetsData};
use crate::io::{MappedFile, SliceReader, StreamReader};
use crate::model::{
    LatLon, MapFeature, MapNode, Osmid, Poi, Relation, StreetSegment,
};
use crate::MapError;

/// in-memory map database: entity vectors, derived lookup tables, global
/// bounds, and one bulk-loaded spatial index per entity class.
///
/// mutation happens only inside load, clear, and cache restore; between
/// those the structure is effectively immutable and may be shared read-only.
pub struct MapDatabase {
    nodes: Vec<MapNode>,
    segments: Vec<StreetSegment>,
    pois: Vec<Poi>,
    features: Vec<MapFeature>,
    relations: Vec<Relation>,

    node_id_to_index: HashMap<Osmid, usize>,
    way_id_to_segment_index: HashMap<Osmid, usize>,
    relation_id_to_index: HashMap<Osmid, usize>,
    street_name_to_first_segment: HashMap<String, usize>,
    intersection_node_ids: Vec<Osmid>,
    intersection_segments: Vec<Vec<usize>>,

    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
    avg_lat_rad: f64,

    // mapped regions stay owned until clear or reload; entities copy their
    // strings out at parse time
    streets_mmap: Option<MappedFile>,
    osm_mmap: Option<MappedFile>,

    street_index: RTree<usize>,
    intersection_index: RTree<usize>,
    poi_index: RTree<usize>,
    feature_index: RTree<usize>,

    spatial_options: RTreeOptions,
    loading: bool,
}

impl Default for MapDatabase {
    fn default() -> Self {
        MapDatabase::new()
    }
}

impl MapDatabase {
    pub fn new() -> MapDatabase {
        MapDatabase::with_spatial_options(RTreeOptions::default())
    }

    pub fn with_spatial_options(spatial_options: RTreeOptions) -> MapDatabase {
        MapDatabase {
            nodes: Vec::new(),
            segments: Vec::new(),
            pois: Vec::new(),
            features: Vec::new(),
            relations: Vec::new(),
            node_id_to_index: HashMap::new(),
            way_id_to_segment_index: HashMap::new(),
            relation_id_to_index: HashMap::new(),
            street_name_to_first_segment: HashMap::new(),
            intersection_node_ids: Vec::new(),
            intersection_segments: Vec::new(),
            min_lat: 0.0,
            max_lat: 0.0,
            min_lon: 0.0,
            max_lon: 0.0,
            avg_lat_rad: 0.0,
            streets_mmap: None,
            osm_mmap: None,
            street_index: RTree::new(spatial_options),
            intersection_index: RTree::new(spatial_options),
            poi_index: RTree::new(spatial_options),
            feature_index: RTree::new(spatial_options),
            spatial_options,
            loading: false,
        }
    }

    // ------------------------------------------------------------------
    // loading

    /// load a streets binary: entities, then derived tables, then spatial
    /// indexes. fail-atomic: any error leaves the database empty.
    pub fn load_streets(&mut self, path: &Path) -> Result<(), MapError> {
        self.begin_load()?;
        let result = self.load_streets_guardless(path);
        self.end_load();
        result
    }

    /// load an OSM overlay binary. requires the streets binary to be loaded
    /// first so feature node refs resolve.
    pub fn load_osm(&mut self, path: &Path) -> Result<(), MapError> {
        self.begin_load()?;
        let result = self.load_osm_guardless(path);
        self.end_load();
        result
    }

    pub(super) fn load_streets_guardless(&mut self, path: &Path) -> Result<(), MapError> {
        let result = self.load_streets_inner(path);
        if result.is_err() {
            self.clear_contents();
        }
        result
    }

    pub(super) fn load_osm_guardless(&mut self, path: &Path) -> Result<(), MapError> {
        let result = self.load_osm_inner(path);
        if result.is_err() {
            self.clear_contents();
        }
        result
    }

    fn load_streets_inner(&mut self, path: &Path) -> Result<(), MapError> {
        let data = self.read_streets_file(path)?;
        self.nodes = data.nodes;
        self.segments = data.segments;
        self.build_indexes();
        Ok(())
    }

    fn load_osm_inner(&mut self, path: &Path) -> Result<(), MapError> {
        let data = self.read_osm_file(path)?;
        self.pois = data.pois;
        self.features = data.features;
        self.relations = data.relations;

        self.relation_id_to_index = self
            .relations
            .iter()
            .enumerate()
            .map(|(index, relation)| (relation.osm_id, index))
            .collect();

        self.build_spatial_indexes();
        Ok(())
    }

    /// memory-map and parse; on mapping or parse failure run the identical
    /// logical parse through the buffered stream reader
    fn read_streets_file(&mut self, path: &Path) -> Result<StreetsData, MapError> {
        match MappedFile::open(path) {
            Ok(mapped) => {
                let parsed = {
                    let mut reader = SliceReader::new(mapped.bytes());
                    streets_format::parse_streets(&mut reader)
                };
                match parsed {
                    Ok(data) => {
                        self.streets_mmap = Some(mapped);
                        Ok(data)
                    }
                    Err(error) => {
                        log::warn!(
                            "memory-mapped parse of {} failed ({error}), retrying via stream",
                            path.display()
                        );
                        Self::read_streets_stream(path)
                    }
                }
            }
            Err(MapError::NotFound(path)) => Err(MapError::NotFound(path)),
            Err(error) => {
                log::warn!(
                    "memory mapping {} failed ({error}), falling back to stream loading",
                    path.display()
                );
                Self::read_streets_stream(path)
            }
        }
    }

    fn read_streets_stream(path: &Path) -> Result<StreetsData, MapError> {
        let file = open_for_stream(path)?;
        let mut reader = StreamReader::new(file);
        streets_format::parse_streets(&mut reader)
    }

    fn read_osm_file(&mut self, path: &Path) -> Result<OsmData, MapError> {
        match MappedFile::open(path) {
            Ok(mapped) => {
                let parsed = {
                    let mut reader = SliceReader::new(mapped.bytes());
                    osm_format::parse_osm(&mut reader)
                };
                match parsed {
                    Ok(data) => {
                        self.osm_mmap = Some(mapped);
                        Ok(data)
                    }
                    Err(error) => {
                        log::warn!(
                            "memory-mapped parse of {} failed ({error}), retrying via stream",
                            path.display()
                        );
                        Self::read_osm_stream(path)
                    }
                }
            }
            Err(MapError::NotFound(path)) => Err(MapError::NotFound(path)),
            Err(error) => {
                log::warn!(
                    "memory mapping {} failed ({error}), falling back to stream loading",
                    path.display()
                );
                Self::read_osm_stream(path)
            }
        }
    }

    fn read_osm_stream(path: &Path) -> Result<OsmData, MapError> {
        let file = open_for_stream(path)?;
        let mut reader = StreamReader::new(file);
        osm_format::parse_osm(&mut reader)
    }

    /// drop every entity, derived table, index, and mapped region
    pub fn clear(&mut self) {
        self.clear_contents();
    }

    fn clear_contents(&mut self) {
        self.nodes.clear();
        self.segments.clear();
        self.pois.clear();
        self.features.clear();
        self.relations.clear();
        self.node_id_to_index.clear();
        self.way_id_to_segment_index.clear();
        self.relation_id_to_index.clear();
        self.street_name_to_first_segment.clear();
        self.intersection_node_ids.clear();
        self.intersection_segments.clear();
        self.min_lat = 0.0;
        self.max_lat = 0.0;
        self.min_lon = 0.0;
        self.max_lon = 0.0;
        self.avg_lat_rad = 0.0;
        self.streets_mmap = None;
        self.osm_mmap = None;
        self.street_index.clear();
        self.intersection_index.clear();
        self.poi_index.clear();
        self.feature_index.clear();
    }

    fn begin_load(&mut self) -> Result<(), MapError> {
        if self.loading {
            return Err(MapError::LoadInProgress);
        }
        self.loading = true;
        Ok(())
    }

    fn end_load(&mut self) {
        self.loading = false;
    }

    // ------------------------------------------------------------------
    // entity access. out-of-range indices return empty defaults because
    // callers include paint-loop code that may hold stale indices across
    // a reload.

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn poi_count(&self) -> usize {
        self.pois.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn intersection_count(&self) -> usize {
        self.intersection_node_ids.len()
    }

    pub fn street_count(&self) -> usize {
        self.street_name_to_first_segment.len()
    }

    pub fn nodes(&self) -> &[MapNode] {
        &self.nodes
    }

    pub fn segments(&self) -> &[StreetSegment] {
        &self.segments
    }

    pub fn pois(&self) -> &[Poi] {
        &self.pois
    }

    pub fn features(&self) -> &[MapFeature] {
        &self.features
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn node(&self, index: usize) -> Option<&MapNode> {
        self.nodes.get(index)
    }

    pub fn node_position(&self, index: usize) -> LatLon {
        self.nodes
            .get(index)
            .map(MapNode::position)
            .unwrap_or_default()
    }

    pub fn node_osm_id(&self, index: usize) -> Osmid {
        self.nodes.get(index).map(|node| node.osm_id).unwrap_or(0)
    }

    pub fn node_index_of(&self, osm_id: Osmid) -> Option<usize> {
        self.node_id_to_index.get(&osm_id).copied()
    }

    pub fn segment(&self, index: usize) -> Option<&StreetSegment> {
        self.segments.get(index)
    }

    pub fn segment_index_of_way(&self, osm_id: Osmid) -> Option<usize> {
        self.way_id_to_segment_index.get(&osm_id).copied()
    }

    /// positions of the two endpoint nodes, when both resolve
    pub fn segment_endpoints(&self, index: usize) -> Option<(LatLon, LatLon)> {
        let segment = self.segments.get(index)?;
        let from = self.position_of_ref(segment.from_node_ref()?)?;
        let to = self.position_of_ref(segment.to_node_ref()?)?;
        Some((from, to))
    }

    /// curve point k sits at node_refs[k + 1], between the endpoints
    pub fn street_segment_curve_point(&self, curve_point: usize, segment: usize) -> LatLon {
        let Some(seg) = self.segments.get(segment) else {
            return LatLon::default();
        };
        let Some(node_ref) = seg.node_refs.get(curve_point + 1) else {
            return LatLon::default();
        };
        self.position_of_ref(*node_ref).unwrap_or_default()
    }

    /// name carried by the segment at this index; streets are addressed by
    /// their first segment
    pub fn street_name(&self, street_id: usize) -> String {
        self.segments
            .get(street_id)
            .map(|segment| segment.name.clone())
            .unwrap_or_default()
    }

    pub fn street_by_name(&self, name: &str) -> Option<usize> {
        self.street_name_to_first_segment.get(name).copied()
    }

    pub fn intersection_position(&self, index: usize) -> LatLon {
        self.intersection_node_ids
            .get(index)
            .and_then(|node_id| self.position_of_ref(*node_id))
            .unwrap_or_default()
    }

    pub fn intersection_osm_node_id(&self, index: usize) -> Osmid {
        self.intersection_node_ids.get(index).copied().unwrap_or(0)
    }

    pub fn intersection_street_segment_count(&self, index: usize) -> usize {
        self.intersection_segments
            .get(index)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn intersection_street_segment(&self, segment_number: usize, index: usize) -> usize {
        self.intersection_segments
            .get(index)
            .and_then(|segments| segments.get(segment_number))
            .copied()
            .unwrap_or(0)
    }

    /// every segment index touching this intersection
    pub fn intersection_street_segments(&self, index: usize) -> &[usize] {
        self.intersection_segments
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn poi(&self, index: usize) -> Option<&Poi> {
        self.pois.get(index)
    }

    pub fn poi_position(&self, index: usize) -> LatLon {
        self.pois.get(index).map(Poi::position).unwrap_or_default()
    }

    pub fn poi_name(&self, index: usize) -> String {
        self.pois
            .get(index)
            .map(|poi| poi.name.clone())
            .unwrap_or_default()
    }

    pub fn poi_category(&self, index: usize) -> String {
        self.pois
            .get(index)
            .map(|poi| poi.category.clone())
            .unwrap_or_default()
    }

    pub fn feature(&self, index: usize) -> Option<&MapFeature> {
        self.features.get(index)
    }

    pub fn feature_point_count(&self, index: usize) -> usize {
        self.features
            .get(index)
            .map(|feature| feature.node_refs.len())
            .unwrap_or(0)
    }

    /// dereference feature point k through the node lookup table
    pub fn feature_point(&self, point: usize, feature: usize) -> LatLon {
        self.features
            .get(feature)
            .and_then(|f| f.node_refs.get(point))
            .and_then(|node_ref| self.position_of_ref(*node_ref))
            .unwrap_or_default()
    }

    pub fn relation(&self, index: usize) -> Option<&Relation> {
        self.relations.get(index)
    }

    pub fn relation_by_osm_id(&self, osm_id: Osmid) -> Option<&Relation> {
        self.relation_id_to_index
            .get(&osm_id)
            .and_then(|index| self.relations.get(*index))
    }

    // ------------------------------------------------------------------
    // map bounds

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn avg_lat_rad(&self) -> f64 {
        self.avg_lat_rad
    }

    pub fn map_bounds(&self) -> BoundingBox {
        BoundingBox::new(self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }

    /// options the spatial indexes were constructed with
    pub fn spatial_options(&self) -> RTreeOptions {
        self.spatial_options
    }

    /// recursive containment check over all four indexes; a failure after a
    /// cache restore means the cache must be discarded
    pub fn validate_spatial_indexes(&self) -> bool {
        let mut all_valid = true;
        for (name, index) in self.named_indexes() {
            if !index.validate_structure() {
                log::error!("{name} spatial index failed structure validation");
                all_valid = false;
            }
        }
        all_valid
    }

    fn named_indexes(&self) -> [(&'static str, &RTree<usize>); 4] {
        [
            ("street", &self.street_index),
            ("intersection", &self.intersection_index),
            ("poi", &self.poi_index),
            ("feature", &self.feature_index),
        ]
    }

    fn position_of_ref(&self, node_ref: Osmid) -> Option<LatLon> {
        self.node_id_to_index
            .get(&node_ref)
            .and_then(|index| self.nodes.get(*index))
            .map(MapNode::position)
    }

    // ------------------------------------------------------------------
    // cache support: the cache module rebuilds a database from its
    // serialized entity vectors and restores the spatial indexes directly

    pub(crate) fn replace_entities(
        &mut self,
        nodes: Vec<MapNode>,
        segments: Vec<StreetSegment>,
        pois: Vec<Poi>,
        features: Vec<MapFeature>,
        relations: Vec<Relation>,
    ) {
        self.clear_contents();
        self.nodes = nodes;
        self.segments = segments;
        self.pois = pois;
        self.features = features;
        self.relations = relations;
    }

    pub(crate) fn set_map_bounds(
        &mut self,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
        avg_lat_rad: f64,
    ) {
        self.min_lat = min_lat;
        self.max_lat = max_lat;
        self.min_lon = min_lon;
        self.max_lon = max_lon;
        self.avg_lat_rad = avg_lat_rad;
    }

    pub(crate) fn spatial_indexes(&self) -> [&RTree<usize>; 4] {
        [
            &self.street_index,
            &self.intersection_index,
            &self.poi_index,
            &self.feature_index,
        ]
    }

    pub(crate) fn spatial_indexes_mut(&mut self) -> [&mut RTree<usize>; 4] {
        [
            &mut self.street_index,
            &mut self.intersection_index,
            &mut self.poi_index,
            &mut self.feature_index,
        ]
    }
}

fn open_for_stream(path: &Path) -> Result<File, MapError> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MapError::NotFound(path.to_path_buf()),
        _ => MapError::from(e),
    })
}
