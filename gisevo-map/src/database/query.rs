use itertools::Itertools;

use gisevo_spatial::BoundingBox;

use super::MapDatabase;

impl MapDatabase {
    /// street segments whose polyline touches the query box: R-tree
    /// candidates refined so a segment is kept iff its from position, to
    /// position, or any curve point lies inside the box
    pub fn query_streets_in_bounds(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Vec<usize> {
        let Some(window) = query_window(min_x, min_y, max_x, max_y) else {
            return Vec::new();
        };
        self.street_index
            .query(&window)
            .into_iter()
            .filter(|&index| self.segment_touches_window(index, &window))
            .collect_vec()
    }

    /// intersections inside the box; point entries need no refinement
    pub fn query_intersections_in_bounds(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Vec<usize> {
        let Some(window) = query_window(min_x, min_y, max_x, max_y) else {
            return Vec::new();
        };
        self.intersection_index.query(&window)
    }

    pub fn query_pois_in_bounds(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Vec<usize> {
        let Some(window) = query_window(min_x, min_y, max_x, max_y) else {
            return Vec::new();
        };
        self.poi_index.query(&window)
    }

    /// features whose bounding box intersects the query box; polygon-level
    /// refinement is the renderer's concern
    pub fn query_features_in_bounds(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Vec<usize> {
        let Some(window) = query_window(min_x, min_y, max_x, max_y) else {
            return Vec::new();
        };
        self.feature_index.query(&window)
    }

    fn segment_touches_window(&self, index: usize, window: &BoundingBox) -> bool {
        let Some(segment) = self.segment(index) else {
            return false;
        };
        segment.node_refs.iter().any(|node_ref| {
            self.node_index_of(*node_ref)
                .map(|node_index| {
                    let position = self.node_position(node_index);
                    window.contains(position.lon, position.lat)
                })
                .unwrap_or(false)
        })
    }
}

/// degenerate boxes (min above max on either axis) match nothing
fn query_window(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Option<BoundingBox> {
    if min_x > max_x || min_y > max_y {
        return None;
    }
    Some(BoundingBox::new(min_x, min_y, max_x, max_y))
}
