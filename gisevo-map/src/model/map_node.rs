use serde::{Deserialize, Serialize};

use super::{LatLon, Osmid, TagList};

/// persistent point from the streets binary. created during load, never
/// mutated, dropped at unload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub osm_id: Osmid,
    pub lat: f64,
    pub lon: f64,
    pub tags: TagList,
}

impl MapNode {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }
}
