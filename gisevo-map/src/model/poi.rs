use serde::{Deserialize, Serialize};

use super::{LatLon, Osmid, TagList};

/// geotagged named entity separate from the street graph. the category is
/// a free-form tag-derived label such as `"amenity:cafe"`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub osm_id: Osmid,
    pub lat: f64,
    pub lon: f64,
    pub category: String,
    pub name: String,
    pub tags: TagList,
}

impl Poi {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }
}
