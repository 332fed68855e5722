use serde::{Deserialize, Serialize};

use super::{FeatureType, Osmid, TagList};

/// polyline or polygon attached to nodes. the point sequence is derived on
/// query by resolving each node ref through the node lookup table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapFeature {
    pub osm_id: Osmid,
    pub feature_type: FeatureType,
    pub name: String,
    pub node_refs: Vec<Osmid>,
    pub is_closed: bool,
    pub tags: TagList,
}
