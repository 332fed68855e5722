mod feature_type;
mod highway_category;
mod lat_lon;
mod map_feature;
mod map_node;
mod poi;
mod relation;
mod street_segment;

pub use feature_type::FeatureType;
pub use highway_category::HighwayCategory;
pub use lat_lon::LatLon;
pub use map_feature::MapFeature;
pub use map_node::MapNode;
pub use poi::Poi;
pub use relation::{Relation, RelationMemberType};
pub use street_segment::StreetSegment;

/// original OpenStreetMap identifier. entity identity inside a loaded map
/// is a dense 0-based index; the OSM id is carried as an attribute only.
pub type Osmid = i64;

/// ordered key/value tag pairs as they appear on disk
pub type TagList = Vec<(String, String)>;

/// sentinel for segments whose source way carried no usable maxspeed tag
pub const SPEED_UNKNOWN_KPH: f32 = -1.0;
