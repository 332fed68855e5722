use serde::{Deserialize, Serialize};

use super::{HighwayCategory, Osmid, TagList};

/// directed highway piece between two endpoint nodes plus zero or more
/// interior curve nodes. `node_refs` always holds at least the two
/// endpoints; interior entries are curve points.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreetSegment {
    pub osm_id: Osmid,
    pub category: HighwayCategory,
    /// km/h; negative means the source way carried no usable limit
    pub max_speed_kph: f32,
    pub name: String,
    pub node_refs: Vec<Osmid>,
    /// derived from the refs at parse time, never trusted from disk
    pub is_closed: bool,
    pub tags: TagList,
}

impl StreetSegment {
    /// first and last refs equal means the segment loops back on itself
    pub fn derive_is_closed(node_refs: &[Osmid]) -> bool {
        node_refs.len() >= 2 && node_refs.first() == node_refs.last()
    }

    pub fn curve_point_count(&self) -> usize {
        self.node_refs.len().saturating_sub(2)
    }

    pub fn from_node_ref(&self) -> Option<Osmid> {
        self.node_refs.first().copied()
    }

    pub fn to_node_ref(&self) -> Option<Osmid> {
        self.node_refs.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::StreetSegment;

    #[test]
    fn test_derive_is_closed() {
        assert!(StreetSegment::derive_is_closed(&[5, 6, 7, 5]));
        assert!(!StreetSegment::derive_is_closed(&[5, 6, 7]));
        assert!(!StreetSegment::derive_is_closed(&[5]));
        assert!(!StreetSegment::derive_is_closed(&[]));
    }

    #[test]
    fn test_curve_point_count_excludes_endpoints() {
        let seg = StreetSegment {
            node_refs: vec![1, 2, 3, 4],
            ..StreetSegment::default()
        };
        assert_eq!(seg.curve_point_count(), 2);

        let bare = StreetSegment {
            node_refs: vec![1, 2],
            ..StreetSegment::default()
        };
        assert_eq!(bare.curve_point_count(), 0);
    }
}
