use serde::{Deserialize, Serialize};

use super::{Osmid, TagList};

/// member kind of an OSM relation. the numeric encoding is the on-disk
/// byte in the OSM overlay binary.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RelationMemberType {
    #[default]
    Node = 0,
    Way = 1,
    Relation = 2,
}

impl RelationMemberType {
    pub fn from_u8(value: u8) -> RelationMemberType {
        match value {
            1 => RelationMemberType::Way,
            2 => RelationMemberType::Relation,
            _ => RelationMemberType::Node,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// n-ary grouping of members with roles. the three member arrays always
/// share one length.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub osm_id: Osmid,
    pub tags: TagList,
    pub member_ids: Vec<Osmid>,
    pub member_types: Vec<RelationMemberType>,
    pub member_roles: Vec<String>,
}

impl Relation {
    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::RelationMemberType;

    #[test]
    fn test_member_type_encoding() {
        assert_eq!(RelationMemberType::from_u8(0), RelationMemberType::Node);
        assert_eq!(RelationMemberType::from_u8(1), RelationMemberType::Way);
        assert_eq!(RelationMemberType::from_u8(2), RelationMemberType::Relation);
        // out-of-range bytes collapse to Node, the least structured kind
        assert_eq!(RelationMemberType::from_u8(9), RelationMemberType::Node);
        for byte in 0..=2u8 {
            assert_eq!(RelationMemberType::from_u8(byte).as_u8(), byte);
        }
    }
}
