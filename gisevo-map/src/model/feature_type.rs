use serde::{Deserialize, Serialize};

/// classification of a map feature (polyline or polygon). the numeric
/// encoding is the on-disk byte in the OSM overlay binary; rendering style
/// per type belongs to the drawing layer, the core stores only the tag.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FeatureType {
    #[default]
    Unknown = 0,
    Park = 1,
    Water = 2,
    Building = 3,
    Forest = 4,
    Grassland = 5,
    Wetland = 6,
    Beach = 7,
    Garden = 8,
    Playground = 9,
    Cemetery = 10,
    Hospital = 11,
    School = 12,
    University = 13,
    Stadium = 14,
    Airport = 15,
    Railway = 16,
    Bridge = 17,
    Tunnel = 18,
    Wall = 19,
    Fence = 20,
    Barrier = 21,
    Coastline = 22,
    River = 23,
    Stream = 24,
    Canal = 25,
    Lake = 26,
    Pond = 27,
    Reservoir = 28,
    Bay = 29,
    Sea = 30,
    Ocean = 31,
}

impl FeatureType {
    pub fn from_u8(value: u8) -> FeatureType {
        use FeatureType as F;
        match value {
            1 => F::Park,
            2 => F::Water,
            3 => F::Building,
            4 => F::Forest,
            5 => F::Grassland,
            6 => F::Wetland,
            7 => F::Beach,
            8 => F::Garden,
            9 => F::Playground,
            10 => F::Cemetery,
            11 => F::Hospital,
            12 => F::School,
            13 => F::University,
            14 => F::Stadium,
            15 => F::Airport,
            16 => F::Railway,
            17 => F::Bridge,
            18 => F::Tunnel,
            19 => F::Wall,
            20 => F::Fence,
            21 => F::Barrier,
            22 => F::Coastline,
            23 => F::River,
            24 => F::Stream,
            25 => F::Canal,
            26 => F::Lake,
            27 => F::Pond,
            28 => F::Reservoir,
            29 => F::Bay,
            30 => F::Sea,
            31 => F::Ocean,
            _ => F::Unknown,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// waterbody types are drawn and z-ordered together downstream
    pub fn is_water(&self) -> bool {
        use FeatureType as F;
        matches!(
            self,
            F::Water
                | F::River
                | F::Stream
                | F::Canal
                | F::Lake
                | F::Pond
                | F::Reservoir
                | F::Bay
                | F::Sea
                | F::Ocean
        )
    }
}
