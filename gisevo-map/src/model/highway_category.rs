use serde::{Deserialize, Serialize};

/// highway classification of a street segment. the numeric encoding is the
/// on-disk byte in the streets binary and must never be reordered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HighwayCategory {
    #[default]
    Unknown = 0,
    Motorway = 1,
    Trunk = 2,
    Primary = 3,
    Secondary = 4,
    Tertiary = 5,
    Residential = 6,
    Service = 7,
    Track = 8,
    Footway = 9,
    Path = 10,
    Cycleway = 11,
}

impl HighwayCategory {
    /// decode the on-disk byte; unknown encodings collapse to `Unknown`
    /// rather than failing the whole file
    pub fn from_u8(value: u8) -> HighwayCategory {
        use HighwayCategory as H;
        match value {
            1 => H::Motorway,
            2 => H::Trunk,
            3 => H::Primary,
            4 => H::Secondary,
            5 => H::Tertiary,
            6 => H::Residential,
            7 => H::Service,
            8 => H::Track,
            9 => H::Footway,
            10 => H::Path,
            11 => H::Cycleway,
            _ => H::Unknown,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// true for categories that carry motor traffic
    pub fn is_drivable(&self) -> bool {
        use HighwayCategory as H;
        matches!(
            self,
            H::Motorway
                | H::Trunk
                | H::Primary
                | H::Secondary
                | H::Tertiary
                | H::Residential
                | H::Service
                | H::Track
        )
    }
}

#[cfg(test)]
mod tests {
    use super::HighwayCategory;

    #[test]
    fn test_round_trip_all_encodings() {
        for byte in 0..=11u8 {
            assert_eq!(HighwayCategory::from_u8(byte).as_u8(), byte);
        }
    }

    #[test]
    fn test_unknown_bytes_decode_to_unknown() {
        assert_eq!(HighwayCategory::from_u8(12), HighwayCategory::Unknown);
        assert_eq!(HighwayCategory::from_u8(255), HighwayCategory::Unknown);
    }

    #[test]
    fn test_drivable_split() {
        assert!(HighwayCategory::Primary.is_drivable());
        assert!(!HighwayCategory::Footway.is_drivable());
        assert!(!HighwayCategory::Unknown.is_drivable());
    }
}
