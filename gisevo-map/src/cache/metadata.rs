use std::io::{Read, Write};

use super::checksum::CHECKSUM_LENGTH;
use super::wire;
use super::CacheError;

pub const CACHE_MAGIC: &[u8; 8] = b"GISEVOC1";
pub const CACHE_VERSION: u32 = 1;

/// fixed metadata block that follows the cache magic: format version,
/// creation time, map bounds, and the two source-file checksums that gate
/// cache reuse.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheMetadata {
    pub version: u32,
    /// seconds since the epoch at save time
    pub creation_timestamp: u64,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub avg_lat_rad: f64,
    pub streets_checksum: String,
    pub osm_checksum: String,
}

impl CacheMetadata {
    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), CacheError> {
        wire::write_u32(out, self.version)?;
        wire::write_u64(out, self.creation_timestamp)?;
        wire::write_f64(out, self.min_lat)?;
        wire::write_f64(out, self.max_lat)?;
        wire::write_f64(out, self.min_lon)?;
        wire::write_f64(out, self.max_lon)?;
        wire::write_f64(out, self.avg_lat_rad)?;
        wire::write_string(out, &pad_checksum(&self.streets_checksum))?;
        wire::write_string(out, &pad_checksum(&self.osm_checksum))?;
        Ok(())
    }

    pub fn read<R: Read>(input: &mut R) -> Result<CacheMetadata, CacheError> {
        let version = wire::read_u32(input)?;
        let creation_timestamp = wire::read_u64(input)?;
        let min_lat = wire::read_f64(input)?;
        let max_lat = wire::read_f64(input)?;
        let min_lon = wire::read_f64(input)?;
        let max_lon = wire::read_f64(input)?;
        let avg_lat_rad = wire::read_f64(input)?;
        let streets_checksum = pad_checksum(&wire::read_string(input)?);
        let osm_checksum = pad_checksum(&wire::read_string(input)?);
        Ok(CacheMetadata {
            version,
            creation_timestamp,
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            avg_lat_rad,
            streets_checksum,
            osm_checksum,
        })
    }
}

/// checksums are stored and compared at the fixed width, '0'-padded
fn pad_checksum(value: &str) -> String {
    let mut padded = value.to_string();
    while padded.len() < CHECKSUM_LENGTH {
        padded.push('0');
    }
    padded.truncate(CHECKSUM_LENGTH);
    padded
}
