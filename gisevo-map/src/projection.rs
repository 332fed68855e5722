//! equirectangular projection between WGS84 degrees and map meters.
//!
//! longitudes are scaled by the cosine of the map's average latitude, which
//! the database computes once over all loaded nodes. good enough for
//! city-scale extracts; nobody should feed a whole hemisphere through this.

use crate::model::LatLon;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub fn lon_to_x(longitude: f64, avg_lat_rad: f64) -> f64 {
    EARTH_RADIUS_METERS * longitude.to_radians() * avg_lat_rad.cos()
}

pub fn lat_to_y(latitude: f64) -> f64 {
    EARTH_RADIUS_METERS * latitude.to_radians()
}

pub fn x_to_lon(x: f64, avg_lat_rad: f64) -> f64 {
    (x / (EARTH_RADIUS_METERS * avg_lat_rad.cos())).to_degrees()
}

pub fn y_to_lat(y: f64) -> f64 {
    (y / EARTH_RADIUS_METERS).to_degrees()
}

/// (x, y) in meters for a position under the map's average latitude
pub fn project(position: LatLon, avg_lat_rad: f64) -> (f64, f64) {
    (lon_to_x(position.lon, avg_lat_rad), lat_to_y(position.lat))
}

/// straight-line distance in meters between two projected positions
pub fn distance_between_points(a: LatLon, b: LatLon, avg_lat_rad: f64) -> f64 {
    let (ax, ay) = project(a, avg_lat_rad);
    let (bx, by) = project(b, avg_lat_rad);
    ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips() {
        let avg_lat_rad = 43.7f64.to_radians();
        let lon = -79.38;
        let lat = 43.65;
        assert!((x_to_lon(lon_to_x(lon, avg_lat_rad), avg_lat_rad) - lon).abs() < 1e-9);
        assert!((y_to_lat(lat_to_y(lat)) - lat).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // one degree of latitude is ~111.2 km regardless of longitude scale
        let meters = lat_to_y(1.0) - lat_to_y(0.0);
        assert!((meters - 111_194.9).abs() < 1.0, "got {meters}");
    }

    #[test]
    fn test_longitude_shrinks_with_latitude() {
        let at_equator = lon_to_x(1.0, 0.0);
        let at_60_north = lon_to_x(1.0, 60.0f64.to_radians());
        assert!((at_60_north / at_equator - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_on_self() {
        let avg_lat_rad = 0.76;
        let a = LatLon::new(43.6532, -79.3832);
        let b = LatLon::new(43.6542, -79.3842);
        let ab = distance_between_points(a, b, avg_lat_rad);
        let ba = distance_between_points(b, a, avg_lat_rad);
        assert_eq!(ab, ba);
        assert!(ab > 0.0);
        assert_eq!(distance_between_points(a, a, avg_lat_rad), 0.0);
    }
}
