use super::MapDatabase;
use crate::model::LatLon;
use crate::projection;

impl MapDatabase {
    /// straight-line distance in meters under this map's projection
    pub fn distance_between_points(&self, a: LatLon, b: LatLon) -> f64 {
        projection::distance_between_points(a, b, self.avg_lat_rad)
    }

    /// polyline length of a street segment in meters: the sum of the
    /// distances between successive resolvable points. out-of-range
    /// indices and fully unresolvable segments yield zero.
    pub fn street_segment_length(&self, index: usize) -> f64 {
        let Some(segment) = self.segment(index) else {
            return 0.0;
        };
        let points = segment
            .node_refs
            .iter()
            .filter_map(|node_ref| self.position_of_ref(*node_ref));

        let mut length = 0.0;
        let mut previous: Option<LatLon> = None;
        for point in points {
            if let Some(previous) = previous {
                length += self.distance_between_points(previous, point);
            }
            previous = Some(point);
        }
        length
    }

    /// travel time along a segment in seconds at its posted limit; zero
    /// when the limit is unknown or non-positive
    pub fn street_segment_travel_time(&self, index: usize) -> f64 {
        let Some(segment) = self.segment(index) else {
            return 0.0;
        };
        if segment.max_speed_kph <= 0.0 {
            return 0.0;
        }
        let meters_per_second = segment.max_speed_kph as f64 / 3.6;
        self.street_segment_length(index) / meters_per_second
    }
}
