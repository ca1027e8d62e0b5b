//! Geographic primitives: lat/lng points and great-circle distances.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Great-circle (Haversine) distance between two points, in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Sum of great-circle distances between consecutive points.
/// Returns 0.0 for fewer than two points.
pub fn path_distance_km(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_zero_for_identical_points() {
        let p = GeoPoint::new(12.74, 77.82);
        assert!(haversine_km(p, p).abs() < 1e-12);
    }

    #[test]
    fn haversine_matches_known_distance() {
        // One degree of latitude is ~111.2 km at the equator.
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let d = haversine_km(a, b);
        assert!((d - 111.195).abs() < 0.1, "got {d}");
    }

    #[test]
    fn path_distance_sums_consecutive_legs() {
        let points = vec![
            GeoPoint::new(12.74, 77.82),
            GeoPoint::new(12.78, 77.82),
            GeoPoint::new(12.82, 77.82),
        ];
        let total = path_distance_km(&points);
        let leg1 = haversine_km(points[0], points[1]);
        let leg2 = haversine_km(points[1], points[2]);
        assert!((total - (leg1 + leg2)).abs() < 1e-12);
    }

    #[test]
    fn path_distance_is_zero_below_two_points() {
        assert_eq!(path_distance_km(&[]), 0.0);
        assert_eq!(path_distance_km(&[GeoPoint::new(1.0, 1.0)]), 0.0);
    }
}
