pub mod index;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let half_dlat = ((b.lat - a.lat).to_radians() / 2.0).sin();
    let half_dlng = ((b.lng - a.lng).to_radians() / 2.0).sin();

    let h = half_dlat.powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * half_dlng.powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, haversine_km};

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(6.5244, 3.3792);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn lagos_to_ibadan_is_around_114_km() {
        let lagos = GeoPoint::new(6.5244, 3.3792);
        let ibadan = GeoPoint::new(7.3775, 3.9470);
        let distance = haversine_km(lagos, ibadan);
        assert!((distance - 114.0).abs() < 5.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(6.5244, 3.3792);
        let b = GeoPoint::new(6.4654, 3.4064);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(GeoPoint::new(6.5244, 3.3792).is_valid());
    }
}
