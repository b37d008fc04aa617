//! Geographic calculations and travel time estimation

use crate::services::settings::EstimatorSettings;
use crate::types::{Coordinates, TravelClass};

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Round a distance for output so plans serialize identically across runs
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

/// Distance and duration of one hop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelEstimate {
    /// Road-corrected distance in kilometers
    pub distance_km: f64,
    /// Whole minutes including the per-class buffer
    pub minutes: i64,
}

/// Travel model abstraction (geodesic estimate in production, fixed times in tests)
pub trait TravelModel {
    fn estimate(&self, from: &Coordinates, to: &Coordinates, class: TravelClass) -> TravelEstimate;
}

/// Haversine distance with road correction and class-dependent speed
#[derive(Debug, Clone, Default)]
pub struct GeoDistanceEstimator {
    settings: EstimatorSettings,
}

impl GeoDistanceEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self { settings }
    }

    /// Estimate road distance from straight-line distance
    pub fn road_distance(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        haversine_distance(from, to) * self.settings.road_correction
    }
}

impl TravelModel for GeoDistanceEstimator {
    fn estimate(&self, from: &Coordinates, to: &Coordinates, class: TravelClass) -> TravelEstimate {
        let (speed, buffer) = match class {
            TravelClass::Local => (self.settings.local_speed_kmh, self.settings.local_buffer_minutes),
            TravelClass::Outstation => (
                self.settings.outstation_speed_kmh,
                self.settings.outstation_buffer_minutes,
            ),
        };
        let distance_km = self.road_distance(from, to);
        let driving = (distance_km / speed * 60.0).ceil() as i64;

        TravelEstimate {
            distance_km,
            minutes: driving + buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn madurai() -> Coordinates {
        Coordinates { lat: 9.9252, lng: 78.1198 }
    }

    fn rameswaram() -> Coordinates {
        Coordinates { lat: 9.2876, lng: 79.3129 }
    }

    #[test]
    fn test_haversine_madurai_rameswaram() {
        let distance = haversine_distance(&madurai(), &rameswaram());

        // Roughly 148 km as the crow flies
        assert!((distance - 148.0).abs() < 5.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinates { lat: 10.0, lng: 78.0 };
        let distance = haversine_distance(&point, &point);
        assert!((distance - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_road_distance_applies_correction() {
        let estimator = GeoDistanceEstimator::default();
        let straight = haversine_distance(&madurai(), &rameswaram());
        let road = estimator.road_distance(&madurai(), &rameswaram());

        assert!((road / straight - crate::defaults::ROAD_CORRECTION_FACTOR).abs() < 0.01);
    }

    #[test]
    fn test_same_point_costs_only_buffer() {
        let estimator = GeoDistanceEstimator::default();
        let p = madurai();

        let local = estimator.estimate(&p, &p, TravelClass::Local);
        let outstation = estimator.estimate(&p, &p, TravelClass::Outstation);

        assert_eq!(local.minutes, crate::defaults::LOCAL_BUFFER_MINUTES);
        assert_eq!(outstation.minutes, crate::defaults::OUTSTATION_BUFFER_MINUTES);
    }

    #[test]
    fn test_outstation_faster_per_km() {
        let settings = EstimatorSettings {
            local_buffer_minutes: 0,
            outstation_buffer_minutes: 0,
            ..EstimatorSettings::default()
        };
        let estimator = GeoDistanceEstimator::new(settings);

        let local = estimator.estimate(&madurai(), &rameswaram(), TravelClass::Local);
        let outstation = estimator.estimate(&madurai(), &rameswaram(), TravelClass::Outstation);

        assert_eq!(local.distance_km, outstation.distance_km);
        assert!(outstation.minutes < local.minutes);
    }

    #[test]
    fn test_minutes_round_up() {
        // 1.3 * 111.19 km per degree of latitude at 40 km/h is a fraction of a minute over
        let settings = EstimatorSettings {
            local_buffer_minutes: 0,
            ..EstimatorSettings::default()
        };
        let estimator = GeoDistanceEstimator::new(settings);
        let from = Coordinates { lat: 10.0, lng: 78.0 };
        let to = Coordinates { lat: 10.01, lng: 78.0 };

        let estimate = estimator.estimate(&from, &to, TravelClass::Local);
        let exact = estimate.distance_km / 40.0 * 60.0;

        assert_eq!(estimate.minutes, exact.ceil() as i64);
        assert!(estimate.minutes >= 1);
    }

    #[test]
    fn test_round_km() {
        assert_eq!(round_km(12.3456), 12.35);
        assert_eq!(round_km(0.0), 0.0);
    }
}
