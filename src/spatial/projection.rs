//! Distances used to size grid cells.
//!
//! The default metric projects both points into the UTM zone of the first
//! point and measures the planar distance, which keeps cells close to the
//! requested edge length inside one zone. Haversine is available for boxes
//! that straddle zones.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_E2: f64 = 0.006_694_379_990_14;
const UTM_K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Utm,
    Haversine,
}

impl DistanceMetric {
    /// Distance in kilometres between two `(lon, lat)` points.
    pub fn distance_km(self, lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
        match self {
            DistanceMetric::Utm => utm_distance_km(lon1, lat1, lon2, lat2),
            DistanceMetric::Haversine => {
                Haversine::distance(Point::new(lon1, lat1), Point::new(lon2, lat2)) / 1000.0
            }
        }
    }
}

/// A UTM zone: number 1..=60 plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    pub fn for_point(lon: f64, lat: f64) -> Self {
        let number = (((lon + 180.0) / 6.0).floor() as i64).rem_euclid(60) + 1;
        Self {
            number: number as u8,
            north: lat >= 0.0,
        }
    }

    fn central_meridian(&self) -> f64 {
        (self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }
}

/// Transverse Mercator forward projection of a WGS84 point into `zone`.
/// Returns `(easting, northing)` in metres.
pub fn to_utm(lon: f64, lat: f64, zone: UtmZone) -> (f64, f64) {
    let e2 = WGS84_E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let phi = lat.to_radians();
    let lambda = (lon - zone.central_meridian()).to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * lambda;

    let m = WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

    let easting = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;

    let mut northing = UTM_K0
        * (m + n
            * phi.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if !zone.north {
        northing += FALSE_NORTHING_SOUTH;
    }

    (easting, northing)
}

/// Planar distance in km after projecting both points into the zone of the first.
pub fn utm_distance_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let zone = UtmZone::for_point(lon1, lat1);
    let (x1, y1) = to_utm(lon1, lat1, zone);
    let (x2, y2) = to_utm(lon2, lat2, zone);
    ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt() / 1000.0
}
