//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (longitude/latitude)
//! and Web Mercator (EPSG:3857) metres used by the headless scene container.

use std::f64::consts::PI;
use std::fmt;

use thiserror::Error;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -MAX_LAT;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// WGS84 semi-major axis in metres, the Web Mercator sphere radius.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Errors for out-of-range geographic input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordError {
    #[error("Invalid latitude: {0} (must be within ±85.05112878)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be within ±180)")]
    InvalidLongitude(f64),
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Checks that the position can be projected.
    pub fn validate(&self) -> Result<(), CoordError> {
        if !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            return Err(CoordError::InvalidLatitude(self.lat));
        }
        if !(MIN_LON..=MAX_LON).contains(&self.lng) {
            return Err(CoordError::InvalidLongitude(self.lng));
        }
        Ok(())
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<(f64, f64)> for LngLat {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl fmt::Display for LngLat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6}, {:.6}]", self.lng, self.lat)
    }
}

/// Converts a geographic position to Web Mercator metres `[x, y]`.
#[inline]
pub fn to_mercator(position: LngLat) -> Result<[f64; 2], CoordError> {
    position.validate()?;
    Ok(project(position))
}

/// Like [`to_mercator`] but clamps latitude to the projectable range and
/// wraps longitude into `[-180, 180]`.
#[inline]
pub fn to_mercator_clamped(position: LngLat) -> [f64; 2] {
    let lng = (position.lng + 180.0).rem_euclid(360.0) - 180.0;
    let lat = position.lat.clamp(MIN_LAT, MAX_LAT);
    project(LngLat::new(lng, lat))
}

/// Converts Web Mercator metres back to a geographic position.
#[inline]
pub fn from_mercator(xy: [f64; 2]) -> LngLat {
    let lng = xy[0] / EARTH_RADIUS_M * 180.0 / PI;
    let lat = (xy[1] / EARTH_RADIUS_M).sinh().atan() * 180.0 / PI;
    LngLat::new(lng, lat)
}

fn project(position: LngLat) -> [f64; 2] {
    let x = EARTH_RADIUS_M * position.lng.to_radians();
    let y = EARTH_RADIUS_M * position.lat.to_radians().tan().asinh();
    [x, y]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_zero() {
        let xy = to_mercator(LngLat::new(0.0, 0.0)).unwrap();
        assert!(xy[0].abs() < 1e-9);
        assert!(xy[1].abs() < 1e-9);
    }

    #[test]
    fn test_antimeridian_x() {
        let xy = to_mercator(LngLat::new(180.0, 0.0)).unwrap();
        assert!((xy[0] - PI * EARTH_RADIUS_M).abs() < 1e-6);
    }

    #[test]
    fn test_new_york_city() {
        // New York City: 40.7128°N, 74.0060°W
        let xy = to_mercator(LngLat::new(-74.0060, 40.7128)).unwrap();
        assert!((xy[0] - (-8_238_310.2)).abs() < 1.0, "x was {}", xy[0]);
        assert!((xy[1] - 4_970_071.6).abs() < 1.0, "y was {}", xy[1]);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_mercator(LngLat::new(0.0, 90.0));
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = to_mercator(LngLat::new(181.0, 0.0));
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_clamped_handles_poles_and_wrapping() {
        let pole = to_mercator_clamped(LngLat::new(0.0, 90.0));
        let edge = to_mercator(LngLat::new(0.0, MAX_LAT)).unwrap();
        assert!((pole[1] - edge[1]).abs() < 1e-6);

        let wrapped = to_mercator_clamped(LngLat::new(190.0, 0.0));
        let expected = to_mercator(LngLat::new(-170.0, 0.0)).unwrap();
        assert!((wrapped[0] - expected[0]).abs() < 1e-6);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let original = LngLat::new(10.0, 20.0);
        let back = from_mercator(to_mercator(original).unwrap());
        assert!((back.lng - original.lng).abs() < 1e-9);
        assert!((back.lat - original.lat).abs() < 1e-9);
    }

    #[test]
    fn test_from_array() {
        let position: LngLat = [10.0, 20.0].into();
        assert_eq!(position, LngLat::new(10.0, 20.0));
    }
}
