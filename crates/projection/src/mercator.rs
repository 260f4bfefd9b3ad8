//! Spherical Web Mercator (EPSG:3857).
//!
//! Coordinates are meters on a sphere whose half circumference is
//! [`MERCATOR_HALF_EXTENT`]. Latitudes beyond [`MAX_LATITUDE`] project to
//! infinity, so both directions clamp to it.

use std::f64::consts::PI;

/// Half the equatorial circumference of the Web Mercator sphere, in meters.
pub const MERCATOR_HALF_EXTENT: f64 = 20037508.34;

/// Largest latitude representable in Web Mercator (degrees).
pub const MAX_LATITUDE: f64 = 85.051129;

/// Convert Web Mercator meters to geographic degrees.
///
/// Returns `(lat, lng)`. The latitude is clamped to `±MAX_LATITUDE`.
#[inline]
pub fn mercator_to_lat_lng(x: f64, y: f64) -> (f64, f64) {
    let lng = x / MERCATOR_HALF_EXTENT * 180.0;
    // Inverse Gudermannian of the scaled y.
    let lat = (2.0 * (y / MERCATOR_HALF_EXTENT * PI).exp().atan() - PI / 2.0).to_degrees();
    (lat.clamp(-MAX_LATITUDE, MAX_LATITUDE), lng)
}

/// Convert geographic degrees to Web Mercator meters.
///
/// Returns `(x, y)`. The latitude is clamped to `±MAX_LATITUDE` before
/// projecting, which makes this the exact inverse of [`mercator_to_lat_lng`].
#[inline]
pub fn lat_lng_to_mercator(lat: f64, lng: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = lng * MERCATOR_HALF_EXTENT / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    (x, y * MERCATOR_HALF_EXTENT / 180.0)
}
