//! Customer coordinates.

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`GeoPoint`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoPointError {
    /// Latitude or longitude is NaN or infinite.
    #[error("coordinates must be finite numbers")]
    NotFinite,
    /// Latitude outside `[-90, 90]`.
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    /// Longitude outside `[-180, 180]`.
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A WGS84 latitude/longitude pair.
///
/// ## Examples
///
/// ```
/// use pickup_core::GeoPoint;
///
/// assert!(GeoPoint::new(12.97, 77.59).is_ok());
/// assert!(GeoPoint::new(91.0, 0.0).is_err());
/// assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

/// Unchecked wire form; deserialization goes through [`GeoPoint::new`].
#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = GeoPointError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

impl GeoPoint {
    /// Validate and build a coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns an error if either component is not finite or out of range.
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoPointError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(GeoPointError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoPointError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(GeoPointError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }
}
