use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::error::MarketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GeoType {
    #[default]
    Point,
}

/// GeoJSON point as stored in MongoDB. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type", default)]
    pub geo_type: GeoType,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        GeoPoint {
            geo_type: GeoType::Point,
            coordinates: [longitude, latitude],
        }
    }

    /// The `[0, 0]` placeholder written when a user registers without a location.
    pub const fn unset() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Builds a point after checking both coordinates are finite and in range.
    pub fn validated(longitude: f64, latitude: f64) -> Result<Self, MarketError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(MarketError::Validation(
                "Longitude must be between -180 and 180".to_string(),
            ));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(MarketError::Validation(
                "Latitude must be between -90 and 90".to_string(),
            ));
        }
        Ok(Self::new(longitude, latitude))
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn is_unset(&self) -> bool {
        self.coordinates == [0.0, 0.0]
    }

    /// `None` for the unset placeholder, so callers never measure from null island.
    pub fn known(&self) -> Option<&GeoPoint> {
        if self.is_unset() { None } else { Some(self) }
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::unset()
    }
}

/// Latitude/longitude pair as sent and received by API clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn to_point(self) -> Result<GeoPoint, MarketError> {
        GeoPoint::validated(self.longitude, self.latitude)
    }
}

impl From<GeoPoint> for Coordinates {
    fn from(point: GeoPoint) -> Self {
        Coordinates {
            latitude: point.latitude(),
            longitude: point.longitude(),
        }
    }
}
