pub mod auth;
pub mod provider;
pub mod review;
pub mod task;
pub mod user;

use serde::Serialize;

use crate::models::{Coordinates, GeoPoint};
use crate::utils::ApiError;

/// The geo filter is only active when both `lat` and `lng` are given.
pub fn query_point(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, ApiError> {
    match (lat, lng) {
        (Some(latitude), Some(longitude)) => Ok(Some(
            Coordinates { latitude, longitude }.to_point()?,
        )),
        (None, None) => Ok(None),
        _ => Err(ApiError::bad_request("lat and lng must be supplied together")),
    }
}

pub fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::internal_error(format!("Serialization error: {}", e)))
}
