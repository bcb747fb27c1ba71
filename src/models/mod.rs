pub mod geo;
pub mod user;
pub mod task;
pub mod review;

pub use geo::*;
pub use user::*;
pub use task::*;
pub use review::*;

use mongodb::bson::DateTime;

/// Converts a stored BSON timestamp into a chrono UTC timestamp.
pub fn to_utc(dt: DateTime) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

pub fn from_utc(dt: chrono::DateTime<chrono::Utc>) -> DateTime {
    DateTime::from_millis(dt.timestamp_millis())
}

pub fn rfc3339(dt: DateTime) -> String {
    to_utc(dt).to_rfc3339()
}
