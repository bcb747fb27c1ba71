use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    /// Token lifetime in seconds (7 days).
    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(604800)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn mongodb_database() -> String {
        Self::figment()
            .extract_inner("mongodb_database")
            .unwrap_or_else(|_| "locallink".to_string())
    }

    /// "mongodb" or "memory"
    pub fn storage_backend() -> String {
        Self::figment()
            .extract_inner("storage_backend")
            .unwrap_or_else(|_| "mongodb".to_string())
    }

    pub fn hugging_face_api_key() -> Option<String> {
        Self::figment()
            .extract_inner("hugging_face_api_key")
            .ok()
            .or_else(|| env::var("HUGGING_FACE_API_KEY").ok())
            .filter(|key: &String| !key.trim().is_empty())
    }

    pub fn sentiment_model() -> String {
        Self::figment()
            .extract_inner("sentiment_model")
            .unwrap_or_else(|_| "nlptown/bert-base-multilingual-uncased-sentiment".to_string())
    }

    pub fn sentiment_timeout_ms() -> u64 {
        Self::figment()
            .extract_inner("sentiment_timeout_ms")
            .unwrap_or(3000)
    }

    pub fn provider_radius_km() -> f64 {
        Self::figment()
            .extract_inner("provider_radius_km")
            .unwrap_or(crate::services::geo::DEFAULT_SEARCH_RADIUS_KM)
    }

    pub fn farmer_radius_km() -> f64 {
        Self::figment()
            .extract_inner("farmer_radius_km")
            .unwrap_or(crate::services::geo::FARMER_SEARCH_RADIUS_KM)
    }

    /// Weight of proximity in the provider ranking. 0 keeps distance a pure filter.
    pub fn distance_weight() -> f64 {
        Self::figment()
            .extract_inner("distance_weight")
            .unwrap_or(0.0)
    }

    pub fn result_limit() -> usize {
        Self::figment()
            .extract_inner("result_limit")
            .unwrap_or(20)
    }

    pub fn candidate_limit() -> i64 {
        Self::figment()
            .extract_inner("candidate_limit")
            .unwrap_or(500)
    }

    pub fn bcrypt_cost() -> u32 {
        Self::figment()
            .extract_inner("bcrypt_cost")
            .unwrap_or(bcrypt::DEFAULT_COST)
    }

    pub fn error_repeat_window_ms() -> u64 {
        Self::figment()
            .extract_inner("error_repeat_window_ms")
            .unwrap_or(1500)
    }
}
