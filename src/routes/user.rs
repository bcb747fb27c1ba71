use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use super::{query_point, to_json};
use crate::config::Config;
use crate::guards::AuthGuard;
use crate::models::{RankedProviderResponse, ReviewResponse, UserResponse};
use crate::services::geo::round_for_display;
use crate::services::{AccountService, MatchingService, ReviewService};
use crate::utils::validation::parse_object_id;
use crate::utils::{ApiResponse, ApiError};

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct ProviderSearchQuery {
    pub category: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
}

async fn search(
    matching: &MatchingService,
    query: ProviderSearchQuery,
    default_radius_km: f64,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let location = query_point(query.lat, query.lng)?;
    let radius_km = query.radius_km.unwrap_or(default_radius_km);

    let providers: Vec<RankedProviderResponse> = matching
        .find_providers(query.category.as_deref(), location, radius_km)
        .await?
        .into_iter()
        .map(|ranked| RankedProviderResponse {
            provider: UserResponse::from(ranked.provider),
            priority_score: ranked.score,
            distance_km: ranked.distance_km.map(round_for_display),
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "count": providers.len(),
        "providers": to_json(providers)?,
    }))))
}

#[openapi(tag = "User")]
#[get("/users/profile")]
pub async fn get_profile(
    accounts: &State<AccountService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = accounts.profile(auth.user_id).await?;
    Ok(Json(ApiResponse::success(to_json(UserResponse::from(user))?)))
}

/// Accepts only `name`, `email`, `location` and `skills`.
#[openapi(tag = "User")]
#[patch("/users/profile", data = "<body>")]
pub async fn update_profile(
    accounts: &State<AccountService>,
    auth: AuthGuard,
    body: Json<serde_json::Value>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = accounts.update_profile(auth.user_id, &body).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Profile updated successfully".to_string(),
        to_json(UserResponse::from(user))?,
    )))
}

#[openapi(tag = "User")]
#[get("/users/providers?<query..>")]
pub async fn find_providers(
    matching: &State<MatchingService>,
    _auth: AuthGuard,
    query: ProviderSearchQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    search(matching, query, Config::provider_radius_km()).await
}

#[openapi(tag = "User")]
#[get("/users/workers?<query..>")]
pub async fn find_workers(
    matching: &State<MatchingService>,
    _auth: AuthGuard,
    query: ProviderSearchQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    search(matching, query, Config::provider_radius_km()).await
}

#[openapi(tag = "User")]
#[get("/users/farmers?<query..>")]
pub async fn find_farmers(
    matching: &State<MatchingService>,
    _auth: AuthGuard,
    query: ProviderSearchQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    search(matching, query, Config::farmer_radius_km()).await
}

#[openapi(tag = "User")]
#[get("/users/<user_id>/reviews")]
pub async fn get_user_reviews(
    reviews: &State<ReviewService>,
    _auth: AuthGuard,
    user_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let provider = parse_object_id(&user_id, "user")?;

    let reviews: Vec<ReviewResponse> = reviews
        .list_for_provider(provider)
        .await?
        .into_iter()
        .map(ReviewResponse::from)
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "count": reviews.len(),
        "reviews": to_json(reviews)?,
    }))))
}
