use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use super::to_json;
use crate::config::Config;
use crate::guards::AuthGuard;
use crate::models::{RankedProviderResponse, UserResponse};
use crate::services::MatchingService;
use crate::utils::{ApiResponse, ApiError};

/// Providers for a category ranked by priority score, without a geo filter.
#[openapi(tag = "Provider")]
#[get("/providers/prioritized?<category>")]
pub async fn prioritized_providers(
    matching: &State<MatchingService>,
    _auth: AuthGuard,
    category: Option<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let providers: Vec<RankedProviderResponse> = matching
        .find_providers(category.as_deref(), None, Config::provider_radius_km())
        .await?
        .into_iter()
        .map(|ranked| RankedProviderResponse {
            provider: UserResponse::from(ranked.provider),
            priority_score: ranked.score,
            distance_km: None,
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "count": providers.len(),
        "providers": to_json(providers)?,
    }))))
}
