use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use super::to_json;
use crate::guards::AuthGuard;
use crate::models::{CreateReviewDto, ReviewResponse};
use crate::services::ReviewService;
use crate::utils::validation::parse_object_id;
use crate::utils::{ApiResponse, ApiError};

#[openapi(tag = "Review")]
#[post("/reviews", data = "<dto>")]
pub async fn create_review(
    reviews: &State<ReviewService>,
    auth: AuthGuard,
    dto: Json<CreateReviewDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let review = reviews.create(auth.actor(), dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Review submitted successfully".to_string(),
        to_json(ReviewResponse::from(review))?,
    )))
}

#[openapi(tag = "Review")]
#[get("/reviews/<provider_id>")]
pub async fn get_provider_reviews(
    reviews: &State<ReviewService>,
    _auth: AuthGuard,
    provider_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let provider = parse_object_id(&provider_id, "provider")?;

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
