use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::models::{LoginDto, RegisterDto, User, UserResponse};
use crate::services::{AccountService, JwtService};
use crate::utils::{ApiResponse, ApiError};

fn session(user: User) -> Result<serde_json::Value, ApiError> {
    let id = user
        .id
        .ok_or_else(|| ApiError::internal_error("User has no identifier"))?;

    let token = JwtService::generate_token(&id, user.role).map_err(|e| {
        error!("Token generation failed for {}: {}", id, e);
        ApiError::internal_error("Failed to generate token")
    })?;

    Ok(serde_json::json!({
        "token": token,
        "user": UserResponse::from(user),
    }))
}

#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<dto>")]
pub async fn register(
    accounts: &State<AccountService>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = accounts.register(dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Registration successful".to_string(),
        session(user)?,
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    accounts: &State<AccountService>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = accounts.login(dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Login successful".to_string(),
        session(user)?,
    )))
}
