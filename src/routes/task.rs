use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use super::{query_point, to_json};
use crate::config::Config;
use crate::guards::AuthGuard;
use crate::models::{CreateTaskDto, Role, TaskListing, TaskResponse, TaskStatus};
use crate::services::geo::round_for_display;
use crate::services::lifecycle::parse_update;
use crate::services::{AccountService, MatchingService, TaskService};
use crate::utils::validation::parse_object_id;
use crate::utils::{ApiResponse, ApiError};

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct TaskFeedQuery {
    pub category: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    /// Defaults to PENDING.
    pub status: Option<String>,
}

#[openapi(tag = "Task")]
#[post("/tasks", data = "<dto>")]
pub async fn create_task(
    tasks: &State<TaskService>,
    auth: AuthGuard,
    dto: Json<CreateTaskDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let task = tasks.create(auth.actor(), dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Task created successfully".to_string(),
        to_json(TaskResponse::from(task))?,
    )))
}

#[openapi(tag = "Task")]
#[get("/tasks/provider?<query..>")]
pub async fn provider_tasks(
    matching: &State<MatchingService>,
    accounts: &State<AccountService>,
    auth: AuthGuard,
    query: TaskFeedQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != Role::Provider {
        return Err(ApiError::forbidden("Only providers can browse tasks"));
    }

    let status = match query.status.as_deref() {
        Some(raw) => TaskStatus::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid status"))?,
        None => TaskStatus::Pending,
    };
    let location = query_point(query.lat, query.lng)?;
    let radius_km = query.radius_km.unwrap_or_else(Config::provider_radius_km);

    let provider = accounts.profile(auth.user_id).await?;

    let listings: Vec<TaskListing> = matching
        .find_open_tasks(&provider, query.category.as_deref(), location, radius_km, status)
        .await?
        .into_iter()
        .map(|m| TaskListing {
            task: TaskResponse::from(m.task),
            distance_km: m.distance_km.map(round_for_display),
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "count": listings.len(),
        "tasks": to_json(listings)?,
    }))))
}

#[openapi(tag = "Task")]
#[get("/tasks/client")]
pub async fn client_tasks(
    tasks: &State<TaskService>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let tasks: Vec<TaskResponse> = tasks
        .client_tasks(auth.actor())
        .await?
        .into_iter()
        .map(TaskResponse::from)
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "count": tasks.len(),
        "tasks": to_json(tasks)?,
    }))))
}

/// Only `status` and `provider` may be sent.
#[openapi(tag = "Task")]
#[patch("/tasks/<task_id>", data = "<body>")]
pub async fn update_task(
    tasks: &State<TaskService>,
    auth: AuthGuard,
    task_id: String,
    body: Json<serde_json::Value>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let task_id = parse_object_id(&task_id, "task")?;
    let update = parse_update(&body)?;

    let task = tasks.update(auth.actor(), task_id, update).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Task updated successfully".to_string(),
        to_json(TaskResponse::from(task))?,
    )))
}

#[openapi(tag = "Task")]
#[post("/tasks/<task_id>/accept")]
pub async fn accept_task(
    tasks: &State<TaskService>,
    auth: AuthGuard,
    task_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let task_id = parse_object_id(&task_id, "task")?;
    let task = tasks.accept(auth.actor(), task_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Task accepted successfully".to_string(),
        to_json(TaskResponse::from(task))?,
    )))
}

/// Provider rejection. Removes the task while it is still pending and unassigned.
#[openapi(tag = "Task")]
#[delete("/tasks/<task_id>")]
pub async fn reject_task(
    tasks: &State<TaskService>,
    auth: AuthGuard,
    task_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let id = parse_object_id(&task_id, "task")?;
    tasks.reject(auth.actor(), id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Task rejected successfully".to_string(),
        serde_json::json!({ "task_id": task_id }),
    )))
}
