use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

use super::{rfc3339, Coordinates, GeoPoint};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "OPEN")]
    Pending,
    #[serde(alias = "ASSIGNED")]
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Accepted => "ACCEPTED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" | "OPEN" => Some(TaskStatus::Pending),
            "ACCEPTED" | "ASSIGNED" => Some(TaskStatus::Accepted),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "COMPLETED" => Some(TaskStatus::Completed),
            "CANCELLED" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskUnit {
    #[default]
    Hour,
    Day,
    Piece,
    Kg,
    Ton,
    Bushel,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskQuality {
    #[default]
    Standard,
    Premium,
    Custom,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Service,
    Product,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub unit: TaskUnit,
    pub location: GeoPoint,
    pub category: String,
    pub subcategory: String,
    pub start_date: DateTime,
    pub end_date: Option<DateTime>,
    pub quality: TaskQuality,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub client: ObjectId,
    /// Stays `null` until a provider accepts the task.
    pub provider: Option<ObjectId>,
    #[serde(default)]
    pub rejected_by_provider: bool,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Task {
    pub fn is_party(&self, user_id: ObjectId) -> bool {
        self.client == user_id || self.provider == Some(user_id)
    }

    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Pending && self.provider.is_none()
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateTaskDto {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 0.0, message = "Quantity must be a positive number"))]
    pub quantity: f64,
    #[validate(range(min = 0.0, message = "Price per unit must be a positive number"))]
    pub price_per_unit: f64,
    #[serde(default)]
    pub unit: TaskUnit,
    pub location: Coordinates,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "Subcategory is required"))]
    pub subcategory: String,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub quality: TaskQuality,
    #[serde(default)]
    pub priority: TaskPriority,
    pub task_type: TaskType,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// The only two keys the task update path accepts.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    /// `Some(None)` means the request explicitly sent `"provider": null`.
    pub provider: Option<Option<ObjectId>>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TaskResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub total_price: f64,
    pub unit: TaskUnit,
    pub location: Coordinates,
    pub category: String,
    pub subcategory: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub quality: TaskQuality,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    pub skills: Vec<String>,
    pub attachments: Vec<String>,
    pub client: String,
    pub provider: Option<String>,
    pub rejected_by_provider: bool,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        TaskResponse {
            id: task.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: task.title,
            description: task.description,
            status: task.status,
            quantity: task.quantity,
            price_per_unit: task.price_per_unit,
            total_price: task.quantity * task.price_per_unit,
            unit: task.unit,
            location: Coordinates::from(task.location),
            category: task.category,
            subcategory: task.subcategory,
            start_date: rfc3339(task.start_date),
            end_date: task.end_date.map(rfc3339),
            quality: task.quality,
            priority: task.priority,
            task_type: task.task_type,
            skills: task.skills,
            attachments: task.attachments,
            client: task.client.to_hex(),
            provider: task.provider.map(|id| id.to_hex()),
            rejected_by_provider: task.rejected_by_provider,
            rating: task.rating,
            feedback: task.feedback,
            created_at: rfc3339(task.created_at),
            updated_at: rfc3339(task.updated_at),
        }
    }
}

/// A task in a provider's feed, with its display distance.
#[derive(Debug, Serialize, JsonSchema)]
pub struct TaskListing {
    #[serde(flatten)]
    pub task: TaskResponse,
    pub distance_km: Option<f64>,
}
