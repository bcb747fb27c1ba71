use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

use super::rfc3339;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Immutable once stored. Unique on `(reviewer, task)`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub reviewer: ObjectId,
    pub provider: ObjectId,
    pub task: ObjectId,
    pub rating: i32, // 1-5
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub sentiment: Sentiment,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateReviewDto {
    pub task_id: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Comment is too long"))]
    pub comment: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewResponse {
    pub id: String,
    pub reviewer: String,
    pub provider: String,
    pub task: String,
    pub rating: i32,
    pub comment: String,
    pub sentiment: Sentiment,
    pub created_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        ReviewResponse {
            id: review.id.map(|id| id.to_hex()).unwrap_or_default(),
            reviewer: review.reviewer.to_hex(),
            provider: review.provider.to_hex(),
            task: review.task.to_hex(),
            rating: review.rating,
            comment: review.comment,
            sentiment: review.sentiment,
            created_at: rfc3339(review.created_at),
        }
    }
}
