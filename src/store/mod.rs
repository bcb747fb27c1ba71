//! Storage ports for users, tasks and reviews.
//!
//! Services only talk to these traits. `mongo` is the production adapter and
//! `memory` backs local runs without a database as well as the test-suite.
//! Every write that guards an invariant (accepting a task, moving it between
//! states, rejecting it, reviewing it) is a single conditional operation in
//! the adapter, never a read followed by a write.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::models::{GeoPoint, ProfileUpdate, Review, Task, TaskStatus, User};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub const USERS: &str = "users";
pub const TASKS: &str = "tasks";
pub const REVIEWS: &str = "reviews";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A circle on the map. Radius is in kilometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub center: GeoPoint,
    pub radius_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFilter {
    /// Canonical (uppercase) category that must appear in the provider's skills.
    pub category: String,
    pub near: Option<Proximity>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CategoryFilter {
    Any,
    Exact(String),
    OneOf(Vec<String>),
}

impl CategoryFilter {
    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::Any => true,
            CategoryFilter::Exact(wanted) => wanted == category,
            CategoryFilter::OneOf(set) => set.iter().any(|c| c == category),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    pub status: TaskStatus,
    pub category: CategoryFilter,
    pub near: Option<Proximity>,
    /// Applied after the newest-first ordering. 0 means no cap.
    pub limit: i64,
}

/// Mean rating over every review a provider has received.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the e-mail is taken.
    async fn insert_user(&self, user: User) -> StoreResult<User>;

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_profile(&self, id: ObjectId, update: &ProfileUpdate) -> StoreResult<Option<User>>;

    /// Every provider carrying the category, restricted to the circle when one
    /// is given. Ranking needs the whole set, so there is no cap.
    async fn find_providers(&self, filter: &ProviderFilter) -> StoreResult<Vec<User>>;

    async fn set_rating(&self, id: ObjectId, summary: RatingSummary) -> StoreResult<()>;

    async fn increment_completed_tasks(&self, id: ObjectId) -> StoreResult<()>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> StoreResult<Task>;

    async fn find_task(&self, id: ObjectId) -> StoreResult<Option<Task>>;

    /// The task, only if `user_id` is its client or assigned provider.
    async fn find_task_for_party(&self, id: ObjectId, user_id: ObjectId) -> StoreResult<Option<Task>>;

    /// Newest first.
    async fn list_client_tasks(&self, client: ObjectId) -> StoreResult<Vec<Task>>;

    /// Newest first, then capped at `filter.limit`.
    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>>;

    /// Assigns the provider only while the task is still PENDING and unassigned.
    async fn accept_task(&self, id: ObjectId, provider: ObjectId) -> StoreResult<Option<Task>>;

    /// Moves the task to `next` only if it is still in `expected` and `actor` is a party.
    async fn transition_task(
        &self,
        id: ObjectId,
        actor: ObjectId,
        expected: TaskStatus,
        next: TaskStatus,
        rejected_by_provider: bool,
    ) -> StoreResult<Option<Task>>;

    /// Hard delete, only while PENDING and unassigned. Returns whether a record went away.
    async fn delete_open_task(&self, id: ObjectId) -> StoreResult<bool>;

    async fn record_feedback(&self, id: ObjectId, rating: i32, feedback: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the reviewer already reviewed the task.
    async fn insert_review(&self, review: Review) -> StoreResult<Review>;

    /// Newest first.
    async fn list_provider_reviews(&self, provider: ObjectId) -> StoreResult<Vec<Review>>;

    async fn list_reviews_for(&self, providers: &[ObjectId]) -> StoreResult<Vec<Review>>;

    async fn rating_summary(&self, provider: ObjectId) -> StoreResult<RatingSummary>;
}
