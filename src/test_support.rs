//! Fixtures shared by the unit and route tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mongodb::bson::{oid::ObjectId, DateTime};
use rocket::local::asynchronous::Client;
use rocket::{Build, Rocket};

use crate::db::{manage_services, ServiceSettings};
use crate::models::{
    canonical_tags, Coordinates, CreateTaskDto, GeoPoint, ProfileUpdate, Review, Role, Sentiment,
    Task, TaskPriority, TaskQuality, TaskStatus, TaskType, TaskUnit, User,
};
use crate::services::sentiment::testing::KeywordClassifier;
use crate::store::{MemoryStore, ProviderFilter, RatingSummary, StoreError, StoreResult, UserStore};
use crate::utils::ErrorThrottle;

pub fn user(name: &str, role: Role, skills: &[&str], lat: f64, lng: f64) -> User {
    let skills: Vec<String> = skills.iter().map(|s| s.to_string()).collect();
    User {
        id: None,
        email: format!("{}-{}@example.com", name.to_lowercase(), ObjectId::new().to_hex()),
        password_hash: String::new(),
        name: name.to_string(),
        role,
        skills: canonical_tags(&skills),
        location: GeoPoint::new(lng, lat),
        rating: 0.0,
        total_reviews: 0,
        completed_tasks: 0,
        response_rate: 0.0,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    }
}

pub fn provider_user(name: &str, skills: &[&str], lat: f64, lng: f64) -> User {
    user(name, Role::Provider, skills, lat, lng)
}

pub fn client_user(email: &str) -> User {
    User {
        email: email.to_string(),
        ..user("Client", Role::Client, &[], 0.0, 0.0)
    }
}

pub fn task_dto(category: &str, lat: f64, lng: f64) -> CreateTaskDto {
    CreateTaskDto {
        title: "Fix sink".to_string(),
        description: "Kitchen sink leaks".to_string(),
        quantity: 2.0,
        price_per_unit: 300.0,
        unit: TaskUnit::Hour,
        location: Coordinates { latitude: lat, longitude: lng },
        category: category.to_string(),
        subcategory: "General".to_string(),
        start_date: None,
        end_date: None,
        quality: TaskQuality::Standard,
        priority: TaskPriority::Medium,
        task_type: TaskType::Service,
        skills: Vec::new(),
        attachments: Vec::new(),
    }
}

pub fn open_task_at(client: ObjectId, category: &str, lat: f64, lng: f64) -> Task {
    Task {
        id: None,
        title: "Fix sink".to_string(),
        description: "Kitchen sink leaks".to_string(),
        status: TaskStatus::Pending,
        quantity: 2.0,
        price_per_unit: 300.0,
        unit: TaskUnit::Hour,
        location: GeoPoint::new(lng, lat),
        category: category.to_string(),
        subcategory: "GENERAL".to_string(),
        start_date: DateTime::now(),
        end_date: None,
        quality: TaskQuality::Standard,
        priority: TaskPriority::Medium,
        task_type: TaskType::Service,
        skills: Vec::new(),
        attachments: Vec::new(),
        client,
        provider: None,
        rejected_by_provider: false,
        rating: None,
        feedback: None,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    }
}

pub fn open_task(client: ObjectId, category: &str) -> Task {
    open_task_at(client, category, 12.9, 77.6)
}

pub fn task_in(status: TaskStatus, client: ObjectId, provider: Option<ObjectId>) -> Task {
    Task {
        id: Some(ObjectId::new()),
        status,
        provider,
        ..open_task(client, "PLUMBING")
    }
}

pub fn completed_task(client: ObjectId, provider: ObjectId) -> Task {
    Task {
        status: TaskStatus::Completed,
        provider: Some(provider),
        ..open_task(client, "PLUMBING")
    }
}

pub fn review(reviewer: ObjectId, provider: ObjectId, task: ObjectId, rating: i32) -> Review {
    Review {
        id: None,
        reviewer,
        provider,
        task,
        rating,
        comment: String::new(),
        sentiment: Sentiment::Neutral,
        created_at: DateTime::now(),
    }
}

fn api_rocket() -> Rocket<Build> {
    let settings = ServiceSettings {
        bcrypt_cost: 4, // bcrypt::MIN_COST (private in the bcrypt crate)
        ..ServiceSettings::from_config()
    };
    let rocket = manage_services(
        rocket::build(),
        Arc::new(MemoryStore::default()),
        Arc::new(KeywordClassifier),
        settings,
    );
    crate::mount_api(rocket)
}

/// The full API on an empty in-memory store, without the error throttle.
pub async fn api_client() -> Client {
    Client::tracked(api_rocket()).await.expect("valid rocket instance")
}

/// Same as `api_client`, with repeated errors throttled as in production.
pub async fn throttled_api_client(window: Duration) -> Client {
    Client::tracked(api_rocket().manage(ErrorThrottle::new(window)))
        .await
        .expect("valid rocket instance")
}

/// User store whose counter writes fail while `failing` is set.
pub struct FlakyUsers {
    pub inner: Arc<MemoryStore>,
    pub failing: AtomicBool,
}

impl FlakyUsers {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        FlakyUsers {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Serialization("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlakyUsers {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        self.inner.insert_user(user).await
    }

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn update_profile(&self, id: ObjectId, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        self.inner.update_profile(id, update).await
    }

    async fn find_providers(&self, filter: &ProviderFilter) -> StoreResult<Vec<User>> {
        self.inner.find_providers(filter).await
    }

    async fn set_rating(&self, id: ObjectId, summary: RatingSummary) -> StoreResult<()> {
        self.check()?;
        self.inner.set_rating(id, summary).await
    }

    async fn increment_completed_tasks(&self, id: ObjectId) -> StoreResult<()> {
        self.check()?;
        self.inner.increment_completed_tasks(id).await
    }
}
