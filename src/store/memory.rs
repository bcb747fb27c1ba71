use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use tokio::sync::RwLock;

use super::{
    Proximity, ProviderFilter, RatingSummary, ReviewStore, StoreError, StoreResult, TaskFilter,
    TaskStore, UserStore,
};
use crate::models::{ProfileUpdate, Review, Task, TaskStatus, User};
use crate::services::geo::within_radius;

/// In-process store. Each conditional write runs under the collection's write
/// lock, which gives it the same all-or-nothing behaviour as the MongoDB
/// `find_one_and_update` filters.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<ObjectId, User>>,
    tasks: RwLock<HashMap<ObjectId, Task>>,
    reviews: RwLock<Vec<Review>>,
}

/// Applies the optional circle and orders by distance, like `$near` does.
fn nearest_first<T: crate::services::geo::Located>(items: Vec<T>, near: Option<&Proximity>) -> Vec<T> {
    match near {
        None => items,
        Some(p) => {
            let mut kept = within_radius(items, &p.center, p.radius_km);
            kept.sort_by(|a, b| a.1.total_cmp(&b.1));
            kept.into_iter().map(|(item, _)| item).collect()
        }
    }
}

fn newest_first(a: (DateTime, Option<ObjectId>), b: (DateTime, Option<ObjectId>)) -> std::cmp::Ordering {
    b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1))
}

fn truncate<T>(mut items: Vec<T>, limit: i64) -> Vec<T> {
    if limit > 0 {
        items.truncate(limit as usize);
    }
    items
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, mut user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }
        let id = user.id.unwrap_or_else(ObjectId::new);
        user.id = Some(id);
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.values().find(|u| u.email == email).cloned())
    }

    async fn update_profile(&self, id: ObjectId, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;

        if let Some(ref email) = update.email {
            if users.values().any(|u| u.email == *email && u.id != Some(id)) {
                return Err(StoreError::Duplicate("email".to_string()));
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(ref name) = update.name {
            user.name = name.clone();
        }
        if let Some(ref email) = update.email {
            user.email = email.clone();
        }
        if let Some(ref skills) = update.skills {
            user.skills = skills.clone();
        }
        if let Some(location) = update.location {
            user.location = location;
        }
        user.updated_at = DateTime::now();

        Ok(Some(user.clone()))
    }

    async fn find_providers(&self, filter: &ProviderFilter) -> StoreResult<Vec<User>> {
        let mut providers: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.is_provider() && u.skills.contains(&filter.category))
            .cloned()
            .collect();
        providers.sort_by_key(|u| u.id);

        Ok(nearest_first(providers, filter.near.as_ref()))
    }

    async fn set_rating(&self, id: ObjectId, summary: RatingSummary) -> StoreResult<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.rating = summary.average;
            user.total_reviews = summary.count;
            user.updated_at = DateTime::now();
        }
        Ok(())
    }

    async fn increment_completed_tasks(&self, id: ObjectId) -> StoreResult<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.completed_tasks += 1;
            user.updated_at = DateTime::now();
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, mut task: Task) -> StoreResult<Task> {
        let id = task.id.unwrap_or_else(ObjectId::new);
        task.id = Some(id);
        self.tasks.write().await.insert(id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: ObjectId) -> StoreResult<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn find_task_for_party(&self, id: ObjectId, user_id: ObjectId) -> StoreResult<Option<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .get(&id)
            .filter(|t| t.is_party(user_id))
            .cloned())
    }

    async fn list_client_tasks(&self, client: ObjectId) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.client == client)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        Ok(tasks)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == filter.status && filter.category.matches(&t.category))
            .cloned()
            .collect();

        let mut tasks = nearest_first(tasks, filter.near.as_ref());
        tasks.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        Ok(truncate(tasks, filter.limit))
    }

    async fn accept_task(&self, id: ObjectId, provider: ObjectId) -> StoreResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&id) {
            Some(task) if task.is_open() => {
                task.provider = Some(provider);
                task.status = TaskStatus::Accepted;
                task.updated_at = DateTime::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn transition_task(
        &self,
        id: ObjectId,
        actor: ObjectId,
        expected: TaskStatus,
        next: TaskStatus,
        rejected_by_provider: bool,
    ) -> StoreResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&id) {
            Some(task) if task.status == expected && task.is_party(actor) => {
                task.status = next;
                task.rejected_by_provider = rejected_by_provider;
                task.updated_at = DateTime::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_open_task(&self, id: ObjectId) -> StoreResult<bool> {
        let mut tasks = self.tasks.write().await;
        if tasks.get(&id).is_some_and(Task::is_open) {
            tasks.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn record_feedback(&self, id: ObjectId, rating: i32, feedback: &str) -> StoreResult<()> {
        if let Some(task) = self.tasks.write().await.get_mut(&id) {
            task.rating = Some(rating);
            task.feedback = Some(feedback.to_string());
            task.updated_at = DateTime::now();
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_review(&self, mut review: Review) -> StoreResult<Review> {
        let mut reviews = self.reviews.write().await;
        if reviews
            .iter()
            .any(|r| r.reviewer == review.reviewer && r.task == review.task)
        {
            return Err(StoreError::Duplicate("review".to_string()));
        }
        review.id = Some(review.id.unwrap_or_else(ObjectId::new));
        reviews.push(review.clone());
        Ok(review)
    }

    async fn list_provider_reviews(&self, provider: ObjectId) -> StoreResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .reviews
            .read()
            .await
            .iter()
            .filter(|r| r.provider == provider)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        Ok(reviews)
    }

    async fn list_reviews_for(&self, providers: &[ObjectId]) -> StoreResult<Vec<Review>> {
        Ok(self
            .reviews
            .read()
            .await
            .iter()
            .filter(|r| providers.contains(&r.provider))
            .cloned()
            .collect())
    }

    async fn rating_summary(&self, provider: ObjectId) -> StoreResult<RatingSummary> {
        let reviews = self.reviews.read().await;
        let ratings: Vec<i32> = reviews
            .iter()
            .filter(|r| r.provider == provider)
            .map(|r| r.rating)
            .collect();

        if ratings.is_empty() {
            return Ok(RatingSummary::default());
        }

        let total: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
        Ok(RatingSummary {
            average: total as f64 / ratings.len() as f64,
            count: ratings.len() as i64,
        })
    }
}
