use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use mongodb::bson::{oid::ObjectId, DateTime};
use tokio::sync::Mutex;

use super::sentiment::{classify_or_neutral, SentimentClassifier};
use crate::error::{MarketError, MarketResult};
use crate::models::{Actor, CreateReviewDto, Review, TaskStatus};
use crate::store::{ReviewStore, StoreError, TaskStore, UserStore};
use crate::utils::validation::{parse_object_id, validate_dto};

/// Stores reviews and keeps each provider's mean rating current.
pub struct ReviewService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    reviews: Arc<dyn ReviewStore>,
    classifier: Arc<dyn SentimentClassifier>,
    classify_timeout: Duration,
    // One lock per provider so concurrent reviews recompute the mean in turn.
    rating_locks: Mutex<HashMap<ObjectId, Arc<Mutex<()>>>>,
}

impl ReviewService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        reviews: Arc<dyn ReviewStore>,
        classifier: Arc<dyn SentimentClassifier>,
        classify_timeout: Duration,
    ) -> Self {
        ReviewService {
            tasks,
            users,
            reviews,
            classifier,
            classify_timeout,
            rating_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn rating_lock(&self, provider: ObjectId) -> Arc<Mutex<()>> {
        self.rating_locks
            .lock()
            .await
            .entry(provider)
            .or_default()
            .clone()
    }

    /// Drops the provider's lock once no other review is waiting on it.
    async fn release_rating_lock(&self, provider: ObjectId, lock: Arc<Mutex<()>>) {
        let mut locks = self.rating_locks.lock().await;
        drop(lock);
        if locks.get(&provider).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&provider);
        }
    }

    /// Recomputes the provider's mean from every stored review and copies the
    /// review onto its task. Safe to repeat.
    async fn settle(&self, review: &Review) -> MarketResult<()> {
        let lock = self.rating_lock(review.provider).await;
        let rated = {
            let _guard = lock.lock().await;
            match self.reviews.rating_summary(review.provider).await {
                Ok(summary) => self.users.set_rating(review.provider, summary).await,
                Err(e) => Err(e),
            }
        };
        self.release_rating_lock(review.provider, lock).await;
        rated?;

        self.tasks
            .record_feedback(review.task, review.rating, &review.comment)
            .await?;
        Ok(())
    }

    /// Finishes the follow-up writes of a review an earlier attempt stored.
    async fn resettle(&self, reviewer: ObjectId, provider: ObjectId, task: ObjectId) {
        let stored = match self.reviews.list_provider_reviews(provider).await {
            Ok(reviews) => reviews
                .into_iter()
                .find(|r| r.reviewer == reviewer && r.task == task),
            Err(e) => {
                warn!("Could not reload review of task {}: {}", task, e);
                return;
            }
        };
        if let Some(review) = stored {
            if let Err(e) = self.settle(&review).await {
                warn!("Provider {} rating still stale: {}", provider, e);
            }
        }
    }

    /// A client reviews the provider of one of their completed tasks. At most
    /// one review per client and task.
    pub async fn create(&self, actor: Actor, dto: CreateReviewDto) -> MarketResult<Review> {
        let Actor::Client(reviewer) = actor else {
            return Err(MarketError::forbidden("Only clients can review tasks"));
        };

        validate_dto(&dto)?;
        let task_id = parse_object_id(&dto.task_id, "task")?;

        let task = self
            .tasks
            .find_task(task_id)
            .await?
            .filter(|t| t.client == reviewer)
            .ok_or_else(|| MarketError::not_found("Task not found"))?;

        if task.status != TaskStatus::Completed {
            return Err(MarketError::validation("Only completed tasks can be reviewed"));
        }

        let provider = task
            .provider
            .ok_or_else(|| MarketError::validation("Task has no provider to review"))?;

        let comment = dto.comment.trim().to_string();
        let sentiment = classify_or_neutral(self.classifier.as_ref(), &comment, self.classify_timeout).await;

        let review = Review {
            id: None,
            reviewer,
            provider,
            task: task_id,
            rating: dto.rating,
            comment,
            sentiment,
            created_at: DateTime::now(),
        };

        let review = match self.reviews.insert_review(review).await {
            Ok(review) => review,
            Err(StoreError::Duplicate(_)) => {
                self.resettle(reviewer, provider, task_id).await;
                return Err(MarketError::conflict("You have already reviewed this task"));
            }
            Err(other) => return Err(MarketError::Storage(other)),
        };

        // The review is committed; a failed follow-up is repaired on retry.
        if let Err(e) = self.settle(&review).await {
            error!("Review {:?} stored but provider {} not updated: {}", review.id, provider, e);
        }

        info!(
            "Review {:?} for provider {} stored ({:?})",
            review.id, provider, review.sentiment
        );
        Ok(review)
    }

    /// Newest first. An unknown provider simply has no reviews.
    pub async fn list_for_provider(&self, provider: ObjectId) -> MarketResult<Vec<Review>> {
        Ok(self.reviews.list_provider_reviews(provider).await?)
    }
}
