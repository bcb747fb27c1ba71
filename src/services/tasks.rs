use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use mongodb::bson::{oid::ObjectId, DateTime};

use super::lifecycle::{check_provider_field, plan_status_change};
use crate::error::{MarketError, MarketResult};
use crate::models::{
    canonical_tag, canonical_tags, from_utc, Actor, CreateTaskDto, Task, TaskStatus, TaskUpdate,
};
use crate::store::{TaskStore, UserStore};
use crate::utils::validation::{require_text, validate_dto};

/// Creates tasks and drives them through their lifecycle.
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskStore>, users: Arc<dyn UserStore>) -> Self {
        TaskService { tasks, users }
    }

    pub async fn create(&self, actor: Actor, dto: CreateTaskDto) -> MarketResult<Task> {
        let Actor::Client(client) = actor else {
            return Err(MarketError::forbidden("Only clients can create tasks"));
        };

        validate_dto(&dto)?;

        let title = require_text(&dto.title, "Title is required")?;
        let description = require_text(&dto.description, "Description is required")?;
        let subcategory = require_text(&dto.subcategory, "Subcategory is required")?;
        let category = canonical_tag(&dto.category);
        if category.is_empty() {
            return Err(MarketError::validation("Category is required"));
        }
        let location = dto.location.to_point()?;

        let start = dto.start_date.unwrap_or_else(Utc::now);
        if let Some(end) = dto.end_date {
            if end < start {
                return Err(MarketError::validation("End date cannot be before start date"));
            }
        }

        let now = DateTime::now();
        let task = Task {
            id: None,
            title,
            description,
            status: TaskStatus::Pending,
            quantity: dto.quantity,
            price_per_unit: dto.price_per_unit,
            unit: dto.unit,
            location,
            category,
            subcategory,
            start_date: from_utc(start),
            end_date: dto.end_date.map(from_utc),
            quality: dto.quality,
            priority: dto.priority,
            task_type: dto.task_type,
            skills: canonical_tags(&dto.skills),
            attachments: dto.attachments,
            client,
            provider: None,
            rejected_by_provider: false,
            rating: None,
            feedback: None,
            created_at: now,
            updated_at: now,
        };

        let task = self.tasks.insert_task(task).await?;
        info!("Task {:?} created by client {}", task.id, client);
        Ok(task)
    }

    /// Conditional accept: of two providers racing for the same task exactly
    /// one wins, the other gets a conflict.
    pub async fn accept(&self, actor: Actor, task_id: ObjectId) -> MarketResult<Task> {
        let Actor::Provider(provider) = actor else {
            return Err(MarketError::forbidden("Only providers can accept tasks"));
        };

        if let Some(task) = self.tasks.accept_task(task_id, provider).await? {
            info!("Task {} accepted by provider {}", task_id, provider);
            return Ok(task);
        }

        match self.tasks.find_task(task_id).await? {
            None => Err(MarketError::not_found("Task not found")),
            Some(task) if task.provider.is_some() => {
                Err(MarketError::conflict("Task has already been taken"))
            }
            Some(_) => Err(MarketError::conflict("Task is no longer open")),
        }
    }

    /// Rejecting deletes the task record outright while it is still pending
    /// and unassigned; it does not move it to CANCELLED.
    pub async fn reject(&self, actor: Actor, task_id: ObjectId) -> MarketResult<()> {
        let Actor::Provider(provider) = actor else {
            return Err(MarketError::forbidden("Only providers can reject tasks"));
        };

        if self.tasks.delete_open_task(task_id).await? {
            info!("Task {} rejected and removed by provider {}", task_id, provider);
            Ok(())
        } else {
            Err(MarketError::not_found("Task not found or cannot be rejected"))
        }
    }

    pub async fn update(&self, actor: Actor, task_id: ObjectId, update: TaskUpdate) -> MarketResult<Task> {
        let task = self
            .tasks
            .find_task_for_party(task_id, actor.id())
            .await?
            .ok_or_else(|| MarketError::not_found("Task not found"))?;

        if let Some(provider) = update.provider {
            check_provider_field(&task, provider)?;
        }

        let Some(next) = update.status else {
            return Ok(task);
        };

        let plan = plan_status_change(&task, actor, next)?;

        let updated = self
            .tasks
            .transition_task(task_id, actor.id(), plan.from, plan.to, plan.rejected_by_provider)
            .await?
            .ok_or_else(|| MarketError::conflict("Task was changed by someone else, reload and retry"))?;

        // The transition is committed; a failed counter write must not turn it into an error.
        if let Some(provider) = plan.completes_for {
            if let Err(e) = self.users.increment_completed_tasks(provider).await {
                error!("Task {} completed but provider {} counter not updated: {}", task_id, provider, e);
            }
        }

        info!(
            "Task {} moved {} -> {} by {} {}",
            task_id,
            plan.from.as_str(),
            plan.to.as_str(),
            actor.role().as_str(),
            actor.id()
        );
        Ok(updated)
    }

    pub async fn client_tasks(&self, actor: Actor) -> MarketResult<Vec<Task>> {
        let Actor::Client(client) = actor else {
            return Err(MarketError::forbidden("Only clients have posted tasks"));
        };
        Ok(self.tasks.list_client_tasks(client).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, TaskPriority, TaskQuality, TaskType, TaskUnit};
    use crate::store::MemoryStore;
    use crate::test_support::{provider_user, task_dto, FlakyUsers};

    fn service(store: &Arc<MemoryStore>) -> TaskService {
        TaskService::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn created_tasks_start_pending_and_unassigned() {
        let store = Arc::new(MemoryStore::default());
        let client = ObjectId::new();

        let task = service(&store)
            .create(Actor::Client(client), task_dto("plumbing", 12.9, 77.6))
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.provider, None);
        assert_eq!(task.category, "PLUMBING");
        assert_eq!(task.client, client);
        assert!(task.id.is_some());
    }

    #[tokio::test]
    async fn providers_cannot_create_tasks() {
        let store = Arc::new(MemoryStore::default());
        let err = service(&store)
            .create(Actor::Provider(ObjectId::new()), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn invalid_task_input_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let client = Actor::Client(ObjectId::new());

        let mut dto = task_dto("PLUMBING", 12.9, 77.6);
        dto.location = Coordinates { latitude: 95.0, longitude: 10.0 };
        assert!(matches!(svc.create(client, dto).await, Err(MarketError::Validation(_))));

        let mut dto = task_dto("PLUMBING", 12.9, 77.6);
        dto.quantity = -1.0;
        assert!(matches!(svc.create(client, dto).await, Err(MarketError::Validation(_))));

        let mut dto = task_dto("PLUMBING", 12.9, 77.6);
        dto.title = "   ".to_string();
        assert!(matches!(svc.create(client, dto).await, Err(MarketError::Validation(_))));

        let mut dto = task_dto("PLUMBING", 12.9, 77.6);
        dto.start_date = Some(Utc::now());
        dto.end_date = Some(Utc::now() - chrono::Duration::days(1));
        assert!(matches!(svc.create(client, dto).await, Err(MarketError::Validation(_))));
    }

    #[tokio::test]
    async fn second_accept_conflicts_and_never_reassigns() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let task = svc
            .create(Actor::Client(ObjectId::new()), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();
        let id = task.id.unwrap();

        let first = ObjectId::new();
        let second = ObjectId::new();

        let accepted = svc.accept(Actor::Provider(first), id).await.unwrap();
        assert_eq!(accepted.status, TaskStatus::Accepted);
        assert_eq!(accepted.provider, Some(first));

        let err = svc.accept(Actor::Provider(second), id).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));

        let stored = store.find_task(id).await.unwrap().unwrap();
        assert_eq!(stored.provider, Some(first));
    }

    #[tokio::test]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let store = Arc::new(MemoryStore::default());
        let svc = Arc::new(service(&store));
        let task = svc
            .create(Actor::Client(ObjectId::new()), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();
        let id = task.id.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.accept(Actor::Provider(ObjectId::new()), id).await })
            })
            .collect();

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(MarketError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn clients_cannot_accept_and_missing_tasks_are_not_found() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        assert!(matches!(
            svc.accept(Actor::Client(ObjectId::new()), ObjectId::new()).await,
            Err(MarketError::Forbidden(_))
        ));
        assert!(matches!(
            svc.accept(Actor::Provider(ObjectId::new()), ObjectId::new()).await,
            Err(MarketError::NotFound(_))
        ));
    }

    // Rejection hard-deletes the record instead of marking it CANCELLED with
    // rejected_by_provider. Kept that way on purpose; see DESIGN.md.
    #[tokio::test]
    async fn rejecting_an_open_task_deletes_it() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let client = ObjectId::new();
        let task = svc
            .create(Actor::Client(client), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();
        let id = task.id.unwrap();

        svc.reject(Actor::Provider(ObjectId::new()), id).await.unwrap();

        assert!(store.find_task(id).await.unwrap().is_none());
        assert!(svc.client_tasks(Actor::Client(client)).await.unwrap().is_empty());
        assert!(matches!(
            svc.reject(Actor::Provider(ObjectId::new()), id).await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn accepted_tasks_cannot_be_rejected() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let task = svc
            .create(Actor::Client(ObjectId::new()), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();
        let id = task.id.unwrap();
        let provider = ObjectId::new();
        svc.accept(Actor::Provider(provider), id).await.unwrap();

        assert!(matches!(
            svc.reject(Actor::Provider(provider), id).await,
            Err(MarketError::NotFound(_))
        ));
        assert!(store.find_task(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn full_lifecycle_counts_completed_work() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let client = ObjectId::new();
        let provider = store.insert_user(provider_user("Ravi", &["PLUMBING"], 12.9, 77.6)).await.unwrap();
        let provider_id = provider.id.unwrap();

        let task = svc
            .create(Actor::Client(client), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();
        let id = task.id.unwrap();

        svc.accept(Actor::Provider(provider_id), id).await.unwrap();
        let step = |status| TaskUpdate { status: Some(status), provider: None };

        let running = svc.update(Actor::Provider(provider_id), id, step(TaskStatus::InProgress)).await.unwrap();
        assert_eq!(running.status, TaskStatus::InProgress);

        let done = svc.update(Actor::Client(client), id, step(TaskStatus::Completed)).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let provider = store.find_user(provider_id).await.unwrap().unwrap();
        assert_eq!(provider.completed_tasks, 1);

        let err = svc.update(Actor::Client(client), id, step(TaskStatus::Cancelled)).await.unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[tokio::test]
    async fn completion_survives_a_failed_counter_write() {
        let store = Arc::new(MemoryStore::default());
        let svc = TaskService::new(store.clone(), Arc::new(FlakyUsers::new(store.clone())));
        let client = ObjectId::new();
        let provider = ObjectId::new();

        let task = svc
            .create(Actor::Client(client), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();
        let id = task.id.unwrap();
        svc.accept(Actor::Provider(provider), id).await.unwrap();

        let step = |status| TaskUpdate { status: Some(status), provider: None };
        svc.update(Actor::Provider(provider), id, step(TaskStatus::InProgress)).await.unwrap();
        let done = svc.update(Actor::Provider(provider), id, step(TaskStatus::Completed)).await.unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(store.find_task(id).await.unwrap().unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn outsiders_cannot_see_or_touch_tasks() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let task = svc
            .create(Actor::Client(ObjectId::new()), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();

        let update = TaskUpdate { status: Some(TaskStatus::Cancelled), provider: None };
        let err = svc.update(Actor::Client(ObjectId::new()), task.id.unwrap(), update).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn provider_cancelling_marks_rejection() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let task = svc
            .create(Actor::Client(ObjectId::new()), task_dto("PLUMBING", 12.9, 77.6))
            .await
            .unwrap();
        let id = task.id.unwrap();
        let provider = ObjectId::new();
        svc.accept(Actor::Provider(provider), id).await.unwrap();

        let update = TaskUpdate { status: Some(TaskStatus::Cancelled), provider: Some(Some(provider)) };
        let cancelled = svc.update(Actor::Provider(provider), id, update).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.rejected_by_provider);
    }

    #[tokio::test]
    async fn client_listing_is_newest_first() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(&store);
        let client = Actor::Client(ObjectId::new());

        let mut first = task_dto("PLUMBING", 12.9, 77.6);
        first.title = "first".to_string();
        let mut second = task_dto("PAINTING", 12.9, 77.6);
        second.title = "second".to_string();
        second.unit = TaskUnit::Day;
        second.quality = TaskQuality::Premium;
        second.priority = TaskPriority::High;
        second.task_type = TaskType::Product;

        svc.create(client, first).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        svc.create(client, second).await.unwrap();

        let titles: Vec<_> = svc
            .client_tasks(client)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
    }
}
