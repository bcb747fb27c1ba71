use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;

use super::{
    CategoryFilter, Proximity, ProviderFilter, RatingSummary, ReviewStore, StoreError, StoreResult,
    TaskFilter, TaskStore, UserStore, REVIEWS, TASKS, USERS,
};
use crate::models::{ProfileUpdate, Review, Role, Task, TaskStatus, User};
use crate::services::geo::EARTH_RADIUS_KM;

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        MongoStore { db }
    }

    fn users(&self) -> Collection<User> {
        self.db.collection::<User>(USERS)
    }

    fn tasks(&self) -> Collection<Task> {
        self.db.collection::<Task>(TASKS)
    }

    fn reviews(&self) -> Collection<Review> {
        self.db.collection::<Review>(REVIEWS)
    }

    /// Spatial indexes back the `$near` and `$geoWithin` queries; the unique indexes are what
    /// make duplicate e-mails and double reviews fail atomically.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        self.users()
            .create_index(IndexModel::builder().keys(doc! { "location": "2dsphere" }).build(), None)
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;
        self.tasks()
            .create_index(IndexModel::builder().keys(doc! { "location": "2dsphere" }).build(), None)
            .await?;
        self.reviews()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "reviewer": 1, "task": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn write_error(err: mongodb::error::Error, what: &str) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::Duplicate(what.to_string())
    } else {
        StoreError::Database(err)
    }
}

fn near(proximity: &Proximity) -> Document {
    doc! {
        "$near": {
            "$geometry": {
                "type": "Point",
                "coordinates": [proximity.center.longitude(), proximity.center.latitude()]
            },
            "$maxDistance": proximity.radius_km * 1000.0
        }
    }
}

/// Same circle as `near`, but unordered, so the query can carry its own sort.
fn within(proximity: &Proximity) -> Document {
    doc! {
        "$geoWithin": {
            "$centerSphere": [
                [proximity.center.longitude(), proximity.center.latitude()],
                proximity.radius_km / EARTH_RADIUS_KM
            ]
        }
    }
}

fn after_update() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn inserted_id(result: &mongodb::results::InsertOneResult) -> StoreResult<ObjectId> {
    result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| StoreError::Serialization("inserted id is not an ObjectId".to_string()))
}

fn as_count(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        _ => 0,
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert_user(&self, mut user: User) -> StoreResult<User> {
        let result = self
            .users()
            .insert_one(&user, None)
            .await
            .map_err(|e| write_error(e, "email"))?;
        user.id = Some(inserted_id(&result)?);
        Ok(user)
    }

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn update_profile(&self, id: ObjectId, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let mut set = doc! { "updated_at": DateTime::now() };

        if let Some(ref name) = update.name {
            set.insert("name", name);
        }
        if let Some(ref email) = update.email {
            set.insert("email", email);
        }
        if let Some(ref skills) = update.skills {
            set.insert("skills", skills);
        }
        if let Some(ref location) = update.location {
            let location = mongodb::bson::to_bson(location)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            set.insert("location", location);
        }

        self.users()
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set }, after_update())
            .await
            .map_err(|e| write_error(e, "email"))
    }

    async fn find_providers(&self, filter: &ProviderFilter) -> StoreResult<Vec<User>> {
        let mut query = doc! {
            "role": Role::Provider.as_str(),
            "skills": { "$in": [&filter.category] },
        };

        if let Some(ref proximity) = filter.near {
            query.insert("location", near(proximity));
        }

        let providers = self
            .users()
            .find(query, None)
            .await?
            .try_collect()
            .await?;
        Ok(providers)
    }

    async fn set_rating(&self, id: ObjectId, summary: RatingSummary) -> StoreResult<()> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "rating": summary.average,
                        "total_reviews": summary.count,
                        "updated_at": DateTime::now()
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    async fn increment_completed_tasks(&self, id: ObjectId) -> StoreResult<()> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$inc": { "completed_tasks": 1_i64 },
                    "$set": { "updated_at": DateTime::now() }
                },
                None,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MongoStore {
    async fn insert_task(&self, mut task: Task) -> StoreResult<Task> {
        let result = self.tasks().insert_one(&task, None).await?;
        task.id = Some(inserted_id(&result)?);
        Ok(task)
    }

    async fn find_task(&self, id: ObjectId) -> StoreResult<Option<Task>> {
        Ok(self.tasks().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_task_for_party(&self, id: ObjectId, user_id: ObjectId) -> StoreResult<Option<Task>> {
        let filter = doc! {
            "_id": id,
            "$or": [{ "client": user_id }, { "provider": user_id }]
        };
        Ok(self.tasks().find_one(filter, None).await?)
    }

    async fn list_client_tasks(&self, client: ObjectId) -> StoreResult<Vec<Task>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .build();

        let tasks = self
            .tasks()
            .find(doc! { "client": client }, options)
            .await?
            .try_collect()
            .await?;
        Ok(tasks)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let mut query = doc! { "status": filter.status.as_str() };

        match filter.category {
            CategoryFilter::Any => {}
            CategoryFilter::Exact(ref category) => {
                query.insert("category", category);
            }
            CategoryFilter::OneOf(ref categories) => {
                query.insert("category", doc! { "$in": categories });
            }
        }

        if let Some(ref proximity) = filter.near {
            query.insert("location", within(proximity));
        }

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .limit((filter.limit > 0).then_some(filter.limit))
            .build();

        let tasks = self
            .tasks()
            .find(query, options)
            .await?
            .try_collect()
            .await?;
        Ok(tasks)
    }

    async fn accept_task(&self, id: ObjectId, provider: ObjectId) -> StoreResult<Option<Task>> {
        let filter = doc! {
            "_id": id,
            "status": TaskStatus::Pending.as_str(),
            "provider": null
        };
        let update = doc! {
            "$set": {
                "provider": provider,
                "status": TaskStatus::Accepted.as_str(),
                "updated_at": DateTime::now()
            }
        };
        Ok(self.tasks().find_one_and_update(filter, update, after_update()).await?)
    }

    async fn transition_task(
        &self,
        id: ObjectId,
        actor: ObjectId,
        expected: TaskStatus,
        next: TaskStatus,
        rejected_by_provider: bool,
    ) -> StoreResult<Option<Task>> {
        let filter = doc! {
            "_id": id,
            "status": expected.as_str(),
            "$or": [{ "client": actor }, { "provider": actor }]
        };
        let update = doc! {
            "$set": {
                "status": next.as_str(),
                "rejected_by_provider": rejected_by_provider,
                "updated_at": DateTime::now()
            }
        };
        Ok(self.tasks().find_one_and_update(filter, update, after_update()).await?)
    }

    async fn delete_open_task(&self, id: ObjectId) -> StoreResult<bool> {
        let result = self
            .tasks()
            .delete_one(
                doc! {
                    "_id": id,
                    "status": TaskStatus::Pending.as_str(),
                    "provider": null
                },
                None,
            )
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn record_feedback(&self, id: ObjectId, rating: i32, feedback: &str) -> StoreResult<()> {
        self.tasks()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "rating": rating,
                        "feedback": feedback,
                        "updated_at": DateTime::now()
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for MongoStore {
    async fn insert_review(&self, mut review: Review) -> StoreResult<Review> {
        let result = self
            .reviews()
            .insert_one(&review, None)
            .await
            .map_err(|e| write_error(e, "review"))?;
        review.id = Some(inserted_id(&result)?);
        Ok(review)
    }

    async fn list_provider_reviews(&self, provider: ObjectId) -> StoreResult<Vec<Review>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .build();

        let reviews = self
            .reviews()
            .find(doc! { "provider": provider }, options)
            .await?
            .try_collect()
            .await?;
        Ok(reviews)
    }

    async fn list_reviews_for(&self, providers: &[ObjectId]) -> StoreResult<Vec<Review>> {
        if providers.is_empty() {
            return Ok(Vec::new());
        }

        let reviews = self
            .reviews()
            .find(doc! { "provider": { "$in": providers.to_vec() } }, None)
            .await?
            .try_collect()
            .await?;
        Ok(reviews)
    }

    async fn rating_summary(&self, provider: ObjectId) -> StoreResult<RatingSummary> {
        let pipeline = vec![
            doc! { "$match": { "provider": provider } },
            doc! {
                "$group": {
                    "_id": "$provider",
                    "average": { "$avg": "$rating" },
                    "count": { "$sum": 1 }
                }
            },
        ];

        let mut cursor = self.reviews().aggregate(pipeline, None).await?;

        match cursor.try_next().await? {
            Some(group) => Ok(RatingSummary {
                average: group.get_f64("average").unwrap_or(0.0),
                count: as_count(group.get("count")),
            }),
            None => Ok(RatingSummary::default()),
        }
    }
}
