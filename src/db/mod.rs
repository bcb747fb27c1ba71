use std::sync::Arc;
use std::time::Duration;

use mongodb::{Client, Database};
use rocket::{Rocket, Build};
use rocket::fairing::AdHoc;

use crate::config::Config;
use crate::services::scoring::ScoringWeights;
use crate::services::sentiment::{HuggingFaceClassifier, NeutralClassifier, SentimentClassifier};
use crate::services::{AccountService, MatchLimits, MatchingService, ReviewService, TaskService};
use crate::store::{MemoryStore, MongoStore, ReviewStore, TaskStore, UserStore};

/// Picks the storage backend, prepares it, and manages every service on it.
pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("Storage", |rocket| async move {
        let classifier = classifier();

        if Config::storage_backend().eq_ignore_ascii_case("memory") {
            warn!("Using the in-memory store; data is lost on shutdown");
            return Ok(manage_services(
                rocket,
                Arc::new(MemoryStore::default()),
                classifier,
                ServiceSettings::from_config(),
            ));
        }

        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                let store = MongoStore::new(database);
                if let Err(e) = store.ensure_indexes().await {
                    error!("✗ Failed to create indexes: {}", e);
                    return Err(rocket);
                }
                Ok(manage_services(rocket, Arc::new(store), classifier, ServiceSettings::from_config()))
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                Err(rocket)
            }
        }
    })
}

fn classifier() -> Arc<dyn SentimentClassifier> {
    match HuggingFaceClassifier::from_config() {
        Some(classifier) => Arc::new(classifier),
        None => {
            warn!("No Hugging Face API key configured, review sentiment will be neutral");
            Arc::new(NeutralClassifier)
        }
    }
}

/// Tunables handed to the services at startup.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub weights: ScoringWeights,
    pub limits: MatchLimits,
    pub bcrypt_cost: u32,
    pub sentiment_timeout: Duration,
}

impl ServiceSettings {
    pub fn from_config() -> Self {
        ServiceSettings {
            weights: ScoringWeights {
                distance: Config::distance_weight(),
                ..ScoringWeights::default()
            },
            limits: MatchLimits {
                candidates: Config::candidate_limit(),
                results: Config::result_limit(),
            },
            bcrypt_cost: Config::bcrypt_cost(),
            sentiment_timeout: Duration::from_millis(Config::sentiment_timeout_ms()),
        }
    }
}

pub fn manage_services<S>(
    rocket: Rocket<Build>,
    store: Arc<S>,
    classifier: Arc<dyn SentimentClassifier>,
    settings: ServiceSettings,
) -> Rocket<Build>
where
    S: UserStore + TaskStore + ReviewStore + 'static,
{
    let users: Arc<dyn UserStore> = store.clone();
    let tasks: Arc<dyn TaskStore> = store.clone();
    let reviews: Arc<dyn ReviewStore> = store;

    rocket
        .manage(AccountService::new(users.clone(), settings.bcrypt_cost))
        .manage(TaskService::new(tasks.clone(), users.clone()))
        .manage(MatchingService::new(
            users.clone(),
            tasks.clone(),
            reviews.clone(),
            settings.weights,
            settings.limits,
        ))
        .manage(ReviewService::new(tasks, users, reviews, classifier, settings.sentiment_timeout))
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    Ok(client.database(&Config::mongodb_database()))
}
