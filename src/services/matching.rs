//! Provider search and the provider-side task feed.
//!
//! Both queries run the same pipeline: category filter, then the optional
//! circle around the query point, then ordering. Distances are only used for
//! filtering and display unless a non-zero distance weight is configured.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::debug;
use mongodb::bson::oid::ObjectId;

use super::geo::known_distance_km;
use super::scoring::{priority_score, proximity_bonus, rank_order, ProviderStats, ScoringWeights};
use crate::error::{MarketError, MarketResult};
use crate::models::{canonical_tag, GeoPoint, Review, Task, TaskStatus, User};
use crate::store::{CategoryFilter, Proximity, ProviderFilter, ReviewStore, TaskFilter, TaskStore, UserStore};

#[derive(Debug, Clone)]
pub struct RankedProvider {
    pub provider: User,
    pub score: f64,
    /// Unrounded; `None` without a query point.
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TaskMatch {
    pub task: Task,
    pub distance_km: Option<f64>,
}

/// `candidates` caps the newest-first task feed read from storage. Providers
/// are always ranked over the whole filtered set and then cut to `results`.
#[derive(Debug, Clone, Copy)]
pub struct MatchLimits {
    pub candidates: i64,
    pub results: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        MatchLimits {
            candidates: 500,
            results: 20,
        }
    }
}

pub struct MatchingService {
    users: Arc<dyn UserStore>,
    tasks: Arc<dyn TaskStore>,
    reviews: Arc<dyn ReviewStore>,
    weights: ScoringWeights,
    limits: MatchLimits,
}

fn circle(center: Option<GeoPoint>, radius_km: f64) -> MarketResult<Option<Proximity>> {
    let Some(center) = center else {
        return Ok(None);
    };
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(MarketError::validation("Radius must be a positive number of kilometres"));
    }
    Ok(Some(Proximity { center, radius_km }))
}

impl MatchingService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        reviews: Arc<dyn ReviewStore>,
        weights: ScoringWeights,
        limits: MatchLimits,
    ) -> Self {
        MatchingService {
            users,
            tasks,
            reviews,
            weights,
            limits,
        }
    }

    /// Providers offering `category`, best first. With a `location` only
    /// providers within `radius_km` are considered.
    pub async fn find_providers(
        &self,
        category: Option<&str>,
        location: Option<GeoPoint>,
        radius_km: f64,
    ) -> MarketResult<Vec<RankedProvider>> {
        let category = category.map(canonical_tag).unwrap_or_default();
        if category.is_empty() {
            return Err(MarketError::validation("Category is required"));
        }

        let near = circle(location, radius_km)?;
        let filter = ProviderFilter { category, near };

        let candidates = self.users.find_providers(&filter).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ObjectId> = candidates.iter().filter_map(|p| p.id).collect();
        let reviews = self.reviews.list_reviews_for(&ids).await?;

        let mut by_provider: HashMap<ObjectId, Vec<&Review>> = HashMap::new();
        for review in &reviews {
            by_provider.entry(review.provider).or_default().push(review);
        }

        let now = Utc::now();
        let mut ranked: Vec<RankedProvider> = candidates
            .into_iter()
            .map(|provider| {
                let received = provider
                    .id
                    .and_then(|id| by_provider.get(&id))
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let stats = ProviderStats::from_user(&provider, received);
                let distance_km = near
                    .as_ref()
                    .and_then(|p| known_distance_km(&p.center, &provider.location));
                let score = priority_score(&stats, &self.weights, now)
                    + proximity_bonus(distance_km, radius_km, self.weights.distance);
                RankedProvider {
                    provider,
                    score,
                    distance_km,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            rank_order(
                (a.score, a.provider.id.unwrap_or_default()),
                (b.score, b.provider.id.unwrap_or_default()),
            )
        });
        ranked.truncate(self.limits.results);

        debug!("Provider search for {} returned {} providers", filter.category, ranked.len());
        Ok(ranked)
    }

    /// Tasks in `status` a provider could take on, newest first.
    ///
    /// An explicit `category` filters exactly; otherwise the provider's skills
    /// are used, and a provider without skills sees every category. The display
    /// distance is measured from the query point, or from the provider's own
    /// location when no point was given.
    pub async fn find_open_tasks(
        &self,
        provider: &User,
        category: Option<&str>,
        location: Option<GeoPoint>,
        radius_km: f64,
        status: TaskStatus,
    ) -> MarketResult<Vec<TaskMatch>> {
        let category = match category.map(canonical_tag).filter(|c| !c.is_empty()) {
            Some(category) => CategoryFilter::Exact(category),
            None if provider.skills.is_empty() => CategoryFilter::Any,
            None => CategoryFilter::OneOf(provider.skills.clone()),
        };

        let filter = TaskFilter {
            status,
            category,
            near: circle(location, radius_km)?,
            limit: self.limits.candidates,
        };

        let reference = location.or_else(|| provider.location.known().copied());

        let mut matches: Vec<TaskMatch> = self
            .tasks
            .list_tasks(&filter)
            .await?
            .into_iter()
            .map(|task| {
                let distance_km = reference
                    .as_ref()
                    .and_then(|r| known_distance_km(r, &task.location));
                TaskMatch { task, distance_km }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.task
                .created_at
                .cmp(&a.task.created_at)
                .then_with(|| b.task.id.cmp(&a.task.id))
        });

        Ok(matches)
    }
}
