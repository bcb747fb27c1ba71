//! Provider priority score.
//!
//! ```text
//! sentiment = (positive - negative) / max(1, reviews)          in [-1, 1]
//! recency   = reviews in the last 3 calendar months / max(1, reviews)
//! score     = 0.35 * rating + 0.30 * sentiment + 0.20 * recency
//!           + 0.10 * response_rate / 100 + 0.05 * completed_tasks / 100
//! ```
//!
//! `rating` enters on its raw 0-5 scale, so the rating term dominates; the
//! weights only sum to 1 if ratings are normalised, and they are deliberately
//! not. Scores may be negative. They are a relative signal, not a probability.

use std::cmp::Ordering;

use chrono::{DateTime, Months, Utc};
use mongodb::bson::oid::ObjectId;

use crate::models::{to_utc, Review, Sentiment, User};

pub const RECENT_WINDOW_MONTHS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub rating: f64,
    pub sentiment: f64,
    pub recency: f64,
    pub response_rate: f64,
    pub completed_tasks: f64,
    /// Proximity bonus for the provider search. 0 leaves distance as a pure filter.
    pub distance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            rating: 0.35,
            sentiment: 0.30,
            recency: 0.20,
            response_rate: 0.10,
            completed_tasks: 0.05,
            distance: 0.0,
        }
    }
}

/// The parts of a review the score looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewSignal {
    pub sentiment: Sentiment,
    pub created_at: DateTime<Utc>,
}

impl From<&Review> for ReviewSignal {
    fn from(review: &Review) -> Self {
        ReviewSignal {
            sentiment: review.sentiment,
            created_at: to_utc(review.created_at),
        }
    }
}

/// Aggregate statistics of one provider. Missing values are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderStats {
    pub rating: f64,
    pub reviews: Vec<ReviewSignal>,
    pub completed_tasks: i64,
    pub response_rate: f64,
}

impl ProviderStats {
    pub fn from_user(user: &User, reviews: &[&Review]) -> Self {
        ProviderStats {
            rating: user.rating,
            reviews: reviews.iter().map(|r| ReviewSignal::from(*r)).collect(),
            completed_tasks: user.completed_tasks,
            response_rate: user.response_rate,
        }
    }
}

fn review_denominator(reviews: &[ReviewSignal]) -> f64 {
    reviews.len().max(1) as f64
}

fn or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

pub fn sentiment_score(reviews: &[ReviewSignal]) -> f64 {
    let balance: i64 = reviews
        .iter()
        .map(|r| match r.sentiment {
            Sentiment::Positive => 1,
            Sentiment::Negative => -1,
            Sentiment::Neutral => 0,
        })
        .sum();
    balance as f64 / review_denominator(reviews)
}

/// Share of reviews written on or after the same day three calendar months ago.
pub fn recent_score(reviews: &[ReviewSignal], now: DateTime<Utc>) -> f64 {
    let Some(cutoff) = now.checked_sub_months(Months::new(RECENT_WINDOW_MONTHS)) else {
        return 0.0;
    };
    let recent = reviews.iter().filter(|r| r.created_at >= cutoff).count();
    recent as f64 / review_denominator(reviews)
}

pub fn priority_score(stats: &ProviderStats, weights: &ScoringWeights, now: DateTime<Utc>) -> f64 {
    weights.rating * or_zero(stats.rating)
        + weights.sentiment * sentiment_score(&stats.reviews)
        + weights.recency * recent_score(&stats.reviews, now)
        + weights.response_rate * (or_zero(stats.response_rate) / 100.0)
        + weights.completed_tasks * (stats.completed_tasks as f64 / 100.0)
}

/// Bonus in `[0, weight]` that shrinks linearly to 0 at the edge of the radius.
pub fn proximity_bonus(distance_km: Option<f64>, radius_km: f64, weight: f64) -> f64 {
    match distance_km {
        Some(d) if weight != 0.0 && radius_km > 0.0 => {
            weight * (1.0 - d.min(radius_km) / radius_km)
        }
        _ => 0.0,
    }
}

/// Highest score first; equal scores fall back to ascending identifier.
pub fn rank_order(a: (f64, ObjectId), b: (f64, ObjectId)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn signal(sentiment: Sentiment, created_at: DateTime<Utc>) -> ReviewSignal {
        ReviewSignal { sentiment, created_at }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn zero_reviews_reduce_to_rating_response_and_volume() {
        for (rating, response_rate, completed) in [(0.0, 0.0, 0), (4.5, 80.0, 12), (2.0, 100.0, 250)] {
            let stats = ProviderStats {
                rating,
                reviews: Vec::new(),
                completed_tasks: completed,
                response_rate,
            };
            let expected = 0.35 * rating + 0.10 * (response_rate / 100.0) + 0.05 * (completed as f64 / 100.0);
            assert!(close(priority_score(&stats, &ScoringWeights::default(), now()), expected));
        }
    }

    #[test]
    fn missing_stats_score_zero() {
        assert_eq!(priority_score(&ProviderStats::default(), &ScoringWeights::default(), now()), 0.0);
    }

    #[test]
    fn sentiment_balance_over_review_count() {
        let t = now();
        let reviews = vec![
            signal(Sentiment::Positive, t),
            signal(Sentiment::Positive, t),
            signal(Sentiment::Negative, t),
            signal(Sentiment::Neutral, t),
        ];
        assert!(close(sentiment_score(&reviews), 0.25));

        let cancelled = vec![signal(Sentiment::Positive, t), signal(Sentiment::Negative, t)];
        assert_eq!(sentiment_score(&cancelled), 0.0);
        assert_eq!(sentiment_score(&[]), 0.0);
    }

    #[test]
    fn recency_uses_calendar_months() {
        let cutoff = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let reviews = vec![
            signal(Sentiment::Neutral, cutoff),
            signal(Sentiment::Neutral, cutoff - chrono::Duration::seconds(1)),
            signal(Sentiment::Neutral, now()),
            signal(Sentiment::Neutral, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
        ];
        assert!(close(recent_score(&reviews, now()), 0.5));
        assert_eq!(recent_score(&[], now()), 0.0);
    }

    #[test]
    fn full_formula() {
        let stats = ProviderStats {
            rating: 4.0,
            reviews: vec![
                signal(Sentiment::Positive, now()),
                signal(Sentiment::Negative, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
            ],
            completed_tasks: 10,
            response_rate: 50.0,
        };
        let expected = 0.35 * 4.0 + 0.30 * 0.0 + 0.20 * 0.5 + 0.10 * 0.5 + 0.05 * 0.1;
        assert!(close(priority_score(&stats, &ScoringWeights::default(), now()), expected));
    }

    #[test]
    fn negative_scores_are_possible() {
        let stats = ProviderStats {
            rating: 0.0,
            reviews: vec![signal(Sentiment::Negative, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())],
            ..ProviderStats::default()
        };
        assert!(priority_score(&stats, &ScoringWeights::default(), now()) < 0.0);
    }

    #[test]
    fn proximity_bonus_is_off_by_default() {
        let weights = ScoringWeights::default();
        assert_eq!(proximity_bonus(Some(1.0), 50.0, weights.distance), 0.0);
        assert!(close(proximity_bonus(Some(25.0), 50.0, 0.2), 0.1));
        assert_eq!(proximity_bonus(Some(80.0), 50.0, 0.2), 0.0);
        assert_eq!(proximity_bonus(None, 50.0, 0.2), 0.0);
    }

    #[test]
    fn ranking_is_descending_with_id_tie_break() {
        let a = ObjectId::parse_str("000000000000000000000001").unwrap();
        let b = ObjectId::parse_str("000000000000000000000002").unwrap();
        let c = ObjectId::parse_str("000000000000000000000003").unwrap();

        let mut ranked = vec![(1.0, c), (2.0, b), (1.0, a), (-0.5, b)];
        ranked.sort_by(|x, y| rank_order(*x, *y));
        assert_eq!(ranked, vec![(2.0, b), (1.0, a), (1.0, c), (-0.5, b)]);
    }
}
