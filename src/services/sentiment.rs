use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::models::Sentiment;

const HF_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("sentiment request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sentiment service returned {0}")]
    Status(u16),

    #[error("unexpected sentiment response: {0}")]
    Response(String),
}

/// Best-effort text classifier. Callers go through [`classify_or_neutral`].
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment, SentimentError>;
}

/// Used when no inference key is configured.
pub struct NeutralClassifier;

#[async_trait]
impl SentimentClassifier for NeutralClassifier {
    async fn classify(&self, _text: &str) -> Result<Sentiment, SentimentError> {
        Ok(Sentiment::Neutral)
    }
}

/// Hugging Face inference API running a 1-5 star review model.
pub struct HuggingFaceClassifier {
    client: Client,
    api_key: String,
    model: String,
}

impl HuggingFaceClassifier {
    pub fn new(api_key: String, model: String) -> Self {
        HuggingFaceClassifier {
            client: Client::new(),
            api_key,
            model,
        }
    }

    pub fn from_config() -> Option<Self> {
        Config::hugging_face_api_key().map(|key| Self::new(key, Config::sentiment_model()))
    }
}

#[async_trait]
impl SentimentClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, SentimentError> {
        let res = self
            .client
            .post(format!("{}/{}", HF_INFERENCE_BASE, self.model))
            .bearer_auth(&self.api_key)
            .json(&json!({ "inputs": text }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(SentimentError::Status(res.status().as_u16()));
        }

        let body: Value = res.json().await?;
        let label = top_label(&body)
            .ok_or_else(|| SentimentError::Response(body.to_string()))?;

        sentiment_from_label(label)
            .ok_or_else(|| SentimentError::Response(format!("unknown label {}", label)))
    }
}

/// Label of the highest-scoring class. The API answers either `[{..}]` or `[[{..}]]`.
fn top_label(body: &Value) -> Option<&str> {
    let outer = body.as_array()?;
    let classes = match outer.first()? {
        Value::Array(inner) => inner,
        Value::Object(_) => outer,
        _ => return None,
    };

    classes
        .iter()
        .filter_map(|class| {
            let label = class.get("label")?.as_str()?;
            let score = class.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            Some((label, score))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, _)| label)
}

/// Star labels such as "4 stars": 4-5 positive, 1-2 negative, 3 neutral.
pub fn sentiment_from_label(label: &str) -> Option<Sentiment> {
    let stars = label.trim().chars().next()?.to_digit(10)?;
    match stars {
        4..=5 => Some(Sentiment::Positive),
        3 => Some(Sentiment::Neutral),
        1..=2 => Some(Sentiment::Negative),
        _ => None,
    }
}

/// Classifies `text`, bounded by `timeout`. Empty text, errors and timeouts all
/// come back as neutral so a review is never rejected because of the classifier.
pub async fn classify_or_neutral(
    classifier: &dyn SentimentClassifier,
    text: &str,
    timeout: Duration,
) -> Sentiment {
    if text.trim().is_empty() {
        return Sentiment::Neutral;
    }

    match tokio::time::timeout(timeout, classifier.classify(text)).await {
        Ok(Ok(sentiment)) => {
            debug!("Classified review comment as {:?}", sentiment);
            sentiment
        }
        Ok(Err(e)) => {
            warn!("Sentiment classification failed, using neutral: {}", e);
            Sentiment::Neutral
        }
        Err(_) => {
            warn!("Sentiment classification timed out after {:?}, using neutral", timeout);
            Sentiment::Neutral
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Keyword stand-in for the remote model.
    pub struct KeywordClassifier;

    #[async_trait]
    impl SentimentClassifier for KeywordClassifier {
        async fn classify(&self, text: &str) -> Result<Sentiment, SentimentError> {
            let text = text.to_lowercase();
            if text.contains("great") || text.contains("excellent") {
                Ok(Sentiment::Positive)
            } else if text.contains("bad") || text.contains("late") {
                Ok(Sentiment::Negative)
            } else {
                Ok(Sentiment::Neutral)
            }
        }
    }

    pub struct FailingClassifier;

    #[async_trait]
    impl SentimentClassifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> Result<Sentiment, SentimentError> {
            Err(SentimentError::Status(503))
        }
    }

    pub struct StalledClassifier;

    #[async_trait]
    impl SentimentClassifier for StalledClassifier {
        async fn classify(&self, _text: &str) -> Result<Sentiment, SentimentError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Sentiment::Positive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("5 stars", Some(Sentiment::Positive))]
    #[case("4 stars", Some(Sentiment::Positive))]
    #[case("3 stars", Some(Sentiment::Neutral))]
    #[case("2 stars", Some(Sentiment::Negative))]
    #[case("1 star", Some(Sentiment::Negative))]
    #[case("LABEL_0", None)]
    #[case("", None)]
    fn star_labels(#[case] label: &str, #[case] expected: Option<Sentiment>) {
        assert_eq!(sentiment_from_label(label), expected);
    }

    #[test]
    fn picks_highest_scoring_label_from_either_shape() {
        let nested = json!([[{"label": "1 star", "score": 0.1}, {"label": "5 stars", "score": 0.7}]]);
        assert_eq!(top_label(&nested), Some("5 stars"));

        let flat = json!([{"label": "2 stars", "score": 0.6}, {"label": "3 stars", "score": 0.2}]);
        assert_eq!(top_label(&flat), Some("2 stars"));

        assert_eq!(top_label(&json!({"error": "loading"})), None);
    }

    #[tokio::test]
    async fn empty_text_is_neutral_without_a_call() {
        let sentiment = classify_or_neutral(&FailingClassifier, "   ", Duration::from_millis(10)).await;
        assert_eq!(sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn failures_fall_back_to_neutral() {
        let sentiment = classify_or_neutral(&FailingClassifier, "great job", Duration::from_millis(50)).await;
        assert_eq!(sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn timeouts_fall_back_to_neutral() {
        let sentiment = classify_or_neutral(&StalledClassifier, "great job", Duration::from_millis(20)).await;
        assert_eq!(sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn successful_classification_is_used() {
        let sentiment = classify_or_neutral(&KeywordClassifier, "Great job", Duration::from_secs(1)).await;
        assert_eq!(sentiment, Sentiment::Positive);
    }
}
