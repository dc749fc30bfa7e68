//! Image analysis collaborator.
//!
//! The vision model lives behind an HTTP endpoint; this module only ships the
//! photo and hints over and reads back a loosely shaped nutrient estimate.

use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::AnalysisError;
use crate::nutrition::{IngredientRecord, NutrientRecord};

/// Estimate returned by the analyzer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MealAnalysis {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub nutrients: NutrientRecord,
    /// Raw ingredient list; normalized by the caller.
    #[serde(default)]
    pub ingredients: Value,
}

#[async_trait]
pub trait MealAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        image: Bytes,
        language: &str,
        hint_text: Option<&str>,
        hint_ingredients: &[IngredientRecord],
    ) -> Result<MealAnalysis, AnalysisError>;
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    image_base64: String,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint_text: Option<&'a str>,
    #[serde(skip_serializing_if = "no_hints")]
    hint_ingredients: &'a [IngredientRecord],
}

fn no_hints(hints: &&[IngredientRecord]) -> bool {
    hints.is_empty()
}

/// Talks to the analysis service over JSON.
#[derive(Clone)]
pub struct HttpAnalyzer {
    client: Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl MealAnalyzer for HttpAnalyzer {
    #[instrument(skip(self, image, hint_ingredients), fields(bytes = image.len()))]
    async fn analyze(
        &self,
        image: Bytes,
        language: &str,
        hint_text: Option<&str>,
        hint_ingredients: &[IngredientRecord],
    ) -> Result<MealAnalysis, AnalysisError> {
        let body = AnalyzeRequest {
            image_base64: Base64::encode_string(&image),
            language,
            hint_text,
            hint_ingredients,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::GATEWAY_TIMEOUT || status == StatusCode::REQUEST_TIMEOUT {
            warn!(%status, "analyzer timed out upstream");
            return Err(AnalysisError::Timeout);
        }
        if !status.is_success() {
            warn!(%status, "analyzer returned an error");
            return Err(AnalysisError::Failed(format!("analyzer returned {status}")));
        }

        let analysis = response
            .json::<MealAnalysis>()
            .await
            .map_err(map_transport_error)?;
        debug!(title = ?analysis.title, "analysis received");
        Ok(analysis)
    }
}

fn map_transport_error(e: reqwest::Error) -> AnalysisError {
    if e.is_timeout() {
        AnalysisError::Timeout
    } else {
        AnalysisError::Failed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn analysis_tolerates_missing_fields() {
        let parsed: MealAnalysis = serde_json::from_value(json!({ "nutrients": { "kcal": 300 } })).unwrap();
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.ingredients, Value::Null);
        assert_eq!(
            crate::nutrition::resolve(&parsed.nutrients, crate::nutrition::Nutrient::Calories),
            300.0
        );
    }

    #[test]
    fn request_omits_empty_hints() {
        let body = AnalyzeRequest {
            image_base64: Base64::encode_string(b"abc"),
            language: "en",
            hint_text: None,
            hint_ingredients: &[],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v, json!({ "image_base64": "YWJj", "language": "en" }));
    }
}
