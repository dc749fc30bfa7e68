//! Fakes shared by the service and handler tests.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use crate::analysis::{MealAnalysis, MealAnalyzer};
use crate::error::AnalysisError;
use crate::meals::dto::{FeedbackRequest, SaveMealRequest};
use crate::nutrition::IngredientRecord;

#[derive(Debug, Clone)]
pub struct AnalyzeCall {
    pub image: Bytes,
    pub language: String,
    pub hint_text: Option<String>,
    pub hint_ingredients: Vec<IngredientRecord>,
}

/// Returns a fixed analysis and records every call. `fail_next` makes the
/// following call fail once.
pub struct ScriptedAnalyzer {
    result: Mutex<MealAnalysis>,
    failure: Mutex<Option<AnalysisError>>,
    calls: Mutex<Vec<AnalyzeCall>>,
}

impl ScriptedAnalyzer {
    pub fn returning(result: MealAnalysis) -> Self {
        Self {
            result: Mutex::new(result),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_result(&self, result: MealAnalysis) {
        *self.result.lock().await = result;
    }

    pub async fn fail_next(&self, err: AnalysisError) {
        *self.failure.lock().await = Some(err);
    }

    pub async fn calls(&self) -> Vec<AnalyzeCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl MealAnalyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        image: Bytes,
        language: &str,
        hint_text: Option<&str>,
        hint_ingredients: &[IngredientRecord],
    ) -> Result<MealAnalysis, AnalysisError> {
        self.calls.lock().await.push(AnalyzeCall {
            image,
            language: language.to_string(),
            hint_text: hint_text.map(str::to_string),
            hint_ingredients: hint_ingredients.to_vec(),
        });
        if let Some(err) = self.failure.lock().await.take() {
            return Err(err);
        }
        Ok(self.result.lock().await.clone())
    }
}

pub fn save_request(image_base64: &str) -> SaveMealRequest {
    SaveMealRequest {
        image_base64: image_base64.to_string(),
        content_type: None,
        language: None,
        hint_text: None,
        title: None,
    }
}

pub fn feedback(rating: u8) -> FeedbackRequest {
    FeedbackRequest {
        rating: f64::from(rating),
        comment: Some("  a bit salty ".into()),
        accurate: Some(false),
    }
}
