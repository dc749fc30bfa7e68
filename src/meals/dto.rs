use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::nutrition::MealFeedback;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub date: String,
}

/// POST /meals { image_base64, content_type?, language?, hint_text?, title? }
#[derive(Debug, Deserialize)]
pub struct SaveMealRequest {
    pub image_base64: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub hint_text: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReanalyzeRequest {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub hint_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// Validated by the service, so out-of-range values get a 400 instead of a 422.
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub accurate: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub meal_id: Uuid,
    pub feedback: MealFeedback,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub meal_id: Uuid,
    pub is_favorite: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DuplicateRequest {
    #[serde(default, alias = "newDate")]
    pub new_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared: bool,
}
