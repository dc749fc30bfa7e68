use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const STATUS_ANALYZED: &str = "analyzed";

/// Meal row as persisted. The JSON columns are loosely shaped: `nutrients`
/// and `additives` are objects (or legacy JSON text), `ingredients` is an
/// array or a string holding one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredMeal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub status: String,
    pub image_key: Option<String>,
    pub nutrients: serde_json::Value,
    pub ingredients: serde_json::Value,
    pub additives: serde_json::Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields for a new row. `id` and `created_at` fall back to fresh values.
#[derive(Debug, Clone)]
pub struct NewMeal {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub status: String,
    pub image_key: Option<String>,
    pub nutrients: serde_json::Value,
    pub ingredients: serde_json::Value,
    pub additives: serde_json::Value,
    pub created_at: Option<OffsetDateTime>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct MealPatch {
    pub title: Option<String>,
    pub status: Option<String>,
    pub nutrients: Option<serde_json::Value>,
    pub ingredients: Option<serde_json::Value>,
    pub additives: Option<serde_json::Value>,
}

/// Owner-scoped query, newest first. Bounds are inclusive.
#[derive(Debug, Clone)]
pub struct MealFilter {
    pub user_id: Uuid,
    pub created_from: Option<OffsetDateTime>,
    pub created_to: Option<OffsetDateTime>,
    pub offset: i64,
    pub limit: Option<i64>,
}

impl MealFilter {
    pub fn page(user_id: Uuid, offset: i64, limit: i64) -> Self {
        Self {
            user_id,
            created_from: None,
            created_to: None,
            offset,
            limit: Some(limit),
        }
    }

    pub fn between(user_id: Uuid, from: OffsetDateTime, to: OffsetDateTime) -> Self {
        Self {
            user_id,
            created_from: Some(from),
            created_to: Some(to),
            offset: 0,
            limit: None,
        }
    }

    pub fn matches(&self, meal: &StoredMeal) -> bool {
        meal.user_id == self.user_id
            && self.created_from.map_or(true, |from| meal.created_at >= from)
            && self.created_to.map_or(true, |to| meal.created_at <= to)
    }
}
