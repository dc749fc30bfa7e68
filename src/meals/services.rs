use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use bytes::Bytes;
use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    FavoriteResponse, FeedbackRequest, FeedbackResponse, ReanalyzeRequest, SaveMealRequest,
};
use super::repo::MealStore;
use super::repo_types::{MealFilter, MealPatch, NewMeal, StoredMeal, STATUS_ANALYZED};
use crate::analysis::MealAnalyzer;
use crate::cache::{CacheKey, CacheNamespace, TtlCache};
use crate::error::{NutritionError, NutritionResult};
use crate::nutrition::stats::range_bounds;
use crate::nutrition::{
    daily_statistics, parse_additives, parse_ingredients, patch_additives, range_statistics,
    to_client_view, ClientMeal, DailyStats, IngredientRecord, MealAdditives, MealFeedback,
    RangeStatistics,
};
use crate::storage::{ext_from_mime, StorageClient};

pub const MAX_PAGE_SIZE: i64 = 100;
const MAX_COMMENT_LEN: usize = 1000;

#[derive(Debug, Clone)]
pub enum CachedStats {
    Range(RangeStatistics),
    Daily(DailyStats),
}

/// Both read-model caches. One instance per process, shared by the service.
pub struct NutritionCaches {
    pub meals: TtlCache<Vec<ClientMeal>>,
    pub stats: TtlCache<CachedStats>,
}

impl NutritionCaches {
    pub fn new(ttl: Duration) -> Self {
        Self {
            meals: TtlCache::new(ttl),
            stats: TtlCache::new(ttl),
        }
    }

    pub async fn invalidate_owner(&self, owner_id: Uuid) -> usize {
        self.meals.invalidate_owner(owner_id).await + self.stats.invalidate_owner(owner_id).await
    }

    pub async fn clear(&self) {
        self.meals.clear().await;
        self.stats.clear().await;
    }
}

impl Default for NutritionCaches {
    fn default() -> Self {
        Self::new(crate::cache::DEFAULT_TTL)
    }
}

/// Serves meal lists and statistics through the caches and writes every
/// mutation through to the store before dropping the owner's cached reads.
pub struct NutritionService {
    store: Arc<dyn MealStore>,
    analyzer: Arc<dyn MealAnalyzer>,
    storage: Arc<dyn StorageClient>,
    caches: NutritionCaches,
    default_language: String,
}

impl NutritionService {
    pub fn new(
        store: Arc<dyn MealStore>,
        analyzer: Arc<dyn MealAnalyzer>,
        storage: Arc<dyn StorageClient>,
        caches: NutritionCaches,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            store,
            analyzer,
            storage,
            caches,
            default_language: default_language.into(),
        }
    }

    pub fn caches(&self) -> &NutritionCaches {
        &self.caches
    }

    // --- reads ---

    #[instrument(skip(self))]
    pub async fn get_user_meals(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> NutritionResult<Vec<ClientMeal>> {
        if offset < 0 {
            return Err(NutritionError::validation("offset must not be negative"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(NutritionError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let key = CacheKey::new(CacheNamespace::MealList, owner_id, format!("{offset}:{limit}"));
        if let Some(meals) = self.caches.meals.get(&key).await {
            debug!(%owner_id, cache = "hit", "meal list");
            return Ok(meals);
        }
        debug!(%owner_id, cache = "miss", "meal list");

        let rows = self
            .store
            .find_meals(&MealFilter::page(owner_id, offset, limit))
            .await?;
        let meals: Vec<ClientMeal> = rows.iter().map(to_client_view).collect();
        self.caches.meals.set(key, meals.clone()).await;
        Ok(meals)
    }

    #[instrument(skip(self))]
    pub async fn get_meal(&self, owner_id: Uuid, meal_id: Uuid) -> NutritionResult<ClientMeal> {
        let meal = self.find_owned(owner_id, meal_id).await?;
        Ok(to_client_view(&meal))
    }

    #[instrument(skip(self))]
    pub async fn get_range_statistics(
        &self,
        owner_id: Uuid,
        start_date: &str,
        end_date: &str,
    ) -> NutritionResult<RangeStatistics> {
        let start = parse_iso_date(start_date)?;
        let end = parse_iso_date(end_date)?;
        if start > end {
            return Err(NutritionError::validation("start date must not be after end date"));
        }

        let key = CacheKey::new(CacheNamespace::RangeStats, owner_id, format!("{start}:{end}"));
        if let Some(CachedStats::Range(stats)) = self.caches.stats.get(&key).await {
            debug!(%owner_id, cache = "hit", "range statistics");
            return Ok(stats);
        }
        debug!(%owner_id, cache = "miss", "range statistics");

        let meals = self.load_days(owner_id, start, end).await?;
        let stats = range_statistics(&meals, start, end);
        self.caches
            .stats
            .set(key, CachedStats::Range(stats.clone()))
            .await;
        Ok(stats)
    }

    #[instrument(skip(self))]
    pub async fn get_daily_stats(&self, owner_id: Uuid, date: &str) -> NutritionResult<DailyStats> {
        let day = parse_iso_date(date)?;

        let key = CacheKey::new(CacheNamespace::DailyStats, owner_id, day.to_string());
        if let Some(CachedStats::Daily(stats)) = self.caches.stats.get(&key).await {
            debug!(%owner_id, cache = "hit", "daily statistics");
            return Ok(stats);
        }
        debug!(%owner_id, cache = "miss", "daily statistics");

        let meals = self.load_days(owner_id, day, day).await?;
        let stats = daily_statistics(&meals, day);
        self.caches
            .stats
            .set(key, CachedStats::Daily(stats.clone()))
            .await;
        Ok(stats)
    }

    // --- mutations ---

    #[instrument(skip(self, req), fields(content_type = ?req.content_type))]
    pub async fn save_meal(&self, owner_id: Uuid, req: SaveMealRequest) -> NutritionResult<ClientMeal> {
        let image = decode_image(&req.image_base64)?;
        let content_type = req.content_type.as_deref().unwrap_or("image/jpeg");
        let meal_id = Uuid::new_v4();
        let image_key = format!(
            "meals/{}/{}.{}",
            owner_id,
            meal_id,
            ext_from_mime(content_type).unwrap_or("bin")
        );

        self.storage
            .put_object(&image_key, image.clone(), content_type)
            .await?;

        let language = req.language.as_deref().unwrap_or(&self.default_language);
        let analysis = match self
            .analyzer
            .analyze(image, language, req.hint_text.as_deref(), &[])
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                self.drop_image(&image_key).await;
                return Err(e.into());
            }
        };

        let ingredients = parse_ingredients(&analysis.ingredients);
        let created = self
            .store
            .create_meal(NewMeal {
                id: Some(meal_id),
                user_id: owner_id,
                title: req.title.or(analysis.title),
                status: STATUS_ANALYZED.to_string(),
                image_key: Some(image_key.clone()),
                nutrients: analysis.nutrients.into_value(),
                ingredients: ingredients_value(&ingredients),
                additives: MealAdditives::default().to_value(),
                created_at: None,
            })
            .await;
        let stored = match created {
            Ok(stored) => stored,
            Err(e) => {
                self.drop_image(&image_key).await;
                return Err(e.into());
            }
        };

        self.invalidate(owner_id).await;
        info!(%owner_id, meal_id = %stored.id, "meal saved");
        Ok(to_client_view(&stored))
    }

    /// Re-runs analysis on the stored photo, with the previous ingredients as hints.
    #[instrument(skip(self, req))]
    pub async fn update_meal(
        &self,
        owner_id: Uuid,
        meal_id: Uuid,
        req: ReanalyzeRequest,
    ) -> NutritionResult<ClientMeal> {
        let meal = self.find_owned(owner_id, meal_id).await?;
        let image_key = meal
            .image_key
            .as_deref()
            .ok_or_else(|| NutritionError::validation("meal has no stored image to analyze"))?;
        let image = self.storage.get_object(image_key).await?;
        let prior = parse_ingredients(&meal.ingredients);

        let language = req.language.as_deref().unwrap_or(&self.default_language);
        let analysis = self
            .analyzer
            .analyze(image, language, req.hint_text.as_deref(), &prior)
            .await?;

        let ingredients = parse_ingredients(&analysis.ingredients);
        let updated = self
            .store
            .update_meal(
                meal_id,
                MealPatch {
                    title: analysis.title,
                    status: Some(STATUS_ANALYZED.to_string()),
                    nutrients: Some(analysis.nutrients.into_value()),
                    ingredients: Some(ingredients_value(&ingredients)),
                    additives: None,
                },
            )
            .await?;

        self.invalidate(owner_id).await;
        info!(%owner_id, %meal_id, "meal re-analyzed");
        Ok(to_client_view(&updated))
    }

    #[instrument(skip(self, req))]
    pub async fn save_meal_feedback(
        &self,
        owner_id: Uuid,
        meal_id: Uuid,
        req: FeedbackRequest,
    ) -> NutritionResult<FeedbackResponse> {
        if req.rating.fract() != 0.0 || !(1.0..=5.0).contains(&req.rating) {
            return Err(NutritionError::validation("rating must be between 1 and 5"));
        }
        let rating = req.rating as u8;
        let comment = req
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if comment.as_ref().is_some_and(|c| c.chars().count() > MAX_COMMENT_LEN) {
            return Err(NutritionError::validation(format!(
                "comment must be at most {MAX_COMMENT_LEN} characters"
            )));
        }

        let meal = self.find_owned(owner_id, meal_id).await?;
        let feedback = MealFeedback {
            rating,
            comment,
            accurate: req.accurate,
            submitted_at: Some(OffsetDateTime::now_utc()),
        };
        let stored = serde_json::to_value(&feedback).map_err(anyhow::Error::from)?;

        self.store
            .update_meal(
                meal_id,
                MealPatch {
                    additives: Some(patch_additives(&meal.additives, "feedback", stored)),
                    ..Default::default()
                },
            )
            .await?;

        self.invalidate(owner_id).await;
        Ok(FeedbackResponse { meal_id, feedback })
    }

    #[instrument(skip(self))]
    pub async fn toggle_meal_favorite(
        &self,
        owner_id: Uuid,
        meal_id: Uuid,
    ) -> NutritionResult<FavoriteResponse> {
        let meal = self.find_owned(owner_id, meal_id).await?;
        let is_favorite = !parse_additives(&meal.additives).is_favorite;

        self.store
            .update_meal(
                meal_id,
                MealPatch {
                    additives: Some(patch_additives(
                        &meal.additives,
                        "is_favorite",
                        Value::Bool(is_favorite),
                    )),
                    ..Default::default()
                },
            )
            .await?;

        self.invalidate(owner_id).await;
        Ok(FavoriteResponse {
            meal_id,
            is_favorite,
        })
    }

    /// Copies a meal's analysis into a new record. With `new_date` the copy
    /// lands on that day at the original's UTC time of day; otherwise now.
    /// Feedback and favorite state are not copied.
    #[instrument(skip(self))]
    pub async fn duplicate_meal(
        &self,
        owner_id: Uuid,
        meal_id: Uuid,
        new_date: Option<&str>,
    ) -> NutritionResult<ClientMeal> {
        let created_at = new_date.map(parse_iso_date).transpose()?;
        let meal = self.find_owned(owner_id, meal_id).await?;
        let created_at = match created_at {
            Some(day) => {
                let time_of_day = meal.created_at.to_offset(UtcOffset::UTC).time();
                PrimitiveDateTime::new(day, time_of_day).assume_utc()
            }
            None => OffsetDateTime::now_utc(),
        };

        let copy = self
            .store
            .create_meal(NewMeal {
                id: None,
                user_id: owner_id,
                title: meal.title,
                status: meal.status,
                image_key: meal.image_key,
                nutrients: meal.nutrients,
                ingredients: meal.ingredients,
                additives: MealAdditives::default().to_value(),
                created_at: Some(created_at),
            })
            .await?;

        self.invalidate(owner_id).await;
        info!(%owner_id, source = %meal_id, meal_id = %copy.id, "meal duplicated");
        Ok(to_client_view(&copy))
    }

    pub async fn clear_all_caches(&self) {
        self.caches.clear().await;
        info!("all caches cleared");
    }

    // --- helpers ---

    async fn find_owned(&self, owner_id: Uuid, meal_id: Uuid) -> NutritionResult<StoredMeal> {
        self.store
            .find_one_meal(meal_id, owner_id)
            .await?
            .ok_or(NutritionError::NotFound { meal_id })
    }

    async fn load_days(&self, owner_id: Uuid, start: Date, end: Date) -> NutritionResult<Vec<ClientMeal>> {
        let (from, to) = range_bounds(start, end);
        let rows = self
            .store
            .find_meals(&MealFilter::between(owner_id, from, to))
            .await?;
        Ok(rows.iter().map(to_client_view).collect())
    }

    async fn drop_image(&self, image_key: &str) {
        if let Err(e) = self.storage.delete_object(image_key).await {
            warn!(error = %e, %image_key, "failed to drop image of unsaved meal");
        }
    }

    async fn invalidate(&self, owner_id: Uuid) {
        let removed = self.caches.invalidate_owner(owner_id).await;
        debug!(%owner_id, removed, "owner caches invalidated");
    }
}

pub fn parse_iso_date(value: &str) -> NutritionResult<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        NutritionError::validation(format!("invalid date {value:?}, expected YYYY-MM-DD"))
    })
}

/// Accepts bare base64 or a `data:<mime>;base64,` URL.
fn decode_image(data: &str) -> NutritionResult<Bytes> {
    let data = data.trim();
    let payload = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, b64)| b64)
            .ok_or_else(|| NutritionError::validation("unsupported data URL"))?,
        None => data,
    };
    if payload.is_empty() {
        return Err(NutritionError::validation("image data is empty"));
    }
    let bytes = Base64::decode_vec(payload)
        .map_err(|_| NutritionError::validation("image data is not valid base64"))?;
    Ok(Bytes::from(bytes))
}

fn ingredients_value(ingredients: &[IngredientRecord]) -> Value {
    Value::Array(ingredients.iter().map(IngredientRecord::to_value).collect())
}
