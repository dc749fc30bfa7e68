use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::instrument;
use uuid::Uuid;

use crate::error::NutritionError;
use crate::extractors::OwnerId;
use crate::nutrition::{ClientMeal, DailyStats, RangeStatistics};
use crate::state::AppState;

use super::dto::{
    ClearedResponse, DailyQuery, DuplicateRequest, FavoriteResponse, FeedbackRequest,
    FeedbackResponse, Pagination, RangeQuery, ReanalyzeRequest, SaveMealRequest,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/:id", get(get_meal))
        .route("/stats/range", get(range_stats))
        .route("/stats/daily", get(daily_stats))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(save_meal))
        .route("/meals/:id/reanalyze", post(reanalyze_meal))
        .route("/meals/:id/feedback", post(save_feedback))
        .route("/meals/:id/favorite", post(toggle_favorite))
        .route("/meals/:id/duplicate", post(duplicate_meal))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/caches/clear", post(clear_caches))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<ClientMeal>>, NutritionError> {
    let meals = state
        .service
        .get_user_meals(owner_id, p.offset, p.limit)
        .await?;
    Ok(Json(meals))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientMeal>, NutritionError> {
    Ok(Json(state.service.get_meal(owner_id, id).await?))
}

#[instrument(skip(state))]
pub async fn range_stats(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(q): Query<RangeQuery>,
) -> Result<Json<RangeStatistics>, NutritionError> {
    let stats = state
        .service
        .get_range_statistics(owner_id, &q.start, &q.end)
        .await?;
    Ok(Json(stats))
}

#[instrument(skip(state))]
pub async fn daily_stats(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(q): Query<DailyQuery>,
) -> Result<Json<DailyStats>, NutritionError> {
    Ok(Json(state.service.get_daily_stats(owner_id, &q.date).await?))
}

/// POST /meals { image_base64, content_type?, language?, hint_text?, title? }
#[instrument(skip(state, body))]
pub async fn save_meal(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Json(body): Json<SaveMealRequest>,
) -> Result<(StatusCode, Json<ClientMeal>), NutritionError> {
    let meal = state.service.save_meal(owner_id, body).await?;
    Ok((StatusCode::CREATED, Json(meal)))
}

#[instrument(skip(state, body))]
pub async fn reanalyze_meal(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ClientMeal>, NutritionError> {
    let req: ReanalyzeRequest = optional_body(&body)?;
    Ok(Json(state.service.update_meal(owner_id, id, req).await?))
}

#[instrument(skip(state, body))]
pub async fn save_feedback(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Json(body): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, NutritionError> {
    Ok(Json(state.service.save_meal_feedback(owner_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<FavoriteResponse>, NutritionError> {
    Ok(Json(state.service.toggle_meal_favorite(owner_id, id).await?))
}

/// POST /meals/:id/duplicate { newDate?: "YYYY-MM-DD" }
#[instrument(skip(state, body))]
pub async fn duplicate_meal(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<(StatusCode, Json<ClientMeal>), NutritionError> {
    let req: DuplicateRequest = optional_body(&body)?;
    let copy = state
        .service
        .duplicate_meal(owner_id, id, req.new_date.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

#[instrument(skip(state))]
pub async fn clear_caches(State(state): State<AppState>) -> Json<ClearedResponse> {
    state.service.clear_all_caches().await;
    Json(ClearedResponse { cleared: true })
}

/// Empty body means defaults. Anything else must be valid JSON for `T`,
/// whatever the content type says.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, NutritionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| NutritionError::validation(format!("invalid request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::OWNER_HEADER;
    use crate::meals::repo_types::{StoredMeal, STATUS_ANALYZED};
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use time::macros::datetime;
    use tower::ServiceExt;

    fn stored(owner: Uuid) -> StoredMeal {
        let at = datetime!(2024-05-20 09:15 UTC);
        StoredMeal {
            id: Uuid::new_v4(),
            user_id: owner,
            title: Some("porridge".into()),
            status: STATUS_ANALYZED.into(),
            image_key: None,
            nutrients: json!({ "calories": 310, "fiber": 6 }),
            ingredients: json!([]),
            additives: json!({}),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn list_then_get_meal() {
        let (state, store) = AppState::fake();
        let owner = Uuid::new_v4();
        let meal = stored(owner);
        store.insert(meal.clone()).await;

        let Json(meals) = list_meals(
            State(state.clone()),
            OwnerId(owner),
            Query(Pagination { limit: 20, offset: 0 }),
        )
        .await
        .unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].nutrients["fiber_g"], 6.0);

        let Json(one) = get_meal(State(state), OwnerId(owner), Path(meal.id)).await.unwrap();
        assert_eq!(one.id, meal.id);
    }

    #[tokio::test]
    async fn foreign_meal_maps_to_404() {
        let (state, store) = AppState::fake();
        let meal = stored(Uuid::new_v4());
        store.insert(meal.clone()).await;

        let err = get_meal(State(state), OwnerId(Uuid::new_v4()), Path(meal.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_without_body_is_created_now() {
        let (state, store) = AppState::fake();
        let owner = Uuid::new_v4();
        let meal = stored(owner);
        store.insert(meal.clone()).await;

        let (status, Json(copy)) = duplicate_meal(State(state), OwnerId(owner), Path(meal.id), Bytes::new())
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(copy.created_at > meal.created_at);
        assert_eq!(copy.total(crate::nutrition::Nutrient::Calories), 310.0);
        assert_eq!(store.count().await, 2);
    }

    async fn post_duplicate(
        state: AppState,
        owner: Uuid,
        meal_id: Uuid,
        body: &'static str,
        content_type: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut req = Request::post(format!("/api/v1/meals/{meal_id}/duplicate"))
            .header(OWNER_HEADER, owner.to_string());
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        let res = crate::app::build_app(state)
            .oneshot(req.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn duplicate_honors_new_date_without_content_type() {
        let (state, store) = AppState::fake();
        let owner = Uuid::new_v4();
        let meal = stored(owner);
        store.insert(meal.clone()).await;

        let (status, copy) =
            post_duplicate(state, owner, meal.id, r#"{"newDate":"2024-01-01"}"#, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(copy["created_at"], json!("2024-01-01T09:15:00Z"));
    }

    #[tokio::test]
    async fn duplicate_rejects_malformed_body_with_400() {
        let (state, store) = AppState::fake();
        let owner = Uuid::new_v4();
        let meal = stored(owner);
        store.insert(meal.clone()).await;

        for body in [r#"{"newDate":20240101}"#, "not json"] {
            let (status, _) = post_duplicate(
                state.clone(),
                owner,
                meal.id,
                body,
                Some("application/json"),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }
        assert_eq!(store.count().await, 1);

        let (status, _) = post_duplicate(state, owner, meal.id, "", None).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn stats_reject_bad_dates_with_400() {
        let (state, _) = AppState::fake();
        let err = daily_stats(
            State(state),
            OwnerId(Uuid::new_v4()),
            Query(DailyQuery { date: "yesterday".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn clear_caches_reports_success() {
        let (state, _) = AppState::fake();
        let Json(res) = clear_caches(State(state)).await;
        assert!(res.cleared);
    }
}
