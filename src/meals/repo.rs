use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{MealFilter, MealPatch, NewMeal, StoredMeal};

/// Persistence collaborator for meals.
#[async_trait]
pub trait MealStore: Send + Sync {
    async fn find_meals(&self, filter: &MealFilter) -> anyhow::Result<Vec<StoredMeal>>;
    async fn create_meal(&self, meal: NewMeal) -> anyhow::Result<StoredMeal>;
    async fn update_meal(&self, id: Uuid, patch: MealPatch) -> anyhow::Result<StoredMeal>;
    /// `None` when the meal is missing or belongs to someone else.
    async fn find_one_meal(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<StoredMeal>>;
}

const MEAL_COLUMNS: &str = "id, user_id, title, status, image_key, nutrients, ingredients, additives, created_at, updated_at";

#[derive(Clone)]
pub struct PgMealStore {
    db: PgPool,
}

impl PgMealStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MealStore for PgMealStore {
    async fn find_meals(&self, filter: &MealFilter) -> anyhow::Result<Vec<StoredMeal>> {
        let sql = format!(
            r#"
            SELECT {MEAL_COLUMNS}
              FROM meals
             WHERE user_id = $1
               AND ($2::timestamptz IS NULL OR created_at >= $2)
               AND ($3::timestamptz IS NULL OR created_at <= $3)
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5
            "#
        );
        let rows = sqlx::query_as::<_, StoredMeal>(&sql)
            .bind(filter.user_id)
            .bind(filter.created_from)
            .bind(filter.created_to)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.db)
            .await
            .context("list meals")?;
        Ok(rows)
    }

    async fn create_meal(&self, meal: NewMeal) -> anyhow::Result<StoredMeal> {
        let sql = format!(
            r#"
            INSERT INTO meals (id, user_id, title, status, image_key, nutrients, ingredients, additives, created_at)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6, $7, $8, COALESCE($9, now()))
            RETURNING {MEAL_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, StoredMeal>(&sql)
            .bind(meal.id)
            .bind(meal.user_id)
            .bind(meal.title)
            .bind(meal.status)
            .bind(meal.image_key)
            .bind(meal.nutrients)
            .bind(meal.ingredients)
            .bind(meal.additives)
            .bind(meal.created_at)
            .fetch_one(&self.db)
            .await
            .context("insert meal")?;
        Ok(row)
    }

    async fn update_meal(&self, id: Uuid, patch: MealPatch) -> anyhow::Result<StoredMeal> {
        let sql = format!(
            r#"
            UPDATE meals
               SET title       = COALESCE($2, title),
                   status      = COALESCE($3, status),
                   nutrients   = COALESCE($4::jsonb, nutrients),
                   ingredients = COALESCE($5::jsonb, ingredients),
                   additives   = COALESCE($6::jsonb, additives),
                   updated_at  = now()
             WHERE id = $1
            RETURNING {MEAL_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, StoredMeal>(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(patch.status)
            .bind(patch.nutrients)
            .bind(patch.ingredients)
            .bind(patch.additives)
            .fetch_one(&self.db)
            .await
            .with_context(|| format!("update meal {id}"))?;
        Ok(row)
    }

    async fn find_one_meal(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<StoredMeal>> {
        let sql = format!(
            r#"
            SELECT {MEAL_COLUMNS}
              FROM meals
             WHERE id = $1 AND user_id = $2
            "#
        );
        let row = sqlx::query_as::<_, StoredMeal>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("get meal")?;
        Ok(row)
    }
}
