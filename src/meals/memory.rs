use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::MealStore;
use super::repo_types::{MealFilter, MealPatch, NewMeal, StoredMeal};

/// Process-local meal store, used by tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct InMemoryMealStore {
    meals: RwLock<Vec<StoredMeal>>,
}

impl InMemoryMealStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row verbatim, e.g. a legacy-shaped fixture.
    pub async fn insert(&self, meal: StoredMeal) {
        self.meals.write().await.push(meal);
    }

    pub async fn count(&self) -> usize {
        self.meals.read().await.len()
    }
}

#[async_trait]
impl MealStore for InMemoryMealStore {
    async fn find_meals(&self, filter: &MealFilter) -> anyhow::Result<Vec<StoredMeal>> {
        let meals = self.meals.read().await;
        let mut rows: Vec<StoredMeal> = meals.iter().filter(|m| filter.matches(m)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = usize::try_from(filter.offset.max(0)).unwrap_or(0);
        let limit = filter
            .limit
            .map(|l| usize::try_from(l.max(0)).unwrap_or(0))
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_meal(&self, meal: NewMeal) -> anyhow::Result<StoredMeal> {
        let now = OffsetDateTime::now_utc();
        let row = StoredMeal {
            id: meal.id.unwrap_or_else(Uuid::new_v4),
            user_id: meal.user_id,
            title: meal.title,
            status: meal.status,
            image_key: meal.image_key,
            nutrients: meal.nutrients,
            ingredients: meal.ingredients,
            additives: meal.additives,
            created_at: meal.created_at.unwrap_or(now),
            updated_at: now,
        };
        let mut meals = self.meals.write().await;
        anyhow::ensure!(meals.iter().all(|m| m.id != row.id), "duplicate meal id {}", row.id);
        meals.push(row.clone());
        Ok(row)
    }

    async fn update_meal(&self, id: Uuid, patch: MealPatch) -> anyhow::Result<StoredMeal> {
        let mut meals = self.meals.write().await;
        let meal = meals
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow::anyhow!("update meal {id}: no such row"))?;
        if let Some(title) = patch.title {
            meal.title = Some(title);
        }
        if let Some(status) = patch.status {
            meal.status = status;
        }
        if let Some(nutrients) = patch.nutrients {
            meal.nutrients = nutrients;
        }
        if let Some(ingredients) = patch.ingredients {
            meal.ingredients = ingredients;
        }
        if let Some(additives) = patch.additives {
            meal.additives = additives;
        }
        meal.updated_at = OffsetDateTime::now_utc();
        Ok(meal.clone())
    }

    async fn find_one_meal(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<StoredMeal>> {
        let meals = self.meals.read().await;
        Ok(meals.iter().find(|m| m.id == id && m.user_id == user_id).cloned())
    }
}
