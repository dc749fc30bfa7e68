use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::nutrients::{resolve, Nutrient, NutrientRecord, NutrientTotals};
use crate::meals::repo_types::StoredMeal;

/// One component of a meal. Any nutrient field may be missing or legacy-named.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientRecord {
    pub name: String,
    #[serde(flatten)]
    pub nutrients: NutrientRecord,
}

impl IngredientRecord {
    pub fn new(name: impl Into<String>, nutrients: NutrientRecord) -> Self {
        Self {
            name: name.into(),
            nutrients,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = match self.nutrients.clone().into_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert("name".into(), Value::String(self.name.clone()));
        Value::Object(map)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        let mut fields = map.clone();
        let name = match fields.remove("name") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        Some(Self {
            name,
            nutrients: NutrientRecord::from_value(&Value::Object(fields)),
        })
    }
}

/// Parses stored ingredients: a native array, or text holding a JSON array.
/// Undecodable text and non-object items are dropped instead of failing the read.
pub fn parse_ingredients(raw: &Value) -> Vec<IngredientRecord> {
    let decoded;
    let items = match raw {
        Value::Array(items) => items,
        Value::String(text) if text.trim().is_empty() => return Vec::new(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => {
                decoded = items;
                &decoded
            }
            _ => {
                debug!("ingredients payload is not a JSON array; treating as empty");
                return Vec::new();
            }
        },
        _ => return Vec::new(),
    };
    items.iter().filter_map(IngredientRecord::from_value).collect()
}

/// User feedback on an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealFeedback {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub accurate: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
}

/// The opaque attachment on a meal. Unknown keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealAdditives {
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub feedback: Option<MealFeedback>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MealAdditives {
    pub fn rating(&self) -> Option<u8> {
        self.feedback.as_ref().map(|f| f.rating)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

fn additives_map(raw: &Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map.clone(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            _ => {
                debug!("additives payload is not a JSON object; treating as empty");
                Map::new()
            }
        },
        _ => Map::new(),
    }
}

/// Reads the additives attachment field by field. A missing or wrong-typed
/// field falls back to its default without affecting the others.
pub fn parse_additives(raw: &Value) -> MealAdditives {
    let mut extra = additives_map(raw);
    let is_favorite = extra
        .remove("is_favorite")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let feedback = match extra.remove("feedback") {
        None | Some(Value::Null) => None,
        Some(v) => serde_json::from_value::<MealFeedback>(v)
            .map_err(|e| debug!(error = %e, "unreadable feedback in additives"))
            .ok(),
    };
    MealAdditives {
        is_favorite,
        feedback,
        extra,
    }
}

/// Sets one key of the stored attachment and keeps every other key as stored,
/// including ones `parse_additives` could not read.
pub fn patch_additives(raw: &Value, field: &str, value: Value) -> Value {
    let mut map = additives_map(raw);
    map.insert(field.to_string(), value);
    Value::Object(map)
}

/// Per-nutrient totals of a meal.
///
/// With a non-empty ingredient list each nutrient is first summed over the
/// ingredients; only when that sum is zero is the meal-level value used.
pub fn totals_with_fallback(meal: &NutrientRecord, ingredients: &[IngredientRecord]) -> NutrientTotals {
    let mut totals = NutrientTotals::default();
    for nutrient in Nutrient::ALL {
        let from_ingredients: f64 = ingredients
            .iter()
            .map(|i| resolve(&i.nutrients, nutrient))
            .sum();
        let value = if from_ingredients == 0.0 {
            resolve(meal, nutrient)
        } else {
            from_ingredients
        };
        totals.set(nutrient, value);
    }
    totals
}

/// Client-facing meal. Nutrients are flattened into the top level under both
/// their canonical (`protein_g`) and short (`protein`) names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientMeal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub status: String,
    pub image_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub ingredients: Vec<IngredientRecord>,
    pub is_favorite: bool,
    pub rating: Option<u8>,
    pub feedback: Option<MealFeedback>,
    #[serde(flatten)]
    pub nutrients: BTreeMap<String, f64>,
}

impl ClientMeal {
    pub fn total(&self, nutrient: Nutrient) -> f64 {
        self.nutrients
            .get(nutrient.canonical())
            .copied()
            .unwrap_or(0.0)
    }
}

pub fn to_client_view(meal: &StoredMeal) -> ClientMeal {
    let ingredients = parse_ingredients(&meal.ingredients);
    let totals = totals_with_fallback(&NutrientRecord::from_value(&meal.nutrients), &ingredients);
    let additives = parse_additives(&meal.additives);

    let mut nutrients = BTreeMap::new();
    for (nutrient, value) in totals.iter() {
        nutrients.insert(nutrient.canonical().to_string(), value);
        nutrients.insert(nutrient.short_name().to_string(), value);
    }

    ClientMeal {
        id: meal.id,
        user_id: meal.user_id,
        title: meal.title.clone(),
        status: meal.status.clone(),
        image_key: meal.image_key.clone(),
        created_at: meal.created_at,
        ingredients,
        is_favorite: additives.is_favorite,
        rating: additives.rating(),
        feedback: additives.feedback,
        nutrients,
    }
}
