//! Nutrient resolution, meal normalization and statistics. Pure functions,
//! no I/O; the meals service feeds them store rows.

pub mod normalizer;
pub mod nutrients;
pub mod stats;

pub use normalizer::{
    parse_additives, parse_ingredients, patch_additives, to_client_view, ClientMeal, IngredientRecord,
    MealAdditives, MealFeedback,
};
pub use nutrients::{resolve, Nutrient, NutrientRecord, NutrientTotals};
pub use stats::{daily_statistics, range_statistics, DailyBreakdown, DailyStats, RangeStatistics};
