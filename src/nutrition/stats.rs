use std::collections::BTreeMap;

use serde::Serialize;
use time::macros::time;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use uuid::Uuid;

use super::normalizer::ClientMeal;
use super::nutrients::{Nutrient, NutrientTotals};

/// Compact per-meal line inside a day of a range report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealSummary {
    pub id: Uuid,
    pub title: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBreakdown {
    /// ISO calendar day (UTC) the meals were created on.
    pub date: String,
    pub meal_count: usize,
    pub totals: NutrientTotals,
    pub meals: Vec<MealSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeStatistics {
    pub start_date: String,
    pub end_date: String,
    pub meal_count: usize,
    /// Days inside the range that hold at least one meal.
    pub day_count: usize,
    pub totals: NutrientTotals,
    pub averages: NutrientTotals,
    pub daily_breakdown: Vec<DailyBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub meal_count: usize,
}

/// `YYYY-MM-DD`, the same text `Date`'s `Display` gives cache keys.
pub fn iso_date(date: Date) -> String {
    date.to_string()
}

pub fn utc_day(at: OffsetDateTime) -> Date {
    at.to_offset(UtcOffset::UTC).date()
}

/// `[start 00:00:00.000, end 23:59:59.999]` in UTC.
pub fn range_bounds(start: Date, end: Date) -> (OffsetDateTime, OffsetDateTime) {
    (
        start.midnight().assume_utc(),
        PrimitiveDateTime::new(end, time!(23:59:59.999)).assume_utc(),
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn summarize(meal: &ClientMeal) -> MealSummary {
    MealSummary {
        id: meal.id,
        title: meal.title.clone(),
        created_at: meal.created_at,
        calories: meal.total(Nutrient::Calories),
        protein: meal.total(Nutrient::Protein),
        carbs: meal.total(Nutrient::Carbs),
        fat: meal.total(Nutrient::Fat),
    }
}

fn meal_totals(meal: &ClientMeal) -> NutrientTotals {
    let mut totals = NutrientTotals::default();
    for nutrient in Nutrient::ALL {
        totals.set(nutrient, meal.total(nutrient));
    }
    totals
}

/// Totals and per-day averages over `[start, end]`.
///
/// Meals outside the range are ignored. Averages divide by the number of
/// distinct days that have meals, not by the meal count. Rounding to two
/// decimals happens once, after all sums are taken.
pub fn range_statistics(meals: &[ClientMeal], start: Date, end: Date) -> RangeStatistics {
    let (from, to) = range_bounds(start, end);

    let mut days: BTreeMap<Date, (NutrientTotals, Vec<&ClientMeal>)> = BTreeMap::new();
    let mut totals = NutrientTotals::default();
    let mut meal_count = 0;

    for meal in meals.iter().filter(|m| m.created_at >= from && m.created_at <= to) {
        let per_meal = meal_totals(meal);
        totals.accumulate(&per_meal);
        let day = days.entry(utc_day(meal.created_at)).or_default();
        day.0.accumulate(&per_meal);
        day.1.push(meal);
        meal_count += 1;
    }

    let day_count = days.len();
    let averages = if day_count == 0 {
        NutrientTotals::default()
    } else {
        totals.map(|total| round2(total / day_count as f64))
    };

    let daily_breakdown = days
        .into_iter()
        .map(|(date, (day_totals, mut day_meals))| {
            day_meals.sort_by_key(|m| m.created_at);
            DailyBreakdown {
                date: iso_date(date),
                meal_count: day_meals.len(),
                totals: day_totals.map(round2),
                meals: day_meals.into_iter().map(summarize).collect(),
            }
        })
        .collect();

    RangeStatistics {
        start_date: iso_date(start),
        end_date: iso_date(end),
        meal_count,
        day_count,
        totals: totals.map(round2),
        averages,
        daily_breakdown,
    }
}

/// Headline numbers for a single UTC day.
pub fn daily_statistics(meals: &[ClientMeal], date: Date) -> DailyStats {
    let mut totals = NutrientTotals::default();
    let mut meal_count = 0;
    for meal in meals.iter().filter(|m| utc_day(m.created_at) == date) {
        totals.accumulate(&meal_totals(meal));
        meal_count += 1;
    }
    DailyStats {
        date: iso_date(date),
        calories: round2(totals.get(Nutrient::Calories)),
        protein: round2(totals.get(Nutrient::Protein)),
        carbs: round2(totals.get(Nutrient::Carbs)),
        fat: round2(totals.get(Nutrient::Fat)),
        fiber: round2(totals.get(Nutrient::Fiber)),
        sugar: round2(totals.get(Nutrient::Sugar)),
        meal_count,
    }
}
