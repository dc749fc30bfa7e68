use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every nutrient the service tracks. Serialized under its canonical storage name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Nutrient {
    #[serde(rename = "calories")]
    Calories,
    #[serde(rename = "protein_g", alias = "protein")]
    Protein,
    #[serde(rename = "carbs_g", alias = "carbs")]
    Carbs,
    #[serde(rename = "fat_g", alias = "fat")]
    Fat,
    #[serde(rename = "fiber_g", alias = "fiber")]
    Fiber,
    #[serde(rename = "sugar_g", alias = "sugar")]
    Sugar,
    #[serde(rename = "sodium_mg", alias = "sodium")]
    Sodium,
    #[serde(rename = "saturated_fat_g", alias = "saturated_fat")]
    SaturatedFat,
    #[serde(rename = "trans_fat_g", alias = "trans_fat")]
    TransFat,
    #[serde(rename = "monounsaturated_fat_g", alias = "monounsaturated_fat")]
    MonounsaturatedFat,
    #[serde(rename = "polyunsaturated_fat_g", alias = "polyunsaturated_fat")]
    PolyunsaturatedFat,
    #[serde(rename = "cholesterol_mg", alias = "cholesterol")]
    Cholesterol,
    #[serde(rename = "potassium_mg", alias = "potassium")]
    Potassium,
    #[serde(rename = "calcium_mg", alias = "calcium")]
    Calcium,
    #[serde(rename = "iron_mg", alias = "iron")]
    Iron,
    #[serde(rename = "magnesium_mg", alias = "magnesium")]
    Magnesium,
    #[serde(rename = "zinc_mg", alias = "zinc")]
    Zinc,
    #[serde(rename = "phosphorus_mg", alias = "phosphorus")]
    Phosphorus,
    #[serde(rename = "vitamin_a_mcg", alias = "vitamin_a")]
    VitaminA,
    #[serde(rename = "vitamin_c_mg", alias = "vitamin_c")]
    VitaminC,
    #[serde(rename = "vitamin_d_mcg", alias = "vitamin_d")]
    VitaminD,
    #[serde(rename = "vitamin_e_mg", alias = "vitamin_e")]
    VitaminE,
    #[serde(rename = "vitamin_k_mcg", alias = "vitamin_k")]
    VitaminK,
    #[serde(rename = "vitamin_b6_mg", alias = "vitamin_b6")]
    VitaminB6,
    #[serde(rename = "vitamin_b12_mcg", alias = "vitamin_b12")]
    VitaminB12,
    #[serde(rename = "folate_mcg", alias = "folate")]
    Folate,
    #[serde(rename = "water_ml", alias = "water")]
    Water,
}

impl Nutrient {
    pub const ALL: [Nutrient; 27] = [
        Nutrient::Calories,
        Nutrient::Protein,
        Nutrient::Carbs,
        Nutrient::Fat,
        Nutrient::Fiber,
        Nutrient::Sugar,
        Nutrient::Sodium,
        Nutrient::SaturatedFat,
        Nutrient::TransFat,
        Nutrient::MonounsaturatedFat,
        Nutrient::PolyunsaturatedFat,
        Nutrient::Cholesterol,
        Nutrient::Potassium,
        Nutrient::Calcium,
        Nutrient::Iron,
        Nutrient::Magnesium,
        Nutrient::Zinc,
        Nutrient::Phosphorus,
        Nutrient::VitaminA,
        Nutrient::VitaminC,
        Nutrient::VitaminD,
        Nutrient::VitaminE,
        Nutrient::VitaminK,
        Nutrient::VitaminB6,
        Nutrient::VitaminB12,
        Nutrient::Folate,
        Nutrient::Water,
    ];

    /// Primary stored name, e.g. `protein_g`.
    pub fn canonical(self) -> &'static str {
        match self {
            Nutrient::Calories => "calories",
            Nutrient::Protein => "protein_g",
            Nutrient::Carbs => "carbs_g",
            Nutrient::Fat => "fat_g",
            Nutrient::Fiber => "fiber_g",
            Nutrient::Sugar => "sugar_g",
            Nutrient::Sodium => "sodium_mg",
            Nutrient::SaturatedFat => "saturated_fat_g",
            Nutrient::TransFat => "trans_fat_g",
            Nutrient::MonounsaturatedFat => "monounsaturated_fat_g",
            Nutrient::PolyunsaturatedFat => "polyunsaturated_fat_g",
            Nutrient::Cholesterol => "cholesterol_mg",
            Nutrient::Potassium => "potassium_mg",
            Nutrient::Calcium => "calcium_mg",
            Nutrient::Iron => "iron_mg",
            Nutrient::Magnesium => "magnesium_mg",
            Nutrient::Zinc => "zinc_mg",
            Nutrient::Phosphorus => "phosphorus_mg",
            Nutrient::VitaminA => "vitamin_a_mcg",
            Nutrient::VitaminC => "vitamin_c_mg",
            Nutrient::VitaminD => "vitamin_d_mcg",
            Nutrient::VitaminE => "vitamin_e_mg",
            Nutrient::VitaminK => "vitamin_k_mcg",
            Nutrient::VitaminB6 => "vitamin_b6_mg",
            Nutrient::VitaminB12 => "vitamin_b12_mcg",
            Nutrient::Folate => "folate_mcg",
            Nutrient::Water => "water_ml",
        }
    }

    /// Unit-free name exposed to clients next to the canonical one, e.g. `protein`.
    pub fn short_name(self) -> &'static str {
        SHORT_NAMES
            .get(&self)
            .map(String::as_str)
            .unwrap_or_else(|| self.canonical())
    }

    /// Field spellings tried by [`resolve`], highest priority first.
    pub fn candidates(self) -> &'static [String] {
        ALIAS_TABLE.get(&self).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Spellings produced by older producers that no suffix transform can derive.
    fn legacy_aliases(self) -> &'static [&'static str] {
        match self {
            Nutrient::Calories => &["total_calories_kcal", "calories_kcal", "energy_kcal", "kcal"],
            Nutrient::Carbs => &["carbohydrates_g", "carbohydrate_g", "carbohydrates"],
            Nutrient::Fat => &["total_fat_g"],
            Nutrient::Fiber => &["dietary_fiber_g", "fibre_g"],
            Nutrient::Sugar => &["sugars_g", "total_sugars_g"],
            Nutrient::SaturatedFat => &["sat_fat_g"],
            Nutrient::Folate => &["folic_acid_mcg"],
            _ => &[],
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown nutrient field: {0}")]
pub struct UnknownNutrient(pub String);

impl FromStr for Nutrient {
    type Err = UnknownNutrient;

    /// Accepts any spelling from the alias table, so loosely named inputs still
    /// land on the closed set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Nutrient::ALL
            .into_iter()
            .find(|n| n.candidates().iter().any(|c| *c == needle))
            .ok_or_else(|| UnknownNutrient(s.to_string()))
    }
}

lazy_static! {
    static ref UNIT_SUFFIX: Regex = Regex::new(r"_(?:g|mg|mcg|ug|kcal|ml|iu)$").unwrap();

    static ref SHORT_NAMES: HashMap<Nutrient, String> = Nutrient::ALL
        .into_iter()
        .map(|n| (n, UNIT_SUFFIX.replace(n.canonical(), "").into_owned()))
        .collect();

    /// Exact canonical name first, then its unit-stripped variants, then legacy
    /// spellings (each followed by its own stripped form).
    static ref ALIAS_TABLE: HashMap<Nutrient, Vec<String>> = Nutrient::ALL
        .into_iter()
        .map(|n| {
            let mut names: Vec<String> = Vec::new();
            for name in std::iter::once(n.canonical()).chain(n.legacy_aliases().iter().copied()) {
                for variant in unit_variants(name) {
                    if !names.contains(&variant) {
                        names.push(variant);
                    }
                }
            }
            (n, names)
        })
        .collect();
}

/// `name`, then `name` without its `_unit` suffix.
fn unit_variants(name: &str) -> Vec<String> {
    let stripped = UNIT_SUFFIX.replace(name, "").into_owned();
    if stripped == name {
        vec![stripped]
    } else {
        vec![name.to_string(), stripped]
    }
}

/// A loosely shaped nutrient payload: AI output, an edited ingredient or a legacy row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NutrientRecord(Map<String, Value>);

impl NutrientRecord {
    /// Objects are taken as-is, strings are decoded as JSON objects. Anything
    /// else, including undecodable text, yields an empty record.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(map.clone()),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Self(map),
                _ => Self::default(),
            },
            _ => Self::default(),
        }
    }

    pub fn from_totals(totals: &NutrientTotals) -> Self {
        let map = totals
            .iter()
            .map(|(n, v)| (n.canonical().to_string(), Value::from(v)))
            .collect();
        Self(map)
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Resolves one nutrient from a record by walking its alias candidates.
///
/// The first candidate holding a positive number (or a string that parses to
/// one) wins and is rounded to the nearest integer. Zero, negative and
/// non-numeric values count as absent, so a real zero is indistinguishable
/// from a missing field. Nothing resolvable yields `0.0`.
pub fn resolve(record: &NutrientRecord, nutrient: Nutrient) -> f64 {
    nutrient
        .candidates()
        .iter()
        .find_map(|name| record.raw(name).and_then(positive_number))
        .unwrap_or(0.0)
}

fn positive_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then(|| n.round())
}

/// Per-nutrient amounts, every tracked nutrient always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NutrientTotals(BTreeMap<Nutrient, f64>);

impl Default for NutrientTotals {
    fn default() -> Self {
        Self(Nutrient::ALL.into_iter().map(|n| (n, 0.0)).collect())
    }
}

impl NutrientTotals {
    pub fn resolved(record: &NutrientRecord) -> Self {
        Self(
            Nutrient::ALL
                .into_iter()
                .map(|n| (n, resolve(record, n)))
                .collect(),
        )
    }

    pub fn get(&self, nutrient: Nutrient) -> f64 {
        self.0.get(&nutrient).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, nutrient: Nutrient, value: f64) {
        self.0.insert(nutrient, value);
    }

    pub fn add(&mut self, nutrient: Nutrient, value: f64) {
        *self.0.entry(nutrient).or_insert(0.0) += value;
    }

    pub fn accumulate(&mut self, other: &NutrientTotals) {
        for (n, v) in other.iter() {
            self.add(n, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, f64)> + '_ {
        self.0.iter().map(|(n, v)| (*n, *v))
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self(self.0.iter().map(|(n, v)| (*n, f(*v))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> NutrientRecord {
        NutrientRecord::from_value(&v)
    }

    #[test]
    fn canonical_name_wins_over_aliases() {
        let r = record(json!({ "protein": 3, "protein_g": 12.4 }));
        assert_eq!(resolve(&r, Nutrient::Protein), 12.0);
    }

    #[test]
    fn falls_back_to_short_alias() {
        let r = record(json!({ "protein": 6 }));
        assert_eq!(resolve(&r, Nutrient::Protein), 6.0);
    }

    #[test]
    fn zero_alias_continues_to_next_candidate() {
        let r = record(json!({ "calories": 0, "total_calories_kcal": 512.6 }));
        assert_eq!(resolve(&r, Nutrient::Calories), 513.0);
    }

    #[test]
    fn numeric_strings_are_parsed_and_rounded() {
        let r = record(json!({ "sodium_mg": " 230.5 " }));
        assert_eq!(resolve(&r, Nutrient::Sodium), 231.0);
    }

    #[test]
    fn negative_and_garbage_values_resolve_to_zero() {
        let r = record(json!({ "fat_g": -4, "fat": "lots", "total_fat_g": null }));
        assert_eq!(resolve(&r, Nutrient::Fat), 0.0);
        assert_eq!(resolve(&NutrientRecord::default(), Nutrient::Fiber), 0.0);
    }

    #[test]
    fn legacy_spellings_are_unit_stripped_too() {
        let r = record(json!({ "carbohydrates": 40 }));
        assert_eq!(resolve(&r, Nutrient::Carbs), 40.0);
        let r = record(json!({ "energy": 300 }));
        assert_eq!(resolve(&r, Nutrient::Calories), 300.0);
    }

    #[test]
    fn candidates_start_with_canonical_name() {
        for n in Nutrient::ALL {
            assert_eq!(n.candidates()[0], n.canonical());
        }
        assert_eq!(
            Nutrient::Protein.candidates(),
            &["protein_g".to_string(), "protein".to_string()]
        );
    }

    #[test]
    fn short_names_drop_units() {
        assert_eq!(Nutrient::Sodium.short_name(), "sodium");
        assert_eq!(Nutrient::VitaminB12.short_name(), "vitamin_b12");
        assert_eq!(Nutrient::Calories.short_name(), "calories");
    }

    #[test]
    fn parses_any_known_spelling() {
        assert_eq!("protein".parse::<Nutrient>().unwrap(), Nutrient::Protein);
        assert_eq!("Sugars_G".parse::<Nutrient>().unwrap(), Nutrient::Sugar);
        assert_eq!("kcal".parse::<Nutrient>().unwrap(), Nutrient::Calories);
        assert!("caffeine_mg".parse::<Nutrient>().is_err());
    }

    #[test]
    fn totals_serialize_with_canonical_keys() {
        let mut totals = NutrientTotals::default();
        totals.set(Nutrient::Protein, 10.0);
        let v = serde_json::to_value(&totals).unwrap();
        assert_eq!(v["protein_g"], json!(10.0));
        assert_eq!(v.as_object().unwrap().len(), Nutrient::ALL.len());
    }
}
