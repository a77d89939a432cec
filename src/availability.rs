//! # Availability Calculator
//!
//! Given a recipe's ingredient list and the current pantry stock, this module
//! determines which ingredients cannot be fully supplied and what share of the
//! recipe is covered.
//!
//! ## Algorithm
//!
//! 1. Stock is aggregated by lowercase name. Every entry is normalized through
//!    [`crate::units::normalize`] and summed with the entries of the same name
//!    whose unit is compatible.
//! 2. An ingredient is missing when no stock of that name exists, when the stock
//!    unit is not compatible with the required unit, or when the stock is lower
//!    than the normalized requirement. There is no partial deduction: a small
//!    shortfall still marks the ingredient as missing.
//! 3. `available_percentage = round((total - missing) / total * 100)`, or `0`
//!    for an empty ingredient list.
//!
//! ## Aggregation policies
//!
//! A name recorded once in grams and once in `paquetes` cannot be summed.
//! [`AggregationPolicy::FirstUnitWins`] keeps the first entry's unit and drops
//! the later conflicting entries, reporting each one as a [`UnitConflict`].
//! [`AggregationPolicy::SplitByDimension`] keeps one sub-total per
//! compatibility class so no stock is lost.
//!
//! ## Usage
//!
//! ```rust
//! use pantry::availability::calculate_availability;
//! use pantry::pantry_model::{PantryItem, RecipeIngredient};
//!
//! let pantry = vec![PantryItem::new("Leche", 2.0, "L")];
//! let recipe = vec![RecipeIngredient::new("Leche", 500.0, "ml")];
//!
//! let result = calculate_availability(&recipe, &pantry);
//! assert!(result.missing_items.is_empty());
//! assert_eq!(result.available_percentage, 100);
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::config::AvailabilityConfig;
use crate::errors::PantryError;
use crate::localization::LocalizationManager;
use crate::pantry_model::{PantryItem, RecipeIngredient};
use crate::units::{compatible, convert, format_quantity, normalize};

/// How same-named stock entries with incompatible units are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Keep the first entry's unit, drop later incompatible entries
    FirstUnitWins,
    /// Keep a separate sub-total per compatibility class
    #[default]
    SplitByDimension,
}

impl FromStr for AggregationPolicy {
    type Err = PantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first-unit" | "first-unit-wins" => Ok(AggregationPolicy::FirstUnitWins),
            "split" | "split-by-dimension" => Ok(AggregationPolicy::SplitByDimension),
            other => Err(PantryError::Config(format!("unknown aggregation policy '{other}'"))),
        }
    }
}

/// Result of an availability calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    /// Ingredients not fully covered by stock, in recipe order
    pub missing_items: Vec<RecipeIngredient>,
    /// Share of ingredients fully covered, 0..=100
    pub available_percentage: u8,
}

/// A stock entry left out of the aggregate because its unit could not be
/// reconciled with the first entry of the same name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitConflict {
    pub name: String,
    /// Normalized unit of the aggregate that was kept
    pub kept_unit: String,
    pub dropped_quantity: f64,
    pub dropped_unit: String,
}

/// How far stock falls short of one missing ingredient, in the ingredient's unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortfall {
    pub ingredient: RecipeIngredient,
    /// Compatible stock on hand (0 when none or incompatible)
    pub available: f64,
    /// Quantity still to acquire
    pub missing: f64,
}

/// Full outcome of a checked calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    #[serde(flatten)]
    pub result: AvailabilityResult,
    pub shortfalls: Vec<Shortfall>,
    pub conflicts: Vec<UnitConflict>,
}

impl AvailabilityReport {
    /// Localized "missing" line, `None` when nothing is missing
    pub fn describe_missing(&self, localization: &LocalizationManager, language: &str) -> Option<String> {
        if self.result.missing_items.is_empty() {
            return None;
        }
        let items = self
            .result
            .missing_items
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Some(localization.get_message_with_args("availability-missing", language, &[("items", items.as_str())]))
    }

    /// One localized line per stock entry left out of the aggregate
    pub fn describe_conflicts(&self, localization: &LocalizationManager, language: &str) -> Vec<String> {
        self.conflicts
            .iter()
            .map(|conflict| {
                let quantity = format_quantity(conflict.dropped_quantity);
                localization.get_message_with_args(
                    "availability-conflict",
                    language,
                    &[
                        ("name", conflict.name.as_str()),
                        ("quantity", quantity.as_str()),
                        ("unit", conflict.dropped_unit.as_str()),
                        ("kept", conflict.kept_unit.as_str()),
                    ],
                )
            })
            .collect()
    }
}

/// A normalized running total of stock
#[derive(Debug, Clone, PartialEq)]
pub struct StockTotal {
    pub quantity: f64,
    pub unit: String,
}

/// Pantry stock aggregated by lowercase name
#[derive(Debug, Clone, Default)]
pub struct AggregatedStock {
    totals: HashMap<String, Vec<StockTotal>>,
    conflicts: Vec<UnitConflict>,
}

impl AggregatedStock {
    /// All sub-totals recorded for a name (case-insensitive)
    pub fn totals_for(&self, name: &str) -> &[StockTotal] {
        self.totals
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any stock of this name exists, whatever its unit
    pub fn contains(&self, name: &str) -> bool {
        !self.totals_for(name).is_empty()
    }

    /// Normalized sub-total of `name` that is compatible with `unit`
    pub fn compatible_total(&self, name: &str, unit: &str) -> Option<&StockTotal> {
        self.totals_for(name)
            .iter()
            .find(|total| compatible(&total.unit, unit))
    }

    /// Stock of `name` expressed in `unit`, `None` when nothing compatible exists
    pub fn available_in(&self, name: &str, unit: &str) -> Option<f64> {
        self.compatible_total(name, unit)
            .and_then(|total| convert(total.quantity, &total.unit, unit))
    }

    /// Entries dropped during aggregation
    pub fn conflicts(&self) -> &[UnitConflict] {
        &self.conflicts
    }

    /// Number of distinct names in stock
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

/// Aggregate pantry stock by lowercase name under the given policy
pub fn aggregate_pantry(pantry_items: &[PantryItem], policy: AggregationPolicy) -> AggregatedStock {
    let mut stock = AggregatedStock::default();

    for item in pantry_items {
        let normalized = normalize(item.quantity, &item.unit);
        let totals = stock.totals.entry(item.name_key()).or_default();

        if let Some(total) = totals
            .iter_mut()
            .find(|total| compatible(&total.unit, &normalized.unit))
        {
            total.quantity += normalized.quantity;
            continue;
        }

        let kept_unit = totals.first().map(|first| first.unit.clone());
        match (policy, kept_unit) {
            (AggregationPolicy::FirstUnitWins, Some(kept_unit)) => {
                warn!(
                    "Dropping '{}' ({} {}) from stock: unit is not compatible with '{}'",
                    item.name, item.quantity, item.unit, kept_unit
                );
                stock.conflicts.push(UnitConflict {
                    name: item.name.clone(),
                    kept_unit,
                    dropped_quantity: item.quantity,
                    dropped_unit: item.unit.clone(),
                });
            }
            _ => totals.push(StockTotal {
                quantity: normalized.quantity,
                unit: normalized.unit,
            }),
        }
    }

    stock
}

/// Percentage of satisfiable ingredients, rounded half-up; 0 for an empty recipe
pub fn available_percentage(total: usize, missing: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let available = total.saturating_sub(missing);
    ((available as f64 / total as f64) * 100.0).round() as u8
}

/// Whether stock fully covers one ingredient
pub fn is_covered(ingredient: &RecipeIngredient, stock: &AggregatedStock) -> bool {
    match stock.compatible_total(&ingredient.name, &ingredient.unit) {
        Some(total) => total.quantity >= normalize(ingredient.quantity, &ingredient.unit).quantity,
        None => false,
    }
}

/// Determine missing ingredients and availability against pre-aggregated stock
pub fn evaluate(ingredients: &[RecipeIngredient], stock: &AggregatedStock) -> AvailabilityResult {
    let missing_items: Vec<RecipeIngredient> = ingredients
        .iter()
        .filter(|ingredient| !is_covered(ingredient, stock))
        .cloned()
        .collect();

    let available_percentage = available_percentage(ingredients.len(), missing_items.len());

    debug!(
        "Availability: {} of {} ingredients missing ({}% available)",
        missing_items.len(),
        ingredients.len(),
        available_percentage
    );

    AvailabilityResult {
        missing_items,
        available_percentage,
    }
}

/// Compute missing ingredients and available percentage.
///
/// Total over its inputs: nothing is validated and stock with a unit
/// incompatible with the first entry of its name is dropped.
pub fn calculate_availability(
    ingredients: &[RecipeIngredient],
    pantry_items: &[PantryItem],
) -> AvailabilityResult {
    let stock = aggregate_pantry(pantry_items, AggregationPolicy::FirstUnitWins);
    evaluate(ingredients, &stock)
}

/// Shortfall of each missing ingredient against the stock
pub fn shortfalls(missing: &[RecipeIngredient], stock: &AggregatedStock) -> Vec<Shortfall> {
    missing
        .iter()
        .map(|ingredient| {
            let available = stock
                .available_in(&ingredient.name, &ingredient.unit)
                .unwrap_or(0.0);
            Shortfall {
                ingredient: ingredient.clone(),
                available,
                missing: (ingredient.quantity - available).max(0.0),
            }
        })
        .collect()
}

/// Configurable availability calculator with input validation and reporting
#[derive(Debug, Clone, Default)]
pub struct AvailabilityCalculator {
    config: AvailabilityConfig,
}

impl AvailabilityCalculator {
    pub fn new(config: AvailabilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AvailabilityConfig {
        &self.config
    }

    /// Aggregate stock with the configured policy
    pub fn stock(&self, pantry_items: &[PantryItem]) -> AggregatedStock {
        aggregate_pantry(pantry_items, self.config.aggregation)
    }

    /// Validate inputs (if configured) and produce a full report
    pub fn calculate(
        &self,
        ingredients: &[RecipeIngredient],
        pantry_items: &[PantryItem],
    ) -> Result<AvailabilityReport, PantryError> {
        if self.config.validate_inputs {
            ingredients.iter().try_for_each(RecipeIngredient::validate)?;
            pantry_items.iter().try_for_each(PantryItem::validate)?;
        }

        let stock = self.stock(pantry_items);
        let result = evaluate(ingredients, &stock);
        let shortfalls = shortfalls(&result.missing_items, &stock);

        Ok(AvailabilityReport {
            result,
            shortfalls,
            conflicts: stock.conflicts().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_recipe_is_zero_percent() {
        let pantry = vec![PantryItem::new("Arroz", 1.0, "kg")];
        let result = calculate_availability(&[], &pantry);
        assert!(result.missing_items.is_empty());
        assert_eq!(result.available_percentage, 0);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(available_percentage(3, 1), 67);
        assert_eq!(available_percentage(3, 2), 33);
        assert_eq!(available_percentage(8, 1), 88); // 87.5
        assert_eq!(available_percentage(4, 0), 100);
        assert_eq!(available_percentage(4, 4), 0);
    }

    #[test]
    fn test_aggregation_sums_compatible_entries() {
        let pantry = vec![
            PantryItem::new("Arroz", 500.0, "g"),
            PantryItem::new("arroz", 1.0, "kg"),
        ];
        let stock = aggregate_pantry(&pantry, AggregationPolicy::FirstUnitWins);

        assert_eq!(stock.len(), 1);
        assert_eq!(stock.available_in("ARROZ", "g"), Some(1500.0));
        assert_eq!(stock.available_in("arroz", "kg"), Some(1.5));
        assert!(stock.conflicts().is_empty());
    }

    #[test]
    fn test_first_unit_wins_drops_conflicting_entry() {
        let pantry = vec![
            PantryItem::new("Arroz", 200.0, "g"),
            PantryItem::new("Arroz", 2.0, "paquetes"),
        ];
        let stock = aggregate_pantry(&pantry, AggregationPolicy::FirstUnitWins);

        assert_eq!(stock.totals_for("arroz").len(), 1);
        assert_eq!(stock.available_in("arroz", "paquetes"), None);
        assert_eq!(stock.conflicts().len(), 1);
        assert_eq!(stock.conflicts()[0].kept_unit, "g");
        assert_eq!(stock.conflicts()[0].dropped_unit, "paquetes");
    }

    #[test]
    fn test_split_by_dimension_keeps_both_entries() {
        let pantry = vec![
            PantryItem::new("Arroz", 200.0, "g"),
            PantryItem::new("Arroz", 2.0, "paquetes"),
            PantryItem::new("Arroz", 1.0, "Paquetes"),
        ];
        let stock = aggregate_pantry(&pantry, AggregationPolicy::SplitByDimension);

        assert_eq!(stock.totals_for("arroz").len(), 2);
        assert_eq!(stock.available_in("arroz", "g"), Some(200.0));
        assert_eq!(stock.available_in("arroz", "paquetes"), Some(3.0));
        assert!(stock.conflicts().is_empty());
    }

    #[test]
    fn test_incompatible_units_mark_ingredient_missing() {
        let pantry = vec![PantryItem::new("Huevos", 12.0, "unidades")];
        let recipe = vec![RecipeIngredient::new("Huevos", 100.0, "g")];

        let result = calculate_availability(&recipe, &pantry);
        assert_eq!(result.missing_items, recipe);
        assert_eq!(result.available_percentage, 0);
    }

    #[test]
    fn test_exact_quantity_is_enough() {
        let pantry = vec![PantryItem::new("Azucar", 1.0, "kg")];
        let recipe = vec![RecipeIngredient::new("azucar", 1000.0, "g")];

        let result = calculate_availability(&recipe, &pantry);
        assert!(result.missing_items.is_empty());
    }

    #[test]
    fn test_calculator_rejects_invalid_inputs() {
        let calculator = AvailabilityCalculator::default();
        let pantry = vec![PantryItem::new("Arroz", -1.0, "kg")];
        let recipe = vec![RecipeIngredient::new("Arroz", 1.0, "kg")];

        let result = calculator.calculate(&recipe, &pantry);
        assert!(matches!(result, Err(PantryError::Validation(_))));

        let result = calculator.calculate(&[RecipeIngredient::new("", 1.0, "kg")], &[]);
        assert!(matches!(result, Err(PantryError::Validation(_))));
    }

    #[test]
    fn test_calculator_without_validation_passes_through() {
        let calculator = AvailabilityCalculator::new(AvailabilityConfig {
            validate_inputs: false,
            ..Default::default()
        });
        let pantry = vec![PantryItem::new("Arroz", -1.0, "kg")];
        let recipe = vec![RecipeIngredient::new("Arroz", 1.0, "kg")];

        let report = calculator.calculate(&recipe, &pantry).unwrap();
        assert_eq!(report.result.missing_items.len(), 1);
    }

    #[test]
    fn test_report_quantifies_shortfall() {
        let calculator = AvailabilityCalculator::default();
        let pantry = vec![PantryItem::new("Arroz", 200.0, "g")];
        let recipe = vec![RecipeIngredient::new("Arroz", 1.0, "kg")];

        let report = calculator.calculate(&recipe, &pantry).unwrap();
        assert_eq!(report.shortfalls.len(), 1);
        assert!((report.shortfalls[0].available - 0.2).abs() < 1e-9);
        assert!((report.shortfalls[0].missing - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_report_carries_conflicts_under_first_unit_policy() {
        let calculator = AvailabilityCalculator::new(AvailabilityConfig {
            aggregation: AggregationPolicy::FirstUnitWins,
            ..Default::default()
        });
        let pantry = vec![
            PantryItem::new("Leche", 1.0, "L"),
            PantryItem::new("Leche", 2.0, "botellas"),
        ];
        let recipe = vec![RecipeIngredient::new("Leche", 2.0, "botellas")];

        let report = calculator.calculate(&recipe, &pantry).unwrap();
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.result.available_percentage, 0);

        // The split policy keeps the bottles and satisfies the recipe
        let report = AvailabilityCalculator::default().calculate(&recipe, &pantry).unwrap();
        assert!(report.conflicts.is_empty());
        assert_eq!(report.result.available_percentage, 100);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("split".parse::<AggregationPolicy>().unwrap(), AggregationPolicy::SplitByDimension);
        assert_eq!("First-Unit".parse::<AggregationPolicy>().unwrap(), AggregationPolicy::FirstUnitWins);
        assert!("merge".parse::<AggregationPolicy>().is_err());
    }
}
