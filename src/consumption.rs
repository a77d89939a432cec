//! # Stock Consumption
//!
//! Cooking a recipe removes its ingredients from the pantry. This module turns
//! a recipe and the current stock into a list of [`StockChange`]s; applying
//! them is left to the store or the database.
//!
//! Ingredients listed among the recipe's missing items are skipped. The others
//! are deducted from every same-named entry with a compatible unit, converting
//! between units, soonest-expiring entry first.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::errors::PantryError;
use crate::pantry_model::{CookedRecipe, PantryItem, Recipe, RecipeIngredient};
use crate::units::{compatible, convert};

/// Quantities at or below this are treated as exhausted
const EPSILON: f64 = 1e-9;

/// What happens to a stock entry driven to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroStockPolicy {
    /// Keep the entry with quantity 0
    #[default]
    Keep,
    /// Delete the entry
    Remove,
}

impl FromStr for ZeroStockPolicy {
    type Err = PantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(ZeroStockPolicy::Keep),
            "remove" | "delete" => Ok(ZeroStockPolicy::Remove),
            other => Err(PantryError::Config(format!("unknown zero stock policy '{other}'"))),
        }
    }
}

/// A change to one pantry entry, addressed by its position in the input slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StockChange {
    #[serde(rename_all = "camelCase")]
    Update {
        index: usize,
        item_id: Option<i64>,
        name: String,
        quantity: f64,
    },
    #[serde(rename_all = "camelCase")]
    Remove {
        index: usize,
        item_id: Option<i64>,
        name: String,
    },
}

impl StockChange {
    pub fn index(&self) -> usize {
        match self {
            StockChange::Update { index, .. } | StockChange::Remove { index, .. } => *index,
        }
    }

    pub fn item_id(&self) -> Option<i64> {
        match self {
            StockChange::Update { item_id, .. } | StockChange::Remove { item_id, .. } => *item_id,
        }
    }
}

/// Outcome of cooking a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionPlan {
    pub changes: Vec<StockChange>,
    /// Ingredients (or remainders of them) no compatible stock could cover
    pub unmatched: Vec<RecipeIngredient>,
    pub cooked: CookedRecipe,
}

/// Compute the stock changes for cooking `recipe` at `cooked_at`
pub fn plan_consumption(
    recipe: &Recipe,
    pantry_items: &[PantryItem],
    policy: ZeroStockPolicy,
    cooked_at: DateTime<Utc>,
) -> ConsumptionPlan {
    let skipped: HashSet<String> = recipe
        .missing_items
        .iter()
        .map(RecipeIngredient::name_key)
        .collect();

    let mut remaining: Vec<f64> = pantry_items.iter().map(|item| item.quantity).collect();
    let mut touched: Vec<usize> = Vec::new();
    let mut unmatched = Vec::new();

    for ingredient in &recipe.ingredients {
        if skipped.contains(&ingredient.name_key()) {
            debug!("Skipping missing ingredient '{}'", ingredient.name);
            continue;
        }

        let mut candidates: Vec<usize> = pantry_items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                item.name_key() == ingredient.name_key() && compatible(&item.unit, &ingredient.unit)
            })
            .map(|(index, _)| index)
            .collect();
        // Soonest expiration first, undated entries last; stable for equal dates
        candidates.sort_by_key(|&index| {
            let date = pantry_items[index].expiration_date;
            (date.is_none(), date)
        });

        let mut needed = ingredient.quantity;
        for index in candidates {
            if needed <= EPSILON {
                break;
            }
            let item = &pantry_items[index];
            let Some(on_hand) = convert(remaining[index], &item.unit, &ingredient.unit) else {
                continue;
            };
            if on_hand <= EPSILON {
                continue;
            }

            let used = on_hand.min(needed);
            needed -= used;
            remaining[index] = convert(on_hand - used, &ingredient.unit, &item.unit).unwrap_or(0.0);
            if !touched.contains(&index) {
                touched.push(index);
            }
        }

        if needed > EPSILON {
            unmatched.push(RecipeIngredient::new(&ingredient.name, needed, &ingredient.unit));
        }
    }

    touched.sort_unstable();
    let changes = touched
        .into_iter()
        .map(|index| {
            let item = &pantry_items[index];
            let quantity = if remaining[index] <= EPSILON { 0.0 } else { remaining[index] };
            if quantity == 0.0 && policy == ZeroStockPolicy::Remove {
                StockChange::Remove {
                    index,
                    item_id: item.id,
                    name: item.name.clone(),
                }
            } else {
                StockChange::Update {
                    index,
                    item_id: item.id,
                    name: item.name.clone(),
                    quantity,
                }
            }
        })
        .collect::<Vec<_>>();

    info!(
        "Cooking '{}': {} stock changes, {} ingredients not covered",
        recipe.name,
        changes.len(),
        unmatched.len()
    );

    ConsumptionPlan {
        changes,
        unmatched,
        cooked: CookedRecipe {
            recipe_name: recipe.name.clone(),
            ingredients: recipe.ingredients.clone(),
            cooked_at,
        },
    }
}

/// Apply stock changes to an owned list of items, returning the new list
pub fn apply_changes(pantry_items: &[PantryItem], changes: &[StockChange]) -> Vec<PantryItem> {
    let mut items: Vec<Option<PantryItem>> = pantry_items.iter().cloned().map(Some).collect();

    for change in changes {
        match change {
            StockChange::Update { index, quantity, .. } => {
                if let Some(Some(item)) = items.get_mut(*index) {
                    item.quantity = *quantity;
                }
            }
            StockChange::Remove { index, .. } => {
                if let Some(slot) = items.get_mut(*index) {
                    *slot = None;
                }
            }
        }
    }

    items.into_iter().flatten().collect()
}
