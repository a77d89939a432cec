//! # Meal Planning
//!
//! Validates meal plan requests, splits long plans into weekly generation
//! chunks and merges the chunk results back into one plan with a single
//! shopping list.
//!
//! Recipe generation itself is supplied by the caller as an async closure, one
//! call per chunk, awaited in date order.

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::config::PlannerConfig;
use crate::errors::PantryError;
use crate::pantry_model::{MealPlanConfig, PantryItem, PlannedMeal, ShoppingListItem};
use crate::units::{compatible, convert};

/// Dates covered by one generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChunk {
    /// The request config narrowed to this chunk's dates
    pub config: MealPlanConfig,
    pub dates: Vec<NaiveDate>,
}

impl PlanChunk {
    pub fn meal_count(&self) -> usize {
        self.dates.len() * self.config.meal_types.len()
    }
}

/// Meals and shopping list produced for one chunk
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChunkResult {
    pub meals: Vec<PlannedMeal>,
    #[serde(default)]
    pub shopping_list: Vec<ShoppingListItem>,
}

/// A complete, not yet saved meal plan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanDraft {
    pub meals: Vec<PlannedMeal>,
    pub shopping_list: Vec<ShoppingListItem>,
}

/// Number of days between two dates, both inclusive
pub fn count_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Every date from `start` to `end`, inclusive; empty when `end < start`
pub fn dates_in_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        dates.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    dates
}

/// Check a plan request before any generation is attempted
pub fn validate_plan_request(
    config: &MealPlanConfig,
    pantry_items: &[PantryItem],
    planner: &PlannerConfig,
) -> Result<(), PantryError> {
    if pantry_items.is_empty() {
        return Err(PantryError::Validation("pantry items are required".to_string()));
    }
    if config.end_date < config.start_date {
        return Err(PantryError::Validation(
            "end date must not be before start date".to_string(),
        ));
    }
    if config.meal_types.is_empty() {
        return Err(PantryError::Validation("at least one meal type is required".to_string()));
    }
    if config.servings == 0 {
        return Err(PantryError::Validation("servings must be at least 1".to_string()));
    }

    let days = count_days(config.start_date, config.end_date);
    if days > i64::from(planner.max_days) {
        return Err(PantryError::Validation(format!(
            "plan cannot exceed {} days (requested {})",
            planner.max_days, days
        )));
    }

    Ok(())
}

/// Split a plan into generation chunks.
///
/// Plans with more than `chunk_threshold_meals` meals are split into
/// `chunk_days`-day chunks; smaller plans are a single chunk.
pub fn plan_chunks(config: &MealPlanConfig, planner: &PlannerConfig) -> Vec<PlanChunk> {
    let dates = dates_in_range(config.start_date, config.end_date);
    if dates.is_empty() {
        return Vec::new();
    }

    let total_meals = dates.len() * config.meal_types.len();
    if total_meals <= planner.chunk_threshold_meals {
        return vec![PlanChunk {
            config: config.clone(),
            dates,
        }];
    }

    dates
        .chunks(planner.chunk_days.max(1))
        .map(|chunk_dates| {
            let mut chunk_config = config.clone();
            chunk_config.start_date = chunk_dates[0];
            chunk_config.end_date = chunk_dates[chunk_dates.len() - 1];
            PlanChunk {
                config: chunk_config,
                dates: chunk_dates.to_vec(),
            }
        })
        .collect()
}

/// Merge one shopping line into a list.
///
/// Lines match by lowercase name and compatible unit; the incoming quantities
/// are converted into the existing line's unit, `quantity` and `to_buy` are
/// summed and the first `available` is kept.
pub fn merge_shopping_item(list: &mut Vec<ShoppingListItem>, item: &ShoppingListItem) {
    let key = item.name.to_lowercase();
    let existing = list
        .iter_mut()
        .find(|line| line.name.to_lowercase() == key && compatible(&line.unit, &item.unit));

    match existing {
        Some(line) => {
            let quantity = convert(item.quantity, &item.unit, &line.unit).unwrap_or(item.quantity);
            let to_buy = convert(item.to_buy, &item.unit, &line.unit).unwrap_or(item.to_buy);
            line.quantity += quantity;
            line.to_buy += to_buy;
        }
        None => list.push(item.clone()),
    }
}

/// Concatenate chunk meals and merge their shopping lists
pub fn merge_chunk_results(results: Vec<PlanChunkResult>) -> MealPlanDraft {
    let mut draft = MealPlanDraft::default();

    for result in results {
        draft.meals.extend(result.meals);
        for item in &result.shopping_list {
            merge_shopping_item(&mut draft.shopping_list, item);
        }
    }

    draft
}

/// Validate, chunk, generate each chunk in order and merge the results.
///
/// The first generator error aborts the plan.
pub async fn generate_plan<F, Fut>(
    config: &MealPlanConfig,
    pantry_items: &[PantryItem],
    planner: &PlannerConfig,
    mut generate: F,
) -> Result<MealPlanDraft, PantryError>
where
    F: FnMut(PlanChunk) -> Fut,
    Fut: Future<Output = Result<PlanChunkResult, PantryError>>,
{
    validate_plan_request(config, pantry_items, planner)?;

    let chunks = plan_chunks(config, planner);
    let days = count_days(config.start_date, config.end_date);
    info!(
        "Plan: {} days, {} meals/day = {} total meals in {} request(s)",
        days,
        config.meal_types.len(),
        days * config.meal_types.len() as i64,
        chunks.len()
    );

    let mut results = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let start = chunk.config.start_date;
        let result = generate(chunk).await.map_err(|e| {
            PantryError::Plan(format!("generation failed for chunk starting {start}: {e}"))
        })?;
        results.push(result);
    }

    let draft = merge_chunk_results(results);
    info!(
        "Generated plan with {} meals and {} shopping items",
        draft.meals.len(),
        draft.shopping_list.len()
    );
    Ok(draft)
}
