//! # Recipe Selection
//!
//! Recipes arrive from the generator with their own `missingItems` and
//! `availablePercentage`. These are recomputed here from the local stock and the
//! recipes are filtered by the user's preferences.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::availability::{evaluate, AggregatedStock};
use crate::config::DEFAULT_MAX_MISSING_PERCENTAGE;
use crate::pantry_model::{DietaryProfile, Difficulty, Recipe};

/// User preferences for suggested recipes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeFilters {
    /// Minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prep_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    /// Every tag must be present on the recipe
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dietary_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_missing_percentage: Option<u8>,
    /// Recipes using an allergen or avoided ingredient are dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_profile: Option<DietaryProfile>,
}

impl RecipeFilters {
    /// Largest accepted share of missing ingredients
    pub fn missing_limit(&self) -> u8 {
        self.max_missing_percentage.unwrap_or(DEFAULT_MAX_MISSING_PERCENTAGE)
    }

    /// Whether an (annotated) recipe satisfies every filter
    pub fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(max) = self.max_prep_time {
            if recipe.prep_time > max {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if recipe.difficulty != difficulty {
                return false;
            }
        }
        if let Some(cuisine) = &self.cuisine {
            let matches_cuisine = recipe
                .cuisine
                .as_ref()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case(cuisine.trim()));
            if !matches_cuisine {
                return false;
            }
        }
        let has_all_tags = self.dietary_tags.iter().all(|wanted| {
            recipe
                .dietary_tags
                .iter()
                .any(|tag| tag.trim().eq_ignore_ascii_case(wanted.trim()))
        });
        if !has_all_tags {
            return false;
        }
        if let Some(ingredient) = self
            .dietary_profile
            .as_ref()
            .and_then(|profile| profile.conflicting_ingredient(recipe))
        {
            debug!("Dropping '{}': contains {}", recipe.name, ingredient.name);
            return false;
        }

        100u8.saturating_sub(recipe.available_percentage) <= self.missing_limit()
    }
}

/// Replace a recipe's availability figures with ones computed from stock
pub fn annotate_with_availability(mut recipe: Recipe, stock: &AggregatedStock) -> Recipe {
    let result = evaluate(&recipe.ingredients, stock);
    recipe.missing_items = result.missing_items;
    recipe.available_percentage = result.available_percentage;
    recipe
}

/// Annotate, filter and order recipes by descending availability
pub fn select_recipes(recipes: Vec<Recipe>, stock: &AggregatedStock, filters: &RecipeFilters) -> Vec<Recipe> {
    let total = recipes.len();
    let mut selected: Vec<Recipe> = recipes
        .into_iter()
        .map(|recipe| annotate_with_availability(recipe, stock))
        .filter(|recipe| filters.matches(recipe))
        .collect();

    selected.sort_by(|a, b| b.available_percentage.cmp(&a.available_percentage));
    debug!("Selected {} of {} recipes", selected.len(), total);
    selected
}
