//! # Pantry Data Model
//!
//! This module defines the records the engine works on: pantry stock entries,
//! recipe ingredients, recipes and meal plans. Field names serialize in
//! camelCase so recipe and meal-plan payloads produced by the recipe generator
//! deserialize directly.
//!
//! ## Core Concepts
//!
//! - **PantryItem**: one stock entry (name, quantity, unit, optional expiration)
//!   owned by a pantry container
//! - **RecipeIngredient**: a named quantity requirement of a recipe
//! - **Recipe**: a generated recipe with its availability figures
//! - **MealPlan**: recipes scheduled per date and meal type, plus a shopping list
//!
//! ## Usage
//!
//! ```rust
//! use pantry::pantry_model::{PantryItem, RecipeIngredient};
//!
//! let milk = PantryItem::new("Leche", 2.0, "L").in_pantry(1);
//! let needed = RecipeIngredient::new("leche", 500.0, "ml");
//!
//! assert_eq!(milk.name_key(), needed.name_key());
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::PantryError;
use crate::units::format_quantity;

/// Maximum accepted length for item and recipe names
pub const MAX_NAME_LENGTH: usize = 255;

/// Food categories a pantry item can be filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Frutas,
    Verduras,
    Lacteos,
    Carnes,
    Mariscos,
    Granos,
    Enlatados,
    Condimentos,
    Bebidas,
    Snacks,
    Panaderia,
    Congelados,
    Huevos,
    Aceites,
    Otros,
}

/// A pantry container ("Despensa principal", "Freezer", ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pantry {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// One stock entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    /// Storage identity, `None` until persisted
    #[serde(default)]
    pub id: Option<i64>,
    /// Owning pantry container
    #[serde(default)]
    pub pantry_id: Option<i64>,
    /// Display name; matched case-insensitively
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FoodCategory>,
    pub quantity: f64,
    /// Unit token ("unidades", "kg", "L", "g", ...)
    pub unit: String,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl PantryItem {
    /// Create an unsaved stock entry
    pub fn new(name: &str, quantity: f64, unit: &str) -> Self {
        Self {
            id: None,
            pantry_id: None,
            name: name.to_string(),
            brand: None,
            category: None,
            quantity,
            unit: unit.to_string(),
            expiration_date: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn in_pantry(mut self, pantry_id: i64) -> Self {
        self.pantry_id = Some(pantry_id);
        self
    }

    pub fn with_brand(mut self, brand: &str) -> Self {
        self.brand = Some(brand.to_string());
        self
    }

    pub fn with_category(mut self, category: FoodCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Case-insensitive identity key used to match stock against ingredients
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Reject blank names and negative or non-finite quantities
    pub fn validate(&self) -> Result<(), PantryError> {
        validate_entry("pantry item", &self.name, self.quantity)
    }
}

/// A named quantity requirement of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

impl RecipeIngredient {
    pub fn new(name: &str, quantity: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
        }
    }

    /// Case-insensitive identity key
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn validate(&self) -> Result<(), PantryError> {
        validate_entry("ingredient", &self.name, self.quantity)
    }
}

impl fmt::Display for RecipeIngredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", format_quantity(self.quantity), self.unit, self.name)
    }
}

fn validate_entry(kind: &str, name: &str, quantity: f64) -> Result<(), PantryError> {
    if name.trim().is_empty() {
        return Err(PantryError::Validation(format!("{kind} name must not be empty")));
    }
    if !quantity.is_finite() {
        return Err(PantryError::Validation(format!("{kind} '{name}' has a non-finite quantity")));
    }
    if quantity < 0.0 {
        return Err(PantryError::Validation(format!(
            "{kind} '{name}' has a negative quantity ({quantity})"
        )));
    }
    Ok(())
}

/// Validates a user supplied name (item, recipe or pantry)
pub fn validate_item_name(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Carbohydrates {
    pub total: f64,
    pub fiber: f64,
    pub sugar: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fats {
    pub total: f64,
    pub saturated: f64,
    pub unsaturated: f64,
}

/// Estimated nutrition per serving
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionalInfo {
    pub calories: f64,
    pub protein: f64,
    pub carbs: Carbohydrates,
    pub fat: Fats,
    pub sodium: f64,
}

/// A generated recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub steps: Vec<String>,
    /// Minutes
    #[serde(default)]
    pub prep_time: u32,
    /// Minutes
    #[serde(default)]
    pub cook_time: u32,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default = "default_servings")]
    pub servings: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    #[serde(default)]
    pub missing_items: Vec<RecipeIngredient>,
    #[serde(default)]
    pub available_percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionalInfo>,
}

fn default_difficulty() -> Difficulty {
    Difficulty::Medium
}

fn default_servings() -> u32 {
    1
}

impl Recipe {
    /// Create a recipe with just a name and its ingredients
    pub fn new(name: &str, ingredients: Vec<RecipeIngredient>) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            description: String::new(),
            ingredients,
            steps: Vec::new(),
            prep_time: 0,
            cook_time: 0,
            difficulty: Difficulty::Medium,
            servings: 1,
            cuisine: None,
            dietary_tags: Vec::new(),
            missing_items: Vec::new(),
            available_percentage: 0,
            nutrition: None,
        }
    }

    /// Total time in minutes
    pub fn total_time(&self) -> u32 {
        self.prep_time + self.cook_time
    }
}

/// A recipe kept in the owner's collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecipe {
    #[serde(default)]
    pub id: Option<i64>,
    pub recipe: Recipe,
    pub saved_at: DateTime<Utc>,
}

/// Diet, allergies and ingredients the owner does not want in recipes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietaryProfile {
    #[serde(default)]
    pub diet_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub avoid_ingredients: Vec<String>,
}

impl DietaryProfile {
    /// Lowercased allergy and avoid terms, blanks skipped
    pub fn excluded_terms(&self) -> Vec<String> {
        self.allergies
            .iter()
            .chain(&self.avoid_ingredients)
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect()
    }

    /// First ingredient whose name contains an excluded term
    pub fn conflicting_ingredient<'a>(&self, recipe: &'a Recipe) -> Option<&'a RecipeIngredient> {
        let terms = self.excluded_terms();
        if terms.is_empty() {
            return None;
        }
        recipe.ingredients.iter().find(|ingredient| {
            let key = ingredient.name_key();
            terms.iter().any(|term| key.contains(term.as_str()))
        })
    }

    pub fn allows(&self, recipe: &Recipe) -> bool {
        self.conflicting_ingredient(recipe).is_none()
    }
}

/// A recipe that was cooked, kept as history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookedRecipe {
    pub recipe_name: String,
    pub ingredients: Vec<RecipeIngredient>,
    pub cooked_at: DateTime<Utc>,
}

/// Meal slots of a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealType {
    #[serde(rename = "desayuno")]
    Breakfast,
    #[serde(rename = "almuerzo")]
    Lunch,
    #[serde(rename = "once")]
    AfternoonTea,
    #[serde(rename = "cena")]
    Dinner,
    #[serde(rename = "merienda")]
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 5] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::AfternoonTea,
        MealType::Dinner,
        MealType::Snack,
    ];

    /// Wire token of this meal type
    pub fn token(&self) -> &'static str {
        match self {
            MealType::Breakfast => "desayuno",
            MealType::Lunch => "almuerzo",
            MealType::AfternoonTea => "once",
            MealType::Dinner => "cena",
            MealType::Snack => "merienda",
        }
    }

    /// Parse a wire token, case-insensitively
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase();
        Self::ALL.into_iter().find(|meal| meal.token() == token)
    }
}

/// Parameters of a meal plan request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub meal_types: Vec<MealType>,
    /// Servings per meal
    pub servings: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMeal {
    pub recipe: Recipe,
    pub meal_type: MealType,
    pub date: NaiveDate,
}

/// One line of a shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingListItem {
    pub name: String,
    /// Total quantity needed
    pub quantity: f64,
    pub unit: String,
    /// Quantity already in stock
    #[serde(default)]
    pub available: f64,
    /// Quantity to buy
    #[serde(default)]
    pub to_buy: f64,
}

/// A saved meal plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    #[serde(default)]
    pub id: Option<i64>,
    pub config: MealPlanConfig,
    pub meals: Vec<PlannedMeal>,
    pub shopping_list: Vec<ShoppingListItem>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pantry_item_builder() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let item = PantryItem::new("Leche", 2.0, "L")
            .with_id(7)
            .in_pantry(1)
            .with_brand("Colun")
            .with_category(FoodCategory::Lacteos)
            .with_expiration(date);

        assert_eq!(item.id, Some(7));
        assert_eq!(item.pantry_id, Some(1));
        assert_eq!(item.brand.as_deref(), Some("Colun"));
        assert_eq!(item.category, Some(FoodCategory::Lacteos));
        assert_eq!(item.expiration_date, Some(date));
        assert_eq!(item.name_key(), "leche");
    }

    #[test]
    fn test_validation() {
        assert!(PantryItem::new("Arroz", 1.0, "kg").validate().is_ok());
        assert!(PantryItem::new("Arroz", 0.0, "kg").validate().is_ok());
        assert!(PantryItem::new("  ", 1.0, "kg").validate().is_err());
        assert!(PantryItem::new("Arroz", -1.0, "kg").validate().is_err());
        assert!(RecipeIngredient::new("Sal", f64::NAN, "g").validate().is_err());
    }

    #[test]
    fn test_item_name_validation() {
        assert_eq!(validate_item_name("  Aceite de oliva "), Ok("Aceite de oliva".to_string()));
        assert_eq!(validate_item_name("   "), Err("empty"));
        assert_eq!(validate_item_name(&"a".repeat(256)), Err("too_long"));
    }

    #[test]
    fn test_recipe_deserializes_from_generator_payload() {
        let payload = r#"{
            "id": "r1",
            "name": "Arroz con leche",
            "ingredients": [
                { "name": "Arroz", "quantity": 200, "unit": "g" },
                { "name": "Leche", "quantity": 1, "unit": "L" }
            ],
            "steps": ["Hervir", "Servir"],
            "prepTime": 5,
            "cookTime": 40,
            "difficulty": "easy",
            "servings": 4,
            "missingItems": [],
            "availablePercentage": 100
        }"#;

        let recipe: Recipe = serde_json::from_str(payload).unwrap();
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.difficulty, Difficulty::Easy);
        assert_eq!(recipe.total_time(), 45);
        assert_eq!(recipe.available_percentage, 100);
        assert!(recipe.nutrition.is_none());
    }

    #[test]
    fn test_dietary_profile_exclusions() {
        let recipe = Recipe::new(
            "Queque de nueces",
            vec![
                RecipeIngredient::new("Harina", 300.0, "g"),
                RecipeIngredient::new("Nueces picadas", 100.0, "g"),
            ],
        );

        assert!(DietaryProfile::default().allows(&recipe));

        let allergic = DietaryProfile {
            allergies: vec![" Nueces ".to_string()],
            ..Default::default()
        };
        assert_eq!(allergic.conflicting_ingredient(&recipe).map(|i| i.name.as_str()), Some("Nueces picadas"));

        let avoids = DietaryProfile {
            diet_type: Some("vegetariano".to_string()),
            avoid_ingredients: vec!["cilantro".to_string(), "".to_string()],
            ..Default::default()
        };
        assert!(avoids.allows(&recipe));
        assert_eq!(avoids.excluded_terms(), vec!["cilantro".to_string()]);
    }

    #[test]
    fn test_meal_type_tokens() {
        assert_eq!(MealType::from_token("Cena"), Some(MealType::Dinner));
        assert_eq!(MealType::from_token("once"), Some(MealType::AfternoonTea));
        assert_eq!(MealType::from_token("brunch"), None);
        assert_eq!(serde_json::to_string(&MealType::Breakfast).unwrap(), "\"desayuno\"");
    }

    #[test]
    fn test_pantry_item_json_shape() {
        let item = PantryItem::new("Arroz", 1.0, "kg")
            .with_expiration(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["expirationDate"], "2025-06-30");
        assert_eq!(json["unit"], "kg");
        assert!(json.get("brand").is_none());
    }

    #[test]
    fn test_ingredient_display() {
        assert_eq!(RecipeIngredient::new("Arroz", 1.0, "kg").to_string(), "1 kg Arroz");
        assert_eq!(RecipeIngredient::new("Leche", 0.5, "L").to_string(), "0.5 L Leche");
    }
}
