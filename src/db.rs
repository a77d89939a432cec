//! # Database Module
//!
//! PostgreSQL persistence for pantries, pantry items, cooked recipe history,
//! saved recipes, dietary profiles and meal plans. Every row belongs to an
//! owner id.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::consumption::StockChange;
use crate::pantry_model::{
    CookedRecipe, DietaryProfile, FoodCategory, MealPlan, Pantry, PantryItem, Recipe, SavedRecipe,
};
use crate::store::DEFAULT_PANTRY_NAME;

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pantries (
            id BIGSERIAL PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name VARCHAR(255) NOT NULL,
            description TEXT,
            is_default BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create pantries table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pantry_items (
            id BIGSERIAL PRIMARY KEY,
            owner_id TEXT NOT NULL,
            pantry_id BIGINT NOT NULL REFERENCES pantries(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            brand TEXT,
            category TEXT,
            quantity DOUBLE PRECISION NOT NULL CHECK (quantity >= 0),
            unit TEXT NOT NULL,
            expiration_date DATE,
            added_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create pantry_items table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS pantry_items_owner_idx ON pantry_items (owner_id, pantry_id)")
        .execute(pool)
        .await
        .context("Failed to create pantry_items index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS cooked_recipes (
            id BIGSERIAL PRIMARY KEY,
            owner_id TEXT NOT NULL,
            recipe_name VARCHAR(255) NOT NULL,
            ingredients JSONB NOT NULL,
            cooked_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create cooked_recipes table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS meal_plans (
            id BIGSERIAL PRIMARY KEY,
            owner_id TEXT NOT NULL,
            plan JSONB NOT NULL,
            generated_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create meal_plans table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS saved_recipes (
            id BIGSERIAL PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name VARCHAR(255) NOT NULL,
            recipe JSONB NOT NULL,
            saved_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create saved_recipes table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dietary_profiles (
            owner_id TEXT PRIMARY KEY,
            profile JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create dietary_profiles table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

fn row_to_pantry(row: &PgRow) -> Result<Pantry> {
    Ok(Pantry {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_default: row.try_get("is_default")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<PantryItem> {
    let category: Option<String> = row.try_get("category")?;
    let category = category
        .map(|c| serde_json::from_value::<FoodCategory>(serde_json::Value::String(c)))
        .transpose()
        .context("Unknown food category in database")?;

    Ok(PantryItem {
        id: Some(row.try_get("id")?),
        pantry_id: Some(row.try_get("pantry_id")?),
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        category,
        quantity: row.try_get("quantity")?,
        unit: row.try_get("unit")?,
        expiration_date: row.try_get::<Option<NaiveDate>, _>("expiration_date")?,
        added_at: row.try_get::<DateTime<Utc>, _>("added_at")?,
    })
}

fn category_token(category: Option<FoodCategory>) -> Result<Option<String>> {
    let Some(category) = category else {
        return Ok(None);
    };
    match serde_json::to_value(category).context("Failed to serialize food category")? {
        serde_json::Value::String(token) => Ok(Some(token)),
        other => Ok(Some(other.to_string())),
    }
}

/// Get the owner's default pantry, creating it on first use
pub async fn get_or_create_default_pantry(pool: &PgPool, owner_id: &str) -> Result<Pantry> {
    let existing = sqlx::query(
        "SELECT id, name, description, is_default FROM pantries
         WHERE owner_id = $1 AND is_default ORDER BY id LIMIT 1",
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .context("Failed to look up default pantry")?;

    if let Some(row) = existing {
        return row_to_pantry(&row);
    }

    info!("Creating default pantry for owner {}", owner_id);
    let row = sqlx::query(
        "INSERT INTO pantries (owner_id, name, is_default) VALUES ($1, $2, TRUE)
         RETURNING id, name, description, is_default",
    )
    .bind(owner_id)
    .bind(DEFAULT_PANTRY_NAME)
    .fetch_one(pool)
    .await
    .context("Failed to create default pantry")?;

    row_to_pantry(&row)
}

/// Create a non-default pantry
pub async fn create_pantry(pool: &PgPool, owner_id: &str, name: &str, description: Option<&str>) -> Result<Pantry> {
    info!("Creating pantry '{}' for owner {}", name, owner_id);

    let row = sqlx::query(
        "INSERT INTO pantries (owner_id, name, description, is_default) VALUES ($1, $2, $3, FALSE)
         RETURNING id, name, description, is_default",
    )
    .bind(owner_id)
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await
    .context("Failed to insert pantry")?;

    row_to_pantry(&row)
}

/// List an owner's pantries, default first
pub async fn list_pantries(pool: &PgPool, owner_id: &str) -> Result<Vec<Pantry>> {
    let rows = sqlx::query(
        "SELECT id, name, description, is_default FROM pantries
         WHERE owner_id = $1 ORDER BY is_default DESC, id",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("Failed to list pantries")?;

    rows.iter().map(row_to_pantry).collect()
}

/// Delete a non-default pantry, moving its items to the default pantry.
///
/// Returns `false` if the pantry does not exist or is the default one.
pub async fn delete_pantry(pool: &PgPool, owner_id: &str, pantry_id: i64) -> Result<bool> {
    info!("Deleting pantry {} for owner {}", pantry_id, owner_id);

    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let is_default: Option<bool> = sqlx::query_scalar("SELECT is_default FROM pantries WHERE id = $1 AND owner_id = $2")
        .bind(pantry_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to look up pantry")?;

    match is_default {
        None => {
            info!("No pantry found with ID: {}", pantry_id);
            return Ok(false);
        }
        Some(true) => {
            info!("Refusing to delete default pantry {}", pantry_id);
            return Ok(false);
        }
        Some(false) => {}
    }

    sqlx::query(
        "UPDATE pantry_items SET pantry_id = (
             SELECT id FROM pantries WHERE owner_id = $1 AND is_default ORDER BY id LIMIT 1
         )
         WHERE owner_id = $1 AND pantry_id = $2",
    )
    .bind(owner_id)
    .bind(pantry_id)
    .execute(&mut *tx)
    .await
    .context("Failed to move items out of pantry")?;

    sqlx::query("DELETE FROM pantries WHERE id = $1 AND owner_id = $2")
        .bind(pantry_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete pantry")?;

    tx.commit().await.context("Failed to commit pantry deletion")?;
    Ok(true)
}

/// Insert a pantry item; without a pantry id it goes to the default pantry
pub async fn create_item(pool: &PgPool, owner_id: &str, item: &PantryItem) -> Result<PantryItem> {
    let pantry_id = match item.pantry_id {
        Some(id) => id,
        None => get_or_create_default_pantry(pool, owner_id).await?.id,
    };
    info!("Creating pantry item '{}' in pantry {}", item.name, pantry_id);

    let row = sqlx::query(
        "INSERT INTO pantry_items
             (owner_id, pantry_id, name, brand, category, quantity, unit, expiration_date, added_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING id, pantry_id, name, brand, category, quantity, unit, expiration_date, added_at",
    )
    .bind(owner_id)
    .bind(pantry_id)
    .bind(&item.name)
    .bind(&item.brand)
    .bind(category_token(item.category)?)
    .bind(item.quantity)
    .bind(&item.unit)
    .bind(item.expiration_date)
    .bind(item.added_at)
    .fetch_one(pool)
    .await
    .context("Failed to insert pantry item")?;

    let created = row_to_item(&row)?;
    info!("Pantry item created with ID: {:?}", created.id);
    Ok(created)
}

/// Insert several pantry items in one transaction
pub async fn create_items(pool: &PgPool, owner_id: &str, items: &[PantryItem]) -> Result<usize> {
    info!("Creating {} pantry items for owner {}", items.len(), owner_id);
    let default_pantry = get_or_create_default_pantry(pool, owner_id).await?;

    let mut tx = pool.begin().await.context("Failed to start transaction")?;
    for item in items {
        sqlx::query(
            "INSERT INTO pantry_items
                 (owner_id, pantry_id, name, brand, category, quantity, unit, expiration_date, added_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(owner_id)
        .bind(item.pantry_id.unwrap_or(default_pantry.id))
        .bind(&item.name)
        .bind(&item.brand)
        .bind(category_token(item.category)?)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.expiration_date)
        .bind(item.added_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert pantry item '{}'", item.name))?;
    }
    tx.commit().await.context("Failed to commit pantry items")?;

    Ok(items.len())
}

/// List an owner's items, optionally for one pantry
pub async fn list_items(pool: &PgPool, owner_id: &str, pantry_id: Option<i64>) -> Result<Vec<PantryItem>> {
    let rows = sqlx::query(
        "SELECT id, pantry_id, name, brand, category, quantity, unit, expiration_date, added_at
         FROM pantry_items
         WHERE owner_id = $1 AND ($2::BIGINT IS NULL OR pantry_id = $2)
         ORDER BY id",
    )
    .bind(owner_id)
    .bind(pantry_id)
    .fetch_all(pool)
    .await
    .context("Failed to list pantry items")?;

    info!("Loaded {} pantry items for owner {}", rows.len(), owner_id);
    rows.iter().map(row_to_item).collect()
}

/// Set an item's quantity
pub async fn update_item_quantity(pool: &PgPool, owner_id: &str, item_id: i64, quantity: f64) -> Result<bool> {
    info!("Updating quantity of pantry item {} to {}", item_id, quantity);

    let result = sqlx::query("UPDATE pantry_items SET quantity = $1 WHERE id = $2 AND owner_id = $3")
        .bind(quantity)
        .bind(item_id)
        .bind(owner_id)
        .execute(pool)
        .await
        .context("Failed to update pantry item")?;

    Ok(result.rows_affected() > 0)
}

/// Move items to another pantry of the same owner
pub async fn move_items(pool: &PgPool, owner_id: &str, item_ids: &[i64], target_pantry: i64) -> Result<u64> {
    info!("Moving {} pantry items to pantry {}", item_ids.len(), target_pantry);

    let result = sqlx::query(
        "UPDATE pantry_items SET pantry_id = $1
         WHERE owner_id = $2 AND id = ANY($3)
           AND EXISTS (SELECT 1 FROM pantries WHERE id = $1 AND owner_id = $2)",
    )
    .bind(target_pantry)
    .bind(owner_id)
    .bind(item_ids)
    .execute(pool)
    .await
    .context("Failed to move pantry items")?;

    Ok(result.rows_affected())
}

pub async fn delete_item(pool: &PgPool, owner_id: &str, item_id: i64) -> Result<bool> {
    info!("Deleting pantry item {}", item_id);

    let result = sqlx::query("DELETE FROM pantry_items WHERE id = $1 AND owner_id = $2")
        .bind(item_id)
        .bind(owner_id)
        .execute(pool)
        .await
        .context("Failed to delete pantry item")?;

    Ok(result.rows_affected() > 0)
}

/// Delete every item of an owner, or of one of their pantries
pub async fn delete_all_items(pool: &PgPool, owner_id: &str, pantry_id: Option<i64>) -> Result<u64> {
    info!("Deleting all pantry items for owner {} (pantry {:?})", owner_id, pantry_id);

    let result = sqlx::query("DELETE FROM pantry_items WHERE owner_id = $1 AND ($2::BIGINT IS NULL OR pantry_id = $2)")
        .bind(owner_id)
        .bind(pantry_id)
        .execute(pool)
        .await
        .context("Failed to delete pantry items")?;

    Ok(result.rows_affected())
}

/// Apply consumption changes in one transaction; returns rows touched
pub async fn apply_stock_changes(pool: &PgPool, owner_id: &str, changes: &[StockChange]) -> Result<u64> {
    info!("Applying {} stock changes for owner {}", changes.len(), owner_id);

    let mut tx = pool.begin().await.context("Failed to start transaction")?;
    let mut touched = 0;

    for change in changes {
        let Some(item_id) = change.item_id() else {
            continue;
        };
        let result = match change {
            StockChange::Update { quantity, .. } => {
                sqlx::query("UPDATE pantry_items SET quantity = $1 WHERE id = $2 AND owner_id = $3")
                    .bind(*quantity)
                    .bind(item_id)
                    .bind(owner_id)
                    .execute(&mut *tx)
                    .await
            }
            StockChange::Remove { .. } => {
                sqlx::query("DELETE FROM pantry_items WHERE id = $1 AND owner_id = $2")
                    .bind(item_id)
                    .bind(owner_id)
                    .execute(&mut *tx)
                    .await
            }
        }
        .with_context(|| format!("Failed to apply stock change to item {item_id}"))?;
        touched += result.rows_affected();
    }

    tx.commit().await.context("Failed to commit stock changes")?;
    info!("Stock changes applied to {} items", touched);
    Ok(touched)
}

/// Record a cooked recipe in the owner's history
pub async fn save_cooked_recipe(pool: &PgPool, owner_id: &str, cooked: &CookedRecipe) -> Result<i64> {
    info!("Saving cooked recipe '{}' for owner {}", cooked.recipe_name, owner_id);

    let ingredients = serde_json::to_string(&cooked.ingredients).context("Failed to serialize ingredients")?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO cooked_recipes (owner_id, recipe_name, ingredients, cooked_at)
         VALUES ($1, $2, $3::JSONB, $4) RETURNING id",
    )
    .bind(owner_id)
    .bind(&cooked.recipe_name)
    .bind(ingredients)
    .bind(cooked.cooked_at)
    .fetch_one(pool)
    .await
    .context("Failed to insert cooked recipe")?;

    Ok(id)
}

/// Cooked recipe history, newest first
pub async fn list_cooked_recipes(pool: &PgPool, owner_id: &str) -> Result<Vec<CookedRecipe>> {
    let rows = sqlx::query(
        "SELECT recipe_name, ingredients::TEXT AS ingredients, cooked_at FROM cooked_recipes
         WHERE owner_id = $1 ORDER BY cooked_at DESC, id DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("Failed to list cooked recipes")?;

    rows.iter()
        .map(|row| {
            let ingredients: String = row.try_get("ingredients")?;
            Ok(CookedRecipe {
                recipe_name: row.try_get("recipe_name")?,
                ingredients: serde_json::from_str(&ingredients).context("Invalid cooked recipe ingredients")?,
                cooked_at: row.try_get("cooked_at")?,
            })
        })
        .collect()
}

/// Save a generated meal plan; returns its id
pub async fn save_meal_plan(pool: &PgPool, owner_id: &str, plan: &MealPlan) -> Result<i64> {
    info!("Saving meal plan with {} meals for owner {}", plan.meals.len(), owner_id);

    let payload = serde_json::to_string(plan).context("Failed to serialize meal plan")?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO meal_plans (owner_id, plan, generated_at) VALUES ($1, $2::JSONB, $3) RETURNING id",
    )
    .bind(owner_id)
    .bind(payload)
    .bind(plan.generated_at)
    .fetch_one(pool)
    .await
    .context("Failed to insert meal plan")?;

    Ok(id)
}

/// Most recently generated meal plan
pub async fn latest_meal_plan(pool: &PgPool, owner_id: &str) -> Result<Option<MealPlan>> {
    let row = sqlx::query(
        "SELECT id, plan::TEXT AS plan FROM meal_plans
         WHERE owner_id = $1 ORDER BY generated_at DESC, id DESC LIMIT 1",
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read meal plan")?;

    match row {
        Some(row) => {
            let payload: String = row.try_get("plan")?;
            let mut plan: MealPlan = serde_json::from_str(&payload).context("Invalid meal plan payload")?;
            plan.id = Some(row.try_get("id")?);
            Ok(Some(plan))
        }
        None => {
            info!("No meal plan found for owner {}", owner_id);
            Ok(None)
        }
    }
}

/// Saved meal plans, newest first
pub async fn list_meal_plans(pool: &PgPool, owner_id: &str) -> Result<Vec<MealPlan>> {
    let rows = sqlx::query(
        "SELECT id, plan::TEXT AS plan FROM meal_plans
         WHERE owner_id = $1 ORDER BY generated_at DESC, id DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("Failed to list meal plans")?;

    rows.iter()
        .map(|row| {
            let payload: String = row.try_get("plan")?;
            let mut plan: MealPlan = serde_json::from_str(&payload).context("Invalid meal plan payload")?;
            plan.id = Some(row.try_get("id")?);
            Ok(plan)
        })
        .collect()
}

/// Delete a meal plan; returns `false` if it did not exist
pub async fn delete_meal_plan(pool: &PgPool, owner_id: &str, plan_id: i64) -> Result<bool> {
    info!("Deleting meal plan {} for owner {}", plan_id, owner_id);

    let result = sqlx::query("DELETE FROM meal_plans WHERE id = $1 AND owner_id = $2")
        .bind(plan_id)
        .bind(owner_id)
        .execute(pool)
        .await
        .context("Failed to delete meal plan")?;

    Ok(result.rows_affected() > 0)
}

/// Save a recipe to the owner's collection; returns its id
pub async fn save_recipe(pool: &PgPool, owner_id: &str, recipe: &Recipe, saved_at: DateTime<Utc>) -> Result<i64> {
    info!("Saving recipe '{}' for owner {}", recipe.name, owner_id);

    let payload = serde_json::to_string(recipe).context("Failed to serialize recipe")?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO saved_recipes (owner_id, name, recipe, saved_at) VALUES ($1, $2, $3::JSONB, $4) RETURNING id",
    )
    .bind(owner_id)
    .bind(&recipe.name)
    .bind(payload)
    .bind(saved_at)
    .fetch_one(pool)
    .await
    .context("Failed to insert saved recipe")?;

    Ok(id)
}

/// Saved recipes, newest first
pub async fn list_saved_recipes(pool: &PgPool, owner_id: &str) -> Result<Vec<SavedRecipe>> {
    let rows = sqlx::query(
        "SELECT id, recipe::TEXT AS recipe, saved_at FROM saved_recipes
         WHERE owner_id = $1 ORDER BY saved_at DESC, id DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("Failed to list saved recipes")?;

    rows.iter()
        .map(|row| {
            let payload: String = row.try_get("recipe")?;
            Ok(SavedRecipe {
                id: Some(row.try_get("id")?),
                recipe: serde_json::from_str(&payload).context("Invalid saved recipe payload")?,
                saved_at: row.try_get("saved_at")?,
            })
        })
        .collect()
}

/// Remove a saved recipe; returns `false` if it did not exist
pub async fn delete_saved_recipe(pool: &PgPool, owner_id: &str, recipe_id: i64) -> Result<bool> {
    info!("Deleting saved recipe {} for owner {}", recipe_id, owner_id);

    let result = sqlx::query("DELETE FROM saved_recipes WHERE id = $1 AND owner_id = $2")
        .bind(recipe_id)
        .bind(owner_id)
        .execute(pool)
        .await
        .context("Failed to delete saved recipe")?;

    Ok(result.rows_affected() > 0)
}

/// Whether a recipe with this name (case-insensitive) is saved
pub async fn is_recipe_saved(pool: &PgPool, owner_id: &str, name: &str) -> Result<bool> {
    let saved: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM saved_recipes WHERE owner_id = $1 AND LOWER(name) = LOWER($2))",
    )
    .bind(owner_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .context("Failed to look up saved recipe")?;

    Ok(saved)
}

/// The owner's dietary profile, empty when none was saved
pub async fn get_dietary_profile(pool: &PgPool, owner_id: &str) -> Result<DietaryProfile> {
    let payload: Option<String> =
        sqlx::query_scalar("SELECT profile::TEXT FROM dietary_profiles WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_optional(pool)
            .await
            .context("Failed to read dietary profile")?;

    match payload {
        Some(payload) => serde_json::from_str(&payload).context("Invalid dietary profile payload"),
        None => Ok(DietaryProfile::default()),
    }
}

/// Store the owner's dietary profile, replacing any previous one
pub async fn save_dietary_profile(pool: &PgPool, owner_id: &str, profile: &DietaryProfile) -> Result<()> {
    info!("Saving dietary profile for owner {}", owner_id);

    let payload = serde_json::to_string(profile).context("Failed to serialize dietary profile")?;
    sqlx::query(
        "INSERT INTO dietary_profiles (owner_id, profile, updated_at) VALUES ($1, $2::JSONB, CURRENT_TIMESTAMP)
         ON CONFLICT (owner_id) DO UPDATE SET profile = EXCLUDED.profile, updated_at = EXCLUDED.updated_at",
    )
    .bind(owner_id)
    .bind(payload)
    .execute(pool)
    .await
    .context("Failed to save dietary profile")?;

    Ok(())
}
