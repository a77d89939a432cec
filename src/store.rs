//! # Pantry Store
//!
//! In-memory repository of pantries and pantry items, keyed by owner. Every
//! mutation bumps the owner's version and publishes a [`PantrySnapshot`] to
//! live subscriptions.
//!
//! Subscriptions always start with the current state, so a consumer can drop
//! one and subscribe again at any time. Ending an owner's session terminates
//! every open subscription for that owner; the stored data is kept.
//!
//! Owner state is created by the first write (or subscription). Reads for an
//! unknown owner return what a new owner would see without storing anything.
//!
//! The store also keeps each owner's saved recipes and dietary profile.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::consumption::StockChange;
use crate::errors::PantryError;
use crate::pantry_model::{
    validate_item_name, DietaryProfile, FoodCategory, Pantry, PantryItem, Recipe, SavedRecipe,
};

/// Name given to the pantry created for a new owner
pub const DEFAULT_PANTRY_NAME: &str = "Despensa principal";

/// State of an owner's items at one version
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantrySnapshot {
    pub version: u64,
    pub items: Vec<PantryItem>,
}

/// Partial update of a pantry item; `None` fields are left unchanged
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<FoodCategory>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    /// `Some(None)` clears the date
    pub expiration_date: Option<Option<NaiveDate>>,
}

impl ItemUpdate {
    pub fn quantity(quantity: f64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    fn apply_to(&self, item: &mut PantryItem) -> Result<(), PantryError> {
        if let Some(name) = &self.name {
            item.name = validate_item_name(name).map_err(|e| PantryError::Validation(format!("name {e}")))?;
        }
        if let Some(brand) = &self.brand {
            item.brand = Some(brand.clone());
        }
        if let Some(category) = self.category {
            item.category = Some(category);
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = &self.unit {
            item.unit = unit.clone();
        }
        if let Some(date) = self.expiration_date {
            item.expiration_date = date;
        }
        item.validate()
    }
}

/// Live stream of snapshots for one owner
pub struct PantrySubscription {
    receiver: watch::Receiver<PantrySnapshot>,
    started: bool,
}

impl PantrySubscription {
    /// Next snapshot; the first call returns the current state immediately.
    ///
    /// Returns `None` once the owner's session has ended.
    pub async fn next(&mut self) -> Option<PantrySnapshot> {
        if !self.started {
            self.started = true;
            return Some(self.receiver.borrow_and_update().clone());
        }

        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

fn default_pantry() -> Pantry {
    Pantry {
        id: 1,
        name: DEFAULT_PANTRY_NAME.to_string(),
        description: None,
        is_default: true,
    }
}

struct OwnerState {
    pantries: Vec<Pantry>,
    items: Vec<PantryItem>,
    saved_recipes: Vec<SavedRecipe>,
    dietary_profile: DietaryProfile,
    next_item_id: i64,
    next_pantry_id: i64,
    next_saved_id: i64,
    version: u64,
    sender: watch::Sender<PantrySnapshot>,
}

impl OwnerState {
    fn new() -> Self {
        let (sender, _) = watch::channel(PantrySnapshot::default());
        Self {
            pantries: vec![default_pantry()],
            items: Vec::new(),
            saved_recipes: Vec::new(),
            dietary_profile: DietaryProfile::default(),
            next_item_id: 1,
            next_pantry_id: 2,
            next_saved_id: 1,
            version: 0,
            sender,
        }
    }

    /// Nothing was ever written for this owner
    fn is_untouched(&self) -> bool {
        self.version == 0
            && self.items.is_empty()
            && self.pantries.len() == 1
            && self.saved_recipes.is_empty()
            && self.dietary_profile == DietaryProfile::default()
    }

    fn default_pantry_id(&self) -> i64 {
        self.pantries
            .iter()
            .find(|p| p.is_default)
            .or_else(|| self.pantries.first())
            .map(|p| p.id)
            .unwrap_or(1)
    }

    fn has_pantry(&self, pantry_id: i64) -> bool {
        self.pantries.iter().any(|p| p.id == pantry_id)
    }

    fn insert_item(&mut self, mut item: PantryItem) -> Result<PantryItem, PantryError> {
        item.validate()?;
        let pantry_id = item.pantry_id.unwrap_or_else(|| self.default_pantry_id());
        if !self.has_pantry(pantry_id) {
            return Err(PantryError::NotFound(format!("pantry {pantry_id}")));
        }

        item.id = Some(self.next_item_id);
        item.pantry_id = Some(pantry_id);
        self.next_item_id += 1;
        self.items.push(item.clone());
        Ok(item)
    }

    fn item_mut(&mut self, item_id: i64) -> Result<&mut PantryItem, PantryError> {
        self.items
            .iter_mut()
            .find(|item| item.id == Some(item_id))
            .ok_or_else(|| PantryError::NotFound(format!("pantry item {item_id}")))
    }

    fn publish(&mut self) {
        self.version += 1;
        self.sender.send_replace(PantrySnapshot {
            version: self.version,
            items: self.items.clone(),
        });
    }
}

/// Repository of pantries and items for many owners
#[derive(Default)]
pub struct PantryStore {
    owners: Mutex<HashMap<String, OwnerState>>,
}

impl PantryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against an owner's state, creating it on first use
    async fn with_owner<T>(&self, owner: &str, f: impl FnOnce(&mut OwnerState) -> T) -> T {
        let mut owners = self.owners.lock().await;
        let state = owners.entry(owner.to_string()).or_insert_with(|| {
            debug!(owner, "Creating pantry state");
            OwnerState::new()
        });
        f(state)
    }

    /// Run `f` against an owner's state if it exists
    async fn read_owner<T>(&self, owner: &str, f: impl FnOnce(Option<&OwnerState>) -> T) -> T {
        let owners = self.owners.lock().await;
        f(owners.get(owner))
    }

    /// Number of owners with stored state
    pub async fn owner_count(&self) -> usize {
        self.owners.lock().await.len()
    }

    /// Add one item; without a pantry id it goes to the default pantry
    pub async fn add_item(&self, owner: &str, item: PantryItem) -> Result<PantryItem, PantryError> {
        self.with_owner(owner, |state| -> Result<PantryItem, PantryError> {
            let item = state.insert_item(item)?;
            state.publish();
            info!(owner, item_id = ?item.id, name = %item.name, "Added pantry item");
            Ok(item)
        })
        .await
    }

    /// Add several items in one change; nothing is added if any item is invalid
    pub async fn add_items(&self, owner: &str, items: Vec<PantryItem>) -> Result<Vec<PantryItem>, PantryError> {
        self.with_owner(owner, |state| -> Result<Vec<PantryItem>, PantryError> {
            for item in &items {
                item.validate()?;
                if let Some(pantry_id) = item.pantry_id {
                    if !state.has_pantry(pantry_id) {
                        return Err(PantryError::NotFound(format!("pantry {pantry_id}")));
                    }
                }
            }

            let added = items
                .into_iter()
                .map(|item| state.insert_item(item))
                .collect::<Result<Vec<_>, _>>()?;
            state.publish();
            info!(owner, count = added.len(), "Added pantry items");
            Ok(added)
        })
        .await
    }

    pub async fn update_item(&self, owner: &str, item_id: i64, update: ItemUpdate) -> Result<PantryItem, PantryError> {
        self.with_owner(owner, |state| -> Result<PantryItem, PantryError> {
            let item = state.item_mut(item_id)?;
            let mut updated = item.clone();
            update.apply_to(&mut updated)?;
            *item = updated.clone();
            state.publish();
            debug!(owner, item_id, "Updated pantry item");
            Ok(updated)
        })
        .await
    }

    pub async fn delete_item(&self, owner: &str, item_id: i64) -> Result<(), PantryError> {
        self.with_owner(owner, |state| -> Result<(), PantryError> {
            let before = state.items.len();
            state.items.retain(|item| item.id != Some(item_id));
            if state.items.len() == before {
                return Err(PantryError::NotFound(format!("pantry item {item_id}")));
            }
            state.publish();
            info!(owner, item_id, "Deleted pantry item");
            Ok(())
        })
        .await
    }

    /// Delete every item, or only those of one pantry; returns the count
    pub async fn delete_all(&self, owner: &str, pantry_id: Option<i64>) -> usize {
        self.with_owner(owner, |state| {
            let before = state.items.len();
            match pantry_id {
                Some(pantry_id) => state.items.retain(|item| item.pantry_id != Some(pantry_id)),
                None => state.items.clear(),
            }
            let removed = before - state.items.len();
            if removed > 0 {
                state.publish();
            }
            info!(owner, removed, "Deleted pantry items");
            removed
        })
        .await
    }

    /// Apply consumption changes by item id as one change.
    ///
    /// Changes without an item id, or for items no longer present, are skipped.
    /// Returns the number of changes applied.
    pub async fn apply_changes(&self, owner: &str, changes: &[StockChange]) -> usize {
        self.with_owner(owner, |state| {
            let mut applied = 0;
            for change in changes {
                let Some(item_id) = change.item_id() else {
                    warn!(owner, ?change, "Skipping stock change without item id");
                    continue;
                };

                match change {
                    StockChange::Update { quantity, .. } => {
                        if let Some(item) = state.items.iter_mut().find(|item| item.id == Some(item_id)) {
                            item.quantity = *quantity;
                            applied += 1;
                        }
                    }
                    StockChange::Remove { .. } => {
                        let before = state.items.len();
                        state.items.retain(|item| item.id != Some(item_id));
                        applied += before - state.items.len();
                    }
                }
            }

            if applied > 0 {
                state.publish();
            }
            info!(owner, applied, requested = changes.len(), "Applied stock changes");
            applied
        })
        .await
    }

    /// Items of one pantry, or of every pantry
    pub async fn items(&self, owner: &str, pantry_id: Option<i64>) -> Vec<PantryItem> {
        self.read_owner(owner, |state| {
            state.map_or_else(Vec::new, |state| {
                state
                    .items
                    .iter()
                    .filter(|item| pantry_id.is_none() || item.pantry_id == pantry_id)
                    .cloned()
                    .collect()
            })
        })
        .await
    }

    /// Move items to another pantry; returns how many moved
    pub async fn move_items(&self, owner: &str, item_ids: &[i64], target_pantry: i64) -> Result<usize, PantryError> {
        self.with_owner(owner, |state| -> Result<usize, PantryError> {
            if !state.has_pantry(target_pantry) {
                return Err(PantryError::NotFound(format!("pantry {target_pantry}")));
            }

            let mut moved = 0;
            for item in state.items.iter_mut() {
                if item.id.is_some_and(|id| item_ids.contains(&id)) && item.pantry_id != Some(target_pantry) {
                    item.pantry_id = Some(target_pantry);
                    moved += 1;
                }
            }
            if moved > 0 {
                state.publish();
            }
            info!(owner, moved, target_pantry, "Moved pantry items");
            Ok(moved)
        })
        .await
    }

    pub async fn add_pantry(&self, owner: &str, name: &str, description: Option<&str>) -> Result<Pantry, PantryError> {
        let name = validate_item_name(name).map_err(|e| PantryError::Validation(format!("pantry name {e}")))?;
        self.with_owner(owner, |state| -> Result<Pantry, PantryError> {
            let pantry = Pantry {
                id: state.next_pantry_id,
                name,
                description: description.map(str::to_string),
                is_default: false,
            };
            state.next_pantry_id += 1;
            state.pantries.push(pantry.clone());
            info!(owner, pantry_id = pantry.id, "Added pantry");
            Ok(pantry)
        })
        .await
    }

    /// Delete a pantry, moving its items to the default pantry
    pub async fn delete_pantry(&self, owner: &str, pantry_id: i64) -> Result<(), PantryError> {
        self.with_owner(owner, |state| -> Result<(), PantryError> {
            let pantry = state
                .pantries
                .iter()
                .find(|p| p.id == pantry_id)
                .ok_or_else(|| PantryError::NotFound(format!("pantry {pantry_id}")))?;
            if pantry.is_default {
                return Err(PantryError::Conflict("the default pantry cannot be deleted".to_string()));
            }

            state.pantries.retain(|p| p.id != pantry_id);
            let target = state.default_pantry_id();
            let mut moved = 0;
            for item in state.items.iter_mut().filter(|item| item.pantry_id == Some(pantry_id)) {
                item.pantry_id = Some(target);
                moved += 1;
            }
            if moved > 0 {
                state.publish();
            }
            info!(owner, pantry_id, moved, "Deleted pantry");
            Ok(())
        })
        .await
    }

    /// An owner's pantries; an unknown owner only has the default one
    pub async fn pantries(&self, owner: &str) -> Vec<Pantry> {
        self.read_owner(owner, |state| {
            state.map_or_else(|| vec![default_pantry()], |state| state.pantries.clone())
        })
        .await
    }

    /// Save a recipe to the owner's collection
    pub async fn save_recipe(&self, owner: &str, recipe: Recipe) -> Result<SavedRecipe, PantryError> {
        validate_item_name(&recipe.name).map_err(|e| PantryError::Validation(format!("recipe name {e}")))?;
        self.with_owner(owner, |state| -> Result<SavedRecipe, PantryError> {
            let saved = SavedRecipe {
                id: Some(state.next_saved_id),
                recipe,
                saved_at: Utc::now(),
            };
            state.next_saved_id += 1;
            state.saved_recipes.push(saved.clone());
            info!(owner, saved_id = ?saved.id, name = %saved.recipe.name, "Saved recipe");
            Ok(saved)
        })
        .await
    }

    /// Saved recipes, newest first
    pub async fn saved_recipes(&self, owner: &str) -> Vec<SavedRecipe> {
        self.read_owner(owner, |state| {
            let mut saved = state.map_or_else(Vec::new, |state| state.saved_recipes.clone());
            saved.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| b.id.cmp(&a.id)));
            saved
        })
        .await
    }

    pub async fn remove_saved_recipe(&self, owner: &str, saved_id: i64) -> Result<(), PantryError> {
        self.with_owner(owner, |state| -> Result<(), PantryError> {
            let before = state.saved_recipes.len();
            state.saved_recipes.retain(|saved| saved.id != Some(saved_id));
            if state.saved_recipes.len() == before {
                return Err(PantryError::NotFound(format!("saved recipe {saved_id}")));
            }
            info!(owner, saved_id, "Removed saved recipe");
            Ok(())
        })
        .await
    }

    /// Whether a recipe with this name (case-insensitive) is saved
    pub async fn is_recipe_saved(&self, owner: &str, name: &str) -> bool {
        let name = name.to_lowercase();
        self.read_owner(owner, |state| {
            state.is_some_and(|state| state.saved_recipes.iter().any(|saved| saved.recipe.name.to_lowercase() == name))
        })
        .await
    }

    /// The owner's dietary profile, empty when none was set
    pub async fn dietary_profile(&self, owner: &str) -> DietaryProfile {
        self.read_owner(owner, |state| state.map(|state| state.dietary_profile.clone()).unwrap_or_default())
            .await
    }

    pub async fn set_dietary_profile(&self, owner: &str, profile: DietaryProfile) {
        self.with_owner(owner, |state| {
            state.dietary_profile = profile;
            debug!(owner, "Updated dietary profile");
        })
        .await
    }

    /// Subscribe to an owner's items, starting from the current state.
    ///
    /// Subscribing registers the owner so later writes reach the subscription.
    pub async fn subscribe(&self, owner: &str) -> PantrySubscription {
        self.with_owner(owner, |state| {
            debug!(owner, version = state.version, "New pantry subscription");
            PantrySubscription {
                receiver: state.sender.subscribe(),
                started: false,
            }
        })
        .await
    }

    /// Terminate every live subscription of an owner.
    ///
    /// State of an owner that never wrote anything is dropped.
    pub async fn end_session(&self, owner: &str) {
        let mut owners = self.owners.lock().await;
        if owners.get(owner).is_some_and(OwnerState::is_untouched) {
            // Dropping the state drops its sender, which closes the receivers
            owners.remove(owner);
            info!(owner, ended_at = %Utc::now(), "Ended pantry session");
            return;
        }
        if let Some(state) = owners.get_mut(owner) {
            let (sender, _) = watch::channel(PantrySnapshot {
                version: state.version,
                items: state.items.clone(),
            });
            // Dropping the previous sender closes its receivers
            drop(std::mem::replace(&mut state.sender, sender));
            info!(owner, ended_at = %Utc::now(), "Ended pantry session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_owner_gets_default_pantry() {
        let store = PantryStore::new();
        let pantries = store.pantries("ana").await;
        assert_eq!(pantries.len(), 1);
        assert!(pantries[0].is_default);
        assert_eq!(pantries[0].name, DEFAULT_PANTRY_NAME);
    }

    #[tokio::test]
    async fn test_add_item_assigns_ids_and_default_pantry() {
        let store = PantryStore::new();
        let first = store.add_item("ana", PantryItem::new("Arroz", 1.0, "kg")).await.unwrap();
        let second = store.add_item("ana", PantryItem::new("Leche", 1.0, "L")).await.unwrap();

        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
        assert_eq!(first.pantry_id, Some(1));
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let store = PantryStore::new();
        store.add_item("ana", PantryItem::new("Arroz", 1.0, "kg")).await.unwrap();
        assert!(store.items("luis", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_do_not_register_owners() {
        let store = PantryStore::new();
        for owner in ["a", "b", "c"] {
            assert!(store.items(owner, None).await.is_empty());
            assert_eq!(store.pantries(owner).await.len(), 1);
            assert!(store.saved_recipes(owner).await.is_empty());
            assert!(!store.is_recipe_saved(owner, "Tortilla").await);
            assert_eq!(store.dietary_profile(owner).await, DietaryProfile::default());
        }
        assert_eq!(store.owner_count().await, 0);

        store.add_item("a", PantryItem::new("Arroz", 1.0, "kg")).await.unwrap();
        assert_eq!(store.owner_count().await, 1);
    }

    #[tokio::test]
    async fn test_untouched_subscriber_state_is_dropped_on_session_end() {
        let store = PantryStore::new();
        let mut idle = store.subscribe("idle").await;
        store.add_item("busy", PantryItem::new("Arroz", 1.0, "kg")).await.unwrap();
        assert_eq!(store.owner_count().await, 2);

        store.end_session("idle").await;
        store.end_session("busy").await;
        assert_eq!(store.owner_count().await, 1);

        assert_eq!(idle.next().await.map(|snapshot| snapshot.version), Some(0));
        assert!(idle.next().await.is_none());
        assert_eq!(store.items("busy", None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_quantity() {
        let store = PantryStore::new();
        let item = store.add_item("ana", PantryItem::new("Arroz", 1.0, "kg")).await.unwrap();
        let id = item.id.unwrap();

        assert!(store.update_item("ana", id, ItemUpdate::quantity(-1.0)).await.is_err());
        assert_eq!(store.items("ana", None).await[0].quantity, 1.0);
    }
}
