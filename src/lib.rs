//! # Pantry
//!
//! Ingredient availability and unit normalization engine for a household
//! pantry: decides which recipe ingredients are covered by stock, deducts
//! cooked recipes, tracks expiration, plans meals and builds shopping lists.
//! Stock can be bulk-imported from spreadsheets and kept in memory or in
//! PostgreSQL.

pub mod availability;
pub mod bulk_import;
pub mod config;
pub mod consumption;
pub mod db;
pub mod errors;
pub mod expiration;
pub mod localization;
pub mod meal_plan;
pub mod pantry_model;
pub mod recipes;
pub mod shopping;
pub mod store;
pub mod units;
