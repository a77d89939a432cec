//! # Pantry Error Types Module
//!
//! This module defines the error type shared by the checked engine entry points,
//! the bulk importer, the live store and the meal planner.
//!
//! The pure calculations in [`crate::units`] and [`crate::availability`] never
//! fail; errors only appear once inputs are validated or collaborators get involved.

/// Custom error types for pantry operations
#[derive(Debug, Clone, PartialEq)]
pub enum PantryError {
    /// Input validation errors (negative quantities, blank names, bad dates)
    Validation(String),
    /// Configuration errors (unparseable environment values)
    Config(String),
    /// Bulk import errors (unreadable CSV)
    Import(String),
    /// Persistence errors
    Storage(String),
    /// Missing pantry, item or owner
    NotFound(String),
    /// Operation not allowed in the current state (e.g. deleting the default pantry)
    Conflict(String),
    /// Meal plan generation errors
    Plan(String),
}

impl std::fmt::Display for PantryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PantryError::Validation(msg) => write!(f, "Validation error: {msg}"),
            PantryError::Config(msg) => write!(f, "Configuration error: {msg}"),
            PantryError::Import(msg) => write!(f, "Import error: {msg}"),
            PantryError::Storage(msg) => write!(f, "Storage error: {msg}"),
            PantryError::NotFound(msg) => write!(f, "Not found: {msg}"),
            PantryError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            PantryError::Plan(msg) => write!(f, "Meal plan error: {msg}"),
        }
    }
}

impl std::error::Error for PantryError {}

impl From<anyhow::Error> for PantryError {
    fn from(err: anyhow::Error) -> Self {
        PantryError::Storage(err.to_string())
    }
}

impl From<csv::Error> for PantryError {
    fn from(err: csv::Error) -> Self {
        PantryError::Import(err.to_string())
    }
}
