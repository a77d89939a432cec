//! # Pantry Configuration Module
//!
//! This module defines configuration structures for the availability engine,
//! stock consumption, meal planning and expiration tracking, and loads them from
//! the environment (with `.env` support through `dotenv`).

use std::env;
use std::str::FromStr;

use crate::availability::AggregationPolicy;
use crate::consumption::ZeroStockPolicy;
use crate::errors::PantryError;

// Constants for planner configuration
pub const DEFAULT_MAX_PLAN_DAYS: u32 = 14;
pub const DEFAULT_CHUNK_DAYS: usize = 7;
pub const DEFAULT_CHUNK_THRESHOLD_MEALS: usize = 15;
pub const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 3;
pub const DEFAULT_MAX_MISSING_PERCENTAGE: u8 = 20;
pub const DEFAULT_LOCALES_DIR: &str = "./locales";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Availability calculation settings
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityConfig {
    /// How same-named stock entries with incompatible units are aggregated
    pub aggregation: AggregationPolicy,
    /// Reject blank names and negative quantities before calculating
    pub validate_inputs: bool,
    /// Largest share of missing ingredients a suggested recipe may have
    pub max_missing_percentage: u8,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            aggregation: AggregationPolicy::SplitByDimension,
            validate_inputs: true,
            max_missing_percentage: DEFAULT_MAX_MISSING_PERCENTAGE,
        }
    }
}

/// Stock deduction settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsumptionConfig {
    /// What happens to an entry whose quantity reaches zero
    pub zero_stock: ZeroStockPolicy,
}

/// Meal planner limits
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Longest plan accepted, in days
    pub max_days: u32,
    /// Days per generation request when a plan is split
    pub chunk_days: usize,
    /// Plans with more meals than this are split into chunks
    pub chunk_threshold_meals: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_days: DEFAULT_MAX_PLAN_DAYS,
            chunk_days: DEFAULT_CHUNK_DAYS,
            chunk_threshold_meals: DEFAULT_CHUNK_THRESHOLD_MEALS,
        }
    }
}

/// Expiration tracking settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExpirationConfig {
    /// Items expiring within this many days are flagged
    pub warning_days: i64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            warning_days: DEFAULT_EXPIRY_WARNING_DAYS,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = PantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(PantryError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PantryConfig {
    /// PostgreSQL connection string, if persistence is used
    pub database_url: Option<String>,
    pub log_format: LogFormat,
    /// Directory holding `<lang>/main.ftl` resources
    pub locales_dir: String,
    /// Language used for user-facing text
    pub language: String,
    pub availability: AvailabilityConfig,
    pub consumption: ConsumptionConfig,
    pub planner: PlannerConfig,
    pub expiration: ExpirationConfig,
}

impl Default for PantryConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            log_format: LogFormat::default(),
            locales_dir: DEFAULT_LOCALES_DIR.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            availability: AvailabilityConfig::default(),
            consumption: ConsumptionConfig::default(),
            planner: PlannerConfig::default(),
            expiration: ExpirationConfig::default(),
        }
    }
}

impl PantryConfig {
    /// Load configuration from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self, PantryError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults; set but unparseable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PantryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        if let Some(value) = lookup("PANTRY_LOG_FORMAT") {
            config.log_format = value.parse()?;
        }
        if let Some(value) = lookup("PANTRY_LOCALES_DIR") {
            config.locales_dir = value;
        }
        if let Some(value) = lookup("PANTRY_LANGUAGE") {
            config.language = value.trim().to_lowercase();
        }
        if let Some(value) = lookup("PANTRY_AGGREGATION") {
            config.availability.aggregation = value.parse()?;
        }
        if let Some(value) = lookup("PANTRY_VALIDATE_INPUTS") {
            config.availability.validate_inputs = parse_bool("PANTRY_VALIDATE_INPUTS", &value)?;
        }
        if let Some(value) = lookup("PANTRY_ZERO_STOCK") {
            config.consumption.zero_stock = value.parse()?;
        }
        if let Some(value) = lookup("PANTRY_EXPIRY_WARNING_DAYS") {
            config.expiration.warning_days = parse_number("PANTRY_EXPIRY_WARNING_DAYS", &value)?;
        }
        if let Some(value) = lookup("PANTRY_MAX_PLAN_DAYS") {
            config.planner.max_days = parse_number("PANTRY_MAX_PLAN_DAYS", &value)?;
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PantryError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PantryError::Config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, PantryError> {
    value
        .trim()
        .parse()
        .map_err(|_| PantryError::Config(format!("{key}: expected a number, got '{value}'")))
}
