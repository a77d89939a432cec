//! # Expiration Tracking
//!
//! Classifies pantry items by how close they are to their expiration date.
//! The reference day is passed in so results are reproducible.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ExpirationConfig;
use crate::localization::LocalizationManager;
use crate::pantry_model::PantryItem;

/// Expiration state of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExpirationStatus {
    /// No expiration date recorded
    None,
    #[serde(rename_all = "camelCase")]
    Fresh { days_left: i64 },
    #[serde(rename_all = "camelCase")]
    ExpiringSoon { days_left: i64 },
    /// `days_left` is negative
    #[serde(rename_all = "camelCase")]
    Expired { days_left: i64 },
}

impl ExpirationStatus {
    /// Classify an optional expiration date relative to `today`
    pub fn from_date(expiration_date: Option<NaiveDate>, today: NaiveDate, config: &ExpirationConfig) -> Self {
        let Some(date) = expiration_date else {
            return ExpirationStatus::None;
        };

        let days_left = (date - today).num_days();
        if days_left < 0 {
            ExpirationStatus::Expired { days_left }
        } else if days_left <= config.warning_days {
            ExpirationStatus::ExpiringSoon { days_left }
        } else {
            ExpirationStatus::Fresh { days_left }
        }
    }

    pub fn days_left(&self) -> Option<i64> {
        match self {
            ExpirationStatus::None => None,
            ExpirationStatus::Fresh { days_left }
            | ExpirationStatus::ExpiringSoon { days_left }
            | ExpirationStatus::Expired { days_left } => Some(*days_left),
        }
    }

    /// Whether the item needs attention (expired or expiring soon)
    pub fn needs_attention(&self) -> bool {
        matches!(self, ExpirationStatus::ExpiringSoon { .. } | ExpirationStatus::Expired { .. })
    }

    /// Localization key describing this status
    pub fn message_key(&self) -> &'static str {
        match self {
            ExpirationStatus::None => "expiration-none",
            ExpirationStatus::Fresh { .. } => "expiration-fresh",
            ExpirationStatus::ExpiringSoon { .. } => "expiration-soon",
            ExpirationStatus::Expired { .. } => "expiration-expired",
        }
    }

    /// Localized description ("Expires in 5 days", "Expired 2 days ago", ...)
    pub fn describe(&self, localization: &LocalizationManager, language: &str) -> String {
        match self.days_left() {
            Some(days) => {
                let days = days.abs().to_string();
                localization.get_message_with_args(self.message_key(), language, &[("days", days.as_str())])
            }
            None => localization.get_message_in_language(self.message_key(), language, None),
        }
    }
}

/// Status of a single pantry item
pub fn status_of(item: &PantryItem, today: NaiveDate, config: &ExpirationConfig) -> ExpirationStatus {
    ExpirationStatus::from_date(item.expiration_date, today, config)
}

/// Items that are expired or expiring soon, soonest first
pub fn expiring_items<'a>(
    items: &'a [PantryItem],
    today: NaiveDate,
    config: &ExpirationConfig,
) -> Vec<(&'a PantryItem, ExpirationStatus)> {
    let mut flagged: Vec<(&PantryItem, ExpirationStatus)> = items
        .iter()
        .map(|item| (item, status_of(item, today, config)))
        .filter(|(_, status)| status.needs_attention())
        .collect();

    flagged.sort_by_key(|(_, status)| status.days_left());
    flagged
}
