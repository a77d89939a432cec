//! # Unit Normalizer
//!
//! Converts `(quantity, unit)` pairs into a canonical base representation per
//! physical dimension and decides whether two units can be compared.
//!
//! The conversion table is closed: grams and kilograms for mass (base `g`),
//! millilitres and litres for volume (base `ml`). Any other token (`unidades`,
//! `latas`, `cans`, ...) is a discrete unit that is never converted and is only
//! compatible with an identical token.
//!
//! ## Usage
//!
//! ```rust
//! use pantry::units::{compatible, normalize};
//!
//! assert!(compatible("kg", "g"));
//! assert!(!compatible("g", "ml"));
//!
//! let milk = normalize(2.0, "L");
//! assert_eq!(milk.quantity, 2000.0);
//! assert_eq!(milk.unit, "ml");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Physical dimension a configured unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Mass,
    Volume,
}

impl Dimension {
    /// Base unit token quantities of this dimension are normalized to
    pub fn base_unit(&self) -> &'static str {
        match self {
            Dimension::Mass => "g",
            Dimension::Volume => "ml",
        }
    }
}

/// One row of the conversion table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSpec {
    pub dimension: Dimension,
    /// Multiplier into the dimension's base unit
    pub to_base: f64,
}

static UNIT_TABLE: LazyLock<HashMap<&'static str, UnitSpec>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Mass, base unit grams
    map.insert("g", UnitSpec { dimension: Dimension::Mass, to_base: 1.0 });
    map.insert("kg", UnitSpec { dimension: Dimension::Mass, to_base: 1000.0 });

    // Volume, base unit milliliters
    map.insert("ml", UnitSpec { dimension: Dimension::Volume, to_base: 1.0 });
    map.insert("l", UnitSpec { dimension: Dimension::Volume, to_base: 1000.0 });

    map
});

/// A quantity expressed in its dimension's base unit (or passed through verbatim)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuantity {
    pub quantity: f64,
    pub unit: String,
}

impl fmt::Display for NormalizedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_quantity(self.quantity), self.unit)
    }
}

/// Comparison key for a unit token: trimmed and lowercased
pub fn unit_key(unit: &str) -> String {
    unit.trim().to_lowercase()
}

/// Look up a unit in the conversion table
pub fn lookup(unit: &str) -> Option<UnitSpec> {
    UNIT_TABLE.get(unit_key(unit).as_str()).copied()
}

/// Dimension of a configured unit, `None` for discrete or unknown units
pub fn dimension_of(unit: &str) -> Option<Dimension> {
    lookup(unit).map(|spec| spec.dimension)
}

/// Decide whether quantities in `unit_a` and `unit_b` can be compared.
///
/// Configured units are compatible when they share a dimension. If either unit
/// is not configured the tokens must match exactly after trimming and
/// lowercasing; no synonym mapping is applied (`"units"` and `"unidades"` are
/// not compatible).
pub fn compatible(unit_a: &str, unit_b: &str) -> bool {
    match (lookup(unit_a), lookup(unit_b)) {
        (Some(a), Some(b)) => a.dimension == b.dimension,
        _ => unit_key(unit_a) == unit_key(unit_b),
    }
}

/// Express `quantity` of `unit` in the dimension's base unit.
///
/// Unconfigured units are returned unchanged, including the original spelling
/// of the token.
pub fn normalize(quantity: f64, unit: &str) -> NormalizedQuantity {
    match lookup(unit) {
        Some(spec) => NormalizedQuantity {
            quantity: quantity * spec.to_base,
            unit: spec.dimension.base_unit().to_string(),
        },
        None => NormalizedQuantity {
            quantity,
            unit: unit.to_string(),
        },
    }
}

/// Convert `quantity` from one unit into another compatible unit.
///
/// Returns `None` when the units are not compatible.
pub fn convert(quantity: f64, from: &str, to: &str) -> Option<f64> {
    if !compatible(from, to) {
        return None;
    }
    match (lookup(from), lookup(to)) {
        (Some(from_spec), Some(to_spec)) => Some(quantity * from_spec.to_base / to_spec.to_base),
        _ => Some(quantity),
    }
}

/// Render a quantity without a trailing `.0` for whole numbers
pub fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 && quantity.abs() < i64::MAX as f64 {
        format!("{}", quantity as i64)
    } else {
        let rounded = (quantity * 100.0).round() / 100.0;
        format!("{}", rounded)
    }
}
