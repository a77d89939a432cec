//! # Bulk Import Module
//!
//! Parses spreadsheet exports (CSV) into pantry items. Column headers and unit
//! spellings are accepted in Spanish and English and mapped onto the canonical
//! set used by the pantry.
//!
//! ## Features
//!
//! - Header aliases (`nombre`/`product`/`name`, `cantidad`/`quantity`, ...)
//! - Unit aliases (`kilos` → `kg`, `cans` → `latas`, `l` → `L`, ...)
//! - Dates as `YYYY-MM-DD`, `DD/MM/YYYY`, `DD-MM-YYYY` or Excel serial numbers
//! - Delimiter sniffing for `,`, `;` and tab separated files
//! - Per-row issues instead of failing the whole file
//!
//! ## Usage
//!
//! ```rust
//! use pantry::bulk_import::parse_csv;
//!
//! let rows = parse_csv("nombre,cantidad,unidad\nLeche,2,litros\n").unwrap();
//! assert_eq!(rows[0].unit, "L");
//! assert!(rows[0].selected);
//! ```

use chrono::{NaiveDate, TimeDelta};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::errors::PantryError;
use crate::localization::LocalizationManager;
use crate::pantry_model::PantryItem;

/// Canonical unit tokens accepted by the pantry
pub const VALID_UNITS: [&str; 8] = ["unidades", "kg", "g", "L", "ml", "paquetes", "latas", "botellas"];

/// Unit used when a row leaves the unit column empty
pub const DEFAULT_UNIT: &str = "unidades";

/// Excel serial for 9999-12-31
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

const DELIMITER_CANDIDATES: [u8; 3] = [b',', b';', b'\t'];

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("ISO date pattern should be valid");
    static ref DMY_DATE: Regex =
        Regex::new(r"^(\d{1,2})[/\-](\d{1,2})[/\-](\d{4})$").expect("Day-month-year pattern should be valid");
    static ref SERIAL_DATE: Regex = Regex::new(r"^\d+(?:\.\d+)?$").expect("Serial date pattern should be valid");
}

static UNIT_ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Spanish variations
    map.insert("unidad", "unidades");
    map.insert("ud", "unidades");
    map.insert("uds", "unidades");
    map.insert("kilogramo", "kg");
    map.insert("kilogramos", "kg");
    map.insert("kilo", "kg");
    map.insert("kilos", "kg");
    map.insert("gramo", "g");
    map.insert("gramos", "g");
    map.insert("gr", "g");
    map.insert("litro", "L");
    map.insert("litros", "L");
    map.insert("l", "L");
    map.insert("mililitro", "ml");
    map.insert("mililitros", "ml");
    map.insert("paquete", "paquetes");
    map.insert("paq", "paquetes");
    map.insert("lata", "latas");
    map.insert("botella", "botellas");

    // English variations
    map.insert("unit", "unidades");
    map.insert("units", "unidades");
    map.insert("kilogram", "kg");
    map.insert("kilograms", "kg");
    map.insert("gram", "g");
    map.insert("grams", "g");
    map.insert("liter", "L");
    map.insert("liters", "L");
    map.insert("litre", "L");
    map.insert("litres", "L");
    map.insert("milliliter", "ml");
    map.insert("milliliters", "ml");
    map.insert("millilitre", "ml");
    map.insert("millilitres", "ml");
    map.insert("package", "paquetes");
    map.insert("packages", "paquetes");
    map.insert("can", "latas");
    map.insert("cans", "latas");
    map.insert("bottle", "botellas");
    map.insert("bottles", "botellas");

    map
});

/// Target field of a spreadsheet column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportField {
    Name,
    Quantity,
    Unit,
    ExpirationDate,
}

static COLUMN_ALIASES: LazyLock<HashMap<&'static str, ImportField>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Spanish
    map.insert("nombre", ImportField::Name);
    map.insert("producto", ImportField::Name);
    map.insert("cantidad", ImportField::Quantity);
    map.insert("unidad", ImportField::Unit);
    map.insert("caducidad", ImportField::ExpirationDate);
    map.insert("fecha_caducidad", ImportField::ExpirationDate);
    map.insert("vencimiento", ImportField::ExpirationDate);
    map.insert("fecha_vencimiento", ImportField::ExpirationDate);

    // English
    map.insert("name", ImportField::Name);
    map.insert("product", ImportField::Name);
    map.insert("quantity", ImportField::Quantity);
    map.insert("unit", ImportField::Unit);
    map.insert("expiration", ImportField::ExpirationDate);
    map.insert("expiration_date", ImportField::ExpirationDate);
    map.insert("expirationdate", ImportField::ExpirationDate);
    map.insert("expiry", ImportField::ExpirationDate);
    map.insert("expiry_date", ImportField::ExpirationDate);

    map
});

/// Whether imported rows are added to the pantry or replace its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Add,
    Replace,
}

/// Problem found in one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ImportIssue {
    MissingName,
    InvalidQuantity(String),
    InvalidUnit(String),
}

impl ImportIssue {
    /// Localized description of the issue
    pub fn describe(&self, localization: &LocalizationManager, language: &str) -> String {
        match self {
            ImportIssue::MissingName => localization.get_message_in_language("import-missing-name", language, None),
            ImportIssue::InvalidQuantity(value) => {
                localization.get_message_with_args("import-invalid-quantity", language, &[("value", value.as_str())])
            }
            ImportIssue::InvalidUnit(value) => {
                localization.get_message_with_args("import-invalid-unit", language, &[("value", value.as_str())])
            }
        }
    }
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportIssue::MissingName => write!(f, "name required"),
            ImportIssue::InvalidQuantity(value) => write!(f, "invalid quantity: {value}"),
            ImportIssue::InvalidUnit(value) => write!(f, "invalid unit: {value}"),
        }
    }
}

/// One parsed spreadsheet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub expiration_date: Option<NaiveDate>,
    /// Rows without issues start selected
    pub selected: bool,
    pub issues: Vec<ImportIssue>,
}

impl ImportRow {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Convert into an unsaved pantry item
    pub fn to_pantry_item(&self, pantry_id: Option<i64>) -> PantryItem {
        let mut item = PantryItem::new(&self.name, self.quantity, &self.unit);
        item.pantry_id = pantry_id;
        item.expiration_date = self.expiration_date;
        item
    }
}

/// Map a header onto an import field after trim, lowercase and space → underscore
pub fn normalize_column_name(column: &str) -> Option<ImportField> {
    let normalized = column
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    COLUMN_ALIASES.get(normalized.as_str()).copied()
}

/// Map a unit spelling onto the canonical set, `None` when unknown
pub fn normalize_unit(unit: &str) -> Option<&'static str> {
    let normalized = unit.trim().to_lowercase();
    if let Some(valid) = VALID_UNITS.iter().find(|valid| **valid == normalized) {
        return Some(*valid);
    }
    UNIT_ALIASES.get(normalized.as_str()).copied()
}

/// Parse a date cell: ISO, day-month-year, or an Excel serial day number
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_DATE.captures(value) {
        return NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
    }

    if let Some(caps) = DMY_DATE.captures(value) {
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?);
    }

    if SERIAL_DATE.is_match(value) {
        let serial: f64 = value.parse().ok()?;
        if serial > MAX_EXCEL_SERIAL {
            return None;
        }
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        return epoch.checked_add_signed(TimeDelta::try_days(serial.trunc() as i64)?);
    }

    None
}

/// Parse one row given as `(header, cell)` pairs
pub fn parse_row<'a, I>(cells: I) -> ImportRow
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut fields: HashMap<ImportField, &str> = HashMap::new();
    for (header, value) in cells {
        if let Some(field) = normalize_column_name(header) {
            fields.entry(field).or_insert(value);
        }
    }

    let mut issues = Vec::new();

    let name = fields.get(&ImportField::Name).map(|v| v.trim()).unwrap_or("").to_string();
    if name.is_empty() {
        issues.push(ImportIssue::MissingName);
    }

    let mut quantity = 1.0;
    if let Some(raw) = fields.get(&ImportField::Quantity).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        match raw.replace(',', ".").parse::<f64>() {
            Ok(parsed) if parsed.is_finite() && parsed > 0.0 => quantity = parsed,
            _ => issues.push(ImportIssue::InvalidQuantity(raw.to_string())),
        }
    }

    let mut unit = DEFAULT_UNIT.to_string();
    if let Some(raw) = fields.get(&ImportField::Unit).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        match normalize_unit(raw) {
            Some(normalized) => unit = normalized.to_string(),
            None => issues.push(ImportIssue::InvalidUnit(raw.to_string())),
        }
    }

    let expiration_date = fields
        .get(&ImportField::ExpirationDate)
        .and_then(|raw| parse_date(raw));

    ImportRow {
        name,
        quantity,
        unit,
        expiration_date,
        selected: issues.is_empty(),
        issues,
    }
}

/// Pick the delimiter that splits the sample lines most consistently
pub fn detect_delimiter(content: &str) -> u8 {
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for delimiter in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delimiter)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count();
        let score = consistent * target;
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }

    best
}

/// Parse CSV content with a header row into import rows
pub fn parse_csv(content: &str) -> Result<Vec<ImportRow>, PantryError> {
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = detect_delimiter(content);
    debug!("Parsing import with delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| normalize_column_name(h) == Some(ImportField::Name)) {
        return Err(PantryError::Import(format!(
            "no name column found in headers: {}",
            headers.iter().collect::<Vec<_>>().join(", ")
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(parse_row(headers.iter().zip(record.iter())));
    }

    let valid = rows.iter().filter(|row| row.is_valid()).count();
    info!("Parsed {} import rows ({} valid, {} with issues)", rows.len(), valid, rows.len() - valid);

    Ok(rows)
}

/// Pantry items for every valid, selected row
pub fn selected_items(rows: &[ImportRow], pantry_id: Option<i64>) -> Vec<PantryItem> {
    rows.iter()
        .filter(|row| row.selected && row.is_valid())
        .map(|row| row.to_pantry_item(pantry_id))
        .collect()
}

/// Combine imported items with an existing item list.
///
/// `Replace` drops the existing items of the target pantry, or all of them
/// when no pantry is given; items of other pantries are kept.
pub fn merge_import(
    existing: Vec<PantryItem>,
    imported: Vec<PantryItem>,
    mode: ImportMode,
    pantry_id: Option<i64>,
) -> Vec<PantryItem> {
    let mut items: Vec<PantryItem> = match (mode, pantry_id) {
        (ImportMode::Add, _) => existing,
        (ImportMode::Replace, Some(pantry_id)) => existing
            .into_iter()
            .filter(|item| item.pantry_id != Some(pantry_id))
            .collect(),
        (ImportMode::Replace, None) => Vec::new(),
    };
    items.extend(imported);
    items
}

/// Example spreadsheet users can fill in
pub fn template_csv() -> Result<String, PantryError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);

    writer.write_record(["nombre", "cantidad", "unidad", "caducidad"])?;
    writer.write_record(["Leche", "2", "L", "2025-01-15"])?;
    writer.write_record(["Arroz", "1", "kg", ""])?;
    writer.write_record(["Tomates", "6", "unidades", "2025-01-10"])?;
    writer.write_record(["Aceite de oliva", "1", "botellas", "2025-06-30"])?;

    let bytes = writer
        .into_inner()
        .map_err(|e| PantryError::Import(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PantryError::Import(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_aliases() {
        assert_eq!(normalize_column_name("Nombre"), Some(ImportField::Name));
        assert_eq!(normalize_column_name(" Fecha Caducidad "), Some(ImportField::ExpirationDate));
        assert_eq!(normalize_column_name("expiry date"), Some(ImportField::ExpirationDate));
        assert_eq!(normalize_column_name("precio"), None);
    }

    #[test]
    fn test_unit_aliases() {
        assert_eq!(normalize_unit("Kilos"), Some("kg"));
        assert_eq!(normalize_unit("l"), Some("L"));
        assert_eq!(normalize_unit("cans"), Some("latas"));
        assert_eq!(normalize_unit("unidades"), Some("unidades"));
        assert_eq!(normalize_unit("ML"), Some("ml"));
        assert_eq!(normalize_unit("puñado"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 15);
        assert_eq!(parse_date("2025-01-15"), expected);
        assert_eq!(parse_date("15/01/2025"), expected);
        assert_eq!(parse_date("15-1-2025"), expected);
        assert_eq!(parse_date("45672"), expected);
        assert_eq!(parse_date("2025-02-30"), None);
        assert_eq!(parse_date("mañana"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_date_rejects_oversized_serials() {
        assert_eq!(parse_date("2958465"), NaiveDate::from_ymd_opt(9999, 12, 31));
        assert_eq!(parse_date("2958466"), None);
        assert_eq!(parse_date("200000000000000"), None);
        assert_eq!(parse_date("99999999999999999999999"), None);

        let rows = parse_csv("nombre,cantidad,unidad,caducidad\nLeche,1,L,200000000000000\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Leche");
        assert_eq!(rows[0].expiration_date, None);
    }

    #[test]
    fn test_parse_row_defaults() {
        let row = parse_row([("producto", "Pan")]);
        assert_eq!(row.name, "Pan");
        assert_eq!(row.quantity, 1.0);
        assert_eq!(row.unit, "unidades");
        assert!(row.selected);
        assert!(row.expiration_date.is_none());
    }

    #[test]
    fn test_parse_row_issues() {
        let row = parse_row([("name", ""), ("quantity", "-2"), ("unit", "puñados")]);
        assert_eq!(
            row.issues,
            vec![
                ImportIssue::MissingName,
                ImportIssue::InvalidQuantity("-2".to_string()),
                ImportIssue::InvalidUnit("puñados".to_string()),
            ]
        );
        assert!(!row.selected);
    }

    #[test]
    fn test_decimal_comma_quantity() {
        let row = parse_row([("nombre", "Queso"), ("cantidad", "0,5"), ("unidad", "kilo")]);
        assert_eq!(row.quantity, 0.5);
        assert_eq!(row.unit, "kg");
    }

    #[test]
    fn test_replace_only_touches_target_pantry() {
        let existing = vec![
            PantryItem::new("Leche", 1.0, "L").in_pantry(1),
            PantryItem::new("Arroz", 500.0, "g").in_pantry(2),
        ];
        let imported = vec![PantryItem::new("Huevos", 6.0, "unidades").in_pantry(1)];

        let merged = merge_import(existing.clone(), imported.clone(), ImportMode::Replace, Some(1));
        let names: Vec<&str> = merged.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Arroz", "Huevos"]);

        let merged = merge_import(existing.clone(), imported.clone(), ImportMode::Replace, None);
        assert_eq!(merged.len(), 1);

        let merged = merge_import(existing, imported, ImportMode::Add, Some(1));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a;b;c\n1;2,5;3"), b';');
        assert_eq!(detect_delimiter("a\tb\n1\t2"), b'\t');
    }

    #[test]
    fn test_template_round_trips_through_parser() {
        let template = template_csv().unwrap();
        assert!(template.starts_with("nombre,cantidad,unidad,caducidad\n"));

        let rows = parse_csv(&template).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(ImportRow::is_valid));
        assert_eq!(rows[1].expiration_date, None);
    }
}
