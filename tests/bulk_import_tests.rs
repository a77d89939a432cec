//! # Bulk Import Tests
//!
//! Spreadsheet files in the layouts users actually export: Spanish and English
//! headers, semicolon separated files, Excel date serials and bad rows.

use chrono::NaiveDate;
use pantry::bulk_import::{parse_csv, selected_items, template_csv, ImportIssue};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_fixture(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write fixture");
    file
}

fn read_fixture(file: &NamedTempFile) -> String {
    fs::read_to_string(file.path()).expect("Failed to read fixture")
}

#[test]
fn test_spanish_spreadsheet() {
    let file = write_fixture(
        "Nombre,Cantidad,Unidad,Fecha Caducidad\n\
         Leche,2,litros,15/01/2025\n\
         Arroz,1,kilo,\n\
         Tomates,6,,2025-01-10\n",
    );

    let rows = parse_csv(&read_fixture(&file)).unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].unit, "L");
    assert_eq!(rows[0].expiration_date, NaiveDate::from_ymd_opt(2025, 1, 15));
    assert_eq!(rows[1].unit, "kg");
    assert_eq!(rows[1].expiration_date, None);
    assert_eq!(rows[2].unit, "unidades");
    assert!(rows.iter().all(|row| row.selected));
}

#[test]
fn test_semicolon_spreadsheet_with_excel_dates() {
    let file = write_fixture(
        "product;quantity;unit;expiry date\n\
         Yogur;4;units;45672\n\
         Aceite;1;bottle;\n",
    );

    let rows = parse_csv(&read_fixture(&file)).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Yogur");
    assert_eq!(rows[0].unit, "unidades");
    assert_eq!(rows[0].expiration_date, NaiveDate::from_ymd_opt(2025, 1, 15));
    assert_eq!(rows[1].unit, "botellas");
}

#[test]
fn test_bad_rows_are_reported_not_selected() {
    let file = write_fixture(
        "nombre,cantidad,unidad\n\
         Pan,2,unidades\n\
         ,1,kg\n\
         Queso,cero,kg\n\
         Sal,1,puñado\n\
         ,,\n",
    );

    let rows = parse_csv(&read_fixture(&file)).unwrap();

    // The blank line is skipped entirely
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1].issues, vec![ImportIssue::MissingName]);
    assert_eq!(rows[2].issues, vec![ImportIssue::InvalidQuantity("cero".to_string())]);
    assert_eq!(rows[3].issues, vec![ImportIssue::InvalidUnit("puñado".to_string())]);

    let items = selected_items(&rows, Some(3));
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Pan");
    assert_eq!(items[0].pantry_id, Some(3));
    assert!(items[0].id.is_none());
}

#[test]
fn test_deselected_rows_are_skipped() {
    let mut rows = parse_csv("name,quantity\nPan,1\nLeche,2\n").unwrap();
    rows[0].selected = false;

    let items = selected_items(&rows, None);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Leche");
}

#[test]
fn test_file_without_name_column_is_rejected() {
    let result = parse_csv("precio,cantidad\n10,2\n");
    assert!(result.is_err());
}

#[test]
fn test_template_file_imports_cleanly() {
    let file = write_fixture(&template_csv().unwrap());

    let rows = parse_csv(&read_fixture(&file)).unwrap();
    let items = selected_items(&rows, None);

    let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["Leche", "Arroz", "Tomates", "Aceite de oliva"]);
    assert_eq!(items[3].unit, "botellas");
}
