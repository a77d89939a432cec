//! End-to-end workflows across import, the live store, availability, cooking,
//! expiration and shopping lists.

use chrono::{NaiveDate, Utc};
use pantry::availability::AvailabilityCalculator;
use pantry::bulk_import::{parse_csv, selected_items};
use pantry::config::PantryConfig;
use pantry::consumption::plan_consumption;
use pantry::expiration::{expiring_items, ExpirationStatus};
use pantry::localization::LocalizationManager;
use pantry::pantry_model::{Recipe, RecipeIngredient};
use pantry::recipes::{select_recipes, RecipeFilters};
use pantry::shopping::{build_shopping_list, format_shopping_list};
use pantry::store::PantryStore;

const OWNER: &str = "familia";

const SPREADSHEET: &str = "nombre;cantidad;unidad;caducidad\n\
                           Leche;1;litros;2025-01-12\n\
                           Arroz;500;gramos;\n\
                           Huevos;6;unidades;10/01/2025\n\
                           Mantequilla;0,25;kilo;2025-02-01\n";

fn arroz_con_leche() -> Recipe {
    Recipe::new(
        "Arroz con leche",
        vec![
            RecipeIngredient::new("Arroz", 200.0, "g"),
            RecipeIngredient::new("Leche", 1.5, "L"),
            RecipeIngredient::new("Azucar", 150.0, "g"),
            RecipeIngredient::new("Canela", 1.0, "unidades"),
        ],
    )
}

#[tokio::test]
async fn test_import_check_cook_and_share_workflow() {
    let config = PantryConfig::from_lookup(|key| match key {
        "PANTRY_ZERO_STOCK" => Some("remove".to_string()),
        _ => None,
    })
    .unwrap();
    let localization = LocalizationManager::new().expect("Failed to create localization manager");
    let store = PantryStore::new();

    // 1. Import a spreadsheet into the default pantry
    let rows = parse_csv(SPREADSHEET).unwrap();
    assert!(rows.iter().all(|row| row.is_valid()));
    let added = store.add_items(OWNER, selected_items(&rows, None)).await.unwrap();
    assert_eq!(added.len(), 4);

    // 2. Check a recipe: rice covered, milk short, sugar and cinnamon absent
    let recipe = arroz_con_leche();
    let items = store.items(OWNER, None).await;
    let calculator = AvailabilityCalculator::new(config.availability.clone());
    let report = calculator.calculate(&recipe.ingredients, &items).unwrap();
    assert_eq!(report.result.available_percentage, 25);
    assert_eq!(report.result.missing_items.len(), 3);

    // 3. Shopping list for what is missing, shared in Spanish
    let stock = calculator.stock(&items);
    let list = build_shopping_list(&report.result.missing_items, &stock);
    let text = format_shopping_list(&list, &localization, "es");
    assert_eq!(
        text,
        "*Lista de compras*\n\n- Leche: 0.5 L\n- Azucar: 150 g\n- Canela: 1 unidades"
    );

    // 4. Cook with what there is; missing ingredients are skipped
    let mut cooked = recipe.clone();
    cooked.missing_items = report.result.missing_items.clone();
    let plan = plan_consumption(&cooked, &items, config.consumption.zero_stock, Utc::now());
    assert_eq!(plan.changes.len(), 1);
    store.apply_changes(OWNER, &plan.changes).await;

    let arroz = store
        .items(OWNER, None)
        .await
        .into_iter()
        .find(|item| item.name == "Arroz")
        .unwrap();
    assert!((arroz.quantity - 300.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_expiration_after_import() {
    let config = PantryConfig::default();
    let store = PantryStore::new();
    let rows = parse_csv(SPREADSHEET).unwrap();
    store.add_items(OWNER, selected_items(&rows, None)).await.unwrap();

    let items = store.items(OWNER, None).await;
    let today = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();
    let flagged = expiring_items(&items, today, &config.expiration);

    let names: Vec<&str> = flagged.iter().map(|(item, _)| item.name.as_str()).collect();
    assert_eq!(names, vec!["Huevos", "Leche"]);
    assert_eq!(flagged[0].1, ExpirationStatus::Expired { days_left: -1 });
    assert_eq!(flagged[1].1, ExpirationStatus::ExpiringSoon { days_left: 1 });
}

#[tokio::test]
async fn test_recipe_suggestions_follow_stock() {
    let store = PantryStore::new();
    let rows = parse_csv(SPREADSHEET).unwrap();
    store.add_items(OWNER, selected_items(&rows, None)).await.unwrap();

    let items = store.items(OWNER, None).await;
    let stock = AvailabilityCalculator::default().stock(&items);

    let tortilla = Recipe::new("Tortilla", vec![RecipeIngredient::new("Huevos", 4.0, "unidades")]);
    let suggestions = select_recipes(vec![arroz_con_leche(), tortilla], &stock, &RecipeFilters::default());

    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "Tortilla");
    assert_eq!(suggestions[0].available_percentage, 100);
}
