//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval and formatting with various edge cases.

use pantry::availability::{AggregationPolicy, AvailabilityCalculator};
use pantry::config::AvailabilityConfig;
use pantry::expiration::ExpirationStatus;
use pantry::localization::{t, t_args, LocalizationManager};
use pantry::pantry_model::{MealType, PantryItem, RecipeIngredient, ShoppingListItem};
use pantry::shopping::format_shopping_list;
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        // Create a new localization manager for each test
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    fn line(name: &str, to_buy: f64, unit: &str) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            quantity: to_buy,
            unit: unit.to_string(),
            available: 0.0,
            to_buy,
        }
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("shopping-list-title", "en", None);
        assert_eq!(message, "*Shopping list*");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("shopping-list-title", "fr", None);
        // Should fall back to English
        assert_eq!(message, "*Shopping list*");
        assert!(!manager.supports("fr"));
        assert!(manager.supports("es"));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("available", "3");
        args.insert("total", "4");
        args.insert("percentage", "75");

        let message = manager.get_message_in_language("availability-summary", "en", Some(&args));
        assert!(message.contains("3 of 4"));
        assert!(message.contains("75%"));
    }

    #[test]
    fn test_get_message_missing_args() {
        let manager = setup_localization();

        // Missing arguments are reported inline by fluent, never a panic
        let message = manager.get_message_in_language("import-invalid-unit", "en", None);
        assert!(!message.is_empty());
    }

    #[test]
    fn test_spanish_localization() {
        let manager = setup_localization();

        let title = manager.get_message_in_language("shopping-list-title", "es", None);
        assert_eq!(title, "*Lista de compras*");

        let unit = manager.get_message_with_args("import-invalid-unit", "es", &[("value", "puñado")]);
        assert!(unit.contains("puñado"));
    }

    #[test]
    fn test_meal_type_names_exist_in_all_languages() {
        let manager = setup_localization();

        for meal in MealType::ALL {
            let key = format!("meal-{}", meal.token());
            for lang in ["en", "es"] {
                let message = manager.get_message_in_language(&key, lang, None);
                assert!(!message.starts_with("Missing"), "{key} missing in {lang}");
            }
        }
    }

    #[test]
    fn test_share_text_format() {
        let manager = setup_localization();
        let list = vec![line("Leche", 2.0, "L"), line("Arroz", 0.5, "kg"), line("Sal", 0.0, "kg")];

        let text = format_shopping_list(&list, &manager, "es");
        assert_eq!(text, "*Lista de compras*\n\n- Leche: 2 L\n- Arroz: 0.5 kg");
    }

    #[test]
    fn test_share_text_empty_list() {
        let manager = setup_localization();

        let text = format_shopping_list(&[line("Sal", 0.0, "kg")], &manager, "en");
        assert_eq!(text, manager.get_message_in_language("shopping-list-empty", "en", None));
    }

    #[test]
    fn test_availability_report_descriptions() {
        let manager = setup_localization();
        let calculator = AvailabilityCalculator::new(AvailabilityConfig {
            aggregation: AggregationPolicy::FirstUnitWins,
            ..Default::default()
        });
        let pantry = vec![PantryItem::new("Arroz", 1.0, "kg"), PantryItem::new("Arroz", 2.0, "paquetes")];
        let recipe = vec![RecipeIngredient::new("Arroz", 200.0, "g"), RecipeIngredient::new("Sal", 5.0, "g")];
        let report = calculator.calculate(&recipe, &pantry).unwrap();

        assert_eq!(report.describe_missing(&manager, "en").as_deref(), Some("Missing: Sal"));
        assert_eq!(report.describe_missing(&manager, "es").as_deref(), Some("Faltan: Sal"));
        assert_eq!(
            report.describe_conflicts(&manager, "en"),
            vec!["Arroz: 2 paquetes could not be combined with stock in g".to_string()]
        );

        let covered = calculator.calculate(&recipe[..1], &pantry).unwrap();
        assert!(covered.describe_missing(&manager, "en").is_none());
    }

    #[test]
    fn test_expiration_descriptions() {
        let manager = setup_localization();

        let soon = ExpirationStatus::ExpiringSoon { days_left: 2 }.describe(&manager, "en");
        assert!(soon.contains('2'));

        let expired = ExpirationStatus::Expired { days_left: -4 }.describe(&manager, "en");
        assert!(expired.contains('4'));
        assert!(!expired.contains('-'));

        let none = ExpirationStatus::None.describe(&manager, "es");
        assert!(!none.starts_with("Missing"));
    }

    #[test]
    fn test_manager_can_be_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LocalizationManager>();

        let handle = std::thread::spawn(|| t("shopping-list-title", "es"));
        assert_eq!(handle.join().unwrap(), "*Lista de compras*");
    }

    #[test]
    fn test_global_helpers() {
        assert_eq!(t("shopping-list-title", "en"), "*Shopping list*");
        let message = t_args("import-invalid-quantity", "en", &[("value", "-1")]);
        assert!(message.contains("-1"));
    }
}
