//! # Shopping Lists
//!
//! Builds shopping lists from missing ingredients, filters the lines that
//! actually need buying and renders them as shareable text.

use std::collections::HashMap;

use crate::availability::AggregatedStock;
use crate::localization::LocalizationManager;
use crate::pantry_model::{RecipeIngredient, ShoppingListItem};
use crate::units::{compatible, convert, format_quantity};

/// Turn missing ingredients into shopping list lines.
///
/// Ingredients with the same name and compatible units are combined into the
/// first line's unit. `available` is the compatible stock expressed in that
/// unit and `to_buy` is whatever the stock does not cover.
pub fn build_shopping_list(missing: &[RecipeIngredient], stock: &AggregatedStock) -> Vec<ShoppingListItem> {
    let mut lines: Vec<ShoppingListItem> = Vec::new();
    let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

    for ingredient in missing {
        let key = ingredient.name_key();
        let existing = by_name.get(&key).and_then(|indices| {
            indices
                .iter()
                .copied()
                .find(|&index| compatible(&lines[index].unit, &ingredient.unit))
        });

        match existing {
            Some(index) => {
                let line = &mut lines[index];
                line.quantity += convert(ingredient.quantity, &ingredient.unit, &line.unit)
                    .unwrap_or(ingredient.quantity);
            }
            None => {
                by_name.entry(key).or_default().push(lines.len());
                lines.push(ShoppingListItem {
                    name: ingredient.name.clone(),
                    quantity: ingredient.quantity,
                    unit: ingredient.unit.clone(),
                    available: 0.0,
                    to_buy: 0.0,
                });
            }
        }
    }

    for line in &mut lines {
        line.available = stock.available_in(&line.name, &line.unit).unwrap_or(0.0).max(0.0);
        line.to_buy = (line.quantity - line.available).max(0.0);
    }

    lines
}

/// Lines that still need buying
pub fn items_to_buy(list: &[ShoppingListItem]) -> Vec<ShoppingListItem> {
    list.iter().filter(|item| item.to_buy > 0.0).cloned().collect()
}

/// Lines of a shopping list as `- name: toBuy unit`, one per line
pub fn format_lines(items: &[ShoppingListItem], localization: &LocalizationManager, language: &str) -> String {
    items_to_buy(items)
        .iter()
        .map(|item| {
            let quantity = format_quantity(item.to_buy);
            localization.get_message_with_args(
                "shopping-list-line",
                language,
                &[
                    ("name", item.name.as_str()),
                    ("quantity", quantity.as_str()),
                    ("unit", item.unit.as_str()),
                ],
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full share text: a title, a blank line and the lines to buy
pub fn format_shopping_list(items: &[ShoppingListItem], localization: &LocalizationManager, language: &str) -> String {
    let lines = format_lines(items, localization, language);
    if lines.is_empty() {
        return localization.get_message_in_language("shopping-list-empty", language, None);
    }

    let title = localization.get_message_in_language("shopping-list-title", language, None);
    format!("{title}\n\n{lines}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{aggregate_pantry, AggregationPolicy};
    use crate::pantry_model::PantryItem;

    #[test]
    fn test_build_shopping_list_uses_stock() {
        let pantry = vec![PantryItem::new("Arroz", 200.0, "g")];
        let stock = aggregate_pantry(&pantry, AggregationPolicy::SplitByDimension);
        let missing = vec![
            RecipeIngredient::new("Arroz", 1.0, "kg"),
            RecipeIngredient::new("Cebolla", 2.0, "unidades"),
        ];

        let list = build_shopping_list(&missing, &stock);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Arroz");
        assert!((list[0].available - 0.2).abs() < 1e-9);
        assert!((list[0].to_buy - 0.8).abs() < 1e-9);
        assert_eq!(list[1].available, 0.0);
        assert_eq!(list[1].to_buy, 2.0);
    }

    #[test]
    fn test_build_shopping_list_merges_compatible_lines() {
        let stock = AggregatedStock::default();
        let missing = vec![
            RecipeIngredient::new("Leche", 1.0, "L"),
            RecipeIngredient::new("leche", 500.0, "ml"),
            RecipeIngredient::new("Leche", 2.0, "botellas"),
        ];

        let list = build_shopping_list(&missing, &stock);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].quantity, 1.5);
        assert_eq!(list[0].unit, "L");
        assert_eq!(list[1].unit, "botellas");
    }

    #[test]
    fn test_items_to_buy() {
        let list = vec![
            ShoppingListItem { name: "Sal".into(), quantity: 1.0, unit: "kg".into(), available: 1.0, to_buy: 0.0 },
            ShoppingListItem { name: "Pan".into(), quantity: 1.0, unit: "unidades".into(), available: 0.0, to_buy: 1.0 },
        ];
        let to_buy = items_to_buy(&list);
        assert_eq!(to_buy.len(), 1);
        assert_eq!(to_buy[0].name, "Pan");
    }
}
