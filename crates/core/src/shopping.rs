//! Shopping list for a planned day.
//!
//! Ingredients of every recipe planned for a date are grouped by normalized
//! name ("Tofu " and "tofu" are one purchase). Each group owns exactly one
//! cart record stored under [`group_key`], so the cost of a group never
//! depends on which physical ingredient happens to be listed first.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::state::{AppState, CartEntry};
use crate::types::{Cost, IngredientId, RecipeId};

/// Normalize an ingredient name for grouping.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The cart key for the group of `name` on `date`.
#[must_use]
pub fn group_key(date: NaiveDate, name: &str) -> String {
    format!("{date}:{}", normalize_name(name))
}

/// One ingredient occurrence inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub ingredient_id: IngredientId,
    pub recipe_id: RecipeId,
    pub recipe_title: String,
    pub amount: String,
}

/// Ingredients that are bought together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingGroup {
    pub key: String,
    /// Display name, as first written.
    pub name: String,
    pub items: Vec<ShoppingItem>,
    pub entry: CartEntry,
}

impl ShoppingGroup {
    /// Amounts joined for display, e.g. "200g + 1 block".
    #[must_use]
    pub fn amounts(&self) -> String {
        self.items
            .iter()
            .map(|i| i.amount.as_str())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// The shopping list for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub date: NaiveDate,
    pub groups: Vec<ShoppingGroup>,
    /// Sum of every group's recorded cost.
    pub total_actual: Cost,
}

/// Changes to one group's cart record. `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartUpdate {
    pub bought: Option<bool>,
    pub cost: Option<Cost>,
    pub unit_price: Option<Cost>,
}

impl AppState {
    /// Build the shopping list for `date` from the planned recipes.
    ///
    /// Unknown recipe ids and ingredients with blank names are skipped.
    /// Groups appear in the order their first ingredient was encountered.
    #[must_use]
    pub fn shopping_list(&self, date: NaiveDate) -> ShoppingList {
        let mut groups: Vec<ShoppingGroup> = Vec::new();

        let planned = self.plan(date).map(|p| p.recipe_ids.as_slice()).unwrap_or_default();
        for recipe in planned.iter().filter_map(|id| self.recipe(id)) {
            for ingredient in &recipe.ingredients {
                if ingredient.name.trim().is_empty() {
                    continue;
                }
                let key = group_key(date, &ingredient.name);
                let item = ShoppingItem {
                    ingredient_id: ingredient.id.clone(),
                    recipe_id: recipe.id.clone(),
                    recipe_title: recipe.title.clone(),
                    amount: ingredient.amount.clone(),
                };
                if let Some(group) = groups.iter_mut().find(|g| g.key == key) {
                    group.items.push(item);
                } else {
                    let entry = self.shopping_cart.get(&key).copied().unwrap_or_default();
                    groups.push(ShoppingGroup {
                        key,
                        name: ingredient.name.trim().to_owned(),
                        items: vec![item],
                        entry,
                    });
                }
            }
        }

        let total_actual = groups.iter().map(|g| g.entry.cost).sum();
        ShoppingList {
            date,
            groups,
            total_actual,
        }
    }

    /// Apply `update` to the cart record of the `name` group on `date`.
    ///
    /// Returns the record after the update.
    pub fn update_cart_group(&mut self, date: NaiveDate, name: &str, update: CartUpdate) -> CartEntry {
        let entry = self.shopping_cart.entry(group_key(date, name)).or_default();
        if let Some(bought) = update.bought {
            entry.bought = bought;
        }
        if let Some(cost) = update.cost {
            entry.cost = cost;
        }
        if let Some(unit_price) = update.unit_price {
            entry.unit_price = unit_price;
        }
        *entry
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::state::{Ingredient, Recipe};
    use crate::types::UserId;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn ingredient(id: &str, name: &str, amount: &str) -> Ingredient {
        Ingredient {
            id: IngredientId::new(id),
            name: name.to_owned(),
            amount: amount.to_owned(),
            ..Ingredient::default()
        }
    }

    fn planned_state() -> AppState {
        let mut state = AppState {
            recipes: vec![
                Recipe {
                    id: RecipeId::new("r1"),
                    title: "Mapo Tofu".to_owned(),
                    ingredients: vec![
                        ingredient("i1", "Tofu", "1 block"),
                        ingredient("i2", "Chili oil", "2 tbsp"),
                    ],
                    ..Recipe::default()
                },
                Recipe {
                    id: RecipeId::new("r2"),
                    title: "Tofu soup".to_owned(),
                    ingredients: vec![
                        ingredient("i3", " tofu ", "200g"),
                        ingredient("i4", "  ", "ignored"),
                    ],
                    ..Recipe::default()
                },
            ],
            ..AppState::default()
        };
        let now: DateTime<Utc> = DateTime::from_timestamp(0, 0).unwrap();
        let user = UserId::new("u");
        state.toggle_recipe_in_plan(date(), &RecipeId::new("r1"), &user, now).unwrap();
        state.toggle_recipe_in_plan(date(), &RecipeId::new("r2"), &user, now).unwrap();
        state
            .toggle_recipe_in_plan(date(), &RecipeId::new("missing"), &user, now)
            .unwrap();
        state
    }

    #[test]
    fn test_groups_by_normalized_name() {
        let list = planned_state().shopping_list(date());
        assert_eq!(list.groups.len(), 2);

        let tofu = &list.groups[0];
        assert_eq!(tofu.key, "2026-10-18:tofu");
        assert_eq!(tofu.name, "Tofu");
        assert_eq!(tofu.items.len(), 2);
        assert_eq!(tofu.amounts(), "1 block + 200g");
        assert_eq!(list.groups[1].key, "2026-10-18:chili oil");
    }

    #[test]
    fn test_group_cost_is_one_record_per_group() {
        let mut state = planned_state();
        state.update_cart_group(
            date(),
            "TOFU",
            CartUpdate {
                cost: Some(Cost::from_units(12)),
                unit_price: Some(Cost::from_units(6)),
                ..CartUpdate::default()
            },
        );
        let entry = state.update_cart_group(
            date(),
            "tofu",
            CartUpdate {
                bought: Some(true),
                ..CartUpdate::default()
            },
        );
        assert!(entry.bought);
        assert_eq!(entry.cost, Cost::from_units(12));
        assert_eq!(state.shopping_cart.len(), 1);

        let list = state.shopping_list(date());
        assert!(list.groups[0].entry.bought);
        assert_eq!(list.total_actual, Cost::from_units(12));
        assert!(!list.groups[1].entry.bought);
    }

    #[test]
    fn test_no_plan_means_empty_list() {
        let list = AppState::default().shopping_list(date());
        assert!(list.groups.is_empty());
        assert_eq!(list.total_actual, Cost::ZERO);
    }
}
