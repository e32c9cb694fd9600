//! The family document payload (`AppState`) and its collections.
//!
//! Field names follow the JSON the clients exchange (camelCase). Every
//! collection defaults to empty so partial payloads still parse.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Cost, IngredientId, MealLogId, PhoneNumber, RecipeId, UserId};

/// Shopping cart records keyed by cart key (see [`crate::shopping::group_key`]).
pub type ShoppingCart = BTreeMap<String, CartEntry>;

/// Everything a family shares, synchronized as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppState {
    pub recipes: Vec<Recipe>,
    pub plans: Vec<DailyPlan>,
    pub meal_logs: Vec<MealLog>,
    pub users: Vec<FamilyUser>,
    pub shopping_cart: ShoppingCart,
}

/// A member as recorded inside the family document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FamilyUser {
    pub id: UserId,
    pub name: String,
    /// May be empty for records written by older clients.
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<UserId>,
    pub color: String,
}

impl FamilyUser {
    /// Identity used for de-duplication: the normalized phone number, or
    /// the id when the phone is missing.
    ///
    /// A phone that does not parse is compared as written.
    #[must_use]
    pub fn identity_key(&self) -> String {
        let raw = self.phone_number.trim();
        if raw.is_empty() {
            return self.id.to_string();
        }
        PhoneNumber::parse(raw).map_or_else(|_| raw.to_owned(), |phone| phone.as_str().to_owned())
    }

    /// Whether both records describe the same person.
    #[must_use]
    pub fn same_person(&self, other: &Self) -> bool {
        self.identity_key() == other.identity_key()
            || (!self.id.is_empty() && self.id == other.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    /// Free text, e.g. "200g" or "2 pcs".
    pub amount: String,
    pub estimated_cost: Cost,
    pub purchased: bool,
    pub actual_cost: Cost,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base64 data URL or remote URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
    /// Seasoning ratios as free text.
    pub seasoning: String,
    pub tags: Vec<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
}

/// The menu for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlan {
    pub date: NaiveDate,
    #[serde(default)]
    pub recipe_ids: Vec<RecipeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<UserId>,
    /// Epoch milliseconds when the lock was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<i64>,
    /// Epoch milliseconds after which the lock no longer counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_expires_at: Option<i64>,
}

impl DailyPlan {
    /// An unlocked, empty plan for `date`.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            recipe_ids: Vec::new(),
            locked_by: None,
            locked_at: None,
            lock_expires_at: None,
        }
    }
}

/// One member's diary entry for a day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogEntry {
    pub user_id: UserId,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// What the family actually cooked and wrote down on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealLog {
    pub id: MealLogId,
    pub date: NaiveDate,
    #[serde(default)]
    pub cooked_recipe_ids: Vec<RecipeId>,
    #[serde(default)]
    pub entries: Vec<LogEntry>,
}

/// Purchase record for one shopping group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartEntry {
    pub bought: bool,
    /// Total paid for the group.
    pub cost: Cost,
    pub unit_price: Cost,
}

impl AppState {
    /// Find a recipe by id.
    #[must_use]
    pub fn recipe(&self, id: &RecipeId) -> Option<&Recipe> {
        self.recipes.iter().find(|r| &r.id == id)
    }

    /// Find the plan for a date.
    #[must_use]
    pub fn plan(&self, date: NaiveDate) -> Option<&DailyPlan> {
        self.plans.iter().find(|p| p.date == date)
    }

    /// Find the meal log for a date.
    #[must_use]
    pub fn meal_log(&self, date: NaiveDate) -> Option<&MealLog> {
        self.meal_logs.iter().find(|l| l.date == date)
    }

    /// Find a member by user id.
    #[must_use]
    pub fn user(&self, id: &UserId) -> Option<&FamilyUser> {
        self.users.iter().find(|u| &u.id == id)
    }
}
