//! Merge-on-write rules for family documents.
//!
//! When a client pushes its whole [`AppState`], the store reconciles it with
//! the stored document instead of overwriting it, so one device's push does
//! not erase what another device wrote in between:
//!
//! | Collection | Key | Rule |
//! |---|---|---|
//! | users | phone, else id | incoming record replaces the stored one |
//! | meal logs | date | entries merged per user, cooked ids unioned |
//! | shopping cart | cart key | zero cost/unit price keeps stored value, `bought` is OR-ed |
//! | recipes | id | incoming replaces the stored one |
//! | plans | date | incoming replaces the stored one unless another member holds the lease |
//!
//! Keys present only in the stored document survive every merge; stored
//! order is preserved and new keys are appended in incoming order.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::state::{AppState, CartEntry, DailyPlan, FamilyUser, MealLog, Recipe, ShoppingCart};
use crate::types::UserId;

/// Merge `incoming` into `stored`, returning the document to persist.
///
/// `writer` is the member who pushed, when the client says so; it decides
/// whether the push may touch plans that are under an active lock.
#[must_use]
pub fn merge_state(
    stored: AppState,
    incoming: AppState,
    writer: Option<&UserId>,
    now: DateTime<Utc>,
) -> AppState {
    AppState {
        recipes: merge_recipes(stored.recipes, incoming.recipes),
        plans: merge_plans(stored.plans, incoming.plans, writer, now),
        meal_logs: merge_meal_logs(stored.meal_logs, incoming.meal_logs),
        users: merge_users(stored.users, incoming.users),
        shopping_cart: merge_cart(stored.shopping_cart, incoming.shopping_cart),
    }
}

/// Union users by identity; the last record seen for a person wins.
///
/// An incoming record matches an existing one when their phone-or-id keys
/// are equal, or when they share a non-empty id. The record takes the first
/// matching slot and every later match is dropped, so one person never
/// keeps two entries.
#[must_use]
pub fn merge_users(stored: Vec<FamilyUser>, incoming: Vec<FamilyUser>) -> Vec<FamilyUser> {
    let mut merged: Vec<FamilyUser> = Vec::with_capacity(stored.len() + incoming.len());
    for user in stored.into_iter().chain(incoming) {
        match merged.iter().position(|u| user.same_person(u)) {
            Some(at) => {
                let mut index = 0;
                merged.retain(|u| {
                    let keep = index <= at || !user.same_person(u);
                    index += 1;
                    keep
                });
                if let Some(slot) = merged.get_mut(at) {
                    *slot = user;
                }
            }
            None => merged.push(user),
        }
    }
    merged
}

/// Merge meal logs per date.
#[must_use]
pub fn merge_meal_logs(stored: Vec<MealLog>, incoming: Vec<MealLog>) -> Vec<MealLog> {
    union_by_key(stored, incoming, |log| log.date, merge_one_log)
}

fn merge_one_log(mut stored: MealLog, incoming: MealLog) -> MealLog {
    for entry in incoming.entries {
        match stored.entries.iter_mut().find(|e| e.user_id == entry.user_id) {
            Some(slot) => *slot = entry,
            None => stored.entries.push(entry),
        }
    }
    for id in incoming.cooked_recipe_ids {
        if !stored.cooked_recipe_ids.contains(&id) {
            stored.cooked_recipe_ids.push(id);
        }
    }
    stored
}

/// Merge shopping cart records per key.
#[must_use]
pub fn merge_cart(mut stored: ShoppingCart, incoming: ShoppingCart) -> ShoppingCart {
    for (key, entry) in incoming {
        stored
            .entry(key)
            .and_modify(|existing| *existing = merge_cart_entry(*existing, entry))
            .or_insert(entry);
    }
    stored
}

/// Combine two records for the same cart key.
#[must_use]
pub fn merge_cart_entry(stored: CartEntry, incoming: CartEntry) -> CartEntry {
    CartEntry {
        bought: stored.bought || incoming.bought,
        cost: stored.cost.or_keep(incoming.cost),
        unit_price: stored.unit_price.or_keep(incoming.unit_price),
    }
}

/// Merge recipes by id; the incoming copy of a recipe wins.
#[must_use]
pub fn merge_recipes(stored: Vec<Recipe>, incoming: Vec<Recipe>) -> Vec<Recipe> {
    union_by_key(stored, incoming, |r| r.id.clone(), |_, new| new)
}

/// Merge plans by date.
///
/// The incoming plan replaces the stored one, except when the stored plan
/// is held by an active lease of someone other than `writer`: then the
/// stored plan is kept as is.
#[must_use]
pub fn merge_plans(
    stored: Vec<DailyPlan>,
    incoming: Vec<DailyPlan>,
    writer: Option<&UserId>,
    now: DateTime<Utc>,
) -> Vec<DailyPlan> {
    union_by_key(
        stored,
        incoming,
        |p| p.date,
        |old, new| {
            let held_by_other = old
                .active_lock(now)
                .is_some_and(|holder| Some(holder) != writer);
            if held_by_other { old } else { new }
        },
    )
}

/// Order-preserving union of two lists keyed by `key`.
///
/// Items with a key already present are combined with `combine(existing, new)`.
fn union_by_key<T, K, F, C>(stored: Vec<T>, incoming: Vec<T>, key: F, mut combine: C) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    C: FnMut(T, T) -> T,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut merged: Vec<Option<T>> = Vec::with_capacity(stored.len() + incoming.len());

    for item in stored.into_iter().chain(incoming) {
        let k = key(&item);
        if let Some(&pos) = index.get(&k)
            && let Some(slot) = merged.get_mut(pos)
            && let Some(existing) = slot.take()
        {
            *slot = Some(combine(existing, item));
        } else {
            index.insert(k, merged.len());
            merged.push(Some(item));
        }
    }

    merged.into_iter().flatten().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::plan::DEFAULT_LOCK_LEASE;
    use crate::state::LogEntry;
    use crate::types::{Cost, MealLogId, RecipeId};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn user(id: &str, phone: &str, name: &str) -> FamilyUser {
        FamilyUser {
            id: UserId::new(id),
            name: name.to_owned(),
            phone_number: phone.to_owned(),
            partner_id: None,
            color: "bg-blue-500".to_owned(),
        }
    }

    fn recipe(id: &str, title: &str) -> Recipe {
        Recipe {
            id: RecipeId::new(id),
            title: title.to_owned(),
            ..Recipe::default()
        }
    }

    fn log(date: NaiveDate, cooked: &[&str], entries: &[(&str, &str)]) -> MealLog {
        MealLog {
            id: MealLogId::generate(),
            date,
            cooked_recipe_ids: cooked.iter().map(|id| RecipeId::new(*id)).collect(),
            entries: entries
                .iter()
                .map(|(user, notes)| LogEntry {
                    user_id: UserId::new(*user),
                    notes: (*notes).to_owned(),
                    photo: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_users_with_same_phone_collapse_to_latest() {
        let merged = merge_users(
            vec![user("u1", "13800138000", "Old name")],
            vec![
                user("u9", "13800138000", "New name"),
                user("u2", "13900139000", "Bob"),
            ],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "New name");
        assert_eq!(merged[0].id, UserId::new("u9"));
        assert_eq!(merged[1].name, "Bob");
    }

    #[test]
    fn test_users_without_phone_match_by_id() {
        let merged = merge_users(
            vec![user("u1", "13800138000", "Ann")],
            vec![user("u1", "", "Ann (renamed)")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Ann (renamed)");
    }

    #[test]
    fn test_duplicates_inside_one_push_collapse() {
        let merged = merge_users(
            Vec::new(),
            vec![user("a", "1", "first"), user("b", "1", "second")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "second");
    }

    #[test]
    fn test_record_matching_two_users_leaves_one_per_phone() {
        let merged = merge_users(
            vec![
                user("u1", "13800138000", "Ann"),
                user("u2", "13900139000", "Bob"),
            ],
            vec![user("u1", "13900139000", "Ann, new phone")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, UserId::new("u1"));
        assert_eq!(merged[0].phone_number, "13900139000");
    }

    #[test]
    fn test_formatted_phone_matches_normalized_member() {
        let merged = merge_users(
            vec![user("server-id", "13800138000", "Ann")],
            vec![user("client-id", "138-0013-8000", "Ann (phone)")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Ann (phone)");
    }

    #[test]
    fn test_meal_logs_merge_per_date_and_user() {
        let stored = vec![log(day(1), &["r1"], &[("alice", "tasty"), ("bob", "salty")])];
        let stored_id = stored[0].id.clone();
        let incoming = vec![
            log(day(1), &["r2", "r1"], &[("bob", "fine after all"), ("carol", "yum")]),
            log(day(2), &["r3"], &[]),
        ];

        let merged = merge_meal_logs(stored, incoming);
        assert_eq!(merged.len(), 2);

        let first = &merged[0];
        assert_eq!(first.id, stored_id);
        assert_eq!(
            first.cooked_recipe_ids,
            vec![RecipeId::new("r1"), RecipeId::new("r2")]
        );
        let notes: Vec<_> = first.entries.iter().map(|e| e.notes.as_str()).collect();
        assert_eq!(notes, vec!["tasty", "fine after all", "yum"]);
        assert_eq!(merged[1].date, day(2));
    }

    #[test]
    fn test_cart_zero_cost_does_not_erase_recorded_cost() {
        let mut stored = ShoppingCart::new();
        stored.insert(
            "k".to_owned(),
            CartEntry {
                bought: true,
                cost: Cost::from_units(12),
                unit_price: Cost::from_units(3),
            },
        );
        let mut incoming = ShoppingCart::new();
        incoming.insert("k".to_owned(), CartEntry::default());
        incoming.insert(
            "other".to_owned(),
            CartEntry {
                bought: false,
                cost: Cost::from_units(5),
                unit_price: Cost::ZERO,
            },
        );

        let merged = merge_cart(stored, incoming);
        assert_eq!(
            merged["k"],
            CartEntry {
                bought: true,
                cost: Cost::from_units(12),
                unit_price: Cost::from_units(3),
            }
        );
        assert_eq!(merged["other"].cost, Cost::from_units(5));
    }

    #[test]
    fn test_cart_non_zero_incoming_overwrites() {
        let stored = CartEntry {
            bought: false,
            cost: Cost::ZERO,
            unit_price: Cost::from_units(2),
        };
        let incoming = CartEntry {
            bought: false,
            cost: Cost::from_units(12),
            unit_price: Cost::from_units(4),
        };
        let merged = merge_cart_entry(stored, incoming);
        assert_eq!(merged.cost, Cost::from_units(12));
        assert_eq!(merged.unit_price, Cost::from_units(4));
    }

    #[test]
    fn test_recipes_merge_by_id() {
        let merged = merge_recipes(
            vec![recipe("r1", "old"), recipe("r2", "kept")],
            vec![recipe("r1", "new"), recipe("r3", "added")],
        );
        let titles: Vec<_> = merged.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "kept", "added"]);
    }

    #[test]
    fn test_plans_respect_active_lease() {
        let mut locked = DailyPlan::new(day(18));
        locked.recipe_ids = vec![RecipeId::new("r1")];
        locked.locked_by = Some(UserId::new("alice"));
        locked.lock_expires_at = Some((now() + DEFAULT_LOCK_LEASE).timestamp_millis());

        let mut edit = DailyPlan::new(day(18));
        edit.recipe_ids = vec![RecipeId::new("r2")];

        let bob = UserId::new("bob");
        let kept = merge_plans(vec![locked.clone()], vec![edit.clone()], Some(&bob), now());
        assert_eq!(kept, vec![locked.clone()]);

        let anonymous = merge_plans(vec![locked.clone()], vec![edit.clone()], None, now());
        assert_eq!(anonymous, vec![locked.clone()]);

        let alice = UserId::new("alice");
        let replaced = merge_plans(vec![locked.clone()], vec![edit.clone()], Some(&alice), now());
        assert_eq!(replaced, vec![edit.clone()]);

        let later = now() + DEFAULT_LOCK_LEASE + Duration::seconds(1);
        let lapsed = merge_plans(vec![locked], vec![edit.clone()], Some(&bob), later);
        assert_eq!(lapsed, vec![edit]);
    }

    #[test]
    fn test_merge_state_keeps_stored_only_entries() {
        let stored = AppState {
            recipes: vec![recipe("r1", "stored")],
            users: vec![user("u1", "1", "Ann")],
            ..AppState::default()
        };
        let incoming = AppState {
            recipes: vec![recipe("r2", "incoming")],
            ..AppState::default()
        };

        let merged = merge_state(stored, incoming, None, now());
        assert_eq!(merged.recipes.len(), 2);
        assert_eq!(merged.users.len(), 1);
    }
}
