//! Daily plan commands.

use chrono::NaiveDate;

use chefs_journal_core::RecipeId;

use super::{CommandError, Context, print_json};

/// Add `recipe` to the plan for `date`, or remove it when already planned.
///
/// # Errors
///
/// Returns error if the plan is locked by another member.
pub async fn toggle(ctx: &Context, date: NaiveDate, recipe: &str) -> Result<(), CommandError> {
    let account = ctx.account().await?;
    let plan = ctx
        .api
        .toggle_recipe(
            &account.current_family_id,
            date,
            &RecipeId::new(recipe),
            &account.id,
        )
        .await?;
    print_json(&plan)
}

/// Lock or unlock the plan for `date`.
///
/// # Errors
///
/// Returns error if there is no plan or another member holds the lock.
pub async fn set_lock(ctx: &Context, date: NaiveDate, locked: bool) -> Result<(), CommandError> {
    let account = ctx.account().await?;
    let plan = ctx
        .api
        .set_lock(&account.current_family_id, date, &account.id, locked)
        .await?;
    print_json(&plan)
}

/// Record the plan for `date` as cooked.
///
/// # Errors
///
/// Returns error if there is no plan for the date.
pub async fn cooked(ctx: &Context, date: NaiveDate) -> Result<(), CommandError> {
    let account = ctx.account().await?;
    let log = ctx.api.mark_cooked(&account.current_family_id, date).await?;
    print_json(&log)
}
