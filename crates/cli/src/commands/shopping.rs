//! Shopping list commands.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use chefs_journal_core::Cost;
use chefs_journal_core::shopping::CartUpdate;

use super::{CommandError, Context, print_json};

/// Show the shopping list for `date`.
///
/// # Errors
///
/// Returns error if not logged in or the family does not exist.
pub async fn list(ctx: &Context, date: NaiveDate) -> Result<(), CommandError> {
    let account = ctx.account().await?;
    let list = ctx.api.shopping_list(&account.current_family_id, date).await?;
    print_json(&list)
}

/// Update the cart record of the group `name` on `date`.
///
/// # Errors
///
/// Returns error if nothing would change or the server refuses the update.
pub async fn set(
    ctx: &Context,
    date: NaiveDate,
    name: &str,
    bought: Option<bool>,
    cost: Option<Decimal>,
    unit_price: Option<Decimal>,
) -> Result<(), CommandError> {
    let update = CartUpdate {
        bought,
        cost: cost.map(Cost::from),
        unit_price: unit_price.map(Cost::from),
    };
    if update == CartUpdate::default() {
        return Err(CommandError::InvalidArgument(
            "pass at least one of --bought, --cost, --unit-price".to_string(),
        ));
    }

    let account = ctx.account().await?;
    let entry = ctx
        .api
        .set_cart(&account.current_family_id, date, name, update)
        .await?;
    print_json(&entry)
}
