//! Shopping list for a planned day.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use chefs_journal_core::shopping::{CartUpdate, ShoppingList, group_key};
use chefs_journal_core::{CartEntry, Family, FamilyId};

use super::Data;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// `?familyId=&date=` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingQuery {
    pub family_id: FamilyId,
    pub date: NaiveDate,
}

/// Update to one group's cart record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCartEntry {
    pub family_id: FamilyId,
    pub date: NaiveDate,
    /// Any spelling of the ingredient name; grouping normalizes it.
    pub name: String,
    #[serde(flatten)]
    pub update: CartUpdate,
}

/// The grouped shopping list for a date.
#[instrument(skip(state, query))]
pub async fn list(
    State(state): State<AppState>,
    query: std::result::Result<Query<ShoppingQuery>, QueryRejection>,
) -> Result<Json<Data<ShoppingList>>> {
    let Query(ShoppingQuery { family_id, date }) = query?;

    let family = state
        .store()
        .family(&family_id)
        .await?
        .ok_or_else(|| AppError::NotFound("family".to_string()))?;
    Ok(Json(Data {
        data: family.data.shopping_list(date),
    }))
}

/// Update the cart record of one group and return it.
#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SetCartEntry>, JsonRejection>,
) -> Result<Json<Data<CartEntry>>> {
    let Json(SetCartEntry {
        family_id,
        date,
        name,
        update,
    }) = payload?;
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Ingredient name is required".to_string()));
    }
    let key = group_key(date, &name);
    let now = Utc::now();

    let family = state
        .store()
        .update_family(
            &family_id,
            false,
            Box::new(move |family: &mut Family| {
                family.data.update_cart_group(date, &name, update);
                family.last_updated = now;
                Ok(())
            }),
        )
        .await?;

    Ok(Json(Data {
        data: family
            .data
            .shopping_cart
            .get(&key)
            .copied()
            .unwrap_or_default(),
    }))
}
