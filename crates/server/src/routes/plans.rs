//! Server-side plan edits.
//!
//! These run inside the family's write lock, so lock checks and edits are
//! atomic. Clients that only sync whole documents still get lock protection
//! from the plan merge rule.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use chefs_journal_core::{DailyPlan, Family, FamilyId, MealLog, RecipeId, UserId};

use super::Data;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Toggle one recipe on a date's plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePlan {
    pub family_id: FamilyId,
    pub date: NaiveDate,
    pub recipe_id: RecipeId,
    pub user_id: UserId,
}

/// Lock (`locked = true`) or unlock a date's plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockPlan {
    pub family_id: FamilyId,
    pub date: NaiveDate,
    pub user_id: UserId,
    pub locked: bool,
}

/// Mark a date's plan as cooked.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookPlan {
    pub family_id: FamilyId,
    pub date: NaiveDate,
}

/// Add or remove a recipe; 409 while another member holds the lock.
#[instrument(skip(state, payload))]
pub async fn toggle(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TogglePlan>, JsonRejection>,
) -> Result<Json<Data<Option<DailyPlan>>>> {
    let Json(TogglePlan {
        family_id,
        date,
        recipe_id,
        user_id,
    }) = payload?;
    let now = Utc::now();

    let family = state
        .store()
        .update_family(
            &family_id,
            false,
            Box::new(move |family: &mut Family| {
                family
                    .data
                    .toggle_recipe_in_plan(date, &recipe_id, &user_id, now)?;
                family.last_updated = now;
                Ok(())
            }),
        )
        .await?;

    Ok(Json(Data {
        data: family.data.plan(date).cloned(),
    }))
}

/// Lock or unlock a plan. Locks carry the configured lease.
#[instrument(skip(state, payload))]
pub async fn lock(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LockPlan>, JsonRejection>,
) -> Result<Json<Data<Option<DailyPlan>>>> {
    let Json(LockPlan {
        family_id,
        date,
        user_id,
        locked,
    }) = payload?;
    let lease = state.lock_lease();
    let now = Utc::now();

    let family = state
        .store()
        .update_family(
            &family_id,
            false,
            Box::new(move |family: &mut Family| {
                if locked {
                    family.data.lock_plan(date, &user_id, lease, now)?;
                } else {
                    family.data.unlock_plan(date, &user_id, now)?;
                }
                family.last_updated = now;
                Ok(())
            }),
        )
        .await?;

    tracing::info!(%family_id, %date, locked, "Plan lock changed");
    Ok(Json(Data {
        data: family.data.plan(date).cloned(),
    }))
}

/// Copy the plan's recipes into the day's meal log.
#[instrument(skip(state, payload))]
pub async fn cooked(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CookPlan>, JsonRejection>,
) -> Result<Json<Data<MealLog>>> {
    let Json(CookPlan { family_id, date }) = payload?;
    let now = Utc::now();

    let family = state
        .store()
        .update_family(
            &family_id,
            false,
            Box::new(move |family: &mut Family| {
                let added = family.data.mark_plan_cooked(date)?;
                tracing::debug!(added, "Recipes marked cooked");
                family.last_updated = now;
                Ok(())
            }),
        )
        .await?;

    family
        .data
        .meal_log(date)
        .cloned()
        .map(|log| Json(Data { data: log }))
        .ok_or_else(|| AppError::Internal("meal log missing after cooking".to_string()))
}
