//! Whole-document sync.
//!
//! Clients pull the family document on a timer and push their entire local
//! state after edits. Pushes are merged into the stored document (see
//! `chefs_journal_core::merge`) rather than replacing it.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use chefs_journal_core::{AppState as FamilyState, Family, UserId};

use super::{Data, Success, require_family_id};
use crate::error::{AppError, Result};
use crate::state::AppState;

const INVALID_PAYLOAD: &str = "Invalid payload";

/// `?familyId=` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyQuery {
    pub family_id: Option<String>,
}

/// A client push.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPush {
    #[serde(default)]
    pub family_id: Option<String>,
    #[serde(default)]
    pub data: Option<FamilyState>,
    /// The member pushing; lets the holder of a plan lock edit that plan.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Pull the family document; `data` is null for unknown families.
#[instrument(skip(state, query))]
pub async fn pull(
    State(state): State<AppState>,
    query: std::result::Result<Query<FamilyQuery>, QueryRejection>,
) -> Result<Json<Data<Option<FamilyState>>>> {
    let Query(query) = query?;
    let family_id = require_family_id(query.family_id.as_deref(), "Family ID required")?;

    let family = state.store().family(&family_id).await?;
    Ok(Json(Data {
        data: family.map(|f| f.data),
    }))
}

/// Merge a pushed state into the family document, creating it if needed.
#[instrument(skip(state, payload))]
pub async fn push(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SyncPush>, JsonRejection>,
) -> Result<Json<Success>> {
    let Json(push) = payload?;
    let family_id = require_family_id(push.family_id.as_deref(), INVALID_PAYLOAD)?;
    let incoming = push
        .data
        .ok_or_else(|| AppError::BadRequest(INVALID_PAYLOAD.to_string()))?;
    let writer = push.user_id;
    let now = Utc::now();

    state
        .store()
        .update_family(
            &family_id,
            true,
            Box::new(move |family: &mut Family| {
                family.apply_push(incoming, writer.as_ref(), now);
                Ok(())
            }),
        )
        .await?;

    tracing::debug!(%family_id, "Merged push");
    Ok(Json(Success::ok()))
}
