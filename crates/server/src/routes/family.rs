//! Join requests and family membership.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use chefs_journal_core::{DomainError, FamilyId, JoinRequest, JoinRequestId, PhoneNumber};

use super::sync::FamilyQuery;
use super::{Data, Success, require_family_id};
use crate::db::StoreError;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// `action = "request"` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJoinRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_family_id: Option<String>,
}

/// `action = "approve" | "reject"` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveJoinRequest {
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Who belongs to a family.
#[derive(Debug, Serialize)]
pub struct Members {
    pub members: Vec<PhoneNumber>,
    pub owner: Option<PhoneNumber>,
}

/// Pending requests into a family; empty without a valid `familyId`.
#[instrument(skip(state, query))]
pub async fn pending(
    State(state): State<AppState>,
    query: std::result::Result<Query<FamilyQuery>, QueryRejection>,
) -> Result<Json<Data<Vec<JoinRequest>>>> {
    let Ok(Query(query)) = query else {
        return Ok(Json(Data { data: Vec::new() }));
    };
    let Some(family_id) = query.family_id.as_deref().and_then(|id| FamilyId::parse(id).ok())
    else {
        return Ok(Json(Data { data: Vec::new() }));
    };

    let requests = state.store().pending_requests(&family_id).await?;
    Ok(Json(Data { data: requests }))
}

/// Dispatch on `action`: create, approve or reject a join request.
#[instrument(skip(state, payload))]
pub async fn handle_action(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Success<JoinRequest>>> {
    let Json(body) = payload?;
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let request = match action.as_str() {
        "request" => create_request(&state, parse_body(body)?).await?,
        "approve" => {
            let id = parse_request_id(parse_body(body)?)?;
            state.store().approve_join_request(id, Utc::now()).await?
        }
        "reject" => {
            let id = parse_request_id(parse_body(body)?)?;
            state.store().reject_join_request(id).await?
        }
        _ => return Err(AppError::BadRequest("Unknown action".to_string())),
    };

    tracing::info!(%action, request_id = %request.id, status = %request.status, "Join request updated");
    Ok(Json(Success::with(request)))
}

/// Member phones and owner of a family.
#[instrument(skip(state, query))]
pub async fn members(
    State(state): State<AppState>,
    query: std::result::Result<Query<FamilyQuery>, QueryRejection>,
) -> Result<Json<Data<Members>>> {
    let Query(query) = query?;
    let family_id = require_family_id(query.family_id.as_deref(), "Family ID required")?;

    let family = state
        .store()
        .family(&family_id)
        .await?
        .ok_or_else(|| AppError::NotFound("family".to_string()))?;
    Ok(Json(Data {
        data: Members {
            members: family.members,
            owner: family.owner,
        },
    }))
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn parse_request_id(body: ResolveJoinRequest) -> Result<JoinRequestId> {
    body.request_id
        .as_deref()
        .and_then(|id| id.parse::<JoinRequestId>().ok())
        .ok_or_else(|| AppError::BadRequest("Invalid request".to_string()))
}

async fn create_request(state: &AppState, body: NewJoinRequest) -> Result<JoinRequest> {
    let phone = body
        .phone
        .as_deref()
        .map(PhoneNumber::parse)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .ok_or_else(|| AppError::BadRequest("Phone number is required".to_string()))?;
    let target_id = require_family_id(body.target_family_id.as_deref(), "Target family ID required")?;

    let target = state
        .store()
        .family(&target_id)
        .await?
        .ok_or_else(|| AppError::NotFound("family".to_string()))?;
    let has_pending = state.store().has_pending_request(&phone, &target_id).await?;
    JoinRequest::ensure_can_request(&target, &phone, has_pending)?;

    let name = body
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("User {}", phone.last_four()));
    let request = JoinRequest::new(phone, name, target_id, Utc::now());

    match state.store().create_join_request(&request).await {
        Ok(()) => Ok(request),
        // Lost a race with an identical request.
        Err(StoreError::Conflict(_)) => Err(DomainError::DuplicateRequest.into()),
        Err(e) => Err(e.into()),
    }
}
