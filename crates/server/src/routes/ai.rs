//! AI proxy endpoint.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::ai::AiKind;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// `{prompt, type}`; any type other than `"image"` means text.
#[derive(Debug, Deserialize)]
pub struct AiRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Forward a prompt to Gemini and return its response.
#[instrument(skip(state, payload))]
pub async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AiRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let prompt = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Prompt is required.".to_string()))?;
    let kind = match request.kind.as_deref() {
        Some("image") => AiKind::Image,
        _ => AiKind::Text,
    };

    let response = state.ai().generate(kind, prompt).await?;
    Ok(Json(response))
}
