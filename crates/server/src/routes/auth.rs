//! Phone-number login.
//!
//! There is no password or verification step: the phone number is the
//! identity. The first login registers the account and gives it a fresh
//! family of its own.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chefs_journal_core::{Family, FamilyId, PhoneNumber, User, UserId};

use crate::db::StoreError;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The account as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub phone_number: PhoneNumber,
    pub name: String,
    pub current_family_id: FamilyId,
    pub color: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            phone_number: user.phone_number,
            name: user.name,
            current_family_id: user.current_family_id,
            color: user.color,
        }
    }
}

/// Response to a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserView,
}

/// Log in by phone number, registering the account on first use.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(form) = payload?;
    let raw_phone = form
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Phone number is required".to_string()))?;
    let phone = PhoneNumber::parse(raw_phone).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = match state.store().find_user_by_phone(&phone).await? {
        Some(user) => user,
        None => register(&state, phone, form.name.as_deref()).await?,
    };

    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.id.to_string()),
            ..Default::default()
        }));
    });

    Ok(Json(LoginResponse {
        success: true,
        user: user.into(),
    }))
}

/// Create the account and its own family, listing the owner as a member.
async fn register(state: &AppState, phone: PhoneNumber, name: Option<&str>) -> Result<User> {
    let now = Utc::now();
    let family_id = FamilyId::generate();
    let user = User::new(phone, name, family_id.clone(), now);
    let mut family = Family::new(family_id, Some(user.phone_number.clone()), now);
    family.data.users.push(user.to_member());

    match state.store().create_user_with_family(&user, &family).await {
        Ok(()) => {
            tracing::info!(family_id = %family.family_id, "Registered new user");
            Ok(user)
        }
        // A concurrent first login for the same phone won the race.
        Err(StoreError::Conflict(_)) => state
            .store()
            .find_user_by_phone(&user.phone_number)
            .await?
            .ok_or_else(|| AppError::Internal("registration conflict without a user".to_string())),
        Err(e) => Err(e.into()),
    }
}
