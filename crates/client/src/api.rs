//! Typed client for the Chef's Journal HTTP API.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use chefs_journal_core::shopping::{CartUpdate, ShoppingList};
use chefs_journal_core::{
    AppState, CartEntry, DailyPlan, FamilyId, FamilyUser, JoinRequest, JoinRequestId, MealLog,
    PhoneNumber, RecipeId, UserId,
};

use crate::error::ClientError;

/// The logged-in account as returned by `/api/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: UserId,
    pub phone_number: PhoneNumber,
    pub name: String,
    pub current_family_id: FamilyId,
    pub color: String,
}

impl Account {
    /// The record this account should have in its family's user list.
    #[must_use]
    pub fn to_member(&self) -> FamilyUser {
        FamilyUser {
            id: self.id.clone(),
            name: self.name.clone(),
            phone_number: self.phone_number.to_string(),
            partner_id: None,
            color: self.color.clone(),
        }
    }
}

/// Member phones and owner of a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    pub members: Vec<PhoneNumber>,
    pub owner: Option<PhoneNumber>,
}

#[derive(Deserialize)]
struct Data<T> {
    data: T,
}

#[derive(Deserialize)]
struct Success<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct LoginResponse {
    user: Account,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// The two calls a sync session needs from the server.
///
/// Implemented by [`SyncApi`]; tests substitute an in-process fake.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the family document, `None` when the family has none yet.
    async fn pull(&self, family: &FamilyId) -> Result<Option<AppState>, ClientError>;

    /// Send the whole local state for merge-on-write.
    async fn push(
        &self,
        family: &FamilyId,
        state: &AppState,
        user: Option<&UserId>,
    ) -> Result<(), ClientError>;
}

/// HTTP client for the server's JSON API.
#[derive(Debug, Clone)]
pub struct SyncApi {
    client: reqwest::Client,
    base: Url,
}

impl SyncApi {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL does not parse or the HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        // `Url::join` replaces the last path segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ClientError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    /// Log in by phone number, registering on first use.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server rejects the phone.
    #[instrument(skip(self, name))]
    pub async fn login(&self, phone: &str, name: Option<&str>) -> Result<Account, ClientError> {
        let response: LoginResponse = self
            .post("api/auth/login", &json!({ "phone": phone, "name": name }))
            .await?;
        Ok(response.user)
    }

    /// Ask to join `target`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or is refused.
    #[instrument(skip(self, name))]
    pub async fn request_join(
        &self,
        phone: &PhoneNumber,
        name: &str,
        target: &FamilyId,
    ) -> Result<JoinRequest, ClientError> {
        let body = json!({
            "action": "request",
            "phone": phone,
            "name": name,
            "targetFamilyId": target,
        });
        self.resolve_action(&body).await
    }

    /// Approve a pending request, merging the requester's family into the target.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the join request is not pending.
    #[instrument(skip(self))]
    pub async fn approve_join(&self, id: JoinRequestId) -> Result<JoinRequest, ClientError> {
        self.resolve_action(&json!({ "action": "approve", "requestId": id }))
            .await
    }

    /// Reject a pending request.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the join request is not pending.
    #[instrument(skip(self))]
    pub async fn reject_join(&self, id: JoinRequestId) -> Result<JoinRequest, ClientError> {
        self.resolve_action(&json!({ "action": "reject", "requestId": id }))
            .await
    }

    async fn resolve_action(&self, body: &Value) -> Result<JoinRequest, ClientError> {
        let response: Success<JoinRequest> = self.post("api/family/request", body).await?;
        response.data.ok_or_else(|| ClientError::Api {
            status: 200,
            message: "response carried no join request".to_string(),
        })
    }

    /// Pending join requests addressed to `family`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn pending_requests(&self, family: &FamilyId) -> Result<Vec<JoinRequest>, ClientError> {
        let response: Data<Vec<JoinRequest>> = self
            .get("api/family/request", &[("familyId", family.to_string())])
            .await?;
        Ok(response.data)
    }

    /// Member phones and owner of `family`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the family does not exist.
    pub async fn members(&self, family: &FamilyId) -> Result<Members, ClientError> {
        let response: Data<Members> = self
            .get("api/family/members", &[("familyId", family.to_string())])
            .await?;
        Ok(response.data)
    }

    /// Add or remove a recipe on a date's plan.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the plan is locked by someone else.
    pub async fn toggle_recipe(
        &self,
        family: &FamilyId,
        date: NaiveDate,
        recipe: &RecipeId,
        user: &UserId,
    ) -> Result<Option<DailyPlan>, ClientError> {
        let body = json!({
            "familyId": family,
            "date": date,
            "recipeId": recipe,
            "userId": user,
        });
        let response: Data<Option<DailyPlan>> = self.post("api/plans/toggle", &body).await?;
        Ok(response.data)
    }

    /// Lock (`locked = true`) or unlock a date's plan.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or another user holds the lock.
    pub async fn set_lock(
        &self,
        family: &FamilyId,
        date: NaiveDate,
        user: &UserId,
        locked: bool,
    ) -> Result<Option<DailyPlan>, ClientError> {
        let body = json!({
            "familyId": family,
            "date": date,
            "userId": user,
            "locked": locked,
        });
        let response: Data<Option<DailyPlan>> = self.post("api/plans/lock", &body).await?;
        Ok(response.data)
    }

    /// Record a date's plan as cooked.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or there is no plan for the date.
    pub async fn mark_cooked(&self, family: &FamilyId, date: NaiveDate) -> Result<MealLog, ClientError> {
        let body = json!({ "familyId": family, "date": date });
        let response: Data<MealLog> = self.post("api/plans/cooked", &body).await?;
        Ok(response.data)
    }

    /// Shopping list for a date.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the family does not exist.
    pub async fn shopping_list(
        &self,
        family: &FamilyId,
        date: NaiveDate,
    ) -> Result<ShoppingList, ClientError> {
        let query = [("familyId", family.to_string()), ("date", date.to_string())];
        let response: Data<ShoppingList> = self.get("api/shopping", &query).await?;
        Ok(response.data)
    }

    /// Update one shopping group's cart record.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn set_cart(
        &self,
        family: &FamilyId,
        date: NaiveDate,
        name: &str,
        update: CartUpdate,
    ) -> Result<CartEntry, ClientError> {
        let body = json!({
            "familyId": family,
            "date": date,
            "name": name,
            "bought": update.bought,
            "cost": update.cost,
            "unitPrice": update.unit_price,
        });
        let response: Data<CartEntry> = self.post("api/shopping", &body).await?;
        Ok(response.data)
    }

    /// Run a prompt through the server's AI proxy.
    ///
    /// `kind` is `"text"` or `"image"`; the raw upstream JSON is returned.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the server has no API key.
    pub async fn generate(&self, prompt: &str, kind: &str) -> Result<Value, ClientError> {
        self.post("api/ai", &json!({ "prompt": prompt, "type": kind }))
            .await
    }
}

#[async_trait]
impl RemoteStore for SyncApi {
    #[instrument(skip(self))]
    async fn pull(&self, family: &FamilyId) -> Result<Option<AppState>, ClientError> {
        let response: Data<Option<AppState>> = self
            .get("api/sync", &[("familyId", family.to_string())])
            .await?;
        Ok(response.data)
    }

    #[instrument(skip(self, state))]
    async fn push(
        &self,
        family: &FamilyId,
        state: &AppState,
        user: Option<&UserId>,
    ) -> Result<(), ClientError> {
        let body = json!({ "familyId": family, "data": state, "userId": user });
        let _: Value = self.post("api/sync", &body).await?;
        Ok(())
    }
}

/// Decode a success body, or turn an error status into `ClientError::Api`.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text).map_or(text, |body| body.error);
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}
