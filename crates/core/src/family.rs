//! Family documents, user accounts and join requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::merge::{merge_meal_logs, merge_state, merge_users};
use crate::state::{AppState, FamilyUser};
use crate::types::{FamilyId, JoinRequestId, JoinStatus, PhoneNumber, UserId};

/// Color tag given to accounts that never picked one.
pub const DEFAULT_USER_COLOR: &str = "bg-terracotta-500";

/// A registered person. Accounts are global; families only list them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone_number: PhoneNumber,
    pub color: String,
    pub current_family_id: FamilyId,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A new account that belongs to `family`.
    ///
    /// A blank `name` becomes "User" followed by the phone's last four digits.
    #[must_use]
    pub fn new(phone: PhoneNumber, name: Option<&str>, family: FamilyId, now: DateTime<Utc>) -> Self {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_owned(),
            _ => format!("User {}", phone.last_four()),
        };
        Self {
            id: UserId::generate(),
            name,
            phone_number: phone,
            color: DEFAULT_USER_COLOR.to_owned(),
            current_family_id: family,
            created_at: now,
        }
    }

    /// The record this account contributes to a family document.
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

/// The shared document of one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub family_id: FamilyId,
    pub data: AppState,
    pub members: Vec<PhoneNumber>,
    pub owner: Option<PhoneNumber>,
    pub last_updated: DateTime<Utc>,
}

impl Family {
    /// An empty family, optionally owned by (and listing) `owner`.
    #[must_use]
    pub fn new(family_id: FamilyId, owner: Option<PhoneNumber>, now: DateTime<Utc>) -> Self {
        Self {
            family_id,
            data: AppState::default(),
            members: owner.iter().cloned().collect(),
            owner,
            last_updated: now,
        }
    }

    /// Whether `phone` is on the member list.
    #[must_use]
    pub fn is_member(&self, phone: &PhoneNumber) -> bool {
        self.members.contains(phone)
    }

    /// Add `phone` to the member list; returns `false` if already present.
    pub fn add_member(&mut self, phone: PhoneNumber) -> bool {
        if self.is_member(&phone) {
            return false;
        }
        self.members.push(phone);
        true
    }

    /// Merge a pushed state into this document (see [`crate::merge`]).
    pub fn apply_push(&mut self, incoming: AppState, writer: Option<&UserId>, now: DateTime<Utc>) {
        let stored = std::mem::take(&mut self.data);
        self.data = merge_state(stored, incoming, writer, now);
        self.last_updated = now;
    }

    /// Fold another family's data into this one as `joining` moves here.
    ///
    /// Recipes are combined (the copy already here wins when ids collide),
    /// meal logs are merged per date, users are unioned by identity with the
    /// joining account added last, and the joiner's phone becomes a member.
    /// Plans and the shopping cart of the source family are not carried over.
    pub fn absorb(&mut self, source: Option<AppState>, joining: &User, now: DateTime<Utc>) {
        let source = source.unwrap_or_default();
        let target = &mut self.data;

        for recipe in source.recipes {
            if target.recipe(&recipe.id).is_none() {
                target.recipes.push(recipe);
            }
        }

        target.meal_logs = merge_meal_logs(std::mem::take(&mut target.meal_logs), source.meal_logs);

        let users = merge_users(std::mem::take(&mut target.users), source.users);
        target.users = merge_users(users, vec![joining.to_member()]);

        self.add_member(joining.phone_number.clone());
        self.last_updated = now;
    }
}

/// A request from a user to move into another family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub from_user_phone: PhoneNumber,
    pub from_user_name: String,
    pub target_family_id: FamilyId,
    pub status: JoinStatus,
    pub created_at: DateTime<Utc>,
}

impl JoinRequest {
    /// A new pending request.
    #[must_use]
    pub fn new(
        phone: PhoneNumber,
        name: impl Into<String>,
        target: FamilyId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JoinRequestId::generate(),
            from_user_phone: phone,
            from_user_name: name.into(),
            target_family_id: target,
            status: JoinStatus::Pending,
            created_at: now,
        }
    }

    /// Check that a request from `phone` into `target` may be created.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::AlreadyMember`] or
    /// [`DomainError::DuplicateRequest`].
    pub fn ensure_can_request(
        target: &Family,
        phone: &PhoneNumber,
        has_pending: bool,
    ) -> Result<(), DomainError> {
        if target.is_member(phone) {
            return Err(DomainError::AlreadyMember);
        }
        if has_pending {
            return Err(DomainError::DuplicateRequest);
        }
        Ok(())
    }

    /// Transition `Pending -> Approved`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::RequestNotPending`] for resolved requests.
    pub fn approve(&mut self) -> Result<(), DomainError> {
        self.resolve(JoinStatus::Approved)
    }

    /// Transition `Pending -> Rejected`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::RequestNotPending`] for resolved requests.
    pub fn reject(&mut self) -> Result<(), DomainError> {
        self.resolve(JoinStatus::Rejected)
    }

    fn resolve(&mut self, to: JoinStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::RequestNotPending(self.status));
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::state::Recipe;
    use crate::types::RecipeId;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn phone(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    fn recipes(ids: &[&str]) -> Vec<Recipe> {
        ids.iter()
            .map(|id| Recipe {
                id: RecipeId::new(*id),
                title: (*id).to_owned(),
                ..Recipe::default()
            })
            .collect()
    }

    #[test]
    fn test_new_user_default_name() {
        let user = User::new(phone("13800138000"), Some("  "), FamilyId::generate(), now());
        assert_eq!(user.name, "User 8000");
        assert_eq!(user.color, DEFAULT_USER_COLOR);

        let named = User::new(phone("13800138000"), Some("Ann"), FamilyId::generate(), now());
        assert_eq!(named.name, "Ann");
    }

    #[test]
    fn test_login_shape() {
        let user = User::new(phone("13800138000"), Some("Ann"), FamilyId::parse("ABCD1234").unwrap(), now());
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["phoneNumber"], "13800138000");
        assert_eq!(json["currentFamilyId"], "ABCD1234");
        assert_eq!(json["color"], DEFAULT_USER_COLOR);
    }

    #[test]
    fn test_absorb_combines_two_families() {
        let joiner = User::new(phone("13900139000"), Some("Bob"), FamilyId::generate(), now());
        let source = AppState {
            recipes: recipes(&["a1", "a2"]),
            users: vec![joiner.to_member()],
            ..AppState::default()
        };

        let owner = User::new(phone("13800138000"), Some("Ann"), FamilyId::generate(), now());
        let mut target = Family::new(FamilyId::generate(), Some(owner.phone_number.clone()), now());
        target.data.recipes = recipes(&["b1", "b2", "b3"]);
        target.data.users = vec![owner.to_member()];

        target.absorb(Some(source), &joiner, now());

        assert_eq!(target.data.recipes.len(), 5);
        assert_eq!(target.data.users.len(), 2);
        assert_eq!(target.members.len(), 2);
        assert!(target.is_member(&joiner.phone_number));
    }

    #[test]
    fn test_absorb_injects_joiner_when_source_missing() {
        let joiner = User::new(phone("13900139000"), Some("Bob"), FamilyId::generate(), now());
        let mut target = Family::new(FamilyId::generate(), None, now());
        target.absorb(None, &joiner, now());
        assert_eq!(target.data.users, vec![joiner.to_member()]);
    }

    #[test]
    fn test_absorb_keeps_target_recipe_on_id_collision() {
        let joiner = User::new(phone("1"), None, FamilyId::generate(), now());
        let mut target = Family::new(FamilyId::generate(), None, now());
        target.data.recipes = recipes(&["shared"]);
        target.data.recipes[0].title = "target copy".to_owned();

        let mut source_recipes = recipes(&["shared"]);
        source_recipes[0].title = "source copy".to_owned();
        let source = AppState {
            recipes: source_recipes,
            ..AppState::default()
        };

        target.absorb(Some(source), &joiner, now());
        assert_eq!(target.data.recipes.len(), 1);
        assert_eq!(target.data.recipes[0].title, "target copy");
    }

    #[test]
    fn test_request_state_machine() {
        let mut request = JoinRequest::new(phone("1"), "Bob", FamilyId::generate(), now());
        request.approve().unwrap();
        assert_eq!(request.status, JoinStatus::Approved);
        assert_eq!(
            request.approve(),
            Err(DomainError::RequestNotPending(JoinStatus::Approved))
        );
        assert!(request.reject().is_err());
    }

    #[test]
    fn test_ensure_can_request() {
        let family = Family::new(FamilyId::generate(), Some(phone("1")), now());
        assert_eq!(
            JoinRequest::ensure_can_request(&family, &phone("1"), false),
            Err(DomainError::AlreadyMember)
        );
        assert_eq!(
            JoinRequest::ensure_can_request(&family, &phone("2"), true),
            Err(DomainError::DuplicateRequest)
        );
        assert!(JoinRequest::ensure_can_request(&family, &phone("2"), false).is_ok());
    }
}
