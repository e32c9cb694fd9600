//! In-memory document store.
//!
//! All maps sit behind one mutex, so every operation (approval included) is
//! atomic with respect to every other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use chefs_journal_core::{
    DomainError, Family, FamilyId, JoinRequest, JoinRequestId, JoinStatus, PhoneNumber, User,
};

use super::{Approval, Entity, FamilyUpdate, Store, StoreError};

/// Process-local store. Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<PhoneNumber, User>,
    families: HashMap<FamilyId, Family>,
    requests: Vec<JoinRequest>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(phone).cloned())
    }

    async fn create_user_with_family(&self, user: &User, family: &Family) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(&user.phone_number) {
            return Err(StoreError::Conflict("phone number already exists".to_string()));
        }
        if inner.families.contains_key(&family.family_id) {
            return Err(StoreError::Conflict("family already exists".to_string()));
        }
        inner.users.insert(user.phone_number.clone(), user.clone());
        inner.families.insert(family.family_id.clone(), family.clone());
        Ok(())
    }

    async fn family(&self, id: &FamilyId) -> Result<Option<Family>, StoreError> {
        Ok(self.inner.lock().await.families.get(id).cloned())
    }

    async fn update_family(
        &self,
        id: &FamilyId,
        create_missing: bool,
        update: FamilyUpdate,
    ) -> Result<Family, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut family = match inner.families.get(id) {
            Some(existing) => existing.clone(),
            None if create_missing => Family::new(id.clone(), None, Utc::now()),
            None => return Err(StoreError::NotFound(Entity::Family)),
        };

        // Work on a copy so a rejected update leaves the stored document as it was.
        update(&mut family)?;
        inner.families.insert(id.clone(), family.clone());
        Ok(family)
    }

    async fn create_join_request(&self, request: &JoinRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner.requests.iter().any(|r| {
            r.status == JoinStatus::Pending
                && r.from_user_phone == request.from_user_phone
                && r.target_family_id == request.target_family_id
        });
        if duplicate {
            return Err(StoreError::Conflict("pending join request already exists".to_string()));
        }
        inner.requests.push(request.clone());
        Ok(())
    }

    async fn has_pending_request(
        &self,
        phone: &PhoneNumber,
        family: &FamilyId,
    ) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.requests.iter().any(|r| {
            r.status == JoinStatus::Pending
                && &r.from_user_phone == phone
                && &r.target_family_id == family
        }))
    }

    async fn pending_requests(&self, family: &FamilyId) -> Result<Vec<JoinRequest>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .requests
            .iter()
            .filter(|r| r.status == JoinStatus::Pending && &r.target_family_id == family)
            .cloned()
            .collect())
    }

    async fn approve_join_request(
        &self,
        id: JoinRequestId,
        now: DateTime<Utc>,
    ) -> Result<JoinRequest, StoreError> {
        let mut inner = self.inner.lock().await;

        let mut request = inner
            .requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(Entity::JoinRequest))?;
        if request.status.is_terminal() {
            return Err(DomainError::RequestNotPending(request.status).into());
        }
        let mut user = inner
            .users
            .get(&request.from_user_phone)
            .cloned()
            .ok_or(StoreError::NotFound(Entity::User))?;
        let mut target = inner
            .families
            .get(&request.target_family_id)
            .cloned()
            .ok_or(StoreError::NotFound(Entity::Family))?;
        let mut source = if user.current_family_id == target.family_id {
            None
        } else {
            inner.families.get(&user.current_family_id).cloned()
        };

        Approval {
            request: &mut request,
            user: &mut user,
            source: source.as_mut(),
            target: &mut target,
        }
        .apply(now)?;

        inner.families.insert(target.family_id.clone(), target);
        if let Some(source) = source {
            inner.families.insert(source.family_id.clone(), source);
        }
        inner.users.insert(user.phone_number.clone(), user);
        if let Some(stored) = inner.requests.iter_mut().find(|r| r.id == id) {
            stored.status = request.status;
        }
        Ok(request)
    }

    async fn reject_join_request(&self, id: JoinRequestId) -> Result<JoinRequest, StoreError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(Entity::JoinRequest))?;
        request.reject()?;
        Ok(request.clone())
    }
}
