//! `PostgreSQL` document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use chefs_journal_core::{
    AppState, DomainError, Family, FamilyId, JoinRequest, JoinRequestId, JoinStatus, PhoneNumber, User, UserId,
};

use super::{Approval, Entity, FamilyUpdate, Store, StoreError};

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    phone_number: String,
    color: String,
    current_family_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            phone_number: parse_phone(&row.phone_number)?,
            color: row.color,
            current_family_id: parse_family_id(&row.current_family_id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FamilyRow {
    family_id: String,
    data: Json<AppState>,
    members: Vec<String>,
    owner: Option<String>,
    last_updated: DateTime<Utc>,
}

impl TryFrom<FamilyRow> for Family {
    type Error = StoreError;

    fn try_from(row: FamilyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            family_id: parse_family_id(&row.family_id)?,
            data: row.data.0,
            members: row
                .members
                .iter()
                .map(|m| parse_phone(m))
                .collect::<Result<_, _>>()?,
            owner: row.owner.as_deref().map(parse_phone).transpose()?,
            last_updated: row.last_updated,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JoinRequestRow {
    id: Uuid,
    from_user_phone: String,
    from_user_name: String,
    target_family_id: String,
    status: JoinStatus,
    created_at: DateTime<Utc>,
}

impl TryFrom<JoinRequestRow> for JoinRequest {
    type Error = StoreError;

    fn try_from(row: JoinRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: JoinRequestId::from(row.id),
            from_user_phone: parse_phone(&row.from_user_phone)?,
            from_user_name: row.from_user_name,
            target_family_id: parse_family_id(&row.target_family_id)?,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

fn parse_phone(raw: &str) -> Result<PhoneNumber, StoreError> {
    PhoneNumber::parse(raw)
        .map_err(|e| StoreError::DataCorruption(format!("invalid phone in database: {e}")))
}

fn parse_family_id(raw: &str) -> Result<FamilyId, StoreError> {
    FamilyId::parse(raw)
        .map_err(|e| StoreError::DataCorruption(format!("invalid family id in database: {e}")))
}

fn map_unique_violation(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Database(e)
}

// =============================================================================
// Queries shared by transactional operations
// =============================================================================

const FAMILY_COLUMNS: &str = "family_id, data, members, owner, last_updated";
const REQUEST_COLUMNS: &str =
    "id, from_user_phone, from_user_name, target_family_id, status, created_at";

async fn lock_family(conn: &mut PgConnection, id: &FamilyId) -> Result<Option<Family>, StoreError> {
    let row = sqlx::query_as::<_, FamilyRow>(&format!(
        "SELECT {FAMILY_COLUMNS} FROM families WHERE family_id = $1 FOR UPDATE"
    ))
    .bind(id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Family::try_from).transpose()
}

/// Row-lock order for the families touched by one transaction: ascending
/// id, each id once. Every writer taking several family locks follows it.
fn lock_order<'a>(ids: impl IntoIterator<Item = &'a FamilyId>) -> Vec<&'a FamilyId> {
    let mut ids: Vec<&FamilyId> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    ids
}

async fn save_family(conn: &mut PgConnection, family: &Family) -> Result<(), StoreError> {
    let members: Vec<&str> = family.members.iter().map(PhoneNumber::as_str).collect();
    sqlx::query(
        r"
        INSERT INTO families (family_id, data, members, owner, last_updated)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (family_id) DO UPDATE
        SET data = EXCLUDED.data,
            members = EXCLUDED.members,
            owner = EXCLUDED.owner,
            last_updated = EXCLUDED.last_updated
        ",
    )
    .bind(family.family_id.as_str())
    .bind(Json(&family.data))
    .bind(members)
    .bind(family.owner.as_ref().map(PhoneNumber::as_str))
    .bind(family.last_updated)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_family(conn: &mut PgConnection, family: &Family) -> Result<(), StoreError> {
    let members: Vec<&str> = family.members.iter().map(PhoneNumber::as_str).collect();
    sqlx::query(
        r"
        INSERT INTO families (family_id, data, members, owner, last_updated)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(family.family_id.as_str())
    .bind(Json(&family.data))
    .bind(members)
    .bind(family.owner.as_ref().map(PhoneNumber::as_str))
    .bind(family.last_updated)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, "family"))?;
    Ok(())
}

async fn insert_user(conn: &mut PgConnection, user: &User) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO users (id, name, phone_number, color, current_family_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(user.id.as_str())
    .bind(&user.name)
    .bind(user.phone_number.as_str())
    .bind(&user.color)
    .bind(user.current_family_id.as_str())
    .bind(user.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique_violation(e, "phone number"))?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, phone_number, color, current_family_id, created_at
            FROM users
            WHERE phone_number = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self, user, family), fields(phone = %user.phone_number, family_id = %family.family_id))]
    async fn create_user_with_family(&self, user: &User, family: &Family) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        insert_user(&mut tx, user).await?;
        insert_family(&mut tx, family).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn family(&self, id: &FamilyId) -> Result<Option<Family>, StoreError> {
        let row = sqlx::query_as::<_, FamilyRow>(&format!(
            "SELECT {FAMILY_COLUMNS} FROM families WHERE family_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Family::try_from).transpose()
    }

    #[instrument(skip(self, update))]
    async fn update_family(
        &self,
        id: &FamilyId,
        create_missing: bool,
        update: FamilyUpdate,
    ) -> Result<Family, StoreError> {
        let mut tx = self.pool.begin().await?;

        if create_missing {
            // Concurrent first writers serialize on the row lock below.
            sqlx::query("INSERT INTO families (family_id) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        let mut family = lock_family(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Family))?;
        update(&mut family)?;
        save_family(&mut tx, &family).await?;

        tx.commit().await?;
        Ok(family)
    }

    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn create_join_request(&self, request: &JoinRequest) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO join_requests
                (id, from_user_phone, from_user_name, target_family_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(request.id.as_uuid())
        .bind(request.from_user_phone.as_str())
        .bind(&request.from_user_name)
        .bind(request.target_family_id.as_str())
        .bind(request.status)
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "pending join request"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn has_pending_request(
        &self,
        phone: &PhoneNumber,
        family: &FamilyId,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM join_requests
                WHERE from_user_phone = $1 AND target_family_id = $2 AND status = 'pending'
            )
            ",
        )
        .bind(phone.as_str())
        .bind(family.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn pending_requests(&self, family: &FamilyId) -> Result<Vec<JoinRequest>, StoreError> {
        let rows = sqlx::query_as::<_, JoinRequestRow>(&format!(
            r"
            SELECT {REQUEST_COLUMNS}
            FROM join_requests
            WHERE target_family_id = $1 AND status = 'pending'
            ORDER BY created_at
            "
        ))
        .bind(family.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(JoinRequest::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn approve_join_request(
        &self,
        id: JoinRequestId,
        now: DateTime<Utc>,
    ) -> Result<JoinRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut request = sqlx::query_as::<_, JoinRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM join_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .map(JoinRequest::try_from)
        .transpose()?
        .ok_or(StoreError::NotFound(Entity::JoinRequest))?;
        if request.status.is_terminal() {
            return Err(DomainError::RequestNotPending(request.status).into());
        }

        let mut user = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, phone_number, color, current_family_id, created_at
            FROM users
            WHERE phone_number = $1
            FOR UPDATE
            ",
        )
        .bind(request.from_user_phone.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .map(User::try_from)
        .transpose()?
        .ok_or(StoreError::NotFound(Entity::User))?;

        let mut locked = Vec::with_capacity(2);
        for family_id in lock_order([&request.target_family_id, &user.current_family_id]) {
            if let Some(family) = lock_family(&mut tx, family_id).await? {
                locked.push(family);
            }
        }
        let mut take = |id: &FamilyId| {
            locked
                .iter()
                .position(|f| &f.family_id == id)
                .map(|at| locked.swap_remove(at))
        };
        let mut target =
            take(&request.target_family_id).ok_or(StoreError::NotFound(Entity::Family))?;
        let mut source = take(&user.current_family_id);

        Approval {
            request: &mut request,
            user: &mut user,
            source: source.as_mut(),
            target: &mut target,
        }
        .apply(now)?;

        save_family(&mut tx, &target).await?;
        if let Some(source) = &source {
            save_family(&mut tx, source).await?;
        }
        sqlx::query("UPDATE users SET current_family_id = $1 WHERE id = $2")
            .bind(user.current_family_id.as_str())
            .bind(user.id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE join_requests SET status = $1 WHERE id = $2")
            .bind(request.status)
            .bind(request.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            phone = %request.from_user_phone,
            family_id = %request.target_family_id,
            "Join request approved"
        );
        Ok(request)
    }

    #[instrument(skip(self))]
    async fn reject_join_request(&self, id: JoinRequestId) -> Result<JoinRequest, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut request = sqlx::query_as::<_, JoinRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM join_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .map(JoinRequest::try_from)
        .transpose()?
        .ok_or(StoreError::NotFound(Entity::JoinRequest))?;
        request.reject()?;

        sqlx::query("UPDATE join_requests SET status = $1 WHERE id = $2")
            .bind(request.status)
            .bind(request.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(code: &str) -> FamilyId {
        FamilyId::parse(code).unwrap()
    }

    #[test]
    fn test_lock_order_is_independent_of_direction() {
        let (a, b) = (id("AAAA2222"), id("BBBB3333"));
        assert_eq!(lock_order([&a, &b]), vec![&a, &b]);
        assert_eq!(lock_order([&b, &a]), vec![&a, &b]);
    }

    #[test]
    fn test_lock_order_locks_a_shared_family_once() {
        let a = id("AAAA2222");
        assert_eq!(lock_order([&a, &a]), vec![&a]);
    }
}
