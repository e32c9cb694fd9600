//! Daily plan editing and lease-based plan locks.
//!
//! A lock is a lease: it names the holder and an expiry. Once the expiry has
//! passed, every operation treats the plan as unlocked, so a client that
//! disappears while holding a lock cannot block the family forever.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::DomainError;
use crate::state::{AppState, DailyPlan, MealLog};
use crate::types::{MealLogId, RecipeId, UserId};

/// Default lease length for a plan lock.
pub const DEFAULT_LOCK_LEASE: Duration = Duration::minutes(30);

impl DailyPlan {
    /// The member holding an unexpired lock at `now`, if any.
    ///
    /// Locks written by clients without an expiry never lapse, matching
    /// documents created before leases existed.
    #[must_use]
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<&UserId> {
        let holder = self.locked_by.as_ref()?;
        match self.lock_expires_at {
            Some(expires) if expires <= now.timestamp_millis() => None,
            _ => Some(holder),
        }
    }

    /// Fail unless `user` may edit this plan at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PlanLocked`] when another member holds the lease.
    pub fn ensure_editable_by(&self, user: &UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.active_lock(now) {
            Some(holder) if holder != user => Err(DomainError::PlanLocked {
                date: self.date,
                holder: holder.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn clear_lock(&mut self) {
        self.locked_by = None;
        self.locked_at = None;
        self.lock_expires_at = None;
    }
}

impl AppState {
    /// Add `recipe` to the plan for `date`, or remove it if already planned.
    ///
    /// Creates the plan when none exists for the date.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PlanLocked`] if another member holds the lock.
    pub fn toggle_recipe_in_plan(
        &mut self,
        date: NaiveDate,
        recipe: &RecipeId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let Some(plan) = self.plans.iter_mut().find(|p| p.date == date) else {
            let mut plan = DailyPlan::new(date);
            plan.recipe_ids.push(recipe.clone());
            self.plans.push(plan);
            return Ok(());
        };

        plan.ensure_editable_by(user, now)?;
        if let Some(pos) = plan.recipe_ids.iter().position(|id| id == recipe) {
            plan.recipe_ids.remove(pos);
        } else {
            plan.recipe_ids.push(recipe.clone());
        }
        Ok(())
    }

    /// Lock the plan for `date` on behalf of `user` for `lease`.
    ///
    /// Re-locking by the current holder renews the lease.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PlanNotFound`] if there is no plan for the date
    /// and [`DomainError::PlanLocked`] if another member holds the lock.
    pub fn lock_plan(
        &mut self,
        date: NaiveDate,
        user: &UserId,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let plan = self
            .plans
            .iter_mut()
            .find(|p| p.date == date)
            .ok_or(DomainError::PlanNotFound(date))?;

        plan.ensure_editable_by(user, now)?;
        plan.locked_by = Some(user.clone());
        plan.locked_at = Some(now.timestamp_millis());
        plan.lock_expires_at = Some((now + lease).timestamp_millis());
        Ok(())
    }

    /// Release the lock on the plan for `date`.
    ///
    /// Unlocking an unlocked (or lapsed) plan is a no-op that also clears
    /// stale lock fields.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PlanNotFound`] if there is no plan for the date
    /// and [`DomainError::NotLockHolder`] if another member holds the lock.
    pub fn unlock_plan(
        &mut self,
        date: NaiveDate,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let plan = self
            .plans
            .iter_mut()
            .find(|p| p.date == date)
            .ok_or(DomainError::PlanNotFound(date))?;

        if let Some(holder) = plan.active_lock(now)
            && holder != user
        {
            return Err(DomainError::NotLockHolder {
                date,
                holder: holder.clone(),
            });
        }
        plan.clear_lock();
        Ok(())
    }

    /// Record the plan's recipes as cooked in the meal log for `date`.
    ///
    /// Returns the number of recipe ids newly added to the log.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PlanNotFound`] if there is no plan for the date.
    pub fn mark_plan_cooked(&mut self, date: NaiveDate) -> Result<usize, DomainError> {
        let planned = self
            .plan(date)
            .map(|p| p.recipe_ids.clone())
            .ok_or(DomainError::PlanNotFound(date))?;

        if self.meal_log(date).is_none() {
            self.meal_logs.push(MealLog {
                id: MealLogId::generate(),
                date,
                cooked_recipe_ids: Vec::new(),
                entries: Vec::new(),
            });
        }
        let log = self
            .meal_logs
            .iter_mut()
            .find(|l| l.date == date)
            .ok_or(DomainError::PlanNotFound(date))?;

        let mut added = 0;
        for id in planned {
            if !log.cooked_recipe_ids.contains(&id) {
                log.cooked_recipe_ids.push(id);
                added += 1;
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn bob() -> UserId {
        UserId::new("bob")
    }

    fn state_with_plan() -> AppState {
        let mut state = AppState::default();
        state
            .toggle_recipe_in_plan(date(), &RecipeId::new("r1"), &alice(), now())
            .unwrap();
        state
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut state = state_with_plan();
        assert_eq!(state.plan(date()).unwrap().recipe_ids, vec![RecipeId::new("r1")]);

        state
            .toggle_recipe_in_plan(date(), &RecipeId::new("r2"), &bob(), now())
            .unwrap();
        state
            .toggle_recipe_in_plan(date(), &RecipeId::new("r1"), &bob(), now())
            .unwrap();
        assert_eq!(state.plan(date()).unwrap().recipe_ids, vec![RecipeId::new("r2")]);
    }

    #[test]
    fn test_locked_plan_rejects_other_members() {
        let mut state = state_with_plan();
        state.lock_plan(date(), &alice(), DEFAULT_LOCK_LEASE, now()).unwrap();

        let err = state
            .toggle_recipe_in_plan(date(), &RecipeId::new("r2"), &bob(), now())
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::PlanLocked {
                date: date(),
                holder: alice()
            }
        );

        // The holder can still edit.
        state
            .toggle_recipe_in_plan(date(), &RecipeId::new("r2"), &alice(), now())
            .unwrap();
    }

    #[test]
    fn test_only_holder_unlocks() {
        let mut state = state_with_plan();
        state.lock_plan(date(), &alice(), DEFAULT_LOCK_LEASE, now()).unwrap();

        assert!(matches!(
            state.unlock_plan(date(), &bob(), now()),
            Err(DomainError::NotLockHolder { .. })
        ));
        assert!(matches!(
            state.lock_plan(date(), &bob(), DEFAULT_LOCK_LEASE, now()),
            Err(DomainError::PlanLocked { .. })
        ));

        state.unlock_plan(date(), &alice(), now()).unwrap();
        let plan = state.plan(date()).unwrap();
        assert!(plan.locked_by.is_none());
        assert!(plan.lock_expires_at.is_none());
    }

    #[test]
    fn test_expired_lease_counts_as_unlocked() {
        let mut state = state_with_plan();
        state.lock_plan(date(), &alice(), DEFAULT_LOCK_LEASE, now()).unwrap();

        let later = now() + DEFAULT_LOCK_LEASE + Duration::seconds(1);
        assert!(state.plan(date()).unwrap().active_lock(later).is_none());
        state
            .toggle_recipe_in_plan(date(), &RecipeId::new("r9"), &bob(), later)
            .unwrap();
        state.lock_plan(date(), &bob(), DEFAULT_LOCK_LEASE, later).unwrap();
        assert_eq!(state.plan(date()).unwrap().locked_by, Some(bob()));
    }

    #[test]
    fn test_lock_without_expiry_never_lapses() {
        let mut state = state_with_plan();
        state.plans[0].locked_by = Some(alice());
        let far_future = now() + Duration::days(3650);
        assert_eq!(state.plans[0].active_lock(far_future), Some(&alice()));
    }

    #[test]
    fn test_lock_missing_plan() {
        let mut state = AppState::default();
        assert_eq!(
            state.lock_plan(date(), &alice(), DEFAULT_LOCK_LEASE, now()),
            Err(DomainError::PlanNotFound(date()))
        );
    }

    #[test]
    fn test_mark_plan_cooked_merges_into_log() {
        let mut state = state_with_plan();
        assert_eq!(state.mark_plan_cooked(date()).unwrap(), 1);
        state
            .toggle_recipe_in_plan(date(), &RecipeId::new("r2"), &alice(), now())
            .unwrap();
        assert_eq!(state.mark_plan_cooked(date()).unwrap(), 1);
        assert_eq!(state.mark_plan_cooked(date()).unwrap(), 0);

        assert_eq!(state.meal_logs.len(), 1);
        assert_eq!(
            state.meal_log(date()).unwrap().cooked_recipe_ids,
            vec![RecipeId::new("r1"), RecipeId::new("r2")]
        );
    }
}
