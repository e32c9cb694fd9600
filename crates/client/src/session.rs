//! Background synchronization of one family's state.
//!
//! A [`SyncSession`] owns the in-memory [`AppState`] and, once started, a
//! single background task that:
//!
//! - pulls the family document on a fixed interval and replaces every
//!   top-level collection that differs from the local copy;
//! - pushes the whole local state once no change has been made for the
//!   debounce delay.
//!
//! Local edits always reach the server before a pull may replace them: a
//! pending push is flushed ahead of the timed pull, and a pull that overlaps
//! a local edit leaves the collections alone.
//!
//! There is no causality tracking: pulls and pushes race and the last
//! write wins, with the server's merge-on-write softening the loss.
//! Failures are logged and retried on the next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chefs_journal_core::{AppState, FamilyId, FamilyUser};

use crate::api::{Account, RemoteStore};
use crate::cache::LocalCache;
use crate::error::ClientError;

/// Sync timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub pull_interval: Duration,
    pub push_debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pull_interval: Duration::from_secs(3),
            push_debounce: Duration::from_secs(1),
        }
    }
}

/// Who is syncing, and which family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub family_id: FamilyId,
    /// The member record re-added to the user list when a pull drops it.
    pub user: FamilyUser,
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Self {
            family_id: account.current_family_id.clone(),
            user: account.to_member(),
        }
    }
}

/// What a pull changed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// The server had a document for the family.
    pub found: bool,
    /// Collections replaced by the remote copy.
    pub replaced: Vec<&'static str>,
    /// The current user was missing from `users` and was added back.
    pub repaired: bool,
}

impl PullOutcome {
    /// Whether the local state changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.repaired || !self.replaced.is_empty()
    }
}

/// State and collaborators shared by the session handle and its task.
struct Worker<R> {
    remote: Arc<R>,
    identity: Arc<Identity>,
    state: Arc<RwLock<AppState>>,
    cache: Option<LocalCache>,
    changed: Arc<Notify>,
    /// Bumped by every local edit.
    revision: Arc<AtomicU64>,
}

impl<R> Clone for Worker<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            identity: Arc::clone(&self.identity),
            state: Arc::clone(&self.state),
            cache: self.cache.clone(),
            changed: Arc::clone(&self.changed),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl<R: RemoteStore> Worker<R> {
    async fn pull(&self) -> Result<PullOutcome, ClientError> {
        let seen = self.revision.load(Ordering::SeqCst);
        let remote = self.remote.pull(&self.identity.family_id).await?;

        let mut outcome = PullOutcome::default();
        let mut state = self.state.write().await;
        let edited = self.revision.load(Ordering::SeqCst) != seen;
        outcome.found = remote.is_some();
        if edited {
            debug!("Local edit during pull; keeping local collections");
        }
        if let Some(remote) = remote.filter(|_| !edited) {
            let replaced = &mut outcome.replaced;
            replace_if_changed(&mut state.recipes, remote.recipes, "recipes", replaced);
            replace_if_changed(&mut state.plans, remote.plans, "plans", replaced);
            replace_if_changed(&mut state.meal_logs, remote.meal_logs, "mealLogs", replaced);
            replace_if_changed(&mut state.users, remote.users, "users", replaced);
            replace_if_changed(
                &mut state.shopping_cart,
                remote.shopping_cart,
                "shoppingCart",
                replaced,
            );
        }

        let me = &self.identity.user;
        if !state.users.iter().any(|u| u.same_person(me)) {
            state.users.push(me.clone());
            outcome.repaired = true;
        }

        let snapshot = outcome.changed().then(|| state.clone());
        drop(state);

        if let Some(snapshot) = snapshot {
            self.save_cache(&snapshot).await;
        }
        if outcome.repaired {
            debug!("Current user re-added to family users");
            self.changed.notify_one();
        }
        Ok(outcome)
    }

    async fn push(&self) -> Result<(), ClientError> {
        let snapshot = self.state.read().await.clone();
        self.remote
            .push(
                &self.identity.family_id,
                &snapshot,
                Some(&self.identity.user.id),
            )
            .await
    }

    async fn save_cache(&self, state: &AppState) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save_state(state).await {
                warn!(error = %e, "Failed to write local cache");
            }
        }
    }

    async fn run(self, config: SyncConfig, cancel: CancellationToken) {
        let mut pull = tokio::time::interval(config.pull_interval);
        pull.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut push_at: Option<Instant> = None;
        // Local state the server has not accepted yet.
        let mut unpushed = false;

        loop {
            let deadline = push_at;
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.changed.notified() => {
                    push_at = Some(Instant::now() + config.push_debounce);
                    unpushed = true;
                    pull.reset();
                }
                () = sleep_until(deadline) => {
                    push_at = None;
                    match self.push().await {
                        Ok(()) => unpushed = false,
                        Err(e) => warn!(error = %e, "Sync push failed"),
                    }
                }
                _ = pull.tick() => {
                    if unpushed {
                        if let Err(e) = self.push().await {
                            warn!(error = %e, "Sync push failed; pull skipped");
                            continue;
                        }
                        push_at = None;
                        unpushed = false;
                    }
                    if let Err(e) = self.pull().await {
                        warn!(error = %e, "Sync pull failed");
                    }
                }
            }
        }
        debug!("Sync task stopped");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn replace_if_changed<T: PartialEq>(
    local: &mut T,
    remote: T,
    name: &'static str,
    replaced: &mut Vec<&'static str>,
) {
    if *local != remote {
        *local = remote;
        replaced.push(name);
    }
}

/// A family's local state plus its background sync task.
///
/// Dropping the session cancels the task.
pub struct SyncSession<R: RemoteStore + 'static> {
    worker: Worker<R>,
    config: SyncConfig,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<R: RemoteStore + 'static> SyncSession<R> {
    /// A stopped session with empty local state.
    #[must_use]
    pub fn new(remote: Arc<R>, identity: Identity, config: SyncConfig) -> Self {
        Self {
            worker: Worker {
                remote,
                identity: Arc::new(identity),
                state: Arc::new(RwLock::new(AppState::default())),
                cache: None,
                changed: Arc::new(Notify::new()),
                revision: Arc::new(AtomicU64::new(0)),
            },
            config,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Seed local state from `cache` and keep it written as state changes.
    ///
    /// # Errors
    ///
    /// Returns error if the cached collections cannot be read.
    pub async fn with_cache(mut self, cache: LocalCache) -> Result<Self, ClientError> {
        let cached = cache.load_state().await?;
        cache.set_family_id(&self.worker.identity.family_id).await?;
        *self.worker.state.write().await = cached;
        self.worker.cache = Some(cache);
        Ok(self)
    }

    /// The family being synchronized.
    #[must_use]
    pub fn family_id(&self) -> &FamilyId {
        &self.worker.identity.family_id
    }

    /// A copy of the current local state.
    pub async fn state(&self) -> AppState {
        self.worker.state.read().await.clone()
    }

    /// Change local state; a push follows after the debounce delay.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AppState),
    {
        let snapshot = {
            let mut state = self.worker.state.write().await;
            f(&mut state);
            self.worker.revision.fetch_add(1, Ordering::SeqCst);
            state.clone()
        };
        self.worker.save_cache(&snapshot).await;
        self.worker.changed.notify_one();
    }

    /// Pull immediately, outside the timer.
    ///
    /// # Errors
    ///
    /// Returns error if the remote cannot be reached.
    pub async fn pull_now(&self) -> Result<PullOutcome, ClientError> {
        self.worker.pull().await
    }

    /// Push immediately, outside the debounce.
    ///
    /// # Errors
    ///
    /// Returns error if the remote cannot be reached.
    pub async fn push_now(&self) -> Result<(), ClientError> {
        self.worker.push().await
    }

    /// Whether the background task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start the background task. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        let worker = self.worker.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(worker.run(self.config, cancel)));
        debug!(family_id = %self.worker.identity.family_id, "Sync task started");
    }

    /// Stop the background task and wait for it to finish.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sync task ended abnormally");
            }
        }
    }
}

impl<R: RemoteStore + 'static> Drop for SyncSession<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;
    use chefs_journal_core::{Recipe, RecipeId, UserId};
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeRemote {
        doc: Mutex<Option<AppState>>,
        pushes: AtomicUsize,
        failing: AtomicBool,
        pull_delay_ms: AtomicU64,
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn pull(&self, _family: &FamilyId) -> Result<Option<AppState>, ClientError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 503,
                    message: "down".to_string(),
                });
            }
            let delay = self.pull_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Ok(self.doc.lock().await.clone())
        }

        async fn push(
            &self,
            _family: &FamilyId,
            state: &AppState,
            _user: Option<&UserId>,
        ) -> Result<(), ClientError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 503,
                    message: "down".to_string(),
                });
            }
            self.pushes.fetch_add(1, Ordering::SeqCst);
            *self.doc.lock().await = Some(state.clone());
            Ok(())
        }
    }

    fn member(id: &str, phone: &str) -> FamilyUser {
        FamilyUser {
            id: UserId::new(id),
            name: id.to_string(),
            phone_number: phone.to_string(),
            ..FamilyUser::default()
        }
    }

    fn identity() -> Identity {
        Identity {
            family_id: FamilyId::parse("ABCD2345").unwrap(),
            user: member("me", "13800138000"),
        }
    }

    fn recipe(id: &str) -> Recipe {
        Recipe {
            id: RecipeId::new(id),
            ..Recipe::default()
        }
    }

    fn quiet_config() -> SyncConfig {
        SyncConfig {
            pull_interval: Duration::from_secs(3600),
            push_debounce: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_pull_replaces_only_changed_collections() {
        let remote = Arc::new(FakeRemote::default());
        *remote.doc.lock().await = Some(AppState {
            recipes: vec![recipe("r1")],
            users: vec![member("me", "13800138000")],
            ..AppState::default()
        });
        let session = SyncSession::new(Arc::clone(&remote), identity(), quiet_config());

        let outcome = session.pull_now().await.unwrap();
        assert!(outcome.found);
        assert_eq!(outcome.replaced, vec!["recipes", "users"]);
        assert!(!outcome.repaired);

        let again = session.pull_now().await.unwrap();
        assert!(!again.changed());
        assert_eq!(session.state().await.recipes.len(), 1);
    }

    #[tokio::test]
    async fn test_pull_re_adds_missing_current_user() {
        let remote = Arc::new(FakeRemote::default());
        *remote.doc.lock().await = Some(AppState {
            users: vec![member("other", "13900139000")],
            ..AppState::default()
        });
        let session = SyncSession::new(Arc::clone(&remote), identity(), quiet_config());

        let outcome = session.pull_now().await.unwrap();
        assert!(outcome.repaired);
        let users = session.state().await.users;
        assert_eq!(users.len(), 2);
        assert!(users.iter().any(|u| u.phone_number == "13800138000"));
    }

    #[tokio::test]
    async fn test_missing_document_keeps_local_state() {
        let remote = Arc::new(FakeRemote::default());
        let session = SyncSession::new(Arc::clone(&remote), identity(), quiet_config());
        session.update(|s| s.recipes.push(recipe("local"))).await;

        let outcome = session.pull_now().await.unwrap();
        assert!(!outcome.found);
        assert_eq!(session.state().await.recipes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_are_debounced_into_one_push() {
        let remote = Arc::new(FakeRemote::default());
        let mut session = SyncSession::new(Arc::clone(&remote), identity(), quiet_config());
        session.start();
        // Let the initial pull (and its self-repair push) settle.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let baseline = remote.pushes.load(Ordering::SeqCst);

        for id in ["a", "b", "c"] {
            session.update(|s| s.recipes.push(recipe(id))).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(remote.pushes.load(Ordering::SeqCst), baseline);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(remote.pushes.load(Ordering::SeqCst), baseline + 1);
        let pushed = remote.doc.lock().await.clone().unwrap();
        assert_eq!(pushed.recipes.len(), 3);

        session.stop().await;
        assert!(!session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_before_timed_pull_survives() {
        let remote = Arc::new(FakeRemote::default());
        *remote.doc.lock().await = Some(AppState {
            recipes: vec![recipe("shared")],
            users: vec![member("me", "13800138000")],
            ..AppState::default()
        });
        let config = SyncConfig {
            pull_interval: Duration::from_secs(3),
            push_debounce: Duration::from_secs(1),
        };
        let mut session = SyncSession::new(Arc::clone(&remote), identity(), config);
        session.start();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.update(|s| s.recipes.push(recipe("fresh"))).await;
        tokio::time::sleep(Duration::from_secs(4)).await;

        let local = session.state().await;
        assert!(local.recipe(&RecipeId::new("fresh")).is_some());
        let pushed = remote.doc.lock().await.clone().unwrap();
        assert!(pushed.recipe(&RecipeId::new("fresh")).is_some());
        assert_eq!(pushed.recipes.len(), 2);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_overlapping_an_edit_keeps_local_collections() {
        let remote = Arc::new(FakeRemote::default());
        *remote.doc.lock().await = Some(AppState {
            recipes: vec![recipe("stale")],
            users: vec![member("me", "13800138000")],
            ..AppState::default()
        });
        remote.pull_delay_ms.store(1000, Ordering::SeqCst);
        let session = SyncSession::new(Arc::clone(&remote), identity(), quiet_config());

        let (outcome, ()) = tokio::join!(session.pull_now(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            session.update(|s| s.recipes.push(recipe("fresh"))).await;
        });

        let outcome = outcome.unwrap();
        assert!(outcome.found);
        assert!(outcome.replaced.is_empty());
        let recipes = session.state().await.recipes;
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes.first().unwrap().id, RecipeId::new("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_push_is_retried_before_next_pull() {
        let remote = Arc::new(FakeRemote::default());
        *remote.doc.lock().await = Some(AppState {
            recipes: vec![recipe("remote")],
            users: vec![member("me", "13800138000")],
            ..AppState::default()
        });
        remote.failing.store(true, Ordering::SeqCst);
        let config = SyncConfig {
            pull_interval: Duration::from_secs(3),
            push_debounce: Duration::from_secs(1),
        };
        let mut session = SyncSession::new(Arc::clone(&remote), identity(), config);
        session.start();
        session.update(|s| s.recipes.push(recipe("offline"))).await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(remote.pushes.load(Ordering::SeqCst), 0);
        remote.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(session.state().await.recipe(&RecipeId::new("offline")).is_some());
        let pushed = remote.doc.lock().await.clone().unwrap();
        assert!(pushed.recipe(&RecipeId::new("offline")).is_some());

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_task() {
        let remote = Arc::new(FakeRemote::default());
        remote.failing.store(true, Ordering::SeqCst);
        let config = SyncConfig {
            pull_interval: Duration::from_secs(3),
            push_debounce: Duration::from_secs(1),
        };
        let mut session = SyncSession::new(Arc::clone(&remote), identity(), config);
        session.start();

        session.update(|s| s.recipes.push(recipe("r1"))).await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(session.is_running());
        assert_eq!(remote.pushes.load(Ordering::SeqCst), 0);

        remote.failing.store(false, Ordering::SeqCst);
        session.update(|s| s.recipes.push(recipe("r2"))).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(remote.pushes.load(Ordering::SeqCst) >= 1);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_session_does_not_push() {
        let remote = Arc::new(FakeRemote::default());
        let mut session = SyncSession::new(Arc::clone(&remote), identity(), quiet_config());
        session.start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        session.stop().await;
        let before = remote.pushes.load(Ordering::SeqCst);

        session.update(|s| s.recipes.push(recipe("late"))).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remote.pushes.load(Ordering::SeqCst), before);

        session.start();
        assert!(session.is_running());
        session.stop().await;
    }

    #[tokio::test]
    async fn test_cache_is_seeded_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::open(dir.path()).await.unwrap();
        cache
            .save_state(&AppState {
                recipes: vec![recipe("cached")],
                ..AppState::default()
            })
            .await
            .unwrap();

        let remote = Arc::new(FakeRemote::default());
        let session = SyncSession::new(remote, identity(), quiet_config())
            .with_cache(cache.clone())
            .await
            .unwrap();
        assert_eq!(session.state().await.recipes.len(), 1);
        assert_eq!(cache.family_id().await.unwrap(), Some(identity().family_id));

        session.update(|s| s.recipes.push(recipe("new"))).await;
        assert_eq!(cache.load_state().await.unwrap().recipes.len(), 2);
    }
}
