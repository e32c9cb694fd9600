//! Login and synchronization commands.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use chefs_journal_client::{Identity, SyncApi, SyncSession};
use chefs_journal_core::PhoneNumber;

use super::{CommandError, Context, print_json};

/// Log in and remember the phone and family in the cache.
///
/// # Errors
///
/// Returns error if the phone is invalid or the server refuses the login.
pub async fn login(ctx: &Context, phone: &str, name: Option<&str>) -> Result<(), CommandError> {
    let phone =
        PhoneNumber::parse(phone).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
    let account = ctx.api.login(phone.as_str(), name).await?;

    ctx.cache.set_phone(&account.phone_number).await?;
    ctx.cache.set_family_id(&account.current_family_id).await?;
    tracing::info!(family_id = %account.current_family_id, "Logged in as {}", account.name);
    print_json(&account)
}

async fn open_session(ctx: &Context) -> Result<SyncSession<SyncApi>, CommandError> {
    let account = ctx.account().await?;
    let identity = Identity::from(&account);
    let session = SyncSession::new(Arc::clone(&ctx.api), identity, ctx.config.sync())
        .with_cache(ctx.cache.clone())
        .await?;
    Ok(session)
}

/// Pull once into the cache, pushing back if the current user had to be re-added.
///
/// # Errors
///
/// Returns error if not logged in or the server cannot be reached.
pub async fn pull(ctx: &Context) -> Result<(), CommandError> {
    let session = open_session(ctx).await?;
    let outcome = session.pull_now().await?;
    if outcome.repaired {
        session.push_now().await?;
    }

    let state = session.state().await;
    print_json(&json!({
        "familyId": session.family_id(),
        "found": outcome.found,
        "replaced": outcome.replaced,
        "repaired": outcome.repaired,
        "recipes": state.recipes.len(),
        "plans": state.plans.len(),
        "mealLogs": state.meal_logs.len(),
        "users": state.users.len(),
    }))
}

/// Run the sync task until the duration elapses or Ctrl+C.
///
/// # Errors
///
/// Returns error if not logged in or the cache cannot be read.
pub async fn sync(ctx: &Context, duration: Option<u64>) -> Result<(), CommandError> {
    let mut session = open_session(ctx).await?;
    session.start();
    tracing::info!(family_id = %session.family_id(), "Syncing");

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        () = deadline => {},
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            }
        }
    }

    session.stop().await;
    let state = session.state().await;
    tracing::info!(
        recipes = state.recipes.len(),
        plans = state.plans.len(),
        users = state.users.len(),
        "Sync stopped"
    );
    Ok(())
}
