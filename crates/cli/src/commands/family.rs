//! Join-request and member commands.

use chefs_journal_core::{FamilyId, JoinRequestId};

use super::{CommandError, Context, print_json};

fn parse_request_id(raw: &str) -> Result<JoinRequestId, CommandError> {
    raw.parse()
        .map_err(|e| CommandError::InvalidArgument(format!("request id {raw}: {e}")))
}

/// Ask to join the family `target`.
///
/// # Errors
///
/// Returns error if the code is invalid or the server refuses the request.
pub async fn request(ctx: &Context, target: &str) -> Result<(), CommandError> {
    let target =
        FamilyId::parse(target).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
    let account = ctx.account().await?;
    let request = ctx
        .api
        .request_join(&account.phone_number, &account.name, &target)
        .await?;
    print_json(&request)
}

/// Approve a pending request.
///
/// # Errors
///
/// Returns error if the id is invalid or the request is not pending.
pub async fn approve(ctx: &Context, request_id: &str) -> Result<(), CommandError> {
    let request = ctx.api.approve_join(parse_request_id(request_id)?).await?;
    print_json(&request)
}

/// Reject a pending request.
///
/// # Errors
///
/// Returns error if the id is invalid or the request is not pending.
pub async fn reject(ctx: &Context, request_id: &str) -> Result<(), CommandError> {
    let request = ctx.api.reject_join(parse_request_id(request_id)?).await?;
    print_json(&request)
}

/// List pending requests to the current family.
///
/// # Errors
///
/// Returns error if not logged in or the server cannot be reached.
pub async fn pending(ctx: &Context) -> Result<(), CommandError> {
    let account = ctx.account().await?;
    let requests = ctx.api.pending_requests(&account.current_family_id).await?;
    print_json(&requests)
}

/// List the current family's member phones and owner.
///
/// # Errors
///
/// Returns error if not logged in or the server cannot be reached.
pub async fn members(ctx: &Context) -> Result<(), CommandError> {
    let account = ctx.account().await?;
    let members = ctx.api.members(&account.current_family_id).await?;
    print_json(&members)
}
