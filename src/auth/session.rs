//! Session token lifecycle: issue, validate, revoke.
//!
//! A token is honoured only while its signature and expiry hold *and* its
//! string is still present in the owner's valid-token set.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::{
    error::{AppError, AppResult},
    users::{model::User, repo::UserStore},
};

/// Signs a new token for `user_id` and records it in the valid-token set.
pub async fn issue(store: &dyn UserStore, keys: &JwtKeys, user_id: Uuid) -> AppResult<String> {
    let token = keys.sign(user_id)?;
    store.push_token(user_id, &token).await?;
    debug!(%user_id, "session issued");
    Ok(token)
}

/// Resolves `token` to the live user record.
pub async fn validate(store: &dyn UserStore, keys: &JwtKeys, token: &str) -> AppResult<User> {
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::InvalidToken
    })?;

    let user = store
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::InvalidToken)?;

    // disabling empties the token set, so status is checked first
    if !user.is_active() {
        warn!(user_id = %user.id, "token of inactive user");
        return Err(AppError::InactiveUser);
    }
    if !user.holds_token(token) {
        warn!(user_id = %user.id, "revoked token presented");
        return Err(AppError::RevokedToken);
    }
    Ok(user)
}

/// Drops one token from the valid-token set. Absent tokens are ignored.
pub async fn revoke(store: &dyn UserStore, user_id: Uuid, token: &str) -> AppResult<()> {
    store.pull_token(user_id, token).await?;
    info!(%user_id, "session revoked");
    Ok(())
}
