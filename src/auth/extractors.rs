use axum::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{jwt::JwtKeys, session};
use crate::{error::AppError, state::AppState, users::model::User};

/// Validated session: the live user record plus the token that proved it.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    let auth = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::InvalidToken)?.to_string();
        let keys = JwtKeys::from_ref(state);
        let user = session::validate(state.users.as_ref(), &keys, &token).await?;
        Ok(AuthUser { user, token })
    }
}
