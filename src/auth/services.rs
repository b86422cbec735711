use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_dummy_blocking, verify_password_blocking},
    session,
};
use crate::{
    error::{AppError, AppResult},
    users::{
        model::{NewUser, User},
        repo::UserStore,
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are compared case-insensitively everywhere.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    if req.full_name.trim().is_empty() {
        return Err(AppError::Validation("Full name is required".into()));
    }
    if !is_valid_email(&req.email) {
        return Err(AppError::Validation("Invalid email".into()));
    }
    if req.password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }
    Ok(())
}

/// Creates an account and opens its first session.
#[instrument(skip(store, keys, req), fields(email = %req.email))]
pub async fn register(
    store: &dyn UserStore,
    keys: &JwtKeys,
    mut req: RegisterRequest,
) -> AppResult<(User, String)> {
    req.email = normalize_email(&req.email);
    validate_registration(&req)?;

    if store.find_by_email(&req.email).await?.is_some() {
        warn!("email already registered");
        return Err(AppError::EmailAlreadyExists);
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let user = store
        .insert(NewUser {
            full_name: req.full_name.trim().to_string(),
            email: req.email,
            password_hash,
        })
        .await?;

    let token = session::issue(store, keys, user.id).await?;
    info!(user_id = %user.id, "user registered");
    Ok((user, token))
}

/// Verifies credentials and opens an additional session.
#[instrument(skip(store, keys, req))]
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> AppResult<(User, String)> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }

    let Some(user) = store.find_by_email(&email).await? else {
        if let Err(e) = verify_dummy_blocking(req.password).await {
            warn!(error = ?e, "dummy password check failed");
        }
        warn!("login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password_blocking(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active() {
        warn!(user_id = %user.id, "login on disabled account");
        return Err(AppError::AccountDisabled);
    }

    let token = session::issue(store, keys, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}
