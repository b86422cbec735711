use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::ResetPasswordRequest,
    model::{profile_image_path, FieldUpdate, PersonalInfo, User},
    repo::{StoreError, UserStore},
};
use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        session,
    },
    error::{AppError, AppResult},
    storage::StorageClient,
};

const PROFILE_IMAGE_TYPE: &str = "image/png";

/// Ends the session that `token` belongs to; other sessions stay open.
#[instrument(skip(store, user, token), fields(user_id = %user.id))]
pub async fn logout(store: &dyn UserStore, user: &User, token: &str) -> AppResult<()> {
    session::revoke(store, user.id, token).await
}

/// Replaces full name, bio, birthday and phone number wholesale.
#[instrument(skip(store, user, info), fields(user_id = %user.id))]
pub async fn update_personal_info(
    store: &dyn UserStore,
    user: &User,
    info: PersonalInfo,
) -> AppResult<()> {
    if info.full_name.trim().is_empty() {
        return Err(AppError::Validation("Full name is required".into()));
    }
    store
        .update_fields(user.id, FieldUpdate::PersonalInfo(info))
        .await?;
    info!("personal info updated");
    Ok(())
}

/// Changes the password of the acting user. Existing sessions are kept.
#[instrument(skip(store, user, req), fields(user_id = %user.id))]
pub async fn reset_password(
    store: &dyn UserStore,
    user: &User,
    req: ResetPasswordRequest,
) -> AppResult<()> {
    if req.new_password != req.confirm_password {
        return Err(AppError::PasswordMismatch);
    }
    if req.new_password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }
    if !verify_password_blocking(req.old_password, user.password_hash.clone()).await? {
        warn!("reset password with wrong old password");
        return Err(AppError::InvalidCredentials);
    }

    let hash = hash_password_blocking(req.new_password).await?;
    store
        .update_fields(user.id, FieldUpdate::PasswordHash(hash))
        .await?;
    info!("password reset");
    Ok(())
}

/// Stores `image` at the user's fixed path and points the profile at it.
#[instrument(skip(store, storage, user, image), fields(user_id = %user.id, size = image.len()))]
pub async fn upload_profile_image(
    store: &dyn UserStore,
    storage: &dyn StorageClient,
    user: &User,
    image: Bytes,
) -> AppResult<String> {
    if image.is_empty() {
        return Err(AppError::Validation("Image file is empty".into()));
    }
    let path = profile_image_path(user.id);
    storage
        .put_object(&path, image, PROFILE_IMAGE_TYPE)
        .await
        .map_err(AppError::Storage)?;
    store
        .update_fields(user.id, FieldUpdate::ProfilePicture(path.clone()))
        .await
        .map_err(|e| match e {
            StoreError::Backend(e) => AppError::Storage(e.context("link profile image")),
            other => other.into(),
        })?;
    info!(%path, "profile image uploaded");
    Ok(path)
}

/// Reads a profile image. Public: no session is required.
#[instrument(skip(storage))]
pub async fn fetch_profile_image(storage: &dyn StorageClient, user_id: Uuid) -> AppResult<Bytes> {
    storage
        .get_object(&profile_image_path(user_id))
        .await
        .map_err(AppError::Storage)?
        .ok_or(AppError::NotFound("Profile image"))
}
