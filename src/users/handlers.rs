use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{PersonalInfoRequest, ProfileImageForm, PublicUser, ResetPasswordRequest, UserEnvelope},
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult, StatusMessage},
    json::ApiJson,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(get_profile).put(update_personal_info))
        .route("/user/logout", get(logout))
        .route("/user/reset-password", put(reset_password))
        .route("/user/:user_id/profile.png", get(stream_profile_image))
}

pub fn write_routes(max_image_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/user/profile-image", put(upload_profile_image))
        .layer(DefaultBodyLimit::max(max_image_bytes))
}

#[utoipa::path(
    get,
    path = "/api/v1/user/profile",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, body = UserEnvelope), (status = 401, body = StatusMessage))
)]
#[instrument(skip(auth), fields(user_id = %auth.user.id))]
pub async fn get_profile(auth: AuthUser) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        user: Some(PublicUser::from(&auth.user)),
        token: None,
        status_code: StatusCode::OK.as_u16(),
        message: "Welcome to Harmony Beauty.".into(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/user/logout",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, body = StatusMessage), (status = 401, body = StatusMessage))
)]
#[instrument(skip(state, auth))]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<StatusMessage>> {
    services::logout(state.users.as_ref(), &auth.user, &auth.token).await?;
    Ok(Json(StatusMessage::ok("Good Bye!")))
}

#[utoipa::path(
    put,
    path = "/api/v1/user/profile",
    tag = "users",
    security(("bearer" = [])),
    request_body = PersonalInfoRequest,
    responses((status = 200, body = StatusMessage), (status = 400, body = StatusMessage))
)]
#[instrument(skip(state, auth, payload))]
pub async fn update_personal_info(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<PersonalInfoRequest>,
) -> AppResult<Json<StatusMessage>> {
    services::update_personal_info(state.users.as_ref(), &auth.user, payload.into()).await?;
    Ok(Json(StatusMessage::ok(
        "Your personal information has been updated successfully!",
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/user/reset-password",
    tag = "users",
    security(("bearer" = [])),
    request_body = ResetPasswordRequest,
    responses((status = 200, body = StatusMessage), (status = 400, body = StatusMessage))
)]
#[instrument(skip(state, auth, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<StatusMessage>> {
    services::reset_password(state.users.as_ref(), &auth.user, payload).await?;
    Ok(Json(StatusMessage::ok(
        "Your password has been updated successfully!",
    )))
}

/// PUT /user/profile-image (multipart, field `file`)
#[utoipa::path(
    put,
    path = "/api/v1/user/profile-image",
    tag = "users",
    security(("bearer" = [])),
    request_body(content = ProfileImageForm, content_type = "multipart/form-data"),
    responses((status = 200, body = StatusMessage), (status = 400, body = StatusMessage))
)]
#[instrument(skip(state, auth, mp))]
pub async fn upload_profile_image(
    State(state): State<AppState>,
    auth: AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<StatusMessage>> {
    let mut mp = mp.map_err(|e| AppError::Validation(e.body_text()))?;
    let mut image = None;
    loop {
        let field = match mp.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "bad multipart body");
                return Err(AppError::Validation(e.body_text()));
            }
        };
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            image = Some(data);
            break;
        }
    }
    let image = image.ok_or_else(|| AppError::Validation("file is required".into()))?;

    services::upload_profile_image(
        state.users.as_ref(),
        state.storage.as_ref(),
        &auth.user,
        image,
    )
    .await?;
    Ok(Json(StatusMessage::ok(
        "Profile picture has been uploaded successfully!",
    )))
}

/// Public avatar read; no session required.
#[utoipa::path(
    get,
    path = "/api/v1/user/{user_id}/profile.png",
    tag = "users",
    params(("user_id" = String, Path, description = "Owner of the image")),
    responses(
        (status = 200, description = "PNG image bytes"),
        (status = 404, body = StatusMessage)
    )
)]
#[instrument(skip(state))]
pub async fn stream_profile_image(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    // an id that cannot name a user cannot have an image either
    let user_id = Uuid::parse_str(&user_id).map_err(|_| AppError::NotFound("Profile image"))?;
    let image = services::fetch_profile_image(state.storage.as_ref(), user_id).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], image))
}
