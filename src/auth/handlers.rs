use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    services,
};
use crate::{
    error::{AppResult, StatusMessage},
    json::ApiJson,
    state::AppState,
    users::dto::{PublicUser, TokenBody, UserEnvelope},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = UserEnvelope),
        (status = 400, body = StatusMessage),
        (status = 409, body = StatusMessage)
    )
)]
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserEnvelope>)> {
    let keys = JwtKeys::from_ref(&state);
    let (user, token) = services::register(state.users.as_ref(), &keys, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            user: Some(PublicUser::from(&user)),
            token: Some(TokenBody {
                access_token: token,
            }),
            status_code: StatusCode::CREATED.as_u16(),
            message: "You have successfully signed up!".into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, body = UserEnvelope),
        (status = 401, body = StatusMessage),
        (status = 403, body = StatusMessage)
    )
)]
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<UserEnvelope>> {
    let keys = JwtKeys::from_ref(&state);
    let (user, token) = services::login(state.users.as_ref(), &keys, payload).await?;
    Ok(Json(UserEnvelope {
        user: Some(PublicUser::from(&user)),
        token: Some(TokenBody {
            access_token: token,
        }),
        status_code: StatusCode::OK.as_u16(),
        message: "Welcome back!".into(),
    }))
}
