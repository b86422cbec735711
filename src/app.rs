use std::net::SocketAddr;

use axum::{http::HeaderValue, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;

use crate::{auth, docs::ApiDoc, state::AppState, users};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let max_image_bytes = state.config.max_image_bytes;

    Router::new()
        .route("/api", get(root))
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router(max_image_bytes))
                .route("/health", get(|| async { "ok" }))
                .route("/openapi.json", get(openapi)),
        )
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Harmony Beauty Server." }))
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn register(app: &Router, email: &str, password: &str) -> (String, String) {
        let res = send(
            app,
            json_req(
                "POST",
                "/api/v1/auth/register",
                None,
                json!({ "full_name": "User A", "email": email, "password": password }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"]["access_token"].as_str().unwrap().to_string(),
        )
    }

    async fn login(app: &Router, email: &str, password: &str) -> Response {
        send(
            app,
            json_req(
                "POST",
                "/api/v1/auth/login",
                None,
                json!({ "email": email, "password": password }),
            ),
        )
        .await
    }

    async fn login_token(app: &Router, email: &str, password: &str) -> String {
        let body = body_json(login(app, email, password).await).await;
        body["token"]["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_and_login_scenario() {
        let app = build_app(AppState::fake());
        let (user_id, _) = register(&app, "a@test.com", "P1").await;

        let res = login(&app, "a@test.com", "P1").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["user"]["id"], user_id.as_str());
        assert!(body["user"].get("password").is_none());
        assert!(body["token"]["access_token"].is_string());

        let res = login(&app, "a@test.com", "wrong").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(res).await;
        assert_eq!(body["status_code"], 401);
        assert_eq!(body["message"], "Incorrect email or password");
        assert!(body.get("token").is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = build_app(AppState::fake());
        register(&app, "a@test.com", "P1").await;
        let res = send(
            &app,
            json_req(
                "POST",
                "/api/v1/auth/register",
                None,
                json!({ "full_name": "Other", "email": "A@Test.Com", "password": "P2" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(res).await["status_code"], 409);
    }

    #[tokio::test]
    async fn logout_one_device_keeps_the_other() {
        let app = build_app(AppState::fake());
        register(&app, "a@test.com", "P1").await;
        let t1 = login_token(&app, "a@test.com", "P1").await;
        let t2 = login_token(&app, "a@test.com", "P1").await;

        let res = send(&app, get_req("/api/v1/user/logout", Some(&t1))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["message"], "Good Bye!");

        let res = send(&app, get_req("/api/v1/user/profile", Some(&t1))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["message"], "Token has been revoked");

        let res = send(&app, get_req("/api/v1/user/profile", Some(&t2))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["user"]["email"], "a@test.com");
        assert!(body["token"].is_null());
    }

    #[tokio::test]
    async fn missing_or_garbage_token_is_rejected() {
        let app = build_app(AppState::fake());
        let res = send(&app, get_req("/api/v1/user/profile", None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = send(&app, get_req("/api/v1/user/profile", Some("garbage"))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["status_code"], 401);
    }

    #[tokio::test]
    async fn update_personal_info_requires_all_fields() {
        let app = build_app(AppState::fake());
        let (_, token) = register(&app, "a@test.com", "P1").await;

        let res = send(
            &app,
            json_req(
                "PUT",
                "/api/v1/user/profile",
                Some(&token),
                json!({ "full_name": "New", "bio": "b", "birthday": "2000-01-01" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["status_code"], 400);

        let res = send(
            &app,
            json_req(
                "PUT",
                "/api/v1/user/profile",
                Some(&token),
                json!({
                    "full_name": "New",
                    "bio": "b",
                    "birthday": "2000-01-01",
                    "phone_number": "123"
                }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = body_json(send(&app, get_req("/api/v1/user/profile", Some(&token))).await).await;
        assert_eq!(body["user"]["full_name"], "New");
        assert_eq!(body["user"]["phone_number"], "123");
    }

    #[tokio::test]
    async fn reset_password_flow() {
        let app = build_app(AppState::fake());
        let (_, token) = register(&app, "a@test.com", "P1").await;

        let res = send(
            &app,
            json_req(
                "PUT",
                "/api/v1/user/reset-password",
                Some(&token),
                json!({ "old_password": "P1", "new_password": "N1", "confirm_password": "N2" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Passwords do not match");

        let res = send(
            &app,
            json_req(
                "PUT",
                "/api/v1/user/reset-password",
                Some(&token),
                json!({ "old_password": "P1", "new_password": "N1", "confirm_password": "N1" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        assert_eq!(login(&app, "a@test.com", "P1").await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(login(&app, "a@test.com", "N1").await.status(), StatusCode::OK);
        // the session used for the reset is still honoured
        let res = send(&app, get_req("/api/v1/user/profile", Some(&token))).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    fn multipart_req(token: &str, field: &str, data: &[u8]) -> Request<Body> {
        let boundary = "X-HARMONY-BOUNDARY";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("PUT")
            .uri("/api/v1/user/profile-image")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn profile_image_roundtrip_is_public_to_read() {
        let app = build_app(AppState::fake());
        let (user_id, token) = register(&app, "a@test.com", "P1").await;
        let image: &[u8] = b"\x89PNG\r\n\x1a\n-not-really-a-png";

        let res = send(&app, multipart_req(&token, "file", image)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["status_code"], 200);

        // no Authorization header on the read path
        let res = send(&app, get_req(&format!("/api/v1/user/{user_id}/profile.png"), None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], image);

        let body = body_json(send(&app, get_req("/api/v1/user/profile", Some(&token))).await).await;
        assert_eq!(
            body["user"]["profile_picture"],
            format!("user/{user_id}/profile.png")
        );
    }

    #[tokio::test]
    async fn upload_requires_a_session_and_a_file_field() {
        let app = build_app(AppState::fake());
        let (_, token) = register(&app, "a@test.com", "P1").await;

        let res = send(&app, multipart_req("garbage", "file", b"x")).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, multipart_req(&token, "avatar", b"x")).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_image_is_404_in_band() {
        let app = build_app(AppState::fake());
        let res = send(
            &app,
            get_req(&format!("/api/v1/user/{}/profile.png", uuid::Uuid::new_v4()), None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["status_code"], 404);

        let res = send(&app, get_req("/api/v1/user/not-a-uuid/profile.png", None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_health_and_docs() {
        let app = build_app(AppState::fake());
        let body = body_json(send(&app, get_req("/api", None)).await).await;
        assert_eq!(body["message"], "Welcome to the Harmony Beauty Server.");

        let res = send(&app, get_req("/api/v1/health", None)).await;
        assert_eq!(res.status(), StatusCode::OK);

        let doc = body_json(send(&app, get_req("/api/v1/openapi.json", None)).await).await;
        assert_eq!(doc["info"]["title"], "Harmony Beauty Server");
    }
}
