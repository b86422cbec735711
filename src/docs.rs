use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, error::StatusMessage, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Harmony Beauty Server",
        version = "0.1.0",
        description = "The server side of Harmony Beauty."
    ),
    paths(
        auth::handlers::register,
        auth::handlers::login,
        users::handlers::get_profile,
        users::handlers::logout,
        users::handlers::update_personal_info,
        users::handlers::reset_password,
        users::handlers::upload_profile_image,
        users::handlers::stream_profile_image,
    ),
    components(schemas(
        StatusMessage,
        auth::dto::RegisterRequest,
        auth::dto::LoginRequest,
        users::dto::PublicUser,
        users::dto::TokenBody,
        users::dto::UserEnvelope,
        users::dto::PersonalInfoRequest,
        users::dto::ResetPasswordRequest,
        users::dto::ProfileImageForm,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "Profile management")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
