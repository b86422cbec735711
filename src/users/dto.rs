use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::model::{PersonalInfo, User};

/// Public view of a user, never carrying the password hash or tokens.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicUser {
    pub id: Uuid,
    pub full_name: String,
    pub bio: Option<String>,
    pub birthday: Option<String>,
    pub email: String,
    pub profile_picture: Option<String>,
    pub user_status: i16,
    pub user_role: String,
    pub phone_number: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name.clone(),
            bio: u.bio.clone(),
            birthday: u.birthday.clone(),
            email: u.email.clone(),
            profile_picture: u.profile_picture.clone(),
            user_status: u.status.code(),
            user_role: u.role.as_str().to_string(),
            phone_number: u.phone_number.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenBody {
    pub access_token: String,
}

/// Envelope for responses that carry a user and optionally a token.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserEnvelope {
    pub user: Option<PublicUser>,
    pub token: Option<TokenBody>,
    pub status_code: u16,
    pub message: String,
}

/// Multipart body of the profile-image upload.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct ProfileImageForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PersonalInfoRequest {
    pub full_name: String,
    pub bio: String,
    pub birthday: String,
    pub phone_number: String,
}

impl From<PersonalInfoRequest> for PersonalInfo {
    fn from(r: PersonalInfoRequest) -> Self {
        Self {
            full_name: r.full_name,
            bio: r.bio,
            birthday: r.birthday,
            phone_number: r.phone_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::model::NewUser;
    use time::OffsetDateTime;

    #[test]
    fn public_user_hides_secrets() {
        let mut user = NewUser {
            full_name: "Test".into(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$secret".into(),
        }
        .into_user(OffsetDateTime::now_utc());
        user.valid_tokens.push("tok-123".into());

        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"user_status\":1"));
        assert!(json.contains("\"user_role\":\"regular\""));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("tok-123"));
    }

    #[test]
    fn personal_info_requires_every_field() {
        let missing = serde_json::from_str::<PersonalInfoRequest>(
            r#"{"full_name":"A","bio":"b","birthday":"2000-01-01"}"#,
        );
        assert!(missing.is_err());
    }
}
