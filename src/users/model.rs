use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account status, stored as `1` (active) / `0` (disabled).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Disabled,
}

impl UserStatus {
    pub fn code(self) -> i16 {
        match self {
            UserStatus::Active => 1,
            UserStatus::Disabled => 0,
        }
    }

    pub fn from_code(code: i16) -> Self {
        if code == 1 {
            UserStatus::Active
        } else {
            UserStatus::Disabled
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Regular,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Regular => "regular",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "admin" => UserRole::Admin,
            _ => UserRole::Regular,
        }
    }
}

/// User document. `password_hash` and `valid_tokens` never leave the server.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub birthday: Option<String>,
    pub bio: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub phone_number: Option<String>,
    pub status: UserStatus,
    pub role: UserRole,
    pub valid_tokens: Vec<String>,
    pub creation_date: OffsetDateTime,
    pub modified_date: OffsetDateTime,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn holds_token(&self, token: &str) -> bool {
        self.valid_tokens.iter().any(|t| t == token)
    }
}

/// Fields supplied when a user document is first inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn into_user(self, now: OffsetDateTime) -> User {
        User {
            id: Uuid::new_v4(),
            full_name: self.full_name,
            birthday: None,
            bio: None,
            email: self.email,
            password_hash: self.password_hash,
            profile_picture: None,
            phone_number: None,
            status: UserStatus::Active,
            role: UserRole::Regular,
            valid_tokens: Vec::new(),
            creation_date: now,
            modified_date: now,
        }
    }
}

/// Replacement values for the personal-info fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalInfo {
    pub full_name: String,
    pub bio: String,
    pub birthday: String,
    pub phone_number: String,
}

/// A single field-level mutation. Every variant also advances `modified_date`.
/// Disabling an account also empties its valid-token set.
#[derive(Debug, Clone)]
pub enum FieldUpdate {
    PersonalInfo(PersonalInfo),
    PasswordHash(String),
    ProfilePicture(String),
    Status(UserStatus),
}

impl FieldUpdate {
    pub fn apply(self, user: &mut User, now: OffsetDateTime) {
        match self {
            FieldUpdate::PersonalInfo(info) => {
                user.full_name = info.full_name;
                user.bio = Some(info.bio);
                user.birthday = Some(info.birthday);
                user.phone_number = Some(info.phone_number);
            }
            FieldUpdate::PasswordHash(hash) => user.password_hash = hash,
            FieldUpdate::ProfilePicture(path) => user.profile_picture = Some(path),
            FieldUpdate::Status(status) => {
                if status == UserStatus::Disabled {
                    user.valid_tokens.clear();
                }
                user.status = status;
            }
        }
        user.modified_date = now;
    }
}

/// Row as stored in Postgres.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub full_name: String,
    pub birthday: Option<String>,
    pub bio: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub phone_number: Option<String>,
    pub user_status: i16,
    pub user_role: String,
    pub valid_tokens: Vec<String>,
    pub creation_date: OffsetDateTime,
    pub modified_date: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            full_name: r.full_name,
            birthday: r.birthday,
            bio: r.bio,
            email: r.email,
            password_hash: r.password_hash,
            profile_picture: r.profile_picture,
            phone_number: r.phone_number,
            status: UserStatus::from_code(r.user_status),
            role: UserRole::parse(&r.user_role),
            valid_tokens: r.valid_tokens,
            creation_date: r.creation_date,
            modified_date: r.modified_date,
        }
    }
}

/// Deterministic blob path of a user's profile image.
pub fn profile_image_path(user_id: Uuid) -> String {
    format!("user/{}/profile.png", user_id)
}
