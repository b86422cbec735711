use anyhow::Context;
use serde::Deserialize;

/// Origins always allowed by CORS, extended with `CORS_ORIGINS`.
const DEV_ORIGINS: [&str; 4] = [
    "http://127.0.0.1:8000",
    "http://127.0.0.1:3000",
    "http://localhost:8000",
    "http://localhost:3000",
];

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-memory user store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// `None` selects in-memory blob storage.
    pub storage: Option<StorageConfig>,
    pub cors_origins: Vec<String>,
    pub max_image_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "harmony".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "harmony-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        let storage = match std::env::var("S3_ENDPOINT") {
            Ok(endpoint) => Some(StorageConfig {
                endpoint,
                bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "profile-images".into()),
                access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY must be set")?,
                secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY must be set")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                timeout_secs: env_parse("STORAGE_TIMEOUT_SECS", 10),
            }),
            Err(_) => None,
        };
        let cors_origins = merge_origins(std::env::var("CORS_ORIGINS").ok().as_deref());

        Ok(Self {
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            database_acquire_timeout_secs: env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 5),
            jwt,
            storage,
            cors_origins,
            max_image_bytes: env_parse("MAX_IMAGE_BYTES", 5 * 1024 * 1024),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn merge_origins(extra: Option<&str>) -> Vec<String> {
    let mut origins: Vec<String> = DEV_ORIGINS.iter().map(|o| o.to_string()).collect();
    if let Some(extra) = extra {
        origins.extend(
            extra
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from),
        );
    }
    origins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_origins_always_present() {
        let origins = merge_origins(None);
        assert_eq!(origins.len(), 4);
        assert!(origins.contains(&"http://localhost:3000".to_string()));
    }

    #[test]
    fn extra_origins_are_trimmed_and_appended() {
        let origins = merge_origins(Some(" https://app.example.com , ,https://admin.example.com"));
        assert_eq!(origins.len(), 6);
        assert_eq!(origins[4], "https://app.example.com");
        assert_eq!(origins[5], "https://admin.example.com");
    }
}
