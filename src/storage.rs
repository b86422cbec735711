use std::{collections::HashMap, future::Future, time::Duration};

use anyhow::Context;
use axum::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    operation::get_object::GetObjectError,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::config::StorageConfig;

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Writes `body` at `key`, replacing any existing object.
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    /// `Ok(None)` when nothing is stored at `key`.
    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    timeout: Duration,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .with_context(|| format!("s3 {} timed out after {:?}", op, self.timeout))?
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.bounded("put_object", async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(body))
                .content_type(content_type)
                .send()
                .await
                .context("s3 put_object")?;
            Ok(())
        })
        .await
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        self.bounded("get_object", async {
            let res = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await;
            let out = match res {
                Ok(out) => out,
                Err(e) => {
                    if let Some(GetObjectError::NoSuchKey(_)) = e.as_service_error() {
                        return Ok(None);
                    }
                    return Err(anyhow::Error::new(e).context("s3 get_object"));
                }
            };
            let data = out.body.collect().await.context("s3 read body")?;
            Ok(Some(data.into_bytes()))
        })
        .await
    }
}

/// Keeps objects in memory; used by tests and local runs.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.objects.write().await.insert(key.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        Ok(self.objects.read().await.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_overwrites_objects() {
        let storage = MemoryStorage::new();
        storage
            .put_object("user/1/profile.png", Bytes::from_static(b"one"), "image/png")
            .await
            .unwrap();
        storage
            .put_object("user/1/profile.png", Bytes::from_static(b"two"), "image/png")
            .await
            .unwrap();
        let got = storage.get_object("user/1/profile.png").await.unwrap();
        assert_eq!(got, Some(Bytes::from_static(b"two")));
        assert_eq!(storage.get_object("user/2/profile.png").await.unwrap(), None);
    }
}
