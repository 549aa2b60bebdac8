//! Write-only object storage for snapshots.
//!
//! Backends:
//! - `Local`: a bucket is a directory under `STORAGE_DIR`.
//! - `S3`: an S3-compatible endpoint such as MinIO, addressed path-style and
//!   signed with the configured access and secret key.
//!
//! `SnapshotWriter` owns naming and metrics; the backends only move bytes.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use s3::{creds::Credentials, region::Region, Bucket, BucketConfiguration};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::{
    errors::{StorageError, StorageResult},
    metrics::{storage_op, Metrics},
    models::Snapshot,
};

// ---

const OBJECT_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone)]
pub enum ObjectStore {
    Local(LocalStore),
    S3(S3Store),
}

impl ObjectStore {
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::S3(_) => "s3",
        }
    }

    /// Create the bucket if it does not exist. Returns `true` if it was created.
    pub async fn ensure_bucket(&self) -> StorageResult<bool> {
        match self {
            Self::Local(s) => s.ensure_bucket().await,
            Self::S3(s) => s.ensure_bucket().await,
        }
    }

    /// Put `body` under `name`. Fails if `name` already exists where the
    /// backend can tell.
    pub async fn put(&self, name: &str, body: Vec<u8>) -> StorageResult<()> {
        match self {
            Self::Local(s) => s.put(name, body).await,
            Self::S3(s) => s.put(name, body).await,
        }
    }
}

// ---

#[derive(Debug, Clone)]
pub struct LocalStore {
    bucket_dir: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            bucket_dir: root.as_ref().join(bucket),
        }
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    async fn ensure_bucket(&self) -> StorageResult<bool> {
        // ---
        if tokio::fs::try_exists(&self.bucket_dir).await? {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&self.bucket_dir).await?;
        Ok(true)
    }

    async fn put(&self, name: &str, body: Vec<u8>) -> StorageResult<()> {
        // ---
        let path = self.bucket_dir.join(name);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(&body).await?;
        file.flush().await?;
        Ok(())
    }
}

// ---

/// Access and secret key pair for signed S3 requests.
#[derive(Debug, Clone, Copy)]
pub struct S3Keys<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

#[derive(Debug, Clone)]
pub struct S3Store {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
}

impl S3Store {
    /// Path-style client for `bucket` at `endpoint`. Requests are signed with
    /// `keys`, or sent anonymously without them.
    pub fn new(
        endpoint: &str,
        bucket: &str,
        region: &str,
        keys: Option<S3Keys<'_>>,
        timeout: Duration,
    ) -> StorageResult<Self> {
        // ---
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        };
        let credentials = match keys {
            Some(keys) => Credentials::new(
                Some(keys.access_key),
                Some(keys.secret_key),
                None,
                None,
                None,
            )?,
            None => Credentials::anonymous()?,
        };

        let mut bucket =
            Bucket::new(bucket, region.clone(), credentials.clone())?.with_path_style();
        bucket.set_request_timeout(Some(timeout));

        Ok(Self {
            bucket,
            region,
            credentials,
        })
    }

    async fn ensure_bucket(&self) -> StorageResult<bool> {
        // ---
        if self.bucket.exists().await? {
            return Ok(false);
        }

        let created = Bucket::create_with_path_style(
            &self.bucket.name,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await?;
        if !created.success() {
            return Err(StorageError::Rejected {
                operation: "create bucket",
                status: created.response_code,
            });
        }
        Ok(true)
    }

    async fn put(&self, name: &str, body: Vec<u8>) -> StorageResult<()> {
        // ---
        let response = self
            .bucket
            .put_object_with_content_type(name, &body, "application/json")
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Rejected {
                operation: "put object",
                status,
            });
        }
        Ok(())
    }
}

// ---

/// Hands out `temperature_{%Y-%m-%d_%H-%M-%S}.json` names, adding a `_{n}`
/// suffix for repeats within the same second so no two calls collide.
#[derive(Debug, Default)]
pub struct ObjectNamer {
    last: Mutex<(String, u32)>,
}

impl ObjectNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&self, now: DateTime<Utc>) -> String {
        // ---
        let stamp = now.format(OBJECT_TIME_FORMAT).to_string();
        let mut last = self.last.lock();

        if last.0 == stamp {
            last.1 += 1;
            format!("temperature_{}_{}.json", stamp, last.1)
        } else {
            *last = (stamp.clone(), 0);
            format!("temperature_{}.json", stamp)
        }
    }
}

/// Serializes snapshots into the object store and keeps the storage
/// counters current.
pub struct SnapshotWriter {
    // ---
    store: ObjectStore,
    namer: ObjectNamer,
    metrics: Metrics,
}

impl SnapshotWriter {
    pub fn new(store: ObjectStore, metrics: Metrics) -> Self {
        Self {
            store,
            namer: ObjectNamer::new(),
            metrics,
        }
    }

    /// Create the bucket on startup; logs and counts a creation.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        // ---
        if self.store.ensure_bucket().await? {
            info!("Created {} storage bucket", self.store.provider_name());
            self.metrics.record_storage(storage_op::BUCKET_CREATION);
        }
        Ok(())
    }

    /// Persist `snapshot` under a fresh timestamped name and return the name.
    pub async fn persist(&self, snapshot: &Snapshot) -> StorageResult<String> {
        // ---
        let name = self.namer.next_name(Utc::now());

        let result = async {
            let body = serde_json::to_vec(snapshot)?;
            self.store.put(&name, body).await
        }
        .await;

        match result {
            Ok(()) => {
                info!("Stored temperature snapshot: {}", name);
                self.metrics.record_storage(storage_op::DATA_STORAGE);
                Ok(name)
            }
            Err(e) => {
                error!("Error storing snapshot {}: {}", name, e);
                self.metrics.record_storage(storage_op::DATA_STORAGE_FAILURE);
                Err(e)
            }
        }
    }
}
