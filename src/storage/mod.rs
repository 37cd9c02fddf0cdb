//! Object storage integration for uploaded images
//!
//! Handles naming and uploading raw image bytes to S3-compatible storage,
//! returning the publicly resolvable location of each object.

pub mod client;
pub mod key;
pub mod mock;

pub use client::S3Storage;
pub use key::{KeyStrategy, TimestampKeys};
pub use mock::MockStorage;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Everything except RFC 3986 unreserved characters is escaped in a key segment.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Public URL of `key` under `base_url`, with each `/`-separated segment percent-encoded.
pub fn object_url(base_url: &str, key: &str) -> String {
    let path = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `data` under `key` and return the object's location URL.
    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;
}

/// A single file part received from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub location: String,
}

/// Names an incoming file with a [`KeyStrategy`] and writes it to an [`ObjectStorage`].
#[derive(Clone)]
pub struct Uploader {
    storage: Arc<dyn ObjectStorage>,
    keys: Arc<dyn KeyStrategy>,
}

impl Uploader {
    pub fn new(storage: Arc<dyn ObjectStorage>, keys: Arc<dyn KeyStrategy>) -> Self {
        Self { storage, keys }
    }

    pub async fn store(&self, file: UploadedFile) -> Result<StoredObject> {
        let key = self.keys.key_for(&file.field_name, &file.original_name);
        let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);

        debug!(
            "Uploading {} ({} bytes, {}) as {}",
            file.original_name,
            file.data.len(),
            content_type,
            key
        );
        let location = self.storage.put_object(&key, file.data, content_type).await?;

        Ok(StoredObject { key, location })
    }
}
