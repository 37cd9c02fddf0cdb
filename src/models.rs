//! Data models and structures
//!
//! Defines the device and image records persisted in the relational store,
//! plus the environment-driven server configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// A registered client identity, addressed by an opaque string token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: i64,
    pub address: String,
}

/// Metadata for an uploaded binary living in object storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i64,
    pub url: String,
    pub device_id: i64,
}

impl Image {
    pub fn is_owned_by(&self, device: &Device) -> bool {
        self.device_id == device.id
    }
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub url: String,
    pub device_id: i64,
}

// Configuration
pub const DEFAULT_REGION: &str = "ap-northeast-2";
pub const DEFAULT_BUCKET: &str = "logichain-image-server-2";
pub const DEFAULT_PORT: u16 = 3010;
pub const DEFAULT_DATABASE_URL: &str = "images.db";
// TODO: derive the owner from the `device-address` header once uploads are authenticated.
pub const DEFAULT_UPLOAD_DEVICE_ID: i64 = 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub aws_access_key: Option<String>,
    pub aws_secret_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub s3_public_url: String,
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub upload_device_id: i64,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws_access_key: None,
            aws_secret_key: None,
            aws_region: DEFAULT_REGION.to_string(),
            s3_bucket: DEFAULT_BUCKET.to_string(),
            s3_endpoint: None,
            s3_public_url: default_public_url(DEFAULT_BUCKET, DEFAULT_REGION),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            upload_device_id: DEFAULT_UPLOAD_DEVICE_ID,
            dry_run: false,
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dry_run = lookup("DRY_RUN")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let aws_region = lookup("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let s3_bucket = lookup("S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let s3_public_url = lookup("S3_PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_public_url(&s3_bucket, &aws_region));

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| crate::Error::Config(format!("Invalid PORT '{}'", raw)))?,
            None => DEFAULT_PORT,
        };

        let upload_device_id = match lookup("UPLOAD_DEVICE_ID") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| crate::Error::Config(format!("Invalid UPLOAD_DEVICE_ID '{}'", raw)))?,
            None => DEFAULT_UPLOAD_DEVICE_ID,
        };

        Ok(Self {
            aws_access_key: lookup("AWS_ACCESS_KEY"),
            aws_secret_key: lookup("AWS_SECRET_KEY"),
            aws_region,
            s3_bucket,
            s3_endpoint: lookup("S3_ENDPOINT"),
            s3_public_url,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            upload_device_id,
            dry_run,
        })
    }

    /// Access and secret key, required whenever uploads go to real S3.
    pub fn s3_credentials(&self) -> crate::Result<(String, String)> {
        let access_key = self
            .aws_access_key
            .clone()
            .ok_or_else(|| crate::Error::Config("AWS_ACCESS_KEY not set".to_string()))?;
        let secret_key = self
            .aws_secret_key
            .clone()
            .ok_or_else(|| crate::Error::Config("AWS_SECRET_KEY not set".to_string()))?;
        Ok((access_key, secret_key))
    }
}

fn default_public_url(bucket: &str, region: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com", bucket, region)
}
