//! Image-hosting backend for registered devices
//!
//! Accepts image uploads over HTTP, writes the bytes to S3-compatible object
//! storage, and records each image's location and owning device in SQLite.

pub mod app;
pub mod db;
pub mod error;
pub mod models;
pub mod server;
pub mod storage;

pub use error::{Error, Result};
