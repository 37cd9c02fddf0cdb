//! Relational persistence for devices and images
//!
//! The [`ImageStore`] trait is the repository seam used by the HTTP handlers;
//! [`SqliteStore`] backs it with a pooled SQLite database.

pub mod migrations;
pub mod pool;
pub mod queries;

pub use pool::{init_memory_pool, init_pool, DbPool};

use crate::models::{Device, Image, NewImage};
use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::Connection;

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn create_device(&self, address: &str) -> Result<Device>;
    async fn find_device_by_address(&self, address: &str) -> Result<Option<Device>>;
    async fn find_images_by_device_address(&self, address: &str) -> Result<Vec<Image>>;
    async fn find_image(&self, id: i64) -> Result<Option<Image>>;
    async fn create_image(&self, image: NewImage) -> Result<Image>;
    /// Returns the removed row, or `None` if nothing matched.
    async fn delete_image(&self, id: i64) -> Result<Option<Image>>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::new(init_pool(db_path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(init_memory_pool()?))
    }

    /// Run `f` against a pooled connection off the async executor.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool::get_conn(&pool)?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Database(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl ImageStore for SqliteStore {
    async fn create_device(&self, address: &str) -> Result<Device> {
        let address = address.to_string();
        self.with_conn(move |conn| queries::create_device(conn, &address))
            .await
    }

    async fn find_device_by_address(&self, address: &str) -> Result<Option<Device>> {
        let address = address.to_string();
        self.with_conn(move |conn| queries::find_device_by_address(conn, &address))
            .await
    }

    async fn find_images_by_device_address(&self, address: &str) -> Result<Vec<Image>> {
        let address = address.to_string();
        self.with_conn(move |conn| queries::find_images_by_device_address(conn, &address))
            .await
    }

    async fn find_image(&self, id: i64) -> Result<Option<Image>> {
        self.with_conn(move |conn| queries::find_image(conn, id))
            .await
    }

    async fn create_image(&self, image: NewImage) -> Result<Image> {
        self.with_conn(move |conn| queries::create_image(conn, &image))
            .await
    }

    async fn delete_image(&self, id: i64) -> Result<Option<Image>> {
        self.with_conn(move |conn| queries::delete_image(conn, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let device = store.create_device("a").await.unwrap();

        let image = store
            .create_image(NewImage {
                url: "https://s3/photo.png".to_string(),
                device_id: device.id,
            })
            .await
            .unwrap();

        assert_eq!(store.find_image(image.id).await.unwrap(), Some(image.clone()));
        assert_eq!(
            store.find_images_by_device_address("a").await.unwrap(),
            vec![image.clone()]
        );
        assert_eq!(store.delete_image(image.id).await.unwrap(), Some(image));
        assert!(store
            .find_images_by_device_address("a")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_shares_pool_between_clones() {
        let store = SqliteStore::in_memory().unwrap();
        let clone = store.clone();

        let device = store.create_device("shared").await.unwrap();
        assert_eq!(
            clone.find_device_by_address("shared").await.unwrap(),
            Some(device)
        );
    }
}
