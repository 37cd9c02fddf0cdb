//! Application wiring: configuration, collaborators, and the HTTP listener.

use crate::db::{ImageStore, SqliteStore};
use crate::models::Config;
use crate::server::{build_router, AppState};
use crate::storage::{KeyStrategy, MockStorage, ObjectStorage, S3Storage, TimestampKeys, Uploader};
use crate::Result;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// The image server: a store, an uploader, and the router built on them.
pub struct App {
    state: AppState,
    listen_addr: SocketAddr,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub store: Arc<dyn ImageStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub keys: Arc<dyn KeyStrategy>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices, config: &Config) -> Self {
        Self {
            state: AppState {
                store: services.store,
                uploader: Uploader::new(services.storage, services.keys),
                upload_device_id: config.upload_device_id,
            },
            listen_addr: config.listen_addr,
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub async fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = SqliteStore::open(&config.database_url)?;
        info!("Opened database at {}", config.database_url);

        let storage: Arc<dyn ObjectStorage> = if config.dry_run {
            info!("DRY_RUN enabled, uploads are kept in memory");
            Arc::new(MockStorage::new().with_base_url(config.s3_public_url.clone()))
        } else {
            let (access_key, secret_key) = config.s3_credentials()?;
            info!(
                "Uploading to bucket {} in {}",
                config.s3_bucket, config.aws_region
            );
            Arc::new(
                S3Storage::new(
                    access_key,
                    secret_key,
                    config.aws_region.clone(),
                    config.s3_endpoint.clone(),
                    config.s3_bucket.clone(),
                    config.s3_public_url.clone(),
                )
                .await?,
            )
        };

        if config.upload_device_id != crate::models::DEFAULT_UPLOAD_DEVICE_ID {
            warn!(
                "Uploads will be owned by device {} (UPLOAD_DEVICE_ID)",
                config.upload_device_id
            );
        }

        Ok(Self::with_services(
            AppServices {
                store: Arc::new(store),
                storage,
                keys: Arc::new(TimestampKeys),
            },
            config,
        ))
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn store(&self) -> Arc<dyn ImageStore> {
        self.state.store.clone()
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        self.serve_with_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    pub async fn serve_with_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Server is listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
