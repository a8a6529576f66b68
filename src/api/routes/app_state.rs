//! Application state management.
//!
//! Defines the AppState struct that holds the shared storage backend, the server
//! configuration and, in PostgreSQL mode, the connection pool.

use crate::config::ServerConfig;
use crate::services::{PackageService, ResponseService};
use crate::storage::{MemoryStorageBackend, PostgresStorageBackend, StorageBackend, StorageError};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Application state shared across all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend (in-memory unless a database is configured)
    pub storage: Arc<dyn StorageBackend>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// PostgreSQL database connection pool (optional)
    pub database: Option<PgPool>,
}

impl AppState {
    /// Create application state backed by in-memory storage.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_storage(config, Arc::new(MemoryStorageBackend::new()))
    }

    /// Create application state around an existing storage backend.
    pub fn with_storage(config: ServerConfig, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            config: Arc::new(config),
            database: None,
        }
    }

    /// Initialize storage backend from configuration.
    ///
    /// Connects to PostgreSQL and runs migrations when a database URL is configured,
    /// otherwise keeps the in-memory backend.
    pub async fn init_storage(&mut self) -> Result<(), StorageError> {
        let Some(database_url) = self.config.database_url.clone() else {
            info!("DATABASE_URL not set, using in-memory storage");
            return Ok(());
        };

        let pool = PgPool::connect(&database_url).await.map_err(|e| {
            StorageError::ConnectionError(format!("Failed to connect to database: {}", e))
        })?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::ConnectionError(format!("Migration failed: {}", e)))?;

        info!("Connected to PostgreSQL storage");
        self.database = Some(pool.clone());
        self.storage = Arc::new(PostgresStorageBackend::new(pool));
        Ok(())
    }

    /// Check if PostgreSQL storage is enabled
    pub fn is_postgres(&self) -> bool {
        self.database.is_some()
    }

    pub fn package_service(&self) -> PackageService {
        PackageService::new(self.storage.clone(), self.config.pagination())
    }

    pub fn response_service(&self) -> ResponseService {
        ResponseService::new(self.storage.clone(), self.config.pagination())
    }
}
