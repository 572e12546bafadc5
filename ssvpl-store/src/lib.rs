pub mod admin_repo;
pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;

use std::sync::Arc;

use ssvpl_core::{AdminRepository, HealthCheck, ProductRepository};
use thiserror::Error;

pub use admin_repo::StoreAdminRepository;
pub use catalog_repo::StoreProductRepository;
pub use database::DbClient;
pub use memory::{MemoryAdminRepository, MemoryHealthCheck, MemoryProductRepository};

use app_config::DatabaseConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// The persistence collaborators the API is wired with.
#[derive(Clone)]
pub struct Repositories {
    pub admins: Arc<dyn AdminRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub health: Arc<dyn HealthCheck>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            admins: Arc::new(MemoryAdminRepository::new()),
            products: Arc::new(MemoryProductRepository::new()),
            health: Arc::new(MemoryHealthCheck::new()),
        }
    }

    /// Connects to Postgres and applies pending migrations, or builds the
    /// in-process store for `memory://`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if config.is_memory() {
            tracing::warn!("Using in-memory store; data is lost on restart");
            return Ok(Self::in_memory());
        }

        let db = DbClient::new(config).await?;
        db.migrate().await?;

        Ok(Self {
            admins: Arc::new(StoreAdminRepository::new(db.pool.clone())),
            products: Arc::new(StoreProductRepository::new(db.pool.clone())),
            health: Arc::new(db),
        })
    }
}
