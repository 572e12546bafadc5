use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use ssvpl_catalog::{Product, ProductCategory, StockAdjustment, StockError, StockTransaction};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::identity::AdminIdentity;

/// Errors raised by the persistence and credential-store collaborators
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Internal(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Runs an upstream call under `limit`; a timeout surfaces as `Unavailable`.
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, fut: F) -> RepositoryResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", operation, limit);
            Err(RepositoryError::Unavailable(format!("{} timed out", operation)))
        }
    }
}

/// Credential store for administrator identities
#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// `email` is already normalized (trimmed, lowercase).
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<AdminIdentity>>;

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<AdminIdentity>>;

    /// Fails with `Conflict` when the email is taken.
    async fn insert_admin(&self, identity: &AdminIdentity) -> RepositoryResult<()>;

    /// Atomically increments the session version and returns the new value.
    async fn bump_session_version(&self, id: Uuid) -> RepositoryResult<u64>;
}

#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<ProductCategory>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self { page: 1, limit: 20, category: None }
    }
}

impl ProductQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

/// Repository trait for product catalog access
///
/// Soft-deleted products are invisible to every read, counts included.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Persists a new product, together with its initial stock entry if any.
    /// Fails with `Conflict` when a live product already has the same name.
    async fn insert_product(
        &self,
        product: &Product,
        initial_stock: Option<&StockTransaction>,
    ) -> RepositoryResult<()>;

    async fn get_product(&self, id: Uuid) -> RepositoryResult<Option<Product>>;

    async fn list_products(&self, query: &ProductQuery) -> RepositoryResult<ProductPage>;

    /// Writes every field except `stock_quantity`, which only `adjust_stock`
    /// changes, and returns the stored row. Fails with `Conflict` on a duplicate
    /// name, `NotFound` when the product is missing or deleted.
    async fn update_product(&self, product: &Product) -> RepositoryResult<Product>;

    /// Applies `adjustment` against the current stock level atomically.
    async fn adjust_stock(
        &self,
        product_id: Uuid,
        adjustment: &StockAdjustment,
        performed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(Product, StockTransaction)>;

    /// Newest first.
    async fn stock_history(&self, product_id: Uuid) -> RepositoryResult<Vec<StockTransaction>>;

    /// Active products at or below their reorder level.
    async fn low_stock(&self) -> RepositoryResult<Vec<Product>>;

    async fn count_products(&self) -> RepositoryResult<i64>;
}

/// Reachability check for the persistence collaborator
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> RepositoryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_offset() {
        assert_eq!(ProductQuery::default().offset(), 0);
        assert_eq!(ProductQuery { page: 3, limit: 20, category: None }.offset(), 40);
        assert_eq!(ProductQuery { page: 0, limit: 20, category: None }.offset(), 0);
    }

    #[tokio::test]
    async fn test_with_timeout_maps_to_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, RepositoryError>(())
        };
        let err = with_timeout(Duration::from_millis(10), "slow call", slow).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Unavailable(_)));

        let fast = async { Ok::<_, RepositoryError>(7) };
        assert_eq!(with_timeout(Duration::from_secs(1), "fast call", fast).await.unwrap(), 7);
    }
}
