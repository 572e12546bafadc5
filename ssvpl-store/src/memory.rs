//! In-process implementations of the repository traits, selected with
//! `database.url = "memory://"`. Used by the test suites and for local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ssvpl_catalog::{Product, StockAdjustment, StockTransaction};
use ssvpl_core::{
    AdminIdentity, AdminRepository, HealthCheck, ProductPage, ProductQuery, ProductRepository, RepositoryError,
    RepositoryResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryAdminRepository {
    admins: RwLock<HashMap<Uuid, AdminIdentity>>,
}

impl MemoryAdminRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdminRepository for MemoryAdminRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<AdminIdentity>> {
        let admins = self.admins.read().await;
        Ok(admins.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<AdminIdentity>> {
        Ok(self.admins.read().await.get(&id).cloned())
    }

    async fn insert_admin(&self, identity: &AdminIdentity) -> RepositoryResult<()> {
        let mut admins = self.admins.write().await;
        if admins.values().any(|a| a.email == identity.email) {
            return Err(RepositoryError::Conflict(format!("Admin '{}' already exists", identity.email)));
        }
        admins.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn bump_session_version(&self, id: Uuid) -> RepositoryResult<u64> {
        let mut admins = self.admins.write().await;
        let admin = admins.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        admin.session_version += 1;
        Ok(admin.session_version)
    }
}

#[derive(Default)]
struct CatalogState {
    products: HashMap<Uuid, Product>,
    stock_transactions: Vec<StockTransaction>,
}

impl CatalogState {
    fn live(&self) -> impl Iterator<Item = &Product> {
        self.products.values().filter(|p| !p.is_deleted())
    }

    // Matches the `LOWER(product_name)` unique index of the Postgres store.
    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        let name = name.to_lowercase();
        self.live()
            .any(|p| Some(p.id) != except && p.product_name.to_lowercase() == name)
    }
}

fn duplicate_name(name: &str) -> RepositoryError {
    RepositoryError::Conflict(format!("Product with name '{}' already exists", name))
}

#[derive(Default)]
pub struct MemoryProductRepository {
    state: RwLock<CatalogState>,
}

impl MemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn insert_product(
        &self,
        product: &Product,
        initial_stock: Option<&StockTransaction>,
    ) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if state.name_taken(&product.product_name, None) {
            return Err(duplicate_name(&product.product_name));
        }
        state.products.insert(product.id, product.clone());
        if let Some(entry) = initial_stock {
            state.stock_transactions.push(entry.clone());
        }
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> RepositoryResult<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).filter(|p| !p.is_deleted()).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> RepositoryResult<ProductPage> {
        let state = self.state.read().await;
        let mut matching: Vec<&Product> = state
            .live()
            .filter(|p| query.category.map_or(true, |c| p.category == c))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let products = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(ProductPage { products, total, page: query.page, limit: query.limit })
    }

    async fn update_product(&self, product: &Product) -> RepositoryResult<Product> {
        let mut state = self.state.write().await;
        let stock_quantity = match state.products.get(&product.id) {
            Some(stored) if !stored.is_deleted() => stored.stock_quantity,
            _ => return Err(RepositoryError::NotFound),
        };
        if !product.is_deleted() && state.name_taken(&product.product_name, Some(product.id)) {
            return Err(duplicate_name(&product.product_name));
        }

        let stored = Product { stock_quantity, ..product.clone() };
        state.products.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn adjust_stock(
        &self,
        product_id: Uuid,
        adjustment: &StockAdjustment,
        performed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(Product, StockTransaction)> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&product_id)
            .filter(|p| !p.is_deleted())
            .ok_or(RepositoryError::NotFound)?;

        let entry = adjustment.apply(product_id, product.stock_quantity, performed_by, now)?;
        product.stock_quantity = entry.new_stock;
        product.updated_at = now;
        let product = product.clone();

        state.stock_transactions.push(entry.clone());
        Ok((product, entry))
    }

    async fn stock_history(&self, product_id: Uuid) -> RepositoryResult<Vec<StockTransaction>> {
        let state = self.state.read().await;
        // Appended in order, so reversing gives newest first even within one timestamp.
        Ok(state
            .stock_transactions
            .iter()
            .rev()
            .filter(|t| t.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn low_stock(&self) -> RepositoryResult<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .live()
            .filter(|p| p.is_active && p.is_low_stock())
            .cloned()
            .collect();
        products.sort_by_key(|p| p.stock_quantity);
        Ok(products)
    }

    async fn count_products(&self) -> RepositoryResult<i64> {
        Ok(self.state.read().await.live().count() as i64)
    }
}

/// Health check whose outcome tests can steer.
#[derive(Default)]
pub struct MemoryHealthCheck {
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryHealthCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthCheck for MemoryHealthCheck {
    async fn ping(&self) -> RepositoryResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("memory store marked offline".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssvpl_catalog::{NewProduct, PricingEngine, ProductCategory, ProductUpdate, StockError};
    use ssvpl_core::{DbStatus, ManualClock, StatusChecker};
    use std::sync::Arc;

    fn product(name: &str, category: ProductCategory, stock: i64) -> Product {
        NewProduct {
            product_name: name.to_string(),
            category: Some(category),
            price: 1000,
            mrp: 1200,
            stock_quantity: stock,
            ..Default::default()
        }
        .build(&PricingEngine::default(), None, Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_names_conflict_until_deleted() {
        let repo = MemoryProductRepository::new();
        let mut first = product("Herbal Soap", ProductCategory::PersonalCare, 5);
        repo.insert_product(&first, None).await.unwrap();

        let dup = product("herbal soap", ProductCategory::PersonalCare, 5);
        assert!(matches!(repo.insert_product(&dup, None).await, Err(RepositoryError::Conflict(_))));

        first.mark_deleted(Utc::now());
        repo.update_product(&first).await.unwrap();
        repo.insert_product(&dup, None).await.unwrap();
        assert!(repo.get_product(first.id).await.unwrap().is_none());
        assert_eq!(repo.count_products().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_ledgered_stock() {
        let repo = MemoryProductRepository::new();
        let p = product("Prawn Starter Feed", ProductCategory::Aquaculture, 5);
        repo.insert_product(&p, None).await.unwrap();

        let stale = repo.get_product(p.id).await.unwrap().unwrap();
        let (_, entry) = repo
            .adjust_stock(p.id, &StockAdjustment::add(10, None), None, Utc::now())
            .await
            .unwrap();

        let renamed = ProductUpdate { product_name: Some("Prawn Grower Feed".into()), ..Default::default() }
            .apply(&stale, &PricingEngine::default(), Utc::now())
            .unwrap();
        let stored = repo.update_product(&renamed).await.unwrap();

        assert_eq!(stored.product_name, "Prawn Grower Feed");
        assert_eq!(stored.stock_quantity, entry.new_stock);
        let current = repo.get_product(p.id).await.unwrap().unwrap();
        assert_eq!(current.stock_quantity, 15);
        assert_eq!(repo.stock_history(p.id).await.unwrap()[0].new_stock, current.stock_quantity);
    }

    #[tokio::test]
    async fn test_duplicate_names_fold_unicode_case() {
        let repo = MemoryProductRepository::new();
        repo.insert_product(&product("ÉCLAT Face Cream", ProductCategory::PersonalCare, 0), None)
            .await
            .unwrap();

        let dup = product("éclat face cream", ProductCategory::PersonalCare, 0);
        assert!(matches!(repo.insert_product(&dup, None).await, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let repo = MemoryProductRepository::new();
        for i in 0..5 {
            let mut p = product(&format!("Fish Feed {}", i), ProductCategory::Aquaculture, 50);
            p.created_at = Utc::now() + chrono::Duration::seconds(i);
            repo.insert_product(&p, None).await.unwrap();
        }
        repo.insert_product(&product("Floor Cleaner", ProductCategory::HomeCare, 50), None)
            .await
            .unwrap();

        let page = repo
            .list_products(&ProductQuery { page: 1, limit: 2, category: Some(ProductCategory::Aquaculture) })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.products[0].product_name, "Fish Feed 4");

        let last = repo
            .list_products(&ProductQuery { page: 3, limit: 2, category: Some(ProductCategory::Aquaculture) })
            .await
            .unwrap();
        assert_eq!(last.products.len(), 1);
        assert_eq!(last.products[0].product_name, "Fish Feed 0");
    }

    #[tokio::test]
    async fn test_adjust_stock_records_history() {
        let repo = MemoryProductRepository::new();
        let p = product("Vitamin Mix", ProductCategory::HealthCare, 0);
        repo.insert_product(&p, None).await.unwrap();

        let (after_add, _) = repo
            .adjust_stock(p.id, &StockAdjustment::add(20, None), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(after_add.stock_quantity, 20);

        let err = repo
            .adjust_stock(p.id, &StockAdjustment::remove(21, None), None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Stock(StockError::InsufficientStock { requested: 21, available: 20 })
        ));

        repo.adjust_stock(p.id, &StockAdjustment::remove(15, None), None, Utc::now())
            .await
            .unwrap();

        let history = repo.stock_history(p.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].new_stock, 5);
        assert_eq!(history[1].new_stock, 20);

        let low = repo.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, p.id);
    }

    #[tokio::test]
    async fn test_session_version_bumps() {
        let repo = MemoryAdminRepository::new();
        let admin = AdminIdentity {
            id: Uuid::new_v4(),
            email: "admin@ssvpl.com".into(),
            password_hash: ssvpl_shared::Masked::new("hash".into()),
            role: ssvpl_core::ADMIN_ROLE.into(),
            session_version: 0,
            created_at: Utc::now(),
        };
        repo.insert_admin(&admin).await.unwrap();
        assert!(matches!(repo.insert_admin(&admin).await, Err(RepositoryError::Conflict(_))));

        assert_eq!(repo.bump_session_version(admin.id).await.unwrap(), 1);
        assert_eq!(repo.bump_session_version(admin.id).await.unwrap(), 2);
        assert!(matches!(repo.bump_session_version(Uuid::new_v4()).await, Err(RepositoryError::NotFound)));
    }

    fn checker(health: Arc<MemoryHealthCheck>) -> StatusChecker {
        StatusChecker::new(
            health,
            Arc::new(MemoryProductRepository::new()),
            Arc::new(ManualClock::new(Utc::now())),
            Duration::from_millis(200),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn test_status_reports_ping_outcome() {
        let health = Arc::new(MemoryHealthCheck::new());
        let status = checker(health.clone()).check().await;
        assert_eq!(status.db_status, DbStatus::Connected);
        assert_eq!(status.product_count, Some(0));

        health.set_latency(Duration::from_millis(80));
        assert_eq!(checker(health.clone()).check().await.db_status, DbStatus::Degraded);

        health.set_latency(Duration::from_millis(500));
        let timed_out = checker(health.clone()).check().await;
        assert_eq!(timed_out.db_status, DbStatus::Disconnected);
        assert_eq!(timed_out.product_count, None);

        health.set_latency(Duration::ZERO);
        health.set_offline(true);
        assert_eq!(checker(health).check().await.db_status, DbStatus::Disconnected);
    }
}
