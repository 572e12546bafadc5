use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::repository::{with_timeout, HealthCheck, ProductRepository};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum DbStatus {
    Connected,
    Disconnected,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub db_status: DbStatus,
    pub latency_ms: Option<u64>,
    pub product_count: Option<i64>,
    pub checked_at: DateTime<Utc>,
}

/// Reports the health of the persistence collaborator. Never fails; an
/// unreachable store is reported as `Disconnected`.
pub struct StatusChecker {
    health: Arc<dyn HealthCheck>,
    products: Arc<dyn ProductRepository>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    degraded_threshold: Duration,
}

impl StatusChecker {
    pub fn new(
        health: Arc<dyn HealthCheck>,
        products: Arc<dyn ProductRepository>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        degraded_threshold: Duration,
    ) -> Self {
        Self { health, products, clock, timeout, degraded_threshold }
    }

    pub async fn check(&self) -> SystemStatus {
        let started = Instant::now();
        let ping = with_timeout(self.timeout, "database ping", self.health.ping()).await;
        let elapsed = started.elapsed();

        let db_status = match ping {
            Ok(()) if elapsed > self.degraded_threshold => DbStatus::Degraded,
            Ok(()) => DbStatus::Connected,
            Err(e) => {
                tracing::warn!("Database health check failed: {}", e);
                DbStatus::Disconnected
            }
        };

        let product_count = if db_status == DbStatus::Disconnected {
            None
        } else {
            with_timeout(self.timeout, "product count", self.products.count_products())
                .await
                .map_err(|e| tracing::warn!("Product count unavailable: {}", e))
                .ok()
        };

        SystemStatus {
            db_status,
            latency_ms: (db_status != DbStatus::Disconnected).then(|| elapsed.as_millis() as u64),
            product_count,
            checked_at: self.clock.now(),
        }
    }
}
