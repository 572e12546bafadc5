use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ssvpl_catalog::{GstRate, PricingConfig, PricingEngine};
use ssvpl_core::repository::with_timeout;
use ssvpl_core::{AuthConfig, AuthGate, Clock, ProductRepository, RepositoryResult, StatusChecker};
use ssvpl_store::app_config::Config;
use ssvpl_store::Repositories;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthGate>,
    pub products: Arc<dyn ProductRepository>,
    pub pricing: Arc<PricingEngine>,
    pub status: Arc<StatusChecker>,
    pub clock: Arc<dyn Clock>,
    pub upstream_timeout: Duration,
}

impl AppState {
    pub fn new(config: &Config, repos: Repositories, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let upstream_timeout = config.auth.upstream_timeout();
        let token_ttl = i64::try_from(config.auth.jwt_expiration_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .context("auth.jwt_expiration_seconds is out of range")?;

        let auth = AuthGate::new(
            AuthConfig {
                jwt_secret: config.auth.jwt_secret.clone(),
                token_ttl,
                bcrypt_cost: config.auth.bcrypt_cost,
                upstream_timeout,
            },
            repos.admins.clone(),
            clock.clone(),
        )
        .context("Invalid auth configuration")?;

        let default_gst_rate = GstRate::parse_percent(config.catalog.default_gst_rate)
            .context("Invalid catalog.default_gst_rate")?;

        let status = StatusChecker::new(
            repos.health.clone(),
            repos.products.clone(),
            clock.clone(),
            upstream_timeout,
            config.database.degraded_threshold(),
        );

        Ok(Self {
            auth: Arc::new(auth),
            products: repos.products,
            pricing: Arc::new(PricingEngine::new(PricingConfig { default_gst_rate })),
            status: Arc::new(status),
            clock,
            upstream_timeout,
        })
    }

    /// Runs a store call under the upstream timeout.
    pub async fn timed<T, F>(&self, operation: &'static str, fut: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        with_timeout(self.upstream_timeout, operation, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssvpl_core::ManualClock;
    use ssvpl_shared::Masked;
    use ssvpl_store::app_config::{AuthConfig as AuthSettings, CatalogConfig, DatabaseConfig, ServerConfig};

    fn config(jwt_expiration_seconds: u64) -> Config {
        Config {
            server: ServerConfig { port: 0 },
            database: DatabaseConfig {
                url: "memory://".into(),
                max_connections: 1,
                acquire_timeout_ms: 1000,
                degraded_threshold_ms: 500,
            },
            auth: AuthSettings {
                jwt_secret: Masked::from("state-test-secret"),
                jwt_expiration_seconds,
                bcrypt_cost: 4,
                upstream_timeout_ms: 1000,
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
            },
            catalog: CatalogConfig::default(),
        }
    }

    #[test]
    fn test_out_of_range_token_lifetime_is_a_config_error() {
        for seconds in [u64::MAX, i64::MAX as u64] {
            let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
            let err = AppState::new(&config(seconds), Repositories::in_memory(), clock)
                .err()
                .expect("lifetime should be rejected");
            assert!(err.to_string().contains("jwt_expiration_seconds"));
        }
    }

    #[test]
    fn test_builds_from_valid_config() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        assert!(AppState::new(&config(3600), Repositories::in_memory(), clock).is_ok());
    }
}
