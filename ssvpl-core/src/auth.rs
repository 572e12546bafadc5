//! Admin authentication gate.
//!
//! Tokens are HS256 JWTs carrying the subject's session version (`ver`).
//! Revocation bumps that version in the credential store and raises a
//! per-subject watermark held in a `DashMap`; verification rejects any token
//! whose `ver` is below the watermark. Cached watermarks are reloaded from the
//! store once they are older than `WATERMARK_REFRESH_SECONDS`, so a revocation
//! made by another instance sharing the store takes effect within that window.
//! Verification never renews a token.

use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use ssvpl_shared::Masked;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::identity::{self, AdminIdentity, AdminPrincipal, ADMIN_ROLE};
use crate::repository::{with_timeout, AdminRepository, RepositoryError};

/// How long a cached session-version watermark is trusted before it is reloaded.
pub const WATERMARK_REFRESH_SECONDS: i64 = 30;

#[derive(Debug, Clone, Copy)]
struct Watermark {
    version: u64,
    loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No bearer token provided")]
    TokenMissing,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token is invalid or has been revoked")]
    TokenInvalid,

    #[error("Admin role required")]
    Forbidden,

    #[error("Credential store unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Authentication failure: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "InvalidCredentials",
            AuthError::TokenMissing => "TokenMissing",
            AuthError::TokenExpired => "TokenExpired",
            AuthError::TokenInvalid => "TokenInvalid",
            AuthError::Forbidden => "Forbidden",
            AuthError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            AuthError::Internal(_) => "Internal",
        }
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Unavailable(msg) => AuthError::UpstreamUnavailable(msg),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

/// JWT claims for admin sessions
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    /// Session version at issue time.
    pub ver: u64,
    pub jti: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Masked<String>,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub upstream_timeout: std::time::Duration,
}

impl AuthConfig {
    pub const DEFAULT_TTL_SECONDS: i64 = 24 * 60 * 60;
}

/// A freshly issued bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub admin: AdminPrincipal,
}

pub struct AuthGate {
    admins: Arc<dyn AdminRepository>,
    clock: Arc<dyn Clock>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    bcrypt_cost: u32,
    upstream_timeout: std::time::Duration,
    watermarks: DashMap<Uuid, Watermark>,
    // Verified against when the email is unknown, so both failure paths cost the same.
    dummy_hash: String,
}

impl AuthGate {
    pub fn new(config: AuthConfig, admins: Arc<dyn AdminRepository>, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        if config.jwt_secret.expose().is_empty() {
            return Err(AuthError::Internal("JWT secret must not be empty".into()));
        }
        if config.token_ttl <= Duration::zero() {
            return Err(AuthError::Internal("token TTL must be positive".into()));
        }

        let secret = config.jwt_secret.expose().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let dummy_hash = identity::hash_password(&Uuid::new_v4().to_string(), config.bcrypt_cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt setup failed: {}", e)))?;

        Ok(Self {
            admins,
            clock,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            token_ttl: config.token_ttl,
            bcrypt_cost: config.bcrypt_cost,
            upstream_timeout: config.upstream_timeout,
            watermarks: DashMap::new(),
            dummy_hash,
        })
    }

    /// Verifies the credentials and issues a token valid for the configured TTL.
    ///
    /// Unknown emails and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &Masked<String>) -> Result<IssuedToken, AuthError> {
        let email = identity::normalize_email(email);
        tracing::info!("Admin login attempt for email: {}", email);

        let found = with_timeout(self.upstream_timeout, "admin lookup", self.admins.find_by_email(&email)).await?;

        let hash = match &found {
            Some(identity) => identity.password_hash.expose().clone(),
            None => self.dummy_hash.clone(),
        };
        let password = password.expose().clone();
        let matches = tokio::task::spawn_blocking(move || identity::verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))?
            .map_err(|e| AuthError::Internal(format!("password verification error: {}", e)))?;

        let identity = match found {
            Some(identity) if matches && identity.is_admin() => identity,
            _ => {
                tracing::warn!("Admin login rejected for email: {}", email);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let issued = self.issue(&identity)?;
        tracing::info!("Admin logged in: {} ({})", identity.email, identity.id);
        Ok(issued)
    }

    fn issue(&self, identity: &AdminIdentity) -> Result<IssuedToken, AuthError> {
        let ver = self.raise_watermark(identity.id, identity.session_version);
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.token_ttl)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".into()))?;

        let claims = AdminClaims {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            ver,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token encoding failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(expires_at),
            admin: identity.principal(),
        })
    }

    /// Checks signature, expiry, role and revocation, in that order.
    pub async fn verify(&self, token: &str) -> Result<AdminPrincipal, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::TokenMissing);
        }

        let claims = decode::<AdminClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                AuthError::TokenInvalid
            })?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        let subject = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)?;
        if claims.role != ADMIN_ROLE {
            return Err(AuthError::Forbidden);
        }

        let watermark = self.watermark(subject).await?;
        if claims.ver < watermark {
            tracing::debug!("Token for {} revoked (ver {} < {})", subject, claims.ver, watermark);
            return Err(AuthError::TokenInvalid);
        }

        Ok(AdminPrincipal {
            id: subject,
            email: claims.email,
            role: claims.role,
        })
    }

    /// Revokes every token issued to `subject` so far.
    pub async fn revoke(&self, subject: Uuid) -> Result<(), AuthError> {
        let version = with_timeout(
            self.upstream_timeout,
            "session revocation",
            self.admins.bump_session_version(subject),
        )
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AuthError::TokenInvalid,
            other => other.into(),
        })?;

        self.raise_watermark(subject, version);
        tracing::info!("Revoked sessions for admin {} (version {})", subject, version);
        Ok(())
    }

    /// Creates the admin unless the email is already registered. Returns the stored principal.
    pub async fn provision_admin(&self, email: &str, password: &Masked<String>) -> Result<AdminPrincipal, AuthError> {
        let email = identity::normalize_email(email);
        if let Some(existing) = with_timeout(self.upstream_timeout, "admin lookup", self.admins.find_by_email(&email)).await? {
            return Ok(existing.principal());
        }

        let password = password.expose().clone();
        let cost = self.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || identity::hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {}", e)))?
            .map_err(|e| AuthError::Internal(format!("password hashing error: {}", e)))?;

        let identity = AdminIdentity {
            id: Uuid::new_v4(),
            email,
            password_hash: Masked::new(hash),
            role: ADMIN_ROLE.to_string(),
            session_version: 0,
            created_at: self.clock.now(),
        };
        with_timeout(self.upstream_timeout, "admin insert", self.admins.insert_admin(&identity)).await?;
        tracing::info!("Provisioned admin {} ({})", identity.email, identity.id);
        Ok(identity.principal())
    }

    async fn watermark(&self, subject: Uuid) -> Result<u64, AuthError> {
        let now = self.clock.now();
        let cached = self.watermarks.get(&subject).map(|entry| *entry);
        if let Some(cached) = cached {
            if now - cached.loaded_at < Duration::seconds(WATERMARK_REFRESH_SECONDS) {
                return Ok(cached.version);
            }
        }

        let identity = with_timeout(self.upstream_timeout, "admin lookup", self.admins.find_by_id(subject))
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        Ok(self.raise_watermark(subject, identity.session_version))
    }

    // Records a version just read from the store. Watermarks only move up.
    fn raise_watermark(&self, subject: Uuid, version: u64) -> u64 {
        let loaded_at = self.clock.now();
        let mut entry = self.watermarks.entry(subject).or_insert(Watermark { version, loaded_at });
        entry.version = entry.version.max(version);
        entry.loaded_at = loaded_at;
        entry.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::repository::RepositoryResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestAdmins {
        admins: Mutex<Vec<AdminIdentity>>,
        offline: AtomicBool,
    }

    impl TestAdmins {
        fn check_online(&self) -> RepositoryResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(RepositoryError::Unavailable("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl AdminRepository for TestAdmins {
        async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<AdminIdentity>> {
            self.check_online()?;
            Ok(self.admins.lock().unwrap().iter().find(|a| a.email == email).cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<AdminIdentity>> {
            self.check_online()?;
            Ok(self.admins.lock().unwrap().iter().find(|a| a.id == id).cloned())
        }

        async fn insert_admin(&self, identity: &AdminIdentity) -> RepositoryResult<()> {
            self.check_online()?;
            self.admins.lock().unwrap().push(identity.clone());
            Ok(())
        }

        async fn bump_session_version(&self, id: Uuid) -> RepositoryResult<u64> {
            self.check_online()?;
            let mut admins = self.admins.lock().unwrap();
            let admin = admins.iter_mut().find(|a| a.id == id).ok_or(RepositoryError::NotFound)?;
            admin.session_version += 1;
            Ok(admin.session_version)
        }
    }

    fn test_config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: Masked::new(secret.into()),
            token_ttl: Duration::hours(24),
            bcrypt_cost: 4,
            upstream_timeout: std::time::Duration::from_secs(2),
        }
    }

    struct Harness {
        gate: AuthGate,
        admins: Arc<TestAdmins>,
        clock: Arc<ManualClock>,
    }

    async fn harness() -> Harness {
        let admins = Arc::new(TestAdmins::default());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()));
        let config = AuthConfig {
            jwt_secret: Masked::new("test-secret".into()),
            token_ttl: Duration::seconds(AuthConfig::DEFAULT_TTL_SECONDS),
            bcrypt_cost: 4,
            upstream_timeout: std::time::Duration::from_secs(2),
        };
        let gate = AuthGate::new(config, admins.clone(), clock.clone()).unwrap();
        gate.provision_admin("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();
        Harness { gate, admins, clock }
    }

    #[tokio::test]
    async fn test_login_then_verify() {
        let h = harness().await;
        let issued = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();
        assert!(!issued.token.is_empty());
        assert_eq!(issued.expires_at, h.clock.now() + Duration::hours(24));

        let principal = h.gate.verify(&issued.token).await.unwrap();
        assert_eq!(principal, issued.admin);
        assert!(principal.is_admin());
    }

    #[tokio::test]
    async fn test_login_email_is_case_insensitive() {
        let h = harness().await;
        assert!(h.gate.login(" ADMIN@ssvpl.com", &"adminpassword123".into()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let h = harness().await;
        let wrong_password = h.gate.login("admin@ssvpl.com", &"nope".into()).await.unwrap_err();
        let unknown_email = h.gate.login("ghost@ssvpl.com", &"adminpassword123".into()).await.unwrap_err();
        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(unknown_email, wrong_password);
        assert_eq!(unknown_email.to_string(), wrong_password.to_string());
    }

    #[tokio::test]
    async fn test_non_admin_identity_cannot_login() {
        let h = harness().await;
        let hash = identity::hash_password("userpass", 4).unwrap();
        h.admins
            .insert_admin(&AdminIdentity {
                id: Uuid::new_v4(),
                email: "member@ssvpl.com".into(),
                password_hash: Masked::new(hash),
                role: "user".into(),
                session_version: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let err = h.gate.login("member@ssvpl.com", &"userpass".into()).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_token_expires_when_clock_passes_exp() {
        let h = harness().await;
        let issued = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();

        h.clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(h.gate.verify(&issued.token).await.is_ok());

        h.clock.advance(Duration::seconds(1));
        assert_eq!(h.gate.verify(&issued.token).await.unwrap_err(), AuthError::TokenExpired);
    }

    #[tokio::test]
    async fn test_revocation_invalidates_earlier_tokens() {
        let h = harness().await;
        let first = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();
        let second = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();

        h.gate.revoke(first.admin.id).await.unwrap();

        assert_eq!(h.gate.verify(&first.token).await.unwrap_err(), AuthError::TokenInvalid);
        assert_eq!(h.gate.verify(&second.token).await.unwrap_err(), AuthError::TokenInvalid);

        // Logging in again after revocation works, even at the same instant.
        let fresh = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();
        assert!(h.gate.verify(&fresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revocation_survives_a_cold_cache() {
        let h = harness().await;
        let issued = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();
        h.gate.revoke(issued.admin.id).await.unwrap();

        // A second gate over the same store, as after a restart.
        let config = AuthConfig {
            jwt_secret: Masked::new("test-secret".into()),
            token_ttl: Duration::hours(24),
            bcrypt_cost: 4,
            upstream_timeout: std::time::Duration::from_secs(2),
        };
        let restarted = AuthGate::new(config, h.admins.clone(), h.clock.clone()).unwrap();
        assert_eq!(restarted.verify(&issued.token).await.unwrap_err(), AuthError::TokenInvalid);
    }

    #[tokio::test]
    async fn test_revocation_by_another_instance_is_seen_after_refresh() {
        let h = harness().await;
        let issued = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();
        assert!(h.gate.verify(&issued.token).await.is_ok());

        // A second gate over the same store revokes the subject.
        let other = AuthGate::new(test_config("test-secret"), h.admins.clone(), h.clock.clone()).unwrap();
        other.revoke(issued.admin.id).await.unwrap();

        h.clock.advance(Duration::seconds(WATERMARK_REFRESH_SECONDS));
        assert_eq!(h.gate.verify(&issued.token).await.unwrap_err(), AuthError::TokenInvalid);
    }

    #[tokio::test]
    async fn test_genuine_token_without_admin_role_is_forbidden() {
        let h = harness().await;
        let now = h.clock.now();
        let claims = AdminClaims {
            sub: Uuid::new_v4().to_string(),
            email: "member@ssvpl.com".into(),
            role: "user".into(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            ver: 0,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("test-secret".as_bytes()),
        )
        .unwrap();

        assert_eq!(h.gate.verify(&token).await.unwrap_err(), AuthError::Forbidden);
    }

    #[tokio::test]
    async fn test_garbled_and_missing_tokens() {
        let h = harness().await;
        assert_eq!(h.gate.verify("").await.unwrap_err(), AuthError::TokenMissing);
        assert_eq!(h.gate.verify("   ").await.unwrap_err(), AuthError::TokenMissing);
        assert_eq!(h.gate.verify("not-a-jwt").await.unwrap_err(), AuthError::TokenInvalid);

        let issued = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();
        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert_eq!(h.gate.verify(&tampered).await.unwrap_err(), AuthError::TokenInvalid);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_invalid() {
        let h = harness().await;
        let issued = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap();

        let config = AuthConfig {
            jwt_secret: Masked::new("another-secret".into()),
            token_ttl: Duration::hours(24),
            bcrypt_cost: 4,
            upstream_timeout: std::time::Duration::from_secs(2),
        };
        let other = AuthGate::new(config, h.admins.clone(), h.clock.clone()).unwrap();
        assert_eq!(other.verify(&issued.token).await.unwrap_err(), AuthError::TokenInvalid);
    }

    #[tokio::test]
    async fn test_store_outage_is_upstream_unavailable() {
        let h = harness().await;
        h.admins.offline.store(true, Ordering::SeqCst);
        let err = h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.unwrap_err();
        assert!(matches!(err, AuthError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let h = harness().await;
        let again = h.gate.provision_admin("admin@ssvpl.com", &"different".into()).await.unwrap();
        assert_eq!(h.admins.admins.lock().unwrap().len(), 1);
        assert_eq!(again.email, "admin@ssvpl.com");
        // The original password still works.
        assert!(h.gate.login("admin@ssvpl.com", &"adminpassword123".into()).await.is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = AuthConfig {
            jwt_secret: Masked::new(String::new()),
            token_ttl: Duration::hours(24),
            bcrypt_cost: 4,
            upstream_timeout: std::time::Duration::from_secs(2),
        };
        let clock = Arc::new(ManualClock::new(Utc::now()));
        assert!(AuthGate::new(config, Arc::new(TestAdmins::default()), clock).is_err());
    }
}
