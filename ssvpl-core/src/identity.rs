use chrono::{DateTime, Utc};
use serde::Serialize;
use ssvpl_shared::Masked;
use uuid::Uuid;

pub const ADMIN_ROLE: &str = "admin";

/// An administrator as held by the credential store.
///
/// The password is only ever stored as a salted bcrypt hash.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Masked<String>,
    pub role: String,
    /// Tokens carrying an older version are revoked.
    pub session_version: u64,
    pub created_at: DateTime<Utc>,
}

impl AdminIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub fn principal(&self) -> AdminPrincipal {
        AdminPrincipal {
            id: self.id,
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// The verified caller, passed to handlers through request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminPrincipal {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl AdminPrincipal {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Salted bcrypt hash. CPU heavy; call from a blocking context.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Constant-time check of `password` against a stored bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}
