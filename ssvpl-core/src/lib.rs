pub mod auth;
pub mod clock;
pub mod identity;
pub mod repository;
pub mod status;

pub use auth::{AdminClaims, AuthConfig, AuthError, AuthGate, IssuedToken};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{AdminIdentity, AdminPrincipal, ADMIN_ROLE};
pub use repository::{
    AdminRepository, HealthCheck, ProductPage, ProductQuery, ProductRepository, RepositoryError, RepositoryResult,
};
pub use status::{DbStatus, StatusChecker, SystemStatus};
