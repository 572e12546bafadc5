use async_trait::async_trait;
use sqlx::PgPool;
use ssvpl_core::{AdminIdentity, AdminRepository, RepositoryError, RepositoryResult};
use ssvpl_shared::Masked;
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct StoreAdminRepository {
    pool: PgPool,
}

impl StoreAdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AdminRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    session_version: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<AdminRow> for AdminIdentity {
    fn from(row: AdminRow) -> Self {
        AdminIdentity {
            id: row.id,
            email: row.email,
            password_hash: Masked::new(row.password_hash),
            role: row.role,
            session_version: row.session_version.max(0) as u64,
            created_at: row.created_at,
        }
    }
}

const ADMIN_COLUMNS: &str = "id, email, password_hash, role, session_version, created_at";

#[async_trait]
impl AdminRepository for StoreAdminRepository {
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<AdminIdentity>> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {} FROM admins WHERE email = $1",
            ADMIN_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AdminIdentity::from))
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<AdminIdentity>> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {} FROM admins WHERE id = $1",
            ADMIN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AdminIdentity::from))
    }

    async fn insert_admin(&self, identity: &AdminIdentity) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admins (id, email, password_hash, role, session_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(identity.password_hash.expose())
        .bind(&identity.role)
        .bind(identity.session_version as i64)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn bump_session_version(&self, id: Uuid) -> RepositoryResult<u64> {
        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE admins SET session_version = session_version + 1 WHERE id = $1 RETURNING session_version",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        version
            .map(|v| v.max(0) as u64)
            .ok_or(RepositoryError::NotFound)
    }
}
