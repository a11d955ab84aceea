//! # Organization Repository
//!
//! Data access port for [`Organization`] persistence (§4.9).

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewOrganization, Organization, OrganizationStatus};

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn create(&self, new_org: NewOrganization) -> Result<Organization, ApiError>;
    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<Organization>, ApiError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, ApiError>;
    async fn slug_exists(&self, slug: &str) -> Result<bool, ApiError>;
    async fn update_status(
        &self,
        organization_id: Uuid,
        status: OrganizationStatus,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgOrganizationRepository {
    pool: PgPool,
}

impl PgOrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizationRepository {
    async fn create(&self, new_org: NewOrganization) -> Result<Organization, ApiError> {
        sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (slug, name, created_by)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_org.slug)
        .bind(&new_org.name)
        .bind(new_org.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("organizations_slug_key") {
                    return ApiError::Conflict { resource: "slug".to_string() };
                }
            }
            ApiError::InternalError { message: format!("Database error: {}", e) }
        })
    }

    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<Organization>, ApiError> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, ApiError> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, ApiError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(count.0 > 0)
    }

    async fn update_status(
        &self,
        organization_id: Uuid,
        status: OrganizationStatus,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET status = $1, updated_at = NOW()
            WHERE organization_id = $2
            "#,
        )
        .bind(status)
        .bind(organization_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: "organization".to_string() });
        }
        Ok(())
    }
}
