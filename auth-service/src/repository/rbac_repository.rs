//! # RBAC Repository
//!
//! Data access ports for [`Role`], [`Permission`], and the [`RolePermission`]
//! join table (§4.7, §4.9). Cross-organization isolation (I2) is enforced by
//! the service layer before calling `link_permission`; this layer trusts
//! that the caller already validated the edge.

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewPermission, NewRole, Permission, Role};

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn create(&self, new_role: NewRole) -> Result<Role, ApiError>;
    async fn find_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ApiError>;
    async fn find_system_role_by_name(&self, name: &str) -> Result<Option<Role>, ApiError>;
    async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<Role>, ApiError>;
    async fn link_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), ApiError>;
    async fn unlink_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), ApiError>;
    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<Permission>, ApiError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn create(&self, new_permission: NewPermission) -> Result<Permission, ApiError>;
    async fn find_by_id(&self, permission_id: Uuid) -> Result<Option<Permission>, ApiError>;
    async fn find_by_name(
        &self,
        name: &str,
        organization_id: Option<Uuid>,
    ) -> Result<Option<Permission>, ApiError>;
    async fn list_system(&self) -> Result<Vec<Permission>, ApiError>;
    async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Permission>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn create(&self, new_role: NewRole) -> Result<Role, ApiError> {
        sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, organization_id, is_system)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_role.name)
        .bind(new_role.organization_id)
        .bind(new_role.organization_id.is_none())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ApiError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_system_role_by_name(&self, name: &str) -> Result<Option<Role>, ApiError> {
        sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE name = $1 AND organization_id IS NULL",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<Role>, ApiError> {
        sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE organization_id = $1 OR organization_id IS NULL",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn link_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }

    async fn unlink_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<Permission>, ApiError> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.* FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.permission_id
            WHERE rp.role_id = $1
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }
}

#[derive(Debug, Clone)]
pub struct PgPermissionRepository {
    pool: PgPool,
}

impl PgPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn create(&self, new_permission: NewPermission) -> Result<Permission, ApiError> {
        sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (name, organization_id, is_system, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&new_permission.name)
        .bind(new_permission.organization_id)
        .bind(new_permission.organization_id.is_none())
        .bind(&new_permission.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint().is_some() {
                    return ApiError::Conflict { resource: "permission".to_string() };
                }
            }
            ApiError::InternalError { message: format!("Database error: {}", e) }
        })
    }

    async fn find_by_id(&self, permission_id: Uuid) -> Result<Option<Permission>, ApiError> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE permission_id = $1")
            .bind(permission_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_name(
        &self,
        name: &str,
        organization_id: Option<Uuid>,
    ) -> Result<Option<Permission>, ApiError> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT * FROM permissions
            WHERE name = $1 AND organization_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(name)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn list_system(&self) -> Result<Vec<Permission>, ApiError> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE organization_id IS NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Permission>, ApiError> {
        sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE organization_id = $1 OR organization_id IS NULL",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }
}
