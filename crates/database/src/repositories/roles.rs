use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use curio_authz::AuthzStore;
use curio_models::{NewRole, Permission, Role, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_role: &NewRole) -> Result<Role> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&new_role.name)
        .bind(&new_role.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Role", "name"),
            other => other,
        })?;

        Ok(role)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    pub async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(permission)
    }

    pub async fn create_permission(&self, name: &str, description: Option<&str>) -> Result<Permission> {
        let permission = sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Permission", "name"),
            other => other,
        })?;

        Ok(permission)
    }

    pub async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
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
        .await?;

        Ok(())
    }

    /// Assign a role to a user, returning the existing grant if already held
    pub async fn assign_to_user(&self, user_id: Uuid, role_id: Uuid) -> Result<UserRole> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::ConstraintViolation(_) => DatabaseError::not_found("Role", &role_id.to_string()),
            other => other,
        })?;

        let grant = sqlx::query_as::<_, UserRole>(
            "SELECT * FROM user_roles WHERE user_id = $1 AND role_id = $2",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(grant)
    }

    pub async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.* FROM roles r
            INNER JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    pub async fn get_user_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT DISTINCT p.* FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            INNER JOIN user_roles ur ON rp.role_id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }
}

#[async_trait]
impl AuthzStore for RoleRepository {
    async fn find_role_by_name(&self, name: &str) -> curio_authz::Result<Option<Role>> {
        Ok(self.find_by_name(name).await?)
    }

    async fn create_role(&self, new_role: &NewRole) -> curio_authz::Result<Role> {
        Ok(self.create(new_role).await?)
    }

    async fn find_permission_by_name(&self, name: &str) -> curio_authz::Result<Option<Permission>> {
        Ok(RoleRepository::find_permission_by_name(self, name).await?)
    }

    async fn create_permission(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> curio_authz::Result<Permission> {
        Ok(RoleRepository::create_permission(self, name, description).await?)
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> curio_authz::Result<()> {
        Ok(RoleRepository::grant_permission(self, role_id, permission_id).await?)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> curio_authz::Result<UserRole> {
        Ok(self.assign_to_user(user_id, role_id).await?)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> curio_authz::Result<Vec<Role>> {
        Ok(self.get_user_roles(user_id).await?)
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> curio_authz::Result<Vec<Permission>> {
        Ok(self.get_user_permissions(user_id).await?)
    }
}
