use crate::error::{AuthzError, Result};
use crate::store::AuthzStore;
use curio_models::{NewRole, Permission, Role, UserRole};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Role every newly registered user receives unless configured otherwise.
pub const DEFAULT_ROLE: &str = "user";

pub struct RoleService {
    store: Arc<dyn AuthzStore>,
    default_role: String,
}

impl RoleService {
    pub fn new(store: Arc<dyn AuthzStore>, default_role: impl Into<String>) -> Self {
        Self {
            store,
            default_role: default_role.into(),
        }
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    pub async fn create_role(&self, request: NewRole) -> Result<Role> {
        request.validate()?;
        let role = self.store.create_role(&request).await?;
        tracing::info!(role = %role.name, "Role created");
        Ok(role)
    }

    /// Create the default role if it does not exist yet.
    pub async fn ensure_default_role(&self) -> Result<Role> {
        if let Some(role) = self.store.find_role_by_name(&self.default_role).await? {
            return Ok(role);
        }

        self.create_role(NewRole {
            name: self.default_role.clone(),
            description: Some("Default role for registered users".to_string()),
        })
        .await
    }

    /// Attach the configured default role. The role must already exist.
    pub async fn assign_default_role(&self, user_id: Uuid) -> Result<UserRole> {
        let role_name = self.default_role.clone();
        self.assign_role(user_id, &role_name).await
    }

    pub async fn assign_role(&self, user_id: Uuid, role_name: &str) -> Result<UserRole> {
        let role = self.require_role(role_name).await?;
        let grant = self.store.assign_role(user_id, role.id).await?;

        tracing::info!(user_id = %user_id, role = %role.name, "Role assigned");
        Ok(grant)
    }

    /// Grant a permission to a role, creating the permission on first use.
    pub async fn grant_permission(&self, role_name: &str, permission_name: &str) -> Result<Permission> {
        let role = self.require_role(role_name).await?;

        let permission = match self.store.find_permission_by_name(permission_name).await? {
            Some(permission) => permission,
            None => self.store.create_permission(permission_name, None).await?,
        };

        self.store.grant_permission(role.id, permission.id).await?;
        Ok(permission)
    }

    pub async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>> {
        self.store.roles_for_user(user_id).await
    }

    pub async fn has_role(&self, user_id: Uuid, role_name: &str) -> Result<bool> {
        let roles = self.store.roles_for_user(user_id).await?;
        Ok(roles.iter().any(|r| r.name == role_name))
    }

    pub async fn permissions_for(&self, user_id: Uuid) -> Result<Vec<Permission>> {
        self.store.permissions_for_user(user_id).await
    }

    pub async fn has_permission(&self, user_id: Uuid, permission_name: &str) -> Result<bool> {
        let permissions = self.store.permissions_for_user(user_id).await?;
        Ok(permissions.iter().any(|p| p.name == permission_name))
    }

    async fn require_role(&self, role_name: &str) -> Result<Role> {
        self.store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("Role {}", role_name)))
    }
}
