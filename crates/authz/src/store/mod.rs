mod memory;

pub use memory::InMemoryAuthzStore;

use crate::error::Result;
use async_trait::async_trait;
use curio_models::{NewRole, Permission, Role, UserRole};
use uuid::Uuid;

/// Role and permission storage. Permissions reach a user only through roles.
#[async_trait]
pub trait AuthzStore: Send + Sync {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;

    /// Fails with `AlreadyExists` when the name is taken.
    async fn create_role(&self, new_role: &NewRole) -> Result<Role>;

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>>;

    async fn create_permission(&self, name: &str, description: Option<&str>) -> Result<Permission>;

    /// Idempotent.
    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()>;

    /// Idempotent; returns the existing grant when the user already holds the role.
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<UserRole>;

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>>;

    async fn permissions_for_user(&self, user_id: Uuid) -> Result<Vec<Permission>>;
}
