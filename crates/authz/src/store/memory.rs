use super::AuthzStore;
use crate::error::{AuthzError, Result};
use async_trait::async_trait;
use chrono::Utc;
use curio_models::{NewRole, Permission, Role, UserRole};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    role_permissions: HashSet<(Uuid, Uuid)>,
    user_roles: HashMap<(Uuid, Uuid), UserRole>,
}

#[derive(Default)]
pub struct InMemoryAuthzStore {
    tables: RwLock<Tables>,
}

impl InMemoryAuthzStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthzStore for InMemoryAuthzStore {
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn create_role(&self, new_role: &NewRole) -> Result<Role> {
        let mut tables = self.tables.write().await;

        if tables.roles.values().any(|r| r.name == new_role.name) {
            return Err(AuthzError::AlreadyExists(format!("Role {}", new_role.name)));
        }

        let role = Role {
            id: Uuid::new_v4(),
            name: new_role.name.clone(),
            description: new_role.description.clone(),
            created_at: Utc::now(),
        };
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn create_permission(&self, name: &str, description: Option<&str>) -> Result<Permission> {
        let mut tables = self.tables.write().await;

        if tables.permissions.values().any(|p| p.name == name) {
            return Err(AuthzError::AlreadyExists(format!("Permission {}", name)));
        }

        let permission = Permission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;

        if !tables.roles.contains_key(&role_id) {
            return Err(AuthzError::NotFound(format!("Role {}", role_id)));
        }
        if !tables.permissions.contains_key(&permission_id) {
            return Err(AuthzError::NotFound(format!("Permission {}", permission_id)));
        }

        tables.role_permissions.insert((role_id, permission_id));
        Ok(())
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<UserRole> {
        let mut tables = self.tables.write().await;

        if !tables.roles.contains_key(&role_id) {
            return Err(AuthzError::NotFound(format!("Role {}", role_id)));
        }

        let grant = tables
            .user_roles
            .entry((user_id, role_id))
            .or_insert_with(|| UserRole {
                user_id,
                role_id,
                granted_at: Utc::now(),
            });
        Ok(grant.clone())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables
            .user_roles
            .keys()
            .filter(|(user, _)| *user == user_id)
            .filter_map(|(_, role_id)| tables.roles.get(role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> Result<Vec<Permission>> {
        let tables = self.tables.read().await;

        let role_ids: HashSet<Uuid> = tables
            .user_roles
            .keys()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, role_id)| *role_id)
            .collect();

        // Keyed by name so a permission granted through several roles appears once
        let permissions: BTreeMap<&str, &Permission> = tables
            .role_permissions
            .iter()
            .filter(|(role_id, _)| role_ids.contains(role_id))
            .filter_map(|(_, permission_id)| tables.permissions.get(permission_id))
            .map(|p| (p.name.as_str(), p))
            .collect();

        Ok(permissions.into_values().cloned().collect())
    }
}
