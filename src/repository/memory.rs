//! In-memory implementation of the repository.
//!
//! Holds every table in one `MemoryState` behind a single `tokio::sync::RwLock`.
//! Mutations take the write lock for their whole duration, which gives the
//! same guarantees the Postgres backend gets from constraints and transactions:
//! unique keys, one grant per (role, module), cascading deletes and an
//! all-or-nothing `upsert_grants`.
//!
//! Not durable. Used by the test-suite and for running the API without a
//! database.
use super::{RepoResult, Repository, RepositoryError};
use crate::models::{
    Capabilities, Module, NewModule, NewRole, NewUser, PermissionGrant, Role, UpdateRoleRequest,
    User, UserChanges,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    roles: BTreeMap<i64, Role>,
    modules: BTreeMap<i64, Module>,
    grants: BTreeMap<i64, PermissionGrant>,
    users: BTreeMap<i64, User>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn module_by_key(&self, key: &str) -> Option<&Module> {
        self.modules.values().find(|m| m.key == key)
    }
}

/// InMemoryRepository
///
/// `module_writes` counts inserts and updates on the modules table so registry
/// sync can be checked for redundant writes.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<MemoryState>,
    module_writes: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of module rows inserted or updated since construction.
    pub fn module_writes(&self) -> usize {
        self.module_writes.load(Ordering::SeqCst)
    }

    /// Inserts a user with an explicit superuser flag and role. Test fixtures
    /// use this to set up identities the public API cannot create.
    pub async fn seed_user(&self, user: NewUser, is_superuser: bool, role_id: Option<i64>) -> User {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let record = User {
            id,
            email: user.email,
            username: user.username,
            hashed_password: user.hashed_password,
            full_name: user.full_name,
            is_active: user.is_active,
            can_access_system: user.can_access_system,
            is_superuser,
            role_id,
            created_at: Utc::now(),
            updated_at: None,
        };
        state.users.insert(id, record.clone());
        record
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- Roles ---

    async fn list_roles(&self) -> RepoResult<Vec<Role>> {
        Ok(self.state.read().await.roles.values().cloned().collect())
    }

    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(&id).cloned())
    }

    async fn get_role_by_key(&self, key: &str) -> RepoResult<Option<Role>> {
        let state = self.state.read().await;
        Ok(state.roles.values().find(|r| r.key == key).cloned())
    }

    async fn insert_role(&self, role: NewRole) -> RepoResult<Role> {
        let mut state = self.state.write().await;
        if state.roles.values().any(|r| r.key == role.key) {
            return Err(RepositoryError::UniqueViolation("Role key".to_string()));
        }
        let id = state.next_id();
        let record = Role {
            id,
            key: role.key,
            name: role.name,
            description: role.description,
            is_system: role.is_system,
        };
        state.roles.insert(id, record.clone());
        Ok(record)
    }

    async fn update_role(&self, id: i64, patch: &UpdateRoleRequest) -> RepoResult<Option<Role>> {
        let mut state = self.state.write().await;
        if let Some(key) = &patch.key {
            if state.roles.values().any(|r| r.id != id && &r.key == key) {
                return Err(RepositoryError::UniqueViolation("Role key".to_string()));
            }
        }
        let Some(role) = state.roles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(key) = &patch.key {
            role.key = key.clone();
        }
        if let Some(name) = &patch.name {
            role.name = name.clone();
        }
        if let Some(description) = &patch.description {
            role.description = Some(description.clone());
        }
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: i64) -> RepoResult<bool> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&id) {
            return Ok(false);
        }
        // users.role_id has no ON DELETE action.
        if state.users.values().any(|u| u.role_id == Some(id)) {
            return Err(RepositoryError::ForeignKeyViolation(
                "Role is still assigned to users".to_string(),
            ));
        }
        state.roles.remove(&id);
        state.grants.retain(|_, g| g.role_id != id);
        Ok(true)
    }

    async fn count_users_with_role(&self, role_id: i64) -> RepoResult<i64> {
        let state = self.state.read().await;
        Ok(state.users.values().filter(|u| u.role_id == Some(role_id)).count() as i64)
    }

    // --- Modules ---

    async fn list_modules(&self) -> RepoResult<Vec<Module>> {
        Ok(self.state.read().await.modules.values().cloned().collect())
    }

    async fn get_module_by_key(&self, key: &str) -> RepoResult<Option<Module>> {
        Ok(self.state.read().await.module_by_key(key).cloned())
    }

    async fn insert_module(&self, module: NewModule) -> RepoResult<Module> {
        let mut state = self.state.write().await;
        if state.module_by_key(&module.key).is_some() {
            return Err(RepositoryError::UniqueViolation("Module key".to_string()));
        }
        let id = state.next_id();
        let record = Module {
            id,
            key: module.key,
            name: module.name,
            description: module.description,
        };
        state.modules.insert(id, record.clone());
        self.module_writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn update_module(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<Option<Module>> {
        let mut state = self.state.write().await;
        let Some(module) = state.modules.get_mut(&id) else {
            return Ok(None);
        };
        module.name = name.to_string();
        module.description = description.map(str::to_string);
        self.module_writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(module.clone()))
    }

    async fn delete_module(&self, id: i64) -> RepoResult<bool> {
        let mut state = self.state.write().await;
        if state.modules.remove(&id).is_none() {
            return Ok(false);
        }
        state.grants.retain(|_, g| g.module_id != id);
        Ok(true)
    }

    // --- Permission Grants ---

    async fn find_grant(&self, role_id: i64, module_key: &str) -> RepoResult<Option<PermissionGrant>> {
        let state = self.state.read().await;
        let Some(module) = state.module_by_key(module_key) else {
            return Ok(None);
        };
        Ok(state
            .grants
            .values()
            .find(|g| g.role_id == role_id && g.module_id == module.id)
            .cloned())
    }

    async fn list_grants_for_role(&self, role_id: i64) -> RepoResult<Vec<PermissionGrant>> {
        let state = self.state.read().await;
        Ok(state.grants.values().filter(|g| g.role_id == role_id).cloned().collect())
    }

    async fn upsert_grants(&self, role_id: i64, grants: &[(i64, Capabilities)]) -> RepoResult<()> {
        let mut state = self.state.write().await;

        // Validate the whole batch before touching anything, mirroring the
        // foreign-key checks that would abort the Postgres transaction.
        if !state.roles.contains_key(&role_id) {
            return Err(RepositoryError::ForeignKeyViolation("Role does not exist".to_string()));
        }
        if grants.iter().any(|(module_id, _)| !state.modules.contains_key(module_id)) {
            return Err(RepositoryError::ForeignKeyViolation("Module does not exist".to_string()));
        }

        for (module_id, caps) in grants {
            let existing = state
                .grants
                .values_mut()
                .find(|g| g.role_id == role_id && g.module_id == *module_id);
            match existing {
                Some(grant) => {
                    grant.can_read = caps.can_read;
                    grant.can_create = caps.can_create;
                    grant.can_update = caps.can_update;
                    grant.can_delete = caps.can_delete;
                }
                None => {
                    let id = state.next_id();
                    state.grants.insert(
                        id,
                        PermissionGrant {
                            id,
                            role_id,
                            module_id: *module_id,
                            can_read: caps.can_read,
                            can_create: caps.can_create,
                            can_update: caps.can_update,
                            can_delete: caps.can_delete,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    // --- Users ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_login(&self, identifier: &str) -> RepoResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == identifier || u.username == identifier)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> RepoResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_users(&self) -> RepoResult<i64> {
        Ok(self.state.read().await.users.len() as i64)
    }

    async fn insert_user(&self, user: NewUser) -> RepoResult<User> {
        {
            let state = self.state.read().await;
            if state.users.values().any(|u| u.email == user.email) {
                return Err(RepositoryError::UniqueViolation("Email".to_string()));
            }
            if state.users.values().any(|u| u.username == user.username) {
                return Err(RepositoryError::UniqueViolation("Username".to_string()));
            }
        }
        Ok(self.seed_user(user, false, None).await)
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>> {
        let mut state = self.state.write().await;
        if let Some(email) = &changes.email {
            if state.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(RepositoryError::UniqueViolation("Email".to_string()));
            }
        }
        if let Some(username) = &changes.username {
            if state.users.values().any(|u| u.id != id && &u.username == username) {
                return Err(RepositoryError::UniqueViolation("Username".to_string()));
            }
        }
        if let Some(role_id) = changes.role_id {
            if !state.roles.contains_key(&role_id) {
                return Err(RepositoryError::ForeignKeyViolation("Role does not exist".to_string()));
            }
        }
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(full_name) = &changes.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        if let Some(can_access_system) = changes.can_access_system {
            user.can_access_system = can_access_system;
        }
        if let Some(hashed_password) = &changes.hashed_password {
            user.hashed_password = hashed_password.clone();
        }
        if let Some(role_id) = changes.role_id {
            user.role_id = Some(role_id);
        }
        user.updated_at = Some(Utc::now());
        Ok(Some(user.clone()))
    }
}
