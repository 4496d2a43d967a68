use crate::models::{
    Capabilities, Module, NewModule, NewRole, NewUser, PermissionGrant, Role, UpdateRoleRequest,
    User, UserChanges,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Constraint violations are
/// reported separately so callers can turn them into a conflict instead of a 500.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// A referenced row is missing, or a referenced row is still in use.
    #[error("foreign key violated: {0}")]
    ForeignKeyViolation(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract for roles, modules, permission grants and users.
/// Handlers and the access-control core only ever talk to this trait, so the
/// Postgres backend and the in-memory backend are interchangeable.
///
/// Implementations must enforce:
/// - unique `roles.key`, `modules.key`, `users.email`, `users.username`
/// - at most one grant per (role, module)
/// - cascading grant deletion when a role or module is deleted
/// - all-or-nothing application of `upsert_grants`
/// - no deletion of a role that users still reference
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Roles ---
    async fn list_roles(&self) -> RepoResult<Vec<Role>>;
    async fn get_role(&self, id: i64) -> RepoResult<Option<Role>>;
    async fn get_role_by_key(&self, key: &str) -> RepoResult<Option<Role>>;
    async fn insert_role(&self, role: NewRole) -> RepoResult<Role>;
    // Applies only the `Some` fields of the patch. Returns None if the role is absent.
    async fn update_role(&self, id: i64, patch: &UpdateRoleRequest) -> RepoResult<Option<Role>>;
    // Deletes the role and its grants. Returns false if nothing was deleted.
    async fn delete_role(&self, id: i64) -> RepoResult<bool>;
    async fn count_users_with_role(&self, role_id: i64) -> RepoResult<i64>;

    // --- Modules ---
    async fn list_modules(&self) -> RepoResult<Vec<Module>>;
    async fn get_module_by_key(&self, key: &str) -> RepoResult<Option<Module>>;
    async fn insert_module(&self, module: NewModule) -> RepoResult<Module>;
    async fn update_module(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> RepoResult<Option<Module>>;
    // Deletes the module and its grants. Never called by registry sync.
    async fn delete_module(&self, id: i64) -> RepoResult<bool>;

    // --- Permission Grants ---
    // The unique grant for (role, module identified by key), if any.
    async fn find_grant(&self, role_id: i64, module_key: &str) -> RepoResult<Option<PermissionGrant>>;
    async fn list_grants_for_role(&self, role_id: i64) -> RepoResult<Vec<PermissionGrant>>;
    // Inserts or overwrites one grant per (module_id, capabilities) entry, atomically.
    async fn upsert_grants(&self, role_id: i64, grants: &[(i64, Capabilities)]) -> RepoResult<()>;

    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    // Looks a user up by username or email.
    async fn get_user_by_login(&self, identifier: &str) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn list_users(&self, offset: i64, limit: i64) -> RepoResult<Vec<User>>;
    async fn count_users(&self) -> RepoResult<i64>;
    async fn insert_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
