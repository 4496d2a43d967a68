#![allow(dead_code)]

use rbac_portal::{
    AppConfig, AppState, InMemoryRepository,
    auth::{AuthUser, resolve_identity},
    models::{NewUser, Role, User},
    registry,
    repository::{Repository, RepositoryState},
    security,
};
use std::sync::Arc;

pub const TEST_PASSWORD: &str = "s3cret-pass";

/// In-memory store with the built-in roles and registry modules provisioned.
pub async fn seeded_repo() -> Arc<InMemoryRepository> {
    let repo = Arc::new(InMemoryRepository::new());
    registry::provision(&*repo).await.unwrap();
    repo
}

pub fn new_user(username: &str) -> NewUser {
    NewUser {
        email: format!("{username}@example.com"),
        username: username.to_string(),
        hashed_password: "not-a-real-hash".to_string(),
        full_name: None,
        is_active: true,
        can_access_system: true,
    }
}

/// Same as `new_user`, with a real hash of `TEST_PASSWORD` for login flows.
pub fn new_user_with_password(username: &str) -> NewUser {
    NewUser {
        hashed_password: security::hash_password(TEST_PASSWORD).unwrap(),
        ..new_user(username)
    }
}

pub async fn role(repo: &InMemoryRepository, key: &str) -> Role {
    repo.get_role_by_key(key)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("role {key} not seeded"))
}

/// Seeds a user holding `role_key` (or no role) and returns the stored row.
pub async fn seed_user(repo: &InMemoryRepository, username: &str, role_key: Option<&str>) -> User {
    let role_id = match role_key {
        Some(key) => Some(role(repo, key).await.id),
        None => None,
    };
    repo.seed_user(new_user(username), false, role_id).await
}

/// Seeds a user and resolves it the way the request extractor would.
pub async fn identity(repo: &InMemoryRepository, username: &str, role_key: Option<&str>) -> AuthUser {
    let user = seed_user(repo, username, role_key).await;
    resolve_identity(repo, user).await.unwrap()
}

pub fn app_state(repo: Arc<InMemoryRepository>) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        config: AppConfig::default(),
    }
}

pub fn bearer(config: &AppConfig, username: &str) -> String {
    format!(
        "Bearer {}",
        security::create_access_token(config, username).unwrap()
    )
}
