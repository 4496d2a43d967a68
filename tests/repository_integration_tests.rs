use rbac_portal::{
    models::{Capabilities, NewModule, NewRole, NewUser, UpdateRoleRequest, UserChanges},
    repository::{PostgresRepository, Repository, RepositoryError},
};
use sqlx::PgPool;
use std::sync::atomic::{AtomicU64, Ordering};

// --- Test Context and Setup ---

/// Holds the pool for one test. Every key created through `unique` carries a
/// per-run suffix so tests can share a database without cleanup.
struct DbTestContext {
    pool: PgPool,
    suffix: String,
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

impl DbTestContext {
    /// Returns None (and the test becomes a no-op) without a reachable database.
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping Postgres repository test");
            return None;
        };

        let pool = match PgPool::connect(&db_url).await {
            Ok(pool) => pool,
            Err(err) => {
                eprintln!("cannot connect to postgres ({err}); skipping Postgres repository test");
                return None;
            }
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let suffix = format!("{}_{}", nanos, COUNTER.fetch_add(1, Ordering::SeqCst));

        Some(DbTestContext { pool, suffix })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }

    fn unique(&self, base: &str) -> String {
        format!("{base}_{}", self.suffix)
    }
}

fn all_caps() -> Capabilities {
    Capabilities {
        can_read: true,
        can_create: true,
        can_update: true,
        can_delete: true,
    }
}

// --- Tests ---

#[tokio::test]
async fn test_role_key_uniqueness_maps_to_conflict() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();
    let key = ctx.unique("DUP");

    let new_role = || NewRole {
        key: key.clone(),
        name: "Dup".to_string(),
        description: None,
        is_system: false,
    };
    repo.insert_role(new_role()).await.unwrap();
    let err = repo.insert_role(new_role()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::UniqueViolation(ref what) if what == "Role key"));
}

#[tokio::test]
async fn test_partial_role_update_uses_coalesce() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();

    let role = repo
        .insert_role(NewRole {
            key: ctx.unique("PARTIAL"),
            name: "Before".to_string(),
            description: Some("kept".to_string()),
            is_system: false,
        })
        .await
        .unwrap();

    let patch = UpdateRoleRequest {
        name: Some("After".to_string()),
        ..UpdateRoleRequest::default()
    };
    let updated = repo.update_role(role.id, &patch).await.unwrap().unwrap();
    assert_eq!(updated.key, role.key);
    assert_eq!(updated.name, "After");
    assert_eq!(updated.description.as_deref(), Some("kept"));

    assert!(repo.update_role(-1, &patch).await.unwrap().is_none());
}

#[tokio::test]
async fn test_grant_upsert_and_cascades() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();

    let role = repo
        .insert_role(NewRole {
            key: ctx.unique("GRANTS"),
            name: "Grants".to_string(),
            description: None,
            is_system: false,
        })
        .await
        .unwrap();
    let module_key = ctx.unique("mod");
    let module = repo
        .insert_module(NewModule {
            key: module_key.clone(),
            name: "Mod".to_string(),
            description: None,
        })
        .await
        .unwrap();

    repo.upsert_grants(role.id, &[(module.id, all_caps())]).await.unwrap();
    repo.upsert_grants(role.id, &[(module.id, Capabilities { can_read: true, ..Capabilities::default() })])
        .await
        .unwrap();

    let grants = repo.list_grants_for_role(role.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert!(grants[0].can_read && !grants[0].can_delete);

    let found = repo.find_grant(role.id, &module_key).await.unwrap().unwrap();
    assert_eq!(found.id, grants[0].id);
    assert!(repo.find_grant(role.id, "no_such_module").await.unwrap().is_none());

    // A batch with a dangling module id rolls back entirely.
    let other = repo
        .insert_module(NewModule {
            key: ctx.unique("other"),
            name: "Other".to_string(),
            description: None,
        })
        .await
        .unwrap();
    let err = repo
        .upsert_grants(role.id, &[(other.id, all_caps()), (-42, all_caps())])
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    assert_eq!(repo.list_grants_for_role(role.id).await.unwrap().len(), 1);

    assert!(repo.delete_module(module.id).await.unwrap());
    assert!(repo.list_grants_for_role(role.id).await.unwrap().is_empty());

    repo.upsert_grants(role.id, &[(other.id, all_caps())]).await.unwrap();
    assert!(repo.delete_role(role.id).await.unwrap());
    assert!(repo.list_grants_for_role(role.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_lookup_and_role_count() {
    let Some(ctx) = DbTestContext::setup().await else { return };
    let repo = ctx.repository();

    let role = repo
        .insert_role(NewRole {
            key: ctx.unique("MEMBERS"),
            name: "Members".to_string(),
            description: None,
            is_system: false,
        })
        .await
        .unwrap();

    let username = ctx.unique("user");
    let email = format!("{username}@example.com");
    let user = repo
        .insert_user(NewUser {
            email: email.clone(),
            username: username.clone(),
            hashed_password: "hash".to_string(),
            full_name: None,
            is_active: true,
            can_access_system: true,
        })
        .await
        .unwrap();
    assert!(user.role_id.is_none());

    assert_eq!(repo.get_user_by_login(&username).await.unwrap().unwrap().id, user.id);
    assert_eq!(repo.get_user_by_login(&email).await.unwrap().unwrap().id, user.id);

    let changes = UserChanges {
        role_id: Some(role.id),
        ..UserChanges::default()
    };
    let updated = repo.update_user(user.id, &changes).await.unwrap().unwrap();
    assert_eq!(updated.role_id, Some(role.id));
    assert!(updated.updated_at.is_some());
    assert_eq!(repo.count_users_with_role(role.id).await.unwrap(), 1);

    let err = repo.delete_role(role.id).await.unwrap_err();
    assert!(
        matches!(err, RepositoryError::ForeignKeyViolation(ref reason) if reason == "Role is still assigned to users")
    );

    let err = repo
        .insert_user(NewUser {
            email,
            username: ctx.unique("other_user"),
            hashed_password: "hash".to_string(),
            full_name: None,
            is_active: true,
            can_access_system: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::UniqueViolation(ref what) if what == "Email"));
}
