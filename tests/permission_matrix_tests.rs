mod common;

use common::{role, seeded_repo};
use rbac_portal::{
    AppError, InMemoryRepository,
    models::{Capabilities, GrantInput, NewModule, PermissionBulkUpdate},
    permissions,
    repository::Repository,
};

fn grant(module_key: &str, can_read: bool, can_create: bool, can_update: bool, can_delete: bool) -> GrantInput {
    GrantInput {
        module_key: module_key.to_string(),
        can_read,
        can_create,
        can_update,
        can_delete,
    }
}

#[tokio::test]
async fn test_matrix_has_one_entry_per_module() {
    let repo = seeded_repo().await;
    let admin = role(&repo, "ADMIN").await;
    let module_count = repo.list_modules().await.unwrap().len();

    // No grants at all.
    let matrix = permissions::get_matrix_for_role(&*repo, admin.id).await.unwrap();
    assert_eq!(matrix.role, admin);
    assert_eq!(matrix.modules.len(), module_count);
    assert!(matrix.modules.iter().all(|m| m.capabilities() == Capabilities::default()));

    // One grant: still one entry per module.
    permissions::bulk_update(&*repo, admin.id, &[grant("reports", true, false, false, false)])
        .await
        .unwrap();
    let matrix = permissions::get_matrix_for_role(&*repo, admin.id).await.unwrap();
    assert_eq!(matrix.modules.len(), module_count);

    let reports = matrix.modules.iter().find(|m| m.module_key == "reports").unwrap();
    assert!(reports.can_read);
    assert!(!reports.can_create && !reports.can_update && !reports.can_delete);

    // A module added later shows up with all-false capabilities.
    repo.insert_module(NewModule {
        key: "billing".to_string(),
        name: "Billing".to_string(),
        description: None,
    })
    .await
    .unwrap();
    let matrix = permissions::get_matrix_for_role(&*repo, admin.id).await.unwrap();
    assert_eq!(matrix.modules.len(), module_count + 1);
    let billing = matrix.modules.iter().find(|m| m.module_key == "billing").unwrap();
    assert_eq!(billing.capabilities(), Capabilities::default());
}

#[tokio::test]
async fn test_matrix_for_missing_role_is_not_found() {
    let repo = seeded_repo().await;
    let err = permissions::get_matrix_for_role(&*repo, 9_999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = permissions::bulk_update(&*repo, 9_999, &[grant("users", true, true, true, true)])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_bulk_update_is_idempotent() {
    let repo = seeded_repo().await;
    let admin = role(&repo, "ADMIN").await;
    let payload = vec![
        grant("users", true, true, false, false),
        grant("access_control", true, false, true, false),
    ];

    let first = permissions::bulk_update(&*repo, admin.id, &payload).await.unwrap();
    let grants_after_first = repo.list_grants_for_role(admin.id).await.unwrap();

    let second = permissions::bulk_update(&*repo, admin.id, &payload).await.unwrap();
    let grants_after_second = repo.list_grants_for_role(admin.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(grants_after_first, grants_after_second);
    assert_eq!(grants_after_second.len(), 2);
}

#[tokio::test]
async fn test_bulk_update_overwrites_all_four_fields() {
    let repo = seeded_repo().await;
    let admin = role(&repo, "ADMIN").await;

    permissions::bulk_update(&*repo, admin.id, &[grant("users", true, true, true, true)])
        .await
        .unwrap();
    let matrix = permissions::bulk_update(&*repo, admin.id, &[grant("users", false, true, false, false)])
        .await
        .unwrap();

    let users = matrix.modules.iter().find(|m| m.module_key == "users").unwrap();
    assert_eq!(
        users.capabilities(),
        Capabilities {
            can_read: false,
            can_create: true,
            can_update: false,
            can_delete: false,
        }
    );
    assert_eq!(repo.list_grants_for_role(admin.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_update_skips_unknown_module_keys() {
    let repo = seeded_repo().await;
    let admin = role(&repo, "ADMIN").await;

    let matrix = permissions::bulk_update(
        &*repo,
        admin.id,
        &[
            grant("no_such_module", true, true, true, true),
            grant("inventory", true, false, false, false),
        ],
    )
    .await
    .unwrap();

    let grants = repo.list_grants_for_role(admin.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert!(matrix.modules.iter().all(|m| m.module_key != "no_such_module"));
    assert!(matrix.modules.iter().find(|m| m.module_key == "inventory").unwrap().can_read);
}

#[tokio::test]
async fn test_omitted_capabilities_default_to_false() {
    let repo = seeded_repo().await;
    let admin = role(&repo, "ADMIN").await;

    let payload: PermissionBulkUpdate = serde_json::from_value(serde_json::json!({
        "permissions": [{ "module_key": "users", "can_update": true }]
    }))
    .unwrap();

    let matrix = permissions::bulk_update(&*repo, admin.id, &payload.permissions).await.unwrap();
    let users = matrix.modules.iter().find(|m| m.module_key == "users").unwrap();
    assert!(users.can_update);
    assert!(!users.can_read && !users.can_create && !users.can_delete);
}

#[tokio::test]
async fn test_grant_batch_is_all_or_nothing() {
    let repo = InMemoryRepository::new();
    let role = repo
        .insert_role(rbac_portal::models::NewRole {
            key: "EDITOR".to_string(),
            name: "Editor".to_string(),
            description: None,
            is_system: false,
        })
        .await
        .unwrap();
    let module = repo
        .insert_module(NewModule {
            key: "users".to_string(),
            name: "Users".to_string(),
            description: None,
        })
        .await
        .unwrap();

    let all = Capabilities {
        can_read: true,
        can_create: true,
        can_update: true,
        can_delete: true,
    };
    // Second entry references a module that does not exist.
    let result = repo.upsert_grants(role.id, &[(module.id, all), (424_242, all)]).await;
    assert!(matches!(result, Err(rbac_portal::repository::RepositoryError::ForeignKeyViolation(_))));
    assert!(repo.list_grants_for_role(role.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_module_cascades_to_grants() {
    let repo = seeded_repo().await;
    let admin = role(&repo, "ADMIN").await;
    permissions::bulk_update(
        &*repo,
        admin.id,
        &[grant("users", true, false, false, false), grant("reports", true, false, false, false)],
    )
    .await
    .unwrap();

    let reports = repo.get_module_by_key("reports").await.unwrap().unwrap();
    assert!(repo.delete_module(reports.id).await.unwrap());

    let grants = repo.list_grants_for_role(admin.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert!(grants.iter().all(|g| g.module_id != reports.id));
}
