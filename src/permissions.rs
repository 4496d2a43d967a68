//! Permission matrix store.
use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{Capabilities, GrantInput, ModulePermission, RolePermissionMatrix},
    repository::Repository,
};

/// get_matrix_for_role
///
/// One entry per persisted module, in module order. Modules without a grant row
/// report all four capabilities as false.
pub async fn get_matrix_for_role(
    repo: &dyn Repository,
    role_id: i64,
) -> Result<RolePermissionMatrix, AppError> {
    let role = repo
        .get_role(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;

    let grants: HashMap<i64, Capabilities> = repo
        .list_grants_for_role(role_id)
        .await?
        .into_iter()
        .map(|grant| (grant.module_id, grant.capabilities()))
        .collect();

    let modules = repo
        .list_modules()
        .await?
        .iter()
        .map(|module| {
            let capabilities = grants.get(&module.id).copied().unwrap_or_default();
            ModulePermission::new(module, capabilities)
        })
        .collect();

    Ok(RolePermissionMatrix { role, modules })
}

/// bulk_update
///
/// Overwrites (or inserts) the grant of every listed module in one atomic write.
/// Entries naming an unknown module key are skipped. When a module is listed
/// twice the last entry wins.
pub async fn bulk_update(
    repo: &dyn Repository,
    role_id: i64,
    entries: &[GrantInput],
) -> Result<RolePermissionMatrix, AppError> {
    if repo.get_role(role_id).await?.is_none() {
        return Err(AppError::NotFound("Role not found".to_string()));
    }

    let modules: HashMap<String, i64> = repo
        .list_modules()
        .await?
        .into_iter()
        .map(|module| (module.key, module.id))
        .collect();

    let mut batch: Vec<(i64, Capabilities)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(&module_id) = modules.get(&entry.module_key) else {
            tracing::warn!(role_id, module_key = %entry.module_key, "skipping grant for unknown module");
            continue;
        };
        match batch.iter_mut().find(|(id, _)| *id == module_id) {
            Some(existing) => existing.1 = entry.capabilities(),
            None => batch.push((module_id, entry.capabilities())),
        }
    }

    repo.upsert_grants(role_id, &batch).await?;
    tracing::info!(role_id, grants = batch.len(), "role permissions updated");

    get_matrix_for_role(repo, role_id).await
}
