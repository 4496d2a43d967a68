//! Role lifecycle manager: create, update and delete with the protections
//! around system roles and roles still assigned to users.
use crate::{
    error::AppError,
    models::{CreateRoleRequest, NewRole, Role, UpdateRoleRequest},
    repository::Repository,
};

pub async fn list(repo: &dyn Repository) -> Result<Vec<Role>, AppError> {
    Ok(repo.list_roles().await?)
}

pub async fn get(repo: &dyn Repository, role_id: i64) -> Result<Role, AppError> {
    repo.get_role(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Role not found".to_string()))
}

/// API-created roles are never system roles, whatever the caller sends.
pub async fn create(repo: &dyn Repository, input: CreateRoleRequest) -> Result<Role, AppError> {
    if repo.get_role_by_key(&input.key).await?.is_some() {
        return Err(AppError::Conflict("Role key already exists".to_string()));
    }

    let role = repo
        .insert_role(NewRole {
            key: input.key,
            name: input.name,
            description: input.description,
            is_system: false,
        })
        .await?;

    tracing::info!(role_id = role.id, key = %role.key, "role created");
    Ok(role)
}

pub async fn update(
    repo: &dyn Repository,
    role_id: i64,
    patch: &UpdateRoleRequest,
) -> Result<Role, AppError> {
    let role = get(repo, role_id).await?;

    if let Some(key) = &patch.key {
        if role.is_system {
            return Err(AppError::ForbiddenMutation(
                "System role key cannot be changed".to_string(),
            ));
        }
        if let Some(other) = repo.get_role_by_key(key).await? {
            if other.id != role_id {
                return Err(AppError::Conflict("Role key already exists".to_string()));
            }
        }
    }

    let updated = repo
        .update_role(role_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;

    tracing::info!(role_id, "role updated");
    Ok(updated)
}

/// Deleting a role also removes its permission grants.
pub async fn delete(repo: &dyn Repository, role_id: i64) -> Result<(), AppError> {
    let role = get(repo, role_id).await?;

    if role.is_system {
        return Err(AppError::ForbiddenMutation(
            "System roles cannot be deleted".to_string(),
        ));
    }

    let dependents = repo.count_users_with_role(role_id).await?;
    if dependents > 0 {
        return Err(AppError::Conflict(format!(
            "Role is assigned to {dependents} user(s) and cannot be deleted"
        )));
    }

    if !repo.delete_role(role_id).await? {
        return Err(AppError::NotFound("Role not found".to_string()));
    }

    tracing::info!(role_id, key = %role.key, "role deleted");
    Ok(())
}
