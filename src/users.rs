//! User accounts: registration, lookup, profile updates, credential checks and
//! role assignment.
use crate::{
    auth::{AuthUser, ensure_access},
    error::AppError,
    models::{CreateUserRequest, NewUser, UpdateUserRequest, User, UserChanges},
    repository::Repository,
    response::PaginationParams,
    security,
};

pub async fn create(repo: &dyn Repository, input: CreateUserRequest) -> Result<User, AppError> {
    if repo.get_user_by_email(&input.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    if repo.get_user_by_username(&input.username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let hashed_password = security::hash_password(&input.password)?;
    let user = repo
        .insert_user(NewUser {
            email: input.email,
            username: input.username,
            hashed_password,
            full_name: input.full_name,
            is_active: input.is_active,
            can_access_system: input.can_access_system,
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}

/// Returns one page of users and the total user count.
pub async fn list(
    repo: &dyn Repository,
    params: &PaginationParams,
) -> Result<(Vec<User>, i64), AppError> {
    let total = repo.count_users().await?;
    let users = repo.list_users(params.offset(), params.per_page()).await?;
    Ok((users, total))
}

pub async fn get(repo: &dyn Repository, user_id: i64) -> Result<User, AppError> {
    repo.get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Users may update their own profile; superusers may update anyone's.
pub async fn update(
    repo: &dyn Repository,
    actor: &AuthUser,
    user_id: i64,
    input: UpdateUserRequest,
) -> Result<User, AppError> {
    let existing = get(repo, user_id).await?;

    if actor.id != existing.id && !actor.is_superuser {
        return Err(AppError::Forbidden(
            "Not enough permissions to update this user".to_string(),
        ));
    }

    if let Some(email) = &input.email {
        if let Some(other) = repo.get_user_by_email(email).await? {
            if other.id != user_id {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }
    }
    if let Some(username) = &input.username {
        if let Some(other) = repo.get_user_by_username(username).await? {
            if other.id != user_id {
                return Err(AppError::Conflict("Username already taken".to_string()));
            }
        }
    }

    let hashed_password = match &input.password {
        Some(password) => Some(security::hash_password(password)?),
        None => None,
    };

    let changes = UserChanges {
        email: input.email,
        username: input.username,
        full_name: input.full_name,
        is_active: input.is_active,
        can_access_system: input.can_access_system,
        hashed_password,
        role_id: None,
    };

    let updated = repo
        .update_user(user_id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id, actor_id = actor.id, "user updated");
    Ok(updated)
}

/// authenticate
///
/// Checks credentials given as username or email. Unknown users and wrong
/// passwords are indistinguishable to the caller.
pub async fn authenticate(
    repo: &dyn Repository,
    identifier: &str,
    password: &str,
) -> Result<User, AppError> {
    let invalid = || AppError::Unauthorized("Incorrect username or password".to_string());

    let user = repo.get_user_by_login(identifier).await?.ok_or_else(invalid)?;
    if !security::verify_password(password, &user.hashed_password) {
        tracing::debug!(identifier, "login rejected: bad password");
        return Err(invalid());
    }

    ensure_access(&user)?;
    Ok(user)
}

pub async fn assign_role(repo: &dyn Repository, user_id: i64, role_id: i64) -> Result<User, AppError> {
    get(repo, user_id).await?;
    if repo.get_role(role_id).await?.is_none() {
        return Err(AppError::NotFound("Role not found".to_string()));
    }

    let changes = UserChanges {
        role_id: Some(role_id),
        ..UserChanges::default()
    };
    let user = repo
        .update_user(user_id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id, role_id, "role assigned to user");
    Ok(user)
}
