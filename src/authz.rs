//! Authorization resolver.
//!
//! Decides whether an authenticated user may perform an action on a module.
//! Resolution is read-only and fails closed: no role, an unknown module, a
//! missing grant or an unrecognized action all deny.
use crate::{
    auth::AuthUser,
    error::AppError,
    models::{Action, Role},
    repository::Repository,
};

/// Reserved key of the privileged role that bypasses the permission matrix.
pub const SUPER_ADMIN_KEY: &str = "SUPER_ADMIN";

pub fn is_super_admin(role: Option<&Role>) -> bool {
    role.is_some_and(|role| role.key == SUPER_ADMIN_KEY)
}

/// resolve
///
/// The matrix is never consulted for the super-admin role.
pub async fn resolve(
    repo: &dyn Repository,
    user: &AuthUser,
    module_key: &str,
    action: Action,
) -> Result<bool, AppError> {
    let Some(role) = user.role.as_ref() else {
        return Ok(false);
    };
    if is_super_admin(Some(role)) {
        return Ok(true);
    }

    let grant = repo.find_grant(role.id, module_key).await?;
    Ok(grant.is_some_and(|grant| grant.capabilities().allows(action)))
}

/// Same as `resolve`, for an action given by its wire name. An unknown name
/// denies every role except the super-admin, which is never matrix-checked.
pub async fn resolve_named(
    repo: &dyn Repository,
    user: &AuthUser,
    module_key: &str,
    action: &str,
) -> Result<bool, AppError> {
    match Action::parse(action) {
        Some(action) => resolve(repo, user, module_key, action).await,
        None => {
            let allowed = is_super_admin(user.role.as_ref());
            if !allowed {
                tracing::debug!(action, module_key, "unrecognized action denied");
            }
            Ok(allowed)
        }
    }
}

/// enforce
///
/// Fails with `AuthorizationDenied` when `resolve` denies.
pub async fn enforce(
    repo: &dyn Repository,
    user: &AuthUser,
    module_key: &str,
    action: Action,
) -> Result<(), AppError> {
    if resolve(repo, user, module_key, action).await? {
        Ok(())
    } else {
        Err(AppError::AuthorizationDenied {
            module_key: module_key.to_string(),
            action,
        })
    }
}
