/// Router Module Index
///
/// Routes are grouped by who may call them. Authentication is enforced by the
/// `AuthUser` extractor in each protected handler; module permissions are
/// enforced inside the access-control handlers via `authz::enforce`.

/// Routes reachable without credentials.
pub mod public;

/// Routes that require a valid bearer token (or the local `x-user-id` bypass).
pub mod authenticated;

/// Role, permission and module administration, gated by the `access_control` module.
pub mod access;
