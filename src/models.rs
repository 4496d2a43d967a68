use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::response::ErrorDetail;

// --- Core Access-Control Schemas (Mapped to Database) ---

/// Role
///
/// A named bundle of permissions from the `roles` table.
/// `is_system` marks built-in roles; it is only ever set during provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: i64,
    // Unique, immutable once the role is a system role.
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
}

/// Module
///
/// A permissionable functional area from the `modules` table. Rows are mirrored
/// from the static registry (see `registry::MODULE_REGISTRY`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Module {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

/// PermissionGrant
///
/// One row of `role_module_permissions`. At most one exists per (role, module).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PermissionGrant {
    pub id: i64,
    pub role_id: i64,
    pub module_id: i64,
    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl PermissionGrant {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_read: self.can_read,
            can_create: self.can_create,
            can_update: self.can_update,
            can_delete: self.can_delete,
        }
    }
}

/// Capabilities
///
/// The four independent booleans of a grant. `Default` is "no access", which is
/// also what a missing grant row means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl Capabilities {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.can_read,
            Action::Create => self.can_create,
            Action::Update => self.can_update,
            Action::Delete => self.can_delete,
        }
    }
}

/// Action
///
/// The operations a grant can allow on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Parses a wire action name. Anything unrecognized is `None` so callers can
    /// fail closed.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Self::Read),
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User
///
/// Canonical row of the `users` table, including the password hash.
/// Never serialized to clients; see `UserProfile` for the public shape.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub can_access_system: bool,
    pub is_superuser: bool,
    // Nullable FK to roles.id; a user without a role has no permissions.
    pub role_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Store Inputs ---

/// Insert payload for a role. Only provisioning passes `is_system = true`.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
}

#[derive(Debug, Clone)]
pub struct NewModule {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub can_access_system: bool,
}

/// UserChanges
///
/// Store-level partial update for a user. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub can_access_system: Option<bool>,
    pub hashed_password: Option<String>,
    pub role_id: Option<i64>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateRoleRequest
///
/// Input payload for POST /api/v1/access/roles. There is deliberately no
/// `is_system` field: API-created roles are never system roles.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateRoleRequest {
    #[schema(example = "AUDITOR")]
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateRoleRequest {
    pub fn validate(&self) -> Vec<ErrorDetail> {
        let mut errors = Vec::new();
        check_role_key(&self.key, &mut errors);
        check_role_name(&self.name, &mut errors);
        if let Some(description) = &self.description {
            check_role_description(description, &mut errors);
        }
        errors
    }
}

// Column limits of the `roles` table.
const ROLE_KEY_MAX: usize = 50;
const ROLE_NAME_MAX: usize = 100;
const ROLE_DESCRIPTION_MAX: usize = 255;

fn check_role_key(key: &str, errors: &mut Vec<ErrorDetail>) {
    if key.trim().is_empty() {
        errors.push(ErrorDetail::field("key", "Role key must not be empty"));
    }
    if key.chars().count() > ROLE_KEY_MAX {
        errors.push(ErrorDetail::field(
            "key",
            format!("Role key must be at most {ROLE_KEY_MAX} characters"),
        ));
    }
}

fn check_role_name(name: &str, errors: &mut Vec<ErrorDetail>) {
    if name.trim().is_empty() {
        errors.push(ErrorDetail::field("name", "Role name must not be empty"));
    }
    if name.chars().count() > ROLE_NAME_MAX {
        errors.push(ErrorDetail::field(
            "name",
            format!("Role name must be at most {ROLE_NAME_MAX} characters"),
        ));
    }
}

fn check_role_description(description: &str, errors: &mut Vec<ErrorDetail>) {
    if description.chars().count() > ROLE_DESCRIPTION_MAX {
        errors.push(ErrorDetail::field(
            "description",
            format!("Role description must be at most {ROLE_DESCRIPTION_MAX} characters"),
        ));
    }
}

/// UpdateRoleRequest
///
/// Partial update payload for PATCH /api/v1/access/roles/{id}.
/// Absent fields are left untouched; a present `key` on a system role is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateRoleRequest {
    pub fn validate(&self) -> Vec<ErrorDetail> {
        let mut errors = Vec::new();
        if let Some(key) = &self.key {
            check_role_key(key, &mut errors);
        }
        if let Some(name) = &self.name {
            check_role_name(name, &mut errors);
        }
        if let Some(description) = &self.description {
            check_role_description(description, &mut errors);
        }
        errors
    }
}

/// GrantInput
///
/// One entry of a bulk permission update. Omitted capabilities default to false.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GrantInput {
    #[schema(example = "users")]
    pub module_key: String,
    #[serde(default)]
    pub can_read: bool,
    #[serde(default)]
    pub can_create: bool,
    #[serde(default)]
    pub can_update: bool,
    #[serde(default)]
    pub can_delete: bool,
}

impl GrantInput {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_read: self.can_read,
            can_create: self.can_create,
            can_update: self.can_update,
            can_delete: self.can_delete,
        }
    }
}

/// PermissionBulkUpdate
///
/// Input payload for PUT /api/v1/access/roles/{id}/permissions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PermissionBulkUpdate {
    pub permissions: Vec<GrantInput>,
}

/// UserRoleUpdate
///
/// Input payload for PATCH /api/v1/access/users/{id}/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserRoleUpdate {
    pub role_id: i64,
}

/// LoginRequest
///
/// Credentials for POST /api/v1/auth/login (JSON) and /api/v1/auth/token (form).
/// `username` may hold either the username or the email address.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Input payload for POST /api/v1/users. The password is hashed before storage
/// and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub can_access_system: bool,
    pub password: String,
}

fn default_true() -> bool {
    true
}

impl CreateUserRequest {
    pub fn validate(&self) -> Vec<ErrorDetail> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        check_username(&self.username, &mut errors);
        if let Some(full_name) = &self.full_name {
            check_full_name(full_name, &mut errors);
        }
        if self.password.is_empty() {
            errors.push(ErrorDetail::field("password", "Password must not be empty"));
        }
        errors
    }
}

/// UpdateUserRequest
///
/// Partial update payload for PUT /api/v1/users/{id}.
/// Role assignment is not part of this payload; it goes through the
/// access-control API so it stays behind the `access_control:update` permission.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_access_system: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Vec<ErrorDetail> {
        let mut errors = Vec::new();
        if let Some(email) = &self.email {
            check_email(email, &mut errors);
        }
        if let Some(username) = &self.username {
            check_username(username, &mut errors);
        }
        if let Some(full_name) = &self.full_name {
            check_full_name(full_name, &mut errors);
        }
        if let Some(password) = &self.password {
            if password.is_empty() {
                errors.push(ErrorDetail::field("password", "Password must not be empty"));
            }
        }
        errors
    }
}

// Column limits of the `users` table.
const EMAIL_MAX: usize = 255;
const USERNAME_MAX: usize = 100;
const FULL_NAME_MAX: usize = 255;

fn check_email(email: &str, errors: &mut Vec<ErrorDetail>) {
    if !looks_like_email(email) {
        errors.push(ErrorDetail::field("email", "Value is not a valid email address"));
    } else if email.chars().count() > EMAIL_MAX {
        errors.push(ErrorDetail::field(
            "email",
            format!("Email must be at most {EMAIL_MAX} characters"),
        ));
    }
}

fn check_username(username: &str, errors: &mut Vec<ErrorDetail>) {
    if username.trim().is_empty() {
        errors.push(ErrorDetail::field("username", "Username must not be empty"));
    }
    if username.chars().count() > USERNAME_MAX {
        errors.push(ErrorDetail::field(
            "username",
            format!("Username must be at most {USERNAME_MAX} characters"),
        ));
    }
}

fn check_full_name(full_name: &str, errors: &mut Vec<ErrorDetail>) {
    if full_name.chars().count() > FULL_NAME_MAX {
        errors.push(ErrorDetail::field(
            "full_name",
            format!("Full name must be at most {FULL_NAME_MAX} characters"),
        ));
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

// --- Output Schemas ---

/// TokenResponse
///
/// Output of the login endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// UserProfile
///
/// Public view of a user. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub can_access_system: bool,
    pub role_id: Option<i64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            is_active: user.is_active,
            can_access_system: user.can_access_system,
            role_id: user.role_id,
            created_at: user.created_at,
        }
    }
}

/// ModulePermission
///
/// One row of a role's permission matrix: a module plus the role's capabilities
/// on it (all false when no grant row exists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ModulePermission {
    pub module_id: i64,
    pub module_key: String,
    pub module_name: String,
    pub can_read: bool,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl ModulePermission {
    pub fn new(module: &Module, capabilities: Capabilities) -> Self {
        Self {
            module_id: module.id,
            module_key: module.key.clone(),
            module_name: module.name.clone(),
            can_read: capabilities.can_read,
            can_create: capabilities.can_create,
            can_update: capabilities.can_update,
            can_delete: capabilities.can_delete,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_read: self.can_read,
            can_create: self.can_create,
            can_update: self.can_update,
            can_delete: self.can_delete,
        }
    }
}

/// RolePermissionMatrix
///
/// A role with one `ModulePermission` per persisted module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RolePermissionMatrix {
    pub role: Role,
    pub modules: Vec<ModulePermission>,
}
