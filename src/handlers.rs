use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, SUPER_ADMIN_KEY},
    error::{AppError, ValidatedJson},
    models::{
        Action, CreateRoleRequest, CreateUserRequest, LoginRequest, Module, PermissionBulkUpdate,
        Role, RolePermissionMatrix, TokenResponse, UpdateRoleRequest, UpdateUserRequest,
        UserProfile, UserRoleUpdate,
    },
    permissions,
    response::{ApiResponse, PaginationParams},
    roles, security, users,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
};
use serde_json::{Value, json};

/// Module key guarding the access-control API.
const ACCESS_CONTROL: &str = "access_control";

// --- Public ---

/// root
///
/// [Public Route] Service banner with the running version and the docs location.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Welcome")))]
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {}", state.config.app_name),
        "version": state.config.app_version,
        "docs": "/swagger-ui",
    }))
}

/// health
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// login
///
/// [Public Route] Exchanges a username (or email) and password for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password"),
        (status = 403, description = "Account inactive or barred")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<TokenResponse>, AppError> {
    issue_token(&state, payload).await
}

/// login_form
///
/// [Public Route] Form-encoded variant of `login` for OAuth2 password-flow clients
/// (e.g. the Swagger UI "Authorize" dialog).
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Incorrect username or password")
    )
)]
pub async fn login_form(
    State(state): State<AppState>,
    Form(payload): Form<LoginRequest>,
) -> Result<ApiResponse<TokenResponse>, AppError> {
    issue_token(&state, payload).await
}

async fn issue_token(
    state: &AppState,
    payload: LoginRequest,
) -> Result<ApiResponse<TokenResponse>, AppError> {
    let user = users::authenticate(state.repo.as_ref(), &payload.username, &payload.password).await?;
    let token = security::create_access_token(&state.config, &user.username)?;
    tracing::info!(user_id = user.id, "access token issued");
    Ok(ApiResponse::ok(TokenResponse::bearer(token), "Login successful"))
}

/// register_user
///
/// [Public Route] Creates a user account. New accounts hold no role.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 409, description = "Email or username already in use"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    AppError::check(payload.validate())?;
    let user = users::create(state.repo.as_ref(), payload).await?;
    Ok(ApiResponse::created(user.into(), "User created successfully"))
}

// --- Authenticated ---

/// get_me
///
/// [Authenticated Route] Profile of the requesting user.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(user: AuthUser) -> ApiResponse<UserProfile> {
    ApiResponse::ok(user.profile, "Current user retrieved successfully")
}

/// list_users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(PaginationParams),
    responses((status = 200, description = "Paginated users", body = [UserProfile]))
)]
pub async fn list_users(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Vec<UserProfile>>, AppError> {
    let (items, total) = users::list(state.repo.as_ref(), &params).await?;
    let items = items.into_iter().map(UserProfile::from).collect();
    Ok(ApiResponse::list(
        items,
        total,
        params.page(),
        params.per_page(),
        "Users retrieved successfully",
    ))
}

/// get_user
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserProfile),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user = users::get(state.repo.as_ref(), id).await?;
    Ok(ApiResponse::ok(user.into(), "User retrieved successfully"))
}

/// update_user
///
/// [Authenticated Route] Partial profile update. Only the user themself or a
/// superuser may update a profile.
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserProfile),
        (status = 403, description = "Not allowed to update this user"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email or username already in use")
    )
)]
pub async fn update_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    AppError::check(payload.validate())?;
    let user = users::update(state.repo.as_ref(), &actor, id, payload).await?;
    Ok(ApiResponse::ok(user.into(), "User updated successfully"))
}

// --- Access Control ---

/// list_modules
#[utoipa::path(
    get,
    path = "/api/v1/access/modules",
    responses(
        (status = 200, description = "Registered modules", body = [Module]),
        (status = 403, description = "Permission denied")
    )
)]
pub async fn list_modules(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Module>>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Read).await?;
    let modules = repo.list_modules().await?;
    Ok(ApiResponse::unpaginated(modules, "Modules retrieved successfully"))
}

/// list_roles
#[utoipa::path(
    get,
    path = "/api/v1/access/roles",
    responses(
        (status = 200, description = "Roles", body = [Role]),
        (status = 403, description = "Permission denied")
    )
)]
pub async fn list_roles(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Role>>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Read).await?;
    let roles = roles::list(repo).await?;
    Ok(ApiResponse::unpaginated(roles, "Roles retrieved successfully"))
}

/// create_role
///
/// [Access Route] Creates a non-system role.
#[utoipa::path(
    post,
    path = "/api/v1/access/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 403, description = "Permission denied"),
        (status = 409, description = "Role key already exists")
    )
)]
pub async fn create_role(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateRoleRequest>,
) -> Result<ApiResponse<Role>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Create).await?;
    AppError::check(payload.validate())?;
    let role = roles::create(repo, payload).await?;
    Ok(ApiResponse::created(role, "Role created successfully"))
}

/// get_role
#[utoipa::path(
    get,
    path = "/api/v1/access/roles/{id}",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = Role),
        (status = 404, description = "Role not found")
    )
)]
pub async fn get_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Role>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Read).await?;
    let role = roles::get(repo, id).await?;
    Ok(ApiResponse::ok(role, "Role retrieved successfully"))
}

/// update_role
///
/// [Access Route] Partial update. A system role's key cannot change.
#[utoipa::path(
    patch,
    path = "/api/v1/access/roles/{id}",
    params(("id" = i64, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = Role),
        (status = 403, description = "Permission denied or system role key change"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role key already exists")
    )
)]
pub async fn update_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateRoleRequest>,
) -> Result<ApiResponse<Role>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Update).await?;
    AppError::check(payload.validate())?;
    let role = roles::update(repo, id, &payload).await?;
    Ok(ApiResponse::ok(role, "Role updated successfully"))
}

/// delete_role
#[utoipa::path(
    delete,
    path = "/api/v1/access/roles/{id}",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 403, description = "Permission denied or system role"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role still assigned to users")
    )
)]
pub async fn delete_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<()>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Delete).await?;
    roles::delete(repo, id).await?;
    Ok(ApiResponse::deleted("Role deleted successfully"))
}

/// get_role_permissions
///
/// [Access Route] The role's full matrix: one entry per module.
#[utoipa::path(
    get,
    path = "/api/v1/access/roles/{id}/permissions",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Permission matrix", body = RolePermissionMatrix),
        (status = 404, description = "Role not found")
    )
)]
pub async fn get_role_permissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<RolePermissionMatrix>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Read).await?;
    let matrix = permissions::get_matrix_for_role(repo, id).await?;
    Ok(ApiResponse::ok(matrix, "Role permissions retrieved successfully"))
}

/// update_role_permissions
///
/// [Access Route] Bulk upsert of the role's grants. Grants of the super-admin
/// role may only be edited by a super-admin.
#[utoipa::path(
    put,
    path = "/api/v1/access/roles/{id}/permissions",
    params(("id" = i64, Path, description = "Role id")),
    request_body = PermissionBulkUpdate,
    responses(
        (status = 200, description = "Updated permission matrix", body = RolePermissionMatrix),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Role not found")
    )
)]
pub async fn update_role_permissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<PermissionBulkUpdate>,
) -> Result<ApiResponse<RolePermissionMatrix>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Update).await?;

    let role = roles::get(repo, id).await?;
    if role.key == SUPER_ADMIN_KEY && !authz::is_super_admin(user.role.as_ref()) {
        return Err(AppError::ForbiddenMutation(
            "Only a super administrator can modify SUPER_ADMIN permissions".to_string(),
        ));
    }

    let matrix = permissions::bulk_update(repo, id, &payload.permissions).await?;
    Ok(ApiResponse::ok(matrix, "Role permissions updated successfully"))
}

/// assign_user_role
///
/// [Access Route] Moves a user to another role. Granting or revoking the
/// super-admin role requires a super-admin actor.
#[utoipa::path(
    patch,
    path = "/api/v1/access/users/{id}/role",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserRoleUpdate,
    responses(
        (status = 200, description = "Role assigned", body = UserProfile),
        (status = 403, description = "Permission denied or super-admin role change"),
        (status = 404, description = "User or role not found")
    )
)]
pub async fn assign_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UserRoleUpdate>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let repo = state.repo.as_ref();
    authz::enforce(repo, &user, ACCESS_CONTROL, Action::Update).await?;

    let target = users::get(repo, id).await?;
    let new_role = roles::get(repo, payload.role_id).await?;
    let current_role = match target.role_id {
        Some(role_id) => repo.get_role(role_id).await?,
        None => None,
    };
    let touches_super_admin =
        authz::is_super_admin(Some(&new_role)) || authz::is_super_admin(current_role.as_ref());
    if touches_super_admin && !authz::is_super_admin(user.role.as_ref()) {
        return Err(AppError::ForbiddenMutation(
            "Only a super administrator can grant or revoke the SUPER_ADMIN role".to_string(),
        ));
    }

    let updated = users::assign_role(repo, id, payload.role_id).await?;
    Ok(ApiResponse::ok(updated.into(), "User role updated successfully"))
}
