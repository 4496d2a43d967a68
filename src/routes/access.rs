use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Access-Control Router Module
///
/// Nested under `/api/v1/access`. Each handler calls `authz::enforce` against the
/// `access_control` module with the action matching the HTTP verb (read, create,
/// update, delete) before touching the store.
pub fn access_routes() -> Router<AppState> {
    Router::new()
        // GET /modules
        // Persisted mirror of the module registry.
        .route("/modules", get(handlers::list_modules))
        // GET/POST /roles
        .route(
            "/roles",
            get(handlers::list_roles).post(handlers::create_role),
        )
        // GET/PATCH/DELETE /roles/{id}
        // System roles keep their key and cannot be deleted; roles still assigned
        // to users cannot be deleted either.
        .route(
            "/roles/{id}",
            get(handlers::get_role)
                .patch(handlers::update_role)
                .delete(handlers::delete_role),
        )
        // GET/PUT /roles/{id}/permissions
        // Full matrix read and bulk grant update.
        .route(
            "/roles/{id}/permissions",
            get(handlers::get_role_permissions).put(handlers::update_role_permissions),
        )
        // PATCH /users/{id}/role
        .route("/users/{id}/role", patch(handlers::assign_user_role))
}
