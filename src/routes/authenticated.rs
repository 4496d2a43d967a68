use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Authenticated Router Module
///
/// Identity and user-management endpoints. Every handler here except
/// `register_user` takes an `AuthUser`, so a missing or invalid token is
/// rejected with 401 before the handler body runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/v1/auth/me
        // Profile of the requesting user.
        .route("/api/v1/auth/me", get(handlers::get_me))
        // GET  /api/v1/users?page=&perPage=   paginated listing (authenticated)
        // POST /api/v1/users                  open registration, no token needed
        .route(
            "/api/v1/users",
            get(handlers::list_users).post(handlers::register_user),
        )
        // GET/PUT /api/v1/users/{id}
        // Updates are limited to the user themself or a superuser (checked in the handler).
        .route(
            "/api/v1/users/{id}",
            get(handlers::get_user).put(handlers::update_user),
        )
}
