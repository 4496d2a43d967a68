use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints: service banner, health probe and token issuance.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Welcome banner with the version and the Swagger UI location.
        .route("/", get(handlers::root))
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(handlers::health))
        // POST /api/v1/auth/login
        // JSON credentials (username or email + password) for a bearer token.
        .route("/api/v1/auth/login", post(handlers::login))
        // POST /api/v1/auth/token
        // Same as login, form-encoded for OAuth2 password-flow clients.
        .route("/api/v1/auth/token", post(handlers::login_form))
}
