use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access-control core.
pub mod authz;
pub mod permissions;
pub mod registry;
pub mod roles;

// Identity and accounts.
pub mod auth;
pub mod security;
pub mod users;

// Plumbing.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod response;

// Module for routing segregation (Public, Authenticated, Access).
pub mod routes;
use routes::{access, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler and
/// `ToSchema` model. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::health, handlers::login, handlers::login_form,
        handlers::register_user, handlers::get_me, handlers::list_users, handlers::get_user,
        handlers::update_user, handlers::list_modules, handlers::list_roles,
        handlers::create_role, handlers::get_role, handlers::update_role, handlers::delete_role,
        handlers::get_role_permissions, handlers::update_role_permissions,
        handlers::assign_user_role
    ),
    components(
        schemas(
            models::Role, models::Module, models::PermissionGrant, models::Action,
            models::CreateRoleRequest, models::UpdateRoleRequest, models::GrantInput,
            models::PermissionBulkUpdate, models::UserRoleUpdate, models::LoginRequest,
            models::CreateUserRequest, models::UpdateUserRequest, models::TokenResponse,
            models::UserProfile, models::ModulePermission, models::RolePermissionMatrix,
            response::ErrorDetail, response::PaginationMeta,
        )
    ),
    tags(
        (name = "rbac-portal", description = "Users, roles and module permissions API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Unified State Pattern: the single, cheaply clonable container of shared
/// services and configuration handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route group, the docs and the observability layers, and binds
/// the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/api/v1/access", access::access_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// cors_layer
///
/// `*` (the default) allows any origin; otherwise only the configured origins.
/// Origins that are not valid header values are dropped with a warning.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
