use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::access::AccessService;
use crate::config::PortalConfig;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{access, catalog, groups, health, users};
use crate::storage::ListStorage;

#[derive(Clone)]
pub struct AppState {
    pub access: AccessService,
    pub storage: Arc<dyn ListStorage>,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(storage: Arc<dyn ListStorage>, config: &PortalConfig, jwt: JwtConfig) -> Self {
        Self {
            access: AccessService::new(storage.clone(), config),
            storage,
            jwt: Arc::new(jwt),
        }
    }
}

pub async fn create_app(storage: Arc<dyn ListStorage>) -> Result<Router, AppError> {
    let config = PortalConfig::from_env()?;
    let jwt_config = JwtConfig::from_env()?;
    Ok(router(AppState::new(storage, &config, jwt_config)))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let group_routes = Router::new()
        .route("/", get(groups::list_groups).post(groups::create_group))
        .route(
            "/:id",
            get(groups::get_group).put(groups::update_group).delete(groups::delete_group),
        );

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/backfill-group-references", post(users::backfill_group_references))
        .route(
            "/:email",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        );

    let access_routes = Router::new()
        .route("/me", get(access::my_access))
        .route("/me/can-see", get(access::can_see))
        .route("/me/navigation", get(access::my_navigation))
        .route("/users/:email", get(access::user_access));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/catalog/resources", get(catalog::list_resources))
        .nest("/groups", group_routes)
        .nest("/users", user_routes)
        .nest("/access", access_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
