use std::sync::Arc;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{
    handler::*,
    middleware::{mw_require_auth, AUTH_HEADER},
    AppState,
};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let app = Router::new()
        .route("/todos", get(get_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .route("/users/me", get(get_me))
        .route("/users/me/token", delete(logout))
        .route_layer(from_fn_with_state(app_state.clone(), mw_require_auth))
        .route("/users", post(signup))
        .route("/users/login", post(login))
        .route("/", get(health_checker_handler))
        .with_state(app_state);
    app
}

// Browsers only see `x-auth` on responses when it is explicitly exposed
pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
    let auth_header = HeaderName::from_static(AUTH_HEADER);

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([auth_header.clone(), ACCEPT, CONTENT_TYPE])
        .expose_headers([auth_header])
}
