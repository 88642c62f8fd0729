use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderMap, Method, header::CONTENT_TYPE},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{session::SessionManager, state::State};

pub mod admin;
pub mod api;
pub mod auth;
pub mod hooks;
pub mod pages;

pub fn page_routes() -> Router<Arc<State>> {
    Router::new()
        .route("/", get(pages::landing))
        .route("/shop", get(pages::shop))
        .route("/admin", get(pages::admin))
}

pub fn api_routes() -> Router<Arc<State>> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/config", get(api::config))
        .route("/api/ranks", get(api::ranks))
        .route("/api/keys", get(api::keys))
        .route("/api/status", get(api::status))
        .route("/api/profile", get(api::profile))
        .layer(cors)
}

pub fn auth_routes() -> Router<Arc<State>> {
    Router::new()
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/sign-up", post(auth::sign_up))
        .route("/auth/sign-out", post(auth::sign_out))
}

pub fn admin_routes() -> Router<Arc<State>> {
    Router::new()
        .route("/admin/config", post(admin::save_config))
        .route("/admin/ranks", post(admin::create_rank))
        .route("/admin/ranks/{id}", post(admin::update_rank))
        .route("/admin/ranks/{id}/delete", post(admin::delete_rank))
        .route("/admin/keys", post(admin::create_key))
        .route("/admin/keys/{id}", post(admin::update_key))
        .route("/admin/keys/{id}/delete", post(admin::delete_key))
}

pub fn hook_routes(state: Arc<State>) -> Router<Arc<State>> {
    Router::new()
        .route("/hooks/site-config", post(hooks::site_config))
        .route_layer(middleware::from_fn_with_state(state, hooks::require_secret))
}

pub fn router(state: Arc<State>) -> Router {
    page_routes()
        .merge(api_routes())
        .merge(auth_routes())
        .merge(admin_routes())
        .merge(hook_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn visitor(state: &State, headers: &HeaderMap) -> Option<(Uuid, Arc<SessionManager>)> {
    state.sessions.find(headers)
}
