use std::sync::Arc;

use axum::{Json, extract::State as AxumState, http::HeaderMap};
use remote::models::{Key, Profile, Rank, SiteConfig};

use super::visitor;
use crate::{state::State, status::StatusView};

pub async fn config(AxumState(state): AxumState<Arc<State>>) -> Json<SiteConfig> {
    Json(state.site.current())
}

pub async fn ranks(AxumState(state): AxumState<Arc<State>>) -> Json<Vec<Rank>> {
    Json(state.ranks.refresh().await)
}

pub async fn keys(AxumState(state): AxumState<Arc<State>>) -> Json<Vec<Key>> {
    Json(state.keys.refresh().await)
}

pub async fn status(AxumState(state): AxumState<Arc<State>>) -> Json<StatusView> {
    let config = state.site.current();

    Json(state.status.status_for(&config.server_ip, config.server_port))
}

/// `null` for anonymous visitors and accounts whose profile never synced.
pub async fn profile(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
) -> Json<Option<Profile>> {
    Json(visitor(&state, &headers).and_then(|(_, session)| session.current_profile()))
}
