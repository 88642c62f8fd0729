use std::sync::Arc;

use axum::{
    extract::{Query, State as AxumState},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use super::{admin::admit, visitor};
use crate::{
    error::AppResult,
    purchase,
    state::State,
    views::{Chrome, Notice},
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    notice: Option<String>,
    purchase: Option<String>,
}

impl PageQuery {
    fn notice(&self) -> Option<Notice> {
        self.notice.as_deref().and_then(Notice::from_code)
    }

    fn purchase(&self) -> Option<Uuid> {
        self.purchase.as_deref()?.parse().ok()
    }
}

/// Layout data for `path` as the visitor behind `headers` sees it.
pub fn chrome(state: &State, headers: &HeaderMap, path: &'static str) -> Chrome {
    let profile = visitor(state, headers).and_then(|(_, session)| session.current_profile());

    Chrome::new(path, state.site.current(), profile)
}

pub async fn landing(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let chrome = chrome(&state, &headers, "/").with_notice(query.notice());

    render_landing(&state, &chrome)
}

pub async fn shop(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let chrome = chrome(&state, &headers, "/shop").with_notice(query.notice());

    render_shop(&state, &chrome, query.purchase()).await
}

pub async fn admin(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    if admit(&state, &headers).await.is_err() {
        return Ok(Redirect::to("/").into_response());
    }

    let chrome = chrome(&state, &headers, "/admin").with_notice(query.notice());

    Ok(render_admin(&state, &chrome).await?.into_response())
}

pub fn render_landing(state: &State, chrome: &Chrome) -> AppResult<Html<String>> {
    let status = state
        .status
        .status_for(&chrome.config.server_ip, chrome.config.server_port);

    state.views.landing(chrome, &status)
}

pub async fn render_shop(
    state: &State,
    chrome: &Chrome,
    purchase: Option<Uuid>,
) -> AppResult<Html<String>> {
    let (ranks, keys) = tokio::join!(state.ranks.refresh(), state.keys.refresh());
    let dialog = purchase.and_then(|id| purchase::open(id, &ranks, &keys, &chrome.config));

    state.views.shop(chrome, &ranks, &keys, dialog.as_ref())
}

pub async fn render_admin(state: &State, chrome: &Chrome) -> AppResult<Html<String>> {
    let (ranks, keys) = tokio::join!(state.ranks.refresh(), state.keys.refresh());

    state.views.admin(chrome, &ranks, &keys)
}
