//! Admin forms. Each handler runs the gate against a freshly reloaded
//! profile before touching a store, and redirects home when it fails.
use std::{str::FromStr, sync::Arc};

use axum::{
    Form,
    extract::{Path, State as AxumState},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use remote::models::{Key, Rank, SiteConfig};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use super::{
    pages::{chrome, render_admin},
    visitor,
};
use crate::{
    error::{AppError, AppResult},
    gate,
    state::State,
    views::Notice,
};

#[derive(Debug, Deserialize)]
pub struct ConfigForm {
    server_name: String,
    server_ip: String,
    server_port: String,
    #[serde(default)]
    discord_url: String,
    #[serde(default)]
    logo_url: String,
}

impl ConfigForm {
    fn into_config(self, current: SiteConfig) -> AppResult<SiteConfig> {
        Ok(SiteConfig {
            id: current.id,
            server_name: self.server_name.trim().to_string(),
            server_ip: self.server_ip.trim().to_string(),
            server_port: parse_field("Server port", &self.server_port)?,
            discord_url: self.discord_url.trim().to_string(),
            logo_url: optional(&self.logo_url),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RankForm {
    name: String,
    price: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    display_order: String,
    #[serde(default)]
    description: String,
    /// One feature per line.
    #[serde(default)]
    features: String,
    /// Checkbox; absent when unchecked.
    #[serde(default)]
    is_free: Option<String>,
    #[serde(default)]
    how_to_get: String,
}

impl RankForm {
    fn into_rank(self, id: Uuid) -> AppResult<Rank> {
        Ok(Rank {
            id,
            name: self.name.trim().to_string(),
            description: optional(&self.description),
            price: parse_field("Price", &self.price)?,
            features: self
                .features
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            color: self.color.trim().to_string(),
            is_free: self.is_free.is_some(),
            how_to_get: optional(&self.how_to_get),
            display_order: parse_order(&self.display_order)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct KeyForm {
    name: String,
    price: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    display_order: String,
    #[serde(default)]
    description: String,
}

impl KeyForm {
    fn into_key(self, id: Uuid) -> AppResult<Key> {
        Ok(Key {
            id,
            name: self.name.trim().to_string(),
            description: optional(&self.description),
            price: parse_field::<Decimal>("Price", &self.price)?,
            color: self.color.trim().to_string(),
            display_order: parse_order(&self.display_order)?,
        })
    }
}

/// Runs the gate for the visitor and hands back the token to write with.
pub async fn admit(state: &State, headers: &HeaderMap) -> AppResult<Option<String>> {
    let session = visitor(state, headers).map(|(_, session)| session);

    gate::authorize(session.as_deref()).await
}

pub async fn save_config(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Form(form): Form<ConfigForm>,
) -> AppResult<Response> {
    let Ok(token) = admit(&state, &headers).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let outcome = match form.into_config(state.site.current()) {
        Ok(config) => state.site.save(config, token.as_deref()).await.map(drop),
        Err(e) => Err(e),
    };

    finish(&state, &headers, outcome, Notice::ConfigSaved).await
}

pub async fn create_rank(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let Ok(token) = admit(&state, &headers).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let outcome = state.ranks.create(token.as_deref()).await.map(drop);

    finish(&state, &headers, outcome, Notice::RankAdded).await
}

pub async fn update_rank(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Form(form): Form<RankForm>,
) -> AppResult<Response> {
    let Ok(token) = admit(&state, &headers).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let outcome = match form.into_rank(id) {
        Ok(rank) => state.ranks.update(rank, token.as_deref()).await.map(drop),
        Err(e) => Err(e),
    };

    finish(&state, &headers, outcome, Notice::RankSaved).await
}

pub async fn delete_rank(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let Ok(token) = admit(&state, &headers).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let outcome = state.ranks.delete(id, token.as_deref()).await;

    finish(&state, &headers, outcome, Notice::RankDeleted).await
}

pub async fn create_key(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let Ok(token) = admit(&state, &headers).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let outcome = state.keys.create(token.as_deref()).await.map(drop);

    finish(&state, &headers, outcome, Notice::KeyAdded).await
}

pub async fn update_key(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Form(form): Form<KeyForm>,
) -> AppResult<Response> {
    let Ok(token) = admit(&state, &headers).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let outcome = match form.into_key(id) {
        Ok(key) => state.keys.update(key, token.as_deref()).await.map(drop),
        Err(e) => Err(e),
    };

    finish(&state, &headers, outcome, Notice::KeySaved).await
}

pub async fn delete_key(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let Ok(token) = admit(&state, &headers).await else {
        return Ok(Redirect::to("/").into_response());
    };

    let outcome = state.keys.delete(id, token.as_deref()).await;

    finish(&state, &headers, outcome, Notice::KeyDeleted).await
}

/// Redirects with `notice` on success, otherwise re-renders the console
/// with the error and its status.
async fn finish(
    state: &State,
    headers: &HeaderMap,
    outcome: AppResult<()>,
    notice: Notice,
) -> AppResult<Response> {
    match outcome {
        Ok(()) => Ok(Redirect::to(&format!("/admin?notice={}", notice.code())).into_response()),
        Err(e) => {
            warn!("Admin action failed: {e}");
            let status = e.status();
            let chrome = chrome(state, headers, "/admin").with_error(e.to_string());

            Ok((status, render_admin(state, &chrome).await?).into_response())
        }
    }
}

fn parse_field<T: FromStr>(label: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::MalformedPayload(format!("{label} must be a number")))
}

/// Blank means first.
fn parse_order(value: &str) -> AppResult<i32> {
    if value.trim().is_empty() {
        return Ok(0);
    }

    parse_field("Display order", value)
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();

    (!value.is_empty()).then(|| value.to_string())
}
