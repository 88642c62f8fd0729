use std::sync::Arc;

use axum::{
    Form,
    extract::State as AxumState,
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use super::{
    pages::{chrome, render_landing, render_shop},
    visitor,
};
use crate::{
    error::{AppError, AppResult, AuthError},
    session::{SessionManager, expired_cookie, session_cookie},
    state::State,
    views::Notice,
};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    /// Page the form was submitted from.
    #[serde(default)]
    next: String,
}

pub async fn sign_in(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Form(form): Form<Credentials>,
) -> AppResult<Response> {
    let manager = state.sessions.manager();

    match manager.sign_in(&form.username, &form.password).await {
        Ok(_) => Ok(start_session(&state, &headers, manager, &form.next, Notice::SignedIn).await),
        Err(e) => rejected(&state, &headers, &form.next, e).await,
    }
}

pub async fn sign_up(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    Form(form): Form<Credentials>,
) -> AppResult<Response> {
    let manager = state.sessions.manager();

    match manager.sign_up(&form.username, &form.password).await {
        Ok(_) => Ok(start_session(&state, &headers, manager, &form.next, Notice::Registered).await),
        Err(e) => rejected(&state, &headers, &form.next, e).await,
    }
}

pub async fn sign_out(AxumState(state): AxumState<Arc<State>>, headers: HeaderMap) -> Response {
    if let Some((id, session)) = visitor(&state, &headers) {
        state.sessions.close(id);
        session.sign_out().await;
        info!("Closed session {id}");
    }

    (
        [(SET_COOKIE, expired_cookie())],
        Redirect::to(&format!("/?notice={}", Notice::SignedOut.code())),
    )
        .into_response()
}

/// Only pages on this site are valid targets.
fn return_path(next: &str) -> &'static str {
    match next {
        "/shop" => "/shop",
        "/admin" => "/admin",
        _ => "/",
    }
}

async fn start_session(
    state: &State,
    headers: &HeaderMap,
    manager: Arc<SessionManager>,
    next: &str,
    notice: Notice,
) -> Response {
    if let Some((id, previous)) = visitor(state, headers) {
        state.sessions.close(id);
        previous.sign_out().await;
    }

    let id = state.sessions.register(manager);
    let target = format!("{}?notice={}", return_path(next), notice.code());

    let cookie = session_cookie(id, state.sessions.idle_timeout());

    ([(SET_COOKIE, cookie)], Redirect::to(&target)).into_response()
}

/// Re-renders the page the form came from with the message shown.
async fn rejected(
    state: &State,
    headers: &HeaderMap,
    next: &str,
    error: AuthError,
) -> AppResult<Response> {
    let message = error.to_string();
    let status = AppError::from(error).status();

    let page = match return_path(next) {
        "/shop" => {
            let chrome = chrome(state, headers, "/shop").with_error(message);
            render_shop(state, &chrome, None).await?
        }
        _ => {
            let chrome = chrome(state, headers, "/").with_error(message);
            render_landing(state, &chrome)?
        }
    };

    Ok((status, page).into_response())
}
