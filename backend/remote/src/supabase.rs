//! # Supabase
//!
//! Rows go through PostgREST at `/rest/v1/{table}`, accounts through GoTrue
//! at `/auth/v1`.
//!
//! ## Headers
//! - `apikey`: the project key, always
//! - `Authorization`: the user's access token when signed in, else the project key
//! - `Prefer: return=representation` on writes so the stored row comes back
//!
//! Access tokens expire (`expires_in`, an hour on hosted projects). The
//! refresh token from sign-in trades for a new pair at
//! `/auth/v1/token?grant_type=refresh_token`.
//!
//! ## Errors
//! Non-2xx bodies carry the message in one of `msg`, `message`,
//! `error_description` or `error`. It is kept verbatim so sign-in failures
//! read the same as the backend wrote them.
//!
//! Row-change pushes arrive as database webhooks on the server, which hands
//! them to [`ChangeFeed::publish`].
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::{
    backend::{Backend, Query},
    error::RemoteError,
    feed::ChangeFeed,
    models::{AuthSession, Identity, Table},
};

const ERROR_FIELDS: [&str; 4] = ["msg", "message", "error_description", "error"];

pub struct SupabaseClient {
    http: Client,
    base_url: String,
    key: String,
    feed: ChangeFeed,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    user: GoTrueUser,
}

impl TokenResponse {
    fn into_session(self, handle: &str) -> AuthSession {
        AuthSession {
            identity: Identity {
                id: self.user.id,
                email: self.user.email.unwrap_or_else(|| handle.to_string()),
            },
            access_token: Some(self.access_token),
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
        }
    }
}

/// Sign-up answers with a session, or with the bare user when confirmation is pending.
#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    user: Option<GoTrueUser>,
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            feed: ChangeFeed::new(),
        }
    }

    fn rest_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.key)
            .bearer_auth(token.unwrap_or(&self.key))
    }

    async fn first_row(response: Response, table: Table) -> Result<Value, RemoteError> {
        let rows: Vec<Value> = serde_json::from_value(read_json(response).await?)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(table.as_str().to_string()))
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn sign_in(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("token"), None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": handle, "password": password }))
            .send()
            .await?;

        let token: TokenResponse = serde_json::from_value(read_json(response).await?)?;

        Ok(token.into_session(handle))
    }

    async fn sign_up(&self, handle: &str, password: &str) -> Result<AuthSession, RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("signup"), None)
            .json(&json!({ "email": handle, "password": password }))
            .send()
            .await?;

        let body: SignUpResponse = serde_json::from_value(read_json(response).await?)?;

        let (id, email) = match body.user {
            Some(user) => (Some(user.id), user.email),
            None => (body.id, body.email),
        };
        let id = id.ok_or_else(|| RemoteError::NotFound("user".to_string()))?;

        Ok(AuthSession {
            identity: Identity {
                id,
                email: email.unwrap_or_else(|| handle.to_string()),
            },
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in,
        })
    }

    async fn sign_out(&self, token: &str) -> Result<(), RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("logout"), Some(token))
            .send()
            .await?;

        read_json(response).await.map(|_| ())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, RemoteError> {
        let response = self
            .request(Method::POST, &self.auth_url("token"), None)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let token: TokenResponse = serde_json::from_value(read_json(response).await?)?;

        Ok(token.into_session(""))
    }

    async fn select(&self, query: &Query, token: Option<&str>) -> Result<Vec<Value>, RemoteError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        if let Some((column, value)) = &query.filter {
            params.push((column.clone(), format!("eq.{value}")));
        }
        if let Some(column) = &query.order {
            params.push(("order".to_string(), format!("{column}.asc")));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let response = self
            .request(Method::GET, &self.rest_url(query.table), token)
            .query(&params)
            .send()
            .await?;

        Ok(serde_json::from_value(read_json(response).await?)?)
    }

    async fn insert(
        &self,
        table: Table,
        row: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let response = self
            .request(Method::POST, &self.rest_url(table), token)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        Self::first_row(response, table).await
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        patch: Value,
        token: Option<&str>,
    ) -> Result<Value, RemoteError> {
        let response = self
            .request(Method::PATCH, &self.rest_url(table), token)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        Self::first_row(response, table).await
    }

    async fn delete(&self, table: Table, id: Uuid, token: Option<&str>) -> Result<(), RemoteError> {
        let response = self
            .request(Method::DELETE, &self.rest_url(table), token)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;

        read_json(response).await.map(|_| ())
    }

    fn changes(&self) -> &ChangeFeed {
        &self.feed
    }
}

async fn read_json(response: Response) -> Result<Value, RemoteError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let message = error_message(&bytes, status);
        debug!("Backend answered {status}: {message}");

        return Err(RemoteError::rejected(status.as_u16(), message));
    }

    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_slice(&bytes)?)
}

fn error_message(body: &[u8], status: StatusCode) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            ERROR_FIELDS
                .iter()
                .find_map(|field| value.get(*field).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Json, Router,
        extract::{Path, RawQuery},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        backend::Tables,
        models::{Rank, SiteConfig},
    };

    const USER_ID: &str = "6f0e4d53-0c4b-4b8e-9a58-2f3c2f1d9a10";

    async fn spawn_mock() -> String {
        let app = Router::new()
            .route(
                "/auth/v1/token",
                post(|RawQuery(query): RawQuery, Json(body): Json<Value>| async move {
                    let refreshing = query.unwrap_or_default() == "grant_type=refresh_token";

                    if refreshing && body["refresh_token"] == "refresh-abc" {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "access_token": "token-def",
                                "refresh_token": "refresh-def",
                                "expires_in": 3600,
                                "user": { "id": USER_ID, "email": "steve@confessionmc.fun" }
                            })),
                        )
                    } else if refreshing {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "invalid_grant",
                                "error_description": "Invalid Refresh Token: Already Used"
                            })),
                        )
                    } else if body["password"] == "hunter22" {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "access_token": "token-abc",
                                "refresh_token": "refresh-abc",
                                "expires_in": 3600,
                                "user": { "id": USER_ID, "email": body["email"] }
                            })),
                        )
                    } else {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "invalid_grant",
                                "error_description": "Invalid login credentials"
                            })),
                        )
                    }
                }),
            )
            .route(
                "/auth/v1/signup",
                post(|| async { Json(json!({ "id": USER_ID, "email": "steve@confessionmc.fun" })) }),
            )
            .route(
                "/rest/v1/{table}",
                get(
                    |Path(table): Path<String>, RawQuery(query): RawQuery, headers: HeaderMap| async move {
                        let authorized = headers
                            .get("apikey")
                            .is_some_and(|key| key == "anon-key");
                        if !authorized {
                            return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "No API key found" })));
                        }

                        let query = query.unwrap_or_default();
                        match table.as_str() {
                            "ranks" if query.contains("order=display_order.asc") => (
                                StatusCode::OK,
                                Json(json!([{
                                    "id": "0a3c1d9e-7f7b-4c36-8b9c-5f1f6f6e1a01",
                                    "name": "Member",
                                    "price": 0,
                                    "features": [],
                                    "color": "#AAAAAA",
                                    "is_free": true,
                                    "how_to_get": "Join the server",
                                    "display_order": 1
                                }])),
                            ),
                            "site_config" => (StatusCode::OK, Json(json!([]))),
                            _ => (StatusCode::BAD_REQUEST, Json(json!({ "message": "unexpected query" }))),
                        }
                    },
                )
                .patch(|| async { Json(json!([])) }),
            );

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://127.0.0.1:{port}/")
    }

    #[tokio::test]
    async fn test_sign_in_returns_token() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let session = client.sign_in("steve@confessionmc.fun", "hunter22").await.unwrap();

        assert_eq!(session.access_token.as_deref(), Some("token-abc"));
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-abc"));
        assert_eq!(session.expires_in, Some(3600));
        assert_eq!(session.identity.email, "steve@confessionmc.fun");
    }

    #[tokio::test]
    async fn test_refresh_exchanges_token() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let session = client.refresh("refresh-abc").await.unwrap();

        assert_eq!(session.access_token.as_deref(), Some("token-def"));
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-def"));
        assert_eq!(session.identity.id.to_string(), USER_ID);
    }

    #[tokio::test]
    async fn test_used_refresh_token_rejected() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let error = client.refresh("refresh-old").await.unwrap_err();

        assert_eq!(error.to_string(), "Invalid Refresh Token: Already Used");
    }

    #[tokio::test]
    async fn test_sign_in_failure_keeps_backend_message() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let error = client
            .sign_in("steve@confessionmc.fun", "wrong")
            .await
            .unwrap_err();

        assert_eq!(error.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let session = client.sign_up("steve@confessionmc.fun", "hunter22").await.unwrap();

        assert!(session.access_token.is_none());
        assert_eq!(session.identity.id.to_string(), USER_ID);
    }

    #[tokio::test]
    async fn test_fetch_ranks_ordered() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let ranks: Vec<Rank> = client.fetch_all(None).await.unwrap();

        assert_eq!(ranks.len(), 1);
        assert!(ranks[0].is_free);
    }

    #[tokio::test]
    async fn test_missing_singleton_is_none() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let config: Option<SiteConfig> = client.fetch_first(None).await.unwrap();

        assert!(config.is_none());
    }

    #[tokio::test]
    async fn test_update_of_invisible_row_is_not_found() {
        let client = SupabaseClient::new(&spawn_mock().await, "anon-key");

        let result = client
            .update(Table::Ranks, Uuid::new_v4(), json!({ "name": "VIP" }), Some("token-abc"))
            .await;

        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected() {
        let client = SupabaseClient::new(&spawn_mock().await, "other-key");

        let result = client.select(&Query::table(Table::Ranks), None).await;

        assert!(matches!(
            result,
            Err(RemoteError::Rejected { status: 401, .. })
        ));
    }
}
