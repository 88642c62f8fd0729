//! # Probes
//!
//! Third-party endpoints the site asks about things it does not own.
//!
//! - Server status: `GET {base}/{host}:{port}`, JSON with `online`, `players.online`, `players.max`
//! - Identity verification: `GET {base}/{username}`, 200 means the name belongs to a paid account
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::{error::RemoteError, models::ServerStatus};

pub const STATUS_BASE: &str = "https://api.mcsrvstat.us/3";
pub const VERIFY_BASE: &str = "https://api.mojang.com/users/profiles/minecraft";

const USER_AGENT: &str = concat!("confession/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn query(&self, host: &str, port: u16) -> Result<ServerStatus, RemoteError>;
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Never fails; anything but a 200 counts as `false`.
    async fn is_premium(&self, username: &str) -> bool;
}

pub struct McSrvStat {
    http: Client,
    base_url: String,
}

impl McSrvStat {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        // the status API refuses requests without a user agent
        let http = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatusSource for McSrvStat {
    async fn query(&self, host: &str, port: u16) -> Result<ServerStatus, RemoteError> {
        let url = format!("{}/{}:{}", self.base_url, host, port);

        let status = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ServerStatus>()
            .await?;

        Ok(status)
    }
}

pub struct MojangVerifier {
    http: Client,
    base_url: String,
}

impl MojangVerifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for MojangVerifier {
    async fn is_premium(&self, username: &str) -> bool {
        let url = format!("{}/{}", self.base_url, username);

        match self.http.get(&url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!("Identity lookup for {username} failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    async fn spawn_mock() -> String {
        let app = Router::new()
            .route(
                "/status/{address}",
                get(|Path(address): Path<String>| async move {
                    match address.as_str() {
                        "play.example.net:25565" => (
                            StatusCode::OK,
                            Json(json!({
                                "online": true,
                                "players": { "online": 12, "max": 100 },
                                "motd": { "clean": ["Welcome!"] }
                            })),
                        ),
                        "down.example.net:25565" => {
                            (StatusCode::OK, Json(json!({ "online": false })))
                        }
                        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
                    }
                }),
            )
            .route(
                "/profiles/{username}",
                get(|Path(username): Path<String>| async move {
                    if username == "Notch" {
                        StatusCode::OK
                    } else {
                        StatusCode::NOT_FOUND
                    }
                }),
            );

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn test_online_server() {
        let base = spawn_mock().await;
        let source = McSrvStat::new(&format!("{base}/status")).unwrap();

        let status = source.query("play.example.net", 25565).await.unwrap();

        assert!(status.online);
        assert_eq!(status.players.online, 12);
        assert_eq!(status.players.max, 100);
        assert_eq!(status.motd.unwrap().clean, vec!["Welcome!"]);
    }

    #[tokio::test]
    async fn test_offline_server() {
        let base = spawn_mock().await;
        let source = McSrvStat::new(&format!("{base}/status")).unwrap();

        let status = source.query("down.example.net", 25565).await.unwrap();

        assert_eq!(status, ServerStatus::offline());
    }

    #[tokio::test]
    async fn test_status_endpoint_error() {
        let base = spawn_mock().await;
        let source = McSrvStat::new(&format!("{base}/status")).unwrap();

        assert!(source.query("broken.example.net", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_premium_lookup() {
        let base = spawn_mock().await;
        let verifier = MojangVerifier::new(&format!("{base}/profiles"));

        assert!(verifier.is_premium("Notch").await);
        assert!(!verifier.is_premium("not_a_real_player").await);
    }

    #[tokio::test]
    async fn test_unreachable_verifier_is_not_premium() {
        let verifier = MojangVerifier::new("http://127.0.0.1:9");

        assert!(!verifier.is_premium("Notch").await);
    }
}
