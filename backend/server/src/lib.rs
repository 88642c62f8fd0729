//! Documentation of the ConfessionMC community site: landing page, live server status, shop and admin console.
//!
//!
//!
//! # General Infrastructure
//! - One axum process renders every page server-side
//! - Accounts, site config and catalog live in the hosted backend (Supabase)
//! - Without `SUPABASE_URL` the process runs on an in-memory backend seeded from `seed.json`
//! - Server status comes from mcsrvstat.us, premium checks from the Mojang profile API
//!
//!
//!
//! # Sessions
//!
//! - The backend only knows email-like handles, so every username becomes `lowercase(username)@LOGIN_DOMAIN`
//! - Each visitor that signs in gets a [`session::SessionManager`] behind an opaque `sid` cookie
//! - No cookie is issued to anonymous visitors
//! - Sessions unused for `SESSION_IDLE_SECS` are signed out and forgotten; the cookie carries the same `Max-Age`
//! - Backend access tokens are renewed with their refresh token before they expire
//! - Admin forms re-read the profile before every write; revoking `is_admin` takes effect on the next click
//! - Row-level policies in the backend are the real authorization boundary, the gate in front of the forms is a convenience
//!
//!
//!
//! # Live Updates
//!
//! ## Site config
//! The hosted backend is set up with a database webhook on `site_config` that posts to `/hooks/site-config`.
//! Each delivery replaces the whole cached config. Set `WEBHOOK_SECRET` and send it as `X-Webhook-Secret`.
//!
//! ## Server status
//! Polled every `STATUS_INTERVAL_SECS` (60) for the configured `ip:port`, starting with the first page view.
//! Changing the address in the admin console moves the poll to the new address.
//!
//!
//!
//! # Environment
//!
//! | Variable | Default |
//! |---|---|
//! | `RUST_PORT` | `8080` |
//! | `SUPABASE_URL` | unset, in-memory backend |
//! | `SUPABASE_ANON_KEY` | secret, required with `SUPABASE_URL` |
//! | `WEBHOOK_SECRET` | secret, optional |
//! | `STATUS_URL` | `https://api.mcsrvstat.us/3` |
//! | `VERIFY_URL` | `https://api.mojang.com/users/profiles/minecraft` |
//! | `LOGIN_DOMAIN` | `confessionmc.fun` |
//! | `STATUS_INTERVAL_SECS` | `60` |
//! | `BOOTSTRAP_ADMIN` | `true` |
//! | `SESSION_IDLE_SECS` | `86400` |
//!
//! Secrets are read from `/run/secrets/{NAME}` first, then the environment.
//!
//!
//!
//! # Notes
//!
//! ## Bootstrap admin
//! Registering the account `aliteaxolot` with its original password grants admin, same as the old site.
//! Every use is logged at `warn`. Set `BOOTSTRAP_ADMIN=false` once a real admin exists.
//!
//! ## Catalog order
//! New ranks and keys get `display_order = count + 1`. Two admins adding at once can tie; ties keep backend order.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally on the in-memory backend.
//! ```sh
//! RUST_LOG=info cargo run -p confession
//! ```
//!
//! Seed a fresh hosted project.
//! ```sh
//! cargo run -p seed -- backend/server/seed.json --url https://PROJECT.supabase.co --key SERVICE_KEY
//! ```
use std::future::pending;
use std::sync::Arc;

use anyhow::{Context, Result};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod purchase;
pub mod routes;
pub mod session;
pub mod site_config;
pub mod state;
pub mod status;
pub mod views;

use config::Config;
use state::State;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    serve(state, shutdown_signal()).await
}

/// Serves until `shutdown` resolves, then stops background work.
pub async fn serve(
    state: Arc<State>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!("Starting server...");

    let app = routes::router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    state.stop();
    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
