use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use remote::probe::{STATUS_BASE, VERIFY_BASE};
use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub backend_url: Option<String>,
    pub backend_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub status_url: String,
    pub verify_url: String,
    pub login_domain: String,
    pub status_interval: Duration,
    pub bootstrap_admin: bool,
    pub session_idle: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            backend_url: var("SUPABASE_URL").ok(),
            backend_key: read_secret("SUPABASE_ANON_KEY"),
            webhook_secret: read_secret("WEBHOOK_SECRET"),
            status_url: try_load("STATUS_URL", STATUS_BASE)?,
            verify_url: try_load("VERIFY_URL", VERIFY_BASE)?,
            login_domain: try_load("LOGIN_DOMAIN", "confessionmc.fun")?,
            status_interval: Duration::from_secs(try_load("STATUS_INTERVAL_SECS", "60")?),
            bootstrap_admin: try_load("BOOTSTRAP_ADMIN", "true")?,
            session_idle: Duration::from_secs(try_load("SESSION_IDLE_SECS", "86400")?),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            backend_url: None,
            backend_key: None,
            webhook_secret: None,
            status_url: STATUS_BASE.to_string(),
            verify_url: VERIFY_BASE.to_string(),
            login_domain: "confessionmc.fun".to_string(),
            status_interval: Duration::from_secs(60),
            bootstrap_admin: true,
            session_idle: Duration::from_secs(86400),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value: {e}"))
        .context("Environment misconfigured!")
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Failed to read {secret_name} from file: {e}");
        })
        .or_else(|_| var(secret_name))
        .ok()
}
