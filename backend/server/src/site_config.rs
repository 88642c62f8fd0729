//! # Site Config
//!
//! Singleton row read by every page. A built-in default is served until the
//! first fetch lands, so the landing page never waits on it.
//!
//! Pushed changes replace the whole snapshot. No merging; the last write wins.
use std::sync::Arc;

use remote::{
    Backend, Tables,
    models::{ChangeKind, RowChange, SiteConfig, Table},
};
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

pub struct SiteConfigStore {
    backend: Arc<dyn Backend>,
    snapshot: watch::Sender<SiteConfig>,
}

impl SiteConfigStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            snapshot: watch::Sender::new(SiteConfig::default()),
        }
    }

    pub fn current(&self) -> SiteConfig {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SiteConfig> {
        self.snapshot.subscribe()
    }

    /// Keeps the previous snapshot when the fetch fails or finds no row.
    pub async fn refresh(&self) -> SiteConfig {
        let fetched: Result<Option<SiteConfig>, _> = self.backend.fetch_first(None).await;

        match fetched {
            Ok(Some(config)) => {
                self.snapshot.send_replace(config);
            }
            Ok(None) => debug!("No site_config row, keeping current snapshot"),
            Err(e) => warn!("Site config fetch failed: {e}"),
        }

        self.current()
    }

    /// Writes first, then replaces the snapshot with what the backend stored.
    ///
    /// A snapshot without an id (the default, after a failed fetch) updates
    /// whatever row the backend already holds. A row is only inserted when
    /// there is none.
    pub async fn save(&self, config: SiteConfig, token: Option<&str>) -> AppResult<SiteConfig> {
        validate(&config)?;

        let saved: SiteConfig = match config.id {
            Some(_) => self.backend.save(&config, token).await?,
            None => {
                let stored: Option<SiteConfig> = self.backend.fetch_first(token).await?;

                match stored.and_then(|row| row.id) {
                    Some(id) => {
                        debug!("Saving over stored site_config {id}");
                        let config = SiteConfig {
                            id: Some(id),
                            ..config
                        };
                        self.backend.save(&config, token).await?
                    }
                    None => self.backend.create(&config, token).await?,
                }
            }
        };

        info!("Site config saved: {}", saved.server_name);
        self.snapshot.send_replace(saved.clone());

        Ok(saved)
    }

    pub fn apply(&self, change: &RowChange) {
        if change.table != Table::SiteConfig || change.kind == ChangeKind::Delete {
            return;
        }

        let Some(record) = &change.record else {
            return;
        };

        match serde_json::from_value::<SiteConfig>(record.clone()) {
            Ok(config) => {
                debug!("Site config pushed: {}", config.server_name);
                self.snapshot.send_replace(config);
            }
            Err(e) => warn!("Ignoring malformed site_config push: {e}"),
        }
    }

    /// Follows pushed changes until `cancel` fires.
    pub fn follow(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        let mut changes = self.backend.changes().subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) => store.apply(&change),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Missed {skipped} row changes, refetching site config");
                            store.refresh().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            debug!("Site config subscription closed");
        })
    }
}

fn validate(config: &SiteConfig) -> AppResult<()> {
    if config.server_name.trim().is_empty() {
        return Err(AppError::Validation("Server name is required".to_string()));
    }
    if config.server_ip.trim().is_empty() {
        return Err(AppError::Validation("Server IP is required".to_string()));
    }
    if config.server_port == 0 {
        return Err(AppError::Validation("Server port must be 1-65535".to_string()));
    }

    Ok(())
}
