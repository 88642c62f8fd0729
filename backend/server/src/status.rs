//! # Server Status
//!
//! Polls the status endpoint for one `host:port` on a fixed interval.
//!
//! - Starts in [`StatusView::Checking`] until the first answer, success or not
//! - Any failure reads as offline with 0/0 players; it is never returned as an error
//! - Dropping the [`StatusWatch`] stops the poll task
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use remote::{models::ServerStatus, probe::StatusSource};
use serde::Serialize;
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusView {
    Checking,
    Ready {
        status: ServerStatus,
        checked_at: DateTime<Utc>,
    },
}

impl StatusView {
    pub fn status(&self) -> Option<&ServerStatus> {
        match self {
            StatusView::Checking => None,
            StatusView::Ready { status, .. } => Some(status),
        }
    }
}

pub async fn poll(source: &dyn StatusSource, host: &str, port: u16) -> ServerStatus {
    match source.query(host, port).await {
        Ok(status) => status,
        Err(e) => {
            warn!("Status poll for {host}:{port} failed: {e}");
            ServerStatus::offline()
        }
    }
}

pub struct ServerStatusPoller {
    source: Arc<dyn StatusSource>,
    every: Duration,
}

impl ServerStatusPoller {
    pub fn new(source: Arc<dyn StatusSource>, every: Duration) -> Self {
        Self { source, every }
    }

    /// Must be called inside a tokio runtime.
    pub fn observe(&self, host: &str, port: u16) -> StatusWatch {
        let (sender, receiver) = watch::channel(StatusView::Checking);
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let source = self.source.clone();
        let every = self.every;
        let target = host.to_string();

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let status = tokio::select! {
                    _ = token.cancelled() => break,
                    status = poll(source.as_ref(), &target, port) => status,
                };

                sender.send_replace(StatusView::Ready {
                    status,
                    checked_at: Utc::now(),
                });
            }

            debug!("Stopped polling {target}:{port}");
        });

        StatusWatch {
            host: host.to_string(),
            port,
            receiver,
            _guard: cancel.drop_guard(),
        }
    }
}

pub struct StatusWatch {
    host: String,
    port: u16,
    receiver: watch::Receiver<StatusView>,
    _guard: DropGuard,
}

impl StatusWatch {
    pub fn current(&self) -> StatusView {
        self.receiver.borrow().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<StatusView> {
        self.receiver.clone()
    }

    pub fn targets(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }
}

/// The one status widget on the landing page. Re-targets when the configured
/// address changes; the old poll stops with its watch.
pub struct StatusBoard {
    poller: ServerStatusPoller,
    watch: Mutex<Option<StatusWatch>>,
}

impl StatusBoard {
    pub fn new(poller: ServerStatusPoller) -> Self {
        Self {
            poller,
            watch: Mutex::new(None),
        }
    }

    pub fn status_for(&self, host: &str, port: u16) -> StatusView {
        let mut watch = self.watch.lock().unwrap_or_else(PoisonError::into_inner);

        match watch.as_ref() {
            Some(current) if current.targets(host, port) => current.current(),
            _ => {
                info!("Watching server status of {host}:{port}");
                let fresh = self.poller.observe(host, port);
                let view = fresh.current();
                *watch = Some(fresh);

                view
            }
        }
    }

    pub fn stop(&self) {
        self.watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use remote::{RemoteError, models::Players};

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[derive(Default)]
    struct Scripted {
        calls: AtomicUsize,
        online: bool,
    }

    impl Scripted {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for Scripted {
        async fn query(&self, _host: &str, _port: u16) -> Result<ServerStatus, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.online {
                Ok(ServerStatus {
                    online: true,
                    players: Players { online: 7, max: 50 },
                    motd: None,
                })
            } else {
                Err(RemoteError::Unavailable)
            }
        }
    }

    struct Hung;

    #[async_trait]
    impl StatusSource for Hung {
        async fn query(&self, _host: &str, _port: u16) -> Result<ServerStatus, RemoteError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reads_offline() {
        let source = Arc::new(Scripted::default());
        let poller = ServerStatusPoller::new(source.clone(), MINUTE);

        let watch = poller.observe("play.confessionmc.fun", 25594);
        let mut receiver = watch.receiver();
        receiver.changed().await.unwrap();

        let view = watch.current();
        let status = view.status().unwrap();
        assert!(!status.online);
        assert_eq!(status.players, Players { online: 0, max: 0 });
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checking_until_first_answer() {
        let poller = ServerStatusPoller::new(Arc::new(Hung), MINUTE);

        let watch = poller.observe("play.confessionmc.fun", 25594);
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(watch.current(), StatusView::Checking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_interval() {
        let source = Arc::new(Scripted {
            online: true,
            ..Scripted::default()
        });
        let poller = ServerStatusPoller::new(source.clone(), MINUTE);
        let watch = poller.observe("play.confessionmc.fun", 25594);
        let mut receiver = watch.receiver();

        receiver.changed().await.unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(watch.current().status().unwrap().players.online, 7);

        receiver.changed().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let source = Arc::new(Scripted::default());
        let poller = ServerStatusPoller::new(source.clone(), MINUTE);
        let watch = poller.observe("play.confessionmc.fun", 25594);
        let mut receiver = watch.receiver();
        receiver.changed().await.unwrap();

        drop(watch);
        tokio::time::sleep(MINUTE * 5).await;

        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_board_retargets() {
        let source = Arc::new(Scripted::default());
        let board = StatusBoard::new(ServerStatusPoller::new(source.clone(), MINUTE));

        assert_eq!(board.status_for("a.example.net", 25565), StatusView::Checking);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(board.status_for("a.example.net", 25565).status().is_some());

        assert_eq!(board.status_for("b.example.net", 25565), StatusView::Checking);
        board.stop();
    }
}
