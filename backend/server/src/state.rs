use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use remote::{
    Backend, MemoryBackend, SupabaseClient,
    models::{Key, Rank, SeedFile, Table},
    probe::{IdentityVerifier, McSrvStat, MojangVerifier, StatusSource},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    catalog::CatalogStore,
    config::Config,
    session::{SessionPolicy, Sessions},
    site_config::SiteConfigStore,
    status::{ServerStatusPoller, StatusBoard},
    views::Views,
};

const DEMO_SEED: &str = include_str!("../seed.json");

pub struct State {
    pub config: Config,
    pub backend: Arc<dyn Backend>,
    pub site: Arc<SiteConfigStore>,
    pub ranks: CatalogStore<Rank>,
    pub keys: CatalogStore<Key>,
    pub sessions: Arc<Sessions>,
    pub status: StatusBoard,
    pub views: Views,
    pub shutdown: CancellationToken,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let backend: Arc<dyn Backend> = match (&config.backend_url, &config.backend_key) {
            (Some(url), Some(key)) => {
                info!("Using hosted backend at {url}");
                Arc::new(SupabaseClient::new(url, key))
            }
            (Some(_), None) => bail!("SUPABASE_ANON_KEY is required when SUPABASE_URL is set"),
            (None, _) => {
                warn!("SUPABASE_URL not set, using in-memory backend with demo data");
                Arc::new(demo_backend()?)
            }
        };

        let status: Arc<dyn StatusSource> = Arc::new(McSrvStat::new(&config.status_url)?);
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(MojangVerifier::new(&config.verify_url));

        Self::with_parts(config, backend, status, verifier).await
    }

    /// Builds the state around already-constructed collaborators and loads
    /// the first snapshot of config and catalog.
    pub async fn with_parts(
        config: Config,
        backend: Arc<dyn Backend>,
        status: Arc<dyn StatusSource>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Arc<Self>> {
        let views = Views::new().context("Failed to compile templates")?;

        let site = Arc::new(SiteConfigStore::new(backend.clone()));
        let ranks = CatalogStore::new(backend.clone());
        let keys = CatalogStore::new(backend.clone());

        let (config_row, rank_list, key_list) =
            tokio::join!(site.refresh(), ranks.refresh(), keys.refresh());
        info!(
            "Loaded {} with {} ranks and {} keys",
            config_row.server_name,
            rank_list.len(),
            key_list.len()
        );

        let shutdown = CancellationToken::new();
        site.follow(shutdown.child_token());

        let sessions = Arc::new(Sessions::new(
            backend.clone(),
            verifier,
            SessionPolicy {
                login_domain: config.login_domain.clone(),
                bootstrap_admin: config.bootstrap_admin,
            },
            config.session_idle,
        ));
        sessions.expire_idle(sweep_interval(config.session_idle), shutdown.child_token());
        let status = StatusBoard::new(ServerStatusPoller::new(status, config.status_interval));

        Ok(Arc::new(Self {
            config,
            backend,
            site,
            ranks,
            keys,
            sessions,
            status,
            views,
            shutdown,
        }))
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
        self.status.stop();
    }
}

/// A few sweeps per idle timeout, never more than one a second.
fn sweep_interval(idle: Duration) -> Duration {
    (idle / 4).max(Duration::from_secs(1))
}

fn demo_backend() -> Result<MemoryBackend> {
    let seed: SeedFile = serde_json::from_str(DEMO_SEED).context("Demo seed is malformed")?;
    let backend = MemoryBackend::new();

    if let Some(config) = seed.site_config {
        backend.seed(Table::SiteConfig, [serde_json::to_value(config)?]);
    }
    backend.seed(
        Table::Ranks,
        seed.ranks
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?,
    );
    backend.seed(
        Table::Keys,
        seed.keys
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?,
    );

    Ok(backend)
}
