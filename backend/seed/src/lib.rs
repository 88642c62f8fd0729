//! # Seeding
//!
//! Fills a fresh backend project from a JSON file shaped like
//! `backend/server/seed.json`:
//!
//! - `site_config`: written over the existing row if there is one, inserted otherwise
//! - `ranks`, `keys`: always inserted; `--replace` deletes the current catalog first
//!
//! Run it with the project's service key so row-level policies allow the writes.
use std::{fs::read_to_string, path::Path};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use remote::{
    Backend, Tables,
    models::{Key, Rank, SeedFile, SiteConfig, Table},
};
use tracing::info;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub site_config: bool,
    pub ranks: usize,
    pub keys: usize,
    pub removed: usize,
}

pub fn read_seed(path: &Path) -> Result<SeedFile> {
    let text = read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&text).with_context(|| format!("Malformed seed file {}", path.display()))
}

pub fn progress(seed: &SeedFile) -> Result<ProgressBar> {
    let steps = usize::from(seed.site_config.is_some()) + seed.ranks.len() + seed.keys.len();

    let pb = ProgressBar::new(steps as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    Ok(pb)
}

pub async fn apply(
    backend: &dyn Backend,
    seed: &SeedFile,
    replace: bool,
    pb: &ProgressBar,
) -> Result<Summary> {
    let mut summary = Summary::default();

    if replace {
        pb.set_message("Clearing catalog");
        summary.removed = clear_catalog(backend).await?;
    }

    if let Some(config) = &seed.site_config {
        pb.set_message("Writing site_config");
        let existing: Option<SiteConfig> = backend.fetch_first(None).await?;

        let saved: SiteConfig = match existing {
            Some(current) => {
                let config = SiteConfig {
                    id: current.id,
                    ..config.clone()
                };
                backend.save(&config, None).await?
            }
            None => backend.create(config, None).await?,
        };

        info!("Site config: {} at {}", saved.server_name, saved.address());
        summary.site_config = true;
        pb.inc(1);
    }

    for draft in &seed.ranks {
        pb.set_message(format!("Rank {}", draft.name));
        let _: Rank = backend
            .create(draft, None)
            .await
            .with_context(|| format!("Failed to insert rank {}", draft.name))?;

        summary.ranks += 1;
        pb.inc(1);
    }

    for draft in &seed.keys {
        pb.set_message(format!("Key {}", draft.name));
        let _: Key = backend
            .create(draft, None)
            .await
            .with_context(|| format!("Failed to insert key {}", draft.name))?;

        summary.keys += 1;
        pb.inc(1);
    }

    pb.finish_with_message("Done");
    Ok(summary)
}

async fn clear_catalog(backend: &dyn Backend) -> Result<usize> {
    let ranks: Vec<Rank> = backend.fetch_all(None).await?;
    let keys: Vec<Key> = backend.fetch_all(None).await?;

    for rank in &ranks {
        backend.delete(Table::Ranks, rank.id, None).await?;
    }
    for key in &keys {
        backend.delete(Table::Keys, key.id, None).await?;
    }

    Ok(ranks.len() + keys.len())
}
