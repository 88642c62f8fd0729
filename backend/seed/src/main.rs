use std::path::PathBuf;

use clap::Parser;
use remote::SupabaseClient;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON seed file.
    file: PathBuf,

    #[arg(long, env = "SUPABASE_URL")]
    url: String,

    /// Service key; the anon key is usually blocked by row-level policies.
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    key: String,

    /// Delete existing ranks and keys first.
    #[arg(long)]
    replace: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let seed = seed::read_seed(&args.file)?;
    let backend = SupabaseClient::new(&args.url, &args.key);

    let pb = seed::progress(&seed)?;
    let summary = seed::apply(&backend, &seed, args.replace, &pb).await?;

    println!("Site Config: {}", if summary.site_config { "written" } else { "skipped" });
    println!("Removed: {}", summary.removed);
    println!("Ranks: {}", summary.ranks);
    println!("Keys: {}", summary.keys);

    Ok(())
}
