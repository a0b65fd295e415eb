//! Grant Insight daemon - AI-assisted grant consultation service.
//!
//! Serves the consultation and search endpoints over HTTP, backed by an
//! in-memory grant store and an optional external AI provider.

use anyhow::Result;
use clap::Parser;
use gi_common::content::InMemoryContentStore;
use gi_common::Settings;
use insightd::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "insightd", version, about = "Grant Insight consultation daemon")]
struct Args {
    /// Path to the settings file.
    #[arg(long, default_value = "insightd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let settings = Settings::load(&args.config)?;
    info!("Grant Insight daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let store = match settings.grants_file.as_deref() {
        Some(path) => {
            let store = InMemoryContentStore::from_file(path.as_ref())?;
            info!("Loaded {} grants from {}", store.len(), path);
            store
        }
        None => {
            let default_path = PathBuf::from("data/grants.json");
            if default_path.exists() {
                let store = InMemoryContentStore::from_file(&default_path)?;
                info!("Loaded {} grants from {}", store.len(), default_path.display());
                store
            } else {
                warn!("No grant seed file found, search will return no results");
                InMemoryContentStore::default()
            }
        }
    };

    let state = server::AppState::new(&settings, Arc::new(store))?;
    server::run(&settings, state).await
}
