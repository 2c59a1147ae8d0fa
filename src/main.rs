//! The `relfilter` service.
//!
//! Usage: `relfilter [settings-file]`, where the settings file defaults to
//! `relfilter.toml` in the working directory and may be absent.

use std::sync::Arc;

use relfilter::config::{Settings, DEFAULT_FILE};
use relfilter::persist::Store;
use relfilter::server::{self, AppState};
use relfilter::{sample, TableFilter};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let file = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_FILE.to_owned());
    let settings = Settings::load(&file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut store = Store::new(settings.store.mode())?;
    store.set_busy_timeout(settings.store.busy_timeout())?;
    store.create_tables()?;
    if settings.store.seed_sample {
        store.load_sample()?;
    }

    let tables = store.snapshot()?;
    info!(tables = tables.len(), rows = tables.iter().map(|t| t.row_count()).sum::<usize>(), "snapshot taken");
    let filter = TableFilter::new(tables, sample::relationships())?;

    let state = Arc::new(AppState::new(filter, store, settings.server.request_timeout()));
    server::serve(state, &settings.server.bind).await?;
    Ok(())
}
