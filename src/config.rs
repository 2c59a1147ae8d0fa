//! Runtime settings for the `relfilter` service.
//!
//! Values are layered: built-in defaults, then an optional `relfilter.toml`
//! (or whichever file is named), then `RELFILTER__SECTION__KEY` environment
//! variables, e.g. `RELFILTER__SERVER__BIND=0.0.0.0:8080`.

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;

pub const DEFAULT_FILE: &str = "relfilter";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store: StoreSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Database file. The store is kept in memory when unset.
    #[serde(default)]
    pub path: Option<String>,
    pub busy_timeout_ms: u64,
    /// Load the sample dataset on startup.
    pub seed_sample: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directives, overridden by `RUST_LOG`.
    pub filter: String,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("store.busy_timeout_ms", 5000i64)?
        .set_default("store.seed_sample", true)?
        .set_default("server.bind", "127.0.0.1:8080")?
        .set_default("server.request_timeout_ms", 10_000i64)?
        .set_default("log.filter", "relfilter=info")?)
}

impl Settings {
    /// Defaults, then the named file if it exists, then the environment.
    pub fn load(file: &str) -> Result<Self> {
        let settings = defaults()?
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("RELFILTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Defaults overlaid with TOML text only.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = defaults()?
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

impl StoreSettings {
    pub fn mode(&self) -> PersistenceMode {
        match &self.path {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_what_the_file_leaves_out() {
        let settings = Settings::from_toml("[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();
        assert_eq!(settings.server.bind, "0.0.0.0:9000");
        assert_eq!(settings.server.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.store.mode(), PersistenceMode::InMemory);
        assert!(settings.store.seed_sample);
        assert_eq!(settings.log.filter, "relfilter=info");
    }

    #[test]
    fn a_path_selects_file_persistence() {
        let settings = Settings::from_toml("[store]\npath = \"filter.db\"\nseed_sample = false\n").unwrap();
        assert_eq!(settings.store.mode(), PersistenceMode::File("filter.db".into()));
        assert!(!settings.store.seed_sample);
        assert_eq!(settings.store.busy_timeout(), Duration::from_millis(5000));
    }
}
