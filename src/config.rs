use std::path::PathBuf;

use anyhow::Result;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// WAL appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
}

impl StorageConfig {
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("studio.wal")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub admin_password: String,
    pub public_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("server.bind", "0.0.0.0")?
        .set_default("server.port", 5433)?
        .set_default("server.max_connections", 256)?
        .set_default("storage.data_dir", "./data")?
        .set_default("storage.compact_threshold", 1000)?
        .set_default("auth.admin_password", DEFAULT_ADMIN_PASSWORD)?
        .set_default("auth.public_password", "yogabook")?
        .set_default("logging.level", "info")?)
}

impl Settings {
    /// Defaults, then `yogabook.toml` if present, then `YOGABOOK_*` variables
    /// (`YOGABOOK_SERVER__PORT=6543`). Later sources win.
    pub fn load() -> Result<Self> {
        Ok(defaults()?
            .add_source(File::with_name("yogabook").required(false))
            .add_source(
                Environment::with_prefix("YOGABOOK")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?)
    }
}

/// Read `.env` into the environment, then load [`Settings`].
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
