//! Settings of the `moneta` binary.
//!
//! Layered as: defaults, then the TOML file (`config/moneta.toml` or
//! `--config`), then `MONETA__*` environment variables
//! (e.g. `MONETA__SERVER__PORT=8080`).

use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/moneta.toml";

#[derive(Debug, Parser)]
#[command(name = "moneta", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the log level.
    #[arg(long)]
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("moneta.db".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Rates {
    pub refresh_timeout_secs: u64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            refresh_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Budgets {
    pub sweep_interval_secs: u64,
    pub sweep_on_start: bool,
    pub store_timeout_secs: u64,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 86_400,
            sweep_on_start: true,
            store_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub server: Server,
    pub rates: Rates,
    pub budgets: Budgets,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();
        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        let mut settings: Settings = Config::builder()
            .add_source(File::with_name(config_path).required(args.config.is_some()))
            .add_source(Environment::with_prefix("MONETA").separator("__"))
            .build()?
            .try_deserialize()?;

        if let Some(level) = args.level {
            settings.app.level = level;
        }
        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

impl Rates {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

impl Budgets {
    /// The interval must be positive; zero falls back to one day.
    pub fn sweep_interval(&self) -> Duration {
        match self.sweep_interval_secs {
            0 => Duration::from_secs(86_400),
            secs => Duration::from_secs(secs),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}
