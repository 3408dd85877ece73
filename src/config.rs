use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenv::dotenv();

        Ok(Self {
            port: try_load("PORT", "5000")?,
            database_url: try_load("DATABASE_URL", "sqlite://helpline.db?mode=rwc")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "16")?,
        })
    }

    pub fn address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_owned()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value {raw:?}"))
}
