use crate::broker::BrokerSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    pub broker: BrokerConf,
    pub http: HttpConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrokerConf {
    pub host: String,
    pub port: u16,
    pub io_timeout_secs: u64,
    pub read_window_secs: u64,
    pub chunk_size: usize,
    pub client_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConf {
    pub listen: String,
}

impl Default for BrokerConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8080,
            io_timeout_secs: 10,
            read_window_secs: 5,
            chunk_size: 1024,
            client_id: "dashboard".into(),
        }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
        }
    }
}

impl BrokerConf {
    /// Un délai nul ferait échouer chaque cycle avant la moindre lecture.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("io_timeout_secs"));
        }
        if self.read_window_secs == 0 {
            return Err(ConfigError::ZeroDuration("read_window_secs"));
        }
        Ok(())
    }

    pub fn settings(&self) -> BrokerSettings {
        BrokerSettings {
            host: self.host.clone(),
            port: self.port,
            io_timeout: Duration::from_secs(self.io_timeout_secs),
            read_window: Duration::from_secs(self.read_window_secs),
            chunk_size: self.chunk_size,
            client_id: self.client_id.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("BROKER_PORT must be a port number, got {0:?}")]
    InvalidPort(String),
    #[error("broker.{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Fichier YAML optionnel puis surcharges d'environnement.
pub async fn load_config() -> Result<DashboardConfig, ConfigError> {
    let path = std::env::var("AGRODASH_CONFIG").unwrap_or_else(|_| "dashboard.yaml".into());
    let mut cfg = load_file(&path).await;
    apply_env(&mut cfg, |key| std::env::var(key).ok())?;
    cfg.broker.validate()?;
    Ok(cfg)
}

async fn load_file(path: &str) -> DashboardConfig {
    if !Path::new(path).exists() {
        tracing::info!(%path, "no config file, using defaults");
        return DashboardConfig::default();
    }
    match read_file(path).await {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(%path, error = %e, "ignoring config file");
            DashboardConfig::default()
        }
    }
}

async fn read_file(path: &str) -> Result<DashboardConfig, ConfigError> {
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(DashboardConfig::default());
    }
    Ok(serde_yaml::from_str(&txt)?)
}

fn apply_env<F>(cfg: &mut DashboardConfig, var: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = var("BROKER_HOST").filter(|h| !h.trim().is_empty()) {
        cfg.broker.host = host;
    }
    if let Some(port) = var("BROKER_PORT") {
        cfg.broker.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
    }
    if let Some(listen) = var("AGRODASH_LISTEN") {
        cfg.http.listen = listen;
    }
    Ok(())
}
