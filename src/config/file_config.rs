use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub posts_per_page: Option<u32>,
    pub admins: Option<Vec<String>>,

    // Feature configs
    pub search: Option<SearchConfig>,
    pub background_jobs: Option<BackgroundJobsConfig>,
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Search engine to use: "noop", "fts5", "elasticsearch"
    pub engine: Option<String>,
    pub elasticsearch_url: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub workers: Option<usize>,
    pub result_ttl_secs: Option<u64>,
    pub export_step_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MailConfig {
    pub sender: Option<String>,
    pub outbox_dir: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    pub use_tls: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Addresses that receive server error reports.
    pub admin_emails: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
