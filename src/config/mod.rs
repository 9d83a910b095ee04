mod file_config;

pub use file_config::{BackgroundJobsConfig, FileConfig, MailConfig, SearchConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_POSTS_PER_PAGE: u32 = 15;
pub const DEFAULT_SEARCH_TIMEOUT_SEC: u64 = 10;
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_RESULT_TTL_SECS: u64 = 500;
pub const DEFAULT_MAIL_SENDER: &str = "no-reply@microblog.local";
pub const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SearchEngine {
    #[default]
    #[value(name = "noop")]
    NoOp,
    Fts5,
    Elasticsearch,
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub search_engine: Option<SearchEngine>,
    pub elasticsearch_url: Option<String>,
    pub mail_outbox_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub posts_per_page: u32,
    /// Usernames allowed on admin routes. Their mail addresses live in
    /// `mail.admin_emails`.
    pub admins: Vec<String>,

    // Feature configs (with defaults)
    pub search: SearchSettings,
    pub background_jobs: BackgroundJobsSettings,
    pub mail: MailSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub engine: SearchEngine,
    pub elasticsearch_url: Option<String>,
    pub timeout_sec: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            engine: SearchEngine::NoOp,
            elasticsearch_url: None,
            timeout_sec: DEFAULT_SEARCH_TIMEOUT_SEC,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundJobsSettings {
    pub workers: usize,
    pub result_ttl_secs: u64,
    /// Pause after each exported post, to keep progress observable.
    pub export_step_delay_ms: u64,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            result_ttl_secs: DEFAULT_RESULT_TTL_SECS,
            export_step_delay_ms: 0,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    /// Upgrade the connection with STARTTLS.
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailSettings {
    pub sender: String,
    /// When unset, and no SMTP relay is configured, mail is only logged.
    pub outbox_dir: Option<PathBuf>,
    pub smtp: Option<SmtpSettings>,
    /// Recipients of server error reports.
    pub admin_emails: Vec<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender: DEFAULT_MAIL_SENDER.to_string(),
            outbox_dir: None,
            smtp: None,
            admin_emails: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let posts_per_page = file.posts_per_page.unwrap_or(DEFAULT_POSTS_PER_PAGE);
        if posts_per_page == 0 {
            bail!("posts_per_page must be at least 1");
        }
        let admins = file.admins.unwrap_or_default();

        // Search settings - an explicit engine wins, otherwise a URL implies Elasticsearch
        let search_file = file.search.unwrap_or_default();
        let elasticsearch_url = search_file
            .elasticsearch_url
            .or_else(|| cli.elasticsearch_url.clone());
        let file_engine = match search_file.engine {
            Some(s) => match parse_search_engine(&s) {
                Some(engine) => Some(engine),
                None => bail!("Unknown search engine: {}", s),
            },
            None => None,
        };
        let engine = file_engine.or(cli.search_engine).unwrap_or_else(|| {
            if elasticsearch_url.is_some() {
                SearchEngine::Elasticsearch
            } else {
                SearchEngine::NoOp
            }
        });
        if engine == SearchEngine::Elasticsearch && elasticsearch_url.is_none() {
            bail!("The elasticsearch engine requires elasticsearch_url");
        }
        let search = SearchSettings {
            engine,
            elasticsearch_url,
            timeout_sec: search_file
                .timeout_sec
                .unwrap_or(DEFAULT_SEARCH_TIMEOUT_SEC),
        };

        let jobs_file = file.background_jobs.unwrap_or_default();
        let background_jobs = BackgroundJobsSettings {
            workers: jobs_file.workers.unwrap_or(DEFAULT_WORKERS),
            result_ttl_secs: jobs_file.result_ttl_secs.unwrap_or(DEFAULT_RESULT_TTL_SECS),
            export_step_delay_ms: jobs_file.export_step_delay_ms.unwrap_or(0),
        };
        if background_jobs.workers == 0 {
            bail!("background_jobs.workers must be at least 1");
        }

        let mail_file = file.mail.unwrap_or_default();
        let smtp = match mail_file.smtp_server {
            Some(server) => Some(SmtpSettings {
                server,
                port: mail_file.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
                use_tls: mail_file.use_tls.unwrap_or(false),
                username: mail_file.username,
                password: mail_file.password,
            }),
            None if mail_file.smtp_port.is_some() || mail_file.username.is_some() => {
                bail!("mail.smtp_server is required by the other SMTP settings")
            }
            None => None,
        };
        let mail = MailSettings {
            sender: mail_file
                .sender
                .unwrap_or_else(|| DEFAULT_MAIL_SENDER.to_string()),
            outbox_dir: mail_file
                .outbox_dir
                .map(PathBuf::from)
                .or_else(|| cli.mail_outbox_dir.clone()),
            smtp,
            admin_emails: mail_file.admin_emails.unwrap_or_default(),
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            frontend_dir_path,
            posts_per_page,
            admins,
            search,
            background_jobs,
            mail,
        })
    }

    pub fn microblog_db_path(&self) -> PathBuf {
        self.db_dir.join("microblog.db")
    }

    pub fn search_db_path(&self) -> PathBuf {
        self.db_dir.join("search.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

fn parse_search_engine(s: &str) -> Option<SearchEngine> {
    SearchEngine::from_str(s, true).ok()
}
