use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use microblog_server::background_jobs::{
    default_registry, InMemoryJobQueue, TaskManager, TaskRunner, TaskServices,
};
use microblog_server::config::{AppConfig, CliConfig, FileConfig, SearchEngine};
use microblog_server::mail::create_mailer;
use microblog_server::search::{create_search_index, IndexSyncObserver};
use microblog_server::server::{self, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use microblog_server::store::{CommitObserver, Database};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding microblog.db and, for FTS5, search.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 5000)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Full-text search backend.
    #[clap(long, value_enum)]
    pub search_engine: Option<SearchEngine>,

    /// Base URL of the Elasticsearch cluster.
    #[clap(long)]
    pub elasticsearch_url: Option<String>,

    /// Directory where outgoing mail is dropped for a relay. Mail is only
    /// logged when unset.
    #[clap(long, value_parser = parse_path)]
    pub mail_outbox_dir: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            search_engine: self.search_engine,
            elasticsearch_url: self.elasticsearch_url.clone(),
            mail_outbox_dir: self.mail_outbox_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    // The Elasticsearch client blocks, keep it off the async threads
    let search_settings = config.search.clone();
    let db_dir = config.db_dir.clone();
    let search_index =
        tokio::task::spawn_blocking(move || create_search_index(&search_settings, &db_dir))
            .await??;

    let db_path = config.microblog_db_path();
    info!("Opening microblog database at {:?}...", db_path);
    let observers: Vec<Arc<dyn CommitObserver>> =
        vec![Arc::new(IndexSyncObserver::new(search_index.clone()))];
    let db = Database::open(&db_path, observers)?;

    let mailer = create_mailer(&config.mail)?;

    let jobs = &config.background_jobs;
    let queue = Arc::new(InMemoryJobQueue::new(Duration::from_secs(
        jobs.result_ttl_secs,
    )));
    let task_manager = TaskManager::new(db.clone(), queue.clone(), Arc::new(default_registry()));
    let services = TaskServices {
        db: db.clone(),
        mailer: mailer.clone(),
        mail_sender: config.mail.sender.clone(),
        export_step_delay: Duration::from_millis(jobs.export_step_delay_ms),
    };

    let shutdown_token = CancellationToken::new();
    let workers = TaskRunner::new(
        queue,
        task_manager.clone(),
        services,
        jobs.workers,
        shutdown_token.clone(),
    )
    .start()
    .await;

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let state = ServerState::new(
        ServerConfig::from(&config),
        db,
        search_index,
        task_manager,
        mailer,
    );
    info!("Ready to serve at port {}!", config.port);
    let result = run_server(state, shutdown_token.clone()).await;

    shutdown_token.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            error!("Task worker ended abnormally: {}", e);
        }
    }
    result
}
