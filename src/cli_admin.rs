use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use microblog_server::config::{AppConfig, CliConfig, FileConfig, SearchEngine};
use microblog_server::search::{create_search_index, reindex_all};
use microblog_server::store::{Database, User, TOKEN_LIFETIME_SECS};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "cli-admin", about = "Administration of a microblog database")]
struct CliArgs {
    /// Directory holding microblog.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to the server's TOML config file.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Search backend, only used by `reindex`.
    #[clap(long, value_enum)]
    pub search_engine: Option<SearchEngine>,

    #[clap(long)]
    pub elasticsearch_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a user with the given username and email.
    CreateUser { username: String, email: String },

    /// Shows all users.
    ListUsers,

    /// Issues a new API token for a user. Any previous token stops working.
    IssueToken { username: String },

    /// Revokes the API token of a user.
    RevokeToken { username: String },

    /// Rebuilds the search index from the database.
    Reindex,

    /// Shows the path of the database.
    Where,
}

fn find_user(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(username)?
        .with_context(|| format!("No user named '{}'", username))
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        search_engine: cli_args.search_engine,
        elasticsearch_url: cli_args.elasticsearch_url.clone(),
        ..Default::default()
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;
    let db_path = config.microblog_db_path();

    if let Command::Reindex = cli_args.command {
        let index = create_search_index(&config.search, &config.db_dir)?;
        if index.describe() == "noop" {
            bail!("No search engine configured, nothing to reindex");
        }
        // No observers: the index is written directly
        let db = Database::open(&db_path, vec![])?;
        let indexed = reindex_all(&db, index.as_ref())?;
        println!("Indexed {} documents into {}", indexed, index.describe());
        return Ok(());
    }

    let db = Database::open(&db_path, vec![])?;
    match cli_args.command {
        Command::CreateUser { username, email } => {
            let user = db.write(|tx| tx.insert_user(&username, &email))?;
            println!("Created user '{}' with id {}", user.username, user.id);
        }
        Command::ListUsers => {
            for user in db.all_users()? {
                println!("{:>6}  {:<24} {}", user.id, user.username, user.email);
            }
        }
        Command::IssueToken { username } => {
            let user = find_user(&db, &username)?;
            let token = db.issue_token(user.id)?;
            println!("{}", token.0);
            eprintln!(
                "Token for '{}' is valid for {} seconds",
                user.username, TOKEN_LIFETIME_SECS
            );
        }
        Command::RevokeToken { username } => {
            let user = find_user(&db, &username)?;
            db.revoke_token(user.id)?;
            println!("Revoked token of '{}'", user.username);
        }
        Command::Where => {
            println!("{}", db_path.display());
        }
        Command::Reindex => {}
    }
    Ok(())
}
