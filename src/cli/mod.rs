use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::Route;
use crate::config::{ConfigLoader, CONFIG_ENV};
use crate::remote::RemoteBlobClient;
use crate::timefmt::SystemClock;

pub mod commands;

use self::commands::PostArgs;

const LOG_FILE: &str = "statusboard.log";

#[derive(Parser, Debug)]
#[command(
    name = "statusboard",
    version,
    about = "Terminal status board backed by one remote JSON document"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over STATUSBOARD_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the remote document URL for this run
    #[arg(long)]
    pub url: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the read-only status feed (default)
    Feed,
    /// Open the admin editor
    Admin,
    /// Print the current statuses, newest first
    List,
    /// Prepend a status and upload the document
    Post(PostArgs),
}

impl Commands {
    fn is_interactive(&self) -> bool {
        matches!(self, Commands::Feed | Commands::Admin)
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let command = cli.command.unwrap_or(Commands::Feed);
    let log_target = if command.is_interactive() {
        LogTarget::File(loader.paths().log_dir.join(LOG_FILE))
    } else {
        LogTarget::Stderr
    };
    init_tracing(&cli.log_level, &log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    if let Some(url) = cli.url {
        config.remote.document_url = url;
        config
            .post_load()
            .context("validating --url override")?;
    }
    tracing::debug!(url = %config.remote.document_url, "configuration loaded");

    let client = RemoteBlobClient::from_options(&config.remote)?;
    let config = Arc::new(config);
    let clock = Arc::new(SystemClock);
    match command {
        Commands::Feed => commands::run_tui(config, client, clock, Route::Feed),
        Commands::Admin => commands::run_tui(config, client, clock, Route::Admin),
        Commands::List => commands::list_statuses(&config, &client, clock.as_ref()),
        Commands::Post(args) => commands::post_status(&client, clock.as_ref(), args),
    }
}

enum LogTarget {
    Stderr,
    File(PathBuf),
}

fn init_tracing(level: &str, target: &LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(path) => {
                let file = open_log_file(path)?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .init()
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn bare_invocation_opens_the_feed() {
        let cli = Cli::try_parse_from(["statusboard"]).expect("parses");
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn post_takes_optional_text_and_global_flags() {
        let cli = Cli::try_parse_from([
            "statusboard",
            "--url",
            "http://localhost:9000/b/statuses.json",
            "post",
            "Cake is served",
        ])
        .expect("parses");
        assert_eq!(cli.url.as_deref(), Some("http://localhost:9000/b/statuses.json"));
        assert_matches!(cli.command, Some(Commands::Post(args)) if args.text.as_deref() == Some("Cake is served"));

        let cli = Cli::try_parse_from(["statusboard", "post"]).expect("parses");
        assert_matches!(cli.command, Some(Commands::Post(args)) if args.text.is_none());
    }

    #[test]
    fn only_tui_commands_are_interactive() {
        assert!(Commands::Feed.is_interactive());
        assert!(Commands::Admin.is_interactive());
        assert!(!Commands::List.is_interactive());
    }
}
