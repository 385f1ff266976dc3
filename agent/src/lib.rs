//! Supervisao agent process shell.
//!
//! Loads configuration, opens the queue database and runs the queue listener
//! until Ctrl-C. Business logic lives in the `crates/` directory.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use supervisao_browser::{ChromiumLauncher, LaunchOptions};
use supervisao_core::{AppConfig, BrowserConfig, DEFAULT_CONFIG_FILE};
use supervisao_db::Database;
use supervisao_filing::{
    CredentialResolver, FieldMapping, ProcessorSettings, QueueListener, ReportProcessor,
    SqliteCredentialStore, SqliteQueueSource, SqliteReportStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Extra time for a CDP request beyond the navigation wait itself.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "supervisao-agent",
    about = "Files pending supervision reports into the government portal",
    version
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "SUPERVISAO_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Load and validate the configuration, print a summary and exit
    #[arg(long)]
    pub check_config: bool,
}

/// Initialize tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,supervisao=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Load configuration with environment overrides and validate it.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load_with_env(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// One-screen summary printed by `--check-config`.
#[must_use]
pub fn config_summary(config: &AppConfig) -> String {
    let form = if config.portal.form_url.trim().is_empty() {
        "(same page as login)"
    } else {
        config.portal.form_url.as_str()
    };

    format!(
        "login url:        {}\nform url:         {}\nmapped fields:    {}\nconcurrent jobs:  {}\nnavigation wait:  {}s\ndatabase:         {}",
        config.portal.login_url,
        form,
        config.portal.fields.len(),
        config.worker.max_concurrent_reports,
        config.browser.navigation_timeout_secs,
        config.database.path.display(),
    )
}

/// Browser launch options for the configured browser section.
#[must_use]
pub fn launch_options(config: &BrowserConfig) -> LaunchOptions {
    LaunchOptions {
        headless: config.headless,
        window_width: config.window_width,
        window_height: config.window_height,
        executable: config.executable.clone(),
        request_timeout: Duration::from_secs(config.navigation_timeout_secs)
            + REQUEST_TIMEOUT_MARGIN,
    }
}

/// Run the agent until Ctrl-C, or just validate configuration.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting supervisao-agent v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config)?;
    if cli.check_config {
        println!("{}", config_summary(&config));
        info!("configuration is valid");
        return Ok(());
    }

    let db = Database::new(&config.database.path)
        .await
        .context("failed to open report database")?;
    db.run_migrations()
        .await
        .context("failed to migrate report database")?;
    let pool = db.pool().clone();

    let mapping = Arc::new(FieldMapping::from_config(&config.portal)?);
    let resolver = CredentialResolver::new(Arc::new(SqliteCredentialStore::new(pool.clone())));
    let processor = Arc::new(ReportProcessor::new(
        resolver,
        Arc::new(ChromiumLauncher::new(launch_options(&config.browser))),
        Arc::clone(&mapping),
        Arc::new(SqliteReportStore::new(pool.clone())),
        ProcessorSettings {
            navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
            status_write_attempts: config.worker.status_write_attempts,
            ..ProcessorSettings::default()
        },
    ));
    let source = Arc::new(SqliteQueueSource::new(
        pool,
        Duration::from_millis(config.worker.poll_interval_ms),
    ));
    let listener = QueueListener::new(source, processor, config.worker.max_concurrent_reports);

    info!(
        fields = mapping.len(),
        workers = config.worker.max_concurrent_reports,
        "filing agent ready"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested, finishing in-flight reports");
                shutdown.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl-C: {}", e),
        }
    });

    listener.run(cancel).await?;

    db.close().await;
    info!("supervisao-agent stopped");
    Ok(())
}
