use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use quadriga_bot::config::{Config, default_config_path};
use quadriga_bot::fetcher::PriceFetcher;
use quadriga_bot::logging;
use quadriga_bot::monitor::{Monitor, ReloadPolicy};
use quadriga_bot::notifier::SmtpMailer;
use quadriga_bot::ticker::{QuadrigaClient, TickerSource};

#[derive(Parser)]
#[command(name = "quadriga-bot", about = "QuadrigaCX price alert bot")]
struct Args {
    /// Config file (defaults to ~/.quadriga-bot)
    #[arg(long)]
    config: Option<PathBuf>,

    /// When to read the config file
    #[arg(long, value_enum, default_value_t = ReloadPolicy::EveryTick)]
    reload: ReloadPolicy,

    /// Log file, written in addition to stderr
    #[arg(long, default_value = logging::LOG_FILE)]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    if let Err(e) = logging::init(&args.log_file) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    // Fatal errors are reported once, through the log.
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting QuadrigaCX price checker...");

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path().context("cannot locate home directory for config")?,
    };
    let config = Config::load(&config_path).context("failed to load config")?;
    info!("Loaded config from {}", config_path.display());

    let fetcher = PriceFetcher::new(Box::new(|| -> Result<Arc<dyn TickerSource>> {
        Ok(Arc::new(QuadrigaClient::new()?))
    }))?;
    let mailer = Arc::new(SmtpMailer::gmail().with_timeout(config.timeout));

    let monitor = Monitor::start(config, config_path, args.reload, fetcher, mailer).await?;
    monitor.run().await;

    info!("Stopped");
    Ok(())
}
