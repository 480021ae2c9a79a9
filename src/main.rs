//! dsw-announcer - announces Dead Song Walking tracks on the club queue.
//!
//! Polls the catalog for flagged tracks, has the AI DJ read a roast for each
//! one, and slots the clip in as the next thing to play.

use clap::Parser;
use dsw_announcer::announcer::Announcer;
use dsw_announcer::config_loader::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dsw-announcer")]
#[command(version)]
#[command(about = "Announces Dead Song Walking tracks on the listening queue", long_about = None)]
struct Cli {
    /// Extra config file layered over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single poll and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Credentials usually live in .env next to the binary
    dotenvy::dotenv().ok();

    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dsw_announcer=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let announcer = match Announcer::from_settings(&settings) {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, "failed to build clients");
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.once {
        return match announcer.tick().await {
            Ok(report) => {
                info!(
                    fetched = report.fetched,
                    announced = report.announced,
                    failed = report.failed,
                    unacknowledged = report.unacknowledged,
                    "single poll complete"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "error polling catalog");
                ExitCode::FAILURE
            }
        };
    }

    info!(
        interval_secs = settings.poll_interval_secs,
        backend = announcer.backend_id(),
        script = %settings.script_provider,
        "DSW announcer initialized, polling catalog"
    );

    tokio::select! {
        _ = announcer.run() => {}
        _ = signal::ctrl_c() => info!("shutting down"),
    }
    ExitCode::SUCCESS
}
