//! Clonechat CLI entry point

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use clonechat::cli::types::{Cli, Commands};
use clonechat::{ClonechatBuilder, Config, Error};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    // Version needs neither credentials nor the store
    if matches!(cli.command, Commands::Version) {
        println!("clonechat {}", clonechat::VERSION);
        println!("commit: {}", clonechat::GIT_COMMIT);
        println!("built:  {}", clonechat::BUILD_TIME);
        return;
    }

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let app = ClonechatBuilder::new().config(config).build().await?;

    // Ctrl-C flips the token; engines commit their checkpoint and exit
    // at the next suspension point.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing current operation");
            signal_token.cancel();
        }
    });

    clonechat::cli::run(cli, app, cancel).await
}

/// Stdout logging plus an append-only file layer at `data/app.log`.
fn init_tracing(config: &Config) -> Result<(), Error> {
    std::fs::create_dir_all(&config.data_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    Ok(())
}
