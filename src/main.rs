//! vigil — service health reporting agent.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at configured level
//!   4. Build every service's reporters
//!   5. Check and report until Ctrl-C, then destroy all reporters

use tokio_util::sync::CancellationToken;
use tracing::info;

use vigil::{agent, config, error::AppError, logger, reporter};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::parse_level(&config.log_level)?;
    logger::init(&config.log_level)?;

    info!(
        log_level = %config.log_level,
        services = config.services.len(),
        check_interval_ms = config.check_interval.as_millis() as u64,
        reporter_types = ?reporter::supported_types(),
        "config loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let shutdown = CancellationToken::new();

        // Ctrl-C handler — cancels the token so all services stop and tear down.
        let ctrlc_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received — initiating shutdown");
                ctrlc_token.cancel();
            }
        });

        agent::run(&config, shutdown).await
    })?;

    info!("all reporters destroyed — exiting");
    Ok(())
}
