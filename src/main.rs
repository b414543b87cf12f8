use std::time::Duration;

use affiliate_relay::app::Application;
use affiliate_relay::common::{init_logging, load_config, wait_for_shutdown_signal, StartupConfig};
use affiliate_relay::shutdown::ShutdownManager;
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("affiliate-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts queued product links into affiliate links")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to config/relay.toml or relay.toml)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log format")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run a single worker cycle, print its result and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let startup = StartupConfig {
        config_path: matches.get_one::<String>("config").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
        log_format: matches.get_one::<String>("log-format").cloned(),
    };
    let once = matches.get_flag("once");

    let config = load_config(&startup)?;
    init_logging(config.logging.level, config.logging.format)?;

    info!("Starting affiliate relay");
    info!("Queue backend: {}", config.backend.base_url);
    info!("Conversion API: {}", config.internal_api.url);

    let shutdown_manager = ShutdownManager::new();
    let app = Application::new(config, shutdown_manager.clone())?;

    if once {
        let result = app.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let app_handle = tokio::spawn(app.run());

    wait_for_shutdown_signal().await;
    info!("Shutdown requested, stopping worker...");
    shutdown_manager.shutdown();

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("Worker stopped cleanly"),
        Ok(Ok(Err(e))) => error!("Worker stopped with error: {e}"),
        Ok(Err(e)) => error!("Worker task failed: {e}"),
        Err(_) => warn!("Worker did not stop within 30s, exiting anyway"),
    }

    info!("Affiliate relay exited");
    Ok(())
}
