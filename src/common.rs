use anyhow::{Context, Result};
use relay_config::{AppConfig, LogLevel, OutputFormat};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

/// `RUST_LOG` wins over the configured level.
pub fn init_logging(log_level: LogLevel, log_format: OutputFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        OutputFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("Failed to initialize JSON logging")?;
        }
        OutputFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize pretty logging")?;
        }
    }

    Ok(())
}

pub fn load_config(startup: &StartupConfig) -> Result<AppConfig> {
    let mut config = AppConfig::load(startup.config_path.as_deref()).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            startup.config_path.as_deref().unwrap_or("default locations")
        )
    })?;

    if let Some(level) = &startup.log_level {
        config.logging.level = level.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(format) = &startup.log_format {
        config.logging.format = format.parse().map_err(anyhow::Error::msg)?;
    }

    Ok(config)
}

pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::process::exit(1);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = load_config(&StartupConfig {
            config_path: Some(path.to_string_lossy().into_owned()),
            log_level: Some("debug".to_string()),
            log_format: Some("json".to_string()),
        })
        .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "").unwrap();

        let result = load_config(&StartupConfig {
            config_path: Some(path.to_string_lossy().into_owned()),
            log_level: Some("loud".to_string()),
            log_format: None,
        });

        assert!(result.is_err());
    }
}
