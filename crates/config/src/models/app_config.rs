use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    backend_worker::{BackendConfig, WorkerConfig},
    internal_api::InternalApiConfig,
    logging::LogConfig,
    runtime::{HeaderCaptureConfig, KeepAliveConfig, SessionConfig, StatusServerConfig},
};
use crate::validation::ConfigValidator;

const DEFAULT_PATHS: [&str; 2] = ["config/relay.toml", "relay.toml"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub worker: WorkerConfig,
    pub internal_api: InternalApiConfig,
    pub header_capture: HeaderCaptureConfig,
    pub keepalive: KeepAliveConfig,
    pub session: SessionConfig,
    pub status_server: StatusServerConfig,
    pub logging: LogConfig,
}

impl AppConfig {
    /// Defaults, then the TOML file, then `RELAY__SECTION__KEY` environment overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_PATHS.iter().find(|p| Path::new(p).exists()) {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.backend.validate()?;
        self.worker.validate()?;
        self.internal_api.validate()?;
        self.header_capture.validate()?;
        self.keepalive.validate()?;
        self.session.validate()?;
        self.status_server.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
