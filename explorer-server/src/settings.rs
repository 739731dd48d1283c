//! 配置管理
//!
//! 内置默认值 < 配置文件 < `EXPLORER__*` 环境变量 < 命令行参数

use config::{Config, ConfigError, Environment, File};
use explorer_analytics::MatcherConfig;
use explorer_core::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "EXPLORER";

/// 服务完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExplorerConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 数据配置
    pub data: DataConfig,
    /// 匹配器配置
    pub matcher: MatcherConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// 数据配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// 病例 CSV 文件路径
    pub cases_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cases_path: "./data/cases.csv".to_string(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤表达式
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ExplorerConfig {
    /// 加载配置
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&ExplorerConfig::default()).map_err(config_error)?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        let config: ExplorerConfig = settings.try_deserialize().map_err(config_error)?;

        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host must not be empty"));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port must be greater than zero"));
        }
        if self.data.cases_path.trim().is_empty() {
            return Err(invalid("data.cases_path must not be empty"));
        }
        self.matcher
            .validate()
            .map_err(|e| invalid(format!("matcher: {}", e)))?;
        EnvFilter::try_new(&self.logging.level)
            .map_err(|e| invalid(format!("logging.level {}: {}", self.logging.level, e)))?;
        Ok(())
    }

    /// 监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let address = format!("{}:{}", self.server.host, self.server.port);
        address
            .to_socket_addrs()
            .map_err(|e| invalid(format!("listen address {}: {}", address, e)))?
            .next()
            .ok_or_else(|| invalid(format!("no address resolved for {}", address)))
    }
}

fn config_error(err: ConfigError) -> ExplorerError {
    ExplorerError::Config(err.to_string())
}

fn invalid(message: impl Into<String>) -> ExplorerError {
    ExplorerError::Config(message.into())
}
