//! 手术结局浏览服务主程序

mod loader;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use explorer_analytics::CaseRepository;
use explorer_web::WebServer;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::settings::ExplorerConfig;

/// 服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "explorer-server")]
#[command(about = "手术结局相似病例匹配与维度浏览服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 病例 CSV 文件路径
    #[arg(short, long)]
    data: Option<String>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// 命令行参数覆盖配置文件
    fn apply(&self, config: &mut ExplorerConfig) {
        if let Some(data) = &self.data {
            config.data.cases_path = data.clone();
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ExplorerConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    info!("Starting surgical outcomes explorer...");
    info!("  Case file: {}", config.data.cases_path);
    info!("  Listen: {}:{}", config.server.host, config.server.port);
    info!("  Tolerance tiers: {}", config.matcher.tiers.len());

    let rows = loader::load_raw_rows(Path::new(&config.data.cases_path))?;
    let repository = CaseRepository::from_raw_rows(&rows, config.matcher.clone())
        .context("Failed to build case repository")?;

    let addr = config.socket_addr()?;
    let server = WebServer::new(addr, repository);

    if let Err(e) = server.run().await {
        error!("Server failed: {}", e);
        return Err(e);
    }

    Ok(())
}
