use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use netpulse_core::AppConfig;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::{AppMode, Application};
use shutdown::{wait_for_signal, ShutdownManager};

/// 区域化网络可达性检测调度系统
#[derive(Debug, Parser)]
#[command(name = "netpulse", version, about)]
struct Cli {
    /// 配置文件路径，未指定时尝试读取 config/netpulse.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 运行模式
    #[arg(short, long, value_enum, default_value_t = AppMode::All)]
    mode: AppMode,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or(netpulse_core::DEFAULT_CONFIG_PATH)
        )
    })?;

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    let log_format = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.observability.log_format);
    init_logging(log_level, log_format)?;

    info!("启动 NetPulse，模式: {:?}", cli.mode);

    if config.observability.metrics_enabled {
        init_metrics(&config.observability.metrics_bind)?;
    }

    let app = Arc::new(Application::new(config, cli.mode).await?);
    let shutdown_manager = ShutdownManager::new();

    let mut app_handle = {
        let app = Arc::clone(&app);
        let shutdown = shutdown_manager.clone();
        tokio::spawn(async move { app.run(shutdown).await })
    };

    tokio::select! {
        _ = wait_for_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown();
        }
        result = &mut app_handle => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.context("应用运行失败")),
                Err(e) => Err(anyhow::anyhow!("应用任务异常结束: {e}")),
            };
        }
    }

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用关闭时发生错误: {e:#}"),
        Ok(Err(e)) => error!("应用任务异常结束: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("NetPulse 已退出");
    Ok(())
}

/// 初始化日志系统，`RUST_LOG` 优先于命令行和配置
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        _ => return Err(anyhow::anyhow!("不支持的日志格式: {log_format}")),
    }

    Ok(())
}

/// 在 `bind` 上暴露 Prometheus 指标
fn init_metrics(bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind}"))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("安装Prometheus指标导出器失败")?;
    info!("Prometheus 指标导出在 http://{}/metrics", addr);
    Ok(())
}
