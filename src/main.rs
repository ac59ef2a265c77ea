//! # Oxide-Driver 命令行入口
//!
//! 启动（或连接到）Chrome，打开给定的 URL 并输出文档标题。
//!
//! ## 用法
//! `oxide-driver [URL]`，URL 默认为 `about:blank`
//!
//! ## 环境变量
//! - `RUST_LOG`: 日志过滤器（未设置时使用 `OXIDE_LOG_LEVEL`，默认 info）
//! - `OXIDE_CDP_ENDPOINT`: 连接到已运行浏览器的调试端点，不再启动新进程
//! - `OXIDE_CHROME_PATH`: Chrome 可执行文件路径
//! - `OXIDE_HEADLESS`: 是否无头运行（默认: true）

use anyhow::Context;
use oxide_driver::{ChromeService, Config, ServiceOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Oxide-Driver v{}", oxide_driver::VERSION);

    let url = std::env::args().nth(1).unwrap_or_else(|| "about:blank".to_string());
    let options = ServiceOptions::from(&config);

    let title = ChromeService::run(options, |driver| async move {
        driver.navigate(&url).await?;
        driver.title().await
    })
    .await
    .context("browser session failed")?;

    info!("Title: {:?}", title);
    Ok(())
}
