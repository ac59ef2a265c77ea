//! # Chrome DevTools Protocol (CDP) 传输层
//!
//! 与浏览器目标建立 WebSocket 会话：发送命令、等待响应、订阅事件。
//! 上层（运行时桥接、会话）只依赖 [`CdpClient`] trait，不关心具体传输。
//!
//! ## 主要功能
//! - **WebSocket 连接管理**: 读写分离，连接关闭时所有等待中的命令立即失败
//! - **协议通信**: 按命令 ID 匹配响应，超时或放弃的命令不会泄漏
//! - **事件订阅**: 按方法名过滤，`"*"` 订阅全部事件
//! - **浏览器端点**: 通过 `/json/version`、`/json/list`、`/json/new` 查询和创建目标
//!
//! ## 模块结构
//! - `traits`: CDP 操作的核心 trait 定义
//! - `types`: CDP 协议相关的数据类型
//! - `connection`: WebSocket 连接实现
//! - `client`: CDP 客户端实现
//! - `browser`: 浏览器级别的操作
//! - `mock`: 用于测试的 Mock 实现
//!
//! ## 使用示例
//! ```rust,no_run
//! use oxide_driver::cdp::{CdpBrowser, CdpBrowserImpl, CdpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = CdpBrowserImpl::new("http://127.0.0.1:9222");
//! let ws_url = browser.create_target("about:blank").await?;
//! let client = browser.create_client(&ws_url).await?;
//!
//! let result = client
//!     .call_method("Runtime.evaluate", serde_json::json!({ "expression": "1 + 1" }))
//!     .await?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod browser;
pub mod mock;

#[cfg(test)]
pub mod tests;

pub use traits::{
    CdpConnection, CdpClient, CdpBrowser, CdpEvent, CdpResponse, CdpError,
    BrowserVersion, TargetInfo,
};

// Re-export implementation structs
pub use connection::{CdpTimeoutConfig, CdpWebSocketConnection};
pub use client::CdpClientImpl;
pub use browser::CdpBrowserImpl;

// Re-export mock for development/testing
pub use mock::{MockCdpBrowser, MockCdpClient, MockCdpConnection, MockReply};
