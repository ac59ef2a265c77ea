//! # 浏览器服务模块
//!
//! 负责浏览器进程的生命周期：定位并启动 Chrome（或连接到已运行的实例），
//! 等待调试端点就绪，选择页面目标并构建 [`Driver`](crate::session::Driver)。
//!
//! ## 主要功能
//! - **端口分配**: 向操作系统申请空闲端口作为远程调试端口
//! - **可执行文件定位**: 显式路径、`CHROME_PATH`、常见安装位置、`PATH` 搜索
//! - **生命周期管理**: `start` / `stop`，以及无论闭包成败都会停止浏览器的 `ChromeService::run`
//!
//! ## 模块结构
//! - `port`: 端口分配
//! - `launcher`: 可执行文件定位与启动命令
//! - `chrome`: `ChromeService` 与 `ServiceOptions`
//!
//! ## 使用示例
//! ```rust,no_run
//! use oxide_driver::service::{ChromeService, ServiceOptions};
//!
//! # async fn example() -> oxide_driver::Result<()> {
//! let title = ChromeService::run(ServiceOptions::default(), |driver| async move {
//!     driver.navigate("https://example.com").await?;
//!     driver.title().await
//! })
//! .await?;
//! println!("{}", title);
//! # Ok(())
//! # }
//! ```

pub mod chrome;
pub mod launcher;
pub mod port;

pub use chrome::{ChromeService, ServiceOptions};
pub use launcher::{build_command, locate_chrome, LaunchArgs};
pub use port::find_free_port;
