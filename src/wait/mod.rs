//! # 等待模块
//!
//! 基于轮询的条件等待：反复执行谓词，直到产生结果或超过截止时间。
//!
//! ## 主要功能
//! - **通用轮询**: `Wait::until` 接受任意异步谓词，每次尝试受剩余时间约束
//! - **错误容忍**: 谓词返回的错误被记录并继续轮询，超时错误携带最后一次错误
//! - **预置条件**: `ExpectedConditions` 提供元素出现、可见、属性、标题、URL、脚本真值等条件
//!
//! ## 模块结构
//! - `poller`: 轮询器 `Wait`
//! - `conditions`: `Condition` trait 与预置条件
//!
//! ## 使用示例
//! ```rust,no_run
//! use oxide_driver::session::Driver;
//! use oxide_driver::wait::{ExpectedConditions, Wait};
//! use std::time::Duration;
//!
//! # async fn example(driver: Driver) -> Result<(), Box<dyn std::error::Error>> {
//! let wait = Wait::new(Duration::from_secs(5)).with_interval(Duration::from_millis(50));
//! let button = wait
//!     .for_condition(&driver, ExpectedConditions::element_visible("button#submit"))
//!     .await?;
//! button.click().await?;
//! # Ok(())
//! # }
//! ```

pub mod conditions;
pub mod poller;

#[cfg(test)]
mod tests;

pub use conditions::{
    AttributeIs, Condition, ElementLocated, ElementVisible, ElementsLocated, ExpectedConditions, ScriptTruthy,
    TitleIs, UrlContains,
};
pub use poller::Wait;
