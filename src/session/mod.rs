//! # 会话层
//!
//! 面向自动化脚本的 API：文档级的 [`Driver`] 与元素级的 [`Node`]。
//! 两者都通过执行桥接层访问页面，`Node` 以自身引用作为 `this` 执行函数。
//!
//! ## 主要功能
//! - **导航与内容注入**: `navigate` 等待新文档加载完成，`set_content` 替换主框架文档
//! - **元素查询**: `query_selector` 无匹配时返回 `NotFound`，`query_selector_all` 返回空列表
//! - **元素交互**: 点击、输入、聚焦、滚动、属性读取
//! - **脚本执行**: 同步与异步两种方式，结果为 DOM 节点时自动包装为 `Node`
//! - **引用释放**: `Node` 的最后一个克隆释放时归还远程对象
//!
//! ## 模块结构
//! - `driver`: 文档级句柄
//! - `node`: 元素代理
//!
//! ## 使用示例
//! ```rust,no_run
//! use oxide_driver::session::Driver;
//!
//! # async fn example(driver: Driver) -> Result<(), Box<dyn std::error::Error>> {
//! driver.set_content(r#"<div id="outer" class="outer"><div id="inner" class="inner"></div></div>"#).await?;
//!
//! let outer = driver.query_selector("div#outer").await?;
//! let inner = outer.query_selector("div#inner").await?;
//! assert_eq!(inner.get_attribute("class").await?.as_deref(), Some("inner"));
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod node;


pub use driver::Driver;
pub use node::{BoundingBox, Evaluated, Node};
