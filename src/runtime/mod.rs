//! # 远程执行桥接层
//!
//! 把宿主侧的函数和参数转换为 `Runtime.callFunctionOn` 调用，在页面的 JavaScript
//! 上下文中执行，并把结果还原为宿主侧的值。
//!
//! ## 主要功能
//! - **值编解码**: 原始值、`null` / `undefined`、日期、远程对象引用的双向转换
//! - **执行桥接**: 同步与异步（显式 `resolve` / `reject` 回调）两种执行方式
//! - **超时控制**: 单次调用超时优先，否则使用驱动的脚本超时；超时后尽力取消页面内的等待
//! - **上下文代**: 文档被替换后，旧的远程引用立即失效
//!
//! ## 模块结构
//! - `codec`: 远程值编解码
//! - `bridge`: 执行桥接与超时
//! - `context`: 执行上下文代追踪
//! - `scripts`: 页面内执行的 JavaScript 函数

pub mod bridge;
pub mod codec;
pub mod context;
pub mod scripts;


pub use bridge::{
    EvaluationRequest, ExecutionBridge, ExecutionReceiver, FunctionSource, Timeouts, OBJECT_GROUP,
};
pub use codec::{
    decode, encode, Argument, EncodedArgument, ObjectRef, RemoteObjectId, RemoteValue, RetainedRef,
};
pub use context::ContextTracker;
