//! JavaScript 脚本常量
//!
//! 此模块集中管理所有通过 `Runtime.callFunctionOn` 在页面中执行的函数声明。
//! 除特别说明外，函数中的 `this` 是调用目标（元素或全局对象）。
//!
//! 模板中的占位符（`__TOKEN__`、`__INDICES__`、`__FUNCTION__`）由执行桥接层替换，
//! 替换时必须最后替换 `__FUNCTION__`，避免用户代码中的同名文本被误替换。

/// 全局对象表达式
///
/// 页面级调用的目标对象，每个上下文代只获取一次
pub const GLOBAL_OBJECT_EXPRESSION: &str = "globalThis";

/// 异步执行包装模板
///
/// 构造一个 Promise，把 `resolve` / `reject` 作为前两个参数显式传入用户函数。
/// `reject` 以令牌登记在 `globalThis.__oxideAsync` 中，超时后宿主可以据此取消；
/// 同步抛出的异常会直接使 Promise 失败，用户函数返回的 Promise 被拒绝时同样转交给 `reject`
pub const ASYNC_WRAPPER_TEMPLATE: &str = r#"function (...args) {
    const registry = globalThis.__oxideAsync || (globalThis.__oxideAsync = new Map());
    const token = __TOKEN__;
    return new Promise((resolve, reject) => {
        registry.set(token, reject);
        const result = (__FUNCTION__).call(this, resolve, reject, ...args);
        if (result && typeof result.then === 'function') result.then(undefined, reject);
    }).finally(() => registry.delete(token));
}"#;

/// 取消异步执行脚本模板
///
/// 用超时错误拒绝仍在等待的 Promise，令牌不存在时什么也不做
pub const CANCEL_ASYNC_TEMPLATE: &str = r#"(() => {
    const registry = globalThis.__oxideAsync;
    const reject = registry && registry.get(__TOKEN__);
    if (reject) reject(new Error('script timeout'));
})()"#;

/// 日期参数还原包装模板
///
/// 日期以毫秒时间戳传输，在调用用户函数前还原为 `Date`
pub const REVIVE_DATES_TEMPLATE: &str = r#"function (...args) {
    for (const i of __INDICES__) args[i] = new Date(args[i]);
    return (__FUNCTION__).apply(this, args);
}"#;

/// 日期时间戳脚本
///
/// 以毫秒返回 `Date` 的精确时间，描述字符串只精确到秒
pub const DATE_MILLIS_SCRIPT: &str = r#"function () {
    return this.getTime();
}"#;

/// 单元素查询脚本
///
/// 在元素或文档范围内查找第一个匹配的元素，没有匹配时返回 null
pub const QUERY_SELECTOR_SCRIPT: &str = r#"function (selector) {
    const root = (this && typeof this.querySelector === 'function') ? this : document;
    return root.querySelector(selector);
}"#;

/// 多元素查询脚本
///
/// 按文档顺序返回所有匹配元素组成的数组
pub const QUERY_SELECTOR_ALL_SCRIPT: &str = r#"function (selector) {
    const root = (this && typeof this.querySelectorAll === 'function') ? this : document;
    return Array.from(root.querySelectorAll(selector));
}"#;

/// 获取单个属性脚本
pub const GET_ATTRIBUTE_SCRIPT: &str = r#"function (name) {
    return this.getAttribute(name);
}"#;

/// 获取全部属性脚本
///
/// 返回调用时刻属性集合的 JSON 快照
pub const GET_ATTRIBUTES_SCRIPT: &str = r#"function () {
    const attributes = {};
    for (const attr of Array.from(this.attributes || [])) {
        attributes[attr.name] = attr.value;
    }
    return JSON.stringify(attributes);
}"#;

/// 获取属性值脚本
pub const GET_PROPERTY_SCRIPT: &str = r#"function (name) {
    return this[name];
}"#;

/// 可见性检查脚本
///
/// 元素已挂载、未被样式隐藏并且占据非零区域时视为可见
pub const IS_VISIBLE_SCRIPT: &str = r#"function () {
    if (!this.isConnected) return false;
    const style = window.getComputedStyle(this);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = this.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

/// 元素文本脚本
pub const TEXT_SCRIPT: &str = r#"function () {
    return typeof this.innerText === 'string' ? this.innerText : this.textContent;
}"#;

/// 文档标题脚本
pub const DOCUMENT_TITLE_SCRIPT: &str = r#"function () {
    return document.title;
}"#;

/// 文档地址脚本
pub const DOCUMENT_URL_SCRIPT: &str = r#"function () {
    return location.href;
}"#;
