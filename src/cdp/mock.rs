//! Mock CDP implementation for testing
//!
//! This module provides mock implementations of CDP traits for development and testing.
//! [`MockCdpClient`] is scriptable per method so the runtime and session layers can be
//! exercised without a browser.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cdp::traits::*;
use crate::Error;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock CDP connection
///
/// Answers a handful of methods with canned results and `Mock.fail` with an error.
#[derive(Debug)]
pub struct MockCdpConnection {
    is_active: Arc<AtomicBool>,
    next_id: AtomicU64,
    listeners: StdMutex<Vec<mpsc::Sender<CdpEvent>>>,
}

impl MockCdpConnection {
    /// Create a new mock CDP connection
    pub fn new() -> Self {
        Self {
            is_active: Arc::new(AtomicBool::new(true)),
            next_id: AtomicU64::new(1),
            listeners: StdMutex::new(Vec::new()),
        }
    }

    /// Push an event to every listener
    pub fn emit(&self, method: &str, params: Value) {
        let event = CdpEvent {
            method: method.to_string(),
            params,
            session_id: None,
        };
        lock(&self.listeners).retain(|tx| tx.try_send(event.clone()).is_ok());
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, _params: Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::websocket("Connection is closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (result, error) = match method {
            "Page.navigate" => (
                Some(serde_json::json!({
                    "frameId": uuid::Uuid::new_v4().to_string(),
                    "loaderId": uuid::Uuid::new_v4().to_string(),
                })),
                None,
            ),
            "Runtime.evaluate" => (
                Some(serde_json::json!({
                    "result": { "type": "string", "value": "mock result" }
                })),
                None,
            ),
            "Mock.fail" => (
                None,
                Some(CdpError {
                    code: -32601,
                    message: format!("'{}' wasn't found", method),
                    data: None,
                }),
            ),
            _ => (Some(serde_json::json!({})), None),
        };

        Ok(CdpResponse { id, result, error })
    }

    async fn listen_events(&self) -> Result<mpsc::Receiver<CdpEvent>, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::websocket("Connection is closed"));
        }

        let (tx, rx) = mpsc::channel(100);
        lock(&self.listeners).push(tx);
        Ok(rx)
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        lock(&self.listeners).clear();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// What a mocked method answers
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful result object
    Result(Value),
    /// CDP error response
    Error(i64, String),
    /// Never answers
    Hang,
    /// Answers after a delay
    Delayed(Duration, Value),
}

type Handler = Arc<dyn Fn(&Value) -> MockReply + Send + Sync>;

/// Scriptable mock CDP client
///
/// Methods without a handler answer `{}`. Every call is recorded.
pub struct MockCdpClient {
    handlers: StdMutex<HashMap<String, Handler>>,
    calls: StdMutex<Vec<(String, Value)>>,
    subscribers: StdMutex<Vec<(String, mpsc::Sender<CdpEvent>)>>,
    is_active: AtomicBool,
}

impl std::fmt::Debug for MockCdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpClient")
            .field("handlers", &lock(&self.handlers).keys().collect::<Vec<_>>())
            .field("calls", &lock(&self.calls).len())
            .field("is_active", &self.is_active.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockCdpClient {
    /// Create a new mock CDP client
    pub fn new() -> Self {
        Self {
            handlers: StdMutex::new(HashMap::new()),
            calls: StdMutex::new(Vec::new()),
            subscribers: StdMutex::new(Vec::new()),
            is_active: AtomicBool::new(true),
        }
    }

    /// Install a handler for a method, replacing any previous one
    pub fn on<F>(&self, method: &str, handler: F)
    where
        F: Fn(&Value) -> MockReply + Send + Sync + 'static,
    {
        lock(&self.handlers).insert(method.to_string(), Arc::new(handler));
    }

    /// Always answer a method with the same result
    pub fn on_result(&self, method: &str, result: Value) {
        self.on(method, move |_| MockReply::Result(result.clone()));
    }

    /// Always answer a method with a CDP error
    pub fn on_error(&self, method: &str, code: i64, message: &str) {
        let message = message.to_string();
        self.on(method, move |_| MockReply::Error(code, message.clone()));
    }

    /// All calls so far as `(method, params)`
    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.calls).clone()
    }

    /// Params of every call to one method
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        lock(&self.calls)
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Number of calls to one method
    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|(m, _)| m == method).count()
    }

    /// Deliver an event to matching subscribers
    pub fn emit(&self, method: &str, params: Value) {
        let event = CdpEvent {
            method: method.to_string(),
            params,
            session_id: None,
        };
        lock(&self.subscribers).retain(|(filter, tx)| {
            if filter == "*" || filter == method {
                tx.try_send(event.clone()).is_ok()
            } else {
                !tx.is_closed()
            }
        });
    }
}

impl Default for MockCdpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpClient for MockCdpClient {
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::websocket("Connection is closed"));
        }

        lock(&self.calls).push((method.to_string(), params.clone()));
        let handler = lock(&self.handlers).get(method).cloned();

        let reply = match handler {
            Some(handler) => handler(&params),
            None => MockReply::Result(serde_json::json!({})),
        };

        match reply {
            MockReply::Result(value) => Ok(value),
            MockReply::Error(code, message) => Err(Error::cdp(code, message)),
            MockReply::Hang => {
                futures::future::pending::<()>().await;
                Err(Error::internal("pending future resolved"))
            }
            MockReply::Delayed(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        }
    }

    async fn subscribe_events(&self, event_type: &str) -> Result<mpsc::Receiver<CdpEvent>, Error> {
        let (tx, rx) = mpsc::channel(100);
        lock(&self.subscribers).push((event_type.to_string(), tx));
        Ok(rx)
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        lock(&self.subscribers).clear();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock CDP browser
#[derive(Debug)]
pub struct MockCdpBrowser {
    is_active: AtomicBool,
    targets: StdMutex<Vec<TargetInfo>>,
}

impl MockCdpBrowser {
    /// Create a new mock CDP browser with no targets
    pub fn new() -> Self {
        Self::with_targets(Vec::new())
    }

    /// Create a mock browser that reports the given targets
    pub fn with_targets(targets: Vec<TargetInfo>) -> Self {
        Self {
            is_active: AtomicBool::new(true),
            targets: StdMutex::new(targets),
        }
    }
}

impl Default for MockCdpBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpBrowser for MockCdpBrowser {
    async fn create_client(&self, _target_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::websocket("Browser is closed"));
        }

        Ok(Arc::new(MockCdpClient::new()))
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        Ok(BrowserVersion {
            protocol_version: "1.3".to_string(),
            product: "Chrome/120.0.0.0".to_string(),
            user_agent: "Mock Chrome/120.0.0.0".to_string(),
            js_version: "12.0.0.0".to_string(),
        })
    }

    async fn get_targets(&self) -> Result<Vec<TargetInfo>, Error> {
        Ok(lock(&self.targets).clone())
    }

    async fn create_target(&self, url: &str) -> Result<String, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::websocket("Browser is closed"));
        }

        let target_id = uuid::Uuid::new_v4().to_string();
        let ws_url = format!("ws://localhost:9222/devtools/page/{}", target_id);
        tracing::debug!("Mock: Created target {} with URL {} => {}", target_id, url, ws_url);

        lock(&self.targets).push(TargetInfo {
            target_id,
            target_type: "page".to_string(),
            title: String::new(),
            url: url.to_string(),
            ws_url: Some(ws_url.clone()),
        });
        Ok(ws_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_connection() {
        let conn = MockCdpConnection::new();
        assert!(conn.is_active());

        let response = conn
            .send_command("Runtime.evaluate", serde_json::json!({}))
            .await
            .unwrap();
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_mock_client_handlers_and_log() {
        let client = MockCdpClient::new();
        client.on_result("Page.getFrameTree", serde_json::json!({ "frameTree": { "frame": { "id": "F1" } } }));
        client.on_error("DOM.getBoxModel", -32000, "Could not compute box model.");

        let tree = client.call_method("Page.getFrameTree", serde_json::json!({})).await.unwrap();
        assert_eq!(tree["frameTree"]["frame"]["id"], "F1");

        let err = client
            .call_method("DOM.getBoxModel", serde_json::json!({ "objectId": "1" }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cdp { code: -32000, .. }));

        assert_eq!(client.call_method("DOM.enable", serde_json::json!({})).await.unwrap(), serde_json::json!({}));
        assert_eq!(client.calls_to("DOM.getBoxModel"), vec![serde_json::json!({ "objectId": "1" })]);
        assert_eq!(client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_client_events() {
        let client = MockCdpClient::new();
        let mut loads = client.subscribe_events("Page.loadEventFired").await.unwrap();
        let mut all = client.subscribe_events("*").await.unwrap();

        client.emit("Runtime.executionContextsCleared", serde_json::json!({}));
        client.emit("Page.loadEventFired", serde_json::json!({}));

        assert_eq!(loads.recv().await.unwrap().method, "Page.loadEventFired");
        assert_eq!(all.recv().await.unwrap().method, "Runtime.executionContextsCleared");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_client_hang() {
        let client = MockCdpClient::new();
        client.on("Runtime.callFunctionOn", |_| MockReply::Hang);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.call_method("Runtime.callFunctionOn", serde_json::json!({})),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_browser() {
        let browser = MockCdpBrowser::new();

        let ws_url = browser.create_target("about:blank").await.unwrap();
        let targets = browser.get_targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].ws_url.as_deref(), Some(ws_url.as_str()));

        let version = browser.get_version().await.unwrap();
        assert_eq!(version.product, "Chrome/120.0.0.0");
    }
}
