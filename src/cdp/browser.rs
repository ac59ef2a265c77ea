//! CDP browser control implementation
//!
//! Browser-level operations over the DevTools HTTP endpoints
//! (`/json/version`, `/json/list`, `/json/new`).

use super::client::CdpClientImpl;
use super::connection::{CdpTimeoutConfig, CdpWebSocketConnection};
use super::traits::*;
use crate::Error;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// `/json/version` payload
#[derive(Debug, Deserialize)]
struct VersionJson {
    #[serde(rename = "Protocol-Version", default)]
    protocol_version: Option<String>,
    #[serde(rename = "Browser", default)]
    browser: Option<String>,
    #[serde(rename = "User-Agent", default)]
    user_agent: Option<String>,
    #[serde(rename = "V8-Version", default)]
    v8_version: Option<String>,
}

/// One entry of `/json/list` or the `/json/new` reply
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetJson {
    id: String,
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    web_socket_debugger_url: Option<String>,
}

impl From<TargetJson> for TargetInfo {
    fn from(json: TargetJson) -> Self {
        TargetInfo {
            target_id: json.id,
            target_type: json.target_type,
            title: json.title,
            url: json.url,
            ws_url: json.web_socket_debugger_url,
        }
    }
}

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// Browser endpoint (e.g., "http://127.0.0.1:9222" or "ws://127.0.0.1:9222")
    endpoint: String,
    /// Shared HTTP client for the DevTools endpoints
    http: reqwest::Client,
    /// Command timeouts handed to every new connection
    timeouts: CdpTimeoutConfig,
    /// Active connections (target_id -> connection)
    connections: Arc<tokio::sync::Mutex<HashMap<String, Arc<dyn CdpConnection>>>>,
}

impl CdpBrowserImpl {
    /// Create a new CDP browser controller
    ///
    /// # Arguments
    /// * `endpoint` - Browser endpoint (e.g., "http://127.0.0.1:9222")
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self::with_timeouts(endpoint, CdpTimeoutConfig::default())
    }

    /// Create a browser controller whose connections use the given command timeouts
    pub fn with_timeouts<S: Into<String>>(endpoint: S, timeouts: CdpTimeoutConfig) -> Self {
        let endpoint_str = endpoint.into();
        info!("Creating CDP browser controller for endpoint: {}", endpoint_str);
        Self {
            endpoint: endpoint_str,
            http: reqwest::Client::new(),
            timeouts,
            connections: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    /// HTTP base URL of the endpoint
    pub fn http_endpoint(&self) -> String {
        self.endpoint
            .replace("ws://", "http://")
            .replace("wss://", "https://")
            .trim_end_matches('/')
            .to_string()
    }

    /// GET a DevTools JSON endpoint
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = format!("{}{}", self.http_endpoint(), path);
        debug!("Fetching {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::launch(format!("Failed to reach browser at {}: {}", url, e)))?;

        response
            .json()
            .await
            .map_err(|e| Error::protocol(format!("Failed to parse {}: {}", url, e)))
    }
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    /// Create a new CDP client for a target
    async fn create_client(&self, target_url: &str) -> Result<Arc<dyn CdpClient>, Error> {
        info!("Creating CDP client for target: {}", target_url);

        let connection = CdpWebSocketConnection::with_timeouts(target_url, self.timeouts.clone()).await?;

        let target_id = target_url.rsplit('/').next().unwrap_or("unknown").to_string();

        let mut connections = self.connections.lock().await;
        connections.insert(target_id, Arc::clone(&connection) as Arc<dyn CdpConnection>);
        drop(connections);

        Ok(Arc::new(CdpClientImpl::new(connection)))
    }

    /// Close every connection opened through this browser
    async fn close(&self) -> Result<(), Error> {
        info!("CdpBrowser::close: Closing browser at endpoint {}", self.endpoint);

        let mut connections = self.connections.lock().await;

        if connections.is_empty() {
            info!("CdpBrowser::close: No active connections to close");
            return Ok(());
        }

        info!("CdpBrowser::close: Closing {} active CDP connections", connections.len());

        let mut failed = 0;
        for (target_id, connection) in connections.drain() {
            debug!("CdpBrowser::close: Closing connection to target: {}", target_id);
            if let Err(e) = connection.close().await {
                warn!("CdpBrowser::close: Failed to close connection to {}: {}", target_id, e);
                failed += 1;
            }
        }

        if failed > 0 {
            warn!("CdpBrowser::close: {} connections failed to close", failed);
        }

        Ok(())
    }

    /// Get browser version
    async fn get_version(&self) -> Result<BrowserVersion, Error> {
        let version: VersionJson = self.get_json("/json/version").await?;

        let unknown = || "unknown".to_string();
        Ok(BrowserVersion {
            protocol_version: version.protocol_version.unwrap_or_else(unknown),
            product: version.browser.unwrap_or_else(unknown),
            user_agent: version.user_agent.unwrap_or_else(unknown),
            js_version: version.v8_version.unwrap_or_else(unknown),
        })
    }

    /// List all targets (pages, workers, etc.)
    async fn get_targets(&self) -> Result<Vec<TargetInfo>, Error> {
        let targets: Vec<TargetJson> = self.get_json("/json/list").await?;
        Ok(targets.into_iter().map(TargetInfo::from).collect())
    }

    /// Create a new page target using the `/json/new` endpoint
    async fn create_target(&self, url: &str) -> Result<String, Error> {
        info!("Creating new target with URL: {}", url);

        let new_url = format!("{}/json/new?{}", self.http_endpoint(), url);
        debug!("Creating new page via HTTP API: {}", new_url);

        let response = self.http.put(&new_url).send().await.map_err(|e| {
            Error::launch(format!(
                r#"Failed to connect to Chrome DevTools endpoint at {}.
Start Chrome with --remote-debugging-port=<port> or leave the endpoint unset to launch one.
Original error: {}"#,
                self.endpoint, e
            ))
        })?;

        let response_text = response
            .text()
            .await
            .map_err(|e| Error::protocol(format!("Failed to read response: {}", e)))?;

        let target: TargetJson = serde_json::from_str(&response_text).map_err(|e| {
            Error::protocol(format!(
                "Failed to parse new target response: {} (response was: {})",
                e, response_text
            ))
        })?;

        target
            .web_socket_debugger_url
            .ok_or_else(|| Error::protocol("No webSocketDebuggerUrl in new target response"))
    }
}
