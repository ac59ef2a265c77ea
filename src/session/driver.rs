//! Driver: the document-level handle
//!
//! Owns the execution bridge for one page target. Navigation and content
//! injection complete only once the new document is the one later calls see.

use super::node::{query_all, query_one, Evaluated, Node};
use crate::cdp::types::{GetFrameTreeResponse, NavigateParams, NavigateResponse};
use crate::cdp::CdpClient;
use crate::runtime::{scripts, EvaluationRequest, ExecutionBridge, ExecutionReceiver, FunctionSource, Timeouts};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Root automation handle for one page
#[derive(Debug, Clone)]
pub struct Driver {
    bridge: Arc<ExecutionBridge>,
    watcher: Arc<Mutex<Option<JoinHandle<()>>>>,
    is_active: Arc<AtomicBool>,
}

impl Driver {
    /// Attach to a page session; enables the domains the driver relies on
    pub async fn new(client: Arc<dyn CdpClient>, timeouts: Timeouts) -> Result<Self> {
        for domain in ["Page", "Runtime", "DOM"] {
            client.enable_domain(domain).await?;
        }

        let bridge = Arc::new(ExecutionBridge::new(Arc::clone(&client), timeouts));
        let watcher = bridge.contexts().watch(&client).await?;

        info!("Driver attached (script timeout {:?})", timeouts.script);

        Ok(Self {
            bridge,
            watcher: Arc::new(Mutex::new(Some(watcher))),
            is_active: Arc::new(AtomicBool::new(true)),
        })
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::websocket("Driver is closed"))
        }
    }

    fn client(&self) -> &Arc<dyn CdpClient> {
        self.bridge.client()
    }

    /// Execution bridge shared with this driver's nodes
    pub fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.bridge
    }

    pub fn timeouts(&self) -> Timeouts {
        self.bridge.timeouts()
    }

    pub fn set_timeouts(&self, timeouts: Timeouts) {
        self.bridge.set_timeouts(timeouts);
    }

    pub fn script_timeout(&self) -> Duration {
        self.bridge.timeouts().script
    }

    /// Default bound for evaluations that carry no timeout of their own
    pub fn set_script_timeout(&self, timeout: Duration) {
        self.bridge.set_script_timeout(timeout);
    }

    /// Navigate and wait for the new document's load event
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_active()?;
        info!("Navigating to {}", url);

        // Subscribe first so a fast load event is not missed
        let mut loads = self.client().subscribe_events("Page.loadEventFired").await?;

        let params = NavigateParams {
            url: url.to_string(),
            referrer: None,
            transition_type: None,
        };
        let result = self
            .client()
            .call_method("Page.navigate", serde_json::to_value(params)?)
            .await?;
        let response: NavigateResponse = serde_json::from_value(result)?;

        if let Some(error_text) = response.error_text.filter(|text| !text.is_empty()) {
            return Err(Error::navigation_failed(format!("{}: {}", url, error_text)));
        }

        // Same-document navigations carry no loader and keep the document
        if response.loader_id.is_none() {
            debug!("Same-document navigation to {}", url);
            return Ok(());
        }

        let limit = self.timeouts().navigation;
        match tokio::time::timeout(limit, loads.recv()).await {
            Ok(Some(_)) => debug!("Load event fired for {}", url),
            Ok(None) => return Err(Error::protocol("Event stream closed while waiting for page load")),
            Err(_) => {
                return Err(Error::navigation_failed(format!(
                    "{} did not finish loading within {:?}",
                    url, limit
                )))
            }
        }

        self.bridge.contexts().invalidate();
        Ok(())
    }

    /// Replace the main frame's document with `html`
    pub async fn set_content(&self, html: &str) -> Result<()> {
        self.ensure_active()?;
        debug!("Setting page content ({} bytes)", html.len());

        let result = self
            .client()
            .call_method("Page.getFrameTree", serde_json::json!({}))
            .await?;
        let tree: GetFrameTreeResponse = serde_json::from_value(result)?;

        self.client()
            .call_method(
                "Page.setDocumentContent",
                serde_json::json!({ "frameId": tree.frame_tree.frame.id, "html": html }),
            )
            .await?;

        self.bridge.contexts().invalidate();
        Ok(())
    }

    pub async fn query_selector(&self, selector: &str) -> Result<Node> {
        self.ensure_active()?;
        query_one(&self.bridge, ExecutionReceiver::Page, selector).await
    }

    pub async fn query_selector_all(&self, selector: &str) -> Result<Vec<Node>> {
        self.ensure_active()?;
        query_all(&self.bridge, ExecutionReceiver::Page, selector).await
    }

    /// Evaluate with the page as receiver
    pub async fn evaluate<R: Into<EvaluationRequest>>(&self, request: R) -> Result<Evaluated> {
        self.ensure_active()?;
        let value = self
            .bridge
            .evaluate(request.into().on(ExecutionReceiver::Page))
            .await?;
        Ok(Evaluated::wrap(value, &self.bridge))
    }

    /// Async evaluation with the page as receiver
    pub async fn evaluate_async<R: Into<EvaluationRequest>>(&self, request: R) -> Result<Evaluated> {
        self.ensure_active()?;
        let value = self
            .bridge
            .evaluate_async(request.into().on(ExecutionReceiver::Page))
            .await?;
        Ok(Evaluated::wrap(value, &self.bridge))
    }

    async fn document_string(&self, source: &str) -> Result<String> {
        self.ensure_active()?;
        let value = self
            .bridge
            .evaluate(EvaluationRequest::new(FunctionSource::Declaration(source.to_string())))
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn title(&self) -> Result<String> {
        self.document_string(scripts::DOCUMENT_TITLE_SCRIPT).await
    }

    pub async fn url(&self) -> Result<String> {
        self.document_string(scripts::DOCUMENT_URL_SCRIPT).await
    }

    /// Release every remote handle produced so far; existing nodes must not be used afterwards
    pub async fn release_all(&self) -> Result<()> {
        self.ensure_active()?;
        self.bridge.release_all().await
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst) && self.client().is_active()
    }

    /// Stop watching the page and close the transport
    pub async fn close(&self) -> Result<()> {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Closing driver");
        if let Some(watcher) = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take() {
            watcher.abort();
        }

        self.client().close().await
    }
}
