//! CDP layer integration tests
//!
//! This module contains integration tests for the CDP layer.
//!
//! Note: These tests require a running Chrome/Chromium instance with remote debugging enabled.
//! Start Chrome with: chrome --remote-debugging-port=9222

use super::browser::CdpBrowserImpl;
use super::client::CdpClientImpl;
use super::connection::CdpWebSocketConnection;
use super::traits::*;
use crate::Error;
use std::time::Duration;

/// Test helper: Get Chrome debugging URL from environment or use default
fn get_chrome_url() -> String {
    std::env::var("CHROME_DEBUG_URL").unwrap_or_else(|_| "http://localhost:9222".to_string())
}

/// Test helper: Check if Chrome is available
async fn is_chrome_available() -> bool {
    CdpBrowserImpl::new(get_chrome_url()).get_version().await.is_ok()
}

/// Test helper: WebSocket URL of a fresh page target
async fn new_page_ws_url(browser: &CdpBrowserImpl) -> String {
    browser
        .create_target("about:blank")
        .await
        .expect("Failed to create page target")
}

#[tokio::test]
async fn test_browser_get_version() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let version = browser.get_version().await.expect("Failed to get browser version");

    assert!(!version.protocol_version.is_empty());
    assert!(!version.product.is_empty());
    assert!(!version.user_agent.is_empty());
}

#[tokio::test]
async fn test_browser_targets_include_created_page() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let ws_url = new_page_ws_url(&browser).await;

    let targets = browser.get_targets().await.expect("Failed to get targets");
    assert!(targets
        .iter()
        .any(|t| t.target_type == "page" && t.ws_url.as_deref() == Some(ws_url.as_str())));
}

#[tokio::test]
async fn test_websocket_connection_close() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let connection = CdpWebSocketConnection::new(new_page_ws_url(&browser).await)
        .await
        .expect("Failed to connect to WebSocket");

    assert!(connection.is_active(), "Connection should be active");

    connection.close().await.expect("Failed to close connection");

    assert!(!connection.is_active(), "Connection should not be active after close");
    let err = connection
        .send_command("Runtime.enable", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(err.is_protocol());
}

#[tokio::test]
async fn test_cdp_send_command() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let connection = CdpWebSocketConnection::new(new_page_ws_url(&browser).await)
        .await
        .expect("Failed to connect");
    let client = CdpClientImpl::new(connection);

    client.enable_domain("Runtime").await.expect("Failed to enable Runtime domain");

    let result = client
        .call_method(
            "Runtime.evaluate",
            serde_json::json!({ "expression": "1 + 1", "returnByValue": true }),
        )
        .await
        .expect("Failed to evaluate JavaScript");
    assert_eq!(result["result"]["value"], 2);

    let err = client
        .call_method("Runtime.noSuchMethod", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cdp { .. }));
}

#[tokio::test]
async fn test_cdp_event_listening() {
    if !is_chrome_available().await {
        eprintln!("Skipping test: Chrome not available");
        return;
    }

    let browser = CdpBrowserImpl::new(get_chrome_url());
    let connection = CdpWebSocketConnection::new(new_page_ws_url(&browser).await)
        .await
        .expect("Failed to connect");
    let client = CdpClientImpl::new(connection);

    let mut loads = client
        .subscribe_events("Page.loadEventFired")
        .await
        .expect("Failed to subscribe to events");

    client.enable_domain("Page").await.unwrap();
    client
        .call_method(
            "Page.navigate",
            serde_json::json!({ "url": "data:text/html,<title>events</title>" }),
        )
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), loads.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("No event received");

    assert_eq!(event.method, "Page.loadEventFired");
}
