//! Common test utilities
//!
//! Shared fixtures for the integration tests: a scripted CDP WebSocket server,
//! HTML documents, and helpers for locating a real Chrome.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use oxide_driver::service::{locate_chrome, ServiceOptions};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Two nested divs, the document most tests query
pub const NESTED_DIVS_HTML: &str = r#"<html><head><title>Nested</title></head><body>
<div id="outer" class="outer"><div id="inner" class="inner">Hello</div></div>
</body></html>"#;

/// Clicking `div#inner` appends `div#innerClick`
pub const CLICKABLE_HTML: &str = r#"<html><head><title>Clickable</title></head><body>
<div id="inner" style="width: 100px; height: 40px" onclick="const d = document.createElement('div'); d.id = 'innerClick'; document.body.appendChild(d);">click me</div>
</body></html>"#;

/// A text input and a hidden element
pub const FORM_HTML: &str = r#"<html><head><title>Form</title></head><body>
<input id="name" type="text">
<div id="hidden" style="display: none">secret</div>
</body></html>"#;

/// Inline a document as a `data:` URL
pub fn data_url(html: &str) -> String {
    format!("data:text/html;charset=utf-8,{}", urlencoding::encode(html))
}

/// Launch options for a local Chrome, `None` when no browser is installed
pub fn chrome_options() -> Option<ServiceOptions> {
    let chrome = locate_chrome(None)?;
    Some(ServiceOptions {
        chrome_path: Some(chrome),
        startup_timeout: Duration::from_secs(20),
        ..ServiceOptions::default()
    })
}

/// Scripted CDP server
///
/// Recognized methods:
/// - `Test.hang`: never answered
/// - `Test.fail`: CDP error -32000
/// - `Test.emit`: sends event `params.event` with `params.payload`, then answers
/// - `Test.delayed`: answered after `params.ms` milliseconds
/// - `Test.disconnect`: the server closes the socket
/// - anything else: `{"echo": params}`
pub struct MockCdpServer {
    addr: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockCdpServer {
    /// Start the server on an ephemeral port
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = format!("ws://{}/devtools/page/MOCK", listener.local_addr()?);

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => match result {
                        Ok((stream, _)) => {
                            tokio::spawn(Self::handle_connection(stream));
                        }
                        Err(e) => {
                            tracing::error!("Mock CDP: accept error: {}", e);
                            break;
                        }
                    },
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn ws_endpoint(&self) -> &str {
        &self.addr
    }

    async fn handle_connection(stream: TcpStream) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                tracing::error!("Mock CDP: handshake error: {}", e);
                return;
            }
        };

        let (sender, mut receiver) = ws_stream.split();
        let sender = std::sync::Arc::new(tokio::sync::Mutex::new(sender));

        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(request) = serde_json::from_str::<Value>(&text) else {
                continue;
            };

            let id = request["id"].as_u64().unwrap_or(0);
            let params = request.get("params").cloned().unwrap_or(Value::Null);

            match request["method"].as_str().unwrap_or_default() {
                "Test.hang" => {}
                "Test.disconnect" => {
                    let _ = sender.lock().await.close().await;
                    return;
                }
                "Test.fail" => {
                    let reply = json!({ "id": id, "error": { "code": -32000, "message": "Scripted failure" } });
                    let _ = sender.lock().await.send(Message::Text(reply.to_string())).await;
                }
                "Test.emit" => {
                    let event = json!({ "method": params["event"], "params": params["payload"] });
                    let mut sink = sender.lock().await;
                    let _ = sink.send(Message::Text(event.to_string())).await;
                    let _ = sink.send(Message::Text(json!({ "id": id, "result": {} }).to_string())).await;
                }
                "Test.delayed" => {
                    let delay = Duration::from_millis(params["ms"].as_u64().unwrap_or(0));
                    let sender = std::sync::Arc::clone(&sender);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let reply = json!({ "id": id, "result": { "delayed": delay.as_millis() as u64 } });
                        let _ = sender.lock().await.send(Message::Text(reply.to_string())).await;
                    });
                }
                _ => {
                    let reply = json!({ "id": id, "result": { "echo": params } });
                    let _ = sender.lock().await.send(Message::Text(reply.to_string())).await;
                }
            }
        }
    }
}

impl Drop for MockCdpServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
