//! CDP WebSocket connection implementation
//!
//! This module provides WebSocket-based connection to Chrome DevTools Protocol.

use super::traits::{CdpConnection, CdpError as CdpErrorResponse, CdpEvent, CdpResponse};
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type PendingMap = Arc<StdMutex<HashMap<u64, PendingCommand>>>;
type Subscribers = Arc<StdMutex<Vec<mpsc::UnboundedSender<CdpEvent>>>>;

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// CDP timeout configuration
#[derive(Debug, Clone)]
pub struct CdpTimeoutConfig {
    /// Default timeout for most commands
    pub default_timeout: Duration,
    /// Timeout for page navigation commands
    pub navigation_timeout: Duration,
    /// Timeout for `Runtime.evaluate`
    pub execution_timeout: Duration,
}

impl Default for CdpTimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(60),
            execution_timeout: Duration::from_secs(30),
        }
    }
}

impl CdpTimeoutConfig {
    /// Use the same timeout for every command class
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            default_timeout: timeout,
            navigation_timeout: timeout,
            execution_timeout: timeout,
        }
    }

    /// Get timeout duration for a specific command method
    ///
    /// `None` means the caller bounds the command itself; function calls
    /// may await in-page promises for as long as the script timeout allows.
    fn get_timeout_for_command(&self, method: &str) -> Option<Duration> {
        let method_lower = method.to_lowercase();

        if method_lower == "runtime.callfunctionon" {
            return None;
        }

        if method_lower.starts_with("page.navigate") || method_lower.contains("reload") {
            return Some(self.navigation_timeout);
        }

        if method_lower == "runtime.evaluate" {
            return Some(self.execution_timeout);
        }

        Some(self.default_timeout)
    }
}

/// WebSocket connection state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Closed,
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// Deregisters a pending command when the waiting future goes away,
/// so a response that arrives after a timeout is dropped instead of leaking.
struct PendingGuard {
    id: u64,
    pending: PendingMap,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(cmd) = lock(&self.pending).remove(&self.id) {
            debug!("Abandoned command {} ({})", self.id, cmd.method);
        }
    }
}

/// CDP WebSocket connection implementation
#[derive(Debug)]
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// WebSocket write half
    writer: Arc<Mutex<Option<WsSink>>>,
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending_commands: PendingMap,
    /// Event subscribers
    event_subscribers: Subscribers,
    /// Is connection active
    is_active: Arc<AtomicBool>,
    /// Timeout configuration
    timeout_config: CdpTimeoutConfig,
}

impl CdpWebSocketConnection {
    /// Create a new CDP WebSocket connection
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn new<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        Self::with_timeouts(url, CdpTimeoutConfig::default()).await
    }

    /// Create a new connection with explicit command timeouts
    pub async fn with_timeouts<S: Into<String>>(
        url: S,
        timeout_config: CdpTimeoutConfig,
    ) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Creating CDP WebSocket connection to {}", url);

        let connection = Arc::new(Self {
            url,
            writer: Arc::new(Mutex::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            next_id: AtomicU64::new(1),
            pending_commands: Arc::new(StdMutex::new(HashMap::new())),
            event_subscribers: Arc::new(StdMutex::new(Vec::new())),
            is_active: Arc::new(AtomicBool::new(false)),
            timeout_config,
        });

        connection.connect().await?;

        Ok(connection)
    }

    /// WebSocket URL this connection talks to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Establish WebSocket connection
    async fn connect(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != ConnectionState::Disconnected {
            return Err(Error::internal("Connection is not in disconnected state"));
        }

        *state = ConnectionState::Connecting;
        drop(state);

        info!("Connecting to WebSocket: {}", self.url);

        match connect_async(self.url.as_str()).await {
            Ok((ws_stream, _)) => {
                let (sink, source) = ws_stream.split();
                *self.writer.lock().await = Some(sink);

                *self.state.write().await = ConnectionState::Connected;
                self.is_active.store(true, Ordering::SeqCst);

                info!("WebSocket connection established");

                let pending_commands = Arc::clone(&self.pending_commands);
                let event_subscribers = Arc::clone(&self.event_subscribers);
                let is_active = Arc::clone(&self.is_active);
                let state = Arc::clone(&self.state);

                tokio::spawn(async move {
                    debug!("Message loop task started");
                    Self::message_loop(source, &pending_commands, &event_subscribers).await;

                    is_active.store(false, Ordering::SeqCst);
                    let mut state = state.write().await;
                    if *state == ConnectionState::Connected {
                        *state = ConnectionState::Disconnected;
                    }
                    drop(state);

                    Self::fail_pending(&pending_commands);
                    info!("Message loop task exited");
                });

                Ok(())
            }
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                Err(Error::websocket(format!("Failed to connect: {}", e)))
            }
        }
    }

    /// Message processing loop, runs until the socket closes
    async fn message_loop(mut source: WsSource, pending_commands: &PendingMap, event_subscribers: &Subscribers) {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    Self::handle_message(&text, pending_commands, event_subscribers);
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket close frame received");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error, stopping message loop: {}", e);
                    break;
                }
            }
        }
    }

    /// Drop every waiter so callers see the closed channel instead of hanging
    fn fail_pending(pending_commands: &PendingMap) {
        let drained: Vec<(u64, PendingCommand)> = lock(pending_commands).drain().collect();
        for (id, cmd) in drained {
            warn!("Connection closed with command {} ({}) in flight", id, cmd.method);
        }
    }

    /// Handle incoming WebSocket message
    fn handle_message(text: &str, pending_commands: &PendingMap, event_subscribers: &Subscribers) {
        debug!("Received message: {}", text);

        // Try to parse as response first
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            Self::handle_response(response, pending_commands);
            return;
        }

        // Try to parse as notification/event
        if let Ok(notification) = serde_json::from_str::<CdpNotification>(text) {
            Self::handle_notification(notification, event_subscribers);
            return;
        }

        warn!("Unknown message format: {}", text);
    }

    /// Handle CDP response
    fn handle_response(response: CdpRpcResponse, pending_commands: &PendingMap) {
        let pending_cmd = lock(pending_commands).remove(&response.id);

        match pending_cmd {
            Some(pending_cmd) => {
                debug!("Received response for command {}: {}", response.id, pending_cmd.method);

                let cdp_response = CdpResponse {
                    id: response.id,
                    result: Some(response.result),
                    error: response.error.map(|e| CdpErrorResponse {
                        code: e.code,
                        message: e.message,
                        data: e.data,
                    }),
                };

                // Receiver may be gone if the caller stopped waiting
                let _ = pending_cmd.sender.send(cdp_response);
            }
            None => {
                debug!("Discarding response for unknown command ID: {}", response.id);
            }
        }
    }

    /// Handle CDP notification/event
    fn handle_notification(notification: CdpNotification, event_subscribers: &Subscribers) {
        debug!("Received event: {}", notification.method);

        let event = CdpEvent {
            method: notification.method,
            params: notification.params,
            session_id: notification.session_id,
        };

        // Broadcast to all subscribers, dropping the ones that hung up
        lock(event_subscribers).retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Send WebSocket message
    async fn send_message(&self, message: Message) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        let sink = writer
            .as_mut()
            .ok_or_else(|| Error::websocket("WebSocket stream not available"))?;

        sink.send(message)
            .await
            .map_err(|e| Error::websocket(format!("Failed to send message: {}", e)))
    }
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    /// Send a CDP command and wait for response
    async fn send_command(&self, method: &str, params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
            session_id: None,
        };

        let json = serde_json::to_string(&request)
            .map_err(|e| Error::protocol(format!("Failed to serialize request: {}", e)))?;

        debug!("Sending CDP command {}: {}", id, json);

        let (sender, receiver) = oneshot::channel();
        lock(&self.pending_commands).insert(
            id,
            PendingCommand {
                sender,
                method: method.to_string(),
            },
        );
        let _guard = PendingGuard {
            id,
            pending: Arc::clone(&self.pending_commands),
        };

        self.send_message(Message::Text(json)).await?;

        let received = match self.timeout_config.get_timeout_for_command(method) {
            Some(limit) => tokio::time::timeout(limit, receiver).await.map_err(|_| {
                Error::protocol(format!("Command {} ({}) timed out after {:?}", id, method, limit))
            })?,
            None => receiver.await,
        };

        let response = received.map_err(|_| {
            Error::protocol(format!("Connection closed before response to command {} ({})", id, method))
        })?;

        if let Some(error) = response.error {
            return Err(error.into());
        }

        Ok(response)
    }

    /// Subscribe to CDP events
    async fn listen_events(&self) -> Result<mpsc::Receiver<CdpEvent>, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let (sender, receiver) = mpsc::channel(100);

        // Subscriber is registered before returning so no event is missed
        let (unbounded_sender, mut unbounded_receiver) = mpsc::unbounded_channel();
        lock(&self.event_subscribers).push(unbounded_sender);

        tokio::spawn(async move {
            while let Some(event) = unbounded_receiver.recv().await {
                if sender.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(receiver)
    }

    /// Close the connection
    async fn close(&self) -> Result<(), Error> {
        info!("Closing CDP WebSocket connection");

        self.is_active.store(false, Ordering::SeqCst);

        let mut writer = self.writer.lock().await;
        if let Some(mut sink) = writer.take() {
            if let Err(e) = sink.close().await {
                error!("Failed to close WebSocket cleanly: {}", e);
            }
        }
        drop(writer);

        *self.state.write().await = ConnectionState::Closed;
        Self::fail_pending(&self.pending_commands);

        Ok(())
    }

    /// Check if connection is active
    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
