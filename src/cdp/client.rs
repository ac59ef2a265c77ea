//! CDP client implementation
//!
//! Thin command/event surface over a [`CdpConnection`]; everything typed lives
//! one layer up in the runtime bridge.

use super::traits::*;
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
}

impl CdpClientImpl {
    /// Create a new CDP client
    ///
    /// # Arguments
    /// * `connection` - CDP connection instance
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        info!("Creating CDP client");
        Self { connection }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    /// Call a raw CDP method
    async fn call_method(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, Error> {
        debug!("Calling CDP method: {}", method);

        let response = self.connection.send_command(method, params).await?;

        if let Some(error) = response.error {
            return Err(error.into());
        }

        response
            .result
            .ok_or_else(|| Error::protocol(format!("No result in response to {}", method)))
    }

    /// Subscribe to events
    async fn subscribe_events(&self, event_type: &str) -> Result<tokio::sync::mpsc::Receiver<CdpEvent>, Error> {
        info!("Subscribing to events: {}", event_type);

        let event_receiver = self.connection.listen_events().await?;

        // Filter events by type
        let (tx, rx) = tokio::sync::mpsc::channel(100);
        let filter_event_type = event_type.to_string();

        tokio::spawn(async move {
            let mut event_receiver = event_receiver;
            while let Some(event) = event_receiver.recv().await {
                if (event.method == filter_event_type || filter_event_type == "*")
                    && tx.send(event).await.is_err()
                {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn close(&self) -> Result<(), Error> {
        self.connection.close().await
    }

    fn is_active(&self) -> bool {
        self.connection.is_active()
    }
}
