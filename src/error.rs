//! Unified error types for oxide-driver

use std::time::Duration;
use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for oxide-driver
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Transport-level protocol failure (closed channel, malformed message)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error response returned by a CDP command
    #[error("CDP error {code}: {message}")]
    Cdp { code: i64, message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// In-page code threw during evaluation
    #[error("Script error: {message}")]
    ScriptRuntime {
        message: String,
        stack: Option<String>,
    },

    /// Asynchronous evaluation did not settle in time
    #[error("Script timed out after {0:?}")]
    ScriptTimeout(Duration),

    /// A remote value has no host-side representation
    #[error("Unsupported remote type: {0}")]
    UnsupportedRemoteType(String),

    /// A host value cannot be sent to the page
    #[error("Unencodable value: {0}")]
    UnencodableValue(String),

    /// A single-result query matched nothing
    #[error("No element matches selector: {0}")]
    NotFound(String),

    /// The remote object belongs to a document that no longer exists
    #[error("Stale element reference: {0}")]
    StaleReference(String),

    /// A wait condition was not satisfied before its deadline
    #[error("Timed out after {timeout:?} waiting for {message}")]
    WaitTimeout {
        timeout: Duration,
        message: String,
        #[source]
        last_error: Option<Box<Error>>,
    },

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Element cannot receive input (not rendered, zero-size, detached)
    #[error("Element not interactable: {0}")]
    ElementNotInteractable(String),

    /// Browser process could not be started or reached
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new CDP command error
    pub fn cdp<S: Into<String>>(code: i64, msg: S) -> Self {
        Error::Cdp {
            code,
            message: msg.into(),
        }
    }

    /// Create a new script runtime error
    pub fn script_runtime<S: Into<String>>(msg: S, stack: Option<String>) -> Self {
        Error::ScriptRuntime {
            message: msg.into(),
            stack,
        }
    }

    /// Create a new unsupported remote type error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::UnsupportedRemoteType(msg.into())
    }

    /// Create a new unencodable value error
    pub fn unencodable<S: Into<String>>(msg: S) -> Self {
        Error::UnencodableValue(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(selector: S) -> Self {
        Error::NotFound(selector.into())
    }

    /// Create a new stale reference error
    pub fn stale<S: Into<String>>(msg: S) -> Self {
        Error::StaleReference(msg.into())
    }

    /// Create a new navigation failed error
    pub fn navigation_failed<S: Into<String>>(msg: S) -> Self {
        Error::NavigationFailed(msg.into())
    }

    /// Create a new element not interactable error
    pub fn not_interactable<S: Into<String>>(msg: S) -> Self {
        Error::ElementNotInteractable(msg.into())
    }

    /// Create a new launch error
    pub fn launch<S: Into<String>>(msg: S) -> Self {
        Error::Launch(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether the transport itself failed, as opposed to the page or the caller
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_) | Error::Protocol(_) | Error::Cdp { .. } | Error::Serialization(_)
        )
    }

    /// Whether the error is a `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
