//! Oxide-Driver: Selenium-style browser automation over the Chrome DevTools Protocol
//!
//! This library drives a Chrome page through a document handle ([`Driver`]) and
//! element proxies ([`Node`]) that evaluate functions with themselves as `this`.

pub mod error;
pub mod config;

pub mod cdp;
pub mod runtime;
pub mod session;
pub mod wait;
pub mod service;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use runtime::{Argument, EvaluationRequest, RemoteValue, Timeouts};
pub use service::{ChromeService, ServiceOptions};
pub use session::{Driver, Evaluated, Node};
pub use wait::{ExpectedConditions, Wait};

/// Oxide-Driver library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
