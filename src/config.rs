//! Configuration management for oxide-driver

use crate::runtime::Timeouts;
use crate::wait::Wait;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Driver configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attach to an already running browser instead of launching one
    pub cdp_endpoint: Option<String>,

    /// Chrome executable path
    pub chrome_path: Option<String>,

    /// Chrome data directory
    pub chrome_data_dir: Option<String>,

    /// Launch without a visible window
    pub headless: bool,

    /// Remote debugging port (a free one is picked when unset)
    pub debugging_port: Option<u16>,

    /// Extra command line arguments for Chrome
    pub chrome_args: Vec<String>,

    /// How long to wait for the debugging endpoint after launch, in milliseconds
    pub startup_timeout_ms: u64,

    /// Default timeout for script evaluation in milliseconds
    pub script_timeout_ms: u64,

    /// Default timeout for navigation in milliseconds
    pub navigation_timeout_ms: u64,

    /// Timeout for plain CDP commands in milliseconds
    pub command_timeout_ms: u64,

    /// Poll interval for waits in milliseconds
    pub poll_interval_ms: u64,

    /// Default wait deadline in milliseconds
    pub wait_timeout_ms: u64,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cdp_endpoint: None,
            chrome_path: None,
            chrome_data_dir: None,
            headless: true,
            debugging_port: None,
            chrome_args: Vec::new(),
            startup_timeout_ms: 15000,
            script_timeout_ms: 30000,
            navigation_timeout_ms: 30000,
            command_timeout_ms: 30000,
            poll_interval_ms: 100,
            wait_timeout_ms: 10000,
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: String) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::configuration(format!("Invalid {}", name)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(endpoint) = env::var("OXIDE_CDP_ENDPOINT") {
            config.cdp_endpoint = Some(endpoint);
        }

        if let Ok(chrome_path) = env::var("OXIDE_CHROME_PATH") {
            config.chrome_path = Some(chrome_path);
        }

        if let Ok(data_dir) = env::var("OXIDE_DATA_DIR") {
            config.chrome_data_dir = Some(data_dir);
        }

        if let Ok(headless) = env::var("OXIDE_HEADLESS") {
            config.headless = parse_var("OXIDE_HEADLESS", headless)?;
        }

        if let Ok(port) = env::var("OXIDE_DEBUGGING_PORT") {
            config.debugging_port = Some(parse_var("OXIDE_DEBUGGING_PORT", port)?);
        }

        if let Ok(args) = env::var("OXIDE_CHROME_ARGS") {
            config.chrome_args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Ok(timeout) = env::var("OXIDE_STARTUP_TIMEOUT") {
            config.startup_timeout_ms = parse_var("OXIDE_STARTUP_TIMEOUT", timeout)?;
        }

        if let Ok(timeout) = env::var("OXIDE_SCRIPT_TIMEOUT") {
            config.script_timeout_ms = parse_var("OXIDE_SCRIPT_TIMEOUT", timeout)?;
        }

        if let Ok(timeout) = env::var("OXIDE_NAVIGATION_TIMEOUT") {
            config.navigation_timeout_ms = parse_var("OXIDE_NAVIGATION_TIMEOUT", timeout)?;
        }

        if let Ok(timeout) = env::var("OXIDE_COMMAND_TIMEOUT") {
            config.command_timeout_ms = parse_var("OXIDE_COMMAND_TIMEOUT", timeout)?;
        }

        if let Ok(interval) = env::var("OXIDE_POLL_INTERVAL") {
            config.poll_interval_ms = parse_var("OXIDE_POLL_INTERVAL", interval)?;
        }

        if let Ok(timeout) = env::var("OXIDE_WAIT_TIMEOUT") {
            config.wait_timeout_ms = parse_var("OXIDE_WAIT_TIMEOUT", timeout)?;
        }

        if let Ok(log_level) = env::var("OXIDE_LOG_LEVEL") {
            config.log_level = log_level;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))
    }

    /// Driver timeouts derived from this configuration
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            script: Duration::from_millis(self.script_timeout_ms),
            navigation: Duration::from_millis(self.navigation_timeout_ms),
        }
    }

    /// Default wait derived from this configuration
    pub fn wait(&self) -> Wait {
        Wait::new(Duration::from_millis(self.wait_timeout_ms))
            .with_interval(Duration::from_millis(self.poll_interval_ms))
    }

    /// Timeout for plain CDP commands
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
