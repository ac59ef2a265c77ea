//! Chrome service: browser process lifecycle and driver bootstrap

use super::launcher::{build_command, locate_chrome, LaunchArgs};
use super::port::find_free_port;
use crate::cdp::{CdpBrowser, CdpBrowserImpl, CdpTimeoutConfig};
use crate::config::Config;
use crate::runtime::Timeouts;
use crate::session::Driver;
use crate::wait::Wait;
use crate::{Error, Result};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

/// How to obtain a browser and drive it
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Attach to this DevTools endpoint instead of launching Chrome
    pub cdp_endpoint: Option<String>,
    pub chrome_path: Option<PathBuf>,
    /// Profile directory; a temporary one is created and removed when unset
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub debugging_port: Option<u16>,
    pub chrome_args: Vec<String>,
    pub startup_timeout: Duration,
    pub command_timeout: Duration,
    pub poll_interval: Duration,
    pub timeouts: Timeouts,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            cdp_endpoint: config.cdp_endpoint.clone(),
            chrome_path: config.chrome_path.as_ref().map(PathBuf::from),
            user_data_dir: config.chrome_data_dir.as_ref().map(PathBuf::from),
            headless: config.headless,
            debugging_port: config.debugging_port,
            chrome_args: config.chrome_args.clone(),
            startup_timeout: Duration::from_millis(config.startup_timeout_ms),
            command_timeout: config.command_timeout(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeouts: config.timeouts(),
        }
    }
}

/// Wait for the endpoint, pick or open a page target and attach a driver to it
async fn connect_driver(browser: &dyn CdpBrowser, startup: &Wait, timeouts: Timeouts) -> Result<Driver> {
    let version = startup
        .until(move || async move { Ok::<_, Error>(Some(browser.get_version().await?)) })
        .await
        .map_err(|e| Error::launch(format!("DevTools endpoint did not come up: {}", e)))?;
    info!("Connected to {} (protocol {})", version.product, version.protocol_version);

    let existing = browser
        .get_targets()
        .await?
        .into_iter()
        .find(|target| target.target_type == "page")
        .and_then(|target| target.ws_url);

    let ws_url = match existing {
        Some(url) => url,
        None => browser.create_target("about:blank").await?,
    };
    debug!("Attaching to page target {}", ws_url);

    let client = browser.create_client(&ws_url).await?;
    Driver::new(client, timeouts).await
}

/// Owns one browser (launched or attached) and the driver on it
#[derive(Debug)]
pub struct ChromeService {
    options: ServiceOptions,
    child: Option<Child>,
    temp_dir: Option<PathBuf>,
    browser: Option<Arc<dyn CdpBrowser>>,
    driver: Option<Driver>,
}

impl ChromeService {
    pub fn new(options: ServiceOptions) -> Self {
        Self {
            options,
            child: None,
            temp_dir: None,
            browser: None,
            driver: None,
        }
    }

    /// Start the browser and return a driver for its first page
    ///
    /// Everything started so far is torn down again when this fails.
    pub async fn start(&mut self) -> Result<Driver> {
        if let Some(driver) = &self.driver {
            return Ok(driver.clone());
        }

        match self.try_start().await {
            Ok(driver) => {
                self.driver = Some(driver.clone());
                Ok(driver)
            }
            Err(e) => {
                if let Err(stop_err) = self.stop().await {
                    warn!("Cleanup after failed start also failed: {}", stop_err);
                }
                Err(e)
            }
        }
    }

    async fn try_start(&mut self) -> Result<Driver> {
        let endpoint = match self.options.cdp_endpoint.clone() {
            Some(endpoint) => {
                info!("Attaching to running browser at {}", endpoint);
                endpoint
            }
            None => self.launch().await?,
        };

        let browser: Arc<dyn CdpBrowser> = Arc::new(CdpBrowserImpl::with_timeouts(
            endpoint,
            CdpTimeoutConfig::uniform(self.options.command_timeout),
        ));
        self.browser = Some(Arc::clone(&browser));

        let startup = Wait::new(self.options.startup_timeout)
            .with_interval(self.options.poll_interval)
            .with_message("DevTools endpoint");
        connect_driver(browser.as_ref(), &startup, self.options.timeouts).await
    }

    /// Spawn Chrome; returns its DevTools HTTP endpoint
    async fn launch(&mut self) -> Result<String> {
        let chrome = locate_chrome(self.options.chrome_path.as_deref())
            .ok_or_else(|| Error::launch("Chrome executable not found; set CHROME_PATH or chrome_path"))?;

        let port = match self.options.debugging_port {
            Some(port) => port,
            None => find_free_port()?,
        };

        let user_data_dir = match &self.options.user_data_dir {
            Some(dir) => dir.clone(),
            None => {
                let dir = std::env::temp_dir().join(format!("oxide-driver-{}", uuid::Uuid::new_v4()));
                tokio::fs::create_dir_all(&dir).await?;
                self.temp_dir = Some(dir.clone());
                dir
            }
        };

        let mut cmd = build_command(
            &chrome,
            &LaunchArgs {
                port,
                user_data_dir: &user_data_dir,
                headless: self.options.headless,
                extra_args: &self.options.chrome_args,
            },
        );
        cmd.stdout(Stdio::null()).stderr(Stdio::null());

        let child = cmd
            .spawn()
            .map_err(|e| Error::launch(format!("Failed to start {}: {}", chrome.display(), e)))?;
        info!("Launched {} (pid {:?}) on port {}", chrome.display(), child.id(), port);
        self.child = Some(child);

        Ok(format!("http://127.0.0.1:{}", port))
    }

    /// Driver of the running browser, if started
    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    /// Close the driver, terminate a launched browser and remove its temporary profile
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.close().await {
                warn!("Failed to close driver: {}", e);
            }
        }

        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close DevTools connections: {}", e);
            }
        }

        if let Some(mut child) = self.child.take() {
            info!("Stopping browser process {:?}", child.id());
            if let Err(e) = child.kill().await {
                warn!("Failed to kill browser process: {}", e);
            }
        }

        if let Some(dir) = self.temp_dir.take() {
            debug!("Removing temporary profile {}", dir.display());
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!("Failed to remove {}: {}", dir.display(), e);
            }
        }

        Ok(())
    }

    /// Run `f` against a fresh driver; the browser is stopped afterwards even if `f` fails
    pub async fn run<F, Fut, T>(options: ServiceOptions, f: F) -> Result<T>
    where
        F: FnOnce(Driver) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut service = ChromeService::new(options);
        let driver = service.start().await?;

        let result = f(driver).await;
        let stopped = service.stop().await;

        let value = result?;
        stopped?;
        Ok(value)
    }
}

impl Drop for ChromeService {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
        if let Some(dir) = self.temp_dir.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
