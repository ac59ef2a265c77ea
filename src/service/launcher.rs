//! Locating and launching the Chrome executable

use std::env;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

#[cfg(target_os = "macos")]
const WELL_KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(target_os = "windows")]
const WELL_KNOWN_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const WELL_KNOWN_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

const PATH_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Find a Chrome binary: explicit path, `CHROME_PATH`, install locations, then `PATH`
pub fn locate_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    if let Some(path) = env::var_os("CHROME_PATH").map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
        debug!("CHROME_PATH {} is not a file, searching further", path.display());
    }

    if let Some(path) = WELL_KNOWN_PATHS.iter().map(PathBuf::from).find(|p| p.is_file()) {
        return Some(path);
    }

    let search = env::var_os("PATH")?;
    env::split_paths(&search).find_map(|dir| {
        PATH_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Launch parameters for one browser process
#[derive(Debug, Clone)]
pub struct LaunchArgs<'a> {
    pub port: u16,
    pub user_data_dir: &'a Path,
    pub headless: bool,
    pub extra_args: &'a [String],
}

/// Build the Chrome command line
pub fn build_command(chrome_path: &Path, args: &LaunchArgs<'_>) -> Command {
    let mut cmd = Command::new(chrome_path);

    cmd.arg(format!("--remote-debugging-port={}", args.port));
    cmd.arg(format!("--user-data-dir={}", args.user_data_dir.display()));

    if args.headless {
        cmd.arg("--headless=new");
    }

    cmd.arg("--no-first-run");
    cmd.arg("--no-default-browser-check");

    for arg in args.extra_args {
        cmd.arg(arg);
    }

    cmd.arg("about:blank");
    cmd.kill_on_drop(true);
    cmd
}
