//! Browser session lifecycle.
//!
//! Each job owns one WebDriver session backed by a chromedriver child
//! process on an ephemeral port. The child is killed when the session
//! closes (and on drop, as a backstop), so an aborted job never leaks a
//! browser.

use std::time::Duration;

use log::{debug, info};
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use tokio::process::{Child, Command};

use crate::config::WorkflowConfig;

use super::error::{Result, WorkflowError};

/// How long to wait for chromedriver to accept connections.
const DRIVER_STARTUP_ATTEMPTS: u32 = 40;
const DRIVER_STARTUP_INTERVAL: Duration = Duration::from_millis(250);

pub struct BrowserSession {
    driver: WebDriver,
    chromedriver: Child,
}

impl BrowserSession {
    /// Spawns chromedriver and opens a fresh browser session against it.
    pub async fn launch(config: &WorkflowConfig, headless: bool) -> Result<Self> {
        let port = free_port()?;

        let mut chromedriver = Command::new(&config.chromedriver)
            .arg(format!("--port={}", port))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WorkflowError::Driver(format!(
                    "failed to spawn '{}': {}",
                    config.chromedriver.display(),
                    e
                ))
            })?;

        if let Err(e) = wait_for_port(port).await {
            let _ = chromedriver.start_kill();
            return Err(e);
        }

        let mut caps = DesiredCapabilities::chrome();
        if headless {
            caps.set_headless()?;
            caps.add_arg("--disable-gpu")?;
        }
        caps.add_arg("--window-size=1440,900")?;
        if let Some(binary) = &config.chrome_binary {
            caps.set_binary(&binary.to_string_lossy())?;
        }

        let driver = match WebDriver::new(&format!("http://127.0.0.1:{}", port), caps).await {
            Ok(driver) => driver,
            Err(e) => {
                let _ = chromedriver.start_kill();
                return Err(e.into());
            }
        };

        info!(
            "Browser session ready on port {} ({})",
            port,
            if headless { "headless" } else { "headed" }
        );

        Ok(Self {
            driver,
            chromedriver,
        })
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    /// Quits the browser and kills the chromedriver child. Errors here are
    /// logged and swallowed; there is nothing useful a caller can do about
    /// a failed teardown.
    pub async fn close(mut self) {
        if let Err(e) = self.driver.clone().quit().await {
            debug!("Browser quit failed: {}", e);
        }
        if let Err(e) = self.chromedriver.start_kill() {
            debug!("chromedriver kill failed: {}", e);
        }
        let _ = self.chromedriver.wait().await;
    }
}

/// Picks a free loopback port by briefly binding port 0.
fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| WorkflowError::Driver(format!("no free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| WorkflowError::Driver(format!("no free port: {}", e)))?
        .port();
    Ok(port)
}

async fn wait_for_port(port: u16) -> Result<()> {
    for _ in 0..DRIVER_STARTUP_ATTEMPTS {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(DRIVER_STARTUP_INTERVAL).await;
    }
    Err(WorkflowError::Driver(format!(
        "chromedriver did not come up on port {}",
        port
    )))
}
