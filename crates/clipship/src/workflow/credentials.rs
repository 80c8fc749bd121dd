//! Per-account credential persistence and validation.
//!
//! A credential is the cookie jar of a previously logged-in browser
//! session, stored as one JSON file per account. Validity is checked with a
//! lightweight navigation probe; refresh happens out-of-band: a human logs
//! in through the headed browser while the workflow polls for completion.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thirtyfour::{By, Cookie, WebDriver};

use crate::config::PollPolicy;
use crate::sanitize::slugify;

use super::error::{Result, WorkflowError};
use super::platform;

/// One persisted cookie. Kept as an own serde type so the on-disk format
/// does not follow WebDriver client internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Epoch seconds; `None` for session cookies.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl StoredCookie {
    pub fn from_browser(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            secure: cookie.secure.unwrap_or(false),
            http_only: false,
            expires_at: cookie.expiry,
        }
    }

    pub fn to_browser(&self) -> Cookie {
        let mut cookie = Cookie::new(self.name.clone(), self.value.clone());
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        if let Some(path) = &self.path {
            cookie.set_path(path.clone());
        }
        cookie.set_secure(self.secure);
        if let Some(expires_at) = self.expires_at {
            cookie.set_expiry(expires_at);
        }
        cookie
    }
}

/// One credential file per account under a fixed directory.
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, account: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slugify(account)))
    }

    pub fn load(&self, account: &str) -> Result<Option<Vec<StoredCookie>>> {
        let path = self.path_for(account);
        if !path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(&path).map_err(|e| WorkflowError::CredentialFile {
                path: path.clone(),
                source: e,
            })?;
        let cookies = serde_json::from_str(&content)?;
        Ok(Some(cookies))
    }

    pub fn save(&self, account: &str, cookies: &[StoredCookie]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| WorkflowError::CredentialFile {
            path: self.dir.clone(),
            source: e,
        })?;
        let path = self.path_for(account);
        let payload = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&path, payload).map_err(|e| WorkflowError::CredentialFile {
            path: path.clone(),
            source: e,
        })?;
        info!("Persisted credential for '{}' ({} cookies)", account, cookies.len());
        Ok(())
    }
}

/// Loads the stored cookies into the live session. The browser must be on
/// the target origin before cookies can be set, so this navigates first.
pub async fn apply_cookies(driver: &WebDriver, cookies: &[StoredCookie]) -> Result<()> {
    driver.goto(platform::HOME_URL).await?;
    driver.delete_all_cookies().await?;
    for cookie in cookies {
        if let Err(e) = driver.add_cookie(cookie.to_browser()).await {
            warn!("Skipping cookie '{}': {}", cookie.name, e);
        }
    }
    Ok(())
}

/// Reads the session's current cookie jar.
pub async fn capture_cookies(driver: &WebDriver) -> Result<Vec<StoredCookie>> {
    let cookies = driver.get_all_cookies().await?;
    Ok(cookies.iter().map(StoredCookie::from_browser).collect())
}

/// Lightweight validity probe: try to reach the upload composer. Landing
/// there without a login prompt means the session is authenticated.
pub async fn probe(driver: &WebDriver, policy: &PollPolicy) -> Result<bool> {
    driver.goto(platform::UPLOAD_URL).await?;

    let deadline = Instant::now() + policy.probe_timeout;
    loop {
        if driver
            .find(By::XPath(platform::LOGIN_PROMPT_XPATH))
            .await
            .is_ok()
        {
            return Ok(false);
        }
        if driver.current_url().await?.as_str().starts_with(platform::UPLOAD_URL) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(policy.dialog_interval).await;
    }
}

/// Suspends the automated flow for a manual out-of-band login: navigates to
/// the platform home, tells the operator what to do, and polls the probe
/// until it passes or the deadline expires.
pub async fn interactive_login(driver: &WebDriver, policy: &PollPolicy) -> Result<()> {
    driver.goto(platform::HOME_URL).await?;
    warn!(
        "Stored credential is missing or expired; complete the login (QR scan) in the \
         browser window; resuming automatically once it succeeds"
    );

    let deadline = Instant::now() + policy.login_timeout;
    loop {
        tokio::time::sleep(policy.login_interval).await;
        if probe(driver, policy).await? {
            info!("Manual login detected, resuming");
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(WorkflowError::Credential(
                "manual login did not complete before the deadline".to_string(),
            ));
        }
    }
}

/// Makes sure the session is authenticated for `account`, refreshing the
/// stored credential interactively when permitted.
pub async fn ensure_credential(
    driver: &WebDriver,
    store: &CredentialStore,
    account: &str,
    interactive: bool,
    policy: &PollPolicy,
) -> Result<()> {
    if let Some(cookies) = store.load(account)? {
        apply_cookies(driver, &cookies).await?;
        if probe(driver, policy).await? {
            return Ok(());
        }
        info!("Stored credential for '{}' failed the probe", account);
    } else {
        info!("No stored credential for '{}'", account);
    }

    if !interactive {
        return Err(WorkflowError::Credential(format!(
            "credential for '{}' is missing or expired; run setup",
            account
        )));
    }

    interactive_login(driver, policy).await?;
    let cookies = capture_cookies(driver).await?;
    store.save(account, &cookies)?;
    Ok(())
}
