//! The publish workflow state machine.
//!
//! A linear sequence of browser-driven steps with two bounded retry loops
//! (composer-ready, publish-confirmation), one wall-clock-bounded wait
//! (binary upload), and one branch with a hard-abort path (product
//! attachment). Every wait is bounded; exhaustion surfaces as a distinct
//! timeout error instead of a hang.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use thirtyfour::{By, Key, WebDriver, WebElement};

use crate::config::WorkflowConfig;

use super::error::{Result, WorkflowError};
use super::platform;
use super::verdict::WorkflowVerdict;

/// Everything one publish run needs to know.
#[derive(Debug, Clone)]
pub struct PublishJob {
    pub account: String,
    pub video: PathBuf,
    pub title: String,
    pub topics: Vec<String>,
    /// Local wall-clock time in the publication timezone; `None` publishes
    /// immediately.
    pub publish_at: Option<NaiveDateTime>,
    pub thumbnail: Option<PathBuf>,
    pub product_link: Option<String>,
    pub product_short_title: Option<String>,
}

/// Four-way outcome of the product attachment step.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductOutcome {
    Attached,
    Skipped,
    /// Quota dialog appeared; the job must abort without publishing.
    QuotaReached,
    /// Anything else went wrong; the job must abort without publishing.
    Error(String),
}

pub struct VideoPublisher<'a> {
    driver: &'a WebDriver,
    job: &'a PublishJob,
    config: &'a WorkflowConfig,
    /// Diagnostic artifacts for this account land here on abort.
    runs_dir: PathBuf,
}

impl<'a> VideoPublisher<'a> {
    pub fn new(
        driver: &'a WebDriver,
        job: &'a PublishJob,
        config: &'a WorkflowConfig,
        runs_dir: PathBuf,
    ) -> Self {
        Self {
            driver,
            job,
            config,
            runs_dir,
        }
    }

    /// Drives the whole state machine. `Ok` carries the terminal verdict;
    /// `Err` means the session itself failed (the caller maps that to an
    /// aborted-error verdict).
    pub async fn run(&self) -> Result<WorkflowVerdict> {
        info!("Uploading '{}' from {}", self.job.title, self.job.video.display());

        self.open_composer().await?;
        self.ingest_file().await?;
        self.await_composer_ready().await?;
        self.fill_metadata().await?;
        self.await_upload_complete().await?;

        if let Some(thumbnail) = &self.job.thumbnail {
            self.set_thumbnail(thumbnail).await?;
        }

        match self.attach_product().await? {
            ProductOutcome::QuotaReached => {
                warn!("Product quota exhausted; aborting without publishing");
                return Ok(WorkflowVerdict::AbortedQuota);
            }
            ProductOutcome::Error(reason) => {
                warn!("Product attachment failed; aborting without publishing: {}", reason);
                return Ok(WorkflowVerdict::AbortedError { reason });
            }
            ProductOutcome::Attached | ProductOutcome::Skipped => {}
        }

        self.enable_syndication().await;

        if let Some(publish_at) = self.job.publish_at {
            self.set_schedule(publish_at).await?;
        }

        self.confirm_publish().await?;
        Ok(WorkflowVerdict::Published)
    }

    async fn open_composer(&self) -> Result<()> {
        self.driver.goto(platform::UPLOAD_URL).await?;

        let deadline = Instant::now() + self.config.poll.probe_timeout;
        loop {
            if self.current_url().await?.starts_with(platform::UPLOAD_URL) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(WorkflowError::Timeout {
                    stage: "upload surface",
                });
            }
            tokio::time::sleep(self.config.poll.dialog_interval).await;
        }
    }

    async fn ingest_file(&self) -> Result<()> {
        let input = self
            .wait_for(By::Css(platform::FILE_INPUT_CSS), "file input")
            .await?;
        input
            .send_keys(self.job.video.to_string_lossy().as_ref())
            .await?;
        info!("Submitted video file to the upload control");
        Ok(())
    }

    /// Waits until one of the two post-upload composer surfaces is reached.
    async fn await_composer_ready(&self) -> Result<()> {
        for _ in 0..self.config.poll.composer_attempts {
            let url = self.current_url().await?;
            if url.starts_with(platform::COMPOSER_URL_V1) {
                info!("Reached composer surface (v1)");
                return Ok(());
            }
            if url.starts_with(platform::COMPOSER_URL_V2) {
                info!("Reached composer surface (v2)");
                return Ok(());
            }
            tokio::time::sleep(self.config.poll.composer_interval).await;
        }
        Err(WorkflowError::Timeout {
            stage: "composer surface",
        })
    }

    async fn fill_metadata(&self) -> Result<()> {
        let title = truncate_chars(&self.job.title, self.config.title_max_chars);

        match self.driver.find(By::XPath(platform::TITLE_INPUT_XPATH)).await {
            Ok(input) => {
                input.clear().await?;
                input.send_keys(&title).await?;
            }
            Err(_) => {
                // Older composer build: a contenteditable area instead of a
                // dedicated input.
                let editor = self
                    .wait_for(By::Css(platform::TITLE_EDITOR_CSS), "title editor")
                    .await?;
                editor.click().await?;
                editor.send_keys(Key::Control + "a").await?;
                editor.send_keys(Key::Delete + "").await?;
                editor.send_keys(&title).await?;
                editor.send_keys(Key::Enter + "").await?;
            }
        }

        let topic_editor = self
            .wait_for(By::Css(platform::TOPIC_EDITOR_CSS), "topic editor")
            .await?;
        for topic in &self.job.topics {
            topic_editor.send_keys(format!("#{}", topic)).await?;
            topic_editor.send_keys(" ").await?;
        }
        info!("Filled title and {} topics", self.job.topics.len());
        Ok(())
    }

    /// Waits for the binary upload to finish. On the platform's upload
    /// error marker the same file is resubmitted once and polling resumes.
    async fn await_upload_complete(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.poll.upload_timeout;
        let mut resubmitted = false;

        loop {
            if self.exists(By::XPath(platform::UPLOAD_DONE_XPATH)).await {
                info!("Video upload complete");
                return Ok(());
            }

            if self.exists(By::XPath(platform::UPLOAD_FAILED_XPATH)).await {
                if resubmitted {
                    return Err(WorkflowError::Timeout {
                        stage: "upload (failed twice)",
                    });
                }
                warn!("Platform reported an upload error; resubmitting the file once");
                let input = self
                    .wait_for(By::Css(platform::REUPLOAD_INPUT_CSS), "reupload input")
                    .await?;
                input
                    .send_keys(self.job.video.to_string_lossy().as_ref())
                    .await?;
                resubmitted = true;
            }

            if Instant::now() >= deadline {
                return Err(WorkflowError::Timeout { stage: "upload" });
            }
            debug!("Waiting for video upload...");
            tokio::time::sleep(self.config.poll.upload_interval).await;
        }
    }

    /// Drives the cover-picker dialog to completion.
    async fn set_thumbnail(&self, thumbnail: &Path) -> Result<()> {
        info!("Setting thumbnail from {}", thumbnail.display());
        self.driver
            .find(By::XPath(platform::THUMBNAIL_OPEN_XPATH))
            .await?
            .click()
            .await?;
        self.wait_for(By::Css(platform::THUMBNAIL_MODAL_CSS), "cover dialog")
            .await?;
        self.driver
            .find(By::XPath(platform::THUMBNAIL_VERTICAL_XPATH))
            .await?
            .click()
            .await?;
        tokio::time::sleep(self.config.poll.dialog_interval).await;

        let input = self
            .wait_for(By::Css(platform::THUMBNAIL_UPLOAD_INPUT_CSS), "cover input")
            .await?;
        input.send_keys(thumbnail.to_string_lossy().as_ref()).await?;
        tokio::time::sleep(self.config.poll.dialog_interval).await;

        self.wait_for(By::XPath(platform::THUMBNAIL_FINISH_XPATH), "cover confirm")
            .await?
            .click()
            .await?;
        Ok(())
    }

    /// Product attachment with its four-way outcome. Selector failures and
    /// timeouts inside this step become `ProductOutcome::Error` (with
    /// diagnostics) rather than hard errors, because the job must still
    /// abort cleanly through the verdict path.
    async fn attach_product(&self) -> Result<ProductOutcome> {
        let Some(link) = &self.job.product_link else {
            info!("No product link supplied, skipping product attachment");
            return Ok(ProductOutcome::Skipped);
        };

        info!("Attaching product link");
        match self.attach_product_steps(link).await {
            Ok(ProductOutcome::QuotaReached) => {
                self.capture_diagnostics("product_quota").await;
                Ok(ProductOutcome::QuotaReached)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.capture_diagnostics("product_error").await;
                Ok(ProductOutcome::Error(e.to_string()))
            }
        }
    }

    async fn attach_product_steps(&self, link: &str) -> Result<ProductOutcome> {
        // Bring the extended-info card into view; the tag row below it
        // renders lazily.
        let heading = self
            .wait_for(By::XPath(platform::EXTENSION_HEADING_XPATH), "extended info card")
            .await?;
        heading.scroll_into_view().await?;

        let tag_row = self
            .wait_for(By::XPath(platform::TAG_ROW_XPATH), "tag row")
            .await?;
        tag_row.scroll_into_view().await?;

        // Switch the tag type to cart mode; re-try once if the selection
        // did not stick.
        let type_select = tag_row.find(By::Css(platform::TYPE_SELECT_CSS)).await?;
        self.select_cart_mode(&type_select).await?;

        let url_input = self
            .wait_for(By::Css(platform::LINK_INPUT_CSS), "product link input")
            .await?;
        url_input.click().await?;
        url_input.clear().await?;
        url_input.send_keys(link.trim()).await?;

        tag_row
            .find(By::XPath(platform::ADD_LINK_XPATH))
            .await?
            .click()
            .await?;

        // One of two dialogs follows: the item editor, or the quota notice.
        let deadline = Instant::now() + self.config.poll.dialog_timeout;
        let dialog = loop {
            if self.exists(By::XPath(platform::QUOTA_NOTICE_XPATH)).await {
                return Ok(ProductOutcome::QuotaReached);
            }
            if let Ok(dialog) = self.driver.find(By::XPath(platform::PRODUCT_DIALOG_XPATH)).await {
                break dialog;
            }
            if Instant::now() >= deadline {
                return Err(WorkflowError::Timeout {
                    stage: "product dialog",
                });
            }
            tokio::time::sleep(self.config.poll.dialog_interval).await;
        };

        let short_title = self
            .job
            .product_short_title
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.job.title);
        let short_title = truncate_chars(short_title, self.config.short_title_max_chars);

        let title_input = dialog
            .find(By::XPath(platform::SHORT_TITLE_INPUT_XPATH))
            .await?;
        title_input.click().await?;
        title_input.clear().await?;
        title_input.send_keys(&short_title).await?;

        dialog
            .find(By::XPath(platform::DIALOG_FINISH_XPATH))
            .await?
            .click()
            .await?;

        // The dialog must be gone before later steps can interact with the
        // composer.
        let deadline = Instant::now() + self.config.poll.dialog_timeout;
        while self.exists(By::XPath(platform::PRODUCT_DIALOG_XPATH)).await {
            if Instant::now() >= deadline {
                return Err(WorkflowError::Timeout {
                    stage: "product dialog close",
                });
            }
            tokio::time::sleep(self.config.poll.dialog_interval).await;
        }

        info!("Product attached");
        Ok(ProductOutcome::Attached)
    }

    async fn select_cart_mode(&self, type_select: &WebElement) -> Result<()> {
        for _ in 0..2 {
            type_select.click().await?;
            self.wait_for(By::XPath(platform::CART_OPTION_XPATH), "cart option")
                .await?
                .click()
                .await?;
            let label = type_select.text().await.unwrap_or_default();
            if label.contains(platform::CART_LABEL) {
                return Ok(());
            }
        }
        Err(WorkflowError::Timeout {
            stage: "cart mode selection",
        })
    }

    /// Turns on the third-party relay switch when present. Best-effort:
    /// absence or failure never aborts the job.
    async fn enable_syndication(&self) {
        let Ok(switch) = self.driver.find(By::Css(platform::SYNDICATION_SWITCH_CSS)).await else {
            return;
        };
        let class = match switch.attr("class").await {
            Ok(class) => class.unwrap_or_default(),
            Err(_) => return,
        };
        if class.contains(platform::SYNDICATION_CHECKED_CLASS) {
            return;
        }
        if let Ok(toggle) = switch.find(By::Css(platform::SYNDICATION_TOGGLE_CSS)).await {
            if toggle.click().await.is_ok() {
                debug!("Enabled third-party syndication");
            }
        }
    }

    /// Switches the composer to scheduled mode and types the target time.
    async fn set_schedule(&self, publish_at: NaiveDateTime) -> Result<()> {
        self.dismiss_modals().await?;

        self.wait_for(By::XPath(platform::SCHEDULE_RADIO_XPATH), "schedule toggle")
            .await?
            .click()
            .await?;
        tokio::time::sleep(self.config.poll.dialog_interval).await;

        let stamp = publish_at.format(platform::SCHEDULE_TIME_FORMAT).to_string();
        let input = self
            .wait_for(By::Css(platform::SCHEDULE_INPUT_CSS), "schedule input")
            .await?;
        input.click().await?;
        input.send_keys(Key::Control + "a").await?;
        input.send_keys(&stamp).await?;
        input.send_keys(Key::Enter + "").await?;
        info!("Scheduled for {}", stamp);
        Ok(())
    }

    /// Makes sure no modal is blocking the composer, clicking through the
    /// usual dismiss buttons if one lingers.
    async fn dismiss_modals(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.poll.probe_timeout;
        while self.exists(By::Css(platform::MODAL_WRAP_CSS)).await {
            for label in platform::MODAL_DISMISS_LABELS {
                let selector = format!("//button[contains(.,'{}')]", label);
                if let Ok(button) = self.driver.find(By::XPath(selector.as_str())).await {
                    if button.click().await.is_ok() {
                        break;
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(WorkflowError::Timeout {
                    stage: "modal dismissal",
                });
            }
            tokio::time::sleep(self.config.poll.dialog_interval).await;
        }
        Ok(())
    }

    /// Clicks publish and waits for the navigation to the post-management
    /// surface that signals success.
    async fn confirm_publish(&self) -> Result<()> {
        for _ in 0..self.config.poll.publish_attempts {
            if let Ok(button) = self.driver.find(By::XPath(platform::PUBLISH_BUTTON_XPATH)).await {
                let _ = button.click().await;
            }
            tokio::time::sleep(self.config.poll.publish_interval).await;

            if self.current_url().await?.starts_with(platform::MANAGE_URL_PREFIX) {
                info!("Publish confirmed");
                return Ok(());
            }
            debug!("Waiting for publish confirmation...");
        }
        Err(WorkflowError::Timeout {
            stage: "publish confirmation",
        })
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn exists(&self, by: By) -> bool {
        self.driver.find(by).await.is_ok()
    }

    /// Polls for an element within the dialog timeout.
    async fn wait_for(&self, by: By, stage: &'static str) -> Result<WebElement> {
        let deadline = Instant::now() + self.config.poll.dialog_timeout;
        loop {
            if let Ok(element) = self.driver.find(by.clone()).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(WorkflowError::Timeout { stage });
            }
            tokio::time::sleep(self.config.poll.dialog_interval).await;
        }
    }

    /// Writes a full-page screenshot and page-source snapshot into the
    /// account's runs directory. Failures are logged, not propagated; the
    /// job is already aborting when this runs.
    async fn capture_diagnostics(&self, tag: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.runs_dir) {
            warn!("Cannot create runs directory {}: {}", self.runs_dir.display(), e);
            return;
        }
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");

        let screenshot = self.runs_dir.join(format!("{}-{}.png", tag, stamp));
        match self.driver.screenshot(&screenshot).await {
            Ok(()) => info!("Saved diagnostic screenshot {}", screenshot.display()),
            Err(e) => warn!("Screenshot failed: {}", e),
        }

        let snapshot = self.runs_dir.join(format!("{}-{}.html", tag, stamp));
        match self.driver.source().await {
            Ok(source) => {
                if let Err(e) = std::fs::write(&snapshot, source) {
                    warn!("Page snapshot write failed: {}", e);
                } else {
                    info!("Saved page snapshot {}", snapshot.display());
                }
            }
            Err(e) => warn!("Page source capture failed: {}", e),
        }
    }
}

/// Caps a string at `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_ascii() {
        assert_eq!(truncate_chars("hello world", 5), "hello");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("早安跑步记录一下今天", 10), "早安跑步记录一下今天");
        assert_eq!(truncate_chars("早安跑步记录一下今天加长", 10), "早安跑步记录一下今天");
    }

    #[test]
    fn test_product_outcome_equality() {
        assert_eq!(ProductOutcome::Skipped, ProductOutcome::Skipped);
        assert_ne!(
            ProductOutcome::QuotaReached,
            ProductOutcome::Error("x".to_string())
        );
    }
}
