//! The browser-driven publish workflow.
//!
//! One invocation handles one job: resolve metadata, authenticate the
//! session from the account's stored credential, drive the publish state
//! machine, and re-persist the credential. The terminal state is reported
//! as a structured verdict line on stdout plus the process exit code.

pub mod credentials;
pub mod error;
pub mod platform;
pub mod publisher;
pub mod session;
pub mod verdict;

use std::path::PathBuf;

use chrono::NaiveDateTime;
use log::{error, info, warn};

use crate::config::Config;
use crate::sidecar;

pub use credentials::{CredentialStore, StoredCookie};
pub use error::WorkflowError;
pub use publisher::{ProductOutcome, PublishJob, VideoPublisher};
pub use session::BrowserSession;
pub use verdict::{WorkflowVerdict, VERDICT_PREFIX};

/// When to publish, as requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishTime {
    Immediate,
    At(NaiveDateTime),
}

impl PublishTime {
    /// `0` means immediate; anything else must be `YYYY-MM-DD HH:MM` in
    /// the publication timezone.
    pub fn parse(raw: &str) -> Result<Self, WorkflowError> {
        let raw = raw.trim();
        if raw == "0" {
            return Ok(Self::Immediate);
        }
        NaiveDateTime::parse_from_str(raw, platform::SCHEDULE_TIME_FORMAT)
            .map(Self::At)
            .map_err(|_| WorkflowError::InvalidPublishTime(raw.to_string()))
    }
}

/// Inputs to one `upload` invocation. Explicit flags win over sidecar
/// metadata, which wins over derived defaults.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub account: String,
    pub video: PathBuf,
    pub title: Option<String>,
    pub tags: Option<String>,
    pub publish_time: PublishTime,
    pub product_link: Option<String>,
    pub product_short_title: Option<String>,
    pub thumbnail: Option<PathBuf>,
    /// Force a visible browser window regardless of configuration.
    pub headed: bool,
    pub skip_cookie_check: bool,
    /// Explicit sidecar path; defaults to the video's `.txt` neighbor.
    pub sidecar: Option<PathBuf>,
}

/// Resolves the effective publish job from options and sidecar metadata.
fn resolve_job(opts: &UploadOptions) -> Result<PublishJob, WorkflowError> {
    if !opts.video.is_file() {
        return Err(WorkflowError::MissingVideo(opts.video.clone()));
    }

    let sidecar_path = opts
        .sidecar
        .clone()
        .unwrap_or_else(|| sidecar::sidecar_path(&opts.video));
    let meta = sidecar::load_sidecar(&sidecar_path)?;

    let title = opts
        .title
        .clone()
        .or(meta.title)
        .unwrap_or_else(|| {
            opts.video
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".to_string())
        });

    let topics = match &opts.tags {
        Some(raw) => sidecar::normalize_topics(raw),
        None => meta.topics,
    };

    Ok(PublishJob {
        account: opts.account.clone(),
        video: opts.video.clone(),
        title,
        topics,
        publish_at: match opts.publish_time {
            PublishTime::Immediate => None,
            PublishTime::At(at) => Some(at),
        },
        thumbnail: opts.thumbnail.clone(),
        product_link: opts.product_link.clone().or(meta.product_link),
        product_short_title: opts.product_short_title.clone().or(meta.product_short_title),
    })
}

/// Runs the publish workflow for one job. Never returns an error: every
/// failure mode collapses into a terminal verdict so the parent process
/// always gets a classifiable result.
pub async fn run_upload(config: &Config, opts: UploadOptions) -> WorkflowVerdict {
    let job = match resolve_job(&opts) {
        Ok(job) => job,
        Err(e) => {
            error!("{}", e);
            return WorkflowVerdict::AbortedError {
                reason: e.to_string(),
            };
        }
    };

    let headless = config.workflow.headless && !opts.headed;
    let session = match BrowserSession::launch(&config.workflow, headless).await {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            return WorkflowVerdict::AbortedError {
                reason: e.to_string(),
            };
        }
    };

    let store = CredentialStore::new(&config.dirs.cookies);
    let skip_check = opts.skip_cookie_check || config.workflow.skip_cookie_check;
    let policy = &config.workflow.poll;

    let credential_result = if skip_check {
        info!("Skipping credential probe");
        match store.load(&job.account) {
            Ok(Some(cookies)) => credentials::apply_cookies(session.driver(), &cookies).await,
            Ok(None) => Err(WorkflowError::Credential(format!(
                "no stored credential for '{}'",
                job.account
            ))),
            Err(e) => Err(e),
        }
    } else {
        credentials::ensure_credential(
            session.driver(),
            &store,
            &job.account,
            !headless,
            policy,
        )
        .await
    };

    if let Err(e) = credential_result {
        error!("{}", e);
        session.close().await;
        return WorkflowVerdict::CredentialFailure {
            reason: e.to_string(),
        };
    }

    let runs_dir = config.dirs.runs.join(crate::sanitize::slugify(&job.account));
    let publisher = VideoPublisher::new(session.driver(), &job, &config.workflow, runs_dir);

    let verdict = match publisher.run().await {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("Workflow failed: {}", e);
            WorkflowVerdict::AbortedError {
                reason: e.to_string(),
            }
        }
    };

    // The session was live even when the job aborted, so the credential is
    // refreshed on every path that reaches here.
    match credentials::capture_cookies(session.driver()).await {
        Ok(cookies) => {
            if let Err(e) = store.save(&job.account, &cookies) {
                warn!("Credential refresh failed: {}", e);
            }
        }
        Err(e) => warn!("Cookie capture failed: {}", e),
    }

    session.close().await;
    verdict
}

/// Produces or validates the stored credential for an account. Returns
/// whether a valid credential is persisted afterwards.
pub async fn run_setup(config: &Config, account: &str, headed: bool) -> Result<bool, WorkflowError> {
    let store = CredentialStore::new(&config.dirs.cookies);
    let policy = &config.workflow.poll;
    let headless = config.workflow.headless && !headed;

    let session = BrowserSession::launch(&config.workflow, headless).await?;

    if let Some(cookies) = store.load(account)? {
        credentials::apply_cookies(session.driver(), &cookies).await?;
        if credentials::probe(session.driver(), policy).await? {
            info!("Stored credential for '{}' is valid", account);
            let refreshed = credentials::capture_cookies(session.driver()).await?;
            store.save(account, &refreshed)?;
            session.close().await;
            return Ok(true);
        }
        info!("Stored credential for '{}' is expired", account);
    }

    // A fresh login needs a visible window. Relaunch headed if the probe
    // session was headless.
    let session = if headless {
        session.close().await;
        BrowserSession::launch(&config.workflow, false).await?
    } else {
        session
    };

    let result = credentials::interactive_login(session.driver(), policy).await;
    let valid = match result {
        Ok(()) => {
            let cookies = credentials::capture_cookies(session.driver()).await?;
            store.save(account, &cookies)?;
            true
        }
        Err(e) => {
            warn!("{}", e);
            false
        }
    };

    session.close().await;
    Ok(valid)
}
