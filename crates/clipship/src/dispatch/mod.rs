//! The dispatch loop.
//!
//! One cycle: authenticate to the record store, pull the full snapshot,
//! filter it through the readiness predicate, and run each due job to
//! completion, strictly sequentially: each account owns exactly
//! one credential file and the platform tolerates one session per account.
//! A failing job is logged and skipped; the cycle always continues to the
//! remaining jobs.

pub mod error;
pub mod outcome;
pub mod ready;
pub mod reconcile;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{SecondsFormat, TimeZone, Utc};
use log::{error, info, warn};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info_span, Instrument};

use crate::config::{Config, StoreConfig};
use crate::sidecar::{self, SidecarMeta};
use crate::staging::Staging;
use crate::store::{JobRecord, StoreError, TableClient, Token};
use crate::workflow::platform::SCHEDULE_TIME_FORMAT;

pub use error::DispatchError;
pub use outcome::WorkflowOutcome;
pub use ready::is_ready;
pub use reconcile::{outcome_fields, failure_fields, Reconciler, RescueKey, WriteOutcome};

use error::Result;

/// Fixed error text for a non-absolute source path.
const ERR_NOT_ABSOLUTE: &str = "video path must be absolute path";
/// Fixed error text for a missing source file.
const ERR_NOT_A_FILE: &str = "video file does not exist or is not a file";

/// What one dispatch cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub total: usize,
    pub ready: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs whose outcome could not be written back at all (direct write
    /// and rescue both failed). They remain visible only in the logs.
    pub unrecoverable_writes: usize,
}

/// Identifier of the machine executing jobs, written back with every
/// outcome so operators can tell which host ran what.
pub fn execution_host() -> String {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    let base = format!(
        "{}|{}|{}",
        hostname,
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    let digest = Sha1::digest(base.as_bytes());
    let fingerprint: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", hostname, fingerprint)
}

struct JobResult {
    succeeded: bool,
    write: WriteOutcome,
}

pub struct Dispatcher {
    config: Config,
    client: TableClient,
    staging: Staging,
}

impl Dispatcher {
    pub fn new(config: Config, store: StoreConfig) -> std::result::Result<Self, StoreError> {
        let client = TableClient::new(store)?;
        let staging = Staging::new(&config.dirs.videos, config.timezone());
        Ok(Self {
            config,
            client,
            staging,
        })
    }

    /// Runs one dispatch cycle. Store authentication and listing failures
    /// abort the cycle; everything after that is contained per job.
    pub async fn run(&self, headed: bool) -> Result<CycleReport> {
        let token = self.client.authenticate().await?;
        let records = self.client.list_all(&token).await?;

        let now_ms = Utc::now().timestamp_millis();
        let jobs: Vec<JobRecord> = records
            .iter()
            .map(|raw| JobRecord::decode(raw, &self.config.schema))
            .filter(|job| is_ready(job, now_ms))
            .collect();

        let mut report = CycleReport {
            total: records.len(),
            ready: jobs.len(),
            ..CycleReport::default()
        };
        info!("{} records in table, {} due for publishing", report.total, report.ready);

        for job in &jobs {
            let span = info_span!("job", record = %job.identity, account = %job.account);
            match self.process_job(&token, job, headed).instrument(span).await {
                Ok(result) => {
                    if result.succeeded {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                    if result.write == WriteOutcome::Unrecoverable {
                        report.unrecoverable_writes += 1;
                        error!(
                            "Outcome for record '{}' could not be written back at all",
                            job.identity
                        );
                    }
                }
                Err(e) => {
                    // Contained: the remaining jobs still run, and the job
                    // stays observable through this log line.
                    error!("Record '{}' failed without a write-back: {}", job.identity, e);
                    report.failed += 1;
                    report.unrecoverable_writes += 1;
                }
            }
        }

        info!(
            "Cycle complete: {} succeeded, {} failed, {} write-backs lost",
            report.succeeded, report.failed, report.unrecoverable_writes
        );
        Ok(report)
    }

    async fn process_job(&self, token: &Token, job: &JobRecord, headed: bool) -> Result<JobResult> {
        let now_ms = Utc::now().timestamp_millis();
        let ran_at = Utc::now()
            .with_timezone(&self.config.timezone())
            .to_rfc3339_opts(SecondsFormat::Secs, false);
        let host = execution_host();

        // Snapshot the rescue key before anything derives or mutates
        // values, so relocation converges on the original record.
        let rescue = RescueKey::of(job);
        let reconciler = Reconciler::new(&self.client, &self.config.schema);

        // Only an absolute path to an existing file is accepted.
        let source = match &job.source_path {
            Some(path) if Path::new(path).is_absolute() => PathBuf::from(path),
            _ => {
                warn!("Record '{}': {}", job.identity, ERR_NOT_ABSOLUTE);
                let fields = failure_fields(
                    &self.config.schema,
                    &self.config.status,
                    ERR_NOT_ABSOLUTE,
                    &host,
                    &ran_at,
                );
                let write = reconciler.reconcile(token, &job.identity, &rescue, fields).await?;
                return Ok(JobResult {
                    succeeded: false,
                    write,
                });
            }
        };
        if !source.is_file() {
            warn!("Record '{}': {}", job.identity, ERR_NOT_A_FILE);
            let fields = failure_fields(
                &self.config.schema,
                &self.config.status,
                ERR_NOT_A_FILE,
                &host,
                &ran_at,
            );
            let write = reconciler.reconcile(token, &job.identity, &rescue, fields).await?;
            return Ok(JobResult {
                succeeded: false,
                write,
            });
        }

        // Stage the video and materialize its sidecar.
        let publish_ms = job.scheduled_at.unwrap_or(now_ms);
        let dest_name = self.staging.destination_name(&job.account, publish_ms, &source);
        let staged = self.staging.stage_video(&source, &dest_name)?;
        let meta = SidecarMeta {
            title: job.title.clone(),
            topics: job
                .topics
                .as_deref()
                .map(sidecar::normalize_topics)
                .unwrap_or_default(),
            product_link: job.product_link.clone(),
            product_short_title: job.product_short_title.clone(),
        };
        let sidecar_path = sidecar::write_sidecar(&staged, &meta)?;
        info!(
            "Staged {} with sidecar {}",
            staged.display(),
            sidecar_path.display()
        );

        // Run the workflow out-of-process and classify its transcript.
        let (exit_code, transcript) = self
            .run_workflow(&job.account, &staged, job.scheduled_at, now_ms, headed)
            .await?;
        let workflow_outcome = WorkflowOutcome::classify(exit_code, &transcript);

        let fields = outcome_fields(
            &workflow_outcome,
            &self.config.schema,
            &self.config.status,
            &host,
            &ran_at,
        );
        let write = reconciler.reconcile(token, &job.identity, &rescue, fields).await?;

        match (&workflow_outcome, &write) {
            (WorkflowOutcome::Success, WriteOutcome::Direct) => {
                info!("Record '{}' published and written back", job.identity)
            }
            (WorkflowOutcome::Success, WriteOutcome::Rescued { identity }) => {
                info!(
                    "Record '{}' published; written back via rescue as '{}'",
                    job.identity, identity
                )
            }
            (WorkflowOutcome::Success, WriteOutcome::Unrecoverable) => {
                warn!("Record '{}' published but the write-back failed", job.identity)
            }
            (outcome, write) => {
                warn!(
                    "Record '{}' failed ({}); write-back: {:?}",
                    job.identity,
                    outcome.error_text().unwrap_or("unknown"),
                    write
                )
            }
        }

        Ok(JobResult {
            succeeded: workflow_outcome.is_success(),
            write,
        })
    }

    /// Spawns the workflow runner as a child process, streaming its merged
    /// output into the log while capturing it as the transcript.
    async fn run_workflow(
        &self,
        account: &str,
        video: &Path,
        scheduled_at: Option<i64>,
        now_ms: i64,
        headed: bool,
    ) -> Result<(Option<i32>, String)> {
        let mut command = match &self.config.dispatch.runner_program {
            Some(program) => Command::new(program),
            None => {
                let exe = std::env::current_exe()
                    .map_err(|e| DispatchError::RunnerPath(e.to_string()))?;
                let mut command = Command::new(exe);
                command.arg("upload");
                command
            }
        };

        command
            .arg(video)
            .arg("--account")
            .arg(account)
            .arg("--publish-time")
            .arg(self.publish_time_arg(scheduled_at, now_ms));
        if headed {
            command.arg("--headed");
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Launching workflow runner for '{}'", account);
        let mut child = command.spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (mut transcript, err_output) =
            tokio::join!(collect_output(stdout), collect_output(stderr));
        transcript.push_str(&err_output);

        let status = child.wait().await?;
        info!("Workflow runner exited with {:?}", status.code());
        Ok((status.code(), transcript))
    }

    /// `0` for immediate publishing, otherwise the target local time in
    /// the runner's expected format. Times at-or-before now collapse to
    /// immediate.
    fn publish_time_arg(&self, scheduled_at: Option<i64>, now_ms: i64) -> String {
        match scheduled_at {
            Some(at) if at > now_ms => self
                .config
                .timezone()
                .timestamp_millis_opt(at)
                .single()
                .map(|dt| dt.format(SCHEDULE_TIME_FORMAT).to_string())
                .unwrap_or_else(|| "0".to_string()),
            _ => "0".to_string(),
        }
    }
}

/// Drains one output stream line by line, echoing into the log and
/// returning the captured text.
async fn collect_output<R>(reader: Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(reader) = reader else {
        return captured;
    };

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(target: "runner", "{}", line);
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_host_shape() {
        let host = execution_host();
        // hostname + '-' + 12 hex chars
        let (name, fingerprint) = host.rsplit_once('-').unwrap();
        assert!(!name.is_empty());
        assert_eq!(fingerprint.len(), 12);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_execution_host_stable() {
        assert_eq!(execution_host(), execution_host());
    }
}
