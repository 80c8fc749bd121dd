//! Runtime configuration, constructed once at startup from the environment
//! and passed by reference everywhere else. No module carries mutable global
//! state.

pub mod schema;

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;

use crate::error::ConfigError;

pub use schema::{FieldSchema, StatusNames};

/// Prefix shared by every environment variable this crate reads.
const ENV_PREFIX: &str = "CLIPSHIP_";

fn env_string(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    env_string(name).ok_or_else(|| ConfigError::MissingEnv {
        name: format!("{}{}", ENV_PREFIX, name),
    })
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_string(name) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"),
        None => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env_string(name) {
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
            name: format!("{}{}", ENV_PREFIX, name),
            reason: format!("cannot parse '{}'", v),
        }),
        None => Ok(default),
    }
}

/// Connection settings for the remote record store.
///
/// Application credentials are required; there are deliberately no in-source
/// defaults for them.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    /// Identifies the bitable app containing the job table.
    pub app_token: String,
    pub table_id: String,
    pub view_id: Option<String>,
    pub page_size: u32,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_string("BASE_URL").unwrap_or_else(|| "https://open.feishu.cn".to_string()),
            app_id: require_env("APP_ID")?,
            app_secret: require_env("APP_SECRET")?,
            app_token: require_env("APP_TOKEN")?,
            table_id: require_env("TABLE_ID")?,
            view_id: env_string("VIEW_ID"),
            page_size: 500,
        })
    }
}

/// Filesystem layout. Everything lives under `root` unless overridden.
#[derive(Debug, Clone)]
pub struct Directories {
    pub root: PathBuf,
    /// Staged copies of source videos plus their metadata sidecars.
    pub videos: PathBuf,
    /// Per-account diagnostic artifacts from aborted workflows.
    pub runs: PathBuf,
    /// Per-account persisted credential files.
    pub cookies: PathBuf,
}

impl Directories {
    fn from_env() -> Self {
        let root = env_string("ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        Self {
            videos: env_string("VIDEOS_DIR").map(PathBuf::from).unwrap_or_else(|| root.join("videos")),
            runs: env_string("RUNS_DIR").map(PathBuf::from).unwrap_or_else(|| root.join("runs")),
            cookies: env_string("COOKIES_DIR").map(PathBuf::from).unwrap_or_else(|| root.join("cookies")),
            root,
        }
    }
}

impl Default for Directories {
    fn default() -> Self {
        let root = PathBuf::from(".");
        Self {
            videos: root.join("videos"),
            runs: root.join("runs"),
            cookies: root.join("cookies"),
            root,
        }
    }
}

/// Bounds for every wait inside the publish workflow. The platform only
/// signals state changes through the page, so all of these are polls.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Attempts to reach one of the post-upload composer surfaces.
    pub composer_attempts: u32,
    pub composer_interval: Duration,
    /// Wall-clock bound on the binary upload itself.
    pub upload_timeout: Duration,
    pub upload_interval: Duration,
    /// Attempts to observe the post-publish navigation after clicking publish.
    pub publish_attempts: u32,
    pub publish_interval: Duration,
    /// Visibility bound for platform dialogs (product editor, cover picker).
    pub dialog_timeout: Duration,
    pub dialog_interval: Duration,
    /// Wall-clock bound on the manual out-of-band login.
    pub login_timeout: Duration,
    pub login_interval: Duration,
    /// How long the credential probe waits before declaring cookies invalid.
    pub probe_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            composer_attempts: 60,
            composer_interval: Duration::from_millis(1500),
            upload_timeout: Duration::from_secs(600),
            upload_interval: Duration::from_secs(2),
            publish_attempts: 120,
            publish_interval: Duration::from_millis(1000),
            dialog_timeout: Duration::from_secs(15),
            dialog_interval: Duration::from_millis(500),
            login_timeout: Duration::from_secs(300),
            login_interval: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl PollPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            upload_timeout: Duration::from_secs(env_parse(
                "UPLOAD_TIMEOUT_SECS",
                defaults.upload_timeout.as_secs(),
            )?),
            login_timeout: Duration::from_secs(env_parse(
                "LOGIN_TIMEOUT_SECS",
                defaults.login_timeout.as_secs(),
            )?),
            ..defaults
        })
    }
}

/// Settings for the browser-driven workflow runner.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Run the browser without a visible window. CLI flags override this.
    pub headless: bool,
    /// Skip the lightweight credential probe before uploading.
    pub skip_cookie_check: bool,
    pub chrome_binary: Option<PathBuf>,
    pub chromedriver: PathBuf,
    pub title_max_chars: usize,
    pub short_title_max_chars: usize,
    pub poll: PollPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            headless: true,
            skip_cookie_check: false,
            chrome_binary: None,
            chromedriver: PathBuf::from("chromedriver"),
            title_max_chars: 30,
            short_title_max_chars: 10,
            poll: PollPolicy::default(),
        }
    }
}

impl WorkflowConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            headless: env_bool("HEADLESS", defaults.headless),
            skip_cookie_check: env_bool("SKIP_COOKIE_CHECK", defaults.skip_cookie_check),
            chrome_binary: env_string("CHROME_BINARY").map(PathBuf::from),
            chromedriver: env_string("CHROMEDRIVER")
                .map(PathBuf::from)
                .unwrap_or(defaults.chromedriver),
            poll: PollPolicy::from_env()?,
            ..defaults
        })
    }
}

/// Settings for the dispatch cycle.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Program to run per job instead of re-invoking the current executable's
    /// `upload` subcommand. Mostly a test seam.
    pub runner_program: Option<PathBuf>,
    /// Run workflow browsers headed during dispatch.
    pub headed: bool,
    /// Offset of the publication timezone, in hours east of UTC.
    pub tz_offset_hours: i32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            runner_program: None,
            headed: false,
            tz_offset_hours: 8,
        }
    }
}

impl DispatchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            runner_program: env_string("RUNNER").map(PathBuf::from),
            headed: env_bool("DISPATCH_HEADED", defaults.headed),
            tz_offset_hours: env_parse("TZ_OFFSET_HOURS", defaults.tz_offset_hours)?,
        })
    }
}

/// The full runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub dirs: Directories,
    pub workflow: WorkflowConfig,
    pub dispatch: DispatchConfig,
    pub schema: FieldSchema,
    pub status: StatusNames,
}

impl Config {
    /// Builds the configuration from `CLIPSHIP_*` environment variables,
    /// validating the field schema once. Store credentials are read
    /// separately via [`StoreConfig::from_env`] because only the dispatcher
    /// needs them.
    pub fn from_env() -> Result<Self, ConfigError> {
        let schema = match env_string("FIELD_SCHEMA") {
            Some(json) => FieldSchema::from_json(&json)?,
            None => FieldSchema::default(),
        };
        schema.validate()?;

        let status = StatusNames {
            success: env_string("STATUS_SUCCESS").unwrap_or_else(|| StatusNames::default().success),
            failure: env_string("STATUS_FAILURE").unwrap_or_else(|| StatusNames::default().failure),
        };

        Ok(Self {
            dirs: Directories::from_env(),
            workflow: WorkflowConfig::from_env()?,
            dispatch: DispatchConfig::from_env()?,
            schema,
            status,
        })
    }

    /// The fixed publication timezone (UTC+8 unless overridden).
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.dispatch.tz_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(8 * 3600).expect("static offset"))
    }
}
