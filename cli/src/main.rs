use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use clipship::dispatch::DispatchError;
use clipship::workflow::{self, PublishTime, UploadOptions};
use clipship::{Config, Dispatcher, StoreConfig, StoreError};

/// Exit codes for fatal dispatch-cycle failures; per-job failures do not
/// change the dispatcher's exit code.
const EXIT_AUTH_FAILED: i32 = 2;
const EXIT_FETCH_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "clipship", version, about = "Scheduled video publishing for creator platforms")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the record store once and run every due publish job.
    Dispatch {
        /// Run workflow browsers with a visible window.
        #[arg(long)]
        headed: bool,
    },
    /// Create or validate the stored credential for an account.
    Setup {
        /// Account alias; selects the credential file.
        account: String,
        /// Use a visible browser window for the validity check.
        #[arg(long)]
        headed: bool,
    },
    /// Publish a single video.
    Upload {
        /// Path to the video file.
        video: PathBuf,
        /// Account alias; selects the credential file.
        #[arg(long)]
        account: String,
        /// Video title; defaults to the sidecar's, then the file stem.
        #[arg(short = 't', long)]
        title: Option<String>,
        /// Comma-separated topic tags.
        #[arg(long)]
        tags: Option<String>,
        /// 0 = publish immediately, or a local time as YYYY-MM-DD HH:MM.
        #[arg(long, default_value = "0")]
        publish_time: String,
        /// Product link to attach.
        #[arg(long)]
        product_url: Option<String>,
        /// Product short title (10 characters max).
        #[arg(long)]
        product_title: Option<String>,
        /// Cover image path.
        #[arg(long)]
        thumbnail: Option<PathBuf>,
        /// Run the browser with a visible window.
        #[arg(long)]
        headed: bool,
        /// Skip the credential probe before uploading.
        #[arg(long)]
        skip_cookie_check: bool,
        /// Metadata sidecar path; defaults to the video's .txt neighbor.
        #[arg(long)]
        meta: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    match cli.command {
        Command::Dispatch { headed } => dispatch(config, headed).await,
        Command::Setup { account, headed } => setup(config, &account, headed).await,
        Command::Upload {
            video,
            account,
            title,
            tags,
            publish_time,
            product_url,
            product_title,
            thumbnail,
            headed,
            skip_cookie_check,
            meta,
        } => {
            let publish_time = match PublishTime::parse(&publish_time) {
                Ok(publish_time) => publish_time,
                Err(e) => {
                    error!("{}", e);
                    return 1;
                }
            };
            let opts = UploadOptions {
                account,
                video,
                title,
                tags,
                publish_time,
                product_link: product_url,
                product_short_title: product_title,
                thumbnail,
                headed,
                skip_cookie_check,
                sidecar: meta,
            };
            upload(config, opts).await
        }
    }
}

async fn dispatch(config: Config, headed: bool) -> i32 {
    info!("clipship dispatcher v{}", env!("CARGO_PKG_VERSION"));

    let store = match StoreConfig::from_env() {
        Ok(store) => store,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let headed = headed || config.dispatch.headed;
    info!(
        "Browser mode: {}",
        if headed { "visual (headed)" } else { "headless" }
    );

    let dispatcher = match Dispatcher::new(config, store) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    match dispatcher.run(headed).await {
        Ok(report) => {
            info!(
                "Done: {}/{} ready jobs succeeded",
                report.succeeded, report.ready
            );
            0
        }
        Err(DispatchError::Store(StoreError::Auth(reason))) => {
            error!("Token exchange failed: {}", reason);
            EXIT_AUTH_FAILED
        }
        Err(DispatchError::Store(StoreError::Fetch(reason))) => {
            error!("Reading the job table failed: {}", reason);
            EXIT_FETCH_FAILED
        }
        Err(e) => {
            error!("Dispatch cycle failed: {}", e);
            1
        }
    }
}

async fn setup(config: Config, account: &str, headed: bool) -> i32 {
    match workflow::run_setup(&config, account, headed).await {
        Ok(true) => {
            info!("Credential for '{}' is valid", account);
            0
        }
        Ok(false) => {
            warn!("Credential for '{}' is missing or invalid", account);
            1
        }
        Err(e) => {
            error!("Setup failed: {}", e);
            1
        }
    }
}

async fn upload(config: Config, opts: UploadOptions) -> i32 {
    let verdict = workflow::run_upload(&config, opts).await;
    verdict.emit();
    verdict.exit_code()
}
