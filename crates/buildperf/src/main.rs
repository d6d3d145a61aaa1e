//! Build performance feedback action.
//!
//! `pre` starts a vcperf trace before the build; `post` stops it, converts
//! the ETL to a JSON report, publishes the report as a run artifact and
//! advances the optimization tracking issue. Neither phase ever fails the
//! hosting job: every error degrades to a workflow warning, because trace
//! bookkeeping must never block a build whose job is compiling code.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use buildperf::{actions, artifact, convert, tracker, vcperf};

const DEFAULT_TRACE_NAME: &str = "buildtrace";
const DEFAULT_ARTIFACT_NAME: &str = "build-trace-report";

/// Capture MSVC build traces and drive the performance optimization loop
#[derive(Parser)]
#[command(name = "buildperf")]
#[command(about = "Capture MSVC build traces and drive the performance optimization loop")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the vcperf trace session (runs before the build)
    Pre {
        /// Root of the MSVC tools installation searched for vcperf.exe
        #[arg(long, default_value = vcperf::DEFAULT_MSVC_ROOT)]
        msvc_root: PathBuf,
    },
    /// Stop the trace, publish the report and advance the tracking issue
    Post {
        /// Repository checkout containing the ETL converter
        #[arg(long, env = "GITHUB_WORKSPACE")]
        workspace: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Pre { msvc_root } => {
            if let Err(err) = run_pre(&msvc_root).await {
                warn!(error = ?err, "Failed to start vcperf trace");
            }
        }
        Commands::Post { workspace } => {
            if let Err(err) = run_post(workspace).await {
                warn!(error = ?err, "Failed to stop vcperf trace or publish the report");
            }
        }
    }

    Ok(())
}

async fn run_pre(msvc_root: &Path) -> Result<()> {
    let trace_name =
        actions::input("trace-name").unwrap_or_else(|| DEFAULT_TRACE_NAME.to_string());

    let Some(vcperf) = vcperf::locate(msvc_root) else {
        warn!("vcperf not found, skipping trace");
        return Ok(());
    };
    info!(vcperf = %vcperf.display(), "Found vcperf");

    // The post phase needs the same binary; hand the path over through the
    // runner state slot.
    actions::save_state("vcperf-path", &vcperf.to_string_lossy())?;

    vcperf::start(&vcperf, &trace_name).await?;
    info!(trace = %trace_name, "Started vcperf trace");

    Ok(())
}

async fn run_post(workspace: Option<PathBuf>) -> Result<()> {
    let trace_name =
        actions::input("trace-name").unwrap_or_else(|| DEFAULT_TRACE_NAME.to_string());
    let artifact_name =
        actions::input("artifact-name").unwrap_or_else(|| DEFAULT_ARTIFACT_NAME.to_string());

    let Some(vcperf_path) = actions::get_state("vcperf-path") else {
        warn!("vcperf was not started, skipping trace stop");
        return Ok(());
    };

    let etl_file = format!("{trace_name}.etl");
    vcperf::stop(Path::new(&vcperf_path), &trace_name, &etl_file).await?;
    info!(etl = %etl_file, "Stopped vcperf trace");

    if !Path::new(&etl_file).exists() {
        warn!(etl = %etl_file, "ETL file not found, skipping conversion");
        return Ok(());
    }

    let workspace = workspace.unwrap_or_else(|| PathBuf::from("."));
    let tool = convert::converter_path(&workspace);
    if !tool.exists() {
        warn!(tool = %tool.display(), "ETL converter not found, skipping conversion");
        return Ok(());
    }

    let json_file = PathBuf::from(format!("{trace_name}.json"));
    let size = convert::convert(&tool, Path::new(&etl_file), &json_file).await?;
    info!(
        report = %json_file.display(),
        size_mb = %convert::size_mb(size),
        "Created JSON report"
    );

    let Some(store_config) = artifact::StoreConfig::from_env() else {
        warn!("Artifact service environment not available, skipping upload");
        return Ok(());
    };
    let store = artifact::ArtifactStore::new(store_config)?;
    let handle = store.upload(&artifact_name, &json_file).await?;

    // Capture succeeded end to end; hand over to the iteration tracker.
    let ctx = run_context(&handle)?;
    let create_issue = actions::bool_input("create-issue");
    let token = actions::input("github-token");
    match tracker::run(create_issue, token.as_deref(), &ctx).await {
        Ok(action) => info!(?action, "Tracking issue advanced"),
        Err(tracker::TrackerError::Precondition(reason)) => {
            warn!(%reason, "Issue tracking skipped");
        }
        Err(err) => warn!(error = ?err, "Issue tracking degraded"),
    }

    Ok(())
}

/// Assemble the per-run tracker input from the workflow environment.
fn run_context(handle: &artifact::ArtifactHandle) -> Result<tracker::RunContext> {
    let repository = std::env::var("GITHUB_REPOSITORY").context("GITHUB_REPOSITORY is not set")?;
    let (owner, repo) = repository
        .split_once('/')
        .context("GITHUB_REPOSITORY is not in owner/repo form")?;
    let server =
        std::env::var("GITHUB_SERVER_URL").unwrap_or_else(|_| "https://github.com".to_string());
    let run_id = std::env::var("GITHUB_RUN_ID").context("GITHUB_RUN_ID is not set")?;
    let run_url = format!("{server}/{repository}/actions/runs/{run_id}");

    Ok(tracker::RunContext {
        owner: owner.to_string(),
        repo: repo.to_string(),
        run_id,
        artifact_url: format!("{run_url}#artifacts"),
        run_url,
        artifact_name: handle.name.clone(),
        commit_sha: std::env::var("GITHUB_SHA").unwrap_or_default(),
        ref_name: std::env::var("GITHUB_REF_NAME").unwrap_or_default(),
        reviewer: actions::input("reviewer"),
    })
}
