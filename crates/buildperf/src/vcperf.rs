//! vcperf trace capture lifecycle.
//!
//! vcperf ships inside the Visual Studio MSVC toolset at a version-dependent
//! path, so the pre phase walks the tools tree to find it and persists the
//! discovered path for the post phase.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Default Visual Studio MSVC tools root searched for vcperf.exe.
pub const DEFAULT_MSVC_ROOT: &str =
    r"C:\Program Files\Microsoft Visual Studio\2022\Enterprise\VC\Tools\MSVC";

/// Find vcperf.exe under the MSVC tools tree.
pub fn locate(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == "vcperf.exe")
        .map(walkdir::DirEntry::into_path)
}

/// Start a trace session.
pub async fn start(vcperf: &Path, trace_name: &str) -> Result<()> {
    run(vcperf, &["/start", trace_name]).await
}

/// Stop the trace session and write the ETL file.
pub async fn stop(vcperf: &Path, trace_name: &str, etl_file: &str) -> Result<()> {
    run(vcperf, &["/stop", trace_name, etl_file]).await
}

async fn run(vcperf: &Path, args: &[&str]) -> Result<()> {
    debug!(vcperf = %vcperf.display(), ?args, "Running vcperf");

    let status = tokio::process::Command::new(vcperf)
        .args(args)
        .status()
        .await
        .with_context(|| format!("Failed to execute {}", vcperf.display()))?;

    if !status.success() {
        bail!("vcperf {} exited with {status}", args.join(" "));
    }

    Ok(())
}
