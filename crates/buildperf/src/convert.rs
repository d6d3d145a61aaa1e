//! ETL to JSON conversion via the BuildInsights converter.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Location of the converter inside the repository checkout.
pub fn converter_path(workspace: &Path) -> PathBuf {
    workspace
        .join(".github")
        .join("tools")
        .join("BuildInsights.EtlToJson.exe")
}

/// Convert `etl_file` into `json_file`, returning the report size in bytes.
pub async fn convert(tool: &Path, etl_file: &Path, json_file: &Path) -> Result<u64> {
    let status = tokio::process::Command::new(tool)
        .arg(etl_file)
        .arg(json_file)
        .status()
        .await
        .with_context(|| format!("Failed to execute {}", tool.display()))?;

    if !status.success() {
        bail!("ETL conversion exited with {status}");
    }

    let meta = std::fs::metadata(json_file)
        .with_context(|| format!("JSON report was not created: {}", json_file.display()))?;

    Ok(meta.len())
}

/// Report size in megabytes with two decimals, the way the workflow log
/// reported it historically.
pub fn size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converter_path_is_under_github_tools() {
        let path = converter_path(Path::new("/work/checkout"));
        assert!(path.ends_with(
            Path::new(".github")
                .join("tools")
                .join("BuildInsights.EtlToJson.exe")
        ));
    }

    #[test]
    fn size_formatting_matches_workflow_log() {
        assert_eq!(size_mb(0), "0.00");
        assert_eq!(size_mb(1024 * 1024), "1.00");
        assert_eq!(size_mb(5_505_024), "5.25");
    }
}
