//! GitHub Actions runner plumbing.
//!
//! Inputs arrive as `INPUT_*` environment variables. State shared between
//! the pre and post phases goes through the runner's state file on the way
//! out and comes back as `STATE_*` variables in later phases. This mirrors
//! what the actions/core toolkit does on the JavaScript side.

use anyhow::{Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;

/// Look up an action input by its name as written in the workflow file.
///
/// The runner uppercases the name and replaces spaces with underscores;
/// hyphens are preserved. Empty values count as unset.
pub fn input(name: &str) -> Option<String> {
    let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Truthy parse for boolean inputs (the runner passes them as strings).
pub fn bool_input(name: &str) -> bool {
    matches!(input(name).as_deref(), Some("true" | "True" | "TRUE"))
}

/// Persist a key/value pair for the post phase via the runner state file.
pub fn save_state(name: &str, value: &str) -> Result<()> {
    let path = env::var("GITHUB_STATE").context("GITHUB_STATE is not set")?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open state file: {path}"))?;
    writeln!(file, "{name}={value}").context("Failed to write state file")?;

    Ok(())
}

/// Read back a value saved during the pre phase.
pub fn get_state(name: &str) -> Option<String> {
    env::var(format!("STATE_{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn input_applies_runner_name_mangling() {
        env::set_var("INPUT_TRACE-NAME", "  buildtrace  ");
        assert_eq!(input("trace-name"), Some("buildtrace".to_string()));
        env::remove_var("INPUT_TRACE-NAME");

        env::set_var("INPUT_MY_INPUT", "value");
        assert_eq!(input("my input"), Some("value".to_string()));
        env::remove_var("INPUT_MY_INPUT");
    }

    #[test]
    #[serial]
    fn empty_input_counts_as_unset() {
        env::set_var("INPUT_GITHUB-TOKEN", "");
        assert_eq!(input("github-token"), None);
        env::remove_var("INPUT_GITHUB-TOKEN");
    }

    #[test]
    #[serial]
    fn bool_input_is_strict() {
        env::set_var("INPUT_CREATE-ISSUE", "true");
        assert!(bool_input("create-issue"));
        env::set_var("INPUT_CREATE-ISSUE", "yes");
        assert!(!bool_input("create-issue"));
        env::remove_var("INPUT_CREATE-ISSUE");
        assert!(!bool_input("create-issue"));
    }

    #[test]
    #[serial]
    fn state_round_trips_through_the_runner_files() {
        let state_file = tempfile::NamedTempFile::new().unwrap();
        env::set_var("GITHUB_STATE", state_file.path());

        save_state("vcperf-path", r"C:\tools\vcperf.exe").unwrap();
        save_state("trace-name", "buildtrace").unwrap();

        let written = std::fs::read_to_string(state_file.path()).unwrap();
        assert_eq!(
            written,
            "vcperf-path=C:\\tools\\vcperf.exe\ntrace-name=buildtrace\n"
        );
        env::remove_var("GITHUB_STATE");

        // Later phases see saved state as STATE_* variables.
        env::set_var("STATE_vcperf-path", r"C:\tools\vcperf.exe");
        assert_eq!(
            get_state("vcperf-path"),
            Some(r"C:\tools\vcperf.exe".to_string())
        );
        env::remove_var("STATE_vcperf-path");
        assert_eq!(get_state("vcperf-path"), None);
    }
}
