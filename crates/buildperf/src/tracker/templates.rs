//! Issue and comment body rendering for the tracking issue.
//!
//! Templates are compiled in rather than loaded from disk; the bodies ship
//! with the binary and have no per-deployment variation.

use anyhow::{Context, Result};
use chrono::Utc;
use handlebars::Handlebars;
use serde::Serialize;

use super::decide::ITERATION_MARKER;
use super::RunContext;

/// Title of the tracking issue.
pub const ISSUE_TITLE: &str = "Build Performance Optimization";

const ISSUE_BODY_TEMPLATE: &str = "\
A new MSVC build trace is available for analysis.

| | |
|---|---|
| Workflow run | {{run_url}} |
| Trace artifact | [`{{artifact_name}}`]({{artifact_url}}) |
| Commit | `{{commit_sha}}` |
| Branch | `{{ref_name}}` |
| Captured | {{timestamp}} |

Download the `{{artifact_name}}` artifact from the workflow run, analyze the
build time report and apply optimizations for the biggest offenders
(precompiled headers, unity builds, template instantiation, include hygiene).

Each later trace capture appends an iteration comment to this issue. The
loop closes automatically after {{max_iterations}} iterations.
";

const ITERATION_COMMENT_TEMPLATE: &str = "\
{{{marker}}}
### Iteration {{iteration}}/{{max_iterations}}

A fresh build trace was captured after the latest optimizations.

| | |
|---|---|
| Workflow run | {{run_url}} |
| Trace artifact | [`{{artifact_name}}`]({{artifact_url}}) |
| Commit | `{{commit_sha}}` |
| Branch | `{{ref_name}}` |
| Captured | {{timestamp}} |

Compare this report against the previous iteration and keep optimizing the
top offenders.
";

const CLOSING_COMMENT_TEMPLATE: &str = "\
### Maximum iterations reached

This optimization loop has completed {{max_iterations}} iterations and is
being closed automatically. Open a fresh round of build performance work by
letting the next trace capture create a new tracking issue.

Final workflow run: {{run_url}}
";

/// Variables available to all three templates.
#[derive(Debug, Serialize)]
struct BodyContext<'a> {
    run_url: &'a str,
    artifact_url: &'a str,
    artifact_name: &'a str,
    commit_sha: &'a str,
    ref_name: &'a str,
    iteration: u64,
    max_iterations: u64,
    marker: &'a str,
    timestamp: String,
}

impl<'a> BodyContext<'a> {
    fn new(ctx: &'a RunContext, iteration: u64, max_iterations: u64) -> Self {
        Self {
            run_url: &ctx.run_url,
            artifact_url: &ctx.artifact_url,
            artifact_name: &ctx.artifact_name,
            commit_sha: &ctx.commit_sha,
            ref_name: &ctx.ref_name,
            iteration,
            max_iterations,
            marker: ITERATION_MARKER,
            timestamp: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

fn render(template: &str, context: &BodyContext) -> Result<String> {
    Handlebars::new()
        .render_template(template, context)
        .context("Failed to render tracking issue template")
}

/// Body seeding a freshly created tracking issue.
pub fn issue_body(ctx: &RunContext, max_iterations: u64) -> Result<String> {
    render(ISSUE_BODY_TEMPLATE, &BodyContext::new(ctx, 1, max_iterations))
}

/// Progress comment for iteration `iteration`. Carries the marker that the
/// counter scans for.
pub fn iteration_comment(ctx: &RunContext, iteration: u64, max_iterations: u64) -> Result<String> {
    render(
        ITERATION_COMMENT_TEMPLATE,
        &BodyContext::new(ctx, iteration, max_iterations),
    )
}

/// Terminal comment posted right before the issue is closed. Must not carry
/// the marker: a retried close would otherwise inflate future counts.
pub fn closing_comment(ctx: &RunContext, max_iterations: u64) -> Result<String> {
    render(
        CLOSING_COMMENT_TEMPLATE,
        &BodyContext::new(ctx, max_iterations, max_iterations),
    )
}
