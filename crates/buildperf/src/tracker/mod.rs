//! Iteration tracking state machine.
//!
//! Drives a bounded conversation with the automated reviewer through a
//! single labeled tracking issue. Each successful trace capture invokes the
//! tracker exactly once; the tracker resolves the open issue, derives the
//! iteration number from its comment thread and performs exactly one
//! transition: create the issue, append a progress comment, or close the
//! loop once the iteration budget is exhausted.
//!
//! The issue thread is the only durable state. Every transition is visible
//! as a comment, which keeps the loop auditable and gives the reviewer full
//! context without a side channel.

pub mod decide;
pub mod github;
pub mod templates;

pub use decide::{
    decide, is_iteration_comment, iteration_count, Action, TrackingIssue, ITERATION_MARKER,
    MAX_ITERATIONS, TRACKING_LABEL,
};
pub use github::GitHubTracker;
pub use templates::ISSUE_TITLE;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Per-run inputs handed over by the capture pipeline. Supplied fresh on
/// every invocation, never persisted.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub owner: String,
    pub repo: String,
    pub run_id: String,
    pub run_url: String,
    pub artifact_name: String,
    pub artifact_url: String,
    pub commit_sha: String,
    pub ref_name: String,
    /// Reviewer to auto-assign on issue creation, if configured.
    pub reviewer: Option<String>,
}

/// Failure classes for one tracker invocation. All of them degrade to a
/// single warning at the pipeline boundary; none of them fail the hosting
/// build job.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Missing credential or disabled flag: skip without touching the API.
    #[error("issue tracking skipped: {0}")]
    Precondition(String),
    /// Read-side failure: abort before any write, the state is unconfirmed.
    #[error("failed to query tracker state: {0}")]
    Query(#[source] anyhow::Error),
    /// Write-side failure: the next capture re-derives state and retries.
    #[error("tracker action failed: {0}")]
    Action(#[source] anyhow::Error),
}

/// Abstract issue-tracker surface the state machine runs against.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Number of the single open issue carrying `label`, if any.
    async fn find_open_issue(&self, label: &str) -> Result<Option<u64>>;
    /// Every comment body on the issue, oldest first, fully paginated.
    async fn list_comment_bodies(&self, number: u64) -> Result<Vec<String>>;
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
        assignees: &[String],
    ) -> Result<u64>;
    async fn create_comment(&self, number: u64, body: &str) -> Result<()>;
    async fn close_issue(&self, number: u64) -> Result<()>;
}

/// Gate, construct and run one tracker invocation against GitHub.
///
/// Returns the performed action, or the reason the invocation was skipped
/// or degraded. The caller logs either outcome and moves on.
pub async fn run(
    create_issue: bool,
    token: Option<&str>,
    ctx: &RunContext,
) -> Result<Action, TrackerError> {
    if !create_issue {
        return Err(TrackerError::Precondition(
            "create-issue input is disabled".to_string(),
        ));
    }

    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TrackerError::Precondition("github-token input is not set".to_string()))?;

    // Client construction happens before any read; treat a failure here like
    // a failed query, since no state has been confirmed yet.
    let tracker =
        GitHubTracker::new(token, &ctx.owner, &ctx.repo).map_err(TrackerError::Query)?;

    track_iteration(&tracker, ctx).await
}

/// One full invocation of the state machine: resolve the open issue, derive
/// the iteration number from its comment thread, pick a transition and
/// execute it.
///
/// A failed resolve short-circuits before any write. Falling through to
/// issue creation on an unconfirmed lookup could open a duplicate issue.
pub async fn track_iteration(
    tracker: &dyn IssueTracker,
    ctx: &RunContext,
) -> Result<Action, TrackerError> {
    let issue = resolve_issue(tracker).await.map_err(TrackerError::Query)?;
    let action = decide(issue.as_ref(), MAX_ITERATIONS);
    execute(tracker, ctx, action)
        .await
        .map_err(TrackerError::Action)?;

    Ok(action)
}

async fn resolve_issue(tracker: &dyn IssueTracker) -> Result<Option<TrackingIssue>> {
    let Some(number) = tracker.find_open_issue(TRACKING_LABEL).await? else {
        return Ok(None);
    };
    let comments = tracker.list_comment_bodies(number).await?;

    Ok(Some(TrackingIssue { number, comments }))
}

async fn execute(tracker: &dyn IssueTracker, ctx: &RunContext, action: Action) -> Result<()> {
    match action {
        Action::Create => {
            let body = templates::issue_body(ctx, MAX_ITERATIONS)?;
            let labels = vec![TRACKING_LABEL.to_string()];
            let assignees: Vec<String> = ctx.reviewer.iter().cloned().collect();
            let number = tracker
                .create_issue(ISSUE_TITLE, &body, &labels, &assignees)
                .await?;
            info!(issue = number, "Opened tracking issue");
        }
        Action::Comment { number, iteration } => {
            let body = templates::iteration_comment(ctx, iteration, MAX_ITERATIONS)?;
            tracker.create_comment(number, &body).await?;
            info!(
                issue = number,
                iteration,
                max = MAX_ITERATIONS,
                "Recorded optimization iteration"
            );
        }
        Action::Close { number, .. } => {
            // Terminal comment first, then the state flip. Not transactional:
            // if the close call fails, the next invocation still derives a
            // count over budget and retries the same transition.
            let body = templates::closing_comment(ctx, MAX_ITERATIONS)?;
            tracker.create_comment(number, &body).await?;
            tracker.close_issue(number).await?;
            info!(issue = number, "Iteration budget exhausted, closed tracking issue");
        }
    }

    Ok(())
}
