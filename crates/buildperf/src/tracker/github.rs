//! GitHub-backed issue tracker using octocrab.

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::models::IssueState;
use octocrab::{params, Octocrab};

use super::IssueTracker;

/// Talks to the GitHub issues API for one repository.
pub struct GitHubTracker {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubTracker {
    /// Create a new tracker client with the given token.
    pub fn new(token: &str, owner: &str, repo: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .context("Failed to create GitHub client")?;

        Ok(Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

#[async_trait]
impl IssueTracker for GitHubTracker {
    async fn find_open_issue(&self, label: &str) -> Result<Option<u64>> {
        let labels = vec![label.to_string()];
        let page = self
            .client
            .issues(&self.owner, &self.repo)
            .list()
            .state(params::State::Open)
            .labels(&labels)
            .per_page(1)
            .send()
            .await
            .context("Failed to list open tracking issues")?;

        Ok(page.items.first().map(|issue| issue.number))
    }

    async fn list_comment_bodies(&self, number: u64) -> Result<Vec<String>> {
        let page = self
            .client
            .issues(&self.owner, &self.repo)
            .list_comments(number)
            .per_page(100)
            .send()
            .await
            .context("Failed to list issue comments")?;

        // The count is derived from the full thread; a truncated page here
        // would restart the loop from iteration 1.
        let comments = self
            .client
            .all_pages(page)
            .await
            .context("Failed to page through issue comments")?;

        Ok(comments.into_iter().filter_map(|c| c.body).collect())
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
        assignees: &[String],
    ) -> Result<u64> {
        tracing::debug!(
            owner = %self.owner,
            repo = %self.repo,
            "Creating tracking issue"
        );

        let issue = self
            .client
            .issues(&self.owner, &self.repo)
            .create(title)
            .body(body)
            .send()
            .await
            .context("Failed to create tracking issue")?;

        // Label and assignee are best-effort metadata; the loop works
        // without them.
        if let Err(e) = self
            .client
            .issues(&self.owner, &self.repo)
            .add_labels(issue.number, labels)
            .await
        {
            tracing::warn!(error = %e, "Failed to add labels to tracking issue");
        }

        if !assignees.is_empty() {
            let assignees: Vec<&str> = assignees.iter().map(String::as_str).collect();
            if let Err(e) = self
                .client
                .issues(&self.owner, &self.repo)
                .add_assignees(issue.number, &assignees)
                .await
            {
                tracing::warn!(error = %e, "Failed to assign reviewer to tracking issue");
            }
        }

        Ok(issue.number)
    }

    async fn create_comment(&self, number: u64, body: &str) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .create_comment(number, body)
            .await
            .context("Failed to create issue comment")?;

        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .update(number)
            .state(IssueState::Closed)
            .send()
            .await
            .context("Failed to close tracking issue")?;

        Ok(())
    }
}
