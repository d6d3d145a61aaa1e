//! Run-scoped artifact publication.
//!
//! Talks to the Actions artifact service the same way the upload-artifact
//! toolkit does: create a file container for the run, PUT the file content
//! into it, then finalize the artifact with its total size.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Connection details for the artifact service, taken from the runner
/// environment.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the runtime API, trailing slash included.
    pub runtime_url: String,
    pub runtime_token: String,
    pub run_id: String,
    pub timeout_secs: u64,
}

impl StoreConfig {
    /// Build from the standard runner environment. Absent variables mean the
    /// process is not running inside a workflow job.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            runtime_url: std::env::var("ACTIONS_RUNTIME_URL").ok()?,
            runtime_token: std::env::var("ACTIONS_RUNTIME_TOKEN").ok()?,
            run_id: std::env::var("GITHUB_RUN_ID").ok()?,
            timeout_secs: 120,
        })
    }
}

/// A successfully uploaded artifact.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    pub name: String,
    pub size: u64,
}

#[derive(Serialize)]
struct CreateArtifactRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
}

#[derive(Deserialize)]
struct ArtifactContainer {
    #[serde(rename = "fileContainerResourceUrl")]
    file_container_resource_url: String,
}

/// Client for the run-scoped artifact store.
pub struct ArtifactStore {
    config: StoreConfig,
    client: reqwest::Client,
}

impl ArtifactStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    fn artifacts_url(&self) -> String {
        format!(
            "{}_apis/pipelines/workflows/{}/artifacts?api-version=6.0-preview",
            self.config.runtime_url, self.config.run_id
        )
    }

    /// Upload one file as a run-scoped artifact named `name`.
    pub async fn upload(&self, name: &str, file: &Path) -> Result<ArtifactHandle> {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read artifact file: {}", file.display()))?;
        let size = bytes.len() as u64;

        debug!(artifact = name, size, "Creating artifact container");
        let container: ArtifactContainer = self
            .client
            .post(self.artifacts_url())
            .bearer_auth(&self.config.runtime_token)
            .json(&CreateArtifactRequest {
                kind: "actions_storage",
                name,
            })
            .send()
            .await
            .context("Failed to create artifact container")?
            .error_for_status()
            .context("Artifact container request rejected")?
            .json()
            .await
            .context("Invalid artifact container response")?;

        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .context("Artifact file has no usable name")?;
        let item_url = format!(
            "{}?itemPath={}/{}",
            container.file_container_resource_url, name, file_name
        );
        let response = self
            .client
            .put(&item_url)
            .bearer_auth(&self.config.runtime_token)
            .header("Content-Type", "application/octet-stream")
            .header(
                "Content-Range",
                format!("bytes 0-{}/{size}", size.saturating_sub(1)),
            )
            .body(bytes)
            .send()
            .await
            .context("Failed to upload artifact content")?;
        if !response.status().is_success() {
            bail!("Artifact content upload failed with {}", response.status());
        }

        self.client
            .patch(format!("{}&artifactName={}", self.artifacts_url(), name))
            .bearer_auth(&self.config.runtime_token)
            .json(&serde_json::json!({ "size": size }))
            .send()
            .await
            .context("Failed to finalize artifact")?
            .error_for_status()
            .context("Artifact finalize rejected")?;

        info!(artifact = name, size, "Uploaded artifact");

        Ok(ArtifactHandle {
            name: name.to_string(),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> StoreConfig {
        StoreConfig {
            runtime_url: format!("{}/", server.uri()),
            runtime_token: "runtime-token".to_string(),
            run_id: "1234".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn upload_runs_the_three_step_flow() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/_apis/pipelines/workflows/1234/artifacts"))
            .and(query_param("api-version", "6.0-preview"))
            .and(header("authorization", "Bearer runtime-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "fileContainerResourceUrl": format!("{}/container/99", server.uri()),
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/container/99"))
            .and(query_param("itemPath", "build-trace-report/buildtrace.json"))
            .and(header("content-range", "bytes 0-12/13"))
            .and(body_string("{\"events\":[]}"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/_apis/pipelines/workflows/1234/artifacts"))
            .and(query_param("artifactName", "build-trace-report"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("buildtrace.json");
        std::fs::write(&report, "{\"events\":[]}").unwrap();

        let store = ArtifactStore::new(config_for(&server)).unwrap();
        let handle = store.upload("build-trace-report", &report).await.unwrap();

        assert_eq!(handle.name, "build-trace-report");
        assert_eq!(handle.size, 13);
    }

    #[tokio::test]
    async fn rejected_container_request_fails_the_upload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/_apis/pipelines/workflows/1234/artifacts"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("buildtrace.json");
        std::fs::write(&report, "{}").unwrap();

        let store = ArtifactStore::new(config_for(&server)).unwrap();
        let err = store
            .upload("build-trace-report", &report)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("container"));
    }
}
