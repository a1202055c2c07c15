//! Workspace repository client
//!
//! Talks to the Dataform v1beta1 REST API: uncommitted file statuses,
//! file writes and commits on a single workspace.
//!
//! The free functions at the bottom wrap each call in the sentinel policy
//! the event handler relies on: failures are logged and turned into a
//! status or `false`, never returned as errors.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::TokenSource;
use crate::config::Config;
use crate::error::ClientResult;
use crate::http;
use crate::models::{CommitRequest, ConflictStatus, FileChange, FileWriteRequest, WorkspaceRef};

/// Operations on a Dataform workspace
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Uncommitted file changes in the workspace
    async fn fetch_file_git_statuses(&self, workspace: &WorkspaceRef)
        -> ClientResult<Vec<FileChange>>;

    async fn write_file(&self, request: &FileWriteRequest) -> ClientResult<()>;

    async fn commit(&self, request: &CommitRequest) -> ClientResult<()>;
}

/// Dataform REST client
pub struct DataformClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    location: String,
    tokens: TokenSource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileGitStatuses {
    #[serde(default)]
    uncommitted_file_changes: Vec<FileChange>,
}

#[derive(Debug, Serialize)]
struct WriteFileBody<'a> {
    path: &'a str,
    contents: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitAuthor<'a> {
    name: &'a str,
    email_address: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitBody<'a> {
    author: CommitAuthor<'a>,
    commit_message: &'a str,
    #[serde(skip_serializing_if = "no_paths")]
    paths: &'a [String],
}

fn no_paths(paths: &&[String]) -> bool {
    paths.is_empty()
}

impl DataformClient {
    pub fn new(config: &Config, tokens: TokenSource) -> anyhow::Result<Self> {
        Ok(Self {
            http: http::build_client(config)?,
            endpoint: config.dataform_endpoint.trim_end_matches('/').to_string(),
            project_id: config.require_project_id()?.to_string(),
            location: config.location.clone(),
            tokens,
        })
    }

    /// Full resource name of a workspace
    pub fn workspace_name(&self, workspace: &WorkspaceRef) -> String {
        format!(
            "projects/{}/locations/{}/repositories/{}/workspaces/{}",
            self.project_id, self.location, workspace.repository, workspace.workspace
        )
    }

    /// URL of a custom method on a workspace, e.g. `writeFile`
    pub fn method_url(&self, workspace: &WorkspaceRef, method: &str) -> String {
        format!(
            "{}/v1beta1/{}:{}",
            self.endpoint,
            self.workspace_name(workspace),
            method
        )
    }
}

#[async_trait]
impl WorkspaceRepository for DataformClient {
    async fn fetch_file_git_statuses(
        &self,
        workspace: &WorkspaceRef,
    ) -> ClientResult<Vec<FileChange>> {
        let url = self.method_url(workspace, "fetchFileGitStatuses");
        let request = self.tokens.authorize(self.http.get(&url)).await?;
        let response = http::send(&url, request).await?;

        let statuses: FileGitStatuses = http::json(&url, response).await?;
        Ok(statuses.uncommitted_file_changes)
    }

    async fn write_file(&self, request: &FileWriteRequest) -> ClientResult<()> {
        let url = self.method_url(&request.workspace, "writeFile");
        let body = WriteFileBody {
            path: &request.path,
            contents: BASE64.encode(&request.contents),
        };

        let builder = self.tokens.authorize(self.http.post(&url).json(&body)).await?;
        http::send(&url, builder).await?;
        Ok(())
    }

    async fn commit(&self, request: &CommitRequest) -> ClientResult<()> {
        let url = self.method_url(&request.workspace, "commit");
        let body = CommitBody {
            author: CommitAuthor {
                name: &request.author_name,
                email_address: &request.author_email,
            },
            commit_message: &request.message,
            paths: &request.paths,
        };

        let builder = self.tokens.authorize(self.http.post(&url).json(&body)).await?;
        http::send(&url, builder).await?;
        Ok(())
    }
}

/// Check the workspace for unresolved conflicts
///
/// Only [`ConflictStatus::Clean`] allows a write. A failed query yields
/// [`ConflictStatus::Unknown`].
pub async fn check_conflicts(
    repo: &dyn WorkspaceRepository,
    workspace: &WorkspaceRef,
) -> ConflictStatus {
    let changes = match repo.fetch_file_git_statuses(workspace).await {
        Ok(changes) => changes,
        Err(e) => {
            error!("Failed to fetch file statuses for {}: {}", workspace, e);
            return ConflictStatus::Unknown;
        }
    };

    let status = ConflictStatus::from_changes(&changes);
    match &status {
        ConflictStatus::Conflicted { paths } => warn!(
            "Repository {} has conflicts in uncommitted file changes: {}",
            workspace.repository,
            paths.join(", ")
        ),
        _ => info!(
            "Repository {} has no conflicts in uncommitted file changes",
            workspace.repository
        ),
    }
    status
}

/// Write a file into the workspace; `false` on any failure
pub async fn write_file(repo: &dyn WorkspaceRepository, request: &FileWriteRequest) -> bool {
    match repo.write_file(request).await {
        Ok(()) => {
            info!("File created: {}", request.path);
            true
        }
        Err(e) => {
            error!("Error creating file {}: {}", request.path, e);
            false
        }
    }
}

/// Commit pending workspace changes; `false` on any failure
pub async fn commit_changes(repo: &dyn WorkspaceRepository, request: &CommitRequest) -> bool {
    match repo.commit(request).await {
        Ok(()) => {
            info!(
                "Changes committed to {}: {}",
                request.workspace, request.message
            );
            true
        }
        Err(e) => {
            error!(
                "Error committing changes to repository {}: {}",
                request.workspace.repository, e
            );
            false
        }
    }
}
