//! Commit command handler
//!
//! Event handling never commits; this is the manual way to commit what the
//! handler wrote.

use std::path::PathBuf;

use anyhow::{bail, Result};

use docflow_core::{dataform, CommitRequest};

use crate::output::Output;

/// Commit pending changes in the target workspace
pub async fn run(
    config_path: Option<&PathBuf>,
    message: String,
    paths: Vec<String>,
    output: &Output,
) -> Result<()> {
    if message.trim().is_empty() {
        bail!("Commit message must not be empty");
    }

    let config = super::load_config(config_path)?;
    let client = super::workspace_client(&config)?;

    let request = CommitRequest {
        workspace: config.workspace_ref(),
        author_name: config.commit_author_name.clone(),
        author_email: config.commit_author_email.clone(),
        message,
        paths,
    };

    if !dataform::commit_changes(&client, &request).await {
        bail!("Commit to {} failed, see log for details", request.workspace);
    }

    output.success(&format!("Committed changes to {}", request.workspace));
    Ok(())
}
