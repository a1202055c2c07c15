//! Status command handler

use std::path::PathBuf;

use anyhow::Result;

use docflow_core::dataform;

use crate::output::Output;

/// Show whether the target workspace is clean
pub async fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::workspace_client(&config)?;
    let workspace = config.workspace_ref();

    let status = dataform::check_conflicts(&client, &workspace).await;
    output.print_status(&workspace, &status);

    Ok(())
}
