//! Config command handlers

use std::path::PathBuf;

use anyhow::Result;

use docflow_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
///
/// The access token is never printed.
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config = super::load_config(config_path)?;
    let not_set = || "(not set)".to_string();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "project_id": config.project_id,
                    "location": config.location,
                    "repository": config.repository,
                    "workspace": config.workspace,
                    "include_dir": config.include_dir,
                    "listen_addr": config.listen_addr,
                    "firestore_endpoint": config.firestore_endpoint,
                    "dataform_endpoint": config.dataform_endpoint,
                    "auth": config.auth,
                    "access_token_set": config.access_token.is_some(),
                    "request_timeout_secs": config.request_timeout_secs,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.workspace_ref());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!(
                "  project_id:         {}",
                config.project_id.clone().unwrap_or_else(not_set)
            );
            println!("  location:           {}", config.location);
            println!("  repository:         {}", config.repository);
            println!("  workspace:          {}", config.workspace);
            println!("  include_dir:        {}", config.include_dir);
            println!("  listen_addr:        {}", config.listen_addr);
            println!("  firestore_endpoint: {}", config.firestore_endpoint);
            println!("  dataform_endpoint:  {}", config.dataform_endpoint);
            println!("  auth:               {:?}", config.auth);
            println!(
                "  request_timeout:    {}",
                config
                    .request_timeout_secs
                    .map(|s| format!("{}s", s))
                    .unwrap_or_else(not_set)
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}
