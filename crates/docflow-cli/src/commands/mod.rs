//! Command handlers

pub mod commit;
pub mod config;
pub mod handle;
pub mod serve;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use docflow_core::{Config, DataformClient, EventHandler, FirestoreClient, TokenSource};

/// Load configuration, honouring --config
pub fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    Config::load_with_cli_override(config_path).context("Failed to load configuration")
}

/// Dataform client for the configured project
pub fn workspace_client(config: &Config) -> Result<DataformClient> {
    let tokens = TokenSource::from_config(config)?;
    DataformClient::new(config, tokens)
}

/// Build the handler with both clients sharing one token source
pub fn build_handler(config: &Config) -> Result<EventHandler> {
    let tokens = TokenSource::from_config(config)?;
    let store = FirestoreClient::new(config, tokens.clone())?;
    let repo = DataformClient::new(config, tokens)?;
    Ok(EventHandler::new(Arc::new(store), Arc::new(repo), config))
}
