//! Serve command handler

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::server;

/// Run the event endpoint
pub async fn run(config_path: Option<&PathBuf>, addr: Option<String>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let handler = super::build_handler(&config)?;
    let addr = addr.unwrap_or_else(|| config.listen_addr.clone());

    server::serve(&addr, Arc::new(handler)).await
}
