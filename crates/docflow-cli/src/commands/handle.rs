//! Handle command handler

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::output::Output;

/// Run one notification through the handler
///
/// Like the endpoint, a failed invocation is reported, not returned as an
/// error.
pub async fn run(config_path: Option<&PathBuf>, file: &str, output: &Output) -> Result<()> {
    let config = super::load_config(config_path)?;
    let handler = super::build_handler(&config)?;

    let body = read_payload(file)?;
    let outcome = handler.handle_payload(&body).await;
    output.print_outcome(&outcome);

    Ok(())
}

fn read_payload(file: &str) -> Result<Vec<u8>> {
    if file == "-" {
        let mut body = Vec::new();
        std::io::stdin()
            .read_to_end(&mut body)
            .context("Failed to read notification from stdin")?;
        return Ok(body);
    }

    std::fs::read(file).with_context(|| format!("Failed to read notification file: {}", file))
}
