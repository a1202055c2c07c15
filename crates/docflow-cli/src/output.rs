//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use docflow_core::{ConflictStatus, HandleOutcome, WorkspaceRef};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print how a handled event ended
    pub fn print_outcome(&self, outcome: &HandleOutcome) {
        match self.format {
            OutputFormat::Human => match outcome {
                HandleOutcome::Written { path } => println!("✓ Wrote {}", path),
                HandleOutcome::Conflicted => {
                    println!("Workspace has conflicts or is unavailable, nothing written")
                }
                HandleOutcome::WriteFailed { path } => println!("✗ Failed to write {}", path),
                HandleOutcome::Failed(reason) => println!("✗ {}", reason),
            },
            OutputFormat::Json => println!("{}", outcome_json(outcome)),
            OutputFormat::Quiet => {
                if let HandleOutcome::Written { path } = outcome {
                    println!("{}", path);
                }
            }
        }
    }

    /// Print the conflict status of a workspace
    pub fn print_status(&self, workspace: &WorkspaceRef, status: &ConflictStatus) {
        match self.format {
            OutputFormat::Human => {
                println!("Workspace: {}", workspace);
                match status {
                    ConflictStatus::Clean => println!("Status:    clean"),
                    ConflictStatus::Conflicted { paths } => {
                        println!("Status:    {} conflicted file(s)", paths.len());
                        for path in paths {
                            println!("  {}", path);
                        }
                    }
                    ConflictStatus::Unknown => println!("Status:    unknown (query failed)"),
                }
            }
            OutputFormat::Json => println!("{}", status_json(workspace, status)),
            OutputFormat::Quiet => println!("{}", status_label(status)),
        }
    }

    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn status_label(status: &ConflictStatus) -> &'static str {
    match status {
        ConflictStatus::Clean => "clean",
        ConflictStatus::Conflicted { .. } => "conflicted",
        ConflictStatus::Unknown => "unknown",
    }
}

fn status_json(workspace: &WorkspaceRef, status: &ConflictStatus) -> serde_json::Value {
    let conflicts = match status {
        ConflictStatus::Conflicted { paths } => paths.clone(),
        _ => Vec::new(),
    };
    serde_json::json!({
        "repository": workspace.repository,
        "workspace": workspace.workspace,
        "status": status_label(status),
        "conflicts": conflicts,
    })
}

fn outcome_json(outcome: &HandleOutcome) -> serde_json::Value {
    match outcome {
        HandleOutcome::Written { path } => serde_json::json!({"outcome": "written", "path": path}),
        HandleOutcome::Conflicted => serde_json::json!({"outcome": "conflicted"}),
        HandleOutcome::WriteFailed { path } => {
            serde_json::json!({"outcome": "write_failed", "path": path})
        }
        HandleOutcome::Failed(reason) => serde_json::json!({"outcome": "failed", "error": reason}),
    }
}
