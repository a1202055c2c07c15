//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/docflow/config.toml)
//! 3. Environment variables (DOCFLOW_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::WorkspaceRef;

/// Environment variable prefix
const ENV_PREFIX: &str = "DOCFLOW";

/// How the REST clients obtain bearer tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Ask the runtime's metadata server
    Metadata,
    /// Use `access_token` as is
    Static,
    /// Send no credentials (emulators)
    None,
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "metadata" => Ok(AuthMode::Metadata),
            "static" => Ok(AuthMode::Static),
            "none" => Ok(AuthMode::None),
            other => bail!("Unknown auth mode '{}'. Use metadata, static or none.", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google Cloud project holding both services
    #[serde(default)]
    pub project_id: Option<String>,

    /// Dataform region
    #[serde(default = "default_location")]
    pub location: String,

    /// Dataform repository to write into
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Workspace inside the repository
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Directory inside the workspace that receives the JSON files
    #[serde(default = "default_include_dir")]
    pub include_dir: String,

    /// Address the event endpoint listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_firestore_endpoint")]
    pub firestore_endpoint: String,

    #[serde(default = "default_dataform_endpoint")]
    pub dataform_endpoint: String,

    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,

    /// Token source for both clients
    #[serde(default = "default_auth")]
    pub auth: AuthMode,

    /// Bearer token used when `auth = "static"`
    #[serde(default)]
    pub access_token: Option<String>,

    /// Per-request timeout; transport default when unset
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default = "default_commit_author_name")]
    pub commit_author_name: String,

    #[serde(default = "default_commit_author_email")]
    pub commit_author_email: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            repository: default_repository(),
            workspace: default_workspace(),
            include_dir: default_include_dir(),
            listen_addr: default_listen_addr(),
            firestore_endpoint: default_firestore_endpoint(),
            dataform_endpoint: default_dataform_endpoint(),
            metadata_endpoint: default_metadata_endpoint(),
            auth: default_auth(),
            access_token: None,
            request_timeout_secs: None,
            commit_author_name: default_commit_author_name(),
            commit_author_email: default_commit_author_email(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DOCFLOW_PROJECT_ID, DOCFLOW_WORKSPACE, ...)
    /// 2. Config file (~/.config/docflow/config.toml or DOCFLOW_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        let var = |name: &str| std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok();

        if let Some(val) = var("PROJECT_ID") {
            self.project_id = if val.is_empty() { None } else { Some(val) };
        }
        if self.project_id.is_none() {
            // Set by the Cloud Functions / Cloud Run runtime
            self.project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
                .ok()
                .filter(|v| !v.is_empty());
        }

        if let Some(val) = var("LOCATION") {
            self.location = val;
        }
        if let Some(val) = var("REPOSITORY") {
            self.repository = val;
        }
        if let Some(val) = var("WORKSPACE") {
            self.workspace = val;
        }
        if let Some(val) = var("INCLUDE_DIR") {
            self.include_dir = val;
        }
        if let Some(val) = var("LISTEN_ADDR") {
            self.listen_addr = val;
        }
        if let Some(val) = var("ACCESS_TOKEN") {
            self.access_token = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = var("AUTH") {
            self.auth = val.parse()?;
        }

        // Cloud Run style PORT wins over the listen address port
        if let Ok(port) = std::env::var("PORT") {
            if let Some((host, _)) = self.listen_addr.rsplit_once(':') {
                self.listen_addr = format!("{}:{}", host, port);
            }
        }

        Ok(())
    }

    /// Project id, which every REST call needs
    pub fn require_project_id(&self) -> Result<&str> {
        match self.project_id.as_deref() {
            Some(p) if !p.is_empty() => Ok(p),
            _ => bail!(
                "Project id not configured. Set it with:\n  \
                 {}_PROJECT_ID=<project> or project_id in {}",
                ENV_PREFIX,
                Self::config_file_path().display()
            ),
        }
    }

    /// The configured target workspace
    pub fn workspace_ref(&self) -> WorkspaceRef {
        WorkspaceRef::new(&self.repository, &self.workspace)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Get the config file path
    ///
    /// Can be overridden with DOCFLOW_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docflow")
            .join("config.toml")
    }
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_repository() -> String {
    "teste".to_string()
}

fn default_workspace() -> String {
    "autoDeploy".to_string()
}

fn default_include_dir() -> String {
    "includes".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_firestore_endpoint() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_dataform_endpoint() -> String {
    "https://dataform.googleapis.com".to_string()
}

fn default_metadata_endpoint() -> String {
    "http://metadata.google.internal".to_string()
}

fn default_auth() -> AuthMode {
    AuthMode::Metadata
}

fn default_commit_author_name() -> String {
    "docflow".to_string()
}

fn default_commit_author_email() -> String {
    "docflow@localhost".to_string()
}
