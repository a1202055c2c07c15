//! Data models for docflow
//!
//! Defines the records that flow through one invocation: the change
//! notification, references into Firestore and Dataform, and the requests
//! sent to the workspace.

use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Firestore's name for the database used when none is given
pub const DEFAULT_DATABASE: &str = "(default)";

/// Notification payload as it arrives on the wire
///
/// Every field is optional here; [`ChangeNotification::from_raw`] decides
/// what is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNotification {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
}

/// A validated document-change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNotification {
    /// Event identifier assigned by the event source
    pub id: String,
    /// Event type, e.g. `google.cloud.firestore.document.v1.written`
    #[serde(rename = "type")]
    pub kind: String,
    /// Database the changed document lives in
    pub database: String,
    /// Collection part of the document path
    pub collection: String,
    /// Document part of the document path
    pub document_id: String,
}

impl ChangeNotification {
    /// Build a notification from its attributes
    ///
    /// `document` is split on the first `/` into collection and document id.
    /// A missing database falls back to Firestore's default database.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        database: Option<String>,
        document: &str,
    ) -> Result<Self, EventError> {
        if document.is_empty() {
            return Err(EventError::MissingField("document"));
        }

        let (collection, document_id) = split_document_path(document)?;
        let database = database
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        Ok(Self {
            id: id.into(),
            kind: kind.into(),
            database,
            collection: collection.to_string(),
            document_id: document_id.to_string(),
        })
    }

    /// Validate a wire payload
    pub fn from_raw(raw: RawNotification) -> Result<Self, EventError> {
        let document = raw.document.ok_or(EventError::MissingField("document"))?;
        Self::new(
            raw.id.unwrap_or_default(),
            raw.kind.unwrap_or_default(),
            raw.database,
            &document,
        )
    }

    /// Parse and validate a JSON payload
    pub fn from_json(body: &[u8]) -> Result<Self, EventError> {
        let raw: RawNotification =
            serde_json::from_slice(body).map_err(|e| EventError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Reference to the changed document
    pub fn document_ref(&self) -> DocumentRef {
        DocumentRef {
            database: self.database.clone(),
            collection: self.collection.clone(),
            document_id: self.document_id.clone(),
        }
    }
}

/// Split `<collection>/<doc-id>` on the first separator
fn split_document_path(path: &str) -> Result<(&str, &str), EventError> {
    match path.split_once('/') {
        Some((collection, doc)) if !collection.is_empty() && !doc.is_empty() => {
            Ok((collection, doc))
        }
        _ => Err(EventError::InvalidDocumentPath(path.to_string())),
    }
}

/// A document in a specific Firestore database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub database: String,
    pub collection: String,
    pub document_id: String,
}

impl DocumentRef {
    /// Path relative to the database's `documents` root
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.document_id)
    }
}

/// A workspace inside a Dataform repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceRef {
    pub repository: String,
    pub workspace: String,
}

impl WorkspaceRef {
    pub fn new(repository: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            workspace: workspace.into(),
        }
    }
}

impl std::fmt::Display for WorkspaceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.repository, self.workspace)
    }
}

/// Git state of an uncommitted file in a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    StateUnspecified,
    Added,
    Deleted,
    Modified,
    HasConflicts,
    /// A state this version does not know about
    #[serde(other)]
    Unrecognized,
}

/// One uncommitted file change reported by the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(default)]
    pub path: String,
    pub state: FileState,
}

/// Whether the workspace is safe to write to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictStatus {
    /// No uncommitted change is conflicted
    Clean,
    /// At least one file has unresolved conflicts
    Conflicted { paths: Vec<String> },
    /// The status query itself failed
    Unknown,
}

impl ConflictStatus {
    /// Derive the status from the workspace's uncommitted changes
    pub fn from_changes(changes: &[FileChange]) -> Self {
        let paths: Vec<String> = changes
            .iter()
            .filter(|c| c.state == FileState::HasConflicts)
            .map(|c| c.path.clone())
            .collect();

        if paths.is_empty() {
            ConflictStatus::Clean
        } else {
            ConflictStatus::Conflicted { paths }
        }
    }

    /// Only a clean workspace may be written to
    pub fn is_clean(&self) -> bool {
        matches!(self, ConflictStatus::Clean)
    }
}

/// Write raw bytes to a path inside a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWriteRequest {
    pub workspace: WorkspaceRef,
    pub path: String,
    pub contents: Vec<u8>,
}

/// Commit pending workspace changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub workspace: WorkspaceRef,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    /// Files to commit; empty commits everything pending
    pub paths: Vec<String>,
}
