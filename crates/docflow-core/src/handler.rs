//! Event orchestration
//!
//! One invocation per change notification:
//!
//! 1. Read the changed document
//! 2. Check the target workspace for conflicts
//! 3. If clean, write `<include_dir>/<doc-id>.json` with the document data
//!
//! Nothing is committed or pushed. Every failure ends the invocation with a
//! logged [`HandleOutcome`]; nothing is retried.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::dataform::{self, WorkspaceRepository};
use crate::error::{EventError, HandlerError};
use crate::firestore::{self, DocumentRead, DocumentStore};
use crate::models::{ChangeNotification, ConflictStatus, FileWriteRequest, WorkspaceRef};

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The file was written to the workspace
    Written { path: String },
    /// The workspace was not clean (or its status unknown); nothing written
    Conflicted,
    /// The write was attempted and failed
    WriteFailed { path: String },
    /// The invocation stopped on an error before writing
    Failed(String),
}

/// Runs the read → check → write sequence for each notification
pub struct EventHandler {
    store: Arc<dyn DocumentStore>,
    repo: Arc<dyn WorkspaceRepository>,
    workspace: WorkspaceRef,
    include_dir: String,
}

impl EventHandler {
    /// Create a handler targeting the configured workspace
    pub fn new(
        store: Arc<dyn DocumentStore>,
        repo: Arc<dyn WorkspaceRepository>,
        config: &Config,
    ) -> Self {
        Self::with_target(store, repo, config.workspace_ref(), &config.include_dir)
    }

    pub fn with_target(
        store: Arc<dyn DocumentStore>,
        repo: Arc<dyn WorkspaceRepository>,
        workspace: WorkspaceRef,
        include_dir: &str,
    ) -> Self {
        Self {
            store,
            repo,
            workspace,
            include_dir: include_dir.trim_end_matches('/').to_string(),
        }
    }

    pub fn workspace(&self) -> &WorkspaceRef {
        &self.workspace
    }

    /// Workspace path of the file written for a document
    pub fn file_path(&self, document_id: &str) -> String {
        if self.include_dir.is_empty() {
            format!("{}.json", document_id)
        } else {
            format!("{}/{}.json", self.include_dir, document_id)
        }
    }

    /// Parse a JSON notification and handle it
    pub async fn handle_payload(&self, body: &[u8]) -> HandleOutcome {
        match ChangeNotification::from_json(body) {
            Ok(notification) => self.handle(&notification).await,
            Err(e) => self.reject(e),
        }
    }

    /// Log a notification that failed validation; nothing is read or written
    pub fn reject(&self, e: EventError) -> HandleOutcome {
        Self::log_failure(HandlerError::from(e))
    }

    /// Handle one notification; never fails
    pub async fn handle(&self, notification: &ChangeNotification) -> HandleOutcome {
        match self.process(notification).await {
            Ok(outcome) => outcome,
            Err(e) => Self::log_failure(e),
        }
    }

    fn log_failure(e: HandlerError) -> HandleOutcome {
        error!("Error processing message: {}", e);
        HandleOutcome::Failed(e.to_string())
    }

    async fn process(
        &self,
        notification: &ChangeNotification,
    ) -> Result<HandleOutcome, HandlerError> {
        info!(
            id = %notification.id,
            kind = %notification.kind,
            database = %notification.database,
            collection = %notification.collection,
            document = %notification.document_id,
            "Received event"
        );

        let doc = notification.document_ref();
        let read = firestore::read_document(self.store.as_ref(), &doc).await;
        if let DocumentRead::NotFound | DocumentRead::Unavailable(_) = read {
            // Carry on with `null`, the file still gets written
            info!("No data for {}, continuing with null", doc.path());
        }
        let data = read.into_value();

        let status = dataform::check_conflicts(self.repo.as_ref(), &self.workspace).await;
        if status != ConflictStatus::Clean {
            return Ok(HandleOutcome::Conflicted);
        }

        let path = self.file_path(&notification.document_id);
        let contents = serde_json::to_string_pretty(&data)?;
        let request = FileWriteRequest {
            workspace: self.workspace.clone(),
            path: path.clone(),
            contents: contents.into_bytes(),
        };

        if dataform::write_file(self.repo.as_ref(), &request).await {
            Ok(HandleOutcome::Written { path })
        } else {
            Ok(HandleOutcome::WriteFailed { path })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ClientResult};
    use crate::firestore::DocumentData;
    use crate::models::{CommitRequest, DocumentRef, FileChange, FileState};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    enum StoreReply {
        Data(serde_json::Value),
        Missing,
        Error,
    }

    struct FakeStore {
        reply: StoreReply,
        reads: Mutex<Vec<DocumentRef>>,
    }

    impl FakeStore {
        fn new(reply: StoreReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                reads: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn get_document(&self, doc: &DocumentRef) -> ClientResult<Option<DocumentData>> {
            self.reads.lock().unwrap().push(doc.clone());
            match &self.reply {
                StoreReply::Data(value) => Ok(value.as_object().cloned()),
                StoreReply::Missing => Ok(None),
                StoreReply::Error => Err(ClientError::Auth("no credentials".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeRepo {
        changes: Vec<FileChange>,
        status_error: bool,
        write_error: bool,
        writes: Mutex<Vec<FileWriteRequest>>,
        commits: Mutex<Vec<CommitRequest>>,
    }

    fn unavailable() -> ClientError {
        ClientError::Status {
            url: "https://dataform.googleapis.com".to_string(),
            status: 503,
            body: String::new(),
        }
    }

    #[async_trait]
    impl WorkspaceRepository for FakeRepo {
        async fn fetch_file_git_statuses(
            &self,
            _workspace: &WorkspaceRef,
        ) -> ClientResult<Vec<FileChange>> {
            if self.status_error {
                return Err(unavailable());
            }
            Ok(self.changes.clone())
        }

        async fn write_file(&self, request: &FileWriteRequest) -> ClientResult<()> {
            self.writes.lock().unwrap().push(request.clone());
            if self.write_error {
                return Err(unavailable());
            }
            Ok(())
        }

        async fn commit(&self, request: &CommitRequest) -> ClientResult<()> {
            self.commits.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn handler(store: Arc<FakeStore>, repo: Arc<FakeRepo>) -> EventHandler {
        EventHandler::with_target(
            store,
            repo,
            WorkspaceRef::new("teste", "autoDeploy"),
            "includes",
        )
    }

    fn notification(document: &str) -> ChangeNotification {
        ChangeNotification::new(
            "evt-1",
            "google.cloud.firestore.document.v1.written",
            Some("(default)".to_string()),
            document,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_users_table_is_written() {
        let store = FakeStore::new(StoreReply::Data(json!({"name": "users"})));
        let repo = Arc::new(FakeRepo::default());
        let handler = handler(store.clone(), repo.clone());

        let outcome = handler.handle(&notification("tables/users")).await;

        assert_eq!(
            outcome,
            HandleOutcome::Written {
                path: "includes/users.json".to_string()
            }
        );

        let writes = repo.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].path, "includes/users.json");
        assert_eq!(writes[0].workspace, WorkspaceRef::new("teste", "autoDeploy"));
        assert_eq!(
            String::from_utf8(writes[0].contents.clone()).unwrap(),
            "{\n  \"name\": \"users\"\n}"
        );
    }

    #[tokio::test]
    async fn test_read_is_scoped_to_collection_and_document() {
        let store = FakeStore::new(StoreReply::Data(json!({})));
        let repo = Arc::new(FakeRepo::default());
        let handler = handler(store.clone(), repo);

        handler.handle(&notification("a/b")).await;

        let reads = store.reads.lock().unwrap();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].collection, "a");
        assert_eq!(reads[0].document_id, "b");
        assert_eq!(reads[0].database, "(default)");
    }

    #[tokio::test]
    async fn test_conflicts_prevent_write() {
        let store = FakeStore::new(StoreReply::Data(json!({"name": "users"})));
        let repo = Arc::new(FakeRepo {
            changes: vec![
                FileChange {
                    path: "definitions/a.sqlx".to_string(),
                    state: FileState::Modified,
                },
                FileChange {
                    path: "includes/users.json".to_string(),
                    state: FileState::HasConflicts,
                },
            ],
            ..FakeRepo::default()
        });
        let handler = handler(store, repo.clone());

        let outcome = handler.handle(&notification("tables/users")).await;

        assert_eq!(outcome, HandleOutcome::Conflicted);
        assert!(repo.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_conflicting_changes_allow_write() {
        let store = FakeStore::new(StoreReply::Data(json!({"name": "orders"})));
        let repo = Arc::new(FakeRepo {
            changes: vec![FileChange {
                path: "definitions/a.sqlx".to_string(),
                state: FileState::Added,
            }],
            ..FakeRepo::default()
        });
        let handler = handler(store, repo.clone());

        let outcome = handler.handle(&notification("tables/orders")).await;

        assert!(matches!(outcome, HandleOutcome::Written { .. }));
        assert_eq!(repo.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_still_writes_null() {
        let store = FakeStore::new(StoreReply::Missing);
        let repo = Arc::new(FakeRepo::default());
        let handler = handler(store, repo.clone());

        let outcome = handler.handle(&notification("tables/ghost")).await;

        assert!(matches!(outcome, HandleOutcome::Written { .. }));
        let writes = repo.writes.lock().unwrap();
        assert_eq!(writes[0].path, "includes/ghost.json");
        assert_eq!(writes[0].contents, b"null".to_vec());
    }

    #[tokio::test]
    async fn test_store_error_does_not_propagate() {
        let store = FakeStore::new(StoreReply::Error);
        let repo = Arc::new(FakeRepo::default());
        let handler = handler(store, repo.clone());

        let outcome = handler.handle(&notification("tables/users")).await;

        assert!(matches!(outcome, HandleOutcome::Written { .. }));
        assert_eq!(repo.writes.lock().unwrap()[0].contents, b"null".to_vec());
    }

    #[tokio::test]
    async fn test_status_error_does_not_propagate() {
        let store = FakeStore::new(StoreReply::Data(json!({"name": "users"})));
        let repo = Arc::new(FakeRepo {
            status_error: true,
            ..FakeRepo::default()
        });
        let handler = handler(store, repo.clone());

        let outcome = handler.handle(&notification("tables/users")).await;

        assert_eq!(outcome, HandleOutcome::Conflicted);
        assert!(repo.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_error_does_not_propagate() {
        let store = FakeStore::new(StoreReply::Data(json!({"name": "users"})));
        let repo = Arc::new(FakeRepo {
            write_error: true,
            ..FakeRepo::default()
        });
        let handler = handler(store, repo.clone());

        let outcome = handler.handle(&notification("tables/users")).await;

        assert_eq!(
            outcome,
            HandleOutcome::WriteFailed {
                path: "includes/users.json".to_string()
            }
        );
        assert_eq!(repo.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_never_commits() {
        let store = FakeStore::new(StoreReply::Data(json!({"name": "users"})));
        let repo = Arc::new(FakeRepo::default());
        let handler = handler(store, repo.clone());

        handler.handle(&notification("tables/users")).await;

        assert!(repo.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_payload() {
        let store = FakeStore::new(StoreReply::Data(json!({"name": "users"})));
        let repo = Arc::new(FakeRepo::default());
        let handler = handler(store, repo.clone());

        let body = br#"{"id":"1","type":"written","database":"(default)","document":"tables/users"}"#;
        let outcome = handler.handle_payload(body).await;
        assert!(matches!(outcome, HandleOutcome::Written { .. }));

        let outcome = handler.handle_payload(br#"{"id":"2"}"#).await;
        assert!(matches!(outcome, HandleOutcome::Failed(_)));
        assert_eq!(repo.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_reject_invalid_notification() {
        let repo = Arc::new(FakeRepo::default());
        let store = FakeStore::new(StoreReply::Missing);
        let handler = handler(store.clone(), repo.clone());

        let err = ChangeNotification::from_json(br#"{"id":"1","document":"users"}"#).unwrap_err();
        let outcome = handler.reject(err);

        let expected = EventError::InvalidDocumentPath("users".to_string()).to_string();
        assert_eq!(outcome, HandleOutcome::Failed(expected));
        assert!(store.reads.lock().unwrap().is_empty());
        assert!(repo.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_file_path() {
        let store = FakeStore::new(StoreReply::Missing);
        let repo = Arc::new(FakeRepo::default());

        let h = EventHandler::with_target(
            store.clone(),
            repo.clone(),
            WorkspaceRef::new("r", "w"),
            "includes/",
        );
        assert_eq!(h.file_path("users"), "includes/users.json");

        let h = EventHandler::with_target(store, repo, WorkspaceRef::new("r", "w"), "");
        assert_eq!(h.file_path("users"), "users.json");
    }

    #[test]
    fn test_new_uses_config_target() {
        let config = Config {
            repository: "warehouse".to_string(),
            workspace: "bot".to_string(),
            include_dir: "data".to_string(),
            ..Config::default()
        };
        let h = EventHandler::new(
            FakeStore::new(StoreReply::Missing),
            Arc::new(FakeRepo::default()),
            &config,
        );
        assert_eq!(h.workspace(), &WorkspaceRef::new("warehouse", "bot"));
        assert_eq!(h.file_path("x"), "data/x.json");
    }
}
