//! docflow Core Library
//!
//! This crate provides the core functionality for docflow, a small glue
//! service that mirrors Firestore documents into a Dataform workspace.
//!
//! # Architecture
//!
//! - **Firestore**: source of the document data, read through the REST API
//! - **Dataform**: target workspace, checked for conflicts and written to
//!
//! Each change notification runs one linear sequence: read the document,
//! check the workspace for conflicts, write `includes/<doc-id>.json`.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let tokens = TokenSource::from_config(&config)?;
//! let store = FirestoreClient::new(&config, tokens.clone())?;
//! let repo = DataformClient::new(&config, tokens)?;
//!
//! let handler = EventHandler::new(Arc::new(store), Arc::new(repo), &config);
//! let outcome = handler.handle(notification).await;
//! ```
//!
//! # Modules
//!
//! - `handler`: Event orchestration (main entry point)
//! - `models`: Notifications, references and request records
//! - `firestore`: Document store client
//! - `dataform`: Workspace repository client
//! - `auth`: Bearer token source shared by both clients
//! - `config`: Application configuration
//! - `error`: Typed errors

pub mod auth;
pub mod config;
pub mod dataform;
pub mod error;
pub mod firestore;
pub mod handler;
mod http;
pub mod models;

pub use auth::TokenSource;
pub use config::{AuthMode, Config};
pub use dataform::{DataformClient, WorkspaceRepository};
pub use error::{ClientError, EventError, HandlerError};
pub use firestore::{DocumentRead, DocumentStore, FirestoreClient};
pub use handler::{EventHandler, HandleOutcome};
pub use models::{
    ChangeNotification, CommitRequest, ConflictStatus, DocumentRef, FileChange, FileState,
    FileWriteRequest, WorkspaceRef,
};
