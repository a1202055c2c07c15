//! Document store client
//!
//! Reads single documents through the Firestore REST API and decodes the
//! typed value encoding into plain JSON.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::auth::TokenSource;
use crate::config::Config;
use crate::error::ClientResult;
use crate::http;
use crate::models::DocumentRef;

/// Document data as plain JSON
pub type DocumentData = Map<String, Value>;

/// Read access to single documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document; `Ok(None)` when it does not exist
    async fn get_document(&self, doc: &DocumentRef) -> ClientResult<Option<DocumentData>>;
}

/// Outcome of a document read
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentRead {
    Found(DocumentData),
    NotFound,
    /// The read failed; carries the error message
    Unavailable(String),
}

impl DocumentRead {
    /// Document data as a JSON value; `null` when there is none
    pub fn into_value(self) -> Value {
        match self {
            DocumentRead::Found(data) => Value::Object(data),
            DocumentRead::NotFound | DocumentRead::Unavailable(_) => Value::Null,
        }
    }
}

/// Read a document, logging and swallowing failures
pub async fn read_document(store: &dyn DocumentStore, doc: &DocumentRef) -> DocumentRead {
    match store.get_document(doc).await {
        Ok(Some(data)) => {
            info!("Document read: {} ({})", doc.path(), doc.database);
            DocumentRead::Found(data)
        }
        Ok(None) => {
            info!("Document not found: {} ({})", doc.path(), doc.database);
            DocumentRead::NotFound
        }
        Err(e) => {
            error!("Failed to read document {}: {}", doc.path(), e);
            DocumentRead::Unavailable(e.to_string())
        }
    }
}

/// Firestore REST client
pub struct FirestoreClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    project_id: String,
    tokens: TokenSource,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreClient {
    pub fn new(config: &Config, tokens: TokenSource) -> anyhow::Result<Self> {
        let endpoint = reqwest::Url::parse(&config.firestore_endpoint)
            .with_context(|| format!("Invalid firestore_endpoint: {}", config.firestore_endpoint))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("Invalid firestore_endpoint: {}", config.firestore_endpoint);
        }

        Ok(Self {
            http: http::build_client(config)?,
            endpoint,
            project_id: config.require_project_id()?.to_string(),
            tokens,
        })
    }

    /// REST URL of a document
    ///
    /// Document IDs may contain `#`, `?`, `%` or spaces, so every path
    /// segment is percent-encoded on its own. A nested `document_id` keeps
    /// its `/` separators.
    pub fn document_url(&self, doc: &DocumentRef) -> reqwest::Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([
                    "v1",
                    "projects",
                    self.project_id.as_str(),
                    "databases",
                    doc.database.as_str(),
                    "documents",
                    doc.collection.as_str(),
                ])
                .extend(doc.document_id.split('/'));
        }
        url
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get_document(&self, doc: &DocumentRef) -> ClientResult<Option<DocumentData>> {
        let url = self.document_url(doc);
        let request = self.tokens.authorize(self.http.get(url.clone())).await?;

        let response = match http::send(url.as_str(), request).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let document: FirestoreDocument = http::json(url.as_str(), response).await?;
        Ok(Some(decode_fields(&document.fields)))
    }
}

/// Decode a Firestore `fields` map
pub fn decode_fields(fields: &Map<String, Value>) -> DocumentData {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

/// Decode one Firestore typed value into plain JSON
///
/// Integers arrive as strings and are turned back into numbers.
/// Timestamps, references and bytes stay strings.
pub fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            inner.clone()
        }
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| inner.clone()),
            other => other.clone(),
        },
        // Numbers, or "NaN"/"Infinity" strings
        "doubleValue" => inner.clone(),
        "geoPointValue" => {
            let mut point = Map::new();
            for key in ["latitude", "longitude"] {
                point.insert(
                    key.to_string(),
                    inner.get(key).cloned().unwrap_or(Value::from(0.0)),
                );
            }
            Value::Object(point)
        }
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::http::testing;
    use axum::http::{StatusCode, Uri};
    use serde_json::json;

    struct FixedStore(ClientResult<Option<DocumentData>>);

    #[async_trait]
    impl DocumentStore for FixedStore {
        async fn get_document(&self, _doc: &DocumentRef) -> ClientResult<Option<DocumentData>> {
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(_) => Err(ClientError::Auth("token expired".to_string())),
            }
        }
    }

    fn users_ref() -> DocumentRef {
        DocumentRef {
            database: "(default)".to_string(),
            collection: "tables".to_string(),
            document_id: "users".to_string(),
        }
    }

    #[test]
    fn test_document_url() {
        let config = Config {
            project_id: Some("my-project".to_string()),
            firestore_endpoint: "http://localhost:8081/".to_string(),
            ..Config::default()
        };
        let client = FirestoreClient::new(&config, TokenSource::Anonymous).unwrap();

        assert_eq!(
            client.document_url(&users_ref()).as_str(),
            "http://localhost:8081/v1/projects/my-project/databases/(default)/documents/tables/users"
        );
    }

    #[test]
    fn test_document_url_encodes_ids() {
        let config = Config {
            project_id: Some("p".to_string()),
            ..Config::default()
        };
        let client = FirestoreClient::new(&config, TokenSource::Anonymous).unwrap();
        let doc = |id: &str| DocumentRef {
            document_id: id.to_string(),
            ..users_ref()
        };

        let url = client.document_url(&doc("a#b"));
        assert_eq!(
            url.path(),
            "/v1/projects/p/databases/(default)/documents/tables/a%23b"
        );
        assert_eq!(url.fragment(), None);

        let url = client.document_url(&doc("a b"));
        assert!(url.path().ends_with("/documents/tables/a%20b"));

        let url = client.document_url(&doc("50%?x"));
        assert!(url.path().ends_with("/documents/tables/50%25%3Fx"));
        assert_eq!(url.query(), None);

        // Nested documents keep their separators
        let url = client.document_url(&doc("b/c/d"));
        assert!(url.path().ends_with("/documents/tables/b/c/d"));
    }

    #[test]
    fn test_document_url_keeps_endpoint_prefix() {
        let config = Config {
            project_id: Some("p".to_string()),
            firestore_endpoint: "http://localhost:8081/emulator/".to_string(),
            ..Config::default()
        };
        let client = FirestoreClient::new(&config, TokenSource::Anonymous).unwrap();
        assert_eq!(
            client.document_url(&users_ref()).path(),
            "/emulator/v1/projects/p/databases/(default)/documents/tables/users"
        );
    }

    #[test]
    fn test_client_rejects_bad_endpoint() {
        let config = Config {
            project_id: Some("p".to_string()),
            firestore_endpoint: "not a url".to_string(),
            ..Config::default()
        };
        assert!(FirestoreClient::new(&config, TokenSource::Anonymous).is_err());
    }

    #[test]
    fn test_client_requires_project() {
        let config = Config::default();
        assert!(FirestoreClient::new(&config, TokenSource::Anonymous).is_err());
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_value(&json!({"stringValue": "users"})), json!("users"));
        assert_eq!(decode_value(&json!({"integerValue": "42"})), json!(42));
        assert_eq!(decode_value(&json!({"doubleValue": 1.5})), json!(1.5));
        assert_eq!(decode_value(&json!({"booleanValue": true})), json!(true));
        assert_eq!(decode_value(&json!({"nullValue": null})), Value::Null);
        assert_eq!(
            decode_value(&json!({"timestampValue": "2024-01-01T00:00:00Z"})),
            json!("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_decode_nested() {
        let fields = json!({
            "name": {"stringValue": "users"},
            "columns": {"arrayValue": {"values": [
                {"mapValue": {"fields": {
                    "name": {"stringValue": "id"},
                    "nullable": {"booleanValue": false}
                }}}
            ]}},
            "tags": {"arrayValue": {}},
            "location": {"geoPointValue": {"latitude": -23.5, "longitude": -46.6}}
        });

        let decoded = decode_fields(fields.as_object().unwrap());
        assert_eq!(
            Value::Object(decoded),
            json!({
                "name": "users",
                "columns": [{"name": "id", "nullable": false}],
                "tags": [],
                "location": {"latitude": -23.5, "longitude": -46.6}
            })
        );
    }

    #[test]
    fn test_into_value() {
        let mut data = DocumentData::new();
        data.insert("name".to_string(), json!("users"));

        assert_eq!(DocumentRead::Found(data).into_value(), json!({"name": "users"}));
        assert_eq!(DocumentRead::NotFound.into_value(), Value::Null);
        assert_eq!(
            DocumentRead::Unavailable("boom".to_string()).into_value(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn test_read_document_found() {
        let mut data = DocumentData::new();
        data.insert("name".to_string(), json!("users"));
        let store = FixedStore(Ok(Some(data.clone())));

        assert_eq!(read_document(&store, &users_ref()).await, DocumentRead::Found(data));
    }

    #[tokio::test]
    async fn test_read_document_not_found() {
        let store = FixedStore(Ok(None));
        assert_eq!(read_document(&store, &users_ref()).await, DocumentRead::NotFound);
    }

    #[tokio::test]
    async fn test_read_document_error_is_swallowed() {
        let store = FixedStore(Err(ClientError::Auth(String::new())));
        let read = read_document(&store, &users_ref()).await;
        assert!(matches!(read, DocumentRead::Unavailable(msg) if msg.contains("token expired")));
    }

    async fn firestore_api(uri: Uri) -> (StatusCode, String) {
        let path = uri.path();
        let prefix = "/v1/projects/p/databases/(default)/documents/";
        let Some(doc) = path.strip_prefix(prefix) else {
            return (StatusCode::BAD_REQUEST, path.to_string());
        };

        let fields = match doc {
            "tables/users" => json!({
                "name": {"stringValue": "users"},
                "rows": {"integerValue": "3"}
            }),
            "tables/a%23b" => json!({"name": {"stringValue": "a#b"}}),
            "tables/broken" => return (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
            _ => {
                let body = json!({"error": {"code": 404, "status": "NOT_FOUND"}});
                return (StatusCode::NOT_FOUND, body.to_string());
            }
        };
        let name = format!("projects/p/databases/(default)/documents/{}", doc);
        let body = json!({"name": name, "fields": fields});
        (StatusCode::OK, body.to_string())
    }

    async fn local_client() -> FirestoreClient {
        let endpoint = testing::serve(axum::Router::new().fallback(firestore_api)).await;
        let config = Config {
            project_id: Some("p".to_string()),
            firestore_endpoint: endpoint,
            ..Config::default()
        };
        FirestoreClient::new(&config, TokenSource::Anonymous).unwrap()
    }

    fn tables_ref(id: &str) -> DocumentRef {
        DocumentRef {
            document_id: id.to_string(),
            ..users_ref()
        }
    }

    #[tokio::test]
    async fn test_rest_read_found() {
        let client = local_client().await;

        let read = read_document(&client, &users_ref()).await;
        assert_eq!(read.into_value(), json!({"name": "users", "rows": 3}));
    }

    #[tokio::test]
    async fn test_rest_read_not_found() {
        let client = local_client().await;

        assert_eq!(client.get_document(&tables_ref("ghost")).await.unwrap(), None);
        assert_eq!(
            read_document(&client, &tables_ref("ghost")).await,
            DocumentRead::NotFound
        );
    }

    #[tokio::test]
    async fn test_rest_read_server_error() {
        let client = local_client().await;

        let err = client.get_document(&tables_ref("broken")).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(matches!(
            read_document(&client, &tables_ref("broken")).await,
            DocumentRead::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_rest_read_id_with_hash() {
        let client = local_client().await;

        let read = read_document(&client, &tables_ref("a#b")).await;
        assert_eq!(read.into_value(), json!({"name": "a#b"}));
    }
}
