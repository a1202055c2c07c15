//! Bearer tokens for the REST clients
//!
//! Inside Cloud Functions / Cloud Run the runtime's metadata server hands out
//! short-lived tokens for the attached service account. Tokens are cached
//! and shared by both clients until shortly before they expire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{AuthMode, Config};
use crate::error::{ClientError, ClientResult};
use crate::http;

/// Path of the default service account's token on the metadata server
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of `Authorization: Bearer` tokens
#[derive(Clone)]
pub enum TokenSource {
    /// No credentials (emulators, tests)
    Anonymous,
    /// A fixed token
    Static(String),
    /// Tokens fetched from the metadata server
    Metadata(Arc<MetadataTokens>),
}

impl TokenSource {
    /// Build the token source the configuration asks for
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.auth {
            AuthMode::None => Ok(TokenSource::Anonymous),
            AuthMode::Static => match config.access_token.as_deref() {
                Some(token) if !token.is_empty() => Ok(TokenSource::Static(token.to_string())),
                _ => anyhow::bail!(
                    "auth = \"static\" requires access_token (or DOCFLOW_ACCESS_TOKEN)"
                ),
            },
            AuthMode::Metadata => {
                let tokens = MetadataTokens::new(config)?;
                Ok(TokenSource::Metadata(Arc::new(tokens)))
            }
        }
    }

    /// Current token, if any
    pub async fn token(&self) -> ClientResult<Option<String>> {
        match self {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Metadata(tokens) => tokens.token().await.map(Some),
        }
    }

    /// Attach the current token to a request
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ClientResult<reqwest::RequestBuilder> {
        Ok(match self.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself
        match self {
            TokenSource::Anonymous => write!(f, "Anonymous"),
            TokenSource::Static(_) => write!(f, "Static(..)"),
            TokenSource::Metadata(m) => write!(f, "Metadata({})", m.url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Cached tokens from the metadata server
pub struct MetadataTokens {
    http: reqwest::Client,
    url: String,
    cache: Mutex<Option<CachedToken>>,
}

impl MetadataTokens {
    /// Token fetches share the configured request timeout
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let endpoint = config.metadata_endpoint.trim_end_matches('/');
        Ok(Self {
            http: http::build_client(config)?,
            url: format!("{}{}", endpoint, METADATA_TOKEN_PATH),
            cache: Mutex::new(None),
        })
    }

    /// Return the cached token or fetch a fresh one
    pub async fn token(&self) -> ClientResult<String> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        debug!("Fetching access token from metadata server");
        let response = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| ClientError::Auth(format!("{}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(ClientError::Auth(format!(
                "{} returned HTTP {}",
                self.url,
                response.status().as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Auth(format!("invalid token response: {}", e)))?;

        let value = body.access_token;
        *cache = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });

        Ok(value)
    }
}
