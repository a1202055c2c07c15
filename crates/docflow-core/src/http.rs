//! Shared plumbing for the REST clients

use anyhow::Context;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};

const USER_AGENT: &str = concat!("docflow/", env!("CARGO_PKG_VERSION"));

/// Build the long-lived HTTP client used for one service
pub(crate) fn build_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder.build().context("Failed to build HTTP client")
}

/// Send a request, mapping transport failures and error statuses
pub(crate) async fn send(
    url: &str,
    request: reqwest::RequestBuilder,
) -> ClientResult<reqwest::Response> {
    let response = request.send().await.map_err(|source| ClientError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON response body
pub(crate) async fn json<T: serde::de::DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> ClientResult<T> {
    response
        .json()
        .await
        .map_err(|e| ClientError::InvalidResponse {
            url: url.to_string(),
            details: e.to_string(),
        })
}
