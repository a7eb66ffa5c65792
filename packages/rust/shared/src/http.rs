//! HTTP helpers shared by the REST clients.
//!
//! Every call is made at most once. A non-2xx status is turned into
//! [`OperatorCertError::Http`] carrying the response body so the failing
//! request can be diagnosed from the pipeline log.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::error;
use url::Url;

use crate::error::{OperatorCertError, Result};

/// User-Agent string for every outgoing request.
pub const USER_AGENT: &str = concat!("operatorcert/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Build a reqwest client with the shared settings.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| OperatorCertError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join `path` onto `base`, treating `base` as a directory.
///
/// `https://host/api/containers` and `https://host/api/containers/` both
/// resolve `v1/images` to `https://host/api/containers/v1/images`.
pub fn join_url(base: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base)
        .map_err(|e| OperatorCertError::validation(format!("invalid base URL '{base}': {e}")))?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| OperatorCertError::validation(format!("cannot join '{path}' onto {base}: {e}")))
}

/// Send a request and return the raw response body if the status is 2xx.
pub async fn send_text(request: RequestBuilder) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|e| OperatorCertError::Network(e.to_string()))?;
    read_success(response).await
}

/// Send a request and decode a 2xx JSON response body.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let body = send_text(request).await?;
    serde_json::from_str(&body)
        .map_err(|e| OperatorCertError::parse(format!("unexpected response body: {e}")))
}

async fn read_success(response: Response) -> Result<String> {
    let url = response.url().to_string();
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| OperatorCertError::Network(format!("{url}: failed to read body: {e}")))?;

    if !status.is_success() {
        error!(%url, status = status.as_u16(), %body, "request failed");
        return Err(OperatorCertError::Http {
            url,
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}
