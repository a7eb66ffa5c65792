//! REST client for the issue comments API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use operatorcert_shared::http::{self, DEFAULT_TIMEOUT_SECS};
use operatorcert_shared::{OperatorCertError, Result};

use crate::thread::IssueRef;

/// A comment as listed by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// API URL of the comment itself.
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// Issue comments API client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    host_url: String,
    api_path_prefix: String,
    token: String,
}

/// Bare hosts such as `api.github.com` get `https://`; an explicit scheme
/// (including plain `http://`) is kept.
fn host_base_url(host_url: &str) -> String {
    if host_url.contains("://") {
        host_url.to_string()
    } else {
        format!("https://{host_url}")
    }
}

impl GithubClient {
    /// `host_url` is either a bare host or a full URL.
    pub fn new(host_url: &str, api_path_prefix: &str, token: String) -> Result<Self> {
        let host_url = host_base_url(host_url);
        http::join_url(&host_url, "")?;
        Ok(Self {
            http: http::build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            host_url,
            api_path_prefix: api_path_prefix.to_string(),
            token,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    /// List every comment on the thread, in API order.
    pub async fn list_comments(&self, issue: &IssueRef) -> Result<Vec<Comment>> {
        let url = http::join_url(&self.host_url, &issue.comments_path(&self.api_path_prefix))?;
        debug!(%url, "listing comments");
        http::send_json(self.authorize(self.http.get(url))).await
    }

    /// Post a new comment; returns the raw response body.
    pub async fn create_comment(&self, issue: &IssueRef, body: &str) -> Result<String> {
        let url = http::join_url(&self.host_url, &issue.comments_path(&self.api_path_prefix))?;
        debug!(%url, "creating comment");
        http::send_text(self.authorize(self.http.post(url).json(&CommentBody { body }))).await
    }

    /// Replace the body of the comment at `comment_url`; returns the raw
    /// response body. Only the path of `comment_url` is used, so the request
    /// goes to the configured host.
    pub async fn update_comment(&self, comment_url: &str, body: &str) -> Result<String> {
        let path = Url::parse(comment_url)
            .map_err(|e| {
                OperatorCertError::parse(format!("invalid comment URL '{comment_url}': {e}"))
            })?
            .path()
            .to_string();
        let url = http::join_url(&self.host_url, &path)?;
        debug!(%url, "updating comment");
        http::send_text(self.authorize(self.http.patch(url).json(&CommentBody { body }))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn issue() -> IssueRef {
        IssueRef {
            owner: "foo".into(),
            repo: "bar".into(),
            number: 3,
        }
    }

    #[test]
    fn bare_host_defaults_to_https() {
        let client = GithubClient::new("api.github.com", "", "t".into()).unwrap();
        assert_eq!(client.host_url, "https://api.github.com");

        let client = GithubClient::new("github.example.com", "/api/v3", "t".into()).unwrap();
        assert_eq!(client.host_url, "https://github.example.com");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let client = GithubClient::new("http://localhost:8080", "", "t".into()).unwrap();
        assert_eq!(client.host_url, "http://localhost:8080");

        let client = GithubClient::new("https://api.github.com", "", "t".into()).unwrap();
        assert_eq!(client.host_url, "https://api.github.com");
    }

    #[tokio::test]
    async fn list_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/repos/foo/bar/issues/3/comments"))
            .and(header("Authorization", "Bearer tkn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"url": "https://api.github.com/repos/foo/bar/issues/comments/1", "body": "hi", "id": 1}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClient::new(&server.uri(), "/api/v3", "tkn".into()).unwrap();
        let comments = client.list_comments(&issue()).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].body, "hi");
        assert_eq!(comments[0].extra["id"], 1);
    }

    #[tokio::test]
    async fn update_uses_comment_path_on_configured_host() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/foo/bar/issues/comments/9"))
            .and(body_json(json!({"body": "new"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":9}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClient::new(&server.uri(), "", "tkn".into()).unwrap();
        let body = client
            .update_comment("https://api.github.com/repos/foo/bar/issues/comments/9", "new")
            .await
            .unwrap();
        assert_eq!(body, "{\"id\":9}");
    }
}
