//! Find-or-create comment publishing.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use operatorcert_shared::{OperatorCertError, Result};

use crate::client::{Comment, GithubClient};
use crate::thread::IssueRef;

/// What to post and where.
#[derive(Debug, Clone)]
pub struct CommentRequest {
    /// Issue or pull request URL the comment belongs to.
    pub request_url: String,
    /// Comment text, or a path to a file holding it.
    pub comment_or_file: String,
    /// Treat `comment_or_file` as a path when such a file exists.
    pub comment_is_file: bool,
    /// Invisible marker tag. Empty means no tag.
    pub tag: String,
    /// Replace the last comment carrying `tag` instead of adding a new one.
    pub replace: bool,
    /// Where the replaced comment is written, if one is found.
    pub old_comment_path: Option<PathBuf>,
    /// Where the final response body is written.
    pub new_comment_path: PathBuf,
}

/// Whether a comment was added or edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created,
    Updated,
}

impl CommentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "added",
            Self::Updated => "updated",
        }
    }
}

impl fmt::Display for CommentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`publish_comment`].
#[derive(Debug, Clone)]
pub struct CommentOutcome {
    pub action: CommentAction,
    /// Raw response body, also persisted at `new_comment_path`.
    pub response: String,
}

/// Whether the upstream test stage reported success.
pub fn tests_passed(test_result: &str) -> bool {
    test_result == "success"
}

/// Read the bot token from `path`, trimming surrounding whitespace.
pub fn load_token(path: &Path) -> Result<String> {
    let token = std::fs::read_to_string(path).map_err(|e| OperatorCertError::io(path, e))?;
    let token = token.trim();
    if token.is_empty() {
        return Err(OperatorCertError::config(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    Ok(token.to_string())
}

/// Resolve the comment text and append the marker tag, if any.
pub fn compose_body(comment_or_file: &str, comment_is_file: bool, tag: &str) -> Result<String> {
    let path = Path::new(comment_or_file);
    let mut body = if comment_is_file && path.exists() {
        std::fs::read_to_string(path).map_err(|e| OperatorCertError::io(path, e))?
    } else {
        comment_or_file.to_string()
    };

    if !tag.is_empty() {
        body.push_str(&format!("<!-- {tag} -->"));
    }
    Ok(body)
}

/// The last comment, in listing order, whose body contains `tag`.
pub fn select_replacement<'a>(comments: &'a [Comment], tag: &str) -> Option<&'a Comment> {
    comments.iter().rev().find(|c| c.body.contains(tag))
}

/// Post the comment, or replace the previous tagged one.
///
/// Nothing is written to `new_comment_path` unless the final request
/// succeeds.
#[instrument(skip_all, fields(request_url = %request.request_url, tag = %request.tag, replace = request.replace))]
pub async fn publish_comment(
    client: &GithubClient,
    request: &CommentRequest,
) -> Result<CommentOutcome> {
    if request.replace && request.tag.is_empty() {
        return Err(OperatorCertError::config(
            "replace requested but no comment tag specified",
        ));
    }

    let issue = IssueRef::from_request_url(&request.request_url)?;
    let body = compose_body(&request.comment_or_file, request.comment_is_file, &request.tag)?;

    let mut target = None;
    if request.replace {
        let comments = client.list_comments(&issue).await?;
        info!(count = comments.len(), "listed existing comments");

        if let Some(previous) = select_replacement(&comments, &request.tag) {
            if let Some(path) = &request.old_comment_path {
                let previous_json = serde_json::to_string_pretty(previous).map_err(|e| {
                    OperatorCertError::parse(format!("cannot serialize comment: {e}"))
                })?;
                write_output(path, previous_json.as_bytes())?;
            }
            target = Some(previous.url.clone());
        }
    }

    let (action, response) = match target {
        Some(comment_url) => {
            info!(%comment_url, "replacing tagged comment");
            let response = client.update_comment(&comment_url, &body).await?;
            (CommentAction::Updated, response)
        }
        None => {
            info!("adding new comment");
            let response = client.create_comment(&issue, &body).await?;
            (CommentAction::Created, response)
        }
    };

    write_output(&request.new_comment_path, response.as_bytes())?;
    info!(%action, "comment published");

    Ok(CommentOutcome { action, response })
}

fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    std::fs::write(path, content).map_err(|e| OperatorCertError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COMMENTS: &str = "/repos/foo/bar/issues/202/comments";

    fn comment(url: &str, body: &str) -> Comment {
        Comment {
            url: url.into(),
            body: body.into(),
            extra: Default::default(),
        }
    }

    fn request(dir: &Path, tag: &str, replace: bool) -> CommentRequest {
        CommentRequest {
            request_url: "https://github.com/foo/bar/pull/202".into(),
            comment_or_file: "demo comment on PR".into(),
            comment_is_file: false,
            tag: tag.into(),
            replace,
            old_comment_path: Some(dir.join("old-comment")),
            new_comment_path: dir.join("new-comment"),
        }
    }

    #[test]
    fn select_replacement_prefers_last_match() {
        let comments = vec![
            comment("u1", "first <!-- X -->"),
            comment("u2", "unrelated"),
            comment("u3", "second <!-- X -->"),
            comment("u4", "also unrelated"),
        ];
        assert_eq!(select_replacement(&comments, "X").unwrap().url, "u3");
        assert!(select_replacement(&comments, "Y").is_none());
    }

    #[test]
    fn compose_body_appends_tag() {
        assert_eq!(compose_body("hello", false, "").unwrap(), "hello");
        assert_eq!(compose_body("hello", false, "ci").unwrap(), "hello<!-- ci -->");
    }

    #[test]
    fn compose_body_reads_file_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("comment.md");
        std::fs::write(&file, "from file").unwrap();
        let file = file.to_string_lossy().to_string();

        assert_eq!(compose_body(&file, true, "t").unwrap(), "from file<!-- t -->");
        // Without the file flag the argument is the text itself.
        assert_eq!(compose_body(&file, false, "").unwrap(), file);
        // A missing file falls back to the literal text.
        assert_eq!(compose_body("/nonexistent/c.md", true, "").unwrap(), "/nonexistent/c.md");
    }

    #[test]
    fn load_token_trims() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("github_bot_token.txt");
        std::fs::write(&file, "abc123\n").unwrap();
        assert_eq!(load_token(&file).unwrap(), "abc123");

        std::fs::write(&file, "  \n").unwrap();
        assert!(load_token(&file).is_err());
    }

    #[test]
    fn tests_passed_only_on_success() {
        assert!(tests_passed("success"));
        assert!(!tests_passed("failure"));
    }

    #[test]
    fn action_display_matches_log_wording() {
        assert_eq!(CommentAction::Created.to_string(), "added");
        assert_eq!(CommentAction::Updated.to_string(), "updated");
    }

    #[tokio::test]
    async fn replace_without_tag_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = GithubClient::new(&server.uri(), "", "tkn".into()).unwrap();
        let err = publish_comment(&client, &request(dir.path(), "", true)).await.unwrap_err();
        assert!(matches!(err, OperatorCertError::Config { .. }));
        assert!(!dir.path().join("new-comment").exists());
    }

    #[tokio::test]
    async fn creates_comment_without_replace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .and(body_json(json!({"body": "demo comment on PR<!-- ci -->"})))
            .respond_with(ResponseTemplate::new(201).set_body_string("{\"id\":1}"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = GithubClient::new(&server.uri(), "", "tkn".into()).unwrap();
        let outcome = publish_comment(&client, &request(dir.path(), "ci", false)).await.unwrap();

        assert_eq!(outcome.action, CommentAction::Created);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("new-comment")).unwrap(),
            "{\"id\":1}"
        );
        assert!(!dir.path().join("old-comment").exists());
    }

    #[tokio::test]
    async fn replaces_last_tagged_comment() {
        let server = MockServer::start().await;
        let first = format!("{}/repos/foo/bar/issues/comments/1", server.uri());
        let second = format!("{}/repos/foo/bar/issues/comments/2", server.uri());
        Mock::given(method("GET"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"url": first, "body": "old one<!-- X -->"},
                {"url": second, "body": "newer<!-- X -->"},
                {"url": "https://api.github.com/x/3", "body": "plain"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/foo/bar/issues/comments/2"))
            .and(body_json(json!({"body": "demo comment on PR<!-- X -->"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":2}"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = GithubClient::new(&server.uri(), "", "tkn".into()).unwrap();
        let outcome = publish_comment(&client, &request(dir.path(), "X", true)).await.unwrap();

        assert_eq!(outcome.action, CommentAction::Updated);
        let old = std::fs::read_to_string(dir.path().join("old-comment")).unwrap();
        assert!(old.contains("newer<!-- X -->"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("new-comment")).unwrap(),
            "{\"id\":2}"
        );
    }

    #[tokio::test]
    async fn replace_without_match_creates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"url": "https://api.github.com/x/1", "body": "untagged"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = GithubClient::new(&server.uri(), "", "tkn".into()).unwrap();
        let outcome = publish_comment(&client, &request(dir.path(), "X", true)).await.unwrap();
        assert_eq!(outcome.action, CommentAction::Created);
    }

    #[tokio::test]
    async fn failed_post_writes_no_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = GithubClient::new(&server.uri(), "", "tkn".into()).unwrap();
        let err = publish_comment(&client, &request(dir.path(), "", false)).await.unwrap_err();

        assert!(matches!(err, OperatorCertError::Http { status: 403, .. }));
        assert!(!dir.path().join("new-comment").exists());
    }
}
