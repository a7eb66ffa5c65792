//! Mapping a pull request or issue URL to its comments API path.

use operatorcert_shared::{OperatorCertError, Result};
use url::Url;

/// Owner, repository and number of an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    /// Parse `https://github.com/<owner>/<repo>/pull/<n>` (or `/issues/<n>`).
    pub fn from_request_url(request_url: &str) -> Result<Self> {
        let url = Url::parse(request_url).map_err(|e| {
            OperatorCertError::validation(format!("invalid request URL '{request_url}': {e}"))
        })?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (owner, repo, last) = match segments.as_slice() {
            [owner, repo, .., last] => (*owner, *repo, *last),
            _ => {
                return Err(OperatorCertError::validation(format!(
                    "request URL '{request_url}' does not point at an issue or pull request"
                )));
            }
        };

        let number = last.parse::<u64>().map_err(|_| {
            OperatorCertError::validation(format!(
                "request URL '{request_url}' does not end with an issue number"
            ))
        })?;

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }

    /// API path of the thread's comment collection, without the host.
    pub fn comments_path(&self, api_path_prefix: &str) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            api_path_prefix.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.number
        )
    }
}
