//! Guarded forwarding of bundle publications to the mirror service.

use tracing::{info, instrument};

use operatorcert_shared::{OperatorCertError, Result};

use crate::rpc::{BundleData, MirrorService, NewOperatorBundlesRequest};

/// A bundle that has just been published.
#[derive(Debug, Clone)]
pub struct ReplicationEvent {
    /// Repository the bundle was published from.
    pub git_repo_url: String,
    pub package: String,
    pub ocp_version: String,
    pub bundle_image_digest: String,
    pub bundle_image: String,
    pub version: String,
}

impl ReplicationEvent {
    fn to_request(&self) -> NewOperatorBundlesRequest {
        NewOperatorBundlesRequest {
            data: vec![BundleData {
                package_name: self.package.clone(),
                ocp_version: self.ocp_version.clone(),
                bundle_image_digest: self.bundle_image_digest.clone(),
                bundle_image: self.bundle_image.clone(),
                version: self.version.clone(),
            }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// Not a marketplace repository; nothing was sent.
    Skipped,
    /// The mirror service acknowledged the bundle.
    Notified,
}

/// Whether bundles from `git_repo_url` are mirrored.
pub fn is_replication_target(git_repo_url: &str, repo_pattern: &str) -> bool {
    git_repo_url.contains(repo_pattern)
}

/// Forward `event` to the mirror service when it comes from a marketplace
/// repository.
///
/// `connect` builds the client from the bearer token. It is only called once
/// the repository matched and a token is present, so a missing token fails
/// before any connection is made.
#[instrument(skip_all, fields(repo = %event.git_repo_url, package = %event.package))]
pub async fn notify_replication<S, F>(
    event: &ReplicationEvent,
    repo_pattern: &str,
    token: Option<&str>,
    connect: F,
) -> Result<ReplicationOutcome>
where
    S: MirrorService,
    F: FnOnce(&str) -> Result<S>,
{
    if !is_replication_target(&event.git_repo_url, repo_pattern) {
        info!("not a marketplace repository, skipping replication");
        return Ok(ReplicationOutcome::Skipped);
    }

    let token = token.filter(|t| !t.is_empty()).ok_or_else(|| {
        OperatorCertError::config("mirror service token is not set, cannot notify marketplace")
    })?;

    let client = connect(token)?;
    client.new_operator_bundles(&event.to_request()).await?;
    info!(version = %event.version, "marketplace notified about new bundle");

    Ok(ReplicationOutcome::Notified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Mutex;

    use crate::rpc::Empty;

    const PATTERN: &str = "redhat-marketplace-operators";

    #[derive(Default)]
    struct FakeMirror {
        calls: Mutex<Vec<NewOperatorBundlesRequest>>,
    }

    impl MirrorService for &FakeMirror {
        async fn new_operator_bundles(&self, request: &NewOperatorBundlesRequest) -> Result<Empty> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(Empty {})
        }
    }

    fn event(repo: &str) -> ReplicationEvent {
        ReplicationEvent {
            git_repo_url: repo.into(),
            package: "test-package".into(),
            ocp_version: "v1.1".into(),
            bundle_image_digest: "test-image-digest".into(),
            bundle_image: "test-image".into(),
            version: "test-version".into(),
        }
    }

    #[test]
    fn target_matching() {
        assert!(is_replication_target(
            "git@github.com/redhat-openshift-ecosystem/redhat-marketplace-operators-preprod",
            PATTERN
        ));
        assert!(!is_replication_target("https://github.com/some-other-repo", PATTERN));
    }

    #[tokio::test]
    async fn other_repository_never_connects() {
        let connected = Cell::new(false);
        let fake = FakeMirror::default();

        let outcome = notify_replication(
            &event("https://github.com/some-other-repo"),
            PATTERN,
            Some("123"),
            |_| {
                connected.set(true);
                Ok(&fake)
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, ReplicationOutcome::Skipped);
        assert!(!connected.get());
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_token_fails_before_connecting() {
        let connected = Cell::new(false);
        let fake = FakeMirror::default();

        for token in [None, Some("")] {
            let err = notify_replication(
                &event("git@github.com/redhat-openshift-ecosystem/redhat-marketplace-operators"),
                PATTERN,
                token,
                |_| {
                    connected.set(true);
                    Ok(&fake)
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, OperatorCertError::Config { .. }));
        }
        assert!(!connected.get());
    }

    #[tokio::test]
    async fn marketplace_repository_sends_one_call() {
        let fake = FakeMirror::default();

        let outcome = notify_replication(
            &event("git@github.com/redhat-openshift-ecosystem/redhat-marketplace-operators-preprod"),
            PATTERN,
            Some("123"),
            |token| {
                assert_eq!(token, "123");
                Ok(&fake)
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, ReplicationOutcome::Notified);
        let calls = fake.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].data[0],
            BundleData {
                package_name: "test-package".into(),
                ocp_version: "v1.1".into(),
                bundle_image_digest: "test-image-digest".into(),
                bundle_image: "test-image".into(),
                version: "test-version".into(),
            }
        );
    }
}
