//! `MirrorService` schema and client.
//!
//! ```text
//! package marketplace.redhat.com.package.certification;
//!
//! service MirrorService {
//!   rpc NewOperatorBundles(NewOperatorBundlesRequest) returns (google.protobuf.Empty);
//! }
//!
//! message NewOperatorBundlesRequest {
//!   repeated pyxis.redhat.com.package.pc_api.Data data = 10;
//! }
//! ```
//!
//! Messages use the protobuf JSON mapping (lowerCamelCase field names).
//! Requests are `POST {base}/twirp/{service}/{method}` with
//! `Content-Type: application/json`; failures come back as a Twirp error
//! envelope `{"code": ..., "msg": ...}`.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use operatorcert_shared::http::{self, DEFAULT_TIMEOUT_SECS};
use operatorcert_shared::{OperatorCertError, Result};

/// Fully qualified service name.
pub const SERVICE_NAME: &str = "marketplace.redhat.com.package.certification.MirrorService";

/// Path prefix of every Twirp route.
const TWIRP_PREFIX: &str = "twirp";

/// One published bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleData {
    pub package_name: String,
    /// Target OpenShift version.
    pub ocp_version: String,
    pub bundle_image_digest: String,
    pub bundle_image: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOperatorBundlesRequest {
    pub data: Vec<BundleData>,
}

/// `google.protobuf.Empty`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

/// The mirror service's single unary method.
pub trait MirrorService {
    fn new_operator_bundles(
        &self,
        request: &NewOperatorBundlesRequest,
    ) -> impl Future<Output = Result<Empty>> + Send;
}

#[derive(Deserialize)]
struct TwirpError {
    code: String,
    #[serde(default)]
    msg: String,
}

/// Twirp JSON client for [`MirrorService`].
#[derive(Debug, Clone)]
pub struct MirrorServiceClient {
    http: Client,
    base_url: String,
    token: String,
}

impl MirrorServiceClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        http::join_url(base_url, TWIRP_PREFIX)?;
        Ok(Self {
            http: http::build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            base_url: base_url.to_string(),
            token: token.to_string(),
        })
    }

    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let url = http::join_url(&self.base_url, &format!("{TWIRP_PREFIX}/{SERVICE_NAME}/{method}"))?;
        debug!(%url, "calling mirror service");

        let response = self
            .http
            .post(url.clone())
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| OperatorCertError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OperatorCertError::Network(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            error!(%url, status = status.as_u16(), %body, "mirror service call failed");
            return Err(match serde_json::from_str::<TwirpError>(&body) {
                Ok(twirp) => OperatorCertError::Rpc {
                    code: twirp.code,
                    message: twirp.msg,
                },
                Err(_) => OperatorCertError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                },
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| OperatorCertError::parse(format!("unexpected {method} response: {e}")))
    }
}

impl MirrorService for MirrorServiceClient {
    async fn new_operator_bundles(&self, request: &NewOperatorBundlesRequest) -> Result<Empty> {
        self.call("NewOperatorBundles", request).await
    }
}
