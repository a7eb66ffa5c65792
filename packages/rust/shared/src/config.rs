//! Application configuration for the pipeline tools.
//!
//! Optional config lives at `~/.operatorcert/operatorcert.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Credentials never live in the file. The file only names the environment
//! variables holding them; [`Credentials::from_env`] resolves them once at the
//! CLI boundary and the result is handed to each component explicitly.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OperatorCertError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "operatorcert.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".operatorcert";

/// File name of the bot token inside the `$GITHUBTOKEN` secret mount.
const GITHUB_TOKEN_FILE_NAME: &str = "github_bot_token.txt";

// ---------------------------------------------------------------------------
// Config structs (matching operatorcert.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog API settings.
    #[serde(default)]
    pub pyxis: PyxisConfig,

    /// Index image build service settings.
    #[serde(default)]
    pub iib: IibConfig,

    /// Git hosting (comment API) settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Marketplace mirror settings.
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
}

/// How soft-deleted catalog records are excluded from existence checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionFilter {
    /// The catalog evaluates `not(deleted==true)` itself.
    #[default]
    ServerSide,
    /// The catalog cannot negate; deleted matches are counted client-side.
    Compensated,
}

impl FromStr for DeletionFilter {
    type Err = OperatorCertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "server-side" => Ok(Self::ServerSide),
            "compensated" => Ok(Self::Compensated),
            other => Err(OperatorCertError::validation(format!(
                "unknown deletion filter '{other}': expected 'server-side' or 'compensated'"
            ))),
        }
    }
}

/// `[pyxis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyxisConfig {
    /// Base URL of the catalog API.
    #[serde(default = "default_pyxis_url")]
    pub url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_pyxis_api_key_env")]
    pub api_key_env: String,

    /// Existence-check variant supported by the target deployment.
    #[serde(default)]
    pub deletion_filter: DeletionFilter,
}

impl Default for PyxisConfig {
    fn default() -> Self {
        Self {
            url: default_pyxis_url(),
            api_key_env: default_pyxis_api_key_env(),
            deletion_filter: DeletionFilter::default(),
        }
    }
}

fn default_pyxis_url() -> String {
    "https://pyxis.engineering.redhat.com".into()
}
fn default_pyxis_api_key_env() -> String {
    "PYXIS_API_KEY".into()
}

/// `[iib]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IibConfig {
    /// Base URL of the IIB API.
    #[serde(default = "default_iib_url")]
    pub url: String,

    /// Maximum time to wait for a build to reach a terminal state.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed delay between two status reads.
    #[serde(default = "default_poll_delay_secs")]
    pub poll_delay_secs: u64,

    /// Architectures requested for every index build.
    #[serde(default = "default_add_arches")]
    pub add_arches: Vec<String>,
}

impl Default for IibConfig {
    fn default() -> Self {
        Self {
            url: default_iib_url(),
            timeout_secs: default_timeout_secs(),
            poll_delay_secs: default_poll_delay_secs(),
            add_arches: default_add_arches(),
        }
    }
}

fn default_iib_url() -> String {
    "https://iib.engineering.redhat.com".into()
}
fn default_timeout_secs() -> u64 {
    30 * 60
}
fn default_poll_delay_secs() -> u64 {
    20
}
fn default_add_arches() -> Vec<String> {
    vec!["amd64".into(), "s390x".into(), "ppc64le".into()]
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API host. A bare host means `https://`; plain `http://` is allowed for
    /// test servers.
    #[serde(default = "default_github_host")]
    pub host_url: String,

    /// Path prefix for GitHub Enterprise (e.g. `/api/v3`).
    #[serde(default)]
    pub api_path_prefix: String,

    /// Explicit token file. Falls back to `$GITHUBTOKEN/github_bot_token.txt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            host_url: default_github_host(),
            api_path_prefix: String::new(),
            token_file: None,
        }
    }
}

impl GithubConfig {
    /// Resolve where the bot token is read from, if anywhere.
    pub fn resolve_token_file(&self) -> Option<PathBuf> {
        self.token_file.clone().or_else(|| {
            std::env::var_os("GITHUBTOKEN").map(|dir| PathBuf::from(dir).join(GITHUB_TOKEN_FILE_NAME))
        })
    }
}

fn default_github_host() -> String {
    "https://api.github.com".into()
}

/// `[marketplace]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    /// Base URL of the mirror RPC service. There is no default; it must be
    /// configured here or passed on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Substring identifying marketplace repositories.
    #[serde(default = "default_repo_pattern")]
    pub repo_pattern: String,

    /// Name of the env var holding the mirror bearer token.
    #[serde(default = "default_webhook_token_env")]
    pub token_env: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            repo_pattern: default_repo_pattern(),
            token_env: default_webhook_token_env(),
        }
    }
}

fn default_repo_pattern() -> String {
    "redhat-marketplace-operators".into()
}
fn default_webhook_token_env() -> String {
    "IBM_WEBHOOK_TOKEN".into()
}

// ---------------------------------------------------------------------------
// Credentials (runtime, resolved from the environment once)
// ---------------------------------------------------------------------------

/// Tokens forwarded to IIB with every add-build request.
#[derive(Debug, Clone, Default)]
pub struct IibCredentials {
    /// Quay CNR token (`CNR_TOKEN`).
    pub cnr_token: Option<String>,
    /// Quay user allowed to overwrite the index (`QUAY_USER`).
    pub quay_user: Option<String>,
    /// Password/token for `quay_user` (`QUAY_TOKEN`).
    pub quay_token: Option<String>,
}

/// Every secret the tools may need, resolved in one place.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Catalog API key, sent as `X-API-KEY`.
    pub pyxis_api_key: Option<String>,
    /// IIB build tokens.
    pub iib: IibCredentials,
    /// Mirror service bearer token.
    pub webhook_token: Option<String>,
}

impl Credentials {
    /// Read all credentials from the environment, honoring the variable names
    /// configured in `config`. Empty values are treated as absent.
    pub fn from_env(config: &AppConfig) -> Self {
        Self {
            pyxis_api_key: non_empty_env(&config.pyxis.api_key_env),
            iib: IibCredentials {
                cnr_token: non_empty_env("CNR_TOKEN"),
                quay_user: non_empty_env("QUAY_USER"),
                quay_token: non_empty_env("QUAY_TOKEN"),
            },
            webhook_token: non_empty_env(&config.marketplace.token_env),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.operatorcert/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OperatorCertError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.operatorcert/operatorcert.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OperatorCertError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        OperatorCertError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("timeout_secs = 1800"));
        assert!(toml_str.contains("IBM_WEBHOOK_TOKEN"));
        assert!(toml_str.contains("deletion_filter = \"server-side\""));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[pyxis]
url = "https://catalog.example.com/api/containers/"
deletion_filter = "compensated"

[iib]
poll_delay_secs = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pyxis.deletion_filter, DeletionFilter::Compensated);
        assert_eq!(config.pyxis.api_key_env, "PYXIS_API_KEY");
        assert_eq!(config.iib.poll_delay_secs, 5);
        assert_eq!(config.iib.timeout_secs, 1800);
        assert_eq!(config.iib.add_arches, vec!["amd64", "s390x", "ppc64le"]);
        assert_eq!(config.marketplace.repo_pattern, "redhat-marketplace-operators");
        assert!(config.marketplace.webhook_url.is_none());
    }

    #[test]
    fn webhook_url_is_read_when_set() {
        let toml_str = r#"
[marketplace]
webhook_url = "https://mirror.example.com"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(
            config.marketplace.webhook_url.as_deref(),
            Some("https://mirror.example.com")
        );
        assert_eq!(config.marketplace.token_env, "IBM_WEBHOOK_TOKEN");
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[github]\napi_path_prefix = \"/api/v3\"\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.github.api_path_prefix, "/api/v3");
        assert_eq!(config.github.host_url, "https://api.github.com");
    }

    #[test]
    fn load_config_reports_bad_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[iib\n").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn deletion_filter_from_str() {
        assert_eq!(
            "compensated".parse::<DeletionFilter>().unwrap(),
            DeletionFilter::Compensated
        );
        assert!("sometimes".parse::<DeletionFilter>().is_err());
    }

    #[test]
    fn explicit_token_file_wins() {
        let config = GithubConfig {
            token_file: Some(PathBuf::from("/secrets/token.txt")),
            ..GithubConfig::default()
        };
        assert_eq!(
            config.resolve_token_file(),
            Some(PathBuf::from("/secrets/token.txt"))
        );
    }

    #[test]
    fn credentials_ignore_empty_values() {
        let mut config = AppConfig::default();
        // Unique names to avoid interfering with other tests
        config.pyxis.api_key_env = "OPCERT_TEST_UNSET_PYXIS_KEY_9876".into();
        config.marketplace.token_env = "OPCERT_TEST_UNSET_WEBHOOK_9876".into();
        let creds = Credentials::from_env(&config);
        assert!(creds.pyxis_api_key.is_none());
        assert!(creds.webhook_token.is_none());
    }
}
