//! Shared error model, configuration and HTTP plumbing for the operator
//! certification pipeline tools.
//!
//! Every other crate in the workspace depends on this one. It provides:
//! - [`OperatorCertError`] — the unified error type
//! - Configuration ([`AppConfig`] and its sections, config loading)
//! - Explicit credentials ([`IibCredentials`], [`Credentials`]) resolved once
//!   at the CLI boundary
//! - HTTP helpers shared by the REST clients ([`http`])

pub mod config;
pub mod error;
pub mod http;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Credentials, DeletionFilter, GithubConfig, IibConfig, IibCredentials,
    MarketplaceConfig, PyxisConfig, config_dir, config_file_path, load_config, load_config_from,
};
pub use error::{OperatorCertError, Result};
