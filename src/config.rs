//! Connection and project settings for a sync run.
//!
//! The configuration is an explicit value constructed once in `main` and
//! threaded into every component constructor. There is intentionally no
//! module-level singleton: anything that needs the settings takes a
//! `&SyncConfig` parameter.

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CasebindError;

/// Environment variable that overrides the bearer token from the config
/// file, so credentials can stay out of version control.
pub const TOKEN_ENV_VAR: &str = "CASEBIND_TOKEN";

fn default_page_size() -> usize {
    100
}

fn default_throttle_ms() -> u64 {
    250
}

fn default_extensions() -> Vec<String> {
    vec!["cb".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote test-management service, e.g.
    /// `https://tms.example.com/api/v1/`.
    pub service_url: Url,
    /// Static bearer token. Overridden by [TOKEN_ENV_VAR] when set.
    pub token: String,
    /// Project scope identifier supplied with every request.
    pub project: String,
    /// Page size for the paginated list endpoints.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Fixed delay inserted after every mutating remote call, respecting the
    /// service's request-rate limits.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// File extensions treated as source units when walking the root.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Output path of the audit snapshot, relative to the sync root.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl SyncConfig {
    /// Load settings from a TOML file, applying the token environment
    /// override if present.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CasebindError> {
        tracing::debug!("Reading sync config from {:?}", path.as_ref());
        let content = read_to_string(path.as_ref())?;
        let mut config: SyncConfig = toml::from_str(&content)?;
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            config.token = token;
        }
        if config.token.is_empty() {
            return Err(CasebindError::Config(format!(
                "No bearer token configured: set `token` in {:?} or export {TOKEN_ENV_VAR}",
                path.as_ref()
            )));
        }
        if config.page_size == 0 {
            return Err(CasebindError::Config(
                "`page_size` must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Whether a directory entry counts as a source unit.
    pub fn is_source_unit(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}
