//! Credential sources for the extraction service.
//!
//! The batch never reads secrets itself; it asks a [`CredentialProvider`]
//! once, when the extractor is built. An absent or empty key means the
//! service is not configured and every batch stops at its precondition
//! check.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default location of the persisted key, relative to the working directory.
pub const DEFAULT_KEY_FILE: &str = "api_key.json";

/// Supplies the API key, or `None` when no key is configured.
pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Option<String>;
}

/// A key known up front (e.g. from a CLI flag).
#[derive(Debug, Clone, Default)]
pub struct StaticKey(pub Option<String>);

impl CredentialProvider for StaticKey {
    fn api_key(&self) -> Option<String> {
        non_empty(self.0.clone())
    }
}

/// A key read from an environment variable at lookup time.
#[derive(Debug, Clone)]
pub struct EnvKey {
    pub var: String,
}

impl EnvKey {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvKey {
    fn api_key(&self) -> Option<String> {
        non_empty(std::env::var(&self.var).ok())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyFileContents {
    api_key: Option<String>,
}

/// A key persisted as `{"api_key": "..."}` in a local JSON file.
#[derive(Debug, Clone)]
pub struct KeyFile {
    pub path: PathBuf,
}

impl Default for KeyFile {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_FILE)
    }
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store `api_key`, replacing any existing file.
    pub fn save(&self, api_key: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string(&KeyFileContents {
            api_key: Some(api_key.to_string()),
        })?;
        std::fs::write(&self.path, body)?;
        restrict_permissions(&self.path);
        debug!("Saved API key to {}", self.path.display());
        Ok(())
    }
}

impl CredentialProvider for KeyFile {
    fn api_key(&self) -> Option<String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read key file {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<KeyFileContents>(&raw) {
            Ok(c) => non_empty(c.api_key),
            Err(e) => {
                warn!("Key file {} is not valid JSON: {}", self.path.display(), e);
                None
            }
        }
    }
}

/// Tries each provider in order; the first non-empty key wins.
#[derive(Default)]
pub struct ChainedCredentials {
    sources: Vec<Box<dyn CredentialProvider>>,
}

impl ChainedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl CredentialProvider + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl CredentialProvider for ChainedCredentials {
    fn api_key(&self) -> Option<String> {
        self.sources.iter().find_map(|s| s.api_key())
    }
}

fn non_empty(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!("Could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
