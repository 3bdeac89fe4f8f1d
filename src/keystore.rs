//! API key persistence.
//!
//! The key is the only state that outlives a run. It lives in a small TOML
//! file under a fixed entry name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default key file in the working directory.
pub const DEFAULT_KEY_FILE: &str = ".intelwatch_key.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    intel_api_key: Option<String>,
}

/// Where the resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Flag,
    Environment,
    KeyStore,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Flag => write!(f, "command line"),
            KeySource::Environment => write!(f, "environment"),
            KeySource::KeyStore => write!(f, "key store"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored key. A missing file or blank entry yields `None`.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read key file: {}", self.path.display()))?;
        let file: KeyFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse key file: {}", self.path.display()))?;

        Ok(non_blank(file.intel_api_key))
    }

    /// Persist `key`, replacing any previous one.
    pub fn save(&self, key: &str) -> Result<()> {
        let file = KeyFile {
            intel_api_key: Some(key.trim().to_string()),
        };
        let content = toml::to_string(&file).context("Failed to encode key file")?;

        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write key file: {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict key file: {}", self.path.display()))?;
        }

        debug!("Saved API key to {}", self.path.display());
        Ok(())
    }
}

fn non_blank(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

/// Pick the first usable key: flag, then `env_var`, then the key store.
pub fn resolve_api_key(
    flag: Option<&str>,
    env_var: &str,
    store: &KeyStore,
) -> Result<Option<(String, KeySource)>> {
    resolve_with(flag, std::env::var(env_var).ok(), store)
}

fn resolve_with(
    flag: Option<&str>,
    env_value: Option<String>,
    store: &KeyStore,
) -> Result<Option<(String, KeySource)>> {
    if let Some(key) = non_blank(flag.map(str::to_string)) {
        return Ok(Some((key, KeySource::Flag)));
    }
    if let Some(key) = non_blank(env_value) {
        return Ok(Some((key, KeySource::Environment)));
    }
    Ok(store.load()?.map(|key| (key, KeySource::KeyStore)))
}
