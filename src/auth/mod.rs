//! API key authentication.
//!
//! Keys live in a JSON key store that is re-read on every check, so keys
//! issued or revoked with `kwcluster keys` take effect without a restart.
//! Until a key store exists, a single configured fallback key is accepted.

mod keys;
mod middleware;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AuthError, Result};

pub use keys::{generate_key, mask_key, ApiKeyEntry, KeyStore, KeySummary, KEY_PREFIX};
pub use middleware::{AuthLayer, AuthMiddleware, API_KEY_HEADER};

/// The caller behind an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// The presented key. Used as the rate limiting key.
    pub key: String,
    /// Client the key was issued to; `None` for the fallback key.
    pub client_name: Option<String>,
}

/// Validates presented API keys.
#[derive(Debug, Clone)]
pub struct Authenticator {
    keys_file: PathBuf,
    fallback_key: String,
}

impl Authenticator {
    pub fn new(keys_file: impl Into<PathBuf>, fallback_key: impl Into<String>) -> Self {
        Self {
            keys_file: keys_file.into(),
            fallback_key: fallback_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.keys_file(), config.auth.fallback_key.clone())
    }

    pub fn keys_file(&self) -> &Path {
        &self.keys_file
    }

    /// Check a key.
    ///
    /// A missing or empty key is rejected. An unreadable key store rejects
    /// every key.
    pub fn authenticate(&self, key: Option<&str>) -> Result<ClientIdentity> {
        let key = match key.map(str::trim) {
            Some(k) if !k.is_empty() => k,
            _ => return Err(AuthError::InvalidKey.into()),
        };

        if !self.keys_file.exists() {
            if !self.fallback_key.is_empty() && key == self.fallback_key {
                return Ok(ClientIdentity {
                    key: key.to_string(),
                    client_name: None,
                });
            }
            return Err(AuthError::InvalidKey.into());
        }

        let store = match KeyStore::load(&self.keys_file) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read API key store");
                return Err(AuthError::InvalidKey.into());
            }
        };

        store
            .find_active(key)
            .map(|entry| ClientIdentity {
                key: entry.key.clone(),
                client_name: Some(entry.client_name.clone()),
            })
            .ok_or_else(|| AuthError::InvalidKey.into())
    }
}
