//! JSON-file API key store.
//!
//! ```json
//! { "keys": [ { "key": "sk-…", "client_name": "acme", "created_at": "…", "active": true } ] }
//! ```

use std::path::{Path, PathBuf};

use chrono::Local;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Prefix of every generated key.
pub const KEY_PREFIX: &str = "sk-";

/// One issued key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub client_name: String,
    /// Local ISO-8601 creation time.
    #[serde(default)]
    pub created_at: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ApiKeyEntry {
    /// `sk-abcde...wxyz` form for listings.
    pub fn masked(&self) -> String {
        mask_key(&self.key)
    }
}

/// A key as shown by `keys list`.
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    pub client_name: String,
    pub created_at: String,
    pub active: bool,
    pub key_prefix: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    keys: Vec<ApiKeyEntry>,
}

/// Key store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
    entries: Vec<ApiKeyEntry>,
}

impl KeyStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: Vec::new(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let file: KeyFile = serde_json::from_str(&content)
            .map_err(|e| AuthError::KeyFile(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            entries: file.keys,
        })
    }

    /// Write the store back to disk, pretty-printed.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = KeyFile {
            keys: self.entries.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ApiKeyEntry] {
        &self.entries
    }

    /// Issue a new active key for `client_name` and persist it.
    pub fn create(&mut self, client_name: &str) -> Result<ApiKeyEntry> {
        let entry = ApiKeyEntry {
            key: generate_key(),
            client_name: client_name.to_string(),
            created_at: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            active: true,
        };
        self.entries.push(entry.clone());
        self.save()?;
        tracing::info!(client = client_name, "API key created");
        Ok(entry)
    }

    /// All keys with the secret masked.
    pub fn list(&self) -> Vec<KeySummary> {
        self.entries
            .iter()
            .map(|e| KeySummary {
                client_name: e.client_name.clone(),
                created_at: e.created_at.clone(),
                active: e.active,
                key_prefix: e.masked(),
            })
            .collect()
    }

    /// Deactivate every key issued to `client_name`.
    ///
    /// Returns how many keys matched. Nothing is written when none did.
    pub fn revoke(&mut self, client_name: &str) -> Result<usize> {
        let mut matched = 0;
        for entry in self.entries.iter_mut().filter(|e| e.client_name == client_name) {
            entry.active = false;
            matched += 1;
        }
        if matched > 0 {
            self.save()?;
            tracing::info!(client = client_name, keys = matched, "API keys revoked");
        }
        Ok(matched)
    }

    /// The active entry holding `key`, if any.
    pub fn find_active(&self, key: &str) -> Option<&ApiKeyEntry> {
        self.entries.iter().find(|e| e.active && e.key == key)
    }
}

/// `sk-` followed by 32 random hex characters.
pub fn generate_key() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", KEY_PREFIX, hex)
}

/// First eight and last four characters of a key.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return key.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
