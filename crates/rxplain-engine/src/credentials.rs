//! Local credential cache.
//!
//! A small JSON key/value file standing in for browser local storage.
//! The API credential lives under [`OPENAI_API_KEY`].

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Storage key for the cached API credential.
pub const OPENAI_API_KEY: &str = "openai_api_key";

/// File-backed key/value store for credentials.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Open a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.load()?.remove(key))
    }

    /// Write a value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    /// Remove a value. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), CredentialError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(CredentialError::Parse)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(CredentialError::Serialize)?;
        atomic_write(&self.path, json.as_bytes())?;
        Ok(())
    }
}

/// Mask a secret for display, keeping a short prefix and suffix.
pub fn masked(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "•".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

/// Write file atomically using temp file + rename.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let pid = std::process::id();

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("credentials");
    let tmp_path = path.with_file_name(format!("{file_name}.{timestamp}.{pid}.tmp"));

    let result = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

/// Errors from the credential cache.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Serialize error.
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, CredentialStore) {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path().join(".rxplain").join("credentials.json"));
        (temp, store)
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let (_temp, store) = setup_store();
        assert_eq!(store.get(OPENAI_API_KEY).unwrap(), None);
    }

    #[test]
    fn test_set_get_remove() {
        let (_temp, store) = setup_store();
        store.set(OPENAI_API_KEY, "sk-test-1234567890").unwrap();
        assert_eq!(
            store.get(OPENAI_API_KEY).unwrap().as_deref(),
            Some("sk-test-1234567890")
        );

        store.set("other", "x").unwrap();
        store.remove(OPENAI_API_KEY).unwrap();
        assert_eq!(store.get(OPENAI_API_KEY).unwrap(), None);
        assert_eq!(store.get("other").unwrap().as_deref(), Some("x"));

        store.remove("absent").unwrap();
    }

    #[test]
    fn test_no_temp_files_left() {
        let (_temp, store) = setup_store();
        store.set(OPENAI_API_KEY, "value").unwrap();

        let dir = store.path().parent().unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupted_file_is_parse_error() {
        let (_temp, store) = setup_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();
        assert!(matches!(
            store.get(OPENAI_API_KEY),
            Err(CredentialError::Parse(_))
        ));
    }

    #[test]
    fn test_masked() {
        assert_eq!(masked("sk-abcdefghijkl"), "sk-…ijkl");
        assert_eq!(masked("short"), "•••••");
        assert_eq!(masked(""), "");
    }
}
