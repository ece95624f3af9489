use std::path::{Path, PathBuf};

use tracing::warn;

use crate::types::TokenRecord;

/// Default store location, relative to the working directory.
const TOKEN_FILE: &str = ".tokens.json";

/// File-based storage for a single [`TokenRecord`].
///
/// One record per store; the deployment model is one CRM identity per
/// process. There is no inter-process locking, so two processes sharing a
/// store file can clobber each other.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(TOKEN_FILE),
        }
    }

    /// Create a token store at a specific path (useful for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored record.
    ///
    /// A missing file means "no record". Read or parse failures are
    /// downgraded to a warning and also treated as "no record"; a corrupt
    /// store must never prevent startup.
    pub fn load(&self) -> Option<TokenRecord> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read token store");
                return None;
            },
        };

        match serde_json::from_str(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not parse token store");
                None
            },
        }
    }

    /// Persist the record, then restrict the file to owner read/write.
    pub fn save(&self, record: &TokenRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(record).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Remove the store file. A missing file is not an error.
    pub fn delete(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> TokenRecord {
        let mut extra = serde_json::Map::new();
        extra.insert("token_type".into(), serde_json::json!("Bearer"));
        extra.insert("api_domain".into(), serde_json::json!("https://www.zohoapis.com"));
        TokenRecord {
            access_token: "A1".into(),
            refresh_token: Some("R1".into()),
            expires_in: Some(3600),
            expires_at: 1_700_000_000,
            extra,
        }
    }

    #[test]
    fn save_and_load_round_trips_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("tokens.json"));

        let record = sample_record();
        store.save(&record).unwrap();

        assert_eq!(store.load(), Some(record));
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{not valid json").unwrap();

        let store = TokenStore::with_path(path);
        assert_eq!(store.load(), None);
    }

    #[cfg(unix)]
    #[test]
    fn save_restricts_permissions_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("tokens.json"));
        store.save(&sample_record()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("tokens.json"));

        store.save(&sample_record()).unwrap();
        store.delete().unwrap();
        assert_eq!(store.load(), None);

        // Second delete hits a missing file and still succeeds.
        store.delete().unwrap();
    }
}
