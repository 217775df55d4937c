//! Remote store session.
//!
//! The watch session holds exactly one [`RemoteStore`], chosen once from the
//! context's [`SyncMode`]. Calls are blocking; async callers run them on the
//! blocking pool.

use std::path::Path;
use std::sync::Arc;

use slate_core::{AssetKey, SyncMode};

use crate::error::SyncError;
use crate::theme::ThemeStore;

/// A content store mirroring the output tree.
pub trait RemoteStore: Send + Sync {
    /// Push the file at `path` under `key`.
    fn sync(&self, key: &AssetKey, path: &Path) -> Result<(), SyncError>;

    /// Remove `key` from the store.
    fn unsync(&self, key: &AssetKey) -> Result<(), SyncError>;

    /// Human-readable target, for the startup log line.
    fn describe(&self) -> String;
}

/// Store used in local-only mode: every call succeeds without I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnlyStore;

impl RemoteStore for LocalOnlyStore {
    fn sync(&self, key: &AssetKey, _path: &Path) -> Result<(), SyncError> {
        tracing::debug!("local-only: skipping upload of {key}");
        Ok(())
    }

    fn unsync(&self, key: &AssetKey) -> Result<(), SyncError> {
        tracing::debug!("local-only: skipping removal of {key}");
        Ok(())
    }

    fn describe(&self) -> String {
        "local-only (no remote store)".to_string()
    }
}

/// Open the store session for `mode`.
pub fn connect(mode: &SyncMode) -> Arc<dyn RemoteStore> {
    match mode {
        SyncMode::LocalOnly => Arc::new(LocalOnlyStore),
        SyncMode::Remote(creds) => Arc::new(ThemeStore::new(creds.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_core::RemoteCredentials;

    #[test]
    fn local_only_store_accepts_everything() {
        let store = connect(&SyncMode::LocalOnly);
        let key = AssetKey::from("layout/theme.liquid");
        store
            .sync(&key, Path::new("/does/not/exist"))
            .expect("sync");
        store.unsync(&key).expect("unsync");
        assert!(store.describe().contains("local-only"));
    }

    #[test]
    fn remote_mode_connects_theme_store() {
        let store = connect(&SyncMode::Remote(RemoteCredentials {
            store: "demo.myshopify.com".to_string(),
            password: "pw".to_string(),
            theme_id: "42".to_string(),
            api_version: "2024-01".to_string(),
        }));
        let described = store.describe();
        assert!(described.contains("demo.myshopify.com"), "got: {described}");
        assert!(described.contains("42"), "got: {described}");
        assert!(!described.contains("pw"), "got: {described}");
    }
}
