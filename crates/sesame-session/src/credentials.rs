//! Session credentials and their on-disk form.

use crate::error::CredentialsError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sesame_core::SessionConfig;
use std::path::{Path, PathBuf};

/// Local storage keys that make up a resumable session.
pub const CREDENTIAL_KEYS: [&str; 4] = ["WABrowserId", "WASecretBundle", "WAToken1", "WAToken2"];

/// Key dropped under multi-device; restoring it corrupts re-authentication.
pub const MULTI_DEVICE_EXCLUDED_KEY: &str = "WABrowserId";

/// The local storage tokens needed to resume a session without a QR scan.
///
/// Serialized as JSON with absent tokens omitted, then base64 encoded.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    #[serde(rename = "WABrowserId", default, skip_serializing_if = "Option::is_none")]
    pub browser_id: Option<String>,
    #[serde(rename = "WASecretBundle", default, skip_serializing_if = "Option::is_none")]
    pub secret_bundle: Option<String>,
    #[serde(rename = "WAToken1", default, skip_serializing_if = "Option::is_none")]
    pub token1: Option<String>,
    #[serde(rename = "WAToken2", default, skip_serializing_if = "Option::is_none")]
    pub token2: Option<String>,
}

impl SessionCredentials {
    /// Picks the credential tokens out of a local storage snapshot.
    pub fn from_local_storage(storage: &Value, multi_device: bool) -> Self {
        let token = |key: &str| storage.get(key).and_then(Value::as_str).map(str::to_string);
        let mut credentials = Self {
            browser_id: token("WABrowserId"),
            secret_bundle: token("WASecretBundle"),
            token1: token("WAToken1"),
            token2: token("WAToken2"),
        };
        if multi_device {
            info!("Multi-device detected. Removing {} from session data to prevent re-auth corruption", MULTI_DEVICE_EXCLUDED_KEY);
            credentials.browser_id = None;
        }
        credentials
    }

    pub fn to_json(&self) -> Result<Value, CredentialsError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_base64(&self) -> Result<String, CredentialsError> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CredentialsError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Stores base64 credentials at `<session_data_path>/<id>.data.json`, or at
/// `session_data_path` itself when it already names a `.data.json` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_session(config: &SessionConfig) -> Self {
        let configured = config.session_data_path.as_deref();
        let path = match configured {
            Some(p) if p.to_string_lossy().contains(".data.json") => p.to_path_buf(),
            Some(dir) => dir.join(format!("{}.data.json", config.id)),
            None => PathBuf::from(format!("{}.data.json", config.id)),
        };
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, encoded: &str) -> Result<(), CredentialsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, encoded).await?;
        debug!("Session data written to {}", self.path.display());
        Ok(())
    }

    /// Reads the stored base64 credentials, if any.
    pub async fn load(&self) -> Result<Option<String>, CredentialsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the stored credentials. Returns whether a file was removed.
    pub async fn delete(&self) -> Result<bool, CredentialsError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Deleted session data file {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage() -> Value {
        json!({
            "WABrowserId": "\"browser-1\"",
            "WASecretBundle": "{\"key\":\"k\",\"encKey\":\"e\",\"macKey\":\"m\"}",
            "WAToken1": "\"t1\"",
            "WAToken2": "\"1@t2\"",
            "last-wid": "\"123@c.us\"",
        })
    }

    #[test]
    fn round_trips_through_base64_json() {
        let credentials = SessionCredentials::from_local_storage(&storage(), false);
        let encoded = credentials.to_base64().unwrap();
        let decoded = SessionCredentials::from_base64(&encoded).unwrap();
        assert_eq!(decoded, credentials);

        let raw: Value = serde_json::from_slice(&STANDARD.decode(&encoded).unwrap()).unwrap();
        let keys: Vec<_> = raw.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        for key in CREDENTIAL_KEYS {
            assert!(raw.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn multi_device_drops_the_browser_id() {
        let credentials = SessionCredentials::from_local_storage(&storage(), true);
        let encoded = credentials.to_base64().unwrap();
        let raw: Value = serde_json::from_slice(&STANDARD.decode(&encoded).unwrap()).unwrap();
        assert!(raw.get(MULTI_DEVICE_EXCLUDED_KEY).is_none());
        assert_eq!(raw.as_object().unwrap().len(), 3);

        let decoded = SessionCredentials::from_base64(&encoded).unwrap();
        assert_eq!(decoded.browser_id, None);
        assert_eq!(decoded.token2.as_deref(), Some("\"1@t2\""));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            SessionCredentials::from_base64("not base64!"),
            Err(CredentialsError::Decode(_))
        ));
        let not_json = STANDARD.encode("NUKE");
        assert!(matches!(
            SessionCredentials::from_base64(&not_json),
            Err(CredentialsError::Json(_))
        ));
    }

    #[test]
    fn derives_the_file_path() {
        let mut config = SessionConfig {
            id: "shop".into(),
            ..Default::default()
        };
        assert_eq!(FileCredentialStore::for_session(&config).path(), Path::new("shop.data.json"));

        config.session_data_path = Some(PathBuf::from("/data/sessions"));
        assert_eq!(
            FileCredentialStore::for_session(&config).path(),
            Path::new("/data/sessions/shop.data.json")
        );

        config.session_data_path = Some(PathBuf::from("/data/custom.data.json"));
        assert_eq!(
            FileCredentialStore::for_session(&config).path(),
            Path::new("/data/custom.data.json")
        );
    }

    #[tokio::test]
    async fn file_store_saves_loads_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("s.data.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let encoded = SessionCredentials::from_local_storage(&storage(), false)
            .to_base64()
            .unwrap();
        store.save(&encoded).await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some(encoded.as_str()));

        assert!(store.delete().await.unwrap());
        assert!(!store.delete().await.unwrap());
        assert_eq!(store.load().await.unwrap(), None);
    }
}
