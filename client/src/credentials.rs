//! The session credential and where it is persisted.
//!
//! There is exactly one credential per [`ClientContext`]. Every change to
//! it also clears the response cache, so data fetched under one identity
//! is never shown under another.
//!
//! [`ClientContext`]: crate::ClientContext

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use payloads::ClientError;
use secrecy::SecretString;

use crate::{QueryCache, SharedError};

/// File name used for the token inside a storage directory.
pub const SESSION_TOKEN_KEY: &str = "antenna_token";

/// Durable storage for the session token.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<SecretString>, StorageError>;
    fn save(&self, token: &SecretString) -> Result<(), StorageError>;
    fn remove(&self) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Could not access the session token at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Keeps the token in a single file. A missing file means no token.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(SESSION_TOKEN_KEY))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<SecretString>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.into()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, token: &SecretString) -> Result<(), StorageError> {
        use secrecy::ExposeSecret;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        // Write then rename so a crash never leaves a truncated token.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, token.expose_secret())
            .map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn remove(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Keeps the token for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<SecretString>>,
}

impl MemoryCredentialStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(SecretString::from(token.into()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SecretString>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<SecretString>, StorageError> {
        Ok(self.lock().clone())
    }

    fn save(&self, token: &SecretString) -> Result<(), StorageError> {
        *self.lock() = Some(token.clone());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        *self.lock() = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionCredential {
    pub logged_in: bool,
    pub token: Option<SecretString>,
}

/// Shared handle to the current credential.
#[derive(Clone)]
pub struct SessionCredentials {
    inner: Arc<CredentialsInner>,
}

struct CredentialsInner {
    current: Mutex<SessionCredential>,
    store: Arc<dyn CredentialStore>,
    cache: QueryCache,
}

impl SessionCredentials {
    /// Restore the credential from `store`. A stored token means the
    /// session starts out logged in.
    pub fn load(
        store: Arc<dyn CredentialStore>,
        cache: QueryCache,
    ) -> Result<Self, StorageError> {
        let token = store.load()?;
        let current = SessionCredential {
            logged_in: token.is_some(),
            token,
        };
        Ok(Self {
            inner: Arc::new(CredentialsInner {
                current: Mutex::new(current),
                store,
                cache,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionCredential> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn credential(&self) -> SessionCredential {
        self.lock().clone()
    }

    pub fn token(&self) -> Option<SecretString> {
        self.lock().token.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().logged_in
    }

    /// Persist and adopt a new token. Nothing changes if it cannot be
    /// persisted.
    pub fn set_token(&self, token: SecretString) -> Result<(), StorageError> {
        {
            let mut current = self.lock();
            self.inner.store.save(&token)?;
            *current = SessionCredential {
                logged_in: true,
                token: Some(token),
            };
        }
        tracing::info!("session token set");
        self.inner.cache.clear();
        Ok(())
    }

    /// Forget the token, both in memory and in storage.
    pub fn clear_token(&self) -> Result<(), StorageError> {
        {
            let mut current = self.lock();
            self.inner.store.remove()?;
            *current = SessionCredential::default();
        }
        tracing::info!("session token cleared");
        self.inner.cache.clear();
        Ok(())
    }
}

/// Failure of an operation that talks to the API and then updates the
/// credential.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Client(#[from] SharedError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ClientError> for SessionError {
    fn from(e: ClientError) -> Self {
        Self::Client(Arc::new(e))
    }
}

impl SessionError {
    pub fn is_authorization_denied(&self) -> bool {
        match self {
            Self::Client(e) => e.is_authorization_denied(),
            Self::Storage(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payloads::FetchSpecification;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    struct BrokenStore;

    impl CredentialStore for BrokenStore {
        fn load(&self) -> Result<Option<SecretString>, StorageError> {
            Ok(Some("old".into()))
        }

        fn save(&self, _: &SecretString) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: "broken".into(),
                source: io::Error::other("disk full"),
            })
        }

        fn remove(&self) -> Result<(), StorageError> {
            self.save(&"".into())
        }
    }

    #[test]
    fn file_store_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileCredentialStore::in_dir(dir.path());
        assert!(store.load()?.is_none());

        store.save(&"abc123".into())?;
        assert_eq!(
            store.load()?.map(|t| t.expose_secret().to_string()),
            Some("abc123".to_string())
        );
        assert!(store.path().ends_with(SESSION_TOKEN_KEY));

        store.remove()?;
        assert!(store.load()?.is_none());
        // Removing twice is not an error.
        store.remove()?;
        Ok(())
    }

    #[tokio::test]
    async fn stored_token_starts_logged_in() -> anyhow::Result<()> {
        let store = Arc::new(MemoryCredentialStore::with_token("t0k3n"));
        let credentials =
            SessionCredentials::load(store, QueryCache::new(Duration::ZERO))?;
        assert!(credentials.is_logged_in());
        assert_eq!(
            credentials.token().map(|t| t.expose_secret().to_string()),
            Some("t0k3n".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn changing_the_token_clears_the_cache() -> anyhow::Result<()> {
        let cache = QueryCache::new(Duration::ZERO);
        let credentials = SessionCredentials::load(
            Arc::new(MemoryCredentialStore::default()),
            cache.clone(),
        )?;
        let key = FetchSpecification::new("projects").key();
        cache.fetch(&key, async { Ok::<_, ClientError>(1u8) }).await?;
        assert_eq!(cache.len(), 1);

        credentials.set_token("new".into())?;
        assert!(cache.is_empty());
        assert!(credentials.is_logged_in());

        cache.fetch(&key, async { Ok::<_, ClientError>(1u8) }).await?;
        credentials.clear_token()?;
        assert!(cache.is_empty());
        assert!(!credentials.is_logged_in());
        assert!(credentials.token().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_keeps_the_old_credential() -> anyhow::Result<()> {
        let credentials = SessionCredentials::load(
            Arc::new(BrokenStore),
            QueryCache::new(Duration::ZERO),
        )?;
        assert!(credentials.set_token("new".into()).is_err());
        assert!(credentials.clear_token().is_err());
        assert_eq!(
            credentials.token().map(|t| t.expose_secret().to_string()),
            Some("old".to_string())
        );
        Ok(())
    }
}
