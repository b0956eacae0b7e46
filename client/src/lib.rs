//! Client-side data access for the monitoring platform dashboard.
//!
//! A [`ClientContext`] is created once at application start and handed to
//! every hook. It owns the shared response cache and the session
//! credential, so tests can build as many isolated contexts as they like.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod hooks;
pub mod models;
pub mod telemetry;

use std::sync::Arc;

use payloads::{APIClient, ClientError};

pub use cache::{CacheEvent, FetchStatus, QueryCache, Snapshot, WatchGuard};
pub use config::{Config, ConfigError};
pub use credentials::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore,
    SessionCredential, SessionCredentials, SessionError, StorageError,
};
pub use hooks::*;
pub use models::{Entity, Page};

/// Errors are shared between every consumer awaiting the same request.
pub type SharedError = Arc<ClientError>;

#[derive(Clone)]
pub struct ClientContext {
    config: Arc<Config>,
    http: reqwest::Client,
    cache: QueryCache,
    credentials: SessionCredentials,
}

impl ClientContext {
    /// Build a context whose credential lives in the configured token
    /// file, or in memory when none is configured.
    pub fn new(config: Config) -> Result<Self, StorageError> {
        let store: Arc<dyn CredentialStore> = match &config.token_path {
            Some(path) => Arc::new(FileCredentialStore::new(path)),
            None => Arc::new(MemoryCredentialStore::default()),
        };
        Self::with_store(config, store)
    }

    /// The stored token, if any, decides whether the session starts out
    /// logged in.
    pub fn with_store(
        config: Config,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, StorageError> {
        let cache = QueryCache::new(config.stale_time);
        let credentials = SessionCredentials::load(store, cache.clone())?;
        Ok(Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            cache,
            credentials,
        })
    }

    /// A client carrying the credential current at the time of the call.
    pub fn api_client(&self) -> APIClient {
        APIClient {
            address: self.config.api_address.clone(),
            inner_client: self.http.clone(),
            token: self.credentials.token(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn session(&self) -> &SessionCredentials {
        &self.credentials
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
