//! Application state management

use std::sync::Arc;

use crate::auth::TokenStore;
use crate::config::Config;
use crate::service::FileService;

/// Shared application state
///
/// Built once at server start and dropped on shutdown; every handler reaches
/// the file registry through it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    files: FileService,
    tokens: TokenStore,
}

impl AppState {
    /// Create a new application state with an empty registry
    pub fn new(config: Config) -> Self {
        let files = FileService::new(config.upload.max_chunks);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                files,
                tokens: TokenStore::new(),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the file service
    pub fn files(&self) -> &FileService {
        &self.inner.files
    }

    /// Get the token store
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Remove spooled upload files still owned by the registry
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application state...");

        let registry = self.files().registry();
        for key in registry.keys().await {
            let is_disk = registry
                .get(&key)
                .await
                .is_some_and(|object| object.content.path().is_some());
            if !is_disk {
                continue;
            }
            if let Err(e) = registry.remove(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to remove spooled file");
            }
        }
    }
}
