/// Explicitly constructed collaborators
///
/// Built once at startup from [`Config`] and handed to everything that talks
/// to the outside world. Each missing credential is reported once and its
/// collaborator falls back to offline mode:
/// - no database project or key: in-process [`MemoryStore`]
/// - no identity key: in-process [`MemoryAuth`]
/// - no text generation key: an [`AiGate`] that answers with the unavailable sentinel
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::ai::{AiGate, GeminiGenerator};
use crate::services::auth::{IdentityToolkitAuth, MemoryAuth, RemoteAuth};
use crate::store::{DataPaths, FirestoreStore, MemoryStore, RemoteStore};

#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn RemoteStore>,
    pub auth: Arc<dyn RemoteAuth>,
    pub ai: AiGate,
    pub paths: DataPaths,
    pub edit_timeout: Duration,
}

impl ServiceContext {
    pub fn new(
        config: &Config,
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn RemoteAuth>,
        ai: AiGate,
    ) -> Self {
        Self {
            store,
            auth,
            ai,
            paths: DataPaths::new(config.data_root.clone(), config.app_id.clone()),
            edit_timeout: config.optimistic_edit_timeout(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        for name in config.missing_credentials() {
            tracing::warn!(variable = name, "Credential not configured, running degraded");
        }

        let auth: Arc<dyn RemoteAuth> = match config.firebase_api_key.as_deref() {
            Some(api_key) if config.auth_configured() => Arc::new(IdentityToolkitAuth::new(
                config.identity_api_url.clone(),
                api_key.to_string(),
            )),
            _ => Arc::new(MemoryAuth::new()),
        };

        let store: Arc<dyn RemoteStore> = match (
            config.firebase_api_key.as_deref(),
            config.firebase_project_id.as_deref(),
        ) {
            (Some(api_key), Some(project_id)) if config.store_configured() => {
                Arc::new(FirestoreStore::new(
                    config.firestore_api_url.clone(),
                    api_key.to_string(),
                    project_id.to_string(),
                    config.watch_poll_interval(),
                    auth.clone(),
                ))
            }
            _ => Arc::new(MemoryStore::new()),
        };

        let ai = match config.gemini_api_key.as_deref() {
            Some(api_key) if config.ai_configured() => AiGate::new(
                Arc::new(GeminiGenerator::new(
                    api_key.to_string(),
                    config.gemini_api_url.clone(),
                )),
                config.gemini_model.clone(),
            ),
            _ => AiGate::unconfigured(),
        };

        tracing::info!(
            store = store.name(),
            auth = auth.name(),
            ai_configured = ai.is_configured(),
            app_id = %config.app_id,
            "Service context ready"
        );

        Self::new(config, store, auth, ai)
    }

    /// Fully in-process context: memory store, memory auth, no text generation
    pub fn offline(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryAuth::new()),
            AiGate::unconfigured(),
        )
    }

    /// Stops background work owned by the collaborators
    pub fn shutdown(&self) {
        self.store.shutdown();
        tracing::info!(store = self.store.name(), "Service context shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_degrade_to_offline() {
        let context = ServiceContext::from_config(&Config::default());
        assert_eq!(context.store.name(), "memory");
        assert_eq!(context.auth.name(), "memory");
        assert!(!context.ai.is_configured());
    }

    #[test]
    fn test_configured_credentials_select_hosted_services() {
        let config = Config {
            firebase_api_key: Some("key".to_string()),
            firebase_project_id: Some("project".to_string()),
            gemini_api_key: Some("gemini".to_string()),
            ..Config::default()
        };
        let context = ServiceContext::from_config(&config);
        assert_eq!(context.store.name(), "firestore");
        assert_eq!(context.auth.name(), "identity_toolkit");
        assert!(context.ai.is_configured());
        context.shutdown();
    }
}
