use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
///
/// Every credential is optional. A missing credential degrades the matching
/// collaborator to its offline mode instead of failing startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Tenant identifier used to scope every document path
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// First segment of every document path
    #[serde(default = "default_data_root")]
    pub data_root: String,

    /// Hosted database / identity provider API key
    #[serde(default)]
    pub firebase_api_key: Option<String>,

    /// Hosted database project
    #[serde(default)]
    pub firebase_project_id: Option<String>,

    #[serde(default = "default_firestore_api_url")]
    pub firestore_api_url: String,

    #[serde(default = "default_identity_api_url")]
    pub identity_api_url: String,

    /// Text generation API key
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    /// Polling period for hosted query watches
    #[serde(default = "default_watch_poll_interval_ms")]
    pub watch_poll_interval_ms: u64,

    /// How long an optimistic edit may stay pending before it is dropped
    #[serde(default = "default_optimistic_edit_timeout_ms")]
    pub optimistic_edit_timeout_ms: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_app_id() -> String {
    "cinesphere-default".to_string()
}

fn default_data_root() -> String {
    "artifacts".to_string()
}

fn default_firestore_api_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_identity_api_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_watch_poll_interval_ms() -> u64 {
    2000
}

fn default_optimistic_edit_timeout_ms() -> u64 {
    10_000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            data_root: default_data_root(),
            firebase_api_key: None,
            firebase_project_id: None,
            firestore_api_url: default_firestore_api_url(),
            identity_api_url: default_identity_api_url(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_api_url: default_gemini_api_url(),
            watch_poll_interval_ms: default_watch_poll_interval_ms(),
            optimistic_edit_timeout_ms: default_optimistic_edit_timeout_ms(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Both the database project and the API key are present
    pub fn store_configured(&self) -> bool {
        non_blank(&self.firebase_api_key) && non_blank(&self.firebase_project_id)
    }

    pub fn auth_configured(&self) -> bool {
        non_blank(&self.firebase_api_key)
    }

    pub fn ai_configured(&self) -> bool {
        non_blank(&self.gemini_api_key)
    }

    /// Names of the environment variables whose absence degrades a feature
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !non_blank(&self.firebase_api_key) {
            missing.push("FIREBASE_API_KEY");
        }
        if !non_blank(&self.firebase_project_id) {
            missing.push("FIREBASE_PROJECT_ID");
        }
        if !non_blank(&self.gemini_api_key) {
            missing.push("GEMINI_API_KEY");
        }
        missing
    }

    pub fn watch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch_poll_interval_ms.max(100))
    }

    pub fn optimistic_edit_timeout(&self) -> Duration {
        Duration::from_millis(self.optimistic_edit_timeout_ms)
    }
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
