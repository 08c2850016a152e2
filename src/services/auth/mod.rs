/// Hosted identity provider abstraction
///
/// The provider owns the signed-in identity. Consumers observe changes through
/// a `watch` channel rather than a registered callback, so a late subscriber
/// always sees the current user first.
use serde::Serialize;
use tokio::sync::watch;

use crate::error::AppResult;

pub mod identity_toolkit;
pub mod memory;

pub use identity_toolkit::IdentityToolkitAuth;
pub use memory::MemoryAuth;

/// The signed-in identity as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    /// Bearer token for the document database, when the provider issues one
    #[serde(skip)]
    pub id_token: Option<String>,
}

impl AuthUser {
    /// Name used for new user documents, posts and comments
    pub fn preferred_name(&self) -> String {
        if self.is_anonymous {
            return "Guest".to_string();
        }
        self.display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "User".to_string())
    }
}

#[async_trait::async_trait]
pub trait RemoteAuth: Send + Sync {
    async fn sign_in_anonymously(&self) -> AppResult<AuthUser>;

    async fn sign_in_with_email_password(&self, email: &str, password: &str)
        -> AppResult<AuthUser>;

    async fn create_user_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<AuthUser>;

    /// Sets the display name of the signed-in user
    async fn update_display_name(&self, name: &str) -> AppResult<AuthUser>;

    async fn sign_out(&self) -> AppResult<()>;

    /// Push notification of identity changes; the current value is the signed-in user
    fn on_auth_state_changed(&self) -> watch::Receiver<Option<AuthUser>>;

    fn current_user(&self) -> Option<AuthUser>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(display_name: Option<&str>, is_anonymous: bool) -> AuthUser {
        AuthUser {
            uid: "u1".to_string(),
            email: None,
            display_name: display_name.map(str::to_string),
            is_anonymous,
            id_token: None,
        }
    }

    #[test]
    fn test_preferred_name() {
        assert_eq!(user(Some("Ann"), true).preferred_name(), "Guest");
        assert_eq!(user(Some("Ann"), false).preferred_name(), "Ann");
        assert_eq!(user(Some("  "), false).preferred_name(), "User");
        assert_eq!(user(None, false).preferred_name(), "User");
    }
}
