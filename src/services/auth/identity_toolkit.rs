/// Hosted identity provider over its REST API
///
/// API Flow:
/// 1. Anonymous / credentialed sign-up: `accounts:signUp`
/// 2. Password sign-in: `accounts:signInWithPassword`
/// 3. Profile update: `accounts:update` with the current id token
///
/// Error responses carry a provider code in `error.message` (for example
/// `EMAIL_NOT_FOUND`); it is surfaced to the user unchanged.
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;

use super::{AuthUser, RemoteAuth};
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct IdentityToolkitAuth {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    state_tx: watch::Sender<Option<AuthUser>>,
}

impl IdentityToolkitAuth {
    pub fn new(api_url: String, api_key: String) -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            http_client: HttpClient::new(),
            api_url,
            api_key,
            state_tx,
        }
    }

    async fn call(&self, method: &str, body: Value) -> AppResult<AccountResponse> {
        let url = format!("{}/accounts:{}", self.api_url, method);

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => AppError::Auth(envelope.error.message),
                Err(_) => AppError::ExternalApi(format!(
                    "Identity provider returned status {}: {}",
                    status, text
                )),
            });
        }

        Ok(response.json().await?)
    }

    fn publish(&self, account: AccountResponse, is_anonymous: bool) -> AuthUser {
        let user = AuthUser {
            uid: account.local_id,
            email: account.email.filter(|email| !email.is_empty()),
            display_name: account.display_name.filter(|name| !name.is_empty()),
            is_anonymous,
            id_token: account.id_token,
        };
        tracing::info!(uid = %user.uid, anonymous = is_anonymous, "Signed in");
        self.state_tx.send_replace(Some(user.clone()));
        user
    }
}

#[async_trait::async_trait]
impl RemoteAuth for IdentityToolkitAuth {
    async fn sign_in_anonymously(&self) -> AppResult<AuthUser> {
        let account = self
            .call("signUp", json!({ "returnSecureToken": true }))
            .await?;
        Ok(self.publish(account, true))
    }

    async fn sign_in_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<AuthUser> {
        let account = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(self.publish(account, false))
    }

    async fn create_user_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<AuthUser> {
        let account = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(self.publish(account, false))
    }

    async fn update_display_name(&self, name: &str) -> AppResult<AuthUser> {
        let current = self
            .current_user()
            .ok_or_else(|| AppError::Unauthenticated("Not signed in".to_string()))?;
        let token = current
            .id_token
            .clone()
            .ok_or_else(|| AppError::Unauthenticated("Session has no token".to_string()))?;

        let mut account = self
            .call(
                "update",
                json!({ "idToken": token, "displayName": name, "returnSecureToken": true }),
            )
            .await?;
        // The update response omits fields that did not change
        account.email = account.email.or(current.email);
        account.id_token = account.id_token.or(current.id_token);

        Ok(self.publish(account, current.is_anonymous))
    }

    async fn sign_out(&self) -> AppResult<()> {
        tracing::info!("Signed out");
        self.state_tx.send_replace(None);
        Ok(())
    }

    fn on_auth_state_changed(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state_tx.subscribe()
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.state_tx.borrow().clone()
    }

    fn name(&self) -> &'static str {
        "identity_toolkit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_response_parses_sign_up() {
        let raw = r#"{"kind":"identitytoolkit#SignupNewUserResponse","idToken":"tok","localId":"abc","expiresIn":"3600"}"#;
        let account: AccountResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(account.local_id, "abc");
        assert_eq!(account.id_token.as_deref(), Some("tok"));
        assert!(account.email.is_none());
    }

    #[test]
    fn test_error_envelope_parses_provider_code() {
        let raw = r#"{"error":{"code":400,"message":"EMAIL_NOT_FOUND","errors":[]}}"#;
        let envelope: ErrorEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.error.message, "EMAIL_NOT_FOUND");
    }

    #[test]
    fn test_publish_drops_empty_strings() {
        let auth = IdentityToolkitAuth::new("http://test.local".to_string(), "key".to_string());
        let user = auth.publish(
            AccountResponse {
                local_id: "abc".to_string(),
                id_token: None,
                email: Some(String::new()),
                display_name: Some(String::new()),
            },
            true,
        );
        assert!(user.email.is_none());
        assert!(user.display_name.is_none());
        assert_eq!(auth.current_user(), Some(user));
    }
}
