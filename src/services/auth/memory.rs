/// In-process identity provider
///
/// Used when no identity provider key is configured, and in tests. Error
/// messages mirror the hosted provider's codes so callers surface the same text.
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

use super::{AuthUser, RemoteAuth};
use crate::error::{AppError, AppResult};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    uid: String,
    password: String,
    display_name: Option<String>,
}

pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    state_tx: watch::Sender<Option<AuthUser>>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            state_tx,
        }
    }

    fn publish(&self, user: AuthUser) -> AuthUser {
        tracing::info!(uid = %user.uid, anonymous = user.is_anonymous, "Signed in");
        self.state_tx.send_replace(Some(user.clone()));
        user
    }

    fn credentialed_user(email: &str, account: &Account) -> AuthUser {
        AuthUser {
            uid: account.uid.clone(),
            email: Some(email.to_string()),
            display_name: account.display_name.clone(),
            is_anonymous: false,
            id_token: None,
        }
    }
}

#[async_trait::async_trait]
impl RemoteAuth for MemoryAuth {
    async fn sign_in_anonymously(&self) -> AppResult<AuthUser> {
        let user = AuthUser {
            uid: format!("anon-{}", Uuid::new_v4().simple()),
            email: None,
            display_name: None,
            is_anonymous: true,
            id_token: None,
        };
        Ok(self.publish(user))
    }

    async fn sign_in_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<AuthUser> {
        let user = {
            let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            let account = accounts
                .get(&email.to_lowercase())
                .ok_or_else(|| AppError::Auth("EMAIL_NOT_FOUND".to_string()))?;
            if account.password != password {
                return Err(AppError::Auth("INVALID_PASSWORD".to_string()));
            }
            Self::credentialed_user(email, account)
        };
        Ok(self.publish(user))
    }

    async fn create_user_with_email_password(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<AuthUser> {
        if !email.contains('@') {
            return Err(AppError::Auth("INVALID_EMAIL".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth(
                "WEAK_PASSWORD : Password should be at least 6 characters".to_string(),
            ));
        }

        let user = {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            let key = email.to_lowercase();
            if accounts.contains_key(&key) {
                return Err(AppError::Auth("EMAIL_EXISTS".to_string()));
            }
            let account = Account {
                uid: format!("user-{}", Uuid::new_v4().simple()),
                password: password.to_string(),
                display_name: None,
            };
            let user = Self::credentialed_user(email, &account);
            accounts.insert(key, account);
            user
        };
        Ok(self.publish(user))
    }

    async fn update_display_name(&self, name: &str) -> AppResult<AuthUser> {
        let mut user = self
            .current_user()
            .ok_or_else(|| AppError::Unauthenticated("Not signed in".to_string()))?;

        if let Some(email) = &user.email {
            let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(account) = accounts.get_mut(&email.to_lowercase()) {
                account.display_name = Some(name.to_string());
            }
        }

        user.display_name = Some(name.to_string());
        self.state_tx.send_replace(Some(user.clone()));
        Ok(user)
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
        "memory"
    }
}
