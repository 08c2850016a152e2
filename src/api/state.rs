use std::sync::Arc;

use crate::session::Session;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

impl AppState {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}
