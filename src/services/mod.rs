pub mod ai;
pub mod auth;

pub use ai::{AiGate, TextGenerator};
pub use auth::{AuthUser, RemoteAuth};
