use std::sync::OnceLock;

pub mod movie;
pub mod notification;
pub mod post;
pub mod user;

pub use movie::{Availability, BoxOffice, CastMember, Movie, MovieType};
pub use notification::{Notification, NotificationType};
pub use post::{Comment, Post, PostType, Quiz};
pub use user::{Playlist, UserProfile};

const FALLBACK_CATALOG_JSON: &str = include_str!("../../data/fallback_catalog.json");

/// Bundled catalog rendered when the hosted catalog is empty or unreadable
pub fn fallback_catalog() -> &'static [Movie] {
    static CATALOG: OnceLock<Vec<Movie>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        serde_json::from_str(FALLBACK_CATALOG_JSON).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Bundled catalog failed to parse");
            Vec::new()
        })
    })
}

/// Milliseconds since the Unix epoch, the unit of every `createdAt`
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
