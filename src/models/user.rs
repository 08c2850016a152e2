use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A named list of catalog ids owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Persisted user document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(default)]
    pub watch_later: Vec<String>,
    #[serde(default)]
    pub liked_movies: Vec<String>,
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub created_at: i64,
}

impl UserProfile {
    /// Field names as stored, used as optimistic edit targets
    pub const FOLLOWERS: &'static str = "followers";
    pub const FOLLOWING: &'static str = "following";
    pub const WATCH_LATER: &'static str = "watchLater";
    pub const LIKED_MOVIES: &'static str = "likedMovies";
    pub const PLAYLISTS: &'static str = "playlists";

    /// Document written the first time an identity is seen
    pub fn new_document(uid: &str, name: &str, email: &str, bio: &str, created_at: i64) -> Value {
        json!({
            "uid": uid,
            "name": name,
            "email": email,
            "role": "user",
            "followers": [],
            "following": [],
            "watchLater": [],
            "likedMovies": [],
            "playlists": [],
            "bio": bio,
            "createdAt": created_at,
        })
    }

    /// `@handle` shown on profiles: name without whitespace, lowercased
    pub fn handle(&self) -> String {
        let compact: String = self.name.chars().filter(|c| !c.is_whitespace()).collect();
        format!("@{}", compact.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_decodes() {
        let doc = UserProfile::new_document("u1", "Guest", "", "CineSphere Viewer", 42);
        let profile: UserProfile = serde_json::from_value(doc).unwrap();
        assert_eq!(profile.uid, "u1");
        assert_eq!(profile.role, "user");
        assert!(profile.watch_later.is_empty());
        assert_eq!(profile.created_at, 42);
    }

    #[test]
    fn test_handle() {
        let profile: UserProfile =
            serde_json::from_value(serde_json::json!({"uid": "u1", "name": "Ann Lee"})).unwrap();
        assert_eq!(profile.handle(), "@annlee");
    }
}
