use serde::Serialize;

use crate::models::{Movie, UserProfile};

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistCard {
    pub id: String,
    pub name: String,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryPage {
    pub watch_later: Vec<Movie>,
    pub liked: Vec<Movie>,
    pub playlists: Vec<PlaylistCard>,
}

/// Resolves the user's saved ids against the catalog; unknown ids are skipped
pub fn render(catalog: &[Movie], me: Option<&UserProfile>) -> LibraryPage {
    let Some(me) = me else {
        return LibraryPage::default();
    };

    LibraryPage {
        watch_later: resolve(catalog, &me.watch_later),
        liked: resolve(catalog, &me.liked_movies),
        playlists: me
            .playlists
            .iter()
            .map(|playlist| PlaylistCard {
                id: playlist.id.clone(),
                name: playlist.name.clone(),
                movies: resolve(catalog, &playlist.items),
            })
            .collect(),
    }
}

fn resolve(catalog: &[Movie], ids: &[String]) -> Vec<Movie> {
    ids.iter()
        .filter_map(|id| catalog.iter().find(|movie| &movie.id == id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fallback_catalog;
    use serde_json::json;

    #[test]
    fn test_resolves_saved_ids() {
        let me: UserProfile = serde_json::from_value(json!({
            "uid": "u1",
            "watchLater": ["fallback-oppenheimer", "gone"],
            "likedMovies": ["fallback-dune-2"],
            "playlists": [{"id": "pl1", "name": "Weekend", "items": ["fallback-shogun"]}]
        }))
        .unwrap();

        let page = render(fallback_catalog(), Some(&me));
        assert_eq!(page.watch_later.len(), 1);
        assert_eq!(page.liked[0].id, "fallback-dune-2");
        assert_eq!(page.playlists[0].movies[0].id, "fallback-shogun");

        assert!(render(fallback_catalog(), None).watch_later.is_empty());
    }
}
