use serde::Serialize;

use crate::models::Movie;

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub query: String,
    pub results: Vec<Movie>,
}

/// Case-insensitive title substring match, catalog order preserved
pub fn render(catalog: &[Movie], query: &str) -> SearchPage {
    let needle = query.to_lowercase();
    SearchPage {
        query: query.to_string(),
        results: catalog
            .iter()
            .filter(|movie| movie.title.to_lowercase().contains(&needle))
            .cloned()
            .collect(),
    }
}
