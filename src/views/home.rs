use serde::Serialize;

use crate::models::{Movie, MovieType};

const TRENDING_MIN_RATING: f64 = 4.5;
const NEW_RELEASE_MIN_YEAR: i32 = 2024;

#[derive(Debug, Clone, Serialize)]
pub struct Row {
    pub title: String,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomePage {
    pub type_filter: Option<MovieType>,
    pub genre_filter: Option<String>,
    /// Genres present in the unfiltered catalog, for the filter chips
    pub genres: Vec<String>,
    pub hero: Option<Movie>,
    pub rows: Vec<Row>,
}

pub fn render(
    catalog: &[Movie],
    type_filter: Option<MovieType>,
    genre_filter: Option<&str>,
) -> HomePage {
    let filtered: Vec<&Movie> = catalog
        .iter()
        .filter(|movie| type_filter.map_or(true, |kind| movie.movie_type == kind))
        .filter(|movie| genre_filter.map_or(true, |genre| movie.has_genre(genre)))
        .collect();

    let hero = filtered
        .iter()
        .find(|movie| movie.is_upcoming())
        .or_else(|| filtered.first())
        .map(|movie| (*movie).clone());

    let rows = [
        row("Trending Now", &filtered, |m| m.rating > TRENDING_MIN_RATING),
        row("New Releases", &filtered, |m| m.year >= NEW_RELEASE_MIN_YEAR),
        row("Action Thrillers", &filtered, |m| m.has_genre("Action")),
    ]
    .into_iter()
    .flatten()
    .collect();

    HomePage {
        type_filter,
        genre_filter: genre_filter.map(str::to_string),
        genres: genres(catalog),
        hero,
        rows,
    }
}

fn row(title: &str, movies: &[&Movie], keep: impl Fn(&Movie) -> bool) -> Option<Row> {
    let movies: Vec<Movie> = movies
        .iter()
        .filter(|movie| keep(movie))
        .map(|movie| (*movie).clone())
        .collect();
    (!movies.is_empty()).then(|| Row {
        title: title.to_string(),
        movies,
    })
}

fn genres(catalog: &[Movie]) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for genre in catalog.iter().flat_map(|movie| movie.genre.iter()) {
        if !genres.iter().any(|known| known.eq_ignore_ascii_case(genre)) {
            genres.push(genre.clone());
        }
    }
    genres
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fallback_catalog;

    #[test]
    fn test_hero_prefers_upcoming() {
        let page = render(fallback_catalog(), None, None);
        assert!(page.hero.unwrap().is_upcoming());
        assert!(!page.rows.is_empty());
        assert!(page.genres.iter().any(|g| g == "Action"));
    }

    #[test]
    fn test_filters_and_empty_rows_are_omitted() {
        let page = render(fallback_catalog(), Some(MovieType::Anime), None);
        assert!(page
            .rows
            .iter()
            .all(|row| row.movies.iter().all(|m| m.movie_type == MovieType::Anime)));
        assert!(page.rows.iter().all(|row| row.title != "Action Thrillers"));
        assert_eq!(page.hero.unwrap().movie_type, MovieType::Anime);
    }

    #[test]
    fn test_empty_catalog_renders_nothing() {
        let page = render(&[], None, Some("Drama"));
        assert!(page.hero.is_none());
        assert!(page.rows.is_empty());
    }
}
