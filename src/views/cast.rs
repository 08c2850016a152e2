use serde::Serialize;

use crate::models::Movie;

#[derive(Debug, Clone, Serialize)]
pub struct CastPage {
    pub person: String,
    pub image: Option<String>,
    /// `Director` when the person directed every credited title, otherwise `Actor`
    pub role: String,
    pub filmography: Vec<Movie>,
}

pub fn render(catalog: &[Movie], person: &str) -> CastPage {
    let filmography: Vec<Movie> = catalog
        .iter()
        .filter(|movie| movie.features(person))
        .cloned()
        .collect();

    let image = filmography
        .iter()
        .flat_map(|movie| movie.cast.iter())
        .find(|member| member.name == person)
        .and_then(|member| member.image.clone());

    let directed_all =
        !filmography.is_empty() && filmography.iter().all(|movie| movie.director == person);

    CastPage {
        person: person.to_string(),
        image,
        role: if directed_all { "Director" } else { "Actor" }.to_string(),
        filmography,
    }
}
