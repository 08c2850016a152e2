use serde::{Deserialize, Serialize};

/// Catalog entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MovieType {
    #[default]
    Movie,
    #[serde(rename = "Web Series")]
    WebSeries,
    #[serde(rename = "TV Show")]
    TvShow,
    Anime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxOffice {
    pub budget: String,
    pub collection: String,
    pub verdict: String,
}

/// Where a title can be watched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Availability {
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A movie or show in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub movie_type: MovieType,
    #[serde(default)]
    pub genre: Vec<String>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub available_languages: Vec<String>,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub age_rating: String,
    #[serde(default)]
    pub poster: String,
    #[serde(default)]
    pub backdrop: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub trailer_id: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ott_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_office: Option<BoxOffice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Movie {
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genre.iter().any(|g| g.eq_ignore_ascii_case(genre))
    }

    /// Credited in the cast or as director
    pub fn features(&self, person: &str) -> bool {
        self.director == person || self.cast.iter().any(|member| member.name == person)
    }

    pub fn is_upcoming(&self) -> bool {
        self.status.as_deref() == Some("Upcoming")
    }
}
