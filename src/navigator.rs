use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::models::MovieType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedTab {
    #[default]
    ForYou,
    Following,
}

/// Which view is rendered, with exactly the data that view needs
///
/// Wire form is `{"kind": ..., "payload": {...}}`. Kinds whose payload fields
/// all have defaults (`home`, `feed`) may omit `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Selector {
    Home {
        #[serde(default)]
        type_filter: Option<MovieType>,
        #[serde(default)]
        genre_filter: Option<String>,
    },
    Library,
    Feed {
        #[serde(default)]
        tab: FeedTab,
    },
    Upload,
    Notifications,
    CineGenie,
    Search {
        query: String,
    },
    Profile {
        user_id: String,
    },
    Movie {
        movie_id: String,
    },
    Cast {
        person: String,
    },
}

impl Selector {
    pub fn home() -> Self {
        Selector::Home {
            type_filter: None,
            genre_filter: None,
        }
    }

    /// Canonical form: a blank search is home, filters and queries are trimmed
    pub fn normalized(self) -> Self {
        match self {
            Selector::Search { query } if query.trim().is_empty() => Selector::home(),
            Selector::Search { query } => Selector::Search {
                query: query.trim().to_string(),
            },
            Selector::Home {
                type_filter,
                genre_filter,
            } => Selector::Home {
                type_filter,
                genre_filter: genre_filter
                    .map(|genre| genre.trim().to_string())
                    .filter(|genre| !genre.is_empty() && genre != "All"),
            },
            other => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Selector::Home { .. } => "home",
            Selector::Library => "library",
            Selector::Feed { .. } => "feed",
            Selector::Upload => "upload",
            Selector::Notifications => "notifications",
            Selector::CineGenie => "cine_genie",
            Selector::Search { .. } => "search",
            Selector::Profile { .. } => "profile",
            Selector::Movie { .. } => "movie",
            Selector::Cast { .. } => "cast",
        }
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Selector::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match Selector::deserialize(value.clone()) {
            Ok(selector) => Ok(selector),
            Err(e) => match value {
                Value::Object(mut object) if !object.contains_key("payload") => {
                    object.insert("payload".to_string(), Value::Object(Map::new()));
                    Selector::deserialize(Value::Object(object)).map_err(de::Error::custom)
                }
                _ => Err(de::Error::custom(e)),
            },
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Selector::home()
    }
}

/// Current selector; every navigation replaces it wholesale
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    current: Selector,
}

impl Navigator {
    pub fn current(&self) -> &Selector {
        &self.current
    }

    /// Replaces the selector, returning the normalized one now current
    pub fn navigate(&mut self, selector: Selector) -> &Selector {
        self.current = selector.normalized();
        tracing::debug!(view = self.current.name(), "Navigated");
        &self.current
    }

    /// Back is a fixed return to home, not a history pop
    pub fn back(&mut self) -> &Selector {
        self.navigate(Selector::home())
    }
}
