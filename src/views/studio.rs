/// Post creation
///
/// A normal post carries text and/or a media URL. A quiz post carries an
/// AI-generated question about a topic; the question is validated and, when
/// the reply is unusable, replaced by a release-year question about the
/// tagged movie, a movie whose title matches the topic, or the first movie.
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{Movie, PostType, Quiz};

pub const GENERAL_CHANNEL: &str = "general";

fn default_channel() -> String {
    GENERAL_CHANNEL.to_string()
}

/// Studio form submission
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub mode: PostType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    /// Catalog id the post is tagged with, or `general`
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default)]
    pub quiz_topic: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelOption {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudioPage {
    pub channels: Vec<ChannelOption>,
}

pub fn render(catalog: &[Movie]) -> StudioPage {
    let mut channels = vec![ChannelOption {
        id: GENERAL_CHANNEL.to_string(),
        title: "General".to_string(),
    }];
    channels.extend(catalog.iter().map(|movie| ChannelOption {
        id: movie.id.clone(),
        title: movie.title.clone(),
    }));
    StudioPage { channels }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn base_document(uid: &str, name: &str, channel: &str, created_at: i64) -> Value {
    json!({
        "uid": uid,
        "name": name,
        "channel": channel,
        "likes": [],
        "comments": [],
        "createdAt": created_at,
    })
}

/// Document for a normal post; needs text or media
pub fn normal_post_document(
    uid: &str,
    name: &str,
    request: &NewPost,
    created_at: i64,
) -> AppResult<Value> {
    let text = non_blank(&request.text);
    let media_url = non_blank(&request.media_url);
    if text.is_none() && media_url.is_none() {
        return Err(AppError::InvalidInput(
            "A post needs text or a media URL".to_string(),
        ));
    }

    let mut doc = base_document(uid, name, &request.channel, created_at);
    doc["type"] = json!(PostType::Normal);
    if let Some(text) = text {
        doc["text"] = json!(text);
    }
    if let Some(media_url) = media_url {
        doc["mediaUrl"] = json!(media_url);
    }
    Ok(doc)
}

/// Topic for a quiz post: the given topic, or the tagged movie's title
pub fn quiz_topic(request: &NewPost, catalog: &[Movie]) -> AppResult<String> {
    non_blank(&request.quiz_topic)
        .or_else(|| {
            catalog
                .iter()
                .find(|movie| movie.id == request.channel)
                .map(|movie| movie.title.clone())
        })
        .ok_or_else(|| AppError::InvalidInput("A quiz needs a topic".to_string()))
}

/// Movie the fallback question is built from
pub fn quiz_subject<'a>(catalog: &'a [Movie], channel: &str, topic: &str) -> Option<&'a Movie> {
    let topic = topic.to_lowercase();
    catalog
        .iter()
        .find(|movie| movie.id == channel)
        .or_else(|| {
            catalog
                .iter()
                .find(|movie| movie.title.to_lowercase().contains(&topic))
        })
        .or_else(|| catalog.first())
}

pub fn quiz_post_document(
    uid: &str,
    name: &str,
    channel: &str,
    topic: &str,
    quiz: &Quiz,
    created_at: i64,
) -> Value {
    let mut doc = base_document(uid, name, channel, created_at);
    doc["type"] = json!(PostType::Quiz);
    doc["text"] = json!(format!("Trivia Challenge: {}", topic));
    doc["quiz"] = json!(quiz);
    doc
}
