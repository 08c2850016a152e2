use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub uid: String,
    pub name: String,
    pub text: String,
    pub created_at: i64,
}

/// A four-option multiple choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

impl Quiz {
    pub fn is_correct(&self, answer: usize) -> bool {
        answer == self.correct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Normal,
    Quiz,
}

/// Social post, optionally tagged to a catalog entry through `channel`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(rename = "type", default)]
    pub post_type: PostType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub created_at: i64,
}

impl Post {
    pub const LIKES: &'static str = "likes";
    pub const COMMENTS: &'static str = "comments";

    /// `@mention` handles found in the text
    pub fn mentions(&self) -> Vec<String> {
        let Some(text) = &self.text else {
            return Vec::new();
        };

        text.split_whitespace()
            .filter_map(|word| {
                let handle: String = word
                    .strip_prefix('@')?
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                (!handle.is_empty()).then(|| format!("@{}", handle))
            })
            .collect()
    }
}
