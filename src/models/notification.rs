use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Follow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub from_name: String,
    pub to_user_id: String,
    #[serde(default)]
    pub created_at: i64,
}

impl Notification {
    pub fn new_document(
        kind: NotificationType,
        from_name: &str,
        to_user_id: &str,
        created_at: i64,
    ) -> Value {
        json!({
            "type": kind,
            "fromName": from_name,
            "toUserId": to_user_id,
            "createdAt": created_at,
        })
    }

    /// Sentence shown in the activity list
    pub fn message(&self) -> String {
        match self.kind {
            NotificationType::Like => format!("{} liked your post.", self.from_name),
            NotificationType::Follow => format!("{} started following you.", self.from_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;

    #[test]
    fn test_document_roundtrip_and_message() {
        let doc = Document::new(
            "n1",
            Notification::new_document(NotificationType::Follow, "Ann", "u2", 7),
        );
        let notification: Notification = doc.decode().unwrap();
        assert_eq!(notification.kind, NotificationType::Follow);
        assert_eq!(notification.message(), "Ann started following you.");
    }
}
