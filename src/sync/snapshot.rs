use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::store::Document;

/// Immutable result set of one subscription delivery
///
/// Cloning shares the documents; a new delivery replaces the snapshot as a
/// whole instead of patching it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    documents: Arc<Vec<Document>>,
}

impl Snapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: Arc::new(documents),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == key)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Decodes every document, skipping the ones that do not fit `T`
    pub fn decode_all<T: DeserializeOwned>(&self) -> Vec<T> {
        self.documents
            .iter()
            .filter_map(|doc| match doc.decode() {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(document = %doc.id, error = %e, "Skipping malformed document");
                    None
                }
            })
            .collect()
    }
}

impl From<Vec<Document>> for Snapshot {
    fn from(documents: Vec<Document>) -> Self {
        Self::new(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_and_decode() {
        let snapshot = Snapshot::new(vec![
            Document::new("a", json!({"n": 1})),
            Document::new("b", json!({"n": "not a number"})),
        ]);

        #[derive(serde::Deserialize)]
        struct Counted {
            n: i64,
        }

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("b").is_some());
        assert!(snapshot.get("c").is_none());

        let decoded: Vec<Counted> = snapshot.decode_all();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].n, 1);
    }
}
