/// Hosted document database abstraction
///
/// The rest of the crate talks to the document database only through the
/// [`RemoteStore`] trait. Documents travel as JSON objects keyed by an opaque
/// string id; typed models are decoded at the view layer.
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};

pub mod firestore;
pub mod memory;
pub mod query;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use query::{Direction, Filter, FilterOp, QueryDescriptor, QueryShape};

/// One delivery of a watched query: the full current result set, or the read error
pub type WatchDelivery = AppResult<Vec<Document>>;

/// Receiving side of a query watch
pub type WatchStream = mpsc::UnboundedReceiver<WatchDelivery>;

/// A versionless document identified by an opaque key
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    /// Builds a document from a JSON value; non-object values become empty documents
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Decodes the document into a typed model, exposing the key as `id`
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        let mut data = self.data.clone();
        data.entry("id")
            .or_insert_with(|| Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// A single-field mutation, mirroring the hosted database's update operations
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Whole-field replace
    Replace(Value),
    /// Append each element not already present
    ArrayUnion(Vec<Value>),
    /// Remove every element equal to one of the values
    ArrayRemove(Vec<Value>),
}

impl FieldOp {
    /// Returns the field value after applying this operation to `current`
    ///
    /// Array operations on a missing or non-array field treat it as empty.
    pub fn apply(&self, current: Option<&Value>) -> Value {
        match self {
            FieldOp::Replace(value) => value.clone(),
            FieldOp::ArrayUnion(values) => {
                let mut items = array_items(current);
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                Value::Array(items)
            }
            FieldOp::ArrayRemove(values) => {
                let items = array_items(current)
                    .into_iter()
                    .filter(|item| !values.contains(item))
                    .collect();
                Value::Array(items)
            }
        }
    }

    /// True when `current` already shows the effect of this operation
    pub fn is_reflected_in(&self, current: Option<&Value>) -> bool {
        match self {
            FieldOp::Replace(value) => current == Some(value),
            FieldOp::ArrayUnion(values) => match current {
                Some(Value::Array(items)) => values.iter().all(|v| items.contains(v)),
                _ => false,
            },
            FieldOp::ArrayRemove(values) => match current {
                Some(Value::Array(items)) => !values.iter().any(|v| items.contains(v)),
                _ => true,
            },
        }
    }
}

fn array_items(current: Option<&Value>) -> Vec<Value> {
    match current {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// A named field paired with the operation to run against it
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub op: FieldOp,
}

impl FieldUpdate {
    pub fn new(field: impl Into<String>, op: FieldOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }
}

/// Collections persisted by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Movies,
    Users,
    Posts,
    Notifications,
}

impl Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collection::Movies => write!(f, "movies"),
            Collection::Users => write!(f, "users"),
            Collection::Posts => write!(f, "posts"),
            Collection::Notifications => write!(f, "notifications"),
        }
    }
}

/// Builds tenant-scoped paths: `{root}/{app_id}/public/data/{collection}/{doc}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: String,
    app_id: String,
}

impl DataPaths {
    pub fn new(root: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            app_id: app_id.into(),
        }
    }

    pub fn collection(&self, collection: Collection) -> String {
        format!("{}/{}/public/data/{}", self.root, self.app_id, collection)
    }

    pub fn document(&self, collection: Collection, id: &str) -> String {
        format!("{}/{}", self.collection(collection), id)
    }
}

/// Splits a document path into its collection path and document id
pub fn split_document_path(path: &str) -> AppResult<(&str, &str)> {
    match path.rsplit_once('/') {
        Some((collection, id)) if !collection.is_empty() && !id.is_empty() => {
            Ok((collection, id))
        }
        _ => Err(AppError::InvalidInput(format!(
            "Not a document path: {}",
            path
        ))),
    }
}

/// Trait for the hosted document database
///
/// Writes are single-document; there are no transactions. `watch` delivers the
/// full result set of the query, starting with the current state, and again
/// after every change.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads one document, `None` when it does not exist
    async fn get(&self, path: &str) -> AppResult<Option<Document>>;

    /// Creates or fully replaces a document
    async fn set(&self, path: &str, value: Value) -> AppResult<()>;

    /// Applies field updates to an existing document
    async fn update(&self, path: &str, updates: Vec<FieldUpdate>) -> AppResult<()>;

    /// Creates a document with a generated id inside a collection
    async fn add(&self, collection_path: &str, value: Value) -> AppResult<String>;

    /// Opens a push subscription for a query
    async fn watch(&self, query: &QueryDescriptor) -> AppResult<WatchStream>;

    /// Stops every background watch owned by the store
    fn shutdown(&self) {}

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_union_appends_missing_only() {
        let op = FieldOp::ArrayUnion(vec![json!("b"), json!("c")]);
        assert_eq!(op.apply(Some(&json!(["a", "b"]))), json!(["a", "b", "c"]));
    }

    #[test]
    fn test_array_ops_treat_non_array_as_empty() {
        let union = FieldOp::ArrayUnion(vec![json!(1)]);
        assert_eq!(union.apply(None), json!([1]));
        assert_eq!(union.apply(Some(&json!("text"))), json!([1]));

        let remove = FieldOp::ArrayRemove(vec![json!(1)]);
        assert_eq!(remove.apply(Some(&json!(7))), json!([]));
    }

    #[test]
    fn test_array_remove_drops_all_equal_elements() {
        let op = FieldOp::ArrayRemove(vec![json!({"k": 1})]);
        let current = json!([{"k": 1}, {"k": 2}, {"k": 1}]);
        assert_eq!(op.apply(Some(&current)), json!([{"k": 2}]));
    }

    #[test]
    fn test_reflection_checks() {
        let add = FieldOp::ArrayUnion(vec![json!("u1")]);
        assert!(add.is_reflected_in(Some(&json!(["u1", "u2"]))));
        assert!(!add.is_reflected_in(Some(&json!(["u2"]))));
        assert!(!add.is_reflected_in(None));

        let remove = FieldOp::ArrayRemove(vec![json!("u1")]);
        assert!(remove.is_reflected_in(None));
        assert!(remove.is_reflected_in(Some(&json!([]))));
        assert!(!remove.is_reflected_in(Some(&json!(["u1"]))));

        let replace = FieldOp::Replace(json!("bio"));
        assert!(replace.is_reflected_in(Some(&json!("bio"))));
        assert!(!replace.is_reflected_in(None));
    }

    #[test]
    fn test_data_paths() {
        let paths = DataPaths::new("artifacts", "demo");
        assert_eq!(
            paths.collection(Collection::Posts),
            "artifacts/demo/public/data/posts"
        );
        assert_eq!(
            paths.document(Collection::Users, "u1"),
            "artifacts/demo/public/data/users/u1"
        );
    }

    #[test]
    fn test_split_document_path() {
        let (collection, id) = split_document_path("a/b/c/users/u1").unwrap();
        assert_eq!(collection, "a/b/c/users");
        assert_eq!(id, "u1");
        assert!(split_document_path("users").is_err());
        assert!(split_document_path("users/").is_err());
    }

    #[test]
    fn test_decode_injects_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let doc = Document::new("m1", json!({"name": "Dune"}));
        let named: Named = doc.decode().unwrap();
        assert_eq!(named.id, "m1");
        assert_eq!(named.name, "Dune");
    }
}
