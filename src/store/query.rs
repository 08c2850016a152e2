use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::Display;

use super::Document;

/// Comparison operators supported in query filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "in")]
    In,
}

impl Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            FilterOp::Eq => "==",
            FilterOp::Ne => "!=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::ArrayContains => "array-contains",
            FilterOp::In => "in",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// `(field, op, value)` filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Evaluates the filter against a document; missing fields never match
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Ne => actual != &self.value,
            FilterOp::Lt => compare_values(actual, &self.value) == Ordering::Less,
            FilterOp::Le => compare_values(actual, &self.value) != Ordering::Greater,
            FilterOp::Gt => compare_values(actual, &self.value) == Ordering::Greater,
            FilterOp::Ge => compare_values(actual, &self.value) != Ordering::Less,
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.contains(&self.value)),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|candidates| candidates.contains(actual)),
        }
    }
}

/// A collection query: filters combined with AND plus an optional ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl QueryDescriptor {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// The query with its filter values erased
    ///
    /// Two descriptors with the same shape but different values differ only in
    /// scope (for example the same posts query for two different users).
    pub fn shape(&self) -> QueryShape {
        let mut key = self.collection.clone();
        for filter in &self.filters {
            key.push_str(&format!("|{}{}", filter.field, filter.op));
        }
        if let Some((field, direction)) = &self.order_by {
            key.push_str(&format!("|order:{}:{:?}", field, direction));
        }
        QueryShape(key)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|filter| filter.matches(doc))
    }

    /// Filters and orders a collection the way the hosted database would
    ///
    /// Documents missing the order field sort last regardless of direction.
    pub fn evaluate<'a>(&self, docs: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut results: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.matches(doc))
            .cloned()
            .collect();

        if let Some((field, direction)) = &self.order_by {
            results.sort_by(|a, b| match (a.get(field), b.get(field)) {
                (Some(x), Some(y)) => {
                    let ordering = compare_values(x, y);
                    match direction {
                        Direction::Asc => ordering,
                        Direction::Desc => ordering.reverse(),
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }

        results
    }
}

/// Identity of a query with values erased, see [`QueryDescriptor::shape`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryShape(String);

impl Display for QueryShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then by content
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(id: &str, uid: &str, created_at: i64) -> Document {
        Document::new(id, json!({"uid": uid, "createdAt": created_at, "likes": [uid]}))
    }

    #[test]
    fn test_equality_filter() {
        let query = QueryDescriptor::collection("posts").filter("uid", FilterOp::Eq, json!("u1"));
        let docs = vec![post("p1", "u1", 1), post("p2", "u2", 2)];
        let results = query.evaluate(&docs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "p1");
    }

    #[test]
    fn test_order_desc_with_missing_field_last() {
        let query = QueryDescriptor::collection("posts").order_by("createdAt", Direction::Desc);
        let docs = vec![
            post("p1", "u1", 10),
            Document::new("p2", json!({"uid": "u1"})),
            post("p3", "u1", 30),
        ];
        let ids: Vec<String> = query.evaluate(&docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["p3", "p1", "p2"]);
    }

    #[test]
    fn test_array_contains_and_in() {
        let docs = vec![post("p1", "u1", 1), post("p2", "u2", 2)];

        let contains =
            QueryDescriptor::collection("posts").filter("likes", FilterOp::ArrayContains, json!("u2"));
        assert_eq!(contains.evaluate(&docs)[0].id, "p2");

        let within =
            QueryDescriptor::collection("posts").filter("uid", FilterOp::In, json!(["u1", "u3"]));
        assert_eq!(within.evaluate(&docs)[0].id, "p1");
    }

    #[test]
    fn test_range_filters() {
        let docs = vec![post("p1", "u1", 1), post("p2", "u1", 5), post("p3", "u1", 9)];
        let query = QueryDescriptor::collection("posts")
            .filter("createdAt", FilterOp::Gt, json!(1))
            .filter("createdAt", FilterOp::Le, json!(5));
        let results = query.evaluate(&docs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "p2");
    }

    #[test]
    fn test_shape_ignores_filter_values() {
        let a = QueryDescriptor::collection("posts").filter("uid", FilterOp::Eq, json!("u1"));
        let b = QueryDescriptor::collection("posts").filter("uid", FilterOp::Eq, json!("u2"));
        let c = QueryDescriptor::collection("posts").filter("channel", FilterOp::Eq, json!("u1"));
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.shape(), c.shape());
    }

    #[test]
    fn test_compare_values_orders_types() {
        assert_eq!(compare_values(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
    }
}
