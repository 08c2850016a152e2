/// Hosted document database over its REST API
///
/// Document CRUD maps onto the v1 REST endpoints:
/// 1. Read: GET `documents/{path}` (404 means the document does not exist)
/// 2. Set: PATCH `documents/{path}` without a mask, replacing every field
/// 3. Update: POST `documents:commit` with an update mask for replaced fields
///    and `updateTransforms` for array union/remove
/// 4. Add: POST `documents/{collection}` and read the generated name back
/// 5. Query: POST `{parent}:runQuery` with a structured query
///
/// The REST surface has no push listener, so `watch` polls the query and
/// emits the full result only when it changed.
use chrono::DateTime;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde_json::{json, Map, Number, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::{
    split_document_path, Direction, Document, FieldOp, FieldUpdate, FilterOp, QueryDescriptor,
    RemoteStore, WatchStream,
};
use crate::{
    error::{AppError, AppResult},
    services::auth::RemoteAuth,
};

#[derive(Clone)]
struct FirestoreClient {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    project_id: String,
    auth: Arc<dyn RemoteAuth>,
}

impl FirestoreClient {
    fn documents_root(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.api_url, self.documents_root(), suffix)
    }

    /// Attaches the API key and, when signed in, the user's id token
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, url)
            .query(&[("key", self.api_key.as_str())]);

        match self.auth.current_user().and_then(|user| user.id_token) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> AppResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::ExternalApi(format!(
            "Document store returned status {}: {}",
            status, body
        )))
    }

    async fn run_query(&self, query: &QueryDescriptor) -> AppResult<Vec<Document>> {
        let (parent, collection_id) = match query.collection.rsplit_once('/') {
            Some((parent, id)) => (format!("/{}", parent), id),
            None => (String::new(), query.collection.as_str()),
        };

        let url = self.url(&format!("{}:runQuery", parent));
        let body = json!({ "structuredQuery": structured_query(query, collection_id) });

        let response = self.request(Method::POST, &url).json(&body).send().await?;
        let rows: Vec<Value> = Self::check(response).await?.json().await?;

        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }
}

pub struct FirestoreStore {
    client: FirestoreClient,
    poll_interval: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl FirestoreStore {
    pub fn new(
        api_url: String,
        api_key: String,
        project_id: String,
        poll_interval: Duration,
        auth: Arc<dyn RemoteAuth>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            client: FirestoreClient {
                http_client: HttpClient::new(),
                api_url,
                api_key,
                project_id,
                auth,
            },
            poll_interval,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for FirestoreStore {
    async fn get(&self, path: &str) -> AppResult<Option<Document>> {
        let url = self.client.url(&format!("/{}", path));
        let response = self.client.request(Method::GET, &url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: Value = FirestoreClient::check(response).await?.json().await?;
        decode_document(&raw).map(Some)
    }

    async fn set(&self, path: &str, value: Value) -> AppResult<()> {
        let url = self.client.url(&format!("/{}", path));
        let body = json!({ "fields": encode_fields(&value) });

        let response = self
            .client
            .request(Method::PATCH, &url)
            .json(&body)
            .send()
            .await?;
        FirestoreClient::check(response).await?;
        Ok(())
    }

    async fn update(&self, path: &str, updates: Vec<FieldUpdate>) -> AppResult<()> {
        let name = format!("{}/{}", self.client.documents_root(), path);
        let body = json!({ "writes": [commit_write(&name, &updates)] });

        let url = self.client.url(":commit");
        let response = self
            .client
            .request(Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        FirestoreClient::check(response).await?;

        tracing::debug!(path = %path, fields = updates.len(), "Document updated");
        Ok(())
    }

    async fn add(&self, collection_path: &str, value: Value) -> AppResult<String> {
        let url = self.client.url(&format!("/{}", collection_path));
        let body = json!({ "fields": encode_fields(&value) });

        let response = self
            .client
            .request(Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        let created: Value = FirestoreClient::check(response).await?.json().await?;

        let name = created["name"].as_str().ok_or_else(|| {
            AppError::ExternalApi("Created document has no name".to_string())
        })?;
        let (_, id) = split_document_path(name)?;
        Ok(id.to_string())
    }

    async fn watch(&self, query: &QueryDescriptor) -> AppResult<WatchStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let query = query.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = tokio::time::interval(self.poll_interval);

        tokio::spawn(async move {
            let mut last: Option<Vec<Document>> = None;
            let mut failing = false;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                    _ = tx.closed() => break,
                }

                match client.run_query(&query).await {
                    Ok(docs) => {
                        failing = false;
                        if last.as_ref() == Some(&docs) {
                            continue;
                        }
                        if tx.send(Ok(docs.clone())).is_err() {
                            break;
                        }
                        last = Some(docs);
                    }
                    Err(e) => {
                        // The consumer now holds its fallback, so the next
                        // successful poll must be delivered even if unchanged
                        last = None;
                        // Report a failure streak once; polling continues
                        if !failing {
                            failing = true;
                            if tx.send(Err(e)).is_err() {
                                break;
                            }
                        }
                    }
                }
            }

            tracing::debug!(collection = %query.collection, "Query watch stopped");
        });

        Ok(rx)
    }

    fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}

// ============================================================================
// Request encoding
// ============================================================================

fn commit_write(name: &str, updates: &[FieldUpdate]) -> Value {
    let mut fields = Map::new();
    let mut mask = Vec::new();
    let mut transforms = Vec::new();

    for update in updates {
        match &update.op {
            FieldOp::Replace(value) => {
                fields.insert(update.field.clone(), encode_value(value));
                mask.push(Value::String(update.field.clone()));
            }
            FieldOp::ArrayUnion(values) => transforms.push(json!({
                "fieldPath": update.field,
                "appendMissingElements": { "values": values.iter().map(encode_value).collect::<Vec<_>>() },
            })),
            FieldOp::ArrayRemove(values) => transforms.push(json!({
                "fieldPath": update.field,
                "removeAllFromArray": { "values": values.iter().map(encode_value).collect::<Vec<_>>() },
            })),
        }
    }

    json!({
        "update": { "name": name, "fields": fields },
        "updateMask": { "fieldPaths": mask },
        "updateTransforms": transforms,
        "currentDocument": { "exists": true },
    })
}

fn filter_op_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "EQUAL",
        FilterOp::Ne => "NOT_EQUAL",
        FilterOp::Lt => "LESS_THAN",
        FilterOp::Le => "LESS_THAN_OR_EQUAL",
        FilterOp::Gt => "GREATER_THAN",
        FilterOp::Ge => "GREATER_THAN_OR_EQUAL",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
        FilterOp::In => "IN",
    }
}

fn structured_query(query: &QueryDescriptor, collection_id: &str) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection_id }] });

    let mut filters: Vec<Value> = query
        .filters
        .iter()
        .map(|filter| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": filter.field },
                    "op": filter_op_name(filter.op),
                    "value": encode_value(&filter.value),
                }
            })
        })
        .collect();

    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.remove(0),
        _ => {
            structured["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            })
        }
    }

    if let Some((field, direction)) = &query.order_by {
        let direction = match direction {
            Direction::Asc => "ASCENDING",
            Direction::Desc => "DESCENDING",
        };
        structured["orderBy"] = json!([{ "field": { "fieldPath": field }, "direction": direction }]);
    }

    structured
}

// ============================================================================
// Value codec
// ============================================================================

/// Encodes a JSON value into the hosted database's typed value format
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(value) } }),
    }
}

/// Encodes an object's fields; non-objects encode as no fields
pub fn encode_fields(value: &Value) -> Value {
    let fields: Map<String, Value> = value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(key, value)| (key.clone(), encode_value(value)))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(fields)
}

/// Decodes a typed value back into plain JSON
///
/// Timestamps decode to epoch milliseconds so they order like the
/// `createdAt` values this application writes itself.
pub fn decode_value(value: &Value) -> AppResult<Value> {
    let invalid = || AppError::ExternalApi(format!("Unsupported document value: {}", value));
    let object = value.as_object().ok_or_else(invalid)?;
    let (kind, inner) = object.iter().next().ok_or_else(invalid)?;

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(invalid)?),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().map_err(|_| invalid())?,
                Value::Number(n) => n.as_i64().ok_or_else(invalid)?,
                _ => return Err(invalid()),
            };
            Value::Number(parsed.into())
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "timestampValue" => {
            let raw = inner.as_str().ok_or_else(invalid)?;
            let parsed = DateTime::parse_from_rfc3339(raw).map_err(|_| invalid())?;
            Value::Number(parsed.timestamp_millis().into())
        }
        "stringValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => {
            let items: Vec<Value> = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values.iter().map(decode_value).collect::<AppResult<_>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "mapValue" => decode_fields(inner.get("fields"))?,
        _ => return Err(invalid()),
    };

    Ok(decoded)
}

fn decode_fields(fields: Option<&Value>) -> AppResult<Value> {
    let mut map = Map::new();
    if let Some(fields) = fields.and_then(Value::as_object) {
        for (key, value) in fields {
            map.insert(key.clone(), decode_value(value)?);
        }
    }
    Ok(Value::Object(map))
}

/// Decodes a REST document resource (`{name, fields, ...}`)
pub fn decode_document(raw: &Value) -> AppResult<Document> {
    let name = raw["name"]
        .as_str()
        .ok_or_else(|| AppError::ExternalApi("Document resource has no name".to_string()))?;
    let (_, id) = split_document_path(name)?;
    Ok(Document::new(id, decode_fields(raw.get("fields"))?))
}
