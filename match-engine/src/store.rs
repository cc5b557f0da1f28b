use std::cmp::Ordering;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub const MATCHES: &str = "matches";
pub const INVITATIONS: &str = "matchInvitations";
pub const JOIN_REQUESTS: &str = "matchRequests";
pub const RATINGS: &str = "ratings";
pub const NOTIFICATIONS: &str = "notifications";
pub const USERS: &str = "users";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document body must be a JSON object")]
    NotAnObject,

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document. `version` starts at 1 and increases on every write.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version: i64,
    pub body: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Equality predicates over top-level fields plus an optional ordering.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Order)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.order_by = Some((field.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, body: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| body.get(field) == Some(expected))
    }

    /// Sorts and truncates an already filtered result set in place.
    pub fn arrange(&self, docs: &mut Vec<Document>) {
        if let Some((field, order)) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.body.get(field), b.body.get(field));
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
    }
}

/// Missing and null sort first, then booleans, numbers, strings.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Shallow merge of `patch` into `body`.
pub fn merge_patch(body: &mut Value, patch: Value) -> StoreResult<()> {
    let (Value::Object(target), Value::Object(source)) = (body, patch) else {
        return Err(StoreError::NotAnObject);
    };
    for (k, v) in source {
        target.insert(k, v);
    }
    Ok(())
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String>;

    /// Creates or replaces the document stored under `id`.
    async fn put(&self, collection: &str, id: &str, body: Value) -> StoreResult<()>;

    /// Inserts `body` only if no document in `collection` matches `guard`.
    /// The check and the insert are atomic. Returns `None` when a match exists.
    async fn create_unless_exists(
        &self,
        collection: &str,
        guard: &Query,
        body: Value,
    ) -> StoreResult<Option<String>>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Shallow-merges `patch`. Fails with `NotFound` if the document is absent.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()>;

    /// Applies `patch` only if the stored version equals `expected_version`.
    /// Returns `false` on a version mismatch.
    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> StoreResult<bool>;

    /// Deleting an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}

/// A decoded document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

pub fn to_body<T: Serialize>(value: &T) -> StoreResult<Value> {
    let mut body = serde_json::to_value(value)?;
    match &mut body {
        Value::Object(map) => {
            map.remove("id");
            Ok(body)
        }
        _ => Err(StoreError::NotAnObject),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    Ok(from_versioned::<T>(doc)?.value)
}

pub fn from_versioned<T: DeserializeOwned>(doc: Document) -> StoreResult<Versioned<T>> {
    let Document { id, version, mut body } = doc;
    match &mut body {
        Value::Object(map) => {
            map.insert("id".to_string(), Value::String(id));
        }
        _ => return Err(StoreError::NotAnObject),
    }
    Ok(Versioned {
        value: serde_json::from_value(body)?,
        version,
    })
}
