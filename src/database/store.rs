use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    future::Future,
};

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{error::QueryError, form::FormData, schema::DocumentId};

const DOCUMENT_ID_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: FormData,
}

impl Document {
    pub fn new(id: &str, fields: FormData) -> Self {
        Self {
            id: id.to_string(),
            fields,
        }
    }

    /// Field value, with `null` reported as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    pub fn cursor(&self, field: &str) -> Cursor {
        Cursor {
            id: self.id.to_owned(),
            value: self.field(field).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(String, Value),
}

impl Predicate {
    pub fn eq<V: Into<Value>>(field: &str, value: V) -> Self {
        Self::Equals(field.to_string(), value.into())
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::Equals(field, value) => document.field(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Position of the last record of a fetched page: its id and order field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: DocumentId,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub collection: String,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl StoreQuery {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            predicates: vec![],
            order_by: None,
            limit: None,
            start_after: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Option<Cursor>) -> Self {
        self.start_after = cursor;
        self
    }

    /// Applies the query to an already fetched collection.
    pub fn run(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut rows: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.predicates.iter().all(|p| p.matches(document)))
            .collect();

        if let Some(order) = &self.order_by {
            rows.sort_by(|a, b| {
                compare_positions(
                    order,
                    (a.field(&order.field), &a.id),
                    (b.field(&order.field), &b.id),
                )
            });

            if let Some(cursor) = &self.start_after {
                rows.retain(|document| {
                    compare_positions(
                        order,
                        (document.field(&order.field), &document.id),
                        (cursor.value.as_ref(), &cursor.id),
                    ) == Ordering::Greater
                });
            }
        } else if let Some(cursor) = &self.start_after {
            rows.retain(|document| document.id > cursor.id);
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Total order used for paging: order value in the requested direction with
/// absent values last, ties broken by ascending id.
pub fn compare_positions(
    order: &OrderBy,
    (a_value, a_id): (Option<&Value>, &DocumentId),
    (b_value, b_id): (Option<&Value>, &DocumentId),
) -> Ordering {
    let by_value = match (a_value, b_value) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match order.direction {
            Direction::Ascending => compare_values(a, b),
            Direction::Descending => compare_values(b, a),
        },
    };

    by_value.then_with(|| a_id.cmp(b_id))
}

/// Kind order of jsonb: null < string < number < boolean < array < object.
fn value_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Orders values of mixed types by kind first, then by content, matching the
/// Postgres ordering of the same jsonb values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Object(a), Value::Object(b)) => {
            let key = |map: &serde_json::Map<String, Value>| {
                (
                    map.get("seconds").and_then(|v| v.as_i64()).unwrap_or(0),
                    map.get("nanoseconds").and_then(|v| v.as_i64()).unwrap_or(0),
                )
            };
            key(a).cmp(&key(b))
        }
        _ => value_rank(a).cmp(&value_rank(b)),
    }
}

pub fn generate_document_id() -> DocumentId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Read/write boundary of the hosted document database.
pub trait DocumentStore: Send + Sync {
    /// Every document of a collection, ordered by id.
    fn list_all(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<Vec<Document>, QueryError>> + Send;

    fn query(
        &self,
        query: &StoreQuery,
    ) -> impl Future<Output = Result<Vec<Document>, QueryError>> + Send;

    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>, QueryError>> + Send;

    /// Stores a new document under a generated id.
    fn create(
        &self,
        collection: &str,
        fields: FormData,
    ) -> impl Future<Output = Result<DocumentId, QueryError>> + Send;

    fn set(
        &self,
        collection: &str,
        id: &str,
        fields: FormData,
    ) -> impl Future<Output = Result<(), QueryError>> + Send;

    /// Shallow merge of `patch` into an existing document.
    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: FormData,
    ) -> impl Future<Output = Result<(), QueryError>> + Send;

    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), QueryError>> + Send;
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<DocumentId, FormData>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, collection: &str, document: Document) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(document.id, document.fields);
    }
}

impl DocumentStore for MemoryStore {
    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, QueryError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, fields)| Document::new(id, fields.to_owned()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<Document>, QueryError> {
        let documents = self.list_all(&query.collection).await?;
        Ok(query.run(documents))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, QueryError> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id, fields.to_owned())))
    }

    async fn create(&self, collection: &str, fields: FormData) -> Result<DocumentId, QueryError> {
        let id = generate_document_id();
        self.set(collection, &id, fields).await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: FormData) -> Result<(), QueryError> {
        self.insert(collection, Document::new(id, fields)).await;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: FormData) -> Result<(), QueryError> {
        let mut collections = self.collections.write().await;

        let fields = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| QueryError::not_found(collection, id))?;

        fields.extend(patch);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), QueryError> {
        let mut collections = self.collections.write().await;

        if let Some(documents) = collections.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }
}
