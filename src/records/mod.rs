//! # Persistent record store collaborator.
//!
//! The engine needs only three operations from the application's database:
//! insert a record, read one by id, and update fields by id. [`RecordStore`]
//! captures that contract; executors use it to look up entities referenced by
//! payloads, and [`EventLogWriter`](crate::EventLogWriter) appends the
//! immutable event log through it.
//!
//! [`MemoryRecordStore`] is an in-process implementation for tests, demos and
//! single-node deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StoreError;

/// Record-oriented store contract.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Inserts `record` (a JSON object) into `collection` and returns its id.
    ///
    /// If the record has a string `"id"` field it is used; otherwise a UUID is assigned.
    async fn insert(&self, collection: &str, record: Value) -> Result<String, StoreError>;

    /// Reads one record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Shallow-merges `fields` (a JSON object) into an existing record.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError>;
}

/// In-memory [`RecordStore`].
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, Vec<(String, Map<String, Value>)>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records of `collection` in insertion order.
    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .get(collection)
            .map(|rows| rows.iter().map(|(_, r)| Value::Object(r.clone())).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, collection: &str, record: Value) -> Result<String, StoreError> {
        let Value::Object(mut record) = record else {
            return Err(StoreError::NotAnObject);
        };
        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert("id".into(), Value::String(id.clone()));
                id
            }
        };
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), record));
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.collections.read().get(collection).and_then(|rows| {
            rows.iter()
                .find(|(rid, _)| rid == id)
                .map(|(_, r)| Value::Object(r.clone()))
        }))
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<(), StoreError> {
        let Value::Object(fields) = fields else {
            return Err(StoreError::NotAnObject);
        };
        let mut collections = self.collections.write();
        let row = collections
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|(rid, _)| rid == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        row.1.extend(fields);
        Ok(())
    }
}
