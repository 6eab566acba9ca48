//! Opaque external collaborators, specified only at their interface boundary.
//!
//! The real deployments back these with a managed database and a message
//! middleware; the in-memory implementations here exist for tests and the
//! demo daemon.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

/// Generic data access over named collections of JSON documents.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Documents in `collection` matching every field of `filter`
    /// (an empty object matches all).
    async fn query(&self, collection: &str, filter: Value) -> Result<Vec<Value>>;

    async fn insert(&self, collection: &str, document: Value) -> Result<()>;

    /// Shallow-merge `patch` into every document matching `filter`.
    async fn update(&self, collection: &str, filter: Value, patch: Value) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryDataStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection, for tests and demos.
    pub fn with_collection(self, collection: impl Into<String>, documents: Vec<Value>) -> Self {
        self.collections.lock().insert(collection.into(), documents);
        self
    }
}

fn matches(document: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(key, expected)| document.get(key) == Some(expected)),
        None => true,
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn query(&self, collection: &str, filter: Value) -> Result<Vec<Value>> {
        let collections = self.collections.lock();
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| matches(document, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<()> {
        self.collections
            .lock()
            .entry(collection.to_owned())
            .or_default()
            .push(document);
        Ok(())
    }

    async fn update(&self, collection: &str, filter: Value, patch: Value) -> Result<()> {
        let mut collections = self.collections.lock();
        if let Some(documents) = collections.get_mut(collection) {
            for document in documents.iter_mut() {
                if matches(document, &filter)
                    && let (Some(target), Some(fields)) =
                        (document.as_object_mut(), patch.as_object())
                {
                    for (key, value) in fields {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Middleware collaborator: a queue of previously-failed or pending work
/// items that the middleware component reprocesses on startup.
#[async_trait]
pub trait MiddlewareProcessor: Send + Sync {
    async fn pending_items(&self) -> Result<Vec<Value>>;

    async fn process(&self, item: Value) -> Result<()>;
}

/// Middleware that has nothing pending and accepts everything.
#[derive(Debug, Default, Clone)]
pub struct NoopMiddleware;

#[async_trait]
impl MiddlewareProcessor for NoopMiddleware {
    async fn pending_items(&self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn process(&self, _item: Value) -> Result<()> {
        Ok(())
    }
}
