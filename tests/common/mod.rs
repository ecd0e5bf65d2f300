//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use graft::{EntityList, FetchRequest, Fetcher, Identifier, LoadError, LoadResult, Store, ingest_entity};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

/// In-memory backend serving canned JSON records and recording every call.
#[derive(Default)]
pub struct Backend {
    records: HashMap<(String, Identifier), serde_json::Value>,
    calls: Mutex<Vec<FetchRequest>>,
    failing: Option<String>,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. `body` must carry `id` and `type`.
    pub fn with(mut self, body: serde_json::Value) -> Self {
        let type_name = body["type"].as_str().unwrap_or_default().to_string();
        let id = Identifier::from_json(&body["id"]).expect("record without a valid id");
        self.records.insert((type_name, id), body);
        self
    }

    /// Fail every request for `type_name`.
    pub fn failing(mut self, type_name: &str) -> Self {
        self.failing = Some(type_name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls as `(type, ids, relations)` triples.
    pub fn call_log(&self) -> Vec<(String, Vec<Identifier>, String)> {
        self.calls
            .lock()
            .iter()
            .map(|call| (call.type_name.to_string(), call.ids.clone(), call.relations.to_string()))
            .collect()
    }
}

#[async_trait]
impl Fetcher for Backend {
    async fn fetch(&self, request: &FetchRequest) -> LoadResult<EntityList> {
        self.calls.lock().push(request.clone());
        if self.failing.as_deref() == Some(request.type_name.as_str()) {
            return Err(LoadError::fetch_failed(request.type_name.as_str(), "connection reset"));
        }

        let mut store = Store::new();
        let mut list = EntityList::typed(request.type_name.clone()).with_params(request.to_params());
        for id in &request.ids {
            if let Some(body) = self.records.get(&(request.type_name.to_string(), id.clone())) {
                list.push(ingest_entity(body, &mut store)?)?;
            }
        }
        Ok(list)
    }
}

/// A blog backend: users 1 and 15, categories 21 and 22, profiles 7 and 8.
pub fn blog() -> Backend {
    Backend::new()
        .with(json!({"id": 1, "type": "user", "name": "Ann", "profile": {"id": 7, "type": "profile"}}))
        .with(json!({"id": 15, "type": "user", "name": "Bob", "profile": {"id": 8, "type": "profile"}}))
        .with(json!({"id": 7, "type": "profile", "bio": "Writes about Rust"}))
        .with(json!({"id": 8, "type": "profile", "bio": "Edits things"}))
        .with(json!({"id": 21, "type": "category", "name": "News"}))
        .with(json!({"id": 22, "type": "category", "name": "Tech"}))
}

/// Article 10 by user 15 in categories 21 and 22.
pub fn article() -> serde_json::Value {
    json!({
        "id": 10,
        "type": "article",
        "title": "Hello",
        "author": {"id": 15, "type": "user"},
        "categories": [{"id": 21, "type": "category"}, {"id": 22, "type": "category"}]
    })
}

/// Two articles written by user 1.
pub fn articles_by_same_author() -> serde_json::Value {
    json!([
        {"id": 10, "type": "article", "title": "First", "author": {"id": 1, "type": "user"}},
        {"id": 11, "type": "article", "title": "Second", "author": {"id": 1, "type": "user"}}
    ])
}
