// Copyright 2025 Finstore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Flat key-value string store backend for offline and testing use

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use super::adapter::{SnapshotCallback, StoreAdapter, Subscription, TransactionFn};
use crate::auth::AuthContext;
use crate::config::FlatConfig;
use crate::document::{self, Document, ID_FIELD};
use crate::error::{Result, StoreError};
use crate::path::{self, ResolvedPath};
use crate::query::{apply_constraints, QueryConstraint};

const BACKEND: &str = "flat";

/// The most degraded backend: each collection is one flat array serialized as
/// a single string, fully deserialized and reserialized on every operation.
/// Acceptable only at small data volumes.
///
/// `subscribe` fires once and never again; `set` and `update` share one
/// upsert-or-merge path because this store keeps no must-already-exist
/// distinction; transactions and increment are unsupported. Unsafe under
/// concurrent writers — there is no concurrency control beneath the entry map
/// lock.
pub struct FlatAdapter {
    entries: Mutex<HashMap<String, String>>,
    key_prefix: String,
    auth: Arc<dyn AuthContext>,
}

impl FlatAdapter {
    pub fn new(config: FlatConfig, auth: Arc<dyn AuthContext>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            key_prefix: config.key_prefix,
            auth,
        }
    }

    /// In-memory store with the default key prefix, for tests and offline
    /// smoke runs.
    pub fn in_memory(auth: Arc<dyn AuthContext>) -> Self {
        Self::new(FlatConfig::default(), auth)
    }

    fn owner(&self) -> Option<String> {
        self.auth.current_user()
    }

    fn entry_key(&self, resolved: &ResolvedPath) -> String {
        format!("{}{}", self.key_prefix, resolved.collection())
    }

    async fn load(&self, key: &str) -> Result<Vec<Document>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, key: &str, docs: &[Document]) -> Result<()> {
        let raw = serde_json::to_string(docs)?;
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), raw);
        Ok(())
    }

    fn reject_increment(&self, data: &Document) -> Result<()> {
        if document::contains_increment(data) {
            return Err(StoreError::unsupported(BACKEND, "atomic increment"));
        }
        Ok(())
    }

    /// Single upsert-or-merge path shared by `set` and `update`.
    async fn upsert(&self, resolved: &ResolvedPath, data: Document) -> Result<()> {
        let key = self.entry_key(resolved);
        let id = resolved.doc_id().unwrap_or_default().to_string();

        let mut docs = self.load(&key).await?;
        match docs
            .iter_mut()
            .find(|doc| doc.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()))
        {
            Some(existing) => {
                document::merge_into(existing, data);
            }
            None => {
                let mut doc = data;
                doc.insert(ID_FIELD.to_string(), Value::String(id));
                docs.push(doc);
            }
        }
        self.save(&key, &docs).await
    }
}

#[async_trait]
impl StoreAdapter for FlatAdapter {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// One synchronous snapshot, then nothing: this backend has no
    /// change-notification mechanism at all.
    async fn subscribe(
        &self,
        path: &str,
        callback: SnapshotCallback,
        constraints: &[QueryConstraint],
    ) -> Result<Subscription> {
        let resolved = path::resolve_collection(path, self.owner().as_deref())?;
        let mut docs = self.load(&self.entry_key(&resolved)).await?;
        apply_constraints(&mut docs, constraints);
        callback(docs);
        Ok(Subscription::noop())
    }

    async fn get_one(&self, path: &str) -> Result<Option<Document>> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let docs = self.load(&self.entry_key(&resolved)).await?;
        let id = resolved.doc_id().unwrap_or_default();
        Ok(docs
            .into_iter()
            .find(|doc| doc.get(ID_FIELD).and_then(Value::as_str) == Some(id)))
    }

    async fn add(&self, path: &str, mut data: Document) -> Result<String> {
        self.reject_increment(&data)?;
        let resolved = path::resolve_collection(path, self.owner().as_deref())?;
        let key = self.entry_key(&resolved);

        let id = uuid::Uuid::new_v4().to_string();
        data.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        document::stamp_created_at(&mut data);

        let mut docs = self.load(&key).await?;
        docs.push(data);
        self.save(&key, &docs).await?;
        Ok(id)
    }

    async fn set(&self, path: &str, data: Document) -> Result<()> {
        self.reject_increment(&data)?;
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        self.upsert(&resolved, data).await
    }

    async fn update(&self, path: &str, partial: Document) -> Result<()> {
        self.reject_increment(&partial)?;
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        self.upsert(&resolved, partial).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let key = self.entry_key(&resolved);
        let id = resolved.doc_id().unwrap_or_default();

        let mut docs = self.load(&key).await?;
        docs.retain(|doc| doc.get(ID_FIELD).and_then(Value::as_str) != Some(id));
        self.save(&key, &docs).await
    }

    async fn run_transaction(&self, _func: TransactionFn) -> Result<Value> {
        warn!("flat backend does not support transactions");
        Err(StoreError::unsupported(BACKEND, "transactions"))
    }

    fn backend_type(&self) -> &'static str {
        BACKEND
    }
}
