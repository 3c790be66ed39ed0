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

// Local structured store backend: one directory per collection, one JSON file
// per document, owner-scoped reads

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::adapter::{
    SnapshotCallback, StoreAdapter, Subscription, TransactionContext, TransactionFn,
};
use crate::auth::AuthContext;
use crate::config::StructuredConfig;
use crate::document::{self, Document, ID_FIELD, OWNER_FIELD};
use crate::error::{Result, StoreError};
use crate::path::{self, ResolvedPath};
use crate::query::{apply_constraints, QueryConstraint};

const BACKEND: &str = "structured";

/// Collection whose documents are not scoped to an owner.
const UNSCOPED_COLLECTION: &str = "users";

/// Structured store on the local filesystem.
///
/// Reads are scoped by the stamped owner field (except the `users`
/// collection). There is no change notification: `subscribe` performs exactly
/// one read and one callback. Increments are read-modify-write and unsafe
/// under concurrent local writers; transactions apply sequentially without
/// atomicity. Both limitations are logged, never hidden.
pub struct StructuredAdapter {
    base_path: PathBuf,
    auth: Arc<dyn AuthContext>,
}

impl StructuredAdapter {
    pub fn new(config: StructuredConfig, auth: Arc<dyn AuthContext>) -> Self {
        Self {
            base_path: PathBuf::from(&config.base_path),
            auth,
        }
    }

    fn owner(&self) -> Option<String> {
        self.auth.current_user()
    }

    fn require_owner(&self) -> Result<String> {
        self.owner().ok_or_else(|| {
            StoreError::NotAuthenticated("structured backend requires a principal".to_string())
        })
    }

    fn doc_file(&self, resolved: &ResolvedPath) -> PathBuf {
        let dir = self.base_path.join(resolved.collection());
        dir.join(format!("{}.json", resolved.doc_id().unwrap_or_default()))
    }

    async fn read_doc(&self, resolved: &ResolvedPath) -> Result<Option<Document>> {
        match fs::read(self.doc_file(resolved)).await {
            Ok(bytes) => {
                let doc: Document = serde_json::from_slice(&bytes)?;
                Ok(Some(doc))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_doc(&self, resolved: &ResolvedPath, doc: &Document) -> Result<()> {
        let dir = self.base_path.join(resolved.collection());
        fs::create_dir_all(&dir).await?;

        let file_path = self.doc_file(resolved);
        debug!("writing document to {}", file_path.display());

        let body = serde_json::to_vec_pretty(doc)?;
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(&body).await?;
        file.flush().await?;
        Ok(())
    }

    /// The one indexed read: everything in the collection for the current
    /// owner, or the whole collection when it is not owner-scoped.
    async fn read_collection(&self, collection: &str) -> Result<Vec<Document>> {
        let owner = if collection == UNSCOPED_COLLECTION {
            None
        } else {
            Some(self.require_owner()?)
        };

        let dir = self.base_path.join(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            let doc: Document = match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("skipping unreadable document {}: {e}", path.display());
                    continue;
                }
            };
            let matches_owner = match &owner {
                Some(owner) => doc.get(OWNER_FIELD).and_then(Value::as_str) == Some(owner),
                None => true,
            };
            if matches_owner {
                docs.push(doc);
            }
        }

        // Deterministic order before constraints run.
        docs.sort_by(|a, b| {
            let a_id = a.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
            let b_id = b.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
            a_id.cmp(b_id)
        });
        Ok(docs)
    }

    fn stamp_owner(&self, collection: &str, doc: &mut Document) -> Result<()> {
        if collection != UNSCOPED_COLLECTION && !doc.contains_key(OWNER_FIELD) {
            doc.insert(
                OWNER_FIELD.to_string(),
                Value::String(self.require_owner()?),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for StructuredAdapter {
    async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// One read, one callback. Writes from other processes are invisible
    /// afterwards — this is a snapshot subscription, not realtime.
    async fn subscribe(
        &self,
        path: &str,
        callback: SnapshotCallback,
        constraints: &[QueryConstraint],
    ) -> Result<Subscription> {
        let resolved = path::resolve_collection(path, self.owner().as_deref())?;
        let mut docs = self.read_collection(resolved.collection()).await?;
        apply_constraints(&mut docs, constraints);
        callback(docs);
        Ok(Subscription::noop())
    }

    async fn get_one(&self, path: &str) -> Result<Option<Document>> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let mut doc = match self.read_doc(&resolved).await? {
            Some(doc) => doc,
            None => return Ok(None),
        };
        doc.entry(ID_FIELD.to_string())
            .or_insert_with(|| Value::String(resolved.doc_id().unwrap_or_default().to_string()));
        Ok(Some(doc))
    }

    async fn add(&self, path: &str, mut data: Document) -> Result<String> {
        let resolved = path::resolve_collection(path, self.owner().as_deref())?;
        document::resolve_increments(None, &mut data);
        self.stamp_owner(resolved.collection(), &mut data)?;
        document::stamp_created_at(&mut data);

        let id = uuid::Uuid::new_v4().to_string();
        data.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        let doc_path = path::resolve_document(
            &format!("{}/{}", resolved.as_resource(), id),
            self.owner().as_deref(),
        )?;
        self.write_doc(&doc_path, &data).await?;
        Ok(id)
    }

    async fn set(&self, path: &str, data: Document) -> Result<()> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let existing = self.read_doc(&resolved).await?;

        let mut merged = existing.clone().unwrap_or_default();
        let mut incoming = data;
        document::resolve_increments(existing.as_ref(), &mut incoming);
        document::merge_into(&mut merged, incoming);
        merged.insert(
            ID_FIELD.to_string(),
            Value::String(resolved.doc_id().unwrap_or_default().to_string()),
        );
        self.stamp_owner(resolved.collection(), &mut merged)?;

        self.write_doc(&resolved, &merged).await
    }

    async fn update(&self, path: &str, partial: Document) -> Result<()> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let mut existing = self
            .read_doc(&resolved)
            .await?
            .ok_or_else(|| StoreError::NotFound(resolved.as_resource()))?;

        let mut incoming = partial;
        // Read-modify-write; not atomic under concurrent local writers.
        document::resolve_increments(Some(&existing), &mut incoming);
        document::merge_into(&mut existing, incoming);

        self.write_doc(&resolved, &existing).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        match fs::remove_file(self.doc_file(&resolved)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Staged operations run sequentially against the same store handle.
    /// Weak guarantee: a failure mid-way leaves earlier operations applied.
    async fn run_transaction(&self, func: TransactionFn) -> Result<Value> {
        warn!("structured backend emulates transactions sequentially, without atomicity");
        let mut ctx = StructuredTxContext { adapter: self };
        func(&mut ctx).await
    }

    fn backend_type(&self) -> &'static str {
        BACKEND
    }
}

struct StructuredTxContext<'a> {
    adapter: &'a StructuredAdapter,
}

#[async_trait]
impl TransactionContext for StructuredTxContext<'_> {
    async fn get(&mut self, path: &str) -> Result<Option<Document>> {
        self.adapter.get_one(path).await
    }

    async fn set(&mut self, path: &str, data: Document) -> Result<()> {
        self.adapter.set(path, data).await
    }

    async fn update(&mut self, path: &str, partial: Document) -> Result<()> {
        self.adapter.update(path, partial).await
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        self.adapter.delete(path).await
    }
}
