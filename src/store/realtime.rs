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

// Realtime document store backend: native change subscriptions, native
// transactions, atomic increment

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::adapter::{
    SnapshotCallback, StoreAdapter, Subscription, TransactionContext, TransactionFn,
};
use crate::auth::AuthContext;
use crate::config::RealtimeConfig;
use crate::document::{self, Document, ID_FIELD};
use crate::error::{Result, StoreError};
use crate::normalize;
use crate::path;
use crate::query::{apply_constraints, QueryConstraint};

/// In-process realtime document store.
///
/// Collections are keyed by the full hierarchical path, so
/// `users/alice/transactions` and `users/bob/transactions` are distinct.
/// Values are held in the backend's native representation; the normalizer
/// converts on the way in and out.
pub struct RealtimeAdapter {
    auth: Arc<dyn AuthContext>,
    state: Arc<RealtimeState>,
}

struct RealtimeState {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    watchers: DashMap<String, broadcast::Sender<()>>,
    channel_capacity: usize,
}

impl RealtimeAdapter {
    pub fn new(config: RealtimeConfig, auth: Arc<dyn AuthContext>) -> Self {
        Self {
            auth,
            state: Arc::new(RealtimeState {
                collections: RwLock::new(HashMap::new()),
                watchers: DashMap::new(),
                channel_capacity: config.channel_capacity,
            }),
        }
    }

    fn owner(&self) -> Option<String> {
        self.auth.current_user()
    }
}

impl RealtimeState {
    fn watch(&self, key: &str) -> broadcast::Receiver<()> {
        self.watchers
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    fn notify(&self, key: &str) {
        if let Some(sender) = self.watchers.get(key) {
            // No receivers is fine; nobody is watching this collection.
            let _ = sender.send(());
        }
    }

    async fn snapshot(&self, key: &str, constraints: &[QueryConstraint]) -> Vec<Document> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(key)
            .map(|col| {
                col.iter()
                    .map(|(id, doc)| materialize(id, doc.clone()))
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);
        apply_constraints(&mut docs, constraints);
        docs
    }

    /// Apply a staged operation list all-or-nothing under the store write
    /// lock. An `update` of a missing target aborts the whole batch.
    async fn commit(&self, ops: Vec<TxOp>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let mut overlay: HashMap<(String, String), Option<Document>> = HashMap::new();

        for op in ops {
            match op {
                TxOp::Set { key, id, data } => {
                    let existing = staged_current(&collections, &overlay, &key, &id);
                    let merged = merge_write(existing, data);
                    overlay.insert((key, id), Some(merged));
                }
                TxOp::Update { key, id, data } => {
                    let existing = staged_current(&collections, &overlay, &key, &id)
                        .ok_or_else(|| StoreError::NotFound(format!("{key}/{id}")))?;
                    let merged = merge_write(Some(existing), data);
                    overlay.insert((key, id), Some(merged));
                }
                TxOp::Delete { key, id } => {
                    overlay.insert((key, id), None);
                }
            }
        }

        let mut touched: Vec<String> = Vec::new();
        for ((key, id), value) in overlay {
            match value {
                Some(doc) => {
                    collections.entry(key.clone()).or_default().insert(id, doc);
                }
                None => {
                    if let Some(col) = collections.get_mut(&key) {
                        col.remove(&id);
                    }
                }
            }
            if !touched.contains(&key) {
                touched.push(key);
            }
        }
        drop(collections);

        for key in touched {
            self.notify(&key);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for RealtimeAdapter {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn subscribe(
        &self,
        path: &str,
        callback: SnapshotCallback,
        constraints: &[QueryConstraint],
    ) -> Result<Subscription> {
        let resolved = path::resolve_collection(path, self.owner().as_deref())?;
        let key = resolved.collection_key();

        let state = self.state.clone();
        let constraints = constraints.to_vec();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let task = tokio::spawn(async move {
            // Register before the first snapshot so no change is missed.
            let mut changes = state.watch(&key);

            let snap = state.snapshot(&key, &constraints).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            callback(snap);

            loop {
                match changes.recv().await {
                    Ok(()) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Full snapshots make missed signals harmless.
                        debug!("subscription on '{key}' lagged {missed} notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let snap = state.snapshot(&key, &constraints).await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                callback(snap);
            }
        });

        Ok(Subscription::with_task(cancelled, task))
    }

    async fn get_one(&self, path: &str) -> Result<Option<Document>> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let key = resolved.collection_key();
        let id = resolved.doc_id().unwrap_or_default();

        let collections = self.state.collections.read().await;
        Ok(collections
            .get(&key)
            .and_then(|col| col.get(id))
            .map(|doc| materialize(id, doc.clone())))
    }

    async fn add(&self, path: &str, data: Document) -> Result<String> {
        let resolved = path::resolve_collection(path, self.owner().as_deref())?;
        let key = resolved.collection_key();
        let id = uuid::Uuid::new_v4().to_string();
        let data = normalize::to_native(data);

        let mut collections = self.state.collections.write().await;
        let doc = merge_write(None, data);
        collections.entry(key.clone()).or_default().insert(id.clone(), doc);
        drop(collections);

        self.state.notify(&key);
        Ok(id)
    }

    async fn set(&self, path: &str, data: Document) -> Result<()> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let key = resolved.collection_key();
        let id = resolved.doc_id().unwrap_or_default().to_string();
        let data = normalize::to_native(data);

        let mut collections = self.state.collections.write().await;
        let existing = collections.get(&key).and_then(|col| col.get(&id)).cloned();
        let merged = merge_write(existing, data);
        collections.entry(key.clone()).or_default().insert(id, merged);
        drop(collections);

        self.state.notify(&key);
        Ok(())
    }

    async fn update(&self, path: &str, partial: Document) -> Result<()> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let key = resolved.collection_key();
        let id = resolved.doc_id().unwrap_or_default().to_string();
        let partial = normalize::to_native(partial);

        let mut collections = self.state.collections.write().await;
        let existing = collections
            .get(&key)
            .and_then(|col| col.get(&id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(resolved.as_resource()))?;
        let merged = merge_write(Some(existing), partial);
        collections.entry(key.clone()).or_default().insert(id, merged);
        drop(collections);

        self.state.notify(&key);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let resolved = path::resolve_document(path, self.owner().as_deref())?;
        let key = resolved.collection_key();
        let id = resolved.doc_id().unwrap_or_default();

        let mut collections = self.state.collections.write().await;
        let removed = collections
            .get_mut(&key)
            .map(|col| col.remove(id).is_some())
            .unwrap_or(false);
        drop(collections);

        if removed {
            self.state.notify(&key);
        }
        Ok(())
    }

    async fn run_transaction(&self, func: TransactionFn) -> Result<Value> {
        let mut ctx = RealtimeTxContext {
            state: self.state.clone(),
            owner: self.owner(),
            ops: Vec::new(),
        };
        let result = func(&mut ctx).await?;
        self.state.commit(ctx.ops).await?;
        Ok(result)
    }

    fn backend_type(&self) -> &'static str {
        "realtime"
    }
}

enum TxOp {
    Set {
        key: String,
        id: String,
        data: Document,
    },
    Update {
        key: String,
        id: String,
        data: Document,
    },
    Delete {
        key: String,
        id: String,
    },
}

/// Stages operations for an atomic commit. Reads observe the committed state,
/// not the stage; staged writes stay invisible to every reader until commit.
struct RealtimeTxContext {
    state: Arc<RealtimeState>,
    owner: Option<String>,
    ops: Vec<TxOp>,
}

impl RealtimeTxContext {
    fn address(&self, path: &str) -> Result<(String, String)> {
        let resolved = path::resolve_document(path, self.owner.as_deref())?;
        Ok((
            resolved.collection_key(),
            resolved.doc_id().unwrap_or_default().to_string(),
        ))
    }
}

#[async_trait]
impl TransactionContext for RealtimeTxContext {
    async fn get(&mut self, path: &str) -> Result<Option<Document>> {
        let (key, id) = self.address(path)?;
        let collections = self.state.collections.read().await;
        Ok(collections
            .get(&key)
            .and_then(|col| col.get(&id))
            .map(|doc| materialize(&id, doc.clone())))
    }

    async fn set(&mut self, path: &str, data: Document) -> Result<()> {
        let (key, id) = self.address(path)?;
        self.ops.push(TxOp::Set {
            key,
            id,
            data: normalize::to_native(data),
        });
        Ok(())
    }

    async fn update(&mut self, path: &str, partial: Document) -> Result<()> {
        let (key, id) = self.address(path)?;
        self.ops.push(TxOp::Update {
            key,
            id,
            data: normalize::to_native(partial),
        });
        Ok(())
    }

    async fn delete(&mut self, path: &str) -> Result<()> {
        let (key, id) = self.address(path)?;
        self.ops.push(TxOp::Delete { key, id });
        Ok(())
    }
}

/// Merge a native-form write into the existing native document, resolving
/// increment markers against it. Runs under the store write lock, which is
/// what makes increments atomic here.
fn merge_write(existing: Option<Document>, mut data: Document) -> Document {
    document::resolve_increments(existing.as_ref(), &mut data);
    match existing {
        Some(mut doc) => {
            document::merge_into(&mut doc, data);
            doc
        }
        None => data,
    }
}

fn materialize(id: &str, doc: Document) -> Document {
    let mut doc = normalize::from_native(doc);
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    doc
}

fn staged_current(
    collections: &HashMap<String, BTreeMap<String, Document>>,
    overlay: &HashMap<(String, String), Option<Document>>,
    key: &str,
    id: &str,
) -> Option<Document> {
    if let Some(staged) = overlay.get(&(key.to_string(), id.to_string())) {
        return staged.clone();
    }
    collections.get(key).and_then(|col| col.get(id)).cloned()
}
