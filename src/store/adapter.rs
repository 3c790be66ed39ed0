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

// Capability contract implemented by every storage backend

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::document::{self, Document};
use crate::error::Result;
use crate::query::QueryConstraint;

/// Snapshot receiver. Always handed the entire current result set, never a
/// diff, and at least once immediately after subscribing.
pub type SnapshotCallback = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// One contract for reading, writing, and subscribing to documents.
///
/// The guarantees are the floor every backend can uphold: full-snapshot
/// callbacks, no ordering between independent operations, no ordering between
/// distinct subscriptions. Stronger backends simply exceed the floor.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Backend bring-up (create base directory, verify connectivity).
    /// Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Register a live query. The callback is invoked with the full matching
    /// result set at least once immediately; errors inside the subscription
    /// mechanism are logged and the subscription goes silent.
    async fn subscribe(
        &self,
        path: &str,
        callback: SnapshotCallback,
        constraints: &[QueryConstraint],
    ) -> Result<Subscription>;

    /// Fetch a single document. `None` for not-found; errors only for
    /// connectivity or auth failure.
    async fn get_one(&self, path: &str) -> Result<Option<Document>>;

    /// Insert with a backend-assigned id, returned to the caller.
    async fn add(&self, path: &str, data: Document) -> Result<String>;

    /// Upsert: create if absent, merge into the existing document otherwise.
    async fn set(&self, path: &str, data: Document) -> Result<()>;

    /// Partial update of an existing document. Fails with `NotFound` when the
    /// target does not exist.
    async fn update(&self, path: &str, partial: Document) -> Result<()>;

    /// Idempotent delete; an absent target is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Run `func` against a transaction context. Atomic where the backend has
    /// a native primitive; weaker backends either emulate sequentially (and
    /// say so) or refuse with `Unsupported` — never silently partial.
    async fn run_transaction(&self, func: TransactionFn) -> Result<Value>;

    /// Pure marker constructor for an atomic numeric increment. No I/O.
    fn increment(&self, delta: f64) -> Value {
        document::increment(delta)
    }

    /// Backend identifier used by the factory and logs.
    fn backend_type(&self) -> &'static str;
}

/// Staged operations handed to a transaction callback.
///
/// On the realtime backend these are invisible to concurrent readers until
/// commit and apply all-or-nothing. The structured backend applies them as
/// issued — a documented weaker guarantee, never presented as atomic.
#[async_trait]
pub trait TransactionContext: Send {
    async fn get(&mut self, path: &str) -> Result<Option<Document>>;
    async fn set(&mut self, path: &str, data: Document) -> Result<()>;
    async fn update(&mut self, path: &str, partial: Document) -> Result<()>;
    async fn delete(&mut self, path: &str) -> Result<()>;
}

pub type TxFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Boxed transaction body. Built with [`transaction`].
pub type TransactionFn = Box<dyn for<'a> FnOnce(&'a mut dyn TransactionContext) -> TxFuture<'a> + Send>;

/// Box a transaction closure, guiding the closure's return coercion:
///
/// ```ignore
/// adapter.run_transaction(transaction(|tx| Box::pin(async move {
///     let doc = tx.get("wallets/w1").await?;
///     // ...
///     Ok(Value::Null)
/// }))).await?;
/// ```
pub fn transaction<F>(func: F) -> TransactionFn
where
    F: for<'a> FnOnce(&'a mut dyn TransactionContext) -> TxFuture<'a> + Send + 'static,
{
    Box::new(func)
}

/// Handle for an active subscription.
///
/// `cancel` is safe to call more than once and from any task. After
/// cancellation no further callback invocations occur; for poll-based
/// backends the underlying timer stops immediately.
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
    /// Subscription driven by a background task. The task should observe the
    /// flag; cancel also aborts it so a sleeping timer cannot keep ticking.
    pub fn with_task(cancelled: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self {
            cancelled,
            task: Mutex::new(Some(task)),
        }
    }

    /// Subscription with nothing to tear down (single-shot backends).
    pub fn noop() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
