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

// REST polling backend: request/response HTTP with emulated subscriptions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{error, warn};

use super::adapter::{SnapshotCallback, StoreAdapter, Subscription, TransactionFn};
use crate::auth::AuthContext;
use crate::config::RestConfig;
use crate::document::{self, Document, ID_FIELD, OWNER_FIELD};
use crate::error::{Result, StoreError};
use crate::path::{self, ResolvedPath};
use crate::query::{apply_constraints, QueryConstraint};

const BACKEND: &str = "rest";

/// Backend reachable only over request/response HTTP.
///
/// Wire shape: one resource path per collection/document under
/// `<base>/api/data/`, owner always present as the `userId` query parameter,
/// verbs mapped 1:1 (GET/POST/PUT/PATCH/DELETE), partial updates wrapped in an
/// explicit `{"$set": ...}` envelope. Every call resolves a bearer credential
/// first and fails closed without one.
#[derive(Clone)]
pub struct RestAdapter {
    client: Client,
    base_url: String,
    poll_interval: Duration,
    auth: Arc<dyn AuthContext>,
}

impl RestAdapter {
    pub fn new(config: RestConfig, auth: Arc<dyn AuthContext>) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval(),
            auth,
        })
    }

    /// Gatekeeper: principal and credential, or fail closed.
    fn credentials(&self) -> Result<(String, String)> {
        let user = self.auth.current_user().ok_or_else(|| {
            StoreError::NotAuthenticated("REST backend requires a principal".to_string())
        })?;
        let token = self.auth.bearer_token()?;
        Ok((user, token))
    }

    fn api_url(&self, resolved: &ResolvedPath, user: &str) -> String {
        build_api_url(&self.base_url, resolved, user)
    }

    async fn fetch_collection(&self, resolved: &ResolvedPath) -> Result<Vec<Document>> {
        let (user, token) = self.credentials()?;
        let response = self
            .client
            .get(self.api_url(resolved, &user))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Transient(format!(
                "list '{}' failed with status {}",
                resolved.as_resource(),
                response.status()
            )));
        }

        let body: Vec<Value> = response.json().await?;
        body.into_iter().map(normalize_rest_doc).collect()
    }

    fn reject_increment(&self, data: &Document) -> Result<()> {
        // No server-side field knowledge, so the marker cannot be expressed
        // generically over this backend. Refuse instead of storing it.
        if document::contains_increment(data) {
            return Err(StoreError::unsupported(BACKEND, "atomic increment"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for RestAdapter {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Emulated realtime: one immediate fetch, then a fixed-interval re-fetch
    /// delivering the full result set every tick, changed or not. A fetch
    /// error is logged and ends the loop; the subscription goes silent.
    async fn subscribe(
        &self,
        path: &str,
        callback: SnapshotCallback,
        constraints: &[QueryConstraint],
    ) -> Result<Subscription> {
        let owner = self.auth.current_user();
        let resolved = path::resolve_collection(path, owner.as_deref())?;

        let adapter = self.clone();
        let constraints = constraints.to_vec();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let period = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                match adapter.fetch_collection(&resolved).await {
                    Ok(mut docs) => {
                        apply_constraints(&mut docs, &constraints);
                        if flag.load(Ordering::SeqCst) {
                            break;
                        }
                        callback(docs);
                    }
                    Err(e) => {
                        error!(
                            "poll of '{}' failed, subscription goes silent: {e}",
                            resolved.as_resource()
                        );
                        break;
                    }
                }
            }
        });

        Ok(Subscription::with_task(cancelled, task))
    }

    async fn get_one(&self, path: &str) -> Result<Option<Document>> {
        let (user, token) = self.credentials()?;
        let resolved = path::resolve_document(path, Some(&user))?;

        let response = self
            .client
            .get(self.api_url(&resolved, &user))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: Value = response.json().await?;
                Ok(Some(normalize_rest_doc(body)?))
            }
            status => Err(StoreError::Transient(format!(
                "get '{}' failed with status {status}",
                resolved.as_resource()
            ))),
        }
    }

    async fn add(&self, path: &str, data: Document) -> Result<String> {
        self.reject_increment(&data)?;
        let (user, token) = self.credentials()?;
        let resolved = path::resolve_collection(path, Some(&user))?;

        let response = self
            .client
            .post(self.api_url(&resolved, &user))
            .bearer_auth(token)
            .json(&Value::Object(data))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Transient(format!(
                "add to '{}' failed with status {}",
                resolved.as_resource(),
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        body.get("insertedId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::Transient("add response missing 'insertedId'".to_string())
            })
    }

    async fn set(&self, path: &str, data: Document) -> Result<()> {
        self.reject_increment(&data)?;
        let (user, token) = self.credentials()?;
        let resolved = path::resolve_document(path, Some(&user))?;

        let response = self
            .client
            .put(self.api_url(&resolved, &user))
            .bearer_auth(token)
            .json(&Value::Object(data))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Transient(format!(
                "set '{}' failed with status {}",
                resolved.as_resource(),
                response.status()
            )));
        }
        Ok(())
    }

    async fn update(&self, path: &str, partial: Document) -> Result<()> {
        self.reject_increment(&partial)?;
        let (user, token) = self.credentials()?;
        let resolved = path::resolve_document(path, Some(&user))?;

        let response = self
            .client
            .patch(self.api_url(&resolved, &user))
            .bearer_auth(token)
            .json(&update_envelope(partial))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(resolved.as_resource())),
            status if status.is_success() => Ok(()),
            status => Err(StoreError::Transient(format!(
                "update '{}' failed with status {status}",
                resolved.as_resource()
            ))),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (user, token) = self.credentials()?;
        let resolved = path::resolve_document(path, Some(&user))?;

        let response = self
            .client
            .delete(self.api_url(&resolved, &user))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        // Absent targets are not an error; delete is idempotent.
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT
        {
            Ok(())
        } else {
            Err(StoreError::Transient(format!(
                "delete '{}' failed with status {status}",
                resolved.as_resource()
            )))
        }
    }

    /// Not supported: sequential emulation across a network boundary would
    /// silently break the atomicity contract.
    async fn run_transaction(&self, _func: TransactionFn) -> Result<Value> {
        warn!("client-side transactions are not supported over the REST backend");
        Err(StoreError::unsupported(BACKEND, "transactions"))
    }

    fn backend_type(&self) -> &'static str {
        BACKEND
    }
}

/// The partial-update envelope. A naive JSON merge is ambiguous for nested
/// documents, so updates travel as an explicit instruction.
fn update_envelope(partial: Document) -> Value {
    json!({ "$set": Value::Object(partial) })
}

fn build_api_url(base_url: &str, resolved: &ResolvedPath, user: &str) -> String {
    format!(
        "{}/api/data/{}?{}={}",
        base_url,
        resolved.as_resource(),
        OWNER_FIELD,
        user
    )
}

/// Map a wire document to the application shape: `_id` becomes `id`.
fn normalize_rest_doc(value: Value) -> Result<Document> {
    let mut doc = document::from_value(value)?;
    if let Some(raw_id) = doc.remove("_id") {
        let id = match raw_id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        doc.insert(ID_FIELD.to_string(), Value::String(id));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_url_carries_owner() {
        let resolved = path::resolve("users/alice/transactions", None).unwrap();
        let url = build_api_url("http://localhost:3000", &resolved, "alice");
        assert_eq!(
            url,
            "http://localhost:3000/api/data/users/alice/transactions?userId=alice"
        );
    }

    #[test]
    fn test_update_envelope_shape() {
        let partial = document::from_value(json!({"amount": 12})).unwrap();
        assert_eq!(update_envelope(partial), json!({"$set": {"amount": 12}}));
    }

    #[test]
    fn test_wire_id_mapping() {
        let doc = normalize_rest_doc(json!({"_id": "abc123", "name": "rent"})).unwrap();
        assert_eq!(doc.get("id"), Some(&json!("abc123")));
        assert!(!doc.contains_key("_id"));
    }

    #[test]
    fn test_non_object_wire_doc_rejected() {
        assert!(normalize_rest_doc(json!(["not", "a", "doc"])).is_err());
    }
}
