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

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tempfile::TempDir;

use finstore::auth::StaticAuth;
use finstore::config::StructuredConfig;
use finstore::document::{self, Document};
use finstore::query::{QueryConstraint, SortDirection};
use finstore::store::{transaction, StoreAdapter, StructuredAdapter};
use finstore::StoreError;

fn adapter_for(dir: &TempDir, user: &str) -> StructuredAdapter {
    StructuredAdapter::new(
        StructuredConfig {
            base_path: dir.path().to_string_lossy().into_owned(),
        },
        Arc::new(StaticAuth::for_user(user)),
    )
}

fn doc(value: Value) -> Document {
    document::from_value(value).unwrap()
}

#[tokio::test]
async fn test_add_stamps_id_owner_and_created_at() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    let id = store
        .add("budgets", doc(json!({"name": "groceries", "limit": 400})))
        .await
        .unwrap();

    let fetched = store
        .get_one(&format!("budgets/{id}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.get("id"), Some(&json!(id)));
    assert_eq!(fetched.get("userId"), Some(&json!("alice")));
    assert!(fetched.get("createdAt").is_some());
    assert_eq!(fetched.get("limit"), Some(&json!(400)));
}

#[tokio::test]
async fn test_reads_are_scoped_to_the_owner() {
    let dir = TempDir::new().unwrap();
    let alice = adapter_for(&dir, "alice");
    let bob = adapter_for(&dir, "bob");
    alice.initialize().await.unwrap();

    alice.add("wallets", doc(json!({"name": "a1"}))).await.unwrap();
    alice.add("wallets", doc(json!({"name": "a2"}))).await.unwrap();
    bob.add("wallets", doc(json!({"name": "b1"}))).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    alice
        .subscribe(
            "wallets",
            Arc::new(move |docs| sink.lock().unwrap().push(docs)),
            &[],
        )
        .await
        .unwrap();

    let snapshots = seen.lock().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].len(), 2);
    for d in &snapshots[0] {
        assert_eq!(d.get("userId"), Some(&json!("alice")));
    }
}

#[tokio::test]
async fn test_users_collection_is_not_owner_scoped() {
    let dir = TempDir::new().unwrap();
    let alice = adapter_for(&dir, "alice");
    let bob = adapter_for(&dir, "bob");
    alice.initialize().await.unwrap();

    alice
        .set("users/alice", doc(json!({"displayName": "Alice"})))
        .await
        .unwrap();
    bob.set("users/bob", doc(json!({"displayName": "Bob"})))
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    alice
        .subscribe(
            "users",
            Arc::new(move |docs| sink.lock().unwrap().push(docs)),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap()[0].len(), 2);
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    let err = store
        .update("budgets/absent", doc(json!({"limit": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_absent_document_is_ok() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    store.delete("budgets/absent").await.unwrap();
}

#[tokio::test]
async fn test_set_merges_into_existing_document() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    store
        .set("wallets/w1", doc(json!({"name": "checking", "balance": 10})))
        .await
        .unwrap();
    store
        .set("wallets/w1", doc(json!({"balance": 25})))
        .await
        .unwrap();

    let fetched = store.get_one("wallets/w1").await.unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&json!("checking")));
    assert_eq!(fetched.get("balance"), Some(&json!(25)));
}

#[tokio::test]
async fn test_increment_applies_via_read_modify_write() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    store
        .set("wallets/w1", doc(json!({"balance": 100})))
        .await
        .unwrap();

    let mut bump = Document::new();
    bump.insert("balance".to_string(), store.increment(-30.0));
    store.update("wallets/w1", bump).await.unwrap();

    let fetched = store.get_one("wallets/w1").await.unwrap().unwrap();
    assert_eq!(fetched.get("balance"), Some(&json!(70)));
}

#[tokio::test]
async fn test_increment_on_missing_field_starts_from_zero() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    let mut data = Document::new();
    data.insert("counter".to_string(), store.increment(3.0));
    let id = store.add("stats", data).await.unwrap();

    let fetched = store.get_one(&format!("stats/{id}")).await.unwrap().unwrap();
    assert_eq!(fetched.get("counter"), Some(&json!(3)));
}

#[tokio::test]
async fn test_transaction_applies_operations_sequentially() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    store
        .set("wallets/w1", doc(json!({"balance": 90})))
        .await
        .unwrap();

    let result = store
        .run_transaction(transaction(|tx| {
            Box::pin(async move {
                let wallet = tx.get("wallets/w1").await?.unwrap();
                assert_eq!(wallet.get("balance"), Some(&json!(90)));
                tx.update(
                    "wallets/w1",
                    document::from_value(json!({"balance": 80})).unwrap(),
                )
                .await?;
                tx.set(
                    "transactions/t1",
                    document::from_value(json!({"amount": 10})).unwrap(),
                )
                .await?;
                Ok(Value::Null)
            })
        }))
        .await
        .unwrap();
    assert_eq!(result, Value::Null);

    let wallet = store.get_one("wallets/w1").await.unwrap().unwrap();
    assert_eq!(wallet.get("balance"), Some(&json!(80)));
    assert!(store.get_one("transactions/t1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_subscribe_applies_order_by_constraint() {
    let dir = TempDir::new().unwrap();
    let store = adapter_for(&dir, "alice");
    store.initialize().await.unwrap();

    store
        .add("transactions", doc(json!({"amount": 20})))
        .await
        .unwrap();
    store
        .add("transactions", doc(json!({"amount": 5})))
        .await
        .unwrap();
    store
        .add("transactions", doc(json!({"amount": 50})))
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store
        .subscribe(
            "transactions",
            Arc::new(move |docs| sink.lock().unwrap().push(docs)),
            &[QueryConstraint::order_by("amount", SortDirection::Desc)],
        )
        .await
        .unwrap();

    let snapshots = seen.lock().unwrap();
    let amounts: Vec<i64> = snapshots[0]
        .iter()
        .map(|d| d.get("amount").and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(amounts, vec![50, 20, 5]);
}
