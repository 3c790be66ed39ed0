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

use finstore::auth::StaticAuth;
use finstore::document::{self, Document};
use finstore::query::QueryConstraint;
use finstore::store::{transaction, FlatAdapter, StoreAdapter};

fn adapter() -> FlatAdapter {
    FlatAdapter::in_memory(Arc::new(StaticAuth::for_user("alice")))
}

fn doc(value: Value) -> Document {
    document::from_value(value).unwrap()
}

#[tokio::test]
async fn test_add_stamps_id_and_created_at() {
    let store = adapter();
    let id = store
        .add("transactions", doc(json!({"amount": 12})))
        .await
        .unwrap();

    let fetched = store
        .get_one(&format!("transactions/{id}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.get("id"), Some(&json!(id)));
    assert_eq!(fetched.get("amount"), Some(&json!(12)));
    assert!(fetched.get("createdAt").is_some());
}

#[tokio::test]
async fn test_set_merges_into_existing_document() {
    let store = adapter();
    store
        .set("wallets/w1", doc(json!({"name": "cash", "balance": 10})))
        .await
        .unwrap();
    store
        .set("wallets/w1", doc(json!({"balance": 20})))
        .await
        .unwrap();

    let fetched = store.get_one("wallets/w1").await.unwrap().unwrap();
    assert_eq!(fetched.get("name"), Some(&json!("cash")));
    assert_eq!(fetched.get("balance"), Some(&json!(20)));
}

#[tokio::test]
async fn test_update_on_missing_target_creates_it() {
    // This backend keeps no must-already-exist distinction: update shares the
    // upsert path with set.
    let store = adapter();
    store
        .update("wallets/fresh", doc(json!({"balance": 5})))
        .await
        .unwrap();

    let fetched = store.get_one("wallets/fresh").await.unwrap().unwrap();
    assert_eq!(fetched.get("balance"), Some(&json!(5)));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = adapter();
    store
        .set("wallets/w1", doc(json!({"balance": 1})))
        .await
        .unwrap();

    store.delete("wallets/w1").await.unwrap();
    assert!(store.get_one("wallets/w1").await.unwrap().is_none());
    store.delete("wallets/w1").await.unwrap();
}

#[tokio::test]
async fn test_subscribe_fires_exactly_once() {
    let store = adapter();
    store
        .add("goals", doc(json!({"name": "one"})))
        .await
        .unwrap();
    store
        .add("goals", doc(json!({"name": "two"})))
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let sub = store
        .subscribe(
            "goals",
            Arc::new(move |docs| sink.lock().unwrap().push(docs)),
            &[QueryConstraint::limit(1)],
        )
        .await
        .unwrap();

    // A later write does not re-fire the callback.
    store
        .add("goals", doc(json!({"name": "three"})))
        .await
        .unwrap();

    let snapshots = seen.lock().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].len(), 1);
    sub.cancel();
}

#[tokio::test]
async fn test_transactions_are_refused() {
    let store = adapter();
    let err = store
        .run_transaction(transaction(|_tx| Box::pin(async move { Ok(Value::Null) })))
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn test_increment_marker_is_refused_not_stored() {
    let store = adapter();
    store
        .set("wallets/w1", doc(json!({"balance": 10})))
        .await
        .unwrap();

    let mut bump = Document::new();
    bump.insert("balance".to_string(), store.increment(5.0));

    assert!(store.update("wallets/w1", bump.clone()).await.unwrap_err().is_unsupported());
    assert!(store.set("wallets/w2", bump.clone()).await.unwrap_err().is_unsupported());
    assert!(store.add("wallets", bump).await.unwrap_err().is_unsupported());

    // The marker never reached the stored document.
    let fetched = store.get_one("wallets/w1").await.unwrap().unwrap();
    assert_eq!(fetched.get("balance"), Some(&json!(10)));
}

#[tokio::test]
async fn test_collections_are_isolated_entries() {
    let store = adapter();
    store
        .set("wallets/x", doc(json!({"kind": "wallet"})))
        .await
        .unwrap();
    store
        .set("budgets/x", doc(json!({"kind": "budget"})))
        .await
        .unwrap();

    let wallet = store.get_one("wallets/x").await.unwrap().unwrap();
    let budget = store.get_one("budgets/x").await.unwrap().unwrap();
    assert_eq!(wallet.get("kind"), Some(&json!("wallet")));
    assert_eq!(budget.get("kind"), Some(&json!("budget")));
}
