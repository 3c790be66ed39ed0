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

// Storage backend module
//
// One capability contract (`StoreAdapter`), four interchangeable backends
// with fundamentally different native capabilities:
//
// - realtime:   in-process document store with native change subscriptions,
//               transactions, and atomic increment
// - rest:       request/response HTTP; subscriptions emulated by polling
// - structured: per-process filesystem store with owner-scoped reads and a
//               single-shot subscription
// - flat:       in-memory string store for offline/testing use
//
// The contract is defined by the guarantees the weakest backend can uphold;
// stronger backends simply exceed the floor.

pub mod adapter;
pub mod factory;
pub mod flat;
pub mod realtime;
pub mod rest;
pub mod structured;

pub use adapter::{
    transaction, SnapshotCallback, StoreAdapter, Subscription, TransactionContext, TransactionFn,
    TxFuture,
};
pub use factory::AdapterFactory;
pub use flat::FlatAdapter;
pub use realtime::RealtimeAdapter;
pub use rest::RestAdapter;
pub use structured::StructuredAdapter;
