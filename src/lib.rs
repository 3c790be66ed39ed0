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

// Persistence abstraction layer for a personal-finance application
//
// One capability contract for reading, writing, and subscribing to structured
// records, implemented by four interchangeable backends:
// - Emulates behavior a backend does not natively offer (polling-based
//   subscriptions, read-modify-write increments)
// - Normalizes divergent value representations so every caller sees ISO-8601
//   date strings regardless of backend
// - Preserves one logical addressing scheme across hierarchical, flat-REST,
//   and local key spaces

pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod normalize;
pub mod path;
pub mod query;
pub mod store;

// Re-export main types
pub use auth::{AuthContext, StaticAuth};
pub use config::{load_config, load_config_with_env, AppConfig};
pub use document::{Document, CREATED_AT_FIELD, ID_FIELD, OWNER_FIELD};
pub use error::{Result, StoreError};
pub use path::{ResolvedPath, OWNER_PLACEHOLDER};
pub use query::{QueryConstraint, SortDirection, WhereOp};
pub use store::{
    AdapterFactory, FlatAdapter, RealtimeAdapter, RestAdapter, SnapshotCallback, StoreAdapter,
    StructuredAdapter, Subscription, TransactionContext, TransactionFn,
};
