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

// Principal resolution for owner-scoped paths and bearer credentials

use crate::error::{Result, StoreError};

/// Source of the authenticated principal.
///
/// The path resolver asks for the current user to substitute the owner
/// placeholder; the REST backend additionally requires a bearer token before
/// every call and fails closed without one.
pub trait AuthContext: Send + Sync {
    /// Identifier of the authenticated principal, if any.
    fn current_user(&self) -> Option<String>;

    /// Bearer credential for HTTP backends. Must error rather than allow an
    /// unauthenticated call to proceed.
    fn bearer_token(&self) -> Result<String> {
        Err(StoreError::NotAuthenticated(
            "no bearer credential available".to_string(),
        ))
    }
}

/// Fixed principal, typically built from configuration. Suitable for a single
/// signed-in user per process and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user_id: Option<String>,
    bearer_token: Option<String>,
}

impl StaticAuth {
    pub fn new(user_id: Option<String>, bearer_token: Option<String>) -> Self {
        Self {
            user_id,
            bearer_token,
        }
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            bearer_token: None,
        }
    }

    /// A context with no principal at all.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AuthContext for StaticAuth {
    fn current_user(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn bearer_token(&self) -> Result<String> {
        self.bearer_token.clone().ok_or_else(|| {
            StoreError::NotAuthenticated("no bearer credential configured".to_string())
        })
    }
}
