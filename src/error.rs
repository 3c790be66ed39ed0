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

// Error taxonomy shared by all storage backends

use thiserror::Error;

/// Errors surfaced by the persistence layer.
///
/// Construction and configuration problems are synchronous; I/O problems are
/// asynchronous rejections. Errors inside a live subscription are logged at the
/// adapter boundary and never reach callers (the subscription goes silent).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No resolvable principal where one is required. Operations fail closed
    /// rather than proceeding anonymously.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// `update` against a missing document. `get_one` returns `None` instead
    /// of raising this.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation with no safe emulation on the active backend.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: String,
    },

    /// Network or backend unavailability. Never retried by this layer.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Logical path that cannot address a collection or document.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Payload that is not a field-name to value mapping.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Bad or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn unsupported(backend: &'static str, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            backend,
            operation: operation.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
