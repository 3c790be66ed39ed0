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

// Configuration types for finstore

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration with backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Backend type: "realtime", "rest", "structured", "flat"
    pub backend: String,

    /// Execution context without client-local storage (e.g. a server render
    /// pass). Backends that assume a local data directory are replaced with
    /// the in-memory flat store.
    #[serde(default)]
    pub headless: bool,

    /// Backend-specific configuration
    #[serde(flatten)]
    pub backend_config: BackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "flat".to_string(),
            headless: false,
            backend_config: BackendConfig::Flat {
                flat: FlatConfig::default(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BackendConfig {
    Realtime {
        #[serde(rename = "realtime")]
        realtime: RealtimeConfig,
    },
    Rest {
        #[serde(rename = "rest")]
        rest: RestConfig,
    },
    Structured {
        #[serde(rename = "structured")]
        structured: StructuredConfig,
    },
    Flat {
        #[serde(rename = "flat")]
        flat: FlatConfig,
    },
}

impl BackendConfig {
    pub fn as_realtime(&self) -> Option<&RealtimeConfig> {
        match self {
            BackendConfig::Realtime { realtime } => Some(realtime),
            _ => None,
        }
    }

    pub fn as_rest(&self) -> Option<&RestConfig> {
        match self {
            BackendConfig::Rest { rest } => Some(rest),
            _ => None,
        }
    }

    pub fn as_rest_mut(&mut self) -> Option<&mut RestConfig> {
        match self {
            BackendConfig::Rest { rest } => Some(rest),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&StructuredConfig> {
        match self {
            BackendConfig::Structured { structured } => Some(structured),
            _ => None,
        }
    }

    pub fn as_flat(&self) -> Option<&FlatConfig> {
        match self {
            BackendConfig::Flat { flat } => Some(flat),
            _ => None,
        }
    }
}

/// Realtime in-process document store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RealtimeConfig {
    /// Capacity of each collection's change-notification channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// REST backend reachable only via request/response HTTP
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestConfig {
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Interval between subscription re-fetches
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_seconds: default_timeout(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl RestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Local structured store on the filesystem
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructuredConfig {
    pub base_path: String,
}

impl Default for StructuredConfig {
    fn default() -> Self {
        Self {
            base_path: "data/finstore".to_string(),
        }
    }
}

/// In-memory flat key-value string store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlatConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for FlatConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
        }
    }
}

/// Static principal used to resolve owner-scoped paths and REST credentials
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_channel_capacity() -> usize {
    64
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    5
}
fn default_key_prefix() -> String {
    "finstore-local-".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
