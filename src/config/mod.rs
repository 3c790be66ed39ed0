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

// Configuration module for finstore
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;

mod loader;

pub use loader::ConfigLoader;
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let mut config = load_config(path)?;

    // Allow environment variables to override config values
    if let Ok(user_id) = std::env::var("FINSTORE_USER_ID") {
        config.auth.user_id = Some(user_id);
    }

    if let Ok(token) = std::env::var("FINSTORE_BEARER_TOKEN") {
        config.auth.bearer_token = Some(token);
    }

    if let Ok(base_url) = std::env::var("FINSTORE_REST_URL") {
        if let Some(rest_config) = config.store.backend_config.as_rest_mut() {
            rest_config.base_url = base_url;
        }
    }

    Ok(config)
}
