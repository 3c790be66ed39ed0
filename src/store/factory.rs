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

// Adapter factory: one configuration value selects one backend

use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use super::adapter::StoreAdapter;
use super::flat::FlatAdapter;
use super::realtime::RealtimeAdapter;
use super::rest::RestAdapter;
use super::structured::StructuredAdapter;
use crate::auth::AuthContext;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

static SHARED: OnceLock<Arc<dyn StoreAdapter>> = OnceLock::new();

pub struct AdapterFactory;

impl AdapterFactory {
    /// Construct a fresh adapter from configuration. Prefer this over
    /// [`AdapterFactory::shared`] wherever an explicit handle can be threaded
    /// through start-up; tests in particular should never touch the
    /// process-wide cache.
    pub fn create(
        config: &StoreConfig,
        auth: Arc<dyn AuthContext>,
    ) -> Result<Arc<dyn StoreAdapter>> {
        // A headless context (server render pass, CI) has no client-local
        // storage; backends that assume one are replaced with the in-memory
        // flat store.
        if config.headless && config.backend == "structured" {
            warn!("headless context: replacing structured backend with in-memory flat store");
            return Ok(Arc::new(FlatAdapter::in_memory(auth)));
        }

        match config.backend.as_str() {
            "realtime" => {
                let backend_config = config
                    .backend_config
                    .as_realtime()
                    .ok_or_else(|| StoreError::Config("realtime config missing".to_string()))?;

                Ok(Arc::new(RealtimeAdapter::new(backend_config.clone(), auth)))
            }

            "rest" => {
                let backend_config = config
                    .backend_config
                    .as_rest()
                    .ok_or_else(|| StoreError::Config("rest config missing".to_string()))?;

                let adapter = RestAdapter::new(backend_config.clone(), auth)?;
                Ok(Arc::new(adapter))
            }

            "structured" => {
                let backend_config = config
                    .backend_config
                    .as_structured()
                    .ok_or_else(|| StoreError::Config("structured config missing".to_string()))?;

                Ok(Arc::new(StructuredAdapter::new(
                    backend_config.clone(),
                    auth,
                )))
            }

            "flat" => {
                let backend_config = config
                    .backend_config
                    .as_flat()
                    .ok_or_else(|| StoreError::Config("flat config missing".to_string()))?;

                Ok(Arc::new(FlatAdapter::new(backend_config.clone(), auth)))
            }

            unknown => Err(StoreError::Config(format!(
                "unknown backend: '{unknown}'. Supported: realtime, rest, structured, flat"
            ))),
        }
    }

    /// The process-wide adapter: constructed once from the first
    /// configuration seen, then returned unchanged for the process lifetime.
    /// A configuration value that changes later is out of contract — there is
    /// no hot-swap.
    pub fn shared(
        config: &StoreConfig,
        auth: Arc<dyn AuthContext>,
    ) -> Result<Arc<dyn StoreAdapter>> {
        if let Some(adapter) = SHARED.get() {
            return Ok(adapter.clone());
        }

        info!("initializing shared store adapter: {}", config.backend);
        let adapter = Self::create(config, auth)?;
        Ok(SHARED.get_or_init(|| adapter).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuth;
    use crate::config::{BackendConfig, FlatConfig, RealtimeConfig, RestConfig, StructuredConfig};

    fn auth() -> Arc<dyn AuthContext> {
        Arc::new(StaticAuth::for_user("tester"))
    }

    fn config_for(backend: &str, backend_config: BackendConfig) -> StoreConfig {
        StoreConfig {
            backend: backend.to_string(),
            headless: false,
            backend_config,
        }
    }

    #[test]
    fn test_create_realtime_backend() {
        let config = config_for(
            "realtime",
            BackendConfig::Realtime {
                realtime: RealtimeConfig::default(),
            },
        );
        let adapter = AdapterFactory::create(&config, auth()).unwrap();
        assert_eq!(adapter.backend_type(), "realtime");
    }

    #[test]
    fn test_create_rest_backend() {
        let config = config_for(
            "rest",
            BackendConfig::Rest {
                rest: RestConfig::default(),
            },
        );
        let adapter = AdapterFactory::create(&config, auth()).unwrap();
        assert_eq!(adapter.backend_type(), "rest");
    }

    #[test]
    fn test_create_structured_backend() {
        let config = config_for(
            "structured",
            BackendConfig::Structured {
                structured: StructuredConfig::default(),
            },
        );
        let adapter = AdapterFactory::create(&config, auth()).unwrap();
        assert_eq!(adapter.backend_type(), "structured");
    }

    #[test]
    fn test_create_unknown_backend() {
        let config = config_for(
            "mystery",
            BackendConfig::Flat {
                flat: FlatConfig::default(),
            },
        );
        let result = AdapterFactory::create(&config, auth());
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("unknown backend"));
        }
    }

    #[test]
    fn test_backend_section_mismatch() {
        let config = config_for(
            "rest",
            BackendConfig::Flat {
                flat: FlatConfig::default(),
            },
        );
        let result = AdapterFactory::create(&config, auth());
        assert!(result.is_err());
    }

    #[test]
    fn test_headless_redirects_structured() {
        let mut config = config_for(
            "structured",
            BackendConfig::Structured {
                structured: StructuredConfig::default(),
            },
        );
        config.headless = true;
        let adapter = AdapterFactory::create(&config, auth()).unwrap();
        assert_eq!(adapter.backend_type(), "flat");
    }

    #[test]
    fn test_shared_returns_same_instance() {
        let config = config_for(
            "flat",
            BackendConfig::Flat {
                flat: FlatConfig::default(),
            },
        );
        let first = AdapterFactory::shared(&config, auth()).unwrap();

        // Even with a different configuration the cached instance wins.
        let other = config_for(
            "realtime",
            BackendConfig::Realtime {
                realtime: RealtimeConfig::default(),
            },
        );
        let second = AdapterFactory::shared(&other, auth()).unwrap();
        assert_eq!(first.backend_type(), second.backend_type());
        assert!(Arc::ptr_eq(&first, &second));
    }
}
