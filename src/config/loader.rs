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

// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        // Substitute environment variables
        let content = Self::substitute_env_vars(&content);

        // Parse YAML
        let config: AppConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        // Validate configuration
        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${FINSTORE_USER:-local-user} -> local-user (if FINSTORE_USER not set)
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        // Keep original if no default and var not found
                        format!("${{{}}}", var_name)
                    }
                }
            }
        })
        .to_string()
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        match config.store.backend.as_str() {
            "realtime" => {
                if config.store.backend_config.as_realtime().is_none() {
                    bail!("realtime backend selected but realtime config missing");
                }
            }
            "rest" => {
                let Some(rest) = config.store.backend_config.as_rest() else {
                    bail!("rest backend selected but rest config missing");
                };
                if rest.base_url.is_empty() {
                    bail!("rest.base_url cannot be empty");
                }
                if rest.poll_interval_seconds == 0 {
                    bail!("rest.poll_interval_seconds must be > 0");
                }
                if rest.timeout_seconds == 0 {
                    bail!("rest.timeout_seconds must be > 0");
                }
            }
            "structured" => {
                let Some(structured) = config.store.backend_config.as_structured() else {
                    bail!("structured backend selected but structured config missing");
                };
                if structured.base_path.is_empty() {
                    bail!("structured.base_path cannot be empty");
                }
            }
            "flat" => {
                if config.store.backend_config.as_flat().is_none() {
                    bail!("flat backend selected but flat config missing");
                }
            }
            unknown => bail!(
                "Unknown backend: '{}'. Supported: realtime, rest, structured, flat",
                unknown
            ),
        }

        if let BackendConfig::Realtime { realtime } = &config.store.backend_config {
            if realtime.channel_capacity == 0 {
                bail!("realtime.channel_capacity must be > 0");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // Set test environment variable
        std::env::set_var("FINSTORE_TEST_VAR", "test_value");

        let input = "base_url: ${FINSTORE_TEST_VAR}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "base_url: test_value");

        std::env::remove_var("FINSTORE_TEST_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("FINSTORE_TEST_VAR2");

        let input = "user_id: ${FINSTORE_TEST_VAR2:-local-user}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "user_id: local-user");
    }

    #[test]
    fn test_validation_unknown_backend() {
        let mut config = AppConfig::default();
        config.store.backend = "mystery".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown backend"));
    }

    #[test]
    fn test_validation_backend_section_mismatch() {
        let mut config = AppConfig::default();
        config.store.backend = "rest".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("rest config missing"));
    }

    #[test]
    fn test_validation_empty_base_url() {
        let mut config = AppConfig::default();
        config.store.backend = "rest".to_string();
        config.store.backend_config = BackendConfig::Rest {
            rest: RestConfig {
                base_url: String::new(),
                ..RestConfig::default()
            },
        };

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("base_url"));
    }

    #[test]
    fn test_parse_yaml_round_trip() {
        let yaml = r#"
store:
  backend: structured
  structured:
    base_path: /tmp/finstore-test
auth:
  user_id: alice
logging:
  level: debug
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.store.backend, "structured");
        assert_eq!(
            config
                .store
                .backend_config
                .as_structured()
                .unwrap()
                .base_path,
            "/tmp/finstore-test"
        );
        assert_eq!(config.auth.user_id.as_deref(), Some("alice"));
        assert!(ConfigLoader::validate(&config).is_ok());
    }
}
