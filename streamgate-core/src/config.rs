//! Processor configuration.
//!
//! # Sources
//!
//! - environment variables (the deployed function's configuration), via
//!   [`ProcessorConfig::from_env`] / [`ProcessorConfig::from_env_map`]
//! - a YAML file for local runs, via [`ProcessorConfig::load_yaml_at`]
//!
//! Both paths end in [`ProcessorConfig::validate`]. The resulting value is
//! passed by reference to every collaborator; nothing is stored globally.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::WatchList;

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_TABLE_NAME: &str = "DYNAMODB_TABLE_NAME";
pub const ENV_STATE_MACHINES: &str = "DYNAMODB_STREAM_STEP_FUNCTIONS";
pub const ENV_MODELS: &str = "MODELS";
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";
pub const ENV_DISPATCH_FUNCTION: &str = "DISPATCH_FUNCTION_NAME";
pub const ENV_LOOKUP_FUNCTION: &str = "LOOKUP_FUNCTION_NAME";
pub const ENV_MAX_CONCURRENCY: &str = "ROUTER_MAX_CONCURRENCY";
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "LOOKUP_TIMEOUT_MS";
pub const ENV_LAMBDA_ENDPOINT: &str = "LAMBDA_ENDPOINT";
pub const ENV_STEP_FUNCTIONS_ENDPOINT: &str = "STEP_FUNCTIONS_ENDPOINT";

/// Upper bound on concurrently routed records per batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 3_000;

/// Optional endpoint overrides for local emulators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Endpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_functions: Option<String>,
}

/// Everything one stream-batch invocation needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    pub region: String,
    pub table_name: String,
    /// Workflows started with the packaged batch.
    pub state_machine_arns: Vec<String>,
    /// Watched entity type names.
    pub models: Vec<String>,
    /// This deployment's own service identifier, compared against event `source`.
    pub service_name: String,
    /// Function receiving every fire-and-forget dispatch.
    pub dispatch_function: String,
    /// Function answering identity-mapping reads; defaults to `dispatch_function`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_function: Option<String>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_lookup_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

impl ProcessorConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_map(&vars)
    }

    /// Load from an explicit variable map.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = Self {
            region: required(vars, ENV_REGION)?,
            table_name: required(vars, ENV_TABLE_NAME)?,
            state_machine_arns: split_list(&required(vars, ENV_STATE_MACHINES)?),
            models: split_list(&required(vars, ENV_MODELS)?),
            service_name: required(vars, ENV_SERVICE_NAME)?,
            dispatch_function: required(vars, ENV_DISPATCH_FUNCTION)?,
            lookup_function: optional(vars, ENV_LOOKUP_FUNCTION),
            max_concurrency: parse_or(vars, ENV_MAX_CONCURRENCY, DEFAULT_MAX_CONCURRENCY)?,
            lookup_timeout_ms: parse_or(vars, ENV_LOOKUP_TIMEOUT_MS, DEFAULT_LOOKUP_TIMEOUT_MS)?,
            endpoints: Endpoints {
                lambda: optional(vars, ENV_LAMBDA_ENDPOINT),
                step_functions: optional(vars, ENV_STEP_FUNCTIONS_ENDPOINT),
            },
        };
        config.validated()
    }

    /// Load a YAML config file.
    ///
    /// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with
    /// path + line context) if malformed.
    pub fn load_yaml_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validated()
    }

    /// Normalize and check every field.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.service_name = self.service_name.trim().replace(' ', "-");
        self.models = self
            .models
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        self.state_machine_arns = self
            .state_machine_arns
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        self.validate()?;
        Ok(self)
    }

    /// Check invariants without normalizing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_blank(&self.region, ENV_REGION)?;
        non_blank(&self.table_name, ENV_TABLE_NAME)?;
        non_blank(&self.service_name, ENV_SERVICE_NAME)?;
        non_blank(&self.dispatch_function, ENV_DISPATCH_FUNCTION)?;
        if self.state_machine_arns.is_empty() {
            return Err(ConfigError::Missing {
                name: ENV_STATE_MACHINES,
            });
        }
        if self.models.is_empty() {
            return Err(ConfigError::Missing { name: ENV_MODELS });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_MAX_CONCURRENCY,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_LOOKUP_TIMEOUT_MS,
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Watched entity types (the generic event type excluded).
    pub fn watch_list(&self) -> WatchList {
        WatchList::from_models(&self.models)
    }

    pub fn lookup_function(&self) -> &str {
        self.lookup_function
            .as_deref()
            .unwrap_or(&self.dispatch_function)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn required(vars: &HashMap<String, String>, name: &'static str) -> Result<String, ConfigError> {
    optional(vars, name).ok_or(ConfigError::Missing { name })
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(vars: &HashMap<String, String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(vars, name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: format!("'{raw}': {err}"),
        }),
    }
}

fn non_blank(value: &str, name: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing { name })
    } else {
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [
            (ENV_REGION, "eu-west-2"),
            (ENV_TABLE_NAME, "orders"),
            (ENV_STATE_MACHINES, "arn:sm:one, arn:sm:two"),
            (ENV_MODELS, "Order, Customer,Event"),
            (ENV_SERVICE_NAME, "order service"),
            (ENV_DISPATCH_FUNCTION, "orders-api"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn env_map_loads_and_normalizes() {
        let config = ProcessorConfig::from_env_map(&base_vars()).expect("config");
        assert_eq!(config.state_machine_arns, vec!["arn:sm:one", "arn:sm:two"]);
        assert_eq!(config.models, vec!["Order", "Customer", "Event"]);
        assert_eq!(config.service_name, "order-service");
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.lookup_function(), "orders-api");
        assert_eq!(config.lookup_timeout(), Duration::from_millis(3_000));

        let watched = config.watch_list();
        assert!(watched.contains("Order"));
        assert!(!watched.contains("Event"));
    }

    #[test]
    fn missing_models_is_fatal() {
        let mut vars = base_vars();
        vars.remove(ENV_MODELS);
        let err = ProcessorConfig::from_env_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: ENV_MODELS }), "got: {err}");
    }

    #[test]
    fn blank_service_name_is_fatal() {
        let mut vars = base_vars();
        vars.insert(ENV_SERVICE_NAME.to_string(), "   ".to_string());
        let err = ProcessorConfig::from_env_map(&vars).unwrap_err();
        assert!(err.to_string().contains(ENV_SERVICE_NAME));
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let mut vars = base_vars();
        vars.insert(ENV_MAX_CONCURRENCY.to_string(), "0".to_string());
        let err = ProcessorConfig::from_env_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "got: {err}");
    }

    #[test]
    fn unparsable_timeout_names_the_variable() {
        let mut vars = base_vars();
        vars.insert(ENV_LOOKUP_TIMEOUT_MS.to_string(), "soon".to_string());
        let err = ProcessorConfig::from_env_map(&vars).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ENV_LOOKUP_TIMEOUT_MS), "got: {msg}");
        assert!(msg.contains("soon"), "got: {msg}");
    }

    #[test]
    fn models_that_are_only_commas_count_as_missing() {
        let mut vars = base_vars();
        vars.insert(ENV_MODELS.to_string(), " , ,".to_string());
        let err = ProcessorConfig::from_env_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: ENV_MODELS }), "got: {err}");
    }
}
