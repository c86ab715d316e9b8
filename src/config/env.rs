use std::env;

use anyhow::anyhow;

use crate::error::{AgentBusError, Result};

/// Environment-backed configuration lookups.
pub struct EnvConfig;

impl EnvConfig {
    /// Resolves an API key value.
    ///
    /// Priority:
    /// 1. a `${VAR_NAME}` value is read from that environment variable
    /// 2. an empty value falls back to `default_env_var`
    /// 3. anything else is taken literally
    pub fn get_api_key(api_key: &str, default_env_var: &str) -> Result<String> {
        if let Some(var) = Self::env_reference(api_key) {
            Self::get_env(var)
        } else if api_key.is_empty() {
            Self::get_env(default_env_var)
        } else {
            Ok(api_key.to_string())
        }
    }

    /// `${VAR_NAME}` indirection, or literal passthrough for anything else.
    pub fn resolve(value: &str) -> Result<String> {
        match Self::env_reference(value) {
            Some(var) => Self::get_env(var),
            None => Ok(value.to_string()),
        }
    }

    fn env_reference(value: &str) -> Option<&str> {
        value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}'))
    }

    pub fn get_env(key: &str) -> Result<String> {
        env::var(key)
            .map_err(|_| AgentBusError::Other(anyhow!("environment variable `{key}` is not set")))
    }

    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok()
    }

    pub fn is_debug_mode() -> bool {
        env::var("AGENTBUS_DEBUG").is_ok()
    }
}
