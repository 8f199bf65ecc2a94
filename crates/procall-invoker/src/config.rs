//! Invoker configuration
//!
//! Loaded from TOML; every field is optional:
//!
//! ```toml
//! statement = "{call add_person(?, ?)}"
//! timeout_secs = 30
//! parameter_prefix = "procedure.args"
//! time_zone = "utc"
//!
//! [parameters]
//! "procedure.args.out.2.type" = "4"
//! "procedure.args.out.2.name" = "ID"
//!
//! [pool]
//! max_size = 8
//! acquire_timeout_ms = 500
//! validation_query = "SELECT 1"
//! ```


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use procall_connection::PoolConfig;
use serde::{Deserialize, Serialize};

use crate::parameter::DEFAULT_PARAMETER_PREFIX;
use crate::time_format::TemporalZone;
use crate::{InvokeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Call statement; when unset each request must carry one
    pub statement: Option<String>,
    /// Execution timeout in seconds, 0 for none
    pub timeout_secs: u64,
    /// Prefix of parameter attribute keys
    pub parameter_prefix: String,
    /// Zone that epoch-millisecond date/time values are read in
    pub time_zone: TemporalZone,
    /// Static parameter attributes, overridden per field by request attributes
    pub parameters: HashMap<String, String>,
    pub pool: PoolConfig,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            statement: None,
            timeout_secs: 0,
            parameter_prefix: DEFAULT_PARAMETER_PREFIX.to_string(),
            time_zone: TemporalZone::default(),
            parameters: HashMap::new(),
            pool: PoolConfig::default(),
        }
    }
}

impl InvokerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| InvokeError::Configuration(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read invoker config from {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load invoker config {:?}", path))
    }

    /// Read the configuration file at the default location, if there is one
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// `<config dir>/procall/invoker.toml`
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join("procall").join("invoker.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.parameter_prefix.trim().is_empty() {
            return Err(InvokeError::Configuration(
                "parameter_prefix must not be blank".to_string(),
            ));
        }
        self.pool
            .validate()
            .map_err(|e| InvokeError::Configuration(e.to_string()))
    }

    /// The configured statement, ignoring blank text
    pub fn statement(&self) -> Option<&str> {
        self.statement
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Execution time limit; `None` when unbounded
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_time_zone(mut self, zone: TemporalZone) -> Self {
        self.time_zone = zone;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}
