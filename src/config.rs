//! Runtime configuration
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. TOML file (explicit path, or `ASYNCJMP_CONFIG_PATH`)
//! 3. Environment variables (`ASYNCJMP_STACK_BUFFER_SIZE`, `ASYNCJMP_ON_FATAL`)
//! 4. Values set on the [`ConfigBuilder`]

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::stack_buffer::DEFAULT_STACK_BUFFER_SIZE;

/// Smallest accepted stack buffer size in bytes
pub const MIN_STACK_BUFFER_SIZE: usize = 256;

const ENV_PREFIX: &str = "ASYNCJMP";
const CONFIG_PATH_ENV: &str = "ASYNCJMP_CONFIG_PATH";

/// What to do when the calling runtime breaks the jump contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatalPolicy {
    /// Abort the process
    Abort,
    /// Panic with the violation as message
    Panic,
}

impl FatalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatalPolicy::Abort => "abort",
            FatalPolicy::Panic => "panic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Capacity of every capture and longjmp storage, in bytes
    pub stack_buffer_size: usize,

    pub on_fatal: FatalPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_buffer_size: DEFAULT_STACK_BUFFER_SIZE,
            on_fatal: FatalPolicy::Abort,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.stack_buffer_size < MIN_STACK_BUFFER_SIZE {
            bail!(
                "stack_buffer_size must be at least {} bytes, got {}",
                MIN_STACK_BUFFER_SIZE,
                self.stack_buffer_size
            );
        }
        Ok(())
    }
}

/// Builder for [`Config`]
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    stack_buffer_size: Option<usize>,
    on_fatal: Option<FatalPolicy>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Config file to read (overrides `ASYNCJMP_CONFIG_PATH`)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn stack_buffer_size(mut self, size: usize) -> Self {
        self.stack_buffer_size = Some(size);
        self
    }

    pub fn on_fatal(mut self, policy: FatalPolicy) -> Self {
        self.on_fatal = Some(policy);
        self
    }

    /// Ignore `ASYNCJMP_*` environment variables
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("stack_buffer_size", defaults.stack_buffer_size as i64)?
            .set_default("on_fatal", defaults.on_fatal.as_str())?;

        let path = match self.config_path {
            Some(path) => Some(path),
            None if !self.skip_env => std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            None => None,
        };
        if let Some(path) = &path {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        if !self.skip_env {
            builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        }

        builder = builder
            .set_override_option("stack_buffer_size", self.stack_buffer_size.map(|s| s as i64))?
            .set_override_option("on_fatal", self.on_fatal.map(|p| p.as_str()))?;

        let config: Config = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }
}
