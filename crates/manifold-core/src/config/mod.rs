//! Layered configuration loading.
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: hardcoded in the struct `Default`
//!    implementations and `#[serde(default)]` functions
//! 2. **Config file**: optional TOML file
//! 3. **Environment variables**: `MANIFOLD_*` overrides, nested fields
//!    separated by `__` (e.g. `MANIFOLD_ROUTER__MIN_SAMPLES=5`)
//!
//! Everything is validated at load time; an invalid value (inverted
//! expiration windows, zero capacities, out-of-range rates) is an error
//! here, never at request time.

use crate::{
    cache::{CacheConfig, ExpirationPolicy, PolicyError, Tolerance},
    router::{RouterConfig, RouterConfigError},
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Router(#[from] RouterConfigError),

    #[error("cache.max_entries must be greater than zero")]
    ZeroCacheCapacity,
}

/// Cache sizing and expiration settings, in file-friendly units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Bound on stored entries. Defaults to `1000`.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Seconds a cached value is served without recomputation; unset means
    /// forever. Defaults to `60`.
    #[serde(default = "default_fresh_seconds")]
    pub fresh_seconds: Option<u64>,

    /// Seconds a cached value may still be served when recomputation
    /// fails; unset means forever. Defaults to `600`.
    #[serde(default = "default_stale_if_failed_seconds")]
    pub stale_if_failed_seconds: Option<u64>,
}

fn default_max_entries() -> usize {
    1000
}
fn default_fresh_seconds() -> Option<u64> {
    Some(60)
}
fn default_stale_if_failed_seconds() -> Option<u64> {
    Some(600)
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            fresh_seconds: default_fresh_seconds(),
            stale_if_failed_seconds: default_stale_if_failed_seconds(),
        }
    }
}

impl CacheSettings {
    /// Builds the validated runtime cache configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on a zero capacity or inverted expiration
    /// windows.
    pub fn cache_config(&self) -> Result<CacheConfig, ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        let fresh = tolerance(self.fresh_seconds);
        let stale = tolerance(self.stale_if_failed_seconds);
        let policy = ExpirationPolicy::new(fresh, stale)?;
        Ok(CacheConfig { policy, max_entries: self.max_entries })
    }
}

fn tolerance(seconds: Option<u64>) -> Tolerance {
    seconds.map_or(Tolerance::Always, |secs| Tolerance::Within(Duration::from_secs(secs)))
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifoldConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub router: RouterConfig,
}

impl ManifoldConfig {
    /// Loads configuration from an optional file plus `MANIFOLD_*`
    /// environment overrides, validating everything eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("MANIFOLD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on the first invalid section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.cache_config()?;
        self.router.validate()?;
        Ok(())
    }
}
