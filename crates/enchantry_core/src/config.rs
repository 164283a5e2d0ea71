//! # Engine Configuration
//!
//! Plain configuration object consumed by every component. Loaded once at
//! startup, either from code or from a TOML document:
//!
//! ```toml
//! namespace = "enadd"
//! shutdown_timeout_ms = 5000
//!
//! [weights]
//! default = 10
//! min = 1
//! max = 100
//!
//! [binder]
//! min_level = 1
//! max_level = 3
//! overrides_per_level = 3
//! slots_per_level = 2
//!
//! [cache]
//! cleanup_interval_ms = 600000
//! adaptive_cleanup = true
//! hot = { capacity = 250, ttl_ms = 300000 }
//! cold = { capacity = 1000, ttl_ms = 1800000 }
//! ```
//!
//! Every constructor validates. A bad value is a setup mistake and is
//! rejected immediately with [`EngineError::InvalidConfig`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::id::DEFAULT_NAMESPACE;

/// Weight table bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Weight used for modifiers that were never given one.
    pub default: u32,
    /// Lowest stored weight; smaller inputs are clamped up.
    pub min: u32,
    /// Highest stored weight; larger inputs are clamped down.
    pub max: u32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            default: 10,
            min: 1,
            max: 100,
        }
    }
}

impl WeightConfig {
    /// Clamps a raw weight into `[min, max]`.
    #[inline]
    #[must_use]
    pub fn clamp(&self, weight: i64) -> u32 {
        let clamped = weight.max(i64::from(self.min)).min(i64::from(self.max));
        u32::try_from(clamped).unwrap_or(self.max)
    }

    /// Checks the bounds and the default weight.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> EngineResult<()> {
        if self.min == 0 {
            return Err(invalid("weights.min must be at least 1".to_string()));
        }
        if self.min > self.max {
            return Err(invalid(format!(
                "weights.min ({}) exceeds weights.max ({})",
                self.min, self.max
            )));
        }
        if self.default < self.min || self.default > self.max {
            return Err(invalid(format!(
                "weights.default ({}) outside [{}, {}]",
                self.default, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Binder (override budget) parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Lowest binder level once a binder is present.
    pub min_level: u32,
    /// Highest binder level; larger levels are clamped.
    pub max_level: u32,
    /// Conflicts forgiven per level when checking a single addition or a
    /// whole set.
    pub overrides_per_level: u32,
    /// Conflicts per level used when deriving the minimum level a set needs
    /// and the budget the binder advertises on an item.
    pub slots_per_level: u32,
}

impl BinderConfig {
    /// Clamps a positive binder level into `[min_level, max_level]`.
    #[inline]
    #[must_use]
    pub fn clamp_level(&self, level: u32) -> u32 {
        level.max(self.min_level).min(self.max_level)
    }

    /// Checks the level range and the per-level budgets.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> EngineResult<()> {
        if self.min_level == 0 {
            return Err(invalid("binder.min_level must be at least 1".to_string()));
        }
        if self.min_level > self.max_level {
            return Err(invalid(format!(
                "binder.min_level ({}) exceeds binder.max_level ({})",
                self.min_level, self.max_level
            )));
        }
        if self.overrides_per_level == 0 {
            return Err(invalid("binder.overrides_per_level must be positive".to_string()));
        }
        if self.slots_per_level == 0 {
            return Err(invalid("binder.slots_per_level must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            min_level: 1,
            max_level: 3,
            overrides_per_level: 3,
            slots_per_level: 2,
        }
    }
}

/// Capacity and lifetime of one cache tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Maximum number of entries.
    pub capacity: usize,
    /// Entry lifetime in milliseconds.
    pub ttl_ms: u64,
}

impl TierConfig {
    /// Entry lifetime as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Two-tier cache parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Small, short-lived tier checked first.
    pub hot: TierConfig,
    /// Larger, longer-lived tier that feeds the hot tier.
    pub cold: TierConfig,
    /// Base interval of the background sweep in milliseconds.
    pub cleanup_interval_ms: u64,
    /// Stretch or shrink the sweep interval based on the hit rate.
    pub adaptive_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot: TierConfig {
                capacity: 250,
                ttl_ms: 5 * 60 * 1000,
            },
            cold: TierConfig {
                capacity: 1000,
                ttl_ms: 30 * 60 * 1000,
            },
            cleanup_interval_ms: 10 * 60 * 1000,
            adaptive_cleanup: true,
        }
    }
}

impl CacheConfig {
    /// Base sweep interval as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace given to ids that arrive without one.
    pub namespace: String,
    /// Weight bounds.
    pub weights: WeightConfig,
    /// Binder budgets.
    pub binder: BinderConfig,
    /// Cache tiers and sweep.
    pub cache: CacheConfig,
    /// How long shutdown waits for the sweep thread, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            weights: WeightConfig::default(),
            binder: BinderConfig::default(),
            cache: CacheConfig::default(),
            shutdown_timeout_ms: 5000,
        }
    }
}

impl EngineConfig {
    /// Preset for busy servers: bigger tiers, more frequent sweeps.
    #[must_use]
    pub fn high_traffic() -> Self {
        Self {
            cache: CacheConfig {
                hot: TierConfig {
                    capacity: 1000,
                    ttl_ms: 5 * 60 * 1000,
                },
                cold: TierConfig {
                    capacity: 4000,
                    ttl_ms: 30 * 60 * 1000,
                },
                cleanup_interval_ms: 3 * 60 * 1000,
                adaptive_cleanup: true,
            },
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `ConfigParse` for malformed TOML, `InvalidConfig` for bad values.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `ConfigIo` when the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| EngineError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Shutdown join timeout as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> EngineResult<()> {
        let ns = self.namespace.trim();
        if ns.is_empty() || ns.contains(':') {
            return Err(invalid(format!(
                "namespace must be non-empty and contain no ':', got {:?}",
                self.namespace
            )));
        }

        self.weights.validate()?;
        self.binder.validate()?;

        for (name, tier) in [("hot", &self.cache.hot), ("cold", &self.cache.cold)] {
            if tier.capacity == 0 {
                return Err(invalid(format!("cache.{name}.capacity must be positive")));
            }
            if tier.ttl_ms == 0 {
                return Err(invalid(format!("cache.{name}.ttl_ms must be positive")));
            }
        }
        if self.cache.cleanup_interval_ms == 0 {
            return Err(invalid("cache.cleanup_interval_ms must be positive".to_string()));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(invalid("shutdown_timeout_ms must be positive".to_string()));
        }

        Ok(())
    }
}

fn invalid(msg: String) -> EngineError {
    EngineError::InvalidConfig(msg)
}
