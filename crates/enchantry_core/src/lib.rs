//! # Enchantry Core
//!
//! Decision engine for item modifiers ("enchantments"): which ones may
//! share an item, how many conflicts a binder forgives, and which ones an
//! enchanting roll offers.
//!
//! ## Design Principles
//!
//! 1. **Fail-open queries** - a blank or unknown id never errors, it answers
//!    with a safe default
//! 2. **Fail-fast setup** - bad configuration is rejected at construction
//! 3. **All-or-nothing loading** - a failed catalog load leaves an empty graph
//! 4. **Lock-free reads** - graph, weights and caches are concurrent maps
//!
//! ## Components
//!
//! | Module        | Role                                              |
//! |---------------|---------------------------------------------------|
//! | [`graph`]     | symmetric conflict relation, categories, kinds    |
//! | [`compat`]    | pair verdicts, set analysis, binder budgets       |
//! | [`selector`]  | weights, slot rolls, rarity tiers                 |
//! | [`cache`]     | hot/cold answer cache                             |
//! | [`maintenance`] | background cache sweep                          |
//! | [`engine`]    | the context object tying them together            |
//!
//! ## Example
//!
//! ```rust,ignore
//! use enchantry_core::{EnchantEngine, EngineConfig};
//!
//! let config = EngineConfig::from_toml_file("config/enchantry.toml")?;
//! let engine = EnchantEngine::with_default_catalog(config)?;
//!
//! let report = engine.report_cached(["critical_strike", "execution", "bleeding"]);
//! if !report.is_compatible {
//!     // needs a binder of report.minimum_binder_level
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod catalog;
pub mod compat;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod id;
pub mod maintenance;
pub mod selector;

pub use cache::{CacheStats, CacheTier, TwoTierCache};
pub use compat::{CompatibilityEngine, CompatibilityReport, CompatibilityResult};
pub use config::{BinderConfig, CacheConfig, EngineConfig, TierConfig, WeightConfig};
pub use engine::EnchantEngine;
pub use error::{EngineError, EngineResult};
pub use graph::{
    ConflictGraphStore, GraphBuilder, GraphStats, GraphView, ModifierKind, RegistrationOutcome,
};
pub use id::{ModifierId, DEFAULT_NAMESPACE};
pub use maintenance::{CleanupSchedule, CleanupTask, Sweep};
pub use selector::{RarityTier, WeightedSelector};
