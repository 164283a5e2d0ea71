//! # Engine Context
//!
//! [`EnchantEngine`] owns one conflict graph, one weight table, the answer
//! caches and the maintenance thread. Build it once at startup and share it
//! by reference or `Arc`; every method takes `&self`.
//!
//! ```rust,ignore
//! use enchantry_core::{EnchantEngine, EngineConfig};
//!
//! let engine = EnchantEngine::with_default_catalog(EngineConfig::default())?;
//! engine.start_maintenance()?;
//!
//! if engine.can_combine_with_override("execution", 1, ["critical_strike"]) {
//!     let offer = engine.select_for_slots(["sharpness", "bleeding", "dodge"], 2);
//! }
//!
//! engine.shutdown();
//! ```
//!
//! ## Lifecycle
//!
//! Rules and weights are loaded once, before queries start. Graph
//! mutations through the engine drop every cached answer; weights feed no
//! cached answer. `shutdown` is idempotent and leaves an empty,
//! uninitialized engine that answers every query fail-open.

use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheStats, TwoTierCache};
use crate::catalog;
use crate::compat::{CompatibilityEngine, CompatibilityReport, CompatibilityResult};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::{
    ConflictGraphStore, GraphBuilder, GraphStats, GraphView, ModifierKind, RegistrationOutcome,
};
use crate::id::ModifierId;
use crate::maintenance::{CleanupSchedule, CleanupTask, Sweep};
use crate::selector::{RarityTier, WeightedSelector};

type PairCache = TwoTierCache<(ModifierId, ModifierId), CompatibilityResult>;
type ReportCache = TwoTierCache<Vec<ModifierId>, Arc<CompatibilityReport>>;

/// The decision engine.
pub struct EnchantEngine {
    config: EngineConfig,
    graph: Arc<ConflictGraphStore>,
    compat: CompatibilityEngine,
    selector: WeightedSelector,
    pair_cache: Arc<PairCache>,
    report_cache: Arc<ReportCache>,
    maintenance: CleanupTask,
}

impl fmt::Debug for EnchantEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnchantEngine")
            .field("namespace", &self.config.namespace)
            .field("initialized", &self.graph.is_initialized())
            .field("graph", &self.graph.stats())
            .field("maintenance", &self.maintenance)
            .finish_non_exhaustive()
    }
}

impl EnchantEngine {
    /// Creates an empty engine.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let graph = Arc::new(ConflictGraphStore::new(&config.namespace));
        let compat = CompatibilityEngine::new(Arc::clone(&graph), config.binder.clone())?;
        let selector = WeightedSelector::new(Arc::clone(&graph), config.weights.clone())?;
        let pair_cache = Arc::new(PairCache::new(&config.cache)?);
        let report_cache = Arc::new(ReportCache::new(&config.cache)?);

        let maintenance = CleanupTask::new(
            CleanupSchedule {
                interval: config.cache.cleanup_interval(),
                adaptive: config.cache.adaptive_cleanup,
                shutdown_timeout: config.shutdown_timeout(),
            },
            vec![
                Arc::clone(&pair_cache) as Arc<dyn Sweep>,
                Arc::clone(&report_cache) as Arc<dyn Sweep>,
            ],
        );

        Ok(Self {
            config,
            graph,
            compat,
            selector,
            pair_cache,
            report_cache,
            maintenance,
        })
    }

    /// Creates an engine loaded with the built-in catalog.
    ///
    /// # Errors
    ///
    /// As [`Self::new`] and [`Self::initialize`].
    pub fn with_default_catalog(config: EngineConfig) -> EngineResult<Self> {
        let engine = Self::new(config)?;
        engine.initialize(catalog::load_default)?;
        Ok(engine)
    }

    /// Runs a bulk load of rules and weights.
    ///
    /// Conflict rules are published only if the loader succeeds. On failure
    /// the graph is left empty and any weights the loader set are dropped.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` or `RegistrationFailed`.
    pub fn initialize<F, E>(&self, loader: F) -> EngineResult<GraphStats>
    where
        F: FnOnce(&mut GraphBuilder, &WeightedSelector) -> Result<(), E>,
        E: fmt::Display,
    {
        let result = self.graph.initialize(|builder| loader(builder, &self.selector));
        if matches!(result, Err(EngineError::RegistrationFailed { .. })) {
            self.selector.reset();
        }
        self.clear_caches();
        result
    }

    /// Whether a bulk load has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.graph.is_initialized()
    }

    /// Configuration in use.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the conflict graph. Mutations go through
    /// [`Self::register_conflict_group`] and [`Self::register_kind`] so the
    /// caches stay in step.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> GraphView<'_> {
        self.graph.view()
    }

    /// Pair and set evaluation.
    #[inline]
    #[must_use]
    pub fn compat(&self) -> &CompatibilityEngine {
        &self.compat
    }

    /// Weights and sampling.
    #[inline]
    #[must_use]
    pub fn selector(&self) -> &WeightedSelector {
        &self.selector
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a conflict group, warning about ids that keep an earlier
    /// category.
    pub fn register_conflict_group<I, S>(&self, category: &str, ids: I) -> RegistrationOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcome = self.graph.register_group(category, ids);
        catalog::warn_kept_categories(category.trim(), &outcome);
        if outcome.registered > 0 {
            self.clear_caches();
        }
        outcome
    }

    /// Registers the kind of a modifier.
    pub fn register_kind(&self, id: &str, kind: ModifierKind) {
        self.graph.register_kind(id, kind);
        self.clear_caches();
    }

    /// Stores a clamped weight.
    pub fn set_weight(&self, id: &str, weight: i64) {
        self.selector.set_weight(id, weight);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether two modifiers conflict.
    #[must_use]
    pub fn are_conflicting(&self, a: &str, b: &str) -> bool {
        self.graph.are_conflicting(a, b)
    }

    /// Everything `id` conflicts with, sorted.
    #[must_use]
    pub fn conflicts_of(&self, id: &str) -> Vec<ModifierId> {
        self.graph.conflicts_of(id).into_iter().collect()
    }

    /// Uncached pair verdict.
    #[must_use]
    pub fn check_pair(&self, a: &str, b: &str) -> CompatibilityResult {
        self.compat.check_pair(a, b)
    }

    /// Pair verdict through the pair cache. The key is order-independent.
    #[must_use]
    pub fn check_pair_cached(&self, a: &str, b: &str) -> CompatibilityResult {
        let (Some(a), Some(b)) = (self.graph.parse(a), self.graph.parse(b)) else {
            return CompatibilityResult::Invalid;
        };
        if a == b {
            return CompatibilityResult::Same;
        }

        let key = if a < b { (a, b) } else { (b, a) };
        let generation = self.pair_cache.generation();
        if let Some(hit) = self.pair_cache.get(&key) {
            return hit;
        }
        let result = self.compat.check_pair_ids(&key.0, &key.1);
        self.pair_cache.put_if_current(key, result, generation);
        result
    }

    /// Whether `candidate` may join `existing` under a binder of `level`.
    #[must_use]
    pub fn can_combine_with_override<I, S>(&self, candidate: &str, binder_level: i32, existing: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.compat.can_combine_with_override(candidate, binder_level, existing)
    }

    /// Uncached set analysis.
    #[must_use]
    pub fn generate_report<I, S>(&self, ids: I) -> CompatibilityReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.compat.generate_report(ids)
    }

    /// Set analysis through the report cache.
    #[must_use]
    pub fn report_cached<I, S>(&self, ids: I) -> Arc<CompatibilityReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = self.compat.canonical_set(ids);
        let generation = self.report_cache.generation();
        if let Some(hit) = self.report_cache.get(&key) {
            return hit;
        }
        let report = Arc::new(self.compat.report_for(&key));
        self.report_cache.put_if_current(key, Arc::clone(&report), generation);
        report
    }

    /// Weighted slot roll.
    #[must_use]
    pub fn select_for_slots<I, S>(&self, candidates: I, slot_count: usize) -> Vec<ModifierId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selector.select_for_slots(candidates, slot_count)
    }

    /// Rarity tier of a modifier.
    #[must_use]
    pub fn rarity_tier(&self, id: &str) -> RarityTier {
        self.selector.rarity_tier(id)
    }

    // =========================================================================
    // Caches and maintenance
    // =========================================================================

    /// Combined counters of both caches.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.pair_cache.stats().merge(self.report_cache.stats())
    }

    /// Drops every cached answer.
    pub fn clear_caches(&self) {
        self.pair_cache.clear();
        self.report_cache.clear();
    }

    /// Sweeps expired cache entries on the calling thread.
    pub fn run_maintenance(&self) -> usize {
        self.maintenance.run_once()
    }

    /// Starts the background sweep. Returns `false` if already running.
    ///
    /// # Errors
    ///
    /// `MaintenanceSpawn` if the thread cannot be created.
    pub fn start_maintenance(&self) -> EngineResult<bool> {
        self.maintenance.start()
    }

    /// Whether the background sweep is running.
    #[must_use]
    pub fn is_maintenance_running(&self) -> bool {
        self.maintenance.is_running()
    }

    /// Stops the sweep (bounded wait), clears rules, weights and caches.
    /// Safe to call any number of times, before or after initialization.
    pub fn shutdown(&self) {
        self.maintenance.stop();
        self.graph.shutdown();
        self.selector.reset();
        self.clear_caches();
    }
}
