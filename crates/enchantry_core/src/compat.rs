//! # Compatibility Engine
//!
//! Turns raw graph adjacency into answers the item layer can act on:
//! pair verdicts, set analysis and binder override budgets.
//!
//! ## Binder Budgets
//!
//! Three formulas coexist and are kept exactly as balanced:
//!
//! | Question                              | Budget                         |
//! |---------------------------------------|--------------------------------|
//! | can this one modifier be added?       | `level * overrides_per_level`  |
//! | can this whole set be applied?        | `level * overrides_per_level`  |
//! | smallest level this set needs         | `level * slots_per_level`      |
//! | budget a binder advertises on an item | `level * slots_per_level`      |
//!
//! With defaults that is `level * 3` for the first two and `level * 2` for
//! the others.
//!
//! ## Set Ordering
//!
//! Set-wise operations normalize, dedupe and sort their input first, so a
//! result never depends on the order the caller listed the ids in.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::BinderConfig;
use crate::error::EngineResult;
use crate::graph::{ConflictGraphStore, GraphView};
use crate::id::{normalize_all, ModifierId};

/// Verdict for a pair of modifiers or for a binder level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompatibilityResult {
    /// No conflict.
    Compatible,
    /// Normal conflict that a binder can override.
    Conflicting,
    /// Hard conflict that nothing overrides. Not produced by the built-in
    /// rules.
    Incompatible,
    /// Both ids normalize to the same modifier.
    Same,
    /// Blank input.
    Invalid,
    /// Binder present but its budget is too small to matter.
    BinderNone,
    /// Binder budget of at least 2.
    BinderWeak,
    /// Binder budget of at least 4.
    BinderMedium,
    /// Binder budget of at least 6.
    BinderStrong,
    /// No binder on the item.
    NoBinder,
}

impl CompatibilityResult {
    /// Stable lower-case status name.
    #[must_use]
    pub const fn status(self) -> &'static str {
        match self {
            Self::Compatible => "compatible",
            Self::Conflicting => "conflicting",
            Self::Incompatible => "incompatible",
            Self::Same => "same",
            Self::Invalid => "invalid",
            Self::BinderNone => "binder_none",
            Self::BinderWeak => "binder_weak",
            Self::BinderMedium => "binder_medium",
            Self::BinderStrong => "binder_strong",
            Self::NoBinder => "no_binder",
        }
    }

    /// Whether the modifiers can end up on the same item.
    #[inline]
    #[must_use]
    pub const fn can_combine(self) -> bool {
        matches!(
            self,
            Self::Compatible
                | Self::Same
                | Self::BinderWeak
                | Self::BinderMedium
                | Self::BinderStrong
        )
    }

    /// Whether a binder is involved in the decision.
    #[inline]
    #[must_use]
    pub const fn needs_override(self) -> bool {
        matches!(
            self,
            Self::Conflicting
                | Self::BinderNone
                | Self::BinderWeak
                | Self::BinderMedium
                | Self::BinderStrong
                | Self::NoBinder
        )
    }

    /// Combinable without any binder.
    #[inline]
    #[must_use]
    pub const fn is_compatible(self) -> bool {
        self.can_combine() && !self.needs_override()
    }
}

impl std::fmt::Display for CompatibilityResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.status())
    }
}

/// Aggregate analysis of a set of modifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompatibilityReport {
    /// Conflicting unordered pairs.
    pub conflict_count: usize,
    /// Single-seed conflict clusters, singletons dropped.
    pub conflict_groups: Vec<Vec<ModifierId>>,
    /// Each conflicting member mapped to the members it conflicts with.
    pub conflict_map: BTreeMap<ModifierId, BTreeSet<ModifierId>>,
    /// Overrides the set needs.
    pub required_override_slots: usize,
    /// Smallest binder level covering the set (capped at the maximum).
    pub minimum_binder_level: u32,
    /// No conflicts, or the minimum level covers them.
    pub is_compatible: bool,
}

/// Pair and set evaluation over a shared conflict graph.
#[derive(Debug, Clone)]
pub struct CompatibilityEngine {
    graph: Arc<ConflictGraphStore>,
    binder: BinderConfig,
}

impl CompatibilityEngine {
    /// Creates an engine over `graph`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `binder` fails validation.
    pub fn new(graph: Arc<ConflictGraphStore>, binder: BinderConfig) -> EngineResult<Self> {
        binder.validate()?;
        Ok(Self { graph, binder })
    }

    /// Read-only view of the underlying graph.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> GraphView<'_> {
        self.graph.view()
    }

    /// Binder parameters in use.
    #[inline]
    #[must_use]
    pub fn binder_config(&self) -> &BinderConfig {
        &self.binder
    }

    /// Normalizes, dedupes and sorts a raw set.
    #[must_use]
    pub fn canonical_set<I, S>(&self, ids: I) -> Vec<ModifierId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = normalize_all(ids, self.graph.namespace());
        ids.sort_unstable();
        ids
    }

    // =========================================================================
    // Pairs
    // =========================================================================

    /// Verdict for two raw ids.
    #[must_use]
    pub fn check_pair(&self, a: &str, b: &str) -> CompatibilityResult {
        match (self.graph.parse(a), self.graph.parse(b)) {
            (Some(a), Some(b)) => self.check_pair_ids(&a, &b),
            _ => CompatibilityResult::Invalid,
        }
    }

    /// Verdict for two normalized ids.
    #[must_use]
    pub fn check_pair_ids(&self, a: &ModifierId, b: &ModifierId) -> CompatibilityResult {
        if a == b {
            CompatibilityResult::Same
        } else if self.graph.conflicts_between(a, b) {
            CompatibilityResult::Conflicting
        } else {
            CompatibilityResult::Compatible
        }
    }

    /// `check_pair == Compatible`.
    #[must_use]
    pub fn can_apply_together(&self, a: &str, b: &str) -> bool {
        self.check_pair(a, b) == CompatibilityResult::Compatible
    }

    // =========================================================================
    // Binder budgets
    // =========================================================================

    /// Buckets the override budget of a binder level.
    ///
    /// Levels above the maximum are clamped; levels at or below zero mean
    /// there is no binder.
    #[must_use]
    pub fn check_override_budget(&self, binder_level: i32) -> CompatibilityResult {
        if binder_level <= 0 {
            return CompatibilityResult::NoBinder;
        }
        let level = self.binder.clamp_level(binder_level.unsigned_abs());
        let budget = u64::from(level) * u64::from(self.binder.overrides_per_level);

        match budget {
            6.. => CompatibilityResult::BinderStrong,
            4..=5 => CompatibilityResult::BinderMedium,
            2..=3 => CompatibilityResult::BinderWeak,
            _ => CompatibilityResult::BinderNone,
        }
    }

    /// Overrides a binder of `level` can absorb when checking one addition
    /// or a whole set. Not clamped.
    #[inline]
    fn override_budget(&self, binder_level: i32) -> i64 {
        i64::from(binder_level) * i64::from(self.binder.overrides_per_level)
    }

    /// Whether `candidate` may join `existing` under a binder of `level`.
    ///
    /// Counts the existing members `candidate` conflicts with. A blank
    /// candidate is rejected.
    #[must_use]
    pub fn can_combine_with_override<I, S>(
        &self,
        candidate: &str,
        binder_level: i32,
        existing: I,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(candidate) = self.graph.parse(candidate) else {
            return false;
        };
        let existing = self.canonical_set(existing);
        let conflicts = self.conflicts_with_member(&candidate, &existing);
        count_as_i64(conflicts) <= self.override_budget(binder_level)
    }

    /// Whether every conflict in the set fits a binder of `level`.
    #[must_use]
    pub fn can_apply_all_with_override<I, S>(&self, ids: I, binder_level: i32) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = self.canonical_set(ids);
        count_as_i64(self.count_in(&ids)) <= self.override_budget(binder_level)
    }

    /// Budget the binder modifier advertises at `level`.
    #[must_use]
    pub fn binder_allowed_conflicts(&self, level: u32) -> u32 {
        level.min(self.binder.max_level) * self.binder.slots_per_level
    }

    /// Whether adding `candidate` keeps the item within its binder budget.
    ///
    /// Existing conflicts and the ones `candidate` brings are summed. At
    /// level 0 only a conflict-free addition passes.
    #[must_use]
    pub fn can_add_with_binder<I, S>(&self, existing: I, candidate: &str, binder_level: u32) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(candidate) = self.graph.parse(candidate) else {
            return false;
        };
        let existing = self.canonical_set(existing);
        let current = self.count_in(&existing);
        let added = self.conflicts_with_member(&candidate, &existing);
        let allowed = self.binder_allowed_conflicts(binder_level) as usize;
        current + added <= allowed
    }

    // =========================================================================
    // Sets
    // =========================================================================

    /// Conflicting unordered pairs in the set.
    #[must_use]
    pub fn count_conflicts<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.count_in(&self.canonical_set(ids))
    }

    /// Overrides the set needs; equal to [`Self::count_conflicts`].
    #[must_use]
    pub fn required_override_slots<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.count_conflicts(ids)
    }

    /// Whether any pair in the set conflicts.
    #[must_use]
    pub fn has_conflicts<I, S>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = self.canonical_set(ids);
        let found = pairs(&ids).any(|(a, b)| self.graph.conflicts_between(a, b));
        found
    }

    /// Whether the set has no conflicts at all.
    #[must_use]
    pub fn can_combine_all<I, S>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        !self.has_conflicts(ids)
    }

    /// Single-seed conflict clusters of the set.
    #[must_use]
    pub fn conflict_groups<I, S>(&self, ids: I) -> Vec<Vec<ModifierId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.groups_in(&self.canonical_set(ids))
    }

    /// Each conflicting member mapped to what it conflicts with.
    #[must_use]
    pub fn conflict_map<I, S>(&self, ids: I) -> BTreeMap<ModifierId, BTreeSet<ModifierId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.map_in(&self.canonical_set(ids))
    }

    /// Every member involved in at least one conflict, in first-seen order.
    #[must_use]
    pub fn incompatible_members<I, S>(&self, ids: I) -> Vec<ModifierId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = normalize_all(ids, self.graph.namespace());
        ids.iter()
            .filter(|id| {
                ids.iter()
                    .any(|other| self.graph.conflicts_between(id, other))
            })
            .cloned()
            .collect()
    }

    /// Smallest binder level covering the set, 0 when conflict-free.
    #[must_use]
    pub fn minimum_binder_level<I, S>(&self, ids: I) -> u32
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.level_for(self.count_in(&self.canonical_set(ids)))
    }

    /// Full analysis of the set.
    #[must_use]
    pub fn generate_report<I, S>(&self, ids: I) -> CompatibilityReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.report_for(&self.canonical_set(ids))
    }

    /// Full analysis of an already canonical set.
    #[must_use]
    pub fn report_for(&self, ids: &[ModifierId]) -> CompatibilityReport {
        if ids.len() < 2 {
            return CompatibilityReport {
                is_compatible: true,
                ..CompatibilityReport::default()
            };
        }

        let conflict_count = self.count_in(ids);
        let required_override_slots = conflict_count;
        let minimum_binder_level = self.level_for(required_override_slots);
        let covered = u64::from(minimum_binder_level) * u64::from(self.binder.slots_per_level);

        CompatibilityReport {
            conflict_count,
            conflict_groups: self.groups_in(ids),
            conflict_map: self.map_in(ids),
            required_override_slots,
            minimum_binder_level,
            is_compatible: conflict_count == 0 || required_override_slots as u64 <= covered,
        }
    }

    fn count_in(&self, ids: &[ModifierId]) -> usize {
        pairs(ids)
            .filter(|(a, b)| self.graph.conflicts_between(a, b))
            .count()
    }

    fn conflicts_with_member(&self, candidate: &ModifierId, ids: &[ModifierId]) -> usize {
        ids.iter()
            .filter(|other| self.graph.conflicts_between(candidate, other))
            .count()
    }

    fn groups_in(&self, ids: &[ModifierId]) -> Vec<Vec<ModifierId>> {
        let mut assigned = vec![false; ids.len()];
        let mut groups = Vec::new();

        for (i, seed) in ids.iter().enumerate() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let mut group = vec![seed.clone()];

            // Neighbors of the seed only; no transitive closure.
            for (j, other) in ids.iter().enumerate().skip(i + 1) {
                if !assigned[j] && self.graph.conflicts_between(seed, other) {
                    assigned[j] = true;
                    group.push(other.clone());
                }
            }

            if group.len() > 1 {
                groups.push(group);
            }
        }

        groups
    }

    fn map_in(&self, ids: &[ModifierId]) -> BTreeMap<ModifierId, BTreeSet<ModifierId>> {
        let mut map: BTreeMap<ModifierId, BTreeSet<ModifierId>> = BTreeMap::new();
        for (a, b) in pairs(ids) {
            if self.graph.conflicts_between(a, b) {
                map.entry(a.clone()).or_default().insert(b.clone());
                map.entry(b.clone()).or_default().insert(a.clone());
            }
        }
        map
    }

    fn level_for(&self, required: usize) -> u32 {
        if required == 0 {
            return 0;
        }
        (self.binder.min_level..=self.binder.max_level)
            .find(|level| (level * self.binder.slots_per_level) as usize >= required)
            .unwrap_or(self.binder.max_level)
    }
}

/// Unordered pairs `(ids[i], ids[j])` with `i < j`.
fn pairs(ids: &[ModifierId]) -> impl Iterator<Item = (&ModifierId, &ModifierId)> {
    ids.iter()
        .enumerate()
        .flat_map(move |(i, a)| ids[i + 1..].iter().map(move |b| (a, b)))
}

#[inline]
fn count_as_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
