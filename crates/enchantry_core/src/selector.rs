//! # Weighted Selector
//!
//! Weight registry and slot-limited sampling for enchanting rolls.
//!
//! ## Weights
//!
//! Every modifier has an integer weight in `[min, max]` (default
//! `[1, 100]`). Out-of-range inputs are clamped, never rejected; unset ids
//! read as the default weight. Higher weight means commoner:
//!
//! | Weight   | Tier      | Factor |
//! |----------|-----------|--------|
//! | >= 80    | legendary | 0.01   |
//! | >= 60    | epic      | 0.05   |
//! | >= 40    | rare      | 0.15   |
//! | >= 20    | uncommon  | 0.35   |
//! | >= 10    | common    | 0.60   |
//! | below    | cursed    | 0.85   |
//!
//! ## Slot Rolls
//!
//! [`WeightedSelector::select_for_slots`] is a single pass over a shuffled
//! candidate list. Each candidate is accepted with probability
//! `weight / remaining`, and only an accepted candidate leaves the pool.
//! Rejected candidates keep their weight in `remaining`, so acceptance odds
//! rise as the scan goes on. Rolls on live servers depend on this exact
//! distribution.

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::config::WeightConfig;
use crate::error::EngineResult;
use crate::graph::ConflictGraphStore;
use crate::id::{normalize_all, ModifierId};

/// Rarity tier derived from weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RarityTier {
    /// Weight 80 and above.
    Legendary,
    /// Weight 60 to 79.
    Epic,
    /// Weight 40 to 59.
    Rare,
    /// Weight 20 to 39.
    Uncommon,
    /// Weight 10 to 19.
    Common,
    /// Weight below 10.
    Cursed,
}

impl RarityTier {
    /// Tier for a weight.
    #[must_use]
    pub const fn from_weight(weight: u32) -> Self {
        match weight {
            80.. => Self::Legendary,
            60..=79 => Self::Epic,
            40..=59 => Self::Rare,
            20..=39 => Self::Uncommon,
            10..=19 => Self::Common,
            _ => Self::Cursed,
        }
    }

    /// Lower-case tier name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Legendary => "legendary",
            Self::Epic => "epic",
            Self::Rare => "rare",
            Self::Uncommon => "uncommon",
            Self::Common => "common",
            Self::Cursed => "cursed",
        }
    }

    /// Probability hint paired with the tier.
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::Legendary => 0.01,
            Self::Epic => 0.05,
            Self::Rare => 0.15,
            Self::Uncommon => 0.35,
            Self::Common => 0.60,
            Self::Cursed => 0.85,
        }
    }
}

impl std::fmt::Display for RarityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight table plus weighted sampling.
#[derive(Debug)]
pub struct WeightedSelector {
    weights: DashMap<ModifierId, u32>,
    categories: DashMap<String, Vec<ModifierId>>,
    config: WeightConfig,
    graph: Arc<ConflictGraphStore>,
}

impl WeightedSelector {
    /// Creates an empty selector reading category labels from `graph`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation.
    pub fn new(graph: Arc<ConflictGraphStore>, config: WeightConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            weights: DashMap::new(),
            categories: DashMap::new(),
            config,
            graph,
        })
    }

    /// Weight bounds in use.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    // =========================================================================
    // Weights
    // =========================================================================

    /// Stores a clamped weight. Blank ids are ignored.
    pub fn set_weight(&self, id: &str, weight: i64) {
        let Some(id) = self.graph.parse(id) else {
            return;
        };
        let clamped = self.config.clamp(weight);
        if i64::from(clamped) != weight {
            debug!(modifier = %id, requested = weight, stored = clamped, "weight clamped");
        }
        self.weights.insert(id, clamped);
    }

    /// Weight of a raw id; the default weight for unset or blank ids.
    #[must_use]
    pub fn weight(&self, id: &str) -> u32 {
        self.graph
            .parse(id)
            .map_or(self.config.default, |id| self.weight_of(&id))
    }

    /// Weight of a normalized id.
    #[inline]
    #[must_use]
    pub fn weight_of(&self, id: &ModifierId) -> u32 {
        self.weights.get(id).map_or(self.config.default, |w| *w)
    }

    /// Sum of weights over the distinct ids.
    #[must_use]
    pub fn total_weight<I, S>(&self, ids: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        normalize_all(ids, self.graph.namespace())
            .iter()
            .map(|id| u64::from(self.weight_of(id)))
            .sum()
    }

    /// Tier derived from the id's weight.
    #[must_use]
    pub fn rarity_tier(&self, id: &str) -> RarityTier {
        RarityTier::from_weight(self.weight(id))
    }

    /// Probability hint paired with the id's tier.
    #[must_use]
    pub fn rarity_factor(&self, id: &str) -> f64 {
        self.rarity_tier(id).factor()
    }

    /// Sorted snapshot of every explicitly set weight.
    #[must_use]
    pub fn all_weights(&self) -> BTreeMap<ModifierId, u32> {
        self.weights
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    /// Forgets every weight and category.
    pub fn reset(&self) {
        self.weights.clear();
        self.categories.clear();
    }

    // =========================================================================
    // Sampling
    // =========================================================================

    /// Picks at most `slot_count` distinct candidates using the thread RNG.
    #[must_use]
    pub fn select_for_slots<I, S>(&self, candidates: I, slot_count: usize) -> Vec<ModifierId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select_for_slots_with(&mut rand::thread_rng(), candidates, slot_count)
    }

    /// [`Self::select_for_slots`] with a caller-supplied RNG.
    pub fn select_for_slots_with<R, I, S>(
        &self,
        rng: &mut R,
        candidates: I,
        slot_count: usize,
    ) -> Vec<ModifierId>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pool = normalize_all(candidates, self.graph.namespace());
        if pool.is_empty() || slot_count == 0 {
            return Vec::new();
        }

        pool.shuffle(rng);
        let weighted: Vec<(ModifierId, u64)> = pool
            .into_iter()
            .map(|id| {
                let w = u64::from(self.weight_of(&id));
                (id, w)
            })
            .collect();
        let mut remaining: u64 = weighted.iter().map(|(_, w)| w).sum();

        let mut selected = Vec::with_capacity(slot_count.min(weighted.len()));
        for (id, weight) in weighted {
            if selected.len() >= slot_count {
                break;
            }
            if remaining == 0 {
                break;
            }
            let probability = weight as f64 / remaining as f64;
            if rng.gen::<f64>() < probability {
                remaining = remaining.saturating_sub(weight);
                selected.push(id);
            }
        }

        selected
    }

    /// Weighted single pick using the thread RNG. `None` for no candidates.
    #[must_use]
    pub fn select_one<I, S>(&self, candidates: I) -> Option<ModifierId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select_one_with(&mut rand::thread_rng(), candidates)
    }

    /// [`Self::select_one`] with a caller-supplied RNG.
    pub fn select_one_with<R, I, S>(&self, rng: &mut R, candidates: I) -> Option<ModifierId>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pool = normalize_all(candidates, self.graph.namespace());
        if pool.is_empty() {
            return None;
        }

        let total: u64 = pool.iter().map(|id| u64::from(self.weight_of(id))).sum();
        if total == 0 {
            return pool.choose(rng).cloned();
        }

        let roll = rng.gen_range(0..total);
        let mut cumulative = 0u64;
        for id in &pool {
            cumulative += u64::from(self.weight_of(id));
            if roll < cumulative {
                return Some(id.clone());
            }
        }

        pool.last().cloned()
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Adds members to a weight category. Blank names or ids are ignored.
    pub fn register_category<I, S>(&self, name: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let ids = normalize_all(ids, self.graph.namespace());
        let mut members = self.categories.entry(name.to_string()).or_default();
        for id in ids {
            if !members.contains(&id) {
                members.push(id);
            }
        }
    }

    /// Names of the registered weight categories.
    #[must_use]
    pub fn weight_categories(&self) -> BTreeSet<String> {
        self.categories.iter().map(|e| e.key().clone()).collect()
    }

    /// Whether `name` is a weight category or a conflict-graph category.
    #[must_use]
    pub fn is_valid_category(&self, name: &str) -> bool {
        self.categories.contains_key(name) || self.graph.categories().contains(name)
    }

    /// Weight-category members in registration order, then conflict-graph
    /// members of the same label (sorted) not already listed.
    #[must_use]
    pub fn modifiers_in_category(&self, category: &str) -> Vec<ModifierId> {
        let mut members = self
            .categories
            .get(category)
            .map(|m| m.clone())
            .unwrap_or_default();
        for id in self.graph.modifiers_in_category(category) {
            if !members.contains(&id) {
                members.push(id);
            }
        }
        members
    }

    /// Category members ordered by weight, heaviest first. Ties keep the
    /// listing order.
    #[must_use]
    pub fn sorted_by_weight_descending(&self, category: &str) -> Vec<ModifierId> {
        let mut members = self.modifiers_in_category(category);
        members.sort_by_key(|id| std::cmp::Reverse(self.weight_of(id)));
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn selector() -> WeightedSelector {
        WeightedSelector::new(
            Arc::new(ConflictGraphStore::new("enadd")),
            WeightConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_inverted_weight_bounds() {
        let config = WeightConfig {
            default: 10,
            min: 50,
            max: 5,
        };
        let err = WeightedSelector::new(Arc::new(ConflictGraphStore::new("enadd")), config)
            .unwrap_err();
        assert!(matches!(err, crate::error::EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_weight_clamping_and_default() {
        let s = selector();
        s.set_weight("sharpness", 500);
        s.set_weight("curse_of_binding", -5);
        s.set_weight("   ", 50);
        assert_eq!(s.weight("sharpness"), 100);
        assert_eq!(s.weight("CURSE_OF_BINDING"), 1);
        assert_eq!(s.weight("never_set"), 10);
        assert_eq!(s.weight(""), 10);
        assert_eq!(s.all_weights().len(), 2);
    }

    #[test]
    fn test_rarity_tiers() {
        let s = selector();
        let cases = [
            (80, RarityTier::Legendary),
            (60, RarityTier::Epic),
            (59, RarityTier::Rare),
            (20, RarityTier::Uncommon),
            (10, RarityTier::Common),
            (9, RarityTier::Cursed),
        ];
        for (weight, tier) in cases {
            s.set_weight("sample", weight);
            assert_eq!(s.rarity_tier("sample"), tier, "weight {weight}");
        }
        s.set_weight("sample", 95);
        assert!((s.rarity_factor("sample") - 0.01).abs() < f64::EPSILON);
        assert_eq!(s.rarity_tier("unset").as_str(), "common");
    }

    #[test]
    fn test_total_weight() {
        let s = selector();
        s.set_weight("a", 30);
        s.set_weight("b", 5);
        assert_eq!(s.total_weight(["a", "b", "c", "A"]), 45);
        assert_eq!(s.total_weight(Vec::<&str>::new()), 0);
    }

    #[test]
    fn test_slot_cap() {
        let s = selector();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pool = ["a", "b", "c", "d", "e", "f"];
        for slots in 0..8 {
            for _ in 0..200 {
                let picked = s.select_for_slots_with(&mut rng, pool, slots);
                assert!(picked.len() <= slots);
                let distinct: BTreeSet<_> = picked.iter().collect();
                assert_eq!(distinct.len(), picked.len());
            }
        }
        assert!(s.select_for_slots(pool, 0).is_empty());
        assert!(s.select_for_slots(Vec::<&str>::new(), 3).is_empty());
    }

    #[test]
    fn test_slot_distribution_favors_heavy() {
        let s = selector();
        s.set_weight("heavy", 90);
        s.set_weight("light", 10);
        let heavy = ModifierId::new("heavy").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let trials = 20_000u32;
        let mut heavy_hits = 0u32;
        for _ in 0..trials {
            let picked = s.select_for_slots_with(&mut rng, ["heavy", "light"], 1);
            if picked.first() == Some(&heavy) {
                heavy_hits += 1;
            }
        }

        let ratio = f64::from(heavy_hits) / f64::from(trials);
        println!("heavy selected in {:.1}% of rolls", ratio * 100.0);
        assert!(ratio > 0.70, "heavy ratio {ratio}");
    }

    #[test]
    fn test_rejected_candidates_stay_in_pool() {
        // Two equal weights, one slot: the first visit accepts at 1/2, the
        // second at 1/2 again since the rejected weight was not removed.
        // Roughly 3/4 of rolls fill the slot.
        let s = selector();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let trials = 20_000u32;
        let mut filled = 0u32;
        for _ in 0..trials {
            if !s.select_for_slots_with(&mut rng, ["x", "y"], 1).is_empty() {
                filled += 1;
            }
        }
        let ratio = f64::from(filled) / f64::from(trials);
        assert!((ratio - 0.75).abs() < 0.03, "fill ratio {ratio}");
    }

    #[test]
    fn test_select_one_distribution() {
        let s = selector();
        s.set_weight("heavy", 90);
        s.set_weight("light", 10);
        let heavy = ModifierId::new("heavy").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let trials = 10_000u32;
        let heavy_hits = (0..trials)
            .filter(|_| s.select_one_with(&mut rng, ["heavy", "light"]) == Some(heavy.clone()))
            .count();
        let ratio = heavy_hits as f64 / f64::from(trials);
        assert!((ratio - 0.9).abs() < 0.03, "ratio {ratio}");
        assert!(s.select_one(Vec::<&str>::new()).is_none());
    }

    #[test]
    fn test_categories_union_with_graph() {
        let graph = Arc::new(ConflictGraphStore::new("enadd"));
        graph.register_group("weapon", ["smite", "bane"]);
        let s = WeightedSelector::new(graph, WeightConfig::default()).unwrap();
        s.register_category("weapon", ["sharpness", "smite"]);
        s.set_weight("bane", 40);
        s.set_weight("sharpness", 20);

        let names: Vec<_> = s
            .modifiers_in_category("weapon")
            .iter()
            .map(|id| id.name().to_string())
            .collect();
        assert_eq!(names, vec!["sharpness", "smite", "bane"]);

        let sorted: Vec<_> = s
            .sorted_by_weight_descending("weapon")
            .iter()
            .map(|id| id.name().to_string())
            .collect();
        assert_eq!(sorted, vec!["bane", "sharpness", "smite"]);

        assert!(s.is_valid_category("weapon"));
        assert!(!s.is_valid_category("armor"));
        assert_eq!(s.weight_categories().len(), 1);
    }

    #[test]
    fn test_reset() {
        let s = selector();
        s.set_weight("a", 50);
        s.register_category("tool", ["a"]);
        s.reset();
        assert_eq!(s.weight("a"), 10);
        assert!(s.weight_categories().is_empty());
    }
}
