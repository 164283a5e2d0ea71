//! # Property-Based Tests
//!
//! Invariants of the conflict graph, selector and compatibility engine
//! over randomly generated catalogs.

use enchantry_core::{
    BinderConfig, CompatibilityEngine, ConflictGraphStore, EnchantEngine, EngineConfig,
    WeightConfig, WeightedSelector,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::sync::Arc;

/// Small id alphabet so random groups overlap.
fn id_strategy() -> impl Strategy<Value = String> {
    (0u8..24).prop_map(|n| format!("mod_{n}"))
}

fn groups_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    vec(vec(id_strategy(), 0..6), 0..8)
}

fn build_graph(groups: &[Vec<String>]) -> Arc<ConflictGraphStore> {
    let graph = Arc::new(ConflictGraphStore::new("enadd"));
    for (i, group) in groups.iter().enumerate() {
        graph.register_group(&format!("cat_{}", i % 3), group);
    }
    graph
}

// =============================================================================
// GRAPH
// =============================================================================

proptest! {
    /// Conflicts answer the same in both directions.
    #[test]
    fn conflicts_are_symmetric(groups in groups_strategy(), a in id_strategy(), b in id_strategy()) {
        let graph = build_graph(&groups);
        prop_assert_eq!(graph.are_conflicting(&a, &b), graph.are_conflicting(&b, &a));
    }

    /// Nothing conflicts with itself, even when listed twice in a group.
    #[test]
    fn conflicts_are_irreflexive(groups in groups_strategy(), a in id_strategy()) {
        let graph = build_graph(&groups);
        graph.register_group("dup", [a.as_str(), a.as_str()]);
        prop_assert!(!graph.are_conflicting(&a, &a));
        prop_assert!(!graph.conflicts_of(&a).iter().any(|c| c.name() == a));
    }

    /// Case and surrounding whitespace never change an answer.
    #[test]
    fn normalization_is_transparent(groups in groups_strategy(), a in id_strategy(), b in id_strategy()) {
        let graph = build_graph(&groups);
        let noisy_a = format!("  {}  ", a.to_uppercase());
        let qualified_b = format!("enadd:{b}");
        prop_assert_eq!(graph.are_conflicting(&noisy_a, &qualified_b), graph.are_conflicting(&a, &b));
    }

    /// Ids outside every group conflict with nothing.
    #[test]
    fn unregistered_ids_never_conflict(groups in groups_strategy(), n in 0u8..24) {
        let graph = build_graph(&groups);
        let ghost = format!("ghost_{n}");
        prop_assert!(!graph.are_conflicting(&ghost, "ghost_other"));
        prop_assert!(!graph.are_conflicting(&ghost, "mod_0"));
    }

    /// Registering the same groups twice leaves the graph unchanged.
    #[test]
    fn registration_is_idempotent(groups in groups_strategy()) {
        let graph = build_graph(&groups);
        let before = graph.conflict_rules();
        for (i, group) in groups.iter().enumerate() {
            graph.register_group(&format!("cat_{}", i % 3), group);
        }
        prop_assert_eq!(graph.conflict_rules(), before);
    }
}

// =============================================================================
// SELECTOR
// =============================================================================

proptest! {
    /// Stored weights always land inside the bounds.
    #[test]
    fn weights_are_clamped(weight in any::<i64>()) {
        let selector = WeightedSelector::new(
            Arc::new(ConflictGraphStore::new("enadd")),
            WeightConfig::default(),
        )
        .unwrap();
        selector.set_weight("sample", weight);
        let stored = selector.weight("sample");
        prop_assert!((1..=100).contains(&stored));
        if (1..=100).contains(&weight) {
            prop_assert_eq!(i64::from(stored), weight);
        }
    }

    /// A roll never fills more slots than asked.
    #[test]
    fn selection_respects_slot_cap(ids in vec(id_strategy(), 0..20), slots in 0usize..8) {
        let engine = EnchantEngine::new(EngineConfig::default()).unwrap();
        let picked = engine.select_for_slots(&ids, slots);
        prop_assert!(picked.len() <= slots);
        if slots == 0 {
            prop_assert!(picked.is_empty());
        }
    }
}

// =============================================================================
// COMPATIBILITY
// =============================================================================

proptest! {
    /// A higher binder level never turns an accepted set down.
    #[test]
    fn binder_levels_are_monotonic(groups in groups_strategy(), set in vec(id_strategy(), 0..10), level in 0i32..4) {
        let engine = CompatibilityEngine::new(build_graph(&groups), BinderConfig::default()).unwrap();
        if engine.can_apply_all_with_override(&set, level) {
            for higher in level..6 {
                prop_assert!(engine.can_apply_all_with_override(&set, higher));
            }
        }
    }

    /// Report fields agree with the standalone operations.
    #[test]
    fn report_is_consistent(groups in groups_strategy(), set in vec(id_strategy(), 0..10)) {
        let engine = CompatibilityEngine::new(build_graph(&groups), BinderConfig::default()).unwrap();
        let report = engine.generate_report(&set);
        prop_assert_eq!(report.conflict_count, engine.count_conflicts(&set));
        prop_assert_eq!(report.required_override_slots, report.conflict_count);
        let expected = report.conflict_count == 0
            || report.required_override_slots <= report.minimum_binder_level as usize * 2;
        prop_assert_eq!(report.is_compatible, expected);
        for group in &report.conflict_groups {
            prop_assert!(group.len() >= 2);
        }
    }

    /// Cached answers match uncached ones.
    #[test]
    fn cache_is_transparent(groups in groups_strategy(), pairs in vec((id_strategy(), id_strategy()), 1..30)) {
        let engine = EnchantEngine::new(EngineConfig::default()).unwrap();
        for (i, group) in groups.iter().enumerate() {
            engine.register_conflict_group(&format!("cat_{}", i % 3), group);
        }
        for _ in 0..2 {
            for (a, b) in &pairs {
                prop_assert_eq!(engine.check_pair_cached(a, b), engine.check_pair(a, b));
                let set = [a.as_str(), b.as_str()];
                prop_assert_eq!(&*engine.report_cached(set), &engine.generate_report(set));
            }
        }
    }
}
