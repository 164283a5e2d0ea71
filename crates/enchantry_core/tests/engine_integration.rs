//! Integration tests for the engine boundary.

use enchantry_core::{
    CacheConfig, CompatibilityResult, EnchantEngine, EngineConfig, EngineError, ModifierId,
    RarityTier, TierConfig, TwoTierCache,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn combat_engine() -> EnchantEngine {
    let engine = EnchantEngine::new(EngineConfig::default()).unwrap();
    engine
        .initialize(|builder, selector| {
            builder.register_group("combat", ["critical_strike", "precision_strike", "execution"]);
            selector.set_weight("critical_strike", 5);
            Ok::<(), EngineError>(())
        })
        .unwrap();
    engine
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_group_registration_scenario() {
    let engine = combat_engine();
    assert!(engine.are_conflicting("critical_strike", "precision_strike"));
    assert!(engine.are_conflicting("critical_strike", "execution"));
    assert_eq!(engine.conflicts_of("critical_strike").len(), 2);
}

#[test]
fn test_normalization_scenario() {
    let engine = combat_engine();
    assert!(engine.are_conflicting("CRITICAL_STRIKE", "precision_strike"));
    assert!(engine.are_conflicting("  critical_strike", "Precision_Strike  "));
}

#[test]
fn test_count_and_binder_level_scenario() {
    let engine = combat_engine();
    let trio = ["critical_strike", "precision_strike", "execution"];
    assert_eq!(engine.compat().count_conflicts(trio), 3);
    assert_eq!(engine.compat().minimum_binder_level(trio), 2);
}

#[test]
fn test_override_scenario() {
    let engine = combat_engine();
    assert!(engine.can_combine_with_override(
        "execution",
        1,
        ["critical_strike", "precision_strike"]
    ));
}

#[test]
fn test_cache_tier_scenario() {
    let config = CacheConfig {
        hot: TierConfig {
            capacity: 8,
            ttl_ms: 50,
        },
        cold: TierConfig {
            capacity: 32,
            ttl_ms: 5_000,
        },
        ..CacheConfig::default()
    };
    let cache = TwoTierCache::new(&config).unwrap();

    cache.put("k", CompatibilityResult::Conflicting);
    assert_eq!(cache.get(&"k"), Some(CompatibilityResult::Conflicting));
    assert_eq!(cache.stats().hot_hits, 1);

    thread::sleep(Duration::from_millis(100));

    assert_eq!(cache.get(&"k"), Some(CompatibilityResult::Conflicting));
    assert_eq!(cache.stats().cold_hits, 1);
    assert_eq!(cache.get(&"k"), Some(CompatibilityResult::Conflicting));
    assert_eq!(cache.stats().hot_hits, 2);
}

// =============================================================================
// BOUNDARY
// =============================================================================

#[test]
fn test_invalid_inputs_never_fail() {
    let engine = combat_engine();
    assert!(!engine.are_conflicting("", ""));
    assert!(engine.conflicts_of("  ").is_empty());
    assert_eq!(engine.check_pair_cached("", "x"), CompatibilityResult::Invalid);
    assert_eq!(
        engine.check_pair_cached("minecraft:", "execution"),
        CompatibilityResult::Invalid
    );
    assert!(!engine.are_conflicting(":", "execution"));
    assert!(!engine.can_combine_with_override("", 3, Vec::<&str>::new()));
    assert!(engine.select_for_slots(Vec::<&str>::new(), 4).is_empty());
    assert_eq!(engine.rarity_tier(""), RarityTier::Common);
    assert!(engine.generate_report(["", " "]).is_compatible);
}

#[test]
fn test_rarity_from_catalog() {
    let engine = EnchantEngine::with_default_catalog(EngineConfig::default()).unwrap();
    assert_eq!(engine.rarity_tier("meteor_strike"), RarityTier::Cursed);
    assert_eq!(engine.rarity_tier("minecraft:sharpness"), RarityTier::Common);
    engine.set_weight("meteor_strike", 85);
    assert_eq!(engine.rarity_tier("meteor_strike"), RarityTier::Legendary);
}

#[test]
fn test_slot_roll_from_catalog() {
    let engine = EnchantEngine::with_default_catalog(EngineConfig::default()).unwrap();
    let pool = engine.selector().modifiers_in_category("weapon");
    let raw: Vec<&str> = pool.iter().map(ModifierId::as_str).collect();
    for slots in 0..5 {
        let offer = engine.select_for_slots(&raw, slots);
        assert!(offer.len() <= slots);
        assert!(offer.iter().all(|id| pool.contains(id)));
    }
}

#[test]
fn test_engine_from_toml() {
    let config = EngineConfig::from_toml_str(
        r#"
        namespace = "arcane"

        [binder]
        overrides_per_level = 1

        [cache]
        hot = { capacity = 4, ttl_ms = 1000 }
        cold = { capacity = 16, ttl_ms = 1000 }
        "#,
    )
    .unwrap();
    let engine = EnchantEngine::new(config).unwrap();
    engine.register_conflict_group("combat", ["a", "b", "c"]);

    assert!(engine.are_conflicting("arcane:a", "b"));
    assert!(!engine.are_conflicting("enadd:a", "b"));
    // Budget is now one conflict per level.
    assert!(!engine.can_combine_with_override("c", 1, ["a", "b"]));
    assert!(engine.can_combine_with_override("c", 2, ["a", "b"]));
}

#[test]
fn test_second_initialize_rejected() {
    let engine = combat_engine();
    let err = engine
        .initialize(|_, _| Ok::<(), EngineError>(()))
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyInitialized);
    assert!(engine.are_conflicting("critical_strike", "execution"));
}

#[test]
fn test_reinitialize_after_shutdown() {
    let engine = combat_engine();
    engine.shutdown();
    assert!(!engine.are_conflicting("critical_strike", "execution"));

    engine
        .initialize(|builder, _| {
            builder.register_group("armor", ["dodge", "evasive"]);
            Ok::<(), EngineError>(())
        })
        .unwrap();
    assert!(engine.are_conflicting("dodge", "evasive"));
    assert!(!engine.are_conflicting("critical_strike", "execution"));
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[test]
fn test_concurrent_queries_with_maintenance() {
    let mut config = EngineConfig::default();
    config.cache.hot = TierConfig {
        capacity: 32,
        ttl_ms: 20,
    };
    config.cache.cold = TierConfig {
        capacity: 128,
        ttl_ms: 60,
    };
    config.cache.cleanup_interval_ms = 10;

    let engine = Arc::new(EnchantEngine::with_default_catalog(config).unwrap());
    assert!(engine.start_maintenance().unwrap());

    let ids: Vec<String> = engine
        .selector()
        .modifiers_in_category("combat")
        .into_iter()
        .chain(engine.selector().modifiers_in_category("weapon"))
        .map(|id| id.as_str().to_string())
        .collect();
    let ids = Arc::new(ids);
    let mismatches = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let num_threads = 8;
    let start = Instant::now();
    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let ids = Arc::clone(&ids);
            let mismatches = Arc::clone(&mismatches);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut i = t;
                let mut ops = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let a = &ids[i % ids.len()];
                    let b = &ids[(i * 7 + 3) % ids.len()];
                    if engine.check_pair_cached(a, b) != engine.check_pair(a, b) {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                    }
                    let set = [a.as_str(), b.as_str(), ids[(i + 1) % ids.len()].as_str()];
                    if *engine.report_cached(set) != engine.generate_report(set) {
                        mismatches.fetch_add(1, Ordering::Relaxed);
                    }
                    i += 1;
                    ops += 1;
                }
                ops
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(300));
    stop.store(true, Ordering::Relaxed);
    let total_ops: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let stats = engine.cache_stats();
    println!(
        "{total_ops} mixed ops in {:?}, hit rate {:.2}",
        start.elapsed(),
        stats.hit_rate
    );

    assert_eq!(mismatches.load(Ordering::Relaxed), 0);
    assert!(total_ops > 0);
    assert!(stats.hot_hits + stats.cold_hits > 0);

    engine.shutdown();
    assert!(!engine.is_maintenance_running());
}
