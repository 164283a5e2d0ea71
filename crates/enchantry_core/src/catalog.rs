//! # Built-in Catalog
//!
//! Default conflict groups, weights and weight categories.
//!
//! Vanilla modifiers live under the `minecraft` namespace and are written
//! fully qualified; everything else is bare and lands in the engine's
//! namespace. A vanilla id and a custom id with the same name are distinct
//! modifiers.

use tracing::warn;

use crate::error::EngineResult;
use crate::graph::{GraphBuilder, ModifierKind, RegistrationOutcome};
use crate::selector::WeightedSelector;

/// Conflict groups as `(category, members)`.
pub const CONFLICT_GROUPS: &[(&str, &[&str])] = &[
    // Vanilla
    (
        "vanilla_protection",
        &[
            "minecraft:protection",
            "minecraft:blast_protection",
            "minecraft:fire_protection",
            "minecraft:projectile_protection",
        ],
    ),
    (
        "vanilla_damage",
        &["minecraft:sharpness", "minecraft:smite", "minecraft:bane_of_arthropods"],
    ),
    ("vanilla_tool", &["minecraft:fortune", "minecraft:silk_touch"]),
    ("vanilla_bow", &["minecraft:infinity", "minecraft:mending"]),
    ("vanilla_depth", &["minecraft:depth_strider", "minecraft:frost_walker"]),
    ("vanilla_crossbow", &["minecraft:multishot", "minecraft:piercing"]),
    // Combat
    (
        "combat",
        &["critical_strike", "precision_strike", "execution", "execute"],
    ),
    ("combat", &["vampirism", "life_drain", "leech"]),
    ("combat", &["crippling", "cripple", "frost_bite"]),
    ("combat", &["bleeding", "hemorrhage", "wound", "eviscerate"]),
    ("combat", &["backstab", "eviscerate"]),
    ("combat", &["momentum", "frenzy"]),
    ("combat", &["rampage", "bloodlust"]),
    ("combat", &["doom_blade", "annihilate"]),
    // Armor
    ("armor", &["stone_skin", "reinforced_thorns"]),
    ("armor", &["dodge", "evasive"]),
    ("armor", &["reinforced_thorns", "thorns", "spikes"]),
    ("armor", &["barrier", "aegis_shield", "bastion"]),
    ("armor", &["adrenaline", "swift_sneak"]),
    // Tool
    ("tool", &["efficiency", "efficiency_plus", "miner", "strong_draw"]),
    (
        "tool",
        &[
            "fortune",
            "fortune_plus",
            "fortunes_grace",
            "treasure_hunter",
            "luck_of_the_sea",
        ],
    ),
    ("tool", &["mending", "experience_boost", "auto_repair"]),
    ("tool", &["area_mining", "vein_miner", "excavation", "timber"]),
    ("tool", &["auto_smelt", "smelting_touch"]),
    ("tool", &["homing", "triple_shot"]),
    ("tool", &["quick_draw", "strong_draw"]),
    // Defense
    (
        "defense",
        &[
            "elemental_resist",
            "fire_protection",
            "frost_protection",
            "lightning_ward",
            "poison_ward",
        ],
    ),
    ("defense", &["reflect", "thorns", "spikes", "retaliate"]),
    (
        "defense",
        &[
            "protection",
            "blast_protection",
            "projectile_protection",
            "fire_ward",
            "frost_ward",
        ],
    ),
    ("defense", &["energy_shield", "magic_barrier", "physical_barrier"]),
    // Special
    (
        "special",
        &["meteor_strike", "storm_caller", "dragon_breath", "phantom_strike"],
    ),
    ("special", &["teleport", "phase", "void_reach"]),
    ("special", &["clone", "phantom_strike", "soul_reaper"]),
];

/// Cosmetic modifiers as `(family, members)`. Only one member of a family
/// fits on an item.
pub const COSMETIC_FAMILIES: &[(&str, &[&str])] = &[
    (
        "weapon_trail",
        &[
            "weapon_flame_trail",
            "weapon_frost_trail",
            "weapon_lightning_trail",
            "weapon_poison_trail",
            "weapon_shadow_trail",
            "weapon_holy_trail",
        ],
    ),
    (
        "armor_aura",
        &[
            "armor_glow",
            "armor_aura",
            "armor_sparkle",
            "armor_shimmer",
            "armor_pulse",
            "armor_ripple",
        ],
    ),
];

/// Category label given to cosmetic modifiers.
pub const COSMETIC_CATEGORY: &str = "cosmetic";

/// Default weights.
pub const WEIGHTS: &[(&str, i64)] = &[
    // Vanilla armor
    ("minecraft:protection", 10),
    ("minecraft:fire_protection", 5),
    ("minecraft:feather_falling", 5),
    ("minecraft:blast_protection", 5),
    ("minecraft:projectile_protection", 5),
    // Vanilla weapon
    ("minecraft:sharpness", 10),
    ("minecraft:smite", 5),
    ("minecraft:bane_of_arthropods", 5),
    ("minecraft:knockback", 5),
    ("minecraft:fire_aspect", 2),
    ("minecraft:looting", 2),
    ("minecraft:sweeping", 2),
    // Vanilla tool
    ("minecraft:efficiency", 10),
    ("minecraft:silk_touch", 1),
    ("minecraft:unbreaking", 5),
    ("minecraft:fortune", 2),
    // Vanilla bow
    ("minecraft:power", 10),
    ("minecraft:punch", 2),
    ("minecraft:flame", 2),
    ("minecraft:infinity", 1),
    // Vanilla misc
    ("minecraft:mending", 2),
    ("minecraft:vanishing_curse", 1),
    ("minecraft:binding_curse", 1),
    ("minecraft:lure", 2),
    ("minecraft:luck_of_the_sea", 2),
    ("minecraft:respiration", 2),
    ("minecraft:depth_strider", 2),
    ("minecraft:aqua_affinity", 2),
    ("minecraft:frost_walker", 2),
    ("minecraft:thorns", 1),
    ("minecraft:loyalty", 3),
    ("minecraft:riptide", 2),
    ("minecraft:channeling", 2),
    ("minecraft:soul_speed", 2),
    ("minecraft:swift_sneak", 2),
    // Combat
    ("cleave", 4),
    ("bleeding", 5),
    ("armor_pierce", 4),
    ("execution", 2),
    ("momentum", 5),
    ("disarm", 3),
    ("crippling", 4),
    ("reprisal", 4),
    ("hemorrhage", 5),
    ("backstab", 4),
    ("stagger", 4),
    ("rend", 4),
    ("savage", 3),
    ("duelist", 5),
    ("hunter", 4),
    ("juggernaut", 3),
    ("finisher", 3),
    ("vampirism", 2),
    ("chain_lightning", 3),
    ("frost_nova", 4),
    ("fire_storm", 3),
    ("shadow_strike", 4),
    ("berserker_rage", 3),
    ("life_steal", 3),
    ("mana_steal", 3),
    ("critical_strike", 5),
    ("poison_cloud", 4),
    ("thunder_strike", 3),
    ("void_slash", 2),
    ("dragon_breath", 3),
    ("soul_burn", 3),
    ("bloodlust", 2),
    ("death_mark", 3),
    // Armor
    ("stone_skin", 4),
    ("dodge", 5),
    ("reinforced_thorns", 3),
    ("barrier", 3),
    ("adrenaline", 4),
    ("willpower", 4),
    ("grounding", 5),
    ("thermostatic", 4),
    ("iron_will", 4),
    ("recoil", 3),
    ("endurance", 5),
    ("last_stand", 2),
    // Tool
    ("miner", 10),
    ("chain_mining", 4),
    ("prospecting", 5),
    ("auto_smelt", 8),
    ("magnetic", 5),
    ("tree_feller", 4),
    ("precision", 8),
    ("strong_draw", 6),
    ("catapult", 4),
    ("enhanced_piercing", 6),
    ("sniper", 5),
    ("frost_arrow", 4),
    ("signal_arrow", 5),
    ("silence", 4),
    ("harvest", 8),
    ("navigation", 6),
    ("titan_strength", 3),
    ("lightning_speed", 4),
    ("explosive_mining", 3),
    ("combo_breaker", 4),
    ("arbor_master", 4),
    ("fortunes_grace", 3),
    ("smelting_touch", 5),
    ("collector", 4),
    ("speed_surge", 5),
    ("ethereal_step", 4),
    ("heavy_hand", 5),
    ("shadow_veil", 3),
    ("climber", 6),
    ("intimidation", 3),
    ("torch_light", 5),
    ("ore_sight", 4),
    ("traveler", 5),
    ("vacuum", 4),
    ("void_mining", 2),
    ("transmutation", 3),
    ("multitool", 2),
    ("instant_mining", 2),
    ("infinite", 1),
    ("duplication", 1),
    ("builder", 4),
    ("area_mining", 3),
    ("auto_sort", 5),
    ("magnet", 4),
    // Utility
    ("auto_repair", 3),
    ("soul_bound", 2),
    ("teleport", 3),
    ("time_accel", 1),
    ("time_stop", 1),
    ("gravity", 3),
    ("anti_gravity", 3),
    ("cloud_step", 4),
    ("phase", 2),
    ("water_walk", 4),
    ("wall_walk", 3),
    ("dimension_shift", 1),
    ("weather_control", 1),
    ("xray", 2),
    ("light_source", 5),
    ("night_vision", 5),
    ("invisibility", 3),
    ("mind_control", 2),
    // Curses
    ("curse_fragile", 1),
    ("curse_sluggish", 1),
    ("curse_noise", 1),
    ("curse_binding_plus", 1),
    ("curse_drain", 1),
    ("curse_weakness", 1),
    ("curse_confusion", 1),
    // Special
    ("meteor_strike", 1),
    ("homecoming", 2),
    ("binder", 3),
];

/// Weight categories as `(name, members)`.
pub const WEIGHT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "weapon",
        &[
            "minecraft:sharpness",
            "minecraft:smite",
            "minecraft:bane_of_arthropods",
            "minecraft:knockback",
            "minecraft:fire_aspect",
            "minecraft:looting",
            "minecraft:sweeping",
            "cleave",
            "bleeding",
            "execution",
            "momentum",
            "vampirism",
            "critical_strike",
            "armor_pierce",
            "disarm",
            "crippling",
            "hemorrhage",
            "backstab",
            "stagger",
            "rend",
            "savage",
            "duelist",
            "hunter",
            "juggernaut",
            "finisher",
        ],
    ),
    (
        "armor",
        &[
            "minecraft:protection",
            "minecraft:fire_protection",
            "minecraft:feather_falling",
            "minecraft:blast_protection",
            "minecraft:projectile_protection",
            "minecraft:thorns",
            "stone_skin",
            "dodge",
            "reinforced_thorns",
            "barrier",
            "adrenaline",
            "willpower",
            "grounding",
            "thermostatic",
            "iron_will",
            "recoil",
            "endurance",
            "last_stand",
        ],
    ),
    (
        "tool",
        &[
            "minecraft:efficiency",
            "minecraft:silk_touch",
            "minecraft:fortune",
            "minecraft:unbreaking",
            "miner",
            "chain_mining",
            "prospecting",
            "auto_smelt",
            "magnetic",
            "tree_feller",
            "precision",
            "strong_draw",
            "catapult",
            "enhanced_piercing",
            "sniper",
            "frost_arrow",
            "signal_arrow",
            "silence",
            "harvest",
            "navigation",
            "titan_strength",
            "lightning_speed",
            "explosive_mining",
            "smelting_touch",
            "speed_surge",
            "collector",
            "heavy_hand",
            "climber",
            "torch_light",
            "ore_sight",
            "traveler",
        ],
    ),
    (
        "bow",
        &[
            "minecraft:power",
            "minecraft:punch",
            "minecraft:flame",
            "minecraft:infinity",
            "sniper",
            "hunter",
            "frost_arrow",
            "signal_arrow",
        ],
    ),
    (
        "fishing_rod",
        &["minecraft:luck_of_the_sea", "minecraft:lure", "minecraft:unbreaking"],
    ),
    (
        "trident",
        &[
            "minecraft:loyalty",
            "minecraft:channeling",
            "minecraft:impaling",
            "minecraft:riptide",
        ],
    ),
    (
        "crossbow",
        &["minecraft:multishot", "minecraft:piercing", "minecraft:quick_charge"],
    ),
    (
        "utility",
        &[
            "minecraft:mending",
            "minecraft:unbreaking",
            "minecraft:soul_speed",
            "minecraft:swift_sneak",
            "minecraft:depth_strider",
            "minecraft:aqua_affinity",
            "minecraft:respiration",
            "auto_repair",
            "soul_bound",
            "teleport",
            "cloud_step",
            "water_walk",
            "wall_walk",
            "light_source",
            "night_vision",
            "invisibility",
        ],
    ),
    (
        "special",
        &[
            "meteor_strike",
            "homecoming",
            "binder",
            "time_accel",
            "time_stop",
            "gravity",
            "anti_gravity",
            "phase",
            "dimension_shift",
            "weather_control",
            "xray",
            "mind_control",
            "transmutation",
            "multitool",
            "instant_mining",
            "infinite",
            "duplication",
        ],
    ),
    (
        "curse",
        &[
            "minecraft:vanishing_curse",
            "minecraft:binding_curse",
            "curse_fragile",
            "curse_sluggish",
            "curse_noise",
            "curse_binding_plus",
            "curse_drain",
            "curse_weakness",
            "curse_confusion",
        ],
    ),
];

/// Stages the conflict rules into `builder`.
///
/// # Errors
///
/// Never fails today; the signature matches the loader contract of
/// [`crate::graph::ConflictGraphStore::initialize`].
pub fn load_conflicts(builder: &mut GraphBuilder) -> EngineResult<()> {
    for (category, members) in CONFLICT_GROUPS {
        let outcome = builder.register_group(category, members.iter().copied());
        warn_kept_categories(category, &outcome);
    }

    for (family, members) in COSMETIC_FAMILIES {
        let outcome = builder.register_group(COSMETIC_CATEGORY, members.iter().copied());
        warn_kept_categories(COSMETIC_CATEGORY, &outcome);
        for member in *members {
            builder.register_kind(
                member,
                ModifierKind::Exclusive {
                    family: (*family).to_string(),
                },
            );
        }
    }

    Ok(())
}

/// Registers the default weights and weight categories into `selector`.
pub fn load_weights(selector: &WeightedSelector) {
    for (id, weight) in WEIGHTS {
        selector.set_weight(id, *weight);
    }
    for (name, members) in WEIGHT_CATEGORIES {
        selector.register_category(name, members.iter().copied());
    }
}

/// Loads the whole built-in catalog.
///
/// # Errors
///
/// As [`load_conflicts`].
pub fn load_default(builder: &mut GraphBuilder, selector: &WeightedSelector) -> EngineResult<()> {
    load_conflicts(builder)?;
    load_weights(selector);
    Ok(())
}

/// Logs every id whose first category label was kept over `category`.
pub fn warn_kept_categories(category: &str, outcome: &RegistrationOutcome) {
    for (id, kept) in &outcome.kept_category {
        warn!(modifier = %id, kept = %kept, ignored = category, "modifier already categorized, keeping first label");
    }
}
