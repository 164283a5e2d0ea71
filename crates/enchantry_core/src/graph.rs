//! # Conflict Graph
//!
//! **Source of truth for which modifiers may not share an item.**
//!
//! An undirected graph over [`ModifierId`]s, stored as an adjacency map
//! with each edge kept on both endpoints:
//!
//! ```text
//!   register_group("combat", [a, b, c])
//!
//!        a ───── b          adjacency:  a -> {b, c}
//!         \     /                       b -> {a, c}
//!          \   /                        c -> {a, b}
//!            c              category:   a, b, c -> "combat"
//! ```
//!
//! ## Guarantees
//!
//! 1. **Symmetry**: lookups check both endpoints, so an asymmetric insert
//!    still answers symmetrically.
//! 2. **Irreflexivity**: identity short-circuits before any lookup.
//! 3. **First label wins**: a modifier keeps the category it was first
//!    registered under.
//! 4. **All-or-nothing bulk load**: [`ConflictGraphStore::initialize`]
//!    stages everything and publishes only on success. A failed load leaves
//!    the store empty, which answers "no conflict" everywhere.
//!
//! ## Thread Safety
//!
//! Every table is a `DashMap`. Queries only take shard read guards and
//! never block each other.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

use crate::error::{EngineError, EngineResult};
use crate::id::ModifierId;

/// How a modifier takes part in conflict resolution.
///
/// Resolved once at registration into ordinary edges; queries never look
/// at the kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    /// Conflicts only through explicitly registered groups.
    #[default]
    Standard,
    /// Conflicts with every other member of the same family
    /// (e.g. only one weapon trail per item).
    Exclusive {
        /// Family name shared by mutually exclusive modifiers.
        family: String,
    },
}

/// What a single registration call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// Valid ids that were registered.
    pub registered: usize,
    /// Ids that already carried a different category; their first label was
    /// kept. The caller decides whether to warn.
    pub kept_category: Vec<(ModifierId, String)>,
}

/// Aggregate size of the graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Distinct modifiers with an adjacency entry.
    pub modifier_count: usize,
    /// Undirected edges (half the sum of adjacency sizes).
    pub edge_count: usize,
    /// Distinct category labels.
    pub category_count: usize,
}

/// The raw tables shared by the live store and the staging builder.
#[derive(Debug, Default)]
struct RuleTables {
    adjacency: DashMap<ModifierId, HashSet<ModifierId>>,
    categories: DashMap<ModifierId, String>,
    kinds: DashMap<ModifierId, ModifierKind>,
    families: DashMap<String, Vec<ModifierId>>,
}

impl RuleTables {
    fn insert_edge(&self, a: &ModifierId, b: &ModifierId) {
        self.adjacency.entry(a.clone()).or_default().insert(b.clone());
        self.adjacency.entry(b.clone()).or_default().insert(a.clone());
    }

    fn register_group(&self, category: &str, ids: &[ModifierId]) -> RegistrationOutcome {
        let mut outcome = RegistrationOutcome::default();

        for (i, id) in ids.iter().enumerate() {
            self.adjacency.entry(id.clone()).or_default();

            let existing = self
                .categories
                .entry(id.clone())
                .or_insert_with(|| category.to_string())
                .clone();
            if existing != category {
                outcome.kept_category.push((id.clone(), existing));
            }

            for (j, other) in ids.iter().enumerate() {
                if i != j {
                    self.insert_edge(id, other);
                }
            }
            outcome.registered += 1;
        }

        outcome
    }

    fn register_kind(&self, id: &ModifierId, kind: ModifierKind) {
        self.adjacency.entry(id.clone()).or_default();
        let kind = self.kinds.entry(id.clone()).or_insert(kind).clone();

        let ModifierKind::Exclusive { family } = kind else {
            return;
        };

        // Clone the member list so no shard guard is held while inserting edges.
        let members: Vec<ModifierId> = self
            .families
            .get(&family)
            .map(|m| m.clone())
            .unwrap_or_default();
        if members.contains(id) {
            return;
        }

        for member in &members {
            self.insert_edge(id, member);
        }
        self.families.entry(family).or_default().push(id.clone());
    }

    fn contains_edge(&self, a: &ModifierId, b: &ModifierId) -> bool {
        self.adjacency.get(a).is_some_and(|set| set.contains(b))
    }

    fn clear(&self) {
        self.adjacency.clear();
        self.categories.clear();
        self.kinds.clear();
        self.families.clear();
    }

    fn absorb(&self, staged: Self) {
        for (id, set) in staged.adjacency {
            self.adjacency.entry(id).or_default().extend(set);
        }
        for (id, category) in staged.categories {
            self.categories.entry(id).or_insert(category);
        }
        // Replay kinds so families span staged and previously live members.
        for (id, kind) in staged.kinds {
            self.register_kind(&id, kind);
        }
    }

    fn stats(&self) -> GraphStats {
        let directed: usize = self.adjacency.iter().map(|e| e.value().len()).sum();
        let categories: HashSet<String> =
            self.categories.iter().map(|e| e.value().clone()).collect();

        GraphStats {
            modifier_count: self.adjacency.len(),
            edge_count: directed / 2,
            category_count: categories.len(),
        }
    }
}

/// Staging area for an all-or-nothing bulk load.
///
/// Handed to the loader passed to [`ConflictGraphStore::initialize`].
#[derive(Debug)]
pub struct GraphBuilder {
    namespace: String,
    tables: RuleTables,
}

impl GraphBuilder {
    fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            tables: RuleTables::default(),
        }
    }

    /// Stages a group of mutually conflicting modifiers.
    ///
    /// Blank ids are skipped; a blank category or empty list is a no-op.
    pub fn register_group<I, S>(&mut self, category: &str, ids: I) -> RegistrationOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let category = category.trim();
        if category.is_empty() {
            return RegistrationOutcome::default();
        }
        let ids = parse_group(ids, &self.namespace);
        self.tables.register_group(category, &ids)
    }

    /// Stages the kind of a modifier. Blank ids are ignored.
    pub fn register_kind(&mut self, id: &str, kind: ModifierKind) {
        if let Some(id) = ModifierId::parse(id, &self.namespace) {
            self.tables.register_kind(&id, kind);
        }
    }

    /// Sizes of what has been staged so far.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        self.tables.stats()
    }
}

/// Normalizes a registration batch. Blanks are dropped, duplicates kept:
/// a repeated id lands as a self-loop that queries ignore.
fn parse_group<I, S>(ids: I, namespace: &str) -> Vec<ModifierId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter()
        .filter_map(|s| ModifierId::parse(s.as_ref(), namespace))
        .collect()
}

/// The live conflict graph.
#[derive(Debug)]
pub struct ConflictGraphStore {
    namespace: String,
    tables: RuleTables,
    initialized: AtomicBool,
    /// Serializes bulk loads and shutdown; never taken by queries.
    lifecycle: Mutex<()>,
}

impl ConflictGraphStore {
    /// Creates an empty, uninitialized store.
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            tables: RuleTables::default(),
            initialized: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// Namespace applied to bare ids.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Normalizes a raw id under this store's namespace.
    #[inline]
    #[must_use]
    pub fn parse(&self, raw: &str) -> Option<ModifierId> {
        ModifierId::parse(raw, &self.namespace)
    }

    /// Runs a bulk load atomically.
    ///
    /// The loader registers into a private [`GraphBuilder`]. On success the
    /// staged rules are published and the store is marked initialized. On
    /// failure the store is cleared and stays uninitialized.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` if a load already succeeded,
    /// `RegistrationFailed` if the loader failed.
    pub fn initialize<F, E>(&self, loader: F) -> EngineResult<GraphStats>
    where
        F: FnOnce(&mut GraphBuilder) -> Result<(), E>,
        E: fmt::Display,
    {
        let _guard = self.lifecycle.lock();
        if self.initialized.load(Ordering::Acquire) {
            return Err(EngineError::AlreadyInitialized);
        }

        let mut builder = GraphBuilder::new(&self.namespace);
        if let Err(e) = loader(&mut builder) {
            self.tables.clear();
            self.initialized.store(false, Ordering::Release);
            error!(error = %e, "conflict rule load failed, graph rolled back to empty");
            return Err(EngineError::RegistrationFailed {
                reason: e.to_string(),
            });
        }

        self.tables.absorb(builder.tables);
        self.initialized.store(true, Ordering::Release);

        let stats = self.tables.stats();
        info!(
            modifiers = stats.modifier_count,
            edges = stats.edge_count,
            categories = stats.category_count,
            "conflict graph initialized"
        );
        Ok(stats)
    }

    /// Whether a bulk load has succeeded and not been shut down.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Clears every rule. Idempotent.
    pub fn shutdown(&self) {
        let _guard = self.lifecycle.lock();
        if self.initialized.swap(false, Ordering::AcqRel) {
            info!("conflict graph shut down");
        }
        self.tables.clear();
    }

    /// Registers a group of mutually conflicting modifiers directly.
    ///
    /// Normalizes every id and skips blanks; a blank category or empty
    /// list is a no-op. Re-registering the same group adds nothing.
    pub fn register_group<I, S>(&self, category: &str, ids: I) -> RegistrationOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let category = category.trim();
        if category.is_empty() {
            return RegistrationOutcome::default();
        }
        let ids = parse_group(ids, &self.namespace);
        self.tables.register_group(category, &ids)
    }

    /// Registers the kind of a modifier directly. Blank ids are ignored.
    pub fn register_kind(&self, id: &str, kind: ModifierKind) {
        if let Some(id) = self.parse(id) {
            self.tables.register_kind(&id, kind);
        }
    }

    /// Whether two raw ids conflict. Blank or identical ids never do.
    #[must_use]
    pub fn are_conflicting(&self, a: &str, b: &str) -> bool {
        match (self.parse(a), self.parse(b)) {
            (Some(a), Some(b)) => self.conflicts_between(&a, &b),
            _ => false,
        }
    }

    /// Whether two normalized ids conflict.
    #[inline]
    #[must_use]
    pub fn conflicts_between(&self, a: &ModifierId, b: &ModifierId) -> bool {
        if a == b {
            return false;
        }
        self.tables.contains_edge(a, b) || self.tables.contains_edge(b, a)
    }

    /// Everything `id` conflicts with. Empty for unknown or blank ids.
    #[must_use]
    pub fn conflicts_of(&self, id: &str) -> BTreeSet<ModifierId> {
        let Some(id) = self.parse(id) else {
            return BTreeSet::new();
        };
        self.tables
            .adjacency
            .get(&id)
            .map(|set| set.iter().filter(|other| **other != id).cloned().collect())
            .unwrap_or_default()
    }

    /// Category `id` was first registered under.
    #[must_use]
    pub fn category_of(&self, id: &str) -> Option<String> {
        let id = self.parse(id)?;
        self.tables.categories.get(&id).map(|c| c.clone())
    }

    /// Registered kind of `id`; `Standard` when never registered.
    #[must_use]
    pub fn kind_of(&self, id: &str) -> ModifierKind {
        self.parse(id)
            .and_then(|id| self.tables.kinds.get(&id).map(|k| k.clone()))
            .unwrap_or_default()
    }

    /// Modifiers labelled with `category`, sorted.
    #[must_use]
    pub fn modifiers_in_category(&self, category: &str) -> Vec<ModifierId> {
        let mut ids: Vec<ModifierId> = self
            .tables
            .categories
            .iter()
            .filter(|e| e.value() == category)
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Distinct category labels.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<String> {
        self.tables
            .categories
            .iter()
            .map(|e| e.value().clone())
            .collect()
    }

    /// Owned, sorted copy of the whole adjacency map.
    #[must_use]
    pub fn conflict_rules(&self) -> BTreeMap<ModifierId, BTreeSet<ModifierId>> {
        self.tables
            .adjacency
            .iter()
            .map(|e| {
                let id = e.key().clone();
                let set = e.value().iter().filter(|o| **o != id).cloned().collect();
                (id, set)
            })
            .collect()
    }

    /// Modifier, edge and category counts.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        self.tables.stats()
    }

    /// Read-only handle on this store.
    #[inline]
    #[must_use]
    pub fn view(&self) -> GraphView<'_> {
        GraphView { store: self }
    }
}

/// Read-only handle on a [`ConflictGraphStore`].
///
/// Owners whose caches must see every mutation, like the engine, hand this
/// out instead of the store itself.
#[derive(Clone, Copy, Debug)]
pub struct GraphView<'a> {
    store: &'a ConflictGraphStore,
}

impl<'a> GraphView<'a> {
    /// Namespace applied to bare ids.
    #[must_use]
    pub fn namespace(&self) -> &'a str {
        self.store.namespace()
    }

    /// Whether a bulk load has succeeded and not been shut down.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    /// See [`ConflictGraphStore::are_conflicting`].
    #[must_use]
    pub fn are_conflicting(&self, a: &str, b: &str) -> bool {
        self.store.are_conflicting(a, b)
    }

    /// See [`ConflictGraphStore::conflicts_of`].
    #[must_use]
    pub fn conflicts_of(&self, id: &str) -> BTreeSet<ModifierId> {
        self.store.conflicts_of(id)
    }

    /// See [`ConflictGraphStore::category_of`].
    #[must_use]
    pub fn category_of(&self, id: &str) -> Option<String> {
        self.store.category_of(id)
    }

    /// See [`ConflictGraphStore::kind_of`].
    #[must_use]
    pub fn kind_of(&self, id: &str) -> ModifierKind {
        self.store.kind_of(id)
    }

    /// See [`ConflictGraphStore::modifiers_in_category`].
    #[must_use]
    pub fn modifiers_in_category(&self, category: &str) -> Vec<ModifierId> {
        self.store.modifiers_in_category(category)
    }

    /// See [`ConflictGraphStore::categories`].
    #[must_use]
    pub fn categories(&self) -> BTreeSet<String> {
        self.store.categories()
    }

    /// See [`ConflictGraphStore::conflict_rules`].
    #[must_use]
    pub fn conflict_rules(&self) -> BTreeMap<ModifierId, BTreeSet<ModifierId>> {
        self.store.conflict_rules()
    }

    /// See [`ConflictGraphStore::stats`].
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        self.store.stats()
    }
}
