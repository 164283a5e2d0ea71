//! # Modifier Identifiers
//!
//! Every public entry point accepts raw strings and normalizes them here:
//! trimmed, lower-cased and namespace-qualified (`<namespace>:<name>`).
//! Two ids name the same modifier iff their normalized forms are equal.

use std::borrow::Borrow;
use std::fmt;

/// Namespace applied to ids that arrive without one.
pub const DEFAULT_NAMESPACE: &str = "enadd";

/// A normalized modifier identifier.
///
/// Construct through [`ModifierId::parse`] so the invariant holds; there is
/// no way to build an un-normalized id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModifierId(String);

impl ModifierId {
    /// Normalizes `raw` under `namespace`.
    ///
    /// Returns `None` for blank input or an empty name (`"minecraft:"`,
    /// `":"`). An empty namespace (`":sharpness"`) takes `namespace`.
    /// Normalization is idempotent: parsing an already-normalized id yields
    /// the same id.
    #[must_use]
    pub fn parse(raw: &str, namespace: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lowered = trimmed.to_lowercase();
        match lowered.split_once(':') {
            Some((_, "")) => None,
            Some(("", name)) => Some(Self(format!("{namespace}:{name}"))),
            Some(_) => Some(Self(lowered)),
            None => Some(Self(format!("{namespace}:{lowered}"))),
        }
    }

    /// Normalizes `raw` under [`DEFAULT_NAMESPACE`].
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        Self::parse(raw, DEFAULT_NAMESPACE)
    }

    /// Returns the normalized form.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace part.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map_or("", |(ns, _)| ns)
    }

    /// Returns the name part.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for ModifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModifierId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModifierId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Normalizes a batch of raw ids, dropping blanks and duplicates.
///
/// First-seen order is kept.
#[must_use]
pub fn normalize_all<I, S>(raw: I, namespace: &str) -> Vec<ModifierId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .filter_map(|s| ModifierId::parse(s.as_ref(), namespace))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_default_namespace() {
        let id = ModifierId::new("critical_strike").unwrap();
        assert_eq!(id.as_str(), "enadd:critical_strike");
        assert_eq!(id.namespace(), "enadd");
        assert_eq!(id.name(), "critical_strike");
    }

    #[test]
    fn test_trims_and_lowercases() {
        let a = ModifierId::new("  CRITICAL_Strike ").unwrap();
        let b = ModifierId::new("enadd:critical_strike").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_keeps_explicit_namespace() {
        let id = ModifierId::new("Minecraft:Sharpness").unwrap();
        assert_eq!(id.as_str(), "minecraft:sharpness");
    }

    #[test]
    fn test_blank_is_rejected() {
        assert!(ModifierId::new("").is_none());
        assert!(ModifierId::new("   ").is_none());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(ModifierId::new("minecraft:").is_none());
        assert!(ModifierId::new(":").is_none());
        assert!(ModifierId::new("  enadd:  ").is_none());
        assert_eq!(
            ModifierId::parse(":sharpness", "custom").unwrap().as_str(),
            "custom:sharpness"
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = ModifierId::parse(" Fire_Aspect ", "custom").unwrap();
        let twice = ModifierId::parse(once.as_str(), "custom").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_all_dedupes_in_order() {
        let ids = normalize_all(["b", " A ", "", "enadd:b", "c"], DEFAULT_NAMESPACE);
        let names: Vec<_> = ids.iter().map(ModifierId::name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
