//! Ordered component catalog used for table columns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Canonical order of the bifrost components.
pub const DEFAULT_COMPONENT_ORDER: [&str; 13] = [
    "whats_my_species",
    "analyzer",
    "assemblatron",
    "ssi_stamper",
    "ariba_resfinder",
    "ariba_mlst",
    "ariba_plasmidfinder",
    "ariba_virulencefinder",
    "sp_cdiff_fbi",
    "sp_ecoli_fbi",
    "sp_salm_fbi",
    "min_read_check",
    "qcquickie",
];

/// Component names in column order.
///
/// Canonical components come first, in canonical order; any other observed
/// component follows in first-seen order. Nothing observed is ever dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentCatalog {
    components: Vec<String>,
}

impl ComponentCatalog {
    /// Builds a catalog from the components observed in the input.
    ///
    /// `observed` is visited in order; canonical components that never
    /// appear in it are left out.
    pub fn from_observed<'a, C, I>(canonical: &[C], observed: I) -> Self
    where
        C: AsRef<str>,
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: Vec<&str> = Vec::new();
        let mut seen_set: HashSet<&str> = HashSet::new();
        for name in observed {
            if seen_set.insert(name) {
                seen.push(name);
            }
        }

        let canonical_set: HashSet<&str> = canonical.iter().map(AsRef::<str>::as_ref).collect();
        let mut components: Vec<String> = canonical
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|c| seen_set.contains(*c))
            .map(str::to_string)
            .collect();
        components.extend(
            seen.into_iter()
                .filter(|c| !canonical_set.contains(*c))
                .map(str::to_string),
        );

        Self { components }
    }

    /// A catalog holding exactly the given components, in order.
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut components: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !components.contains(&name) {
                components.push(name);
            }
        }
        Self { components }
    }

    pub fn contains(&self, component: &str) -> bool {
        self.components.iter().any(|c| c == component)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_wins() {
        let catalog = ComponentCatalog::from_observed(
            &DEFAULT_COMPONENT_ORDER,
            ["qcquickie", "assemblatron", "whats_my_species"],
        );
        assert_eq!(
            catalog.as_slice(),
            &["whats_my_species", "assemblatron", "qcquickie"]
        );
    }

    #[test]
    fn test_unknown_components_appended_in_first_seen_order() {
        let catalog = ComponentCatalog::from_observed(
            &DEFAULT_COMPONENT_ORDER,
            ["zeta_typer", "assemblatron", "alpha_typer", "zeta_typer"],
        );
        assert_eq!(
            catalog.as_slice(),
            &["assemblatron", "zeta_typer", "alpha_typer"]
        );
    }

    #[test]
    fn test_empty_input() {
        let catalog = ComponentCatalog::from_observed(&DEFAULT_COMPONENT_ORDER, []);
        assert!(catalog.is_empty());
        assert!(!catalog.contains("assemblatron"));
    }

    #[test]
    fn test_from_names_dedups() {
        let catalog = ComponentCatalog::from_names(["a", "b", "a"]);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("b"));
    }
}
