//! Imports (`use a.b.C`).

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::Builtin;

/// Chemin d’import pointé.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Import {
    /// Segments (`["spool", "core", "String"]`).
    pub path: Vec<String>,
}

impl Import {
    /// Depuis un chemin pointé.
    pub fn new(dotted: &str) -> Self {
        Self { path: dotted.split('.').filter(|s| !s.is_empty()).map(str::to_owned).collect() }
    }

    /// Depuis des segments déjà découpés.
    pub fn from_segments(path: Vec<String>) -> Self {
        Self { path }
    }

    /// Chemin complet.
    pub fn name(&self) -> String {
        self.path.join(".")
    }

    /// Vrai si les segments de `candidate` forment un suffixe du chemin.
    ///
    /// `spool.core.String` finit par `String` et `core.String`, pas par `ring`.
    pub fn ends_with(&self, candidate: &str) -> bool {
        let wanted: Vec<&str> = candidate.split('.').collect();
        if wanted.iter().any(|s| s.is_empty()) || wanted.len() > self.path.len() {
            return false;
        }
        self.path.iter().rev().zip(wanted.iter().rev()).all(|(have, want)| have == want)
    }

    /// Imports implicites : tous les types intégrés.
    pub fn default_imports() -> Vec<Import> {
        Builtin::ALL.iter().map(|b| Import::new(b.canonical_name())).collect()
    }
}

impl std::fmt::Display for Import {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn suffix_matching_is_segment_wise() {
        let i = Import::new("spool.core.String");
        assert!(i.ends_with("String"));
        assert!(i.ends_with("core.String"));
        assert!(i.ends_with("spool.core.String"));
        assert!(!i.ends_with("ring"));
        assert!(!i.ends_with("x.spool.core.String"));
        assert!(!i.ends_with(""));
    }

    #[test]
    fn defaults_cover_builtins() {
        let defaults = Import::default_imports();
        assert_eq!(defaults.len(), Builtin::ALL.len());
        assert!(defaults.iter().any(|i| i.name() == "spool.core.number.Int32"));
        assert!(defaults.iter().any(|i| i.name() == "spool.core.Console"));
    }
}
