//! Portées lexicales de l’analyse : nom → type déclaré.

use std::collections::BTreeMap;

use spool_ast::TypeId;

/// Variable visible dans une portée.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local {
    /// Type déclaré.
    pub ty: TypeId,
    /// `const` (ou `self`).
    pub constant: bool,
}

/// Pile de portées ; la recherche va de l’intérieur vers l’extérieur.
#[derive(Debug, Default)]
pub struct Scope {
    frames: Vec<BTreeMap<String, Local>>,
}

impl Scope {
    /// Pile avec une portée racine vide.
    pub fn new() -> Self {
        Self { frames: vec![BTreeMap::new()] }
    }

    /// Entre dans une portée.
    pub fn push(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    /// Quitte la portée courante (la racine reste).
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Déclare dans la portée courante ; `false` si le nom y existe déjà.
    pub fn declare(&mut self, name: &str, local: Local) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        if frame.contains_key(name) {
            return false;
        }
        frame.insert(name.to_owned(), local);
        true
    }

    /// Recherche un nom.
    pub fn lookup(&self, name: &str) -> Option<Local> {
        self.frames.iter().rev().find_map(|f| f.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_ast::{Builtin, FileDb};

    #[test]
    fn shadowing_allowed_only_across_frames() {
        let db = FileDb::new();
        let int = Local { ty: db.builtin(Builtin::Int32), constant: false };
        let string = Local { ty: db.builtin(Builtin::String), constant: true };

        let mut s = Scope::new();
        assert!(s.declare("x", int));
        assert!(!s.declare("x", string));
        s.push();
        assert!(s.declare("x", string));
        assert_eq!(s.lookup("x"), Some(string));
        s.pop();
        assert_eq!(s.lookup("x"), Some(int));
        assert_eq!(s.lookup("y"), None);
    }
}
