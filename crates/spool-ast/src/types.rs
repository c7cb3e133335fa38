//! Références de type différées.

use std::cell::OnceCell;

#[cfg(feature = "serde")]
use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::{FileDb, Span};

/// Identifiant d’une classe enregistrée dans la [`FileDb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    /// Position dans l’arène des classes.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Conflit de résolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("type reference `{name}` already resolved to a different type")]
pub struct TypeRefError {
    /// Nom de la référence.
    pub name: String,
    /// Cible existante.
    pub existing: TypeId,
    /// Cible refusée.
    pub attempted: TypeId,
}

/// Référence de type par nom, résolue au plus une fois.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Nom tel qu’écrit (ou canonique pour les types intégrés).
    pub name: String,
    /// Localisation.
    pub span: Span,
    resolved: OnceCell<TypeId>,
}

impl TypeRef {
    /// Référence non résolue.
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span, resolved: OnceCell::new() }
    }

    /// Référence déjà résolue.
    pub fn resolved(name: impl Into<String>, id: TypeId) -> Self {
        let resolved = OnceCell::new();
        let _ = resolved.set(id);
        Self { name: name.into(), span: Span::default(), resolved }
    }

    /// Cible, si résolue.
    pub fn get(&self) -> Option<TypeId> {
        self.resolved.get().copied()
    }

    /// `true` une fois la cible fixée.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Fixe la cible. Idempotent pour la même cible ; erreur sinon.
    pub fn resolve(&self, id: TypeId) -> Result<(), TypeRefError> {
        match self.resolved.get() {
            Some(&existing) if existing == id => Ok(()),
            Some(&existing) => Err(TypeRefError { name: self.name.clone(), existing, attempted: id }),
            None => {
                let _ = self.resolved.set(id);
                Ok(())
            }
        }
    }
}

#[cfg(feature = "serde")]
impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut st = s.serialize_struct("TypeRef", 2)?;
        st.serialize_field("name", &self.name)?;
        st.serialize_field("resolved", &self.get())?;
        st.end()
    }
}

/// Paramètre de type contraint (`T: Number`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ConstrainedTypeRef {
    /// Référence contrainte.
    pub base: TypeRef,
    /// Contraintes ; une seule est prise en charge.
    pub constraints: Vec<TypeRef>,
}

impl ConstrainedTypeRef {
    /// Vrai si le supertype de la cible correspond à l’unique contrainte.
    /// Sans contrainte : toujours vrai. Plusieurs contraintes : non géré, faux.
    pub fn fits_constraints(&self, db: &FileDb) -> bool {
        match self.constraints.as_slice() {
            [] => true,
            [only] => {
                let (Some(target), Some(bound)) = (self.base.get(), only.get()) else {
                    return false;
                };
                db.supertype(target) == Some(bound)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builtin;

    #[test]
    fn resolve_is_idempotent_and_rejects_conflicts() {
        let r = TypeRef::new("Int32", Span::default());
        assert!(!r.is_resolved());
        r.resolve(TypeId(3)).unwrap();
        r.resolve(TypeId(3)).unwrap();
        let err = r.resolve(TypeId(4)).unwrap_err();
        assert_eq!(err.existing, TypeId(3));
        assert_eq!(err.attempted, TypeId(4));
        assert_eq!(r.get(), Some(TypeId(3)));
    }

    #[test]
    fn single_constraint_checks_direct_supertype() {
        let db = FileDb::new();
        let int = db.builtin(Builtin::Int32);
        let number = db.builtin(Builtin::Number);
        let string = db.builtin(Builtin::String);

        let c = ConstrainedTypeRef {
            base: TypeRef::resolved("T", int),
            constraints: vec![TypeRef::resolved("Number", number)],
        };
        assert!(c.fits_constraints(&db));

        let c = ConstrainedTypeRef {
            base: TypeRef::resolved("T", string),
            constraints: vec![TypeRef::resolved("Number", number)],
        };
        assert!(!c.fits_constraints(&db));

        let c = ConstrainedTypeRef {
            base: TypeRef::resolved("T", int),
            constraints: vec![TypeRef::resolved("Number", number), TypeRef::resolved("Number", number)],
        };
        assert!(!c.fits_constraints(&db));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn type_refs_serialize_name_and_target() {
        use crate::VariableNode;

        let db = FileDb::new();
        let int = db.builtin(Builtin::Int32);
        let field = VariableNode {
            name: "count".into(),
            ty: TypeRef::resolved("spool.core.number.Int32", int),
            constant: true,
            initializer: None,
            span: Span::new(3, 5, 40),
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["name"], "count");
        assert_eq!(json["constant"], true);
        assert_eq!(json["ty"]["name"], "spool.core.number.Int32");
        assert_eq!(json["ty"]["resolved"], serde_json::json!(int.index()));
        assert_eq!(json["span"], serde_json::json!({ "line": 3, "column": 5, "offset": 40 }));

        let pending = serde_json::to_value(TypeRef::new("Shape", Span::default())).unwrap();
        assert_eq!(pending, serde_json::json!({ "name": "Shape", "resolved": null }));
    }
}
