//! Table partagée des déclarations : nom canonique → nœud.
//!
//! Les nœuds vivent dans des arènes typées ; l’index par nom pointe vers la
//! dernière déclaration enregistrée sous ce nom.

use indexmap::IndexMap;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{ConstructorNode, Decl, FunctionNode, Param, Span, TypeId, TypeNode, TypeRef, VariableNode};

/// Profondeur maximale d’une chaîne d’héritage.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Identifiant d’une fonction top-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FunctionId(u32);

/// Identifiant d’une variable globale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct VariableId(u32);

/// Entrée de l’index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum DeclRef {
    /// Classe.
    Type(TypeId),
    /// Fonction.
    Function(FunctionId),
    /// Variable.
    Variable(VariableId),
}

/// Erreurs d’enregistrement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileDbError {
    /// Seuls classes, fonctions et variables sont acceptées.
    #[error("generic function `{0}` cannot be registered")]
    UnsupportedDeclaration(String),
}

/// Erreurs de hiérarchie.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// `A : B`, `B : A`…
    #[error("cyclic inheritance involving `{0}`")]
    Cycle(String),
    /// Chaîne plus longue que [`MAX_HIERARCHY_DEPTH`].
    #[error("inheritance chain of `{0}` exceeds {MAX_HIERARCHY_DEPTH} levels")]
    TooDeep(String),
}

/// Types intégrés, dans leur ordre d’enregistrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Builtin {
    Object,
    Boolean,
    Char,
    String,
    Array,
    Func,
    Void,
    Console,
    Random,
    Number,
    Byte,
    UByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Int128,
    UInt128,
    Float32,
    Float64,
}

impl Builtin {
    /// Tous les types intégrés.
    pub const ALL: [Builtin; 22] = [
        Self::Object,
        Self::Boolean,
        Self::Char,
        Self::String,
        Self::Array,
        Self::Func,
        Self::Void,
        Self::Console,
        Self::Random,
        Self::Number,
        Self::Byte,
        Self::UByte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Int128,
        Self::UInt128,
        Self::Float32,
        Self::Float64,
    ];

    /// Nom canonique.
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::Object => "spool.core.Object",
            Self::Boolean => "spool.core.Boolean",
            Self::Char => "spool.core.Char",
            Self::String => "spool.core.String",
            Self::Array => "spool.core.Array",
            Self::Func => "spool.core.Func",
            Self::Void => "spool.core.Void",
            Self::Console => "spool.core.Console",
            Self::Random => "spool.core.Random",
            Self::Number => "spool.core.Number",
            Self::Byte => "spool.core.number.Byte",
            Self::UByte => "spool.core.number.UByte",
            Self::Int16 => "spool.core.number.Int16",
            Self::UInt16 => "spool.core.number.UInt16",
            Self::Int32 => "spool.core.number.Int32",
            Self::UInt32 => "spool.core.number.UInt32",
            Self::Int64 => "spool.core.number.Int64",
            Self::UInt64 => "spool.core.number.UInt64",
            Self::Int128 => "spool.core.number.Int128",
            Self::UInt128 => "spool.core.number.UInt128",
            Self::Float32 => "spool.core.number.Float32",
            Self::Float64 => "spool.core.number.Float64",
        }
    }

    const fn parent(self) -> Option<Builtin> {
        match self {
            Self::Object => None,
            Self::Byte
            | Self::UByte
            | Self::Int16
            | Self::UInt16
            | Self::Int32
            | Self::UInt32
            | Self::Int64
            | Self::UInt64
            | Self::Int128
            | Self::UInt128
            | Self::Float32
            | Self::Float64 => Some(Self::Number),
            _ => Some(Self::Object),
        }
    }
}

/// Base de déclarations d’une compilation.
#[derive(Debug, Clone)]
pub struct FileDb {
    types: Vec<TypeNode>,
    functions: Vec<FunctionNode>,
    variables: Vec<VariableNode>,
    index: IndexMap<String, DeclRef>,
}

impl Default for FileDb {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDb {
    /// Base pré-remplie avec les types intégrés.
    pub fn new() -> Self {
        let mut db = Self { types: Vec::new(), functions: Vec::new(), variables: Vec::new(), index: IndexMap::new() };
        for b in Builtin::ALL {
            let name = b.canonical_name();
            let super_type = b.parent().map(|p| TypeRef::resolved(p.canonical_name(), TypeId(p as u32)));
            let mut node = TypeNode {
                name: name.to_owned(),
                native: b == Builtin::Console,
                super_type,
                properties: Vec::new(),
                constructors: Vec::new(),
                functions: Vec::new(),
                span: Span::default(),
            };
            if b == Builtin::Console {
                node.constructors.push(ConstructorNode { params: Vec::new(), body: Vec::new(), span: Span::default() });
                node.functions.push(FunctionNode {
                    name: "println".into(),
                    params: vec![
                        Param { name: "self".into(), ty: TypeRef::resolved(name, TypeId(b as u32)) },
                        Param {
                            name: "value".into(),
                            ty: TypeRef::resolved(Builtin::Object.canonical_name(), TypeId(Builtin::Object as u32)),
                        },
                    ],
                    return_type: None,
                    body: Vec::new(),
                    instance: true,
                    span: Span::default(),
                });
            }
            let id = TypeId(db.types.len() as u32);
            db.types.push(node);
            db.index.insert(name.to_owned(), DeclRef::Type(id));
        }
        db
    }

    /// Enregistre `decl` sous `name` (le dernier enregistrement gagne).
    pub fn insert(&mut self, name: impl Into<String>, decl: Decl) -> Result<DeclRef, FileDbError> {
        let entry = match decl {
            Decl::Type(t) => {
                self.types.push(t);
                DeclRef::Type(TypeId(self.types.len() as u32 - 1))
            }
            Decl::Function(f) => {
                self.functions.push(f);
                DeclRef::Function(FunctionId(self.functions.len() as u32 - 1))
            }
            Decl::Variable(v) => {
                self.variables.push(v);
                DeclRef::Variable(VariableId(self.variables.len() as u32 - 1))
            }
            Decl::GenericFunction(g) => return Err(FileDbError::UnsupportedDeclaration(g.function.name)),
        };
        self.index.insert(name.into(), entry);
        Ok(entry)
    }

    /// Entrée courante pour `name`.
    pub fn lookup(&self, name: &str) -> Option<DeclRef> {
        self.index.get(name).copied()
    }

    /// Classe courante pour `name`.
    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        match self.lookup(name)? {
            DeclRef::Type(id) => Some(id),
            _ => None,
        }
    }

    /// Noms enregistrés, par ordre d’insertion.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Identifiant d’un type intégré.
    pub const fn builtin(&self, b: Builtin) -> TypeId {
        TypeId(b as u32)
    }

    /// Nœud de classe.
    pub fn type_node(&self, id: TypeId) -> &TypeNode {
        &self.types[id.index()]
    }

    /// Nom canonique d’une classe.
    pub fn type_name(&self, id: TypeId) -> &str {
        &self.type_node(id).name
    }

    /// Nœud de fonction.
    pub fn function(&self, id: FunctionId) -> &FunctionNode {
        &self.functions[id.0 as usize]
    }

    /// Nœud de variable globale.
    pub fn variable(&self, id: VariableId) -> &VariableNode {
        &self.variables[id.0 as usize]
    }

    /// Toutes les classes avec leur identifiant.
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &TypeNode)> {
        self.types.iter().enumerate().map(|(i, t)| (TypeId(i as u32), t))
    }

    /// Supertype direct résolu.
    pub fn supertype(&self, id: TypeId) -> Option<TypeId> {
        self.type_node(id).super_type.as_ref().and_then(TypeRef::get)
    }

    /// Ancêtres de `id`, du parent direct à la racine.
    pub fn ancestors(&self, id: TypeId) -> Result<Vec<TypeId>, HierarchyError> {
        let mut chain = Vec::new();
        let mut cur = self.supertype(id);
        while let Some(s) = cur {
            if s == id || chain.contains(&s) {
                return Err(HierarchyError::Cycle(self.type_name(id).to_owned()));
            }
            if chain.len() >= MAX_HIERARCHY_DEPTH {
                return Err(HierarchyError::TooDeep(self.type_name(id).to_owned()));
            }
            chain.push(s);
            cur = self.supertype(s);
        }
        Ok(chain)
    }

    /// `sub` est `sup` ou en hérite (comparaison par nom canonique).
    pub fn is_or_subtype_of(&self, sub: TypeId, sup: TypeId) -> bool {
        let target = self.type_name(sup);
        let mut cur = Some(sub);
        for _ in 0..=MAX_HIERARCHY_DEPTH {
            match cur {
                Some(t) if self.type_name(t) == target => return true,
                Some(t) => cur = self.supertype(t),
                None => return false,
            }
        }
        false
    }

    /// Sous-type de `spool.core.Number`.
    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_or_subtype_of(id, self.builtin(Builtin::Number))
    }

    /// Champ `name` de `ty` ou d’un ancêtre : `(classe déclarante, index)`.
    pub fn find_property(&self, ty: TypeId, name: &str) -> Result<Option<(TypeId, usize)>, HierarchyError> {
        for owner in std::iter::once(ty).chain(self.ancestors(ty)?) {
            if let Some(i) = self.type_node(owner).properties.iter().position(|p| p.name == name) {
                return Ok(Some((owner, i)));
            }
        }
        Ok(None)
    }

    /// Méthodes `name` de `ty` puis de ses ancêtres.
    pub fn find_methods(&self, ty: TypeId, name: &str) -> Result<Vec<(TypeId, usize)>, HierarchyError> {
        let mut found = Vec::new();
        for owner in std::iter::once(ty).chain(self.ancestors(ty)?) {
            for (i, f) in self.type_node(owner).functions.iter().enumerate() {
                if f.name == name {
                    found.push((owner, i));
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenericFunctionNode;
    use pretty_assertions::assert_eq;

    fn class(name: &str, sup: &str) -> TypeNode {
        TypeNode {
            name: name.into(),
            native: false,
            super_type: Some(TypeRef::new(sup, Span::default())),
            properties: Vec::new(),
            constructors: Vec::new(),
            functions: Vec::new(),
            span: Span::default(),
        }
    }

    fn add_class(db: &mut FileDb, name: &str, sup: &str) -> TypeId {
        match db.insert(name, Decl::Type(class(name, sup))).unwrap() {
            DeclRef::Type(id) => id,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn builtins_are_seeded() {
        let db = FileDb::new();
        assert_eq!(db.lookup_type("spool.core.Object"), Some(db.builtin(Builtin::Object)));
        assert_eq!(db.supertype(db.builtin(Builtin::Int32)), Some(db.builtin(Builtin::Number)));
        assert_eq!(db.supertype(db.builtin(Builtin::Object)), None);
        let console = db.type_node(db.builtin(Builtin::Console));
        assert!(console.native);
        assert_eq!(console.constructors.len(), 1);
        assert_eq!(console.functions[0].name, "println");
        assert!(db.is_numeric(db.builtin(Builtin::Float64)));
        assert!(!db.is_numeric(db.builtin(Builtin::String)));
    }

    #[test]
    fn subtype_walks_the_chain() {
        let mut db = FileDb::new();
        let a = add_class(&mut db, "A", "spool.core.Object");
        let b = add_class(&mut db, "B", "A");
        let c = add_class(&mut db, "C", "B");
        db.type_node(b).super_type.as_ref().unwrap().resolve(a).unwrap();
        db.type_node(c).super_type.as_ref().unwrap().resolve(b).unwrap();
        db.type_node(a).super_type.as_ref().unwrap().resolve(db.builtin(Builtin::Object)).unwrap();

        assert!(db.is_or_subtype_of(c, a));
        assert!(db.is_or_subtype_of(c, c));
        assert!(db.is_or_subtype_of(c, db.builtin(Builtin::Object)));
        assert!(!db.is_or_subtype_of(a, c));
        assert_eq!(db.ancestors(c).unwrap(), vec![b, a, db.builtin(Builtin::Object)]);
    }

    #[test]
    fn cycles_are_reported() {
        let mut db = FileDb::new();
        let a = add_class(&mut db, "A", "B");
        let b = add_class(&mut db, "B", "A");
        db.type_node(a).super_type.as_ref().unwrap().resolve(b).unwrap();
        db.type_node(b).super_type.as_ref().unwrap().resolve(a).unwrap();
        assert!(matches!(db.ancestors(a), Err(HierarchyError::Cycle(_))));
        assert!(!db.is_or_subtype_of(a, db.builtin(Builtin::Object)));
    }

    #[test]
    fn generic_functions_are_rejected() {
        let mut db = FileDb::new();
        let g = GenericFunctionNode {
            function: FunctionNode {
                name: "id".into(),
                params: Vec::new(),
                return_type: None,
                body: Vec::new(),
                instance: false,
                span: Span::default(),
            },
            type_params: Vec::new(),
            reified: Vec::new(),
        };
        assert_eq!(
            db.insert("id", Decl::GenericFunction(g)),
            Err(FileDbError::UnsupportedDeclaration("id".into()))
        );
        assert_eq!(db.lookup("id"), None);
    }

    #[test]
    fn last_registration_wins() {
        let mut db = FileDb::new();
        let first = add_class(&mut db, "X", "spool.core.Object");
        let second = add_class(&mut db, "X", "spool.core.Object");
        assert_ne!(first, second);
        assert_eq!(db.lookup_type("X"), Some(second));
    }

    #[test]
    fn inherited_members_are_found() {
        let mut db = FileDb::new();
        let mut base = class("Base", "spool.core.Object");
        base.properties.push(VariableNode {
            name: "x".into(),
            ty: TypeRef::resolved("spool.core.number.Int32", db.builtin(Builtin::Int32)),
            constant: false,
            initializer: None,
            span: Span::default(),
        });
        let base_id = match db.insert("Base", Decl::Type(base)).unwrap() {
            DeclRef::Type(id) => id,
            _ => unreachable!(),
        };
        let child = add_class(&mut db, "Child", "Base");
        db.type_node(child).super_type.as_ref().unwrap().resolve(base_id).unwrap();
        db.type_node(base_id).super_type.as_ref().unwrap().resolve(db.builtin(Builtin::Object)).unwrap();

        assert_eq!(db.find_property(child, "x").unwrap(), Some((base_id, 0)));
        assert_eq!(db.find_property(child, "y").unwrap(), None);
        assert!(db.find_methods(child, "nothing").unwrap().is_empty());
    }
}
