//! Spool AST (Abstract Syntax Tree)
//!
//! Ce crate définit les structures de données produites par le parseur et
//! consommées par la résolution de types, l’analyse sémantique et la
//! génération de bytecode.
//!
//! - nœuds sous forme d’`enum` + structs (filtrage exhaustif, pas de visiteur)
//! - [`TypeRef`] : référence de type par nom, résolue plus tard (écriture unique)
//! - [`FileDb`] : table partagée nom canonique → déclaration, pré-remplie
//!   avec les types intégrés (`spool.core.*`)
//! - [`Import`] : chemins pointés avec correspondance par suffixe
//!
//! # Features
//! - `serde` : sérialisation (`Serialize`) de l’AST pour les dumps JSON
//!
//! # Exemple
//! ```rust
//! use spool_ast::{Expr, Literal, LiteralNode, Span};
//!
//! let lit = Expr::Literal(LiteralNode { value: Literal::Int(42), span: Span::default() });
//! assert_eq!(lit.span(), Span::default());
//! ```

#![deny(missing_docs)]

use std::cell::OnceCell;

use indexmap::IndexMap;

#[cfg(feature = "serde")]
use serde::Serialize;

mod filedb;
mod import;
mod types;

pub use filedb::{Builtin, DeclRef, FileDb, FileDbError, FunctionId, HierarchyError, VariableId, MAX_HIERARCHY_DEPTH};
pub use import::Import;
pub use types::{ConstrainedTypeRef, TypeId, TypeRef, TypeRefError};

/// Localisation dans le code source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Span {
    /// Ligne de début
    pub line: u32,
    /// Colonne de début
    pub column: u32,
    /// Offset en bytes depuis le début du fichier
    pub offset: u32,
}

impl Span {
    /// Construit un nouveau `Span` à partir d'une position (ligne, colonne, offset).
    pub const fn new(line: u32, column: u32, offset: u32) -> Self {
        Self { line, column, offset }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Fichier & déclarations */
// ─────────────────────────────────────────────────────────────────────────────

/// Un fichier source analysé.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FileNode {
    /// Espace de noms (`namespace a.b`), vide si absent.
    pub namespace: String,
    /// Imports actifs : `use` du fichier puis imports par défaut.
    pub imports: Vec<Import>,
    /// Déclarations top-level, par ordre d’insertion (nom canonique → entrée FileDb).
    pub declarations: IndexMap<String, DeclRef>,
}

/// Déclaration à enregistrer dans la [`FileDb`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Decl {
    /// Classe.
    Type(TypeNode),
    /// Fonction (dont `main`).
    Function(FunctionNode),
    /// Fonction générique (refusée par la FileDb).
    GenericFunction(GenericFunctionNode),
    /// Variable globale.
    Variable(VariableNode),
}

impl Decl {
    /// Nom porté par la déclaration.
    pub fn name(&self) -> &str {
        match self {
            Self::Type(t) => &t.name,
            Self::Function(f) => &f.name,
            Self::GenericFunction(g) => &g.function.name,
            Self::Variable(v) => &v.name,
        }
    }
}

/// Déclaration de classe.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct TypeNode {
    /// Nom canonique (`espace.de.noms.Nom`).
    pub name: String,
    /// Classe fournie par la VM.
    pub native: bool,
    /// Supertype (absent seulement pour la racine `Object`).
    pub super_type: Option<TypeRef>,
    /// Champs.
    pub properties: Vec<VariableNode>,
    /// Constructeurs.
    pub constructors: Vec<ConstructorNode>,
    /// Méthodes (premier paramètre implicite `self`).
    pub functions: Vec<FunctionNode>,
    /// Localisation.
    pub span: Span,
}

/// Variable (locale, champ ou globale).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct VariableNode {
    /// Nom.
    pub name: String,
    /// Type déclaré.
    pub ty: TypeRef,
    /// `const`
    pub constant: bool,
    /// Initialiseur.
    pub initializer: Option<Expr>,
    /// Localisation.
    pub span: Span,
}

/// Paramètre `(nom, type)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Param {
    /// Nom.
    pub name: String,
    /// Type.
    pub ty: TypeRef,
}

/// Fonction ou méthode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FunctionNode {
    /// Nom.
    pub name: String,
    /// Paramètres ; pour une méthode, le premier est `self`.
    pub params: Vec<Param>,
    /// Type de retour (`-> T`).
    pub return_type: Option<TypeRef>,
    /// Corps.
    pub body: Vec<Stmt>,
    /// Méthode d’instance.
    pub instance: bool,
    /// Localisation.
    pub span: Span,
}

impl FunctionNode {
    /// Paramètres hors `self`.
    pub fn explicit_params(&self) -> &[Param] {
        if self.instance {
            self.params.get(1..).unwrap_or(&[])
        } else {
            &self.params
        }
    }
}

/// Constructeur (`self` implicite).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ConstructorNode {
    /// Paramètres explicites.
    pub params: Vec<Param>,
    /// Corps.
    pub body: Vec<Stmt>,
    /// Localisation.
    pub span: Span,
}

/// Fonction générique : point d’extension, jamais réifiée.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GenericFunctionNode {
    /// Gabarit.
    pub function: FunctionNode,
    /// Paramètres de type et leurs contraintes.
    pub type_params: Vec<ConstrainedTypeRef>,
    /// Spécialisations concrètes déjà produites.
    pub reified: Vec<FunctionNode>,
}

// ─────────────────────────────────────────────────────────────────────────────
/* Instructions */
// ─────────────────────────────────────────────────────────────────────────────

/// Instruction d’un corps.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Stmt {
    /// `var`/`const`
    Var(VariableNode),
    /// `{ ... }`
    Block(BlockNode),
    /// `if`
    If(IfNode),
    /// `loop`
    Loop(LoopNode),
    /// `next` / `break`
    Jump(JumpNode),
    /// `return`
    Return(ReturnNode),
    /// Expression seule.
    Expr(Expr),
}

/// Bloc : introduit une portée.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BlockNode {
    /// Instructions.
    pub statements: Vec<Stmt>,
    /// Localisation.
    pub span: Span,
}

/// `if (cond) { body } [else stmt]`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct IfNode {
    /// Condition (Boolean).
    pub condition: Expr,
    /// Corps.
    pub body: Vec<Stmt>,
    /// Branche `else` (bloc ou autre `if`).
    pub else_branch: Option<Box<Stmt>>,
    /// Localisation.
    pub span: Span,
}

/// `loop` ; les champs optionnels couvrent la forme C.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LoopNode {
    /// Condition de poursuite.
    pub condition: Option<Expr>,
    /// Évaluée une fois avant la boucle.
    pub pre: Option<Expr>,
    /// Évaluée en fin de tour.
    pub post: Option<Expr>,
    /// Corps.
    pub body: Vec<Stmt>,
    /// Localisation.
    pub span: Span,
}

/// Genre de saut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum JumpKind {
    /// `next` : retour au début de la boucle.
    Next,
    /// `break` : sortie de la boucle.
    Break,
}

/// `next` / `break`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct JumpNode {
    /// Genre.
    pub kind: JumpKind,
    /// Localisation.
    pub span: Span,
}

/// `return [expr]`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ReturnNode {
    /// Valeur.
    pub value: Option<Expr>,
    /// Localisation.
    pub span: Span,
}

// ─────────────────────────────────────────────────────────────────────────────
/* Expressions */
// ─────────────────────────────────────────────────────────────────────────────

/// Expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Expr {
    /// Littéral.
    Literal(LiteralNode),
    /// Identifiant.
    Id(IdNode),
    /// `source.name`
    Get(GetNode),
    /// `source.name = value`
    Set(SetNode),
    /// `name = value`
    Assignment(AssignmentNode),
    /// Opération binaire.
    Binary(BinaryNode),
    /// Opération unaire.
    Unary(UnaryNode),
    /// `new T(args)`
    ConstructorCall(ConstructorCallNode),
    /// `callee(args)`
    FunctionCall(FunctionCallNode),
    /// Appel générique explicite.
    GenericFunctionCall(GenericFunctionCallNode),
}

impl Expr {
    /// Localisation de l’expression.
    pub const fn span(&self) -> Span {
        match self {
            Self::Literal(n) => n.span,
            Self::Id(n) => n.span,
            Self::Get(n) => n.span,
            Self::Set(n) => n.span,
            Self::Assignment(n) => n.span,
            Self::Binary(n) => n.span,
            Self::Unary(n) => n.span,
            Self::ConstructorCall(n) => n.span,
            Self::FunctionCall(n) => n.span,
            Self::GenericFunctionCall(n) => n.span,
        }
    }
}

/// Valeurs littérales.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Literal {
    /// Entier 32 bits.
    Int(i32),
    /// Chaîne (sans guillemets).
    Str(String),
    /// Booléen.
    Bool(bool),
}

/// Littéral.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LiteralNode {
    /// Valeur.
    pub value: Literal,
    /// Localisation.
    pub span: Span,
}

/// Identifiant nu.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct IdNode {
    /// Nom.
    pub name: String,
    /// Localisation.
    pub span: Span,
}

/// Membre lié par l’analyse : champ ou méthode d’une classe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Member {
    /// `properties[index]` de `owner`.
    Field {
        /// Classe déclarante.
        owner: TypeId,
        /// Position du champ.
        index: usize,
    },
    /// `functions[index]` de `owner`.
    Method {
        /// Classe déclarante.
        owner: TypeId,
        /// Position de la méthode.
        index: usize,
    },
}

/// Lecture de propriété (ou cible d’appel de méthode).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GetNode {
    /// Objet source.
    pub source: Box<Expr>,
    /// Nom du membre.
    pub name: String,
    /// Localisation.
    pub span: Span,
    /// Membre lié (écrit une fois par l’analyse).
    #[cfg_attr(feature = "serde", serde(skip))]
    pub binding: OnceCell<Member>,
}

/// Écriture de propriété.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SetNode {
    /// Objet source.
    pub source: Box<Expr>,
    /// Nom du champ.
    pub name: String,
    /// Valeur.
    pub value: Box<Expr>,
    /// Localisation.
    pub span: Span,
    /// Champ lié.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub binding: OnceCell<Member>,
}

/// Affectation à une variable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AssignmentNode {
    /// Variable cible.
    pub name: String,
    /// Valeur.
    pub value: Box<Expr>,
    /// Localisation.
    pub span: Span,
}

/// Opérateurs binaires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `^`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `and`
    And,
    /// `or`
    Or,
}

impl BinaryOp {
    /// Texte source de l’opérateur.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Opérateurs unaires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

impl UnaryOp {
    /// Texte source de l’opérateur.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

/// Opération binaire.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BinaryNode {
    /// Opérande gauche.
    pub left: Box<Expr>,
    /// Opérateur.
    pub op: BinaryOp,
    /// Opérande droite.
    pub right: Box<Expr>,
    /// Localisation.
    pub span: Span,
}

/// Opération unaire.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UnaryNode {
    /// Opérateur.
    pub op: UnaryOp,
    /// Opérande.
    pub operand: Box<Expr>,
    /// Localisation.
    pub span: Span,
}

/// `new T(args)`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ConstructorCallNode {
    /// Type instancié.
    pub ty: TypeRef,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Localisation.
    pub span: Span,
    /// Index du constructeur choisi par l’analyse.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub constructor: OnceCell<usize>,
}

/// `callee(args)`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FunctionCallNode {
    /// Appelé (une chaîne `Get` dans cette grammaire).
    pub callee: Box<Expr>,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Localisation.
    pub span: Span,
}

/// Appel générique avec arguments de type explicites.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct GenericFunctionCallNode {
    /// Appelé.
    pub callee: Box<Expr>,
    /// Arguments de type.
    pub type_args: Vec<TypeRef>,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Localisation.
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_params_skip_self() {
        let p = |n: &str| Param { name: n.into(), ty: TypeRef::new("spool.core.Object", Span::default()) };
        let mut f = FunctionNode {
            name: "m".into(),
            params: vec![p("self"), p("x")],
            return_type: None,
            body: Vec::new(),
            instance: true,
            span: Span::default(),
        };
        assert_eq!(f.explicit_params().len(), 1);
        assert_eq!(f.explicit_params()[0].name, "x");
        f.instance = false;
        assert_eq!(f.explicit_params().len(), 2);
    }

    #[test]
    fn get_binding_is_write_once() {
        let get = GetNode {
            source: Box::new(Expr::Id(IdNode { name: "a".into(), span: Span::default() })),
            name: "b".into(),
            span: Span::default(),
            binding: OnceCell::new(),
        };
        let owner = FileDb::new().builtin(Builtin::Console);
        assert!(get.binding.set(Member::Field { owner, index: 0 }).is_ok());
        assert!(get.binding.set(Member::Method { owner, index: 0 }).is_err());
        assert_eq!(get.binding.get(), Some(&Member::Field { owner, index: 0 }));
    }
}
