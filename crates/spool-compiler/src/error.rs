//! Erreurs typées de chaque étape et leur agrégat [`CompileError`].

use spool_ast::Span;
use spool_core::{bytecode::ChunkError, CoreError};
use spool_lexer::LexError;
use spool_parser::ParseError;

/// Échec de la résolution des types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Aucun type ne correspond au nom.
    #[error("{span}: cannot resolve type `{name}`")]
    UnknownType {
        /// Nom tel qu’écrit.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Référence déjà liée à un autre type.
    #[error("{span}: `{name}` already resolved to `{existing}`, refusing `{attempted}`")]
    Conflict {
        /// Nom tel qu’écrit.
        name: String,
        /// Cible existante.
        existing: String,
        /// Cible refusée.
        attempted: String,
        /// Localisation.
        span: Span,
    },
}

/// Référence introuvable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// Variable inconnue.
    #[error("{span}: undeclared variable `{name}`")]
    UndeclaredVariable {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Variable déjà déclarée dans la même portée.
    #[error("{span}: variable `{name}` is already declared in this scope")]
    DuplicateVariable {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Champ absent du type et de ses ancêtres.
    #[error("{span}: type `{ty}` has no property `{name}`")]
    UnknownProperty {
        /// Type source.
        ty: String,
        /// Nom demandé.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Méthode absente du type et de ses ancêtres.
    #[error("{span}: type `{ty}` has no function `{name}`")]
    UnknownFunction {
        /// Type source.
        ty: String,
        /// Nom demandé.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Référence de type jamais résolue.
    #[error("{span}: type `{name}` was not resolved")]
    UnresolvedType {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
}

/// Incompatibilité de types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// Types différents là où l’égalité est exigée.
    #[error("{span}: expected `{expected}`, found `{found}`")]
    Mismatch {
        /// Type attendu.
        expected: String,
        /// Type obtenu.
        found: String,
        /// Localisation.
        span: Span,
    },
    /// Condition non booléenne.
    #[error("{span}: condition must be `spool.core.Boolean`, found `{found}`")]
    Condition {
        /// Type obtenu.
        found: String,
        /// Localisation.
        span: Span,
    },
    /// Opérateur binaire non défini pour ces opérandes.
    #[error("{span}: operator `{op}` is not defined for `{left}` and `{right}`")]
    BinaryOperator {
        /// Opérateur.
        op: &'static str,
        /// Type gauche.
        left: String,
        /// Type droit.
        right: String,
        /// Localisation.
        span: Span,
    },
    /// Opérateur unaire non défini pour l’opérande.
    #[error("{span}: operator `{op}` is not defined for `{operand}`")]
    UnaryOperator {
        /// Opérateur.
        op: &'static str,
        /// Type de l’opérande.
        operand: String,
        /// Localisation.
        span: Span,
    },
    /// Aucun constructeur compatible.
    #[error("{span}: no constructor of `{ty}` accepts {arity} argument(s) of these types")]
    NoMatchingConstructor {
        /// Type instancié.
        ty: String,
        /// Nombre d’arguments.
        arity: usize,
        /// Localisation.
        span: Span,
    },
    /// Aucune surcharge compatible.
    #[error("{span}: no function `{name}` of `{ty}` accepts {arity} argument(s) of these types")]
    NoMatchingFunction {
        /// Type receveur.
        ty: String,
        /// Nom de la méthode.
        name: String,
        /// Nombre d’arguments.
        arity: usize,
        /// Localisation.
        span: Span,
    },
    /// Affectation d’une constante.
    #[error("{span}: cannot assign to constant `{name}`")]
    AssignToConstant {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Variable locale sans initialiseur.
    #[error("{span}: local variable `{name}` needs an initializer")]
    MissingInitializer {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// `return expr` hors d’une méthode typée.
    #[error("{span}: no value can be returned here")]
    UnexpectedReturn {
        /// Localisation.
        span: Span,
    },
    /// Chaîne d’héritage cyclique ou trop profonde.
    #[error("inheritance tree of `{ty}` is cyclic or too deep")]
    CyclicInheritance {
        /// Classe fautive.
        ty: String,
    },
    /// Construction non prise en charge.
    #[error("{span}: {what} are not supported")]
    Unsupported {
        /// Description.
        what: &'static str,
        /// Localisation.
        span: Span,
    },
}

/// Erreur de l’analyse sémantique.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticError {
    /// Liaison.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// Typage.
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Échec de la génération de bytecode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// `next`/`break` hors boucle.
    #[error("{span}: `{kind}` used outside of a loop")]
    JumpOutsideLoop {
        /// `next` ou `break`.
        kind: &'static str,
        /// Localisation.
        span: Span,
    },
    /// Redéclaration dans la même portée.
    #[error("{span}: variable `{name}` is already declared in this scope")]
    DuplicateVariable {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Variable inconnue.
    #[error("{span}: variable `{name}` is not in scope")]
    UndeclaredVariable {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Variable locale sans valeur.
    #[error("{span}: local variable `{name}` has no initializer")]
    MissingInitializer {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Référence de type non résolue.
    #[error("{span}: type `{name}` was not resolved")]
    UnresolvedType {
        /// Nom.
        name: String,
        /// Localisation.
        span: Span,
    },
    /// Appel sans cible connue.
    #[error("{span}: cannot resolve call target")]
    UnresolvedCall {
        /// Localisation.
        span: Span,
    },
    /// Construction sans forme binaire.
    #[error("{span}: {what} cannot be compiled")]
    Unsupported {
        /// Description.
        what: &'static str,
        /// Localisation.
        span: Span,
    },
    /// Trop de variables locales pour un opérande 16 bits.
    #[error("{span}: too many local variables")]
    TooManyLocals {
        /// Localisation.
        span: Span,
    },
    /// Table de chunk pleine, etc.
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Erreur globale de compilation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// Erreur lexicale.
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    /// Erreur syntaxique (mode strict).
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// Résolution des types.
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
    /// Analyse sémantique (toutes les erreurs du fichier).
    #[error("semantic analysis failed with {} error(s); first: {}", .0.len(), first_message(.0))]
    Semantic(Vec<SemanticError>),
    /// Génération.
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
    /// Encodage.
    #[error("encoding error: {0}")]
    Chunk(#[from] ChunkError),
    /// Validation structurelle de la sortie.
    #[error("invalid output: {0}")]
    Invalid(#[from] CoreError),
    /// Identifiant de fichier inconnu du compilateur.
    #[error("unknown source id {0}")]
    UnknownSource(u32),
}

impl From<SemanticError> for CompileError {
    fn from(e: SemanticError) -> Self {
        Self::Semantic(vec![e])
    }
}

impl From<BindingError> for CompileError {
    fn from(e: BindingError) -> Self {
        Self::Semantic(vec![e.into()])
    }
}

impl From<TypeError> for CompileError {
    fn from(e: TypeError) -> Self {
        Self::Semantic(vec![e.into()])
    }
}

fn first_message(errors: &[SemanticError]) -> String {
    errors.first().map_or_else(String::new, ToString::to_string)
}
