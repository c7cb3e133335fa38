// src/lib.rs
//! Spool Compiler - résolution, analyse sémantique, génération de bytecode
//!
//! - Entrée : sources Spool (analysées par `spool-parser` dans une [`FileDb`] partagée)
//! - Sortie : [`Unit`]s (chunks et classes), encodables au format hybride
//! - Diagnostics : erreurs syntaxiques récupérées, collectées avec `Span`
//! - Étapes : [`resolver::TypeResolver`] → [`semantic::SemanticAnalyzer`] →
//!   [`codegen::BytecodeGenerator`] → validation structurelle optionnelle
//!
//! Features :
//! - `serde` (sérialiser les options et les diagnostics)
//!
//! API principale :
//! ```ignore
//! use spool_compiler::{Compiler, CompilerOptions};
//!
//! let mut c = Compiler::new(CompilerOptions::default());
//! let id = c.add_source("hello.spool", "main { var x: Int32 = 1 }")?;
//! let units = c.compile_file(id)?;
//! let bytes = spool_core::bytecode::encode_units(&units)?;
//! ```

#![deny(missing_docs)]

pub mod codegen;
pub mod error;
pub mod resolver;
pub mod semantic;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use spool_ast::{self as ast, FileDb, FileNode};
use spool_core::{
    bytecode::{encode_units, Unit},
    helpers::validate_unit,
    SourceId,
};

pub use codegen::BytecodeGenerator;
pub use error::{BindingError, CodegenError, CompileError, ResolveError, SemanticError, TypeError};
pub use resolver::TypeResolver;
pub use semantic::SemanticAnalyzer;

/// Résultat de compilation.
pub type CompileResult<T> = Result<T, CompileError>;

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Options du compilateur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompilerOptions {
    /// Toute erreur syntaxique rejette le fichier (sinon la déclaration fautive est ignorée)
    pub strict_parse: bool,
    /// Valider chaque unité générée (indices de tables, sauts corrigés)
    pub validate_output: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { strict_parse: false, validate_output: true }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Diagnostics */
// ─────────────────────────────────────────────────────────────────────────────

/// Gravité d’un diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Severity {
    /// Alerte
    Warning,
    /// Erreur
    Error,
}

/// Un diagnostic (fichier, message, gravité, span optionnel)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Diagnostic {
    /// Gravité
    pub severity: Severity,
    /// Fichier concerné
    pub file: String,
    /// Message humain
    pub message: String,
    /// Localisation
    pub span: Option<ast::Span>,
}

impl Diagnostic {
    /// Construit une erreur
    pub fn error(file: impl Into<String>, msg: impl Into<String>, span: Option<ast::Span>) -> Self {
        Self { severity: Severity::Error, file: file.into(), message: msg.into(), span }
    }
    /// Construit un warning
    pub fn warn(file: impl Into<String>, msg: impl Into<String>, span: Option<ast::Span>) -> Self {
        Self { severity: Severity::Warning, file: file.into(), message: msg.into(), span }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.span {
            Some(span) => write!(f, "{level}: {}:{span}: {}", self.file, self.message),
            None => write!(f, "{level}: {}: {}", self.file, self.message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
/* Compiler façade */
// ─────────────────────────────────────────────────────────────────────────────

struct SourceFile {
    name: String,
    node: FileNode,
    /// `None` tant que la résolution n’a pas été tentée.
    resolved: Option<Result<(), ResolveError>>,
}

/// Le compilateur Spool : une base de déclarations partagée entre fichiers.
///
/// Tous les fichiers sont ajoutés avant la compilation, pour que chacun voie
/// les classes des autres.
pub struct Compiler {
    /// Options
    pub options: CompilerOptions,
    db: FileDb,
    files: Vec<SourceFile>,
    diags: Vec<Diagnostic>,
}

impl Compiler {
    /// Crée un compilateur
    pub fn new(options: CompilerOptions) -> Self {
        Self { options, db: FileDb::new(), files: Vec::new(), diags: Vec::new() }
    }

    /// Analyse un fichier et enregistre ses déclarations.
    ///
    /// Les erreurs syntaxiques deviennent des diagnostics, ou un échec en
    /// mode strict.
    pub fn add_source(&mut self, name: impl Into<String>, src: &str) -> CompileResult<SourceId> {
        let name = name.into();
        let id = SourceId(u32::try_from(self.files.len()).map_err(|_| CompileError::UnknownSource(u32::MAX))?);
        let parsed = spool_parser::parse_source(src, id, &mut self.db)?;
        if self.options.strict_parse {
            if let Some(first) = parsed.errors.into_iter().next() {
                return Err(first.into());
            }
        } else {
            for e in parsed.errors {
                self.diags.push(Diagnostic::error(&name, e.message, Some(e.span)));
            }
        }
        if parsed.file.declarations.is_empty() {
            self.diags.push(Diagnostic::warn(&name, "file declares nothing", None));
        }
        log::debug!("added `{name}` as source {}", id.0);
        self.files.push(SourceFile { name, node: parsed.file, resolved: None });
        Ok(id)
    }

    /// Compile un fichier ajouté : résolution, analyse, génération.
    pub fn compile_file(&mut self, id: SourceId) -> CompileResult<Vec<Unit>> {
        self.resolve_pending();
        let file = self.source(id)?;
        log::debug!("compiling `{}`", file.name);
        if let Some(Err(e)) = &file.resolved {
            return Err(e.clone().into());
        }

        SemanticAnalyzer::new(&self.db).analyze_file(&file.node).map_err(CompileError::Semantic)?;
        let units = BytecodeGenerator::new(&self.db).generate(&file.node)?;
        if self.options.validate_output {
            units.iter().try_for_each(validate_unit)?;
        }
        Ok(units)
    }

    /// Compile tous les fichiers ; un échec n’empêche pas les suivants.
    pub fn compile_all(&mut self) -> Vec<(String, CompileResult<Vec<Unit>>)> {
        (0..self.files.len())
            .filter_map(|i| u32::try_from(i).ok())
            .map(|i| {
                let result = self.compile_file(SourceId(i));
                let name = self.files.get(i as usize).map(|f| f.name.clone()).unwrap_or_default();
                (name, result)
            })
            .collect()
    }

    /// Nom d’un fichier ajouté.
    pub fn source_name(&self, id: SourceId) -> Option<&str> {
        self.files.get(id.0 as usize).map(|f| f.name.as_str())
    }

    /// AST d’un fichier ajouté.
    pub fn file(&self, id: SourceId) -> Option<&FileNode> {
        self.files.get(id.0 as usize).map(|f| &f.node)
    }

    /// Base de déclarations partagée.
    pub fn db(&self) -> &FileDb {
        &self.db
    }

    /// Récupère et vide les diagnostics accumulés
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diags)
    }

    /// Résout une seule fois chaque fichier, avant toute analyse.
    fn resolve_pending(&mut self) {
        for file in self.files.iter_mut().filter(|f| f.resolved.is_none()) {
            let result = TypeResolver::new(&self.db, &file.node).resolve_file(&file.node);
            if let Err(e) = &result {
                log::debug!("resolution of `{}` failed: {e}", file.name);
            }
            file.resolved = Some(result);
        }
    }

    fn source(&self, id: SourceId) -> CompileResult<&SourceFile> {
        self.files.get(id.0 as usize).ok_or(CompileError::UnknownSource(id.0))
    }
}

/// Compile une source isolée en mode strict.
pub fn compile_source(src: &str) -> CompileResult<Vec<Unit>> {
    let mut c = Compiler::new(CompilerOptions { strict_parse: true, ..CompilerOptions::default() });
    let id = c.add_source("<input>", src)?;
    c.compile_file(id)
}

/// Compile une source isolée et l’encode au format binaire.
pub fn compile_to_bytes(src: &str) -> CompileResult<Vec<u8>> {
    let units = compile_source(src)?;
    Ok(encode_units(&units)?)
}
