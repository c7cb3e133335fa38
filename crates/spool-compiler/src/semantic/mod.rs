//! Analyse sémantique : liaison des noms et des membres, vérification des types.
//!
//! Les erreurs s’accumulent : chaque instruction fautive produit une erreur
//! et l’analyse continue à l’instruction suivante. Le fichier est rejeté
//! dès qu’une erreur a été relevée.

mod bind;
mod check;
pub mod scope;

use spool_ast::{Builtin, ConstructorNode, DeclRef, FileDb, FileNode, FunctionNode, Param, TypeId, TypeRef, VariableNode};

use crate::error::{BindingError, SemanticError, TypeError};
use scope::{Local, Scope};

type SResult<T> = Result<T, SemanticError>;

/// Analyseur d’un fichier résolu.
pub struct SemanticAnalyzer<'a> {
    db: &'a FileDb,
    scope: Scope,
    errors: Vec<SemanticError>,
    /// Type de retour déclaré de la fonction en cours.
    returns: Option<TypeId>,
}

impl<'a> SemanticAnalyzer<'a> {
    /// Nouvel analyseur.
    pub fn new(db: &'a FileDb) -> Self {
        Self { db, scope: Scope::new(), errors: Vec::new(), returns: None }
    }

    /// Analyse toutes les déclarations de `file`.
    pub fn analyze_file(mut self, file: &FileNode) -> Result<(), Vec<SemanticError>> {
        for (name, entry) in &file.declarations {
            log::trace!("analyzing `{name}`");
            match *entry {
                DeclRef::Type(id) => self.analyze_type(id),
                DeclRef::Function(id) => self.analyze_function(self.db.function(id)),
                DeclRef::Variable(id) => self.analyze_field(self.db.variable(id)),
            }
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            log::debug!("semantic analysis found {} error(s)", self.errors.len());
            Err(self.errors)
        }
    }

    fn analyze_type(&mut self, id: TypeId) {
        let db = self.db;
        let node = db.type_node(id);
        if db.ancestors(id).is_err() {
            self.report(TypeError::CyclicInheritance { ty: node.name.clone() });
            return;
        }
        for p in &node.properties {
            self.analyze_field(p);
        }
        for c in &node.constructors {
            self.analyze_constructor(id, c);
        }
        for f in &node.functions {
            self.analyze_function(f);
        }
    }

    /// Champ ou variable globale : l’initialiseur est optionnel.
    fn analyze_field(&mut self, v: &VariableNode) {
        let Some(init) = &v.initializer else { return };
        self.scope.push();
        let checked = self.resolved(&v.ty).and_then(|ty| {
            let found = self.type_of(init)?;
            self.expect_same(ty, found, v.span)
        });
        self.scope.pop();
        if let Err(e) = checked {
            self.report(e);
        }
    }

    fn analyze_constructor(&mut self, owner: TypeId, c: &ConstructorNode) {
        self.scope.push();
        self.scope.declare("self", Local { ty: owner, constant: true });
        self.declare_params(&c.params, false);
        self.returns = None;
        self.check_body(&c.body);
        self.scope.pop();
    }

    fn analyze_function(&mut self, f: &FunctionNode) {
        self.scope.push();
        self.declare_params(&f.params, f.instance);
        self.returns = match f.return_type.as_ref().map(|r| self.resolved(r)) {
            Some(Ok(ty)) => Some(ty),
            Some(Err(e)) => {
                self.report(e);
                None
            }
            None => None,
        };
        self.check_body(&f.body);
        self.returns = None;
        self.scope.pop();
    }

    /// Le premier paramètre d’une méthode (`self`) n’est pas réaffectable.
    fn declare_params(&mut self, params: &[Param], instance: bool) {
        for (i, p) in params.iter().enumerate() {
            match self.resolved(&p.ty) {
                Ok(ty) => {
                    let local = Local { ty, constant: instance && i == 0 };
                    if !self.scope.declare(&p.name, local) {
                        self.report(BindingError::DuplicateVariable { name: p.name.clone(), span: p.ty.span });
                    }
                }
                Err(e) => self.report(e),
            }
        }
    }

    /* ─────────── Outils ─────────── */

    fn report(&mut self, e: impl Into<SemanticError>) {
        let e = e.into();
        log::debug!("{e}");
        self.errors.push(e);
    }

    fn resolved(&self, r: &TypeRef) -> SResult<TypeId> {
        r.get().ok_or_else(|| BindingError::UnresolvedType { name: r.name.clone(), span: r.span }.into())
    }

    fn builtin(&self, b: Builtin) -> TypeId {
        self.db.builtin(b)
    }

    fn name_of(&self, id: TypeId) -> String {
        self.db.type_name(id).to_owned()
    }

    /// Égalité stricte (par nom canonique).
    fn same(&self, a: TypeId, b: TypeId) -> bool {
        self.db.type_name(a) == self.db.type_name(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::TypeResolver;
    use pretty_assertions::assert_eq;
    use spool_core::SourceId;

    fn analyze(src: &str) -> Result<(), Vec<SemanticError>> {
        let mut db = FileDb::new();
        let parsed = spool_parser::parse_source(src, SourceId(0), &mut db).unwrap();
        assert_eq!(parsed.errors, vec![]);
        TypeResolver::new(&db, &parsed.file).resolve_file(&parsed.file).unwrap();
        SemanticAnalyzer::new(&db).analyze_file(&parsed.file)
    }

    fn first_error(src: &str) -> SemanticError {
        analyze(src).unwrap_err().remove(0)
    }

    #[test]
    fn well_typed_program_passes() {
        analyze(
            "class Counter {
                 var n: Int32 = 0
                 func bump(by: Int32) -> Int32 {
                     self.n = self.n + by
                     return self.n
                 }
             }
             main {
                 var c: Counter = new Counter()
                 var total: Int32 = c.bump(2)
                 if (total >= 2 and !(total == 3)) { total -= 1 }
                 loop { if (total > 10) { break } total += 1 }
                 new Console().println(\"done\")
             }",
        )
        .unwrap();
    }

    #[test]
    fn undeclared_identifier() {
        assert!(matches!(
            first_error("main { var x: Int32 = y }"),
            SemanticError::Binding(BindingError::UndeclaredVariable { ref name, .. }) if name == "y"
        ));
    }

    #[test]
    fn initializer_must_match_exactly() {
        assert!(matches!(
            first_error("main { var s: String = 1 }"),
            SemanticError::Type(TypeError::Mismatch { ref expected, ref found, .. })
                if expected == "spool.core.String" && found == "spool.core.number.Int32"
        ));
    }

    #[test]
    fn condition_must_be_boolean() {
        assert!(matches!(first_error("main { if (1) { } }"), SemanticError::Type(TypeError::Condition { .. })));
    }

    #[test]
    fn errors_accumulate_per_statement() {
        let errors = analyze("main { var a: Int32 = b var c: String = 1 var d: Int32 = 2 }").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn duplicate_locals_are_rejected_per_frame() {
        assert!(matches!(
            first_error("main { var a: Int32 = 1 var a: Int32 = 2 }"),
            SemanticError::Binding(BindingError::DuplicateVariable { .. })
        ));
        analyze("main { var a: Int32 = 1 { var a: Int32 = 2 } }").unwrap();
    }

    #[test]
    fn constants_cannot_be_assigned() {
        assert!(matches!(
            first_error("main { const a: Int32 = 1 a = 2 }"),
            SemanticError::Type(TypeError::AssignToConstant { .. })
        ));
    }

    #[test]
    fn locals_need_initializers() {
        assert!(matches!(
            first_error("main { var a: Int32 }"),
            SemanticError::Type(TypeError::MissingInitializer { .. })
        ));
    }

    #[test]
    fn cyclic_inheritance_is_an_error() {
        let errors = analyze("class A : B { } class B : A { }").unwrap_err();
        assert!(errors.iter().all(|e| matches!(e, SemanticError::Type(TypeError::CyclicInheritance { .. }))));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn arguments_accept_subtypes() {
        analyze(
            "class Animal { }
             class Dog : Animal { }
             class Vet { func treat(a: Animal) { } }
             main { new Vet().treat(new Dog()) }",
        )
        .unwrap();
        assert!(matches!(
            first_error(
                "class Animal { }
                 class Dog : Animal { }
                 class Vet { func treat(d: Dog) { } }
                 main { new Vet().treat(new Animal()) }"
            ),
            SemanticError::Type(TypeError::NoMatchingFunction { .. })
        ));
    }

    #[test]
    fn inherited_members_are_visible() {
        analyze(
            "class Base { var x: Int32 = 1 func get() -> Int32 { return self.x } }
             class Child : Base { }
             main { var c: Child = new Child() var v: Int32 = c.x + c.get() }",
        )
        .unwrap();
    }

    #[test]
    fn operator_table() {
        analyze("main { var s: String = \"a\" + \"b\" var b: Boolean = 1 < 2 }").unwrap();
        assert!(matches!(
            first_error("main { var s: String = \"a\" - \"b\" }"),
            SemanticError::Type(TypeError::BinaryOperator { op: "-", .. })
        ));
        assert!(matches!(
            first_error("main { var b: Boolean = true and 1 }"),
            SemanticError::Type(TypeError::BinaryOperator { op: "and", .. })
        ));
        assert!(matches!(
            first_error("main { var b: Boolean = -true }"),
            SemanticError::Type(TypeError::UnaryOperator { op: "-", .. })
        ));
    }

    #[test]
    fn returns_are_checked() {
        assert!(matches!(
            first_error("class A { func f() -> Int32 { return \"x\" } }"),
            SemanticError::Type(TypeError::Mismatch { .. })
        ));
        assert!(matches!(first_error("main { return 1 }"), SemanticError::Type(TypeError::UnexpectedReturn { .. })));
    }

    #[test]
    fn unknown_members() {
        assert!(matches!(
            first_error("class A { } main { var a: A = new A() var x: Int32 = a.nope }"),
            SemanticError::Binding(BindingError::UnknownProperty { .. })
        ));
        assert!(matches!(
            first_error("class A { } main { new A().nope() }"),
            SemanticError::Binding(BindingError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn constructor_binding_records_index() {
        let mut db = FileDb::new();
        let src = "class P { constructor() { } constructor(x: Int32) { } } main { var p: P = new P(3) }";
        let parsed = spool_parser::parse_source(src, SourceId(0), &mut db).unwrap();
        TypeResolver::new(&db, &parsed.file).resolve_file(&parsed.file).unwrap();
        SemanticAnalyzer::new(&db).analyze_file(&parsed.file).unwrap();
        let Some(DeclRef::Function(main)) = parsed.file.declarations.get("main").copied() else { panic!() };
        let spool_ast::Stmt::Var(v) = &db.function(main).body[0] else { panic!() };
        let Some(spool_ast::Expr::ConstructorCall(call)) = &v.initializer else { panic!() };
        assert_eq!(call.constructor.get(), Some(&1));
    }
}
