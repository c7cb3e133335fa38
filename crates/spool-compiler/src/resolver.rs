//! Résolution des [`TypeRef`] d’un fichier.
//!
//! Ordre de recherche pour un nom : imports du fichier (premier suffixe
//! correspondant), puis `<namespace>.<nom>`, puis le nom exact. La première
//! erreur arrête la résolution du fichier.

use spool_ast::{
    ConstrainedTypeRef, ConstructorNode, DeclRef, Expr, FileDb, FileNode, FunctionNode, GenericFunctionNode, Import,
    Stmt, TypeId, TypeNode, TypeRef, VariableNode,
};

use crate::error::ResolveError;

type RResult = Result<(), ResolveError>;

/// Passe de résolution des types.
pub struct TypeResolver<'a> {
    db: &'a FileDb,
    imports: &'a [Import],
    namespace: &'a str,
}

impl<'a> TypeResolver<'a> {
    /// Résolveur pour `file`.
    pub fn new(db: &'a FileDb, file: &'a FileNode) -> Self {
        Self { db, imports: &file.imports, namespace: &file.namespace }
    }

    /// Résout toutes les déclarations du fichier.
    pub fn resolve_file(&self, file: &FileNode) -> RResult {
        for (name, entry) in &file.declarations {
            log::trace!("resolving `{name}`");
            match *entry {
                DeclRef::Type(id) => self.resolve_type_node(self.db.type_node(id))?,
                DeclRef::Function(id) => self.resolve_function(self.db.function(id))?,
                DeclRef::Variable(id) => self.resolve_variable(self.db.variable(id))?,
            }
        }
        Ok(())
    }

    /// Cherche le type désigné par `name`.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        if let Some(import) = self.imports.iter().find(|i| i.ends_with(name)) {
            return self.db.lookup_type(&import.name());
        }
        if !self.namespace.is_empty() {
            if let Some(id) = self.db.lookup_type(&format!("{}.{name}", self.namespace)) {
                return Some(id);
            }
        }
        self.db.lookup_type(name)
    }

    fn resolve_ref(&self, r: &TypeRef) -> RResult {
        let id = self.lookup(&r.name).ok_or_else(|| ResolveError::UnknownType { name: r.name.clone(), span: r.span })?;
        r.resolve(id).map_err(|e| ResolveError::Conflict {
            name: e.name,
            existing: self.db.type_name(e.existing).to_owned(),
            attempted: self.db.type_name(e.attempted).to_owned(),
            span: r.span,
        })
    }

    fn resolve_type_node(&self, node: &TypeNode) -> RResult {
        if let Some(sup) = &node.super_type {
            self.resolve_ref(sup)?;
        }
        for p in &node.properties {
            self.resolve_variable(p)?;
        }
        for c in &node.constructors {
            self.resolve_constructor(c)?;
        }
        for f in &node.functions {
            self.resolve_function(f)?;
        }
        Ok(())
    }

    fn resolve_variable(&self, v: &VariableNode) -> RResult {
        self.resolve_ref(&v.ty)?;
        if let Some(init) = &v.initializer {
            self.resolve_expr(init)?;
        }
        Ok(())
    }

    fn resolve_function(&self, f: &FunctionNode) -> RResult {
        for p in &f.params {
            self.resolve_ref(&p.ty)?;
        }
        if let Some(ret) = &f.return_type {
            self.resolve_ref(ret)?;
        }
        self.resolve_body(&f.body)
    }

    fn resolve_constructor(&self, c: &ConstructorNode) -> RResult {
        for p in &c.params {
            self.resolve_ref(&p.ty)?;
        }
        self.resolve_body(&c.body)
    }

    /// Résout les contraintes, le gabarit et les spécialisations d’une fonction générique.
    pub fn resolve_generic(&self, g: &GenericFunctionNode) -> RResult {
        for ConstrainedTypeRef { constraints, .. } in &g.type_params {
            for c in constraints {
                self.resolve_ref(c)?;
            }
        }
        for f in &g.reified {
            self.resolve_function(f)?;
        }
        Ok(())
    }

    fn resolve_body(&self, body: &[Stmt]) -> RResult {
        body.iter().try_for_each(|s| self.resolve_stmt(s))
    }

    fn resolve_stmt(&self, stmt: &Stmt) -> RResult {
        match stmt {
            Stmt::Var(v) => self.resolve_variable(v),
            Stmt::Block(b) => self.resolve_body(&b.statements),
            Stmt::If(i) => {
                self.resolve_expr(&i.condition)?;
                self.resolve_body(&i.body)?;
                match &i.else_branch {
                    Some(e) => self.resolve_stmt(e),
                    None => Ok(()),
                }
            }
            Stmt::Loop(l) => {
                for e in [&l.condition, &l.pre, &l.post].into_iter().flatten() {
                    self.resolve_expr(e)?;
                }
                self.resolve_body(&l.body)
            }
            Stmt::Jump(_) => Ok(()),
            Stmt::Return(r) => match &r.value {
                Some(v) => self.resolve_expr(v),
                None => Ok(()),
            },
            Stmt::Expr(e) => self.resolve_expr(e),
        }
    }

    fn resolve_expr(&self, expr: &Expr) -> RResult {
        match expr {
            Expr::Literal(_) | Expr::Id(_) => Ok(()),
            Expr::Get(g) => self.resolve_expr(&g.source),
            Expr::Set(s) => {
                self.resolve_expr(&s.source)?;
                self.resolve_expr(&s.value)
            }
            Expr::Assignment(a) => self.resolve_expr(&a.value),
            Expr::Binary(b) => {
                self.resolve_expr(&b.left)?;
                self.resolve_expr(&b.right)
            }
            Expr::Unary(u) => self.resolve_expr(&u.operand),
            Expr::ConstructorCall(c) => {
                self.resolve_ref(&c.ty)?;
                c.args.iter().try_for_each(|a| self.resolve_expr(a))
            }
            Expr::FunctionCall(c) => {
                self.resolve_expr(&c.callee)?;
                c.args.iter().try_for_each(|a| self.resolve_expr(a))
            }
            Expr::GenericFunctionCall(c) => {
                for t in &c.type_args {
                    self.resolve_ref(t)?;
                }
                self.resolve_expr(&c.callee)?;
                c.args.iter().try_for_each(|a| self.resolve_expr(a))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use spool_ast::{Builtin, Span};
    use spool_core::SourceId;

    fn parse(db: &mut FileDb, src: &str) -> FileNode {
        let parsed = spool_parser::parse_source(src, SourceId(0), db).unwrap();
        assert_eq!(parsed.errors, vec![]);
        parsed.file
    }

    #[test]
    fn short_names_resolve_through_default_imports() {
        let mut db = FileDb::new();
        let file = parse(&mut db, "main { var x: Int32 = 1 }");
        TypeResolver::new(&db, &file).resolve_file(&file).unwrap();
        let Some(DeclRef::Function(id)) = file.declarations.get("main").copied() else { panic!() };
        let Stmt::Var(v) = &db.function(id).body[0] else { panic!() };
        assert_eq!(v.ty.get(), Some(db.builtin(Builtin::Int32)));
    }

    #[test]
    fn namespace_local_classes_resolve() {
        let mut db = FileDb::new();
        let file = parse(&mut db, "namespace app class A { } class B : A { }");
        TypeResolver::new(&db, &file).resolve_file(&file).unwrap();
        let a = db.lookup_type("app.A").unwrap();
        let b = db.lookup_type("app.B").unwrap();
        assert_eq!(db.supertype(b), Some(a));
        assert_eq!(db.supertype(a), Some(db.builtin(Builtin::Object)));
    }

    #[test]
    fn unknown_type_is_reported() {
        let mut db = FileDb::new();
        let file = parse(&mut db, "main { var x: Missing = 1 }");
        let err = TypeResolver::new(&db, &file).resolve_file(&file).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownType { ref name, .. } if name == "Missing"));
    }

    #[test]
    fn generic_constraints_resolve() {
        let db = FileDb::new();
        let file = FileNode { imports: Import::default_imports(), ..FileNode::default() };
        let g = GenericFunctionNode {
            function: FunctionNode {
                name: "id".into(),
                params: Vec::new(),
                return_type: None,
                body: Vec::new(),
                instance: false,
                span: Span::default(),
            },
            type_params: vec![ConstrainedTypeRef {
                base: TypeRef::new("T", Span::default()),
                constraints: vec![TypeRef::new("Number", Span::default())],
            }],
            reified: Vec::new(),
        };
        TypeResolver::new(&db, &file).resolve_generic(&g).unwrap();
        assert_eq!(g.type_params[0].constraints[0].get(), Some(db.builtin(Builtin::Number)));
    }
}
