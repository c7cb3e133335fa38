//! Liaison des membres : champs, méthodes et constructeurs.
//!
//! La cible retenue est écrite sur le nœud (`GetNode::binding`,
//! `SetNode::binding`, `ConstructorCallNode::constructor`) pour que la
//! génération n’ait pas à refaire la recherche.

use spool_ast::{Builtin, ConstructorCallNode, Expr, FunctionCallNode, GetNode, Member, Param, SetNode, TypeId};

use super::{SResult, SemanticAnalyzer};
use crate::error::{BindingError, TypeError};

impl SemanticAnalyzer<'_> {
    pub(super) fn bind_get(&mut self, get: &GetNode) -> SResult<TypeId> {
        let db = self.db;
        let source = self.type_of(&get.source)?;
        let (owner, index) = self.find_field(source, &get.name, get.span)?;
        let _ = get.binding.set(Member::Field { owner, index });
        self.resolved(&db.type_node(owner).properties[index].ty)
    }

    pub(super) fn bind_set(&mut self, set: &SetNode) -> SResult<TypeId> {
        let db = self.db;
        let source = self.type_of(&set.source)?;
        let (owner, index) = self.find_field(source, &set.name, set.span)?;
        let field = &db.type_node(owner).properties[index];
        if field.constant {
            return Err(TypeError::AssignToConstant { name: set.name.clone(), span: set.span }.into());
        }
        let expected = self.resolved(&field.ty)?;
        let found = self.type_of(&set.value)?;
        self.expect_same(expected, found, set.span)?;
        let _ = set.binding.set(Member::Field { owner, index });
        Ok(found)
    }

    /// Appel de méthode : l’appelé doit être une chaîne `source.nom`.
    pub(super) fn bind_call(&mut self, call: &FunctionCallNode) -> SResult<TypeId> {
        let db = self.db;
        let Expr::Get(get) = call.callee.as_ref() else {
            return Err(TypeError::Unsupported { what: "free function calls", span: call.span }.into());
        };
        let receiver = self.type_of(&get.source)?;
        let candidates = db
            .find_methods(receiver, &get.name)
            .map_err(|_| TypeError::CyclicInheritance { ty: self.name_of(receiver) })?;
        if candidates.is_empty() {
            return Err(BindingError::UnknownFunction {
                ty: self.name_of(receiver),
                name: get.name.clone(),
                span: get.span,
            }
            .into());
        }

        let args = self.arg_types(&call.args)?;
        for (owner, index) in candidates {
            let f = &db.type_node(owner).functions[index];
            if self.accepts(f.explicit_params(), &args) {
                let _ = get.binding.set(Member::Method { owner, index });
                return match &f.return_type {
                    Some(r) => self.resolved(r),
                    None => Ok(self.builtin(Builtin::Void)),
                };
            }
        }
        Err(TypeError::NoMatchingFunction {
            ty: self.name_of(receiver),
            name: get.name.clone(),
            arity: args.len(),
            span: call.span,
        }
        .into())
    }

    /// Une classe non native sans constructeur accepte `new T()`.
    pub(super) fn bind_constructor(&mut self, call: &ConstructorCallNode) -> SResult<TypeId> {
        let db = self.db;
        let ty = self.resolved(&call.ty)?;
        let node = db.type_node(ty);
        let args = self.arg_types(&call.args)?;

        let matched = if node.constructors.is_empty() && !node.native {
            args.is_empty().then_some(0)
        } else {
            node.constructors.iter().position(|c| self.accepts(&c.params, &args))
        };
        match matched {
            Some(index) => {
                let _ = call.constructor.set(index);
                Ok(ty)
            }
            None => Err(TypeError::NoMatchingConstructor { ty: node.name.clone(), arity: args.len(), span: call.span }
                .into()),
        }
    }

    fn arg_types(&mut self, args: &[Expr]) -> SResult<Vec<TypeId>> {
        args.iter().map(|a| self.type_of(a)).collect()
    }

    /// Même arité, et chaque argument est le type du paramètre ou en hérite.
    fn accepts(&self, params: &[Param], args: &[TypeId]) -> bool {
        params.len() == args.len()
            && params.iter().zip(args).all(|(p, &arg)| p.ty.get().is_some_and(|want| self.db.is_or_subtype_of(arg, want)))
    }

    fn find_field(&self, ty: TypeId, name: &str, span: spool_ast::Span) -> SResult<(TypeId, usize)> {
        match self.db.find_property(ty, name) {
            Ok(Some(found)) => Ok(found),
            Ok(None) => Err(BindingError::UnknownProperty { ty: self.name_of(ty), name: name.to_owned(), span }.into()),
            Err(_) => Err(TypeError::CyclicInheritance { ty: self.name_of(ty) }.into()),
        }
    }
}
