//! Vérification des instructions et typage des expressions.

use spool_ast::{BinaryNode, BinaryOp, Builtin, Expr, Literal, Span, Stmt, TypeId, UnaryNode, UnaryOp, VariableNode};

use super::{scope::Local, SResult, SemanticAnalyzer};
use crate::error::{BindingError, TypeError};

impl SemanticAnalyzer<'_> {
    /// Chaque instruction fautive est consignée ; les suivantes sont vérifiées.
    pub(super) fn check_body(&mut self, body: &[Stmt]) {
        for stmt in body {
            if let Err(e) = self.check_stmt(stmt) {
                self.report(e);
            }
        }
    }

    fn check_scoped(&mut self, body: &[Stmt]) {
        self.scope.push();
        self.check_body(body);
        self.scope.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> SResult<()> {
        match stmt {
            Stmt::Var(v) => self.check_local(v),
            Stmt::Block(b) => {
                self.check_scoped(&b.statements);
                Ok(())
            }
            Stmt::If(i) => {
                if let Err(e) = self.expect_condition(&i.condition) {
                    self.report(e);
                }
                self.check_scoped(&i.body);
                match &i.else_branch {
                    Some(other) => self.check_stmt(other),
                    None => Ok(()),
                }
            }
            Stmt::Loop(l) => {
                if let Some(pre) = &l.pre {
                    if let Err(e) = self.type_of(pre) {
                        self.report(e);
                    }
                }
                if let Some(cond) = &l.condition {
                    if let Err(e) = self.expect_condition(cond) {
                        self.report(e);
                    }
                }
                self.scope.push();
                self.check_body(&l.body);
                let post = l.post.as_ref().map(|p| self.type_of(p));
                self.scope.pop();
                post.transpose().map(drop)
            }
            Stmt::Jump(_) => Ok(()),
            Stmt::Return(r) => {
                let found = r.value.as_ref().map(|v| self.type_of(v)).transpose()?;
                match (self.returns, found) {
                    (None, None) => Ok(()),
                    (None, Some(_)) => Err(TypeError::UnexpectedReturn { span: r.span }.into()),
                    (Some(expected), None) => Err(TypeError::Mismatch {
                        expected: self.name_of(expected),
                        found: self.name_of(self.builtin(Builtin::Void)),
                        span: r.span,
                    }
                    .into()),
                    (Some(expected), Some(found)) => self.expect_same(expected, found, r.span),
                }
            }
            Stmt::Expr(e) => self.type_of(e).map(drop),
        }
    }

    /// Variable locale : déclarée même si l’initialiseur est fautif.
    fn check_local(&mut self, v: &VariableNode) -> SResult<()> {
        let ty = self.resolved(&v.ty)?;
        let checked = match &v.initializer {
            None => Err(TypeError::MissingInitializer { name: v.name.clone(), span: v.span }.into()),
            Some(init) => self.type_of(init).and_then(|found| self.expect_same(ty, found, v.span)),
        };
        if !self.scope.declare(&v.name, Local { ty, constant: v.constant }) {
            self.report(BindingError::DuplicateVariable { name: v.name.clone(), span: v.span });
        }
        checked
    }

    fn expect_condition(&mut self, cond: &Expr) -> SResult<()> {
        let found = self.type_of(cond)?;
        if self.same(found, self.builtin(Builtin::Boolean)) {
            Ok(())
        } else {
            Err(TypeError::Condition { found: self.name_of(found), span: cond.span() }.into())
        }
    }

    pub(super) fn expect_same(&self, expected: TypeId, found: TypeId, span: Span) -> SResult<()> {
        if self.same(expected, found) {
            Ok(())
        } else {
            Err(TypeError::Mismatch { expected: self.name_of(expected), found: self.name_of(found), span }.into())
        }
    }

    /// Type statique d’une expression (et liaison des membres rencontrés).
    pub(super) fn type_of(&mut self, expr: &Expr) -> SResult<TypeId> {
        match expr {
            Expr::Literal(l) => Ok(self.builtin(match l.value {
                Literal::Int(_) => Builtin::Int32,
                Literal::Str(_) => Builtin::String,
                Literal::Bool(_) => Builtin::Boolean,
            })),
            Expr::Id(id) => self
                .scope
                .lookup(&id.name)
                .map(|l| l.ty)
                .ok_or_else(|| BindingError::UndeclaredVariable { name: id.name.clone(), span: id.span }.into()),
            Expr::Get(g) => self.bind_get(g),
            Expr::Set(s) => self.bind_set(s),
            Expr::Assignment(a) => {
                let local = self
                    .scope
                    .lookup(&a.name)
                    .ok_or_else(|| BindingError::UndeclaredVariable { name: a.name.clone(), span: a.span })?;
                if local.constant {
                    return Err(TypeError::AssignToConstant { name: a.name.clone(), span: a.span }.into());
                }
                let found = self.type_of(&a.value)?;
                self.expect_same(local.ty, found, a.span)?;
                Ok(found)
            }
            Expr::Binary(b) => {
                let left = self.type_of(&b.left)?;
                let right = self.type_of(&b.right)?;
                self.binary_type(b, left, right)
            }
            Expr::Unary(u) => {
                let operand = self.type_of(&u.operand)?;
                self.unary_type(u, operand)
            }
            Expr::ConstructorCall(c) => self.bind_constructor(c),
            Expr::FunctionCall(c) => self.bind_call(c),
            Expr::GenericFunctionCall(c) => {
                Err(TypeError::Unsupported { what: "generic function calls", span: c.span }.into())
            }
        }
    }

    fn binary_type(&self, node: &BinaryNode, left: TypeId, right: TypeId) -> SResult<TypeId> {
        let boolean = self.builtin(Builtin::Boolean);
        let result = if self.same(left, right) {
            match node.op {
                BinaryOp::Add if self.db.is_numeric(left) || self.same(left, self.builtin(Builtin::String)) => {
                    Some(left)
                }
                BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow if self.db.is_numeric(left) => Some(left),
                BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge if self.db.is_numeric(left) => Some(boolean),
                BinaryOp::Eq | BinaryOp::Ne => Some(boolean),
                BinaryOp::And | BinaryOp::Or if self.same(left, boolean) => Some(boolean),
                _ => None,
            }
        } else {
            None
        };
        result.ok_or_else(|| {
            TypeError::BinaryOperator {
                op: node.op.symbol(),
                left: self.name_of(left),
                right: self.name_of(right),
                span: node.span,
            }
            .into()
        })
    }

    fn unary_type(&self, node: &UnaryNode, operand: TypeId) -> SResult<TypeId> {
        let ok = match node.op {
            UnaryOp::Neg => self.db.is_numeric(operand),
            UnaryOp::Not => self.same(operand, self.builtin(Builtin::Boolean)),
        };
        if ok {
            Ok(operand)
        } else {
            Err(TypeError::UnaryOperator { op: node.op.symbol(), operand: self.name_of(operand), span: node.span }.into())
        }
    }
}
