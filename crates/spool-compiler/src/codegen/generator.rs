//! Émission du bytecode à partir d’un fichier résolu et analysé.
//!
//! Un `ChunkBuilder` par corps de code : il possède le chunk en cours et
//! la pile de portées qui attribue les emplacements locaux. Les sauts
//! passent par la table des sauts du chunk ; chaque point est corrigé une
//! fois sa cible émise.

use spool_ast::{
    BinaryOp, ConstructorNode, DeclRef, Expr, FileDb, FileNode, FunctionNode, IfNode, JumpKind, JumpNode, Literal,
    LoopNode, Param, Span, Stmt, TypeId, TypeNode, TypeRef, UnaryOp, VariableNode,
};
use spool_core::bytecode::{Chunk, Clazz, Constant, Instruction, Property, Unit};

use super::scope::Scope;
use crate::error::CodegenError;

type GResult<T> = Result<T, CodegenError>;

/// Générateur de bytecode d’un fichier.
pub struct BytecodeGenerator<'a> {
    db: &'a FileDb,
}

impl<'a> BytecodeGenerator<'a> {
    /// Nouveau générateur sur la base des déclarations.
    pub fn new(db: &'a FileDb) -> Self {
        Self { db }
    }

    /// Unités du fichier, dans l’ordre des déclarations.
    ///
    /// Les classes natives n’ont pas de corps et ne produisent rien ; les
    /// variables globales n’ont pas de forme binaire et sont ignorées.
    pub fn generate(&self, file: &FileNode) -> GResult<Vec<Unit>> {
        let mut units = Vec::with_capacity(file.declarations.len());
        for (name, entry) in &file.declarations {
            match *entry {
                DeclRef::Function(id) => units.push(Unit::Chunk(self.function_chunk(self.db.function(id))?)),
                DeclRef::Type(id) => {
                    let node = self.db.type_node(id);
                    if node.native {
                        log::debug!("native class `{name}` has no bytecode");
                        continue;
                    }
                    units.push(Unit::Clazz(self.clazz(id, node)?));
                }
                DeclRef::Variable(_) => log::warn!("global variable `{name}` skipped: no bytecode form"),
            }
        }
        log::debug!("generated {} unit(s)", units.len());
        Ok(units)
    }

    fn clazz(&self, id: TypeId, node: &TypeNode) -> GResult<Clazz> {
        let super_name = match self.db.supertype(id) {
            Some(sup) => self.db.type_name(sup).to_owned(),
            None => match &node.super_type {
                Some(r) => return Err(unresolved(r)),
                None => String::new(),
            },
        };
        let mut clazz = Clazz::new(node.name.clone(), super_name);
        for p in &node.properties {
            clazz.properties.push(Property {
                constant: p.constant,
                name: p.name.clone(),
                type_name: self.type_name(&p.ty)?,
            });
        }
        if node.constructors.is_empty() {
            clazz.constructors.push(self.constructor_chunk(node, None)?);
        }
        for c in &node.constructors {
            clazz.constructors.push(self.constructor_chunk(node, Some(c))?);
        }
        for f in &node.functions {
            clazz.methods.push(self.function_chunk(f)?);
        }
        Ok(clazz)
    }

    fn function_chunk(&self, f: &FunctionNode) -> GResult<Chunk> {
        let chunk = if !f.instance && f.name == "main" { Chunk::main() } else { Chunk::function(f.name.clone()) };
        let mut b = ChunkBuilder::new(self.db, chunk);
        for (i, p) in f.params.iter().enumerate() {
            // `self` est implicite côté appelant.
            let receiver = f.instance && i == 0;
            b.param(p, !receiver)?;
        }
        b.statements(&f.body)?;
        b.finish()
    }

    /// Constructeur explicite, ou implicite (`ctor = None`) : les
    /// initialiseurs de champs passent avant le corps.
    fn constructor_chunk(&self, owner: &TypeNode, ctor: Option<&ConstructorNode>) -> GResult<Chunk> {
        let mut b = ChunkBuilder::new(self.db, Chunk::constructor());
        let span = ctor.map_or(owner.span, |c| c.span);
        b.declare("self", span)?;
        if let Some(c) = ctor {
            for p in &c.params {
                b.param(p, true)?;
            }
        }
        for field in &owner.properties {
            b.field_init(field)?;
        }
        if let Some(c) = ctor {
            b.statements(&c.body)?;
        }
        b.finish()
    }

    fn type_name(&self, r: &TypeRef) -> GResult<String> {
        r.get().map(|id| self.db.type_name(id).to_owned()).ok_or_else(|| unresolved(r))
    }
}

/* ─────────── Chunk en cours ─────────── */

struct ChunkBuilder<'a> {
    db: &'a FileDb,
    chunk: Chunk,
    scope: Scope,
}

impl<'a> ChunkBuilder<'a> {
    /// Le corps vit dans une portée enfant de la racine.
    fn new(db: &'a FileDb, chunk: Chunk) -> Self {
        let mut scope = Scope::new();
        scope.push();
        Self { db, chunk, scope }
    }

    fn finish(mut self) -> GResult<Chunk> {
        let count = self.scope.size();
        self.exit_block(count, Span::default())?;
        Ok(self.chunk)
    }

    fn emit(&mut self, ins: Instruction) {
        self.chunk.push(ins);
    }

    fn declare(&mut self, name: &str, span: Span) -> GResult<()> {
        if !self.scope.declare(name) {
            return Err(CodegenError::DuplicateVariable { name: name.to_owned(), span });
        }
        self.chunk.names.add(name)?;
        Ok(())
    }

    fn param(&mut self, p: &Param, listed: bool) -> GResult<()> {
        self.declare(&p.name, p.ty.span)?;
        if listed {
            let ty = p.ty.get().ok_or_else(|| unresolved(&p.ty))?;
            self.chunk.params.push(self.db.type_name(ty).to_owned());
        }
        Ok(())
    }

    fn field_init(&mut self, field: &VariableNode) -> GResult<()> {
        let Some(init) = &field.initializer else { return Ok(()) };
        self.expr(init)?;
        let this = self.slot("self", field.span)?;
        self.emit(Instruction::Get { index: this, constant: false });
        let name = self.chunk.names.add(&field.name)?;
        self.emit(Instruction::InstanceSet { name });
        Ok(())
    }

    fn slot(&self, name: &str, span: Span) -> GResult<u16> {
        let index = self
            .scope
            .index_of(name)
            .ok_or_else(|| CodegenError::UndeclaredVariable { name: name.to_owned(), span })?;
        u16::try_from(index).map_err(|_| CodegenError::TooManyLocals { span })
    }

    fn exit_block(&mut self, count: usize, span: Span) -> GResult<()> {
        let count = u16::try_from(count).map_err(|_| CodegenError::TooManyLocals { span })?;
        self.emit(Instruction::ExitBlock { count });
        Ok(())
    }

    /// Fait pointer `point` sur la prochaine instruction.
    fn land(&mut self, point: u16) -> GResult<()> {
        let here = self.chunk.next_index()?;
        self.chunk.jumps.patch(point, here)?;
        Ok(())
    }

    /* ─────────── Instructions ─────────── */

    fn statements(&mut self, body: &[Stmt]) -> GResult<()> {
        body.iter().try_for_each(|s| self.stmt(s))
    }

    fn block(&mut self, body: &[Stmt], span: Span) -> GResult<()> {
        self.scope.push();
        self.statements(body)?;
        let count = self.scope.pop();
        self.exit_block(count, span)
    }

    fn stmt(&mut self, stmt: &Stmt) -> GResult<()> {
        match stmt {
            Stmt::Var(v) => self.local(v),
            Stmt::Block(b) => self.block(&b.statements, b.span),
            Stmt::If(i) => self.if_stmt(i),
            Stmt::Loop(l) => self.loop_stmt(l),
            Stmt::Jump(j) => self.jump(j),
            Stmt::Return(r) => {
                if let Some(value) = &r.value {
                    self.expr(value)?;
                }
                self.emit(Instruction::Return);
                Ok(())
            }
            Stmt::Expr(e) => self.expr(e),
        }
    }

    fn local(&mut self, v: &VariableNode) -> GResult<()> {
        let init = v
            .initializer
            .as_ref()
            .ok_or_else(|| CodegenError::MissingInitializer { name: v.name.clone(), span: v.span })?;
        self.expr(init)?;
        self.declare(&v.name, v.span)?;
        self.emit(Instruction::Declare { mutable: !v.constant });
        Ok(())
    }

    /// `cond; LOGIC_NEGATE; JUMP(suite, vrai); corps` puis, avec `else`,
    /// un saut inconditionnel par-dessus la branche alternative.
    fn if_stmt(&mut self, node: &IfNode) -> GResult<()> {
        let skip = self.chunk.jumps.add_point()?;
        self.expr(&node.condition)?;
        self.emit(Instruction::LogicNegate);
        self.emit(Instruction::Jump { point: skip, conditional: true });
        self.block(&node.body, node.span)?;

        match &node.else_branch {
            None => self.land(skip),
            Some(other) => {
                let end = self.chunk.jumps.add_point()?;
                self.emit(Instruction::Jump { point: end, conditional: false });
                self.land(skip)?;
                self.stmt(other)?;
                self.land(end)
            }
        }
    }

    fn loop_stmt(&mut self, node: &LoopNode) -> GResult<()> {
        if let Some(pre) = &node.pre {
            self.expr(pre)?;
        }
        let start = self.chunk.jumps.add_point()?;
        let end = self.chunk.jumps.add_point()?;
        self.land(start)?;
        if let Some(cond) = &node.condition {
            self.expr(cond)?;
            self.emit(Instruction::LogicNegate);
            self.emit(Instruction::Jump { point: end, conditional: true });
        }

        self.scope.push_loop(start, end);
        self.statements(&node.body)?;
        if let Some(post) = &node.post {
            self.expr(post)?;
        }
        let count = self.scope.pop();
        self.exit_block(count, node.span)?;

        self.emit(Instruction::Jump { point: start, conditional: false });
        self.land(end)
    }

    fn jump(&mut self, node: &JumpNode) -> GResult<()> {
        let kind = match node.kind {
            JumpKind::Next => "next",
            JumpKind::Break => "break",
        };
        let (start, end) = self.scope.loop_points().ok_or(CodegenError::JumpOutsideLoop { kind, span: node.span })?;
        let point = if node.kind == JumpKind::Next { start } else { end };
        self.emit(Instruction::Jump { point, conditional: false });
        Ok(())
    }

    /* ─────────── Expressions ─────────── */

    fn expr(&mut self, expr: &Expr) -> GResult<()> {
        match expr {
            Expr::Literal(l) => {
                let constant = match &l.value {
                    Literal::Bool(true) => {
                        self.emit(Instruction::GetTrue);
                        return Ok(());
                    }
                    Literal::Bool(false) => {
                        self.emit(Instruction::GetFalse);
                        return Ok(());
                    }
                    Literal::Int(n) => Constant::Int(*n),
                    Literal::Str(s) => Constant::Str(s.clone()),
                };
                let index = self.chunk.constants.add(constant)?;
                self.emit(Instruction::Get { index, constant: true });
            }
            Expr::Id(id) => {
                let index = self.slot(&id.name, id.span)?;
                self.emit(Instruction::Get { index, constant: false });
            }
            Expr::Get(g) => {
                self.expr(&g.source)?;
                let name = self.chunk.names.add(&g.name)?;
                self.emit(Instruction::InstanceGet { name });
            }
            Expr::Set(s) => {
                self.expr(&s.value)?;
                self.expr(&s.source)?;
                let name = self.chunk.names.add(&s.name)?;
                self.emit(Instruction::InstanceSet { name });
            }
            Expr::Assignment(a) => {
                self.expr(&a.value)?;
                let slot = self.slot(&a.name, a.span)?;
                self.emit(Instruction::Set { slot });
            }
            Expr::Binary(b) => {
                self.expr(&b.right)?;
                self.expr(&b.left)?;
                self.emit(binary(b.op));
            }
            Expr::Unary(u) => {
                self.expr(&u.operand)?;
                self.emit(match u.op {
                    UnaryOp::Neg => Instruction::NumNegate,
                    UnaryOp::Not => Instruction::LogicNegate,
                });
            }
            Expr::ConstructorCall(c) => {
                for arg in &c.args {
                    self.expr(arg)?;
                }
                let ty = c.ty.get().ok_or_else(|| unresolved(&c.ty))?;
                let name = self.chunk.names.add(self.db.type_name(ty))?;
                self.emit(Instruction::GetType { name });
                let ctor = c
                    .constructor
                    .get()
                    .and_then(|&i| u16::try_from(i).ok())
                    .ok_or(CodegenError::UnresolvedCall { span: c.span })?;
                self.emit(Instruction::New { ctor });
            }
            Expr::FunctionCall(c) => {
                let Expr::Get(callee) = c.callee.as_ref() else {
                    return Err(CodegenError::UnresolvedCall { span: c.span });
                };
                for arg in &c.args {
                    self.expr(arg)?;
                }
                self.expr(&callee.source)?;
                let name = self.chunk.names.add(&callee.name)?;
                self.emit(Instruction::CallInstance { name });
            }
            Expr::GenericFunctionCall(c) => {
                return Err(CodegenError::Unsupported { what: "generic function calls", span: c.span });
            }
        }
        Ok(())
    }
}

const fn binary(op: BinaryOp) -> Instruction {
    match op {
        BinaryOp::Add => Instruction::Add,
        BinaryOp::Sub => Instruction::Subtract,
        BinaryOp::Mul => Instruction::Multiply,
        BinaryOp::Div => Instruction::Divide,
        BinaryOp::Pow => Instruction::Power,
        BinaryOp::Eq => Instruction::Eq,
        BinaryOp::Ne => Instruction::NotEq,
        BinaryOp::Lt => Instruction::Less,
        BinaryOp::Le => Instruction::LessEq,
        BinaryOp::Gt => Instruction::Greater,
        BinaryOp::Ge => Instruction::GreaterEq,
        BinaryOp::And => Instruction::And,
        BinaryOp::Or => Instruction::Or,
    }
}

fn unresolved(r: &TypeRef) -> CodegenError {
    CodegenError::UnresolvedType { name: r.name.clone(), span: r.span }
}

/* ─────────── Tests ─────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::TypeResolver, semantic::SemanticAnalyzer};
    use pretty_assertions::assert_eq;
    use spool_core::{bytecode::ChunkKind, SourceId};
    use Instruction::*;

    fn generate(src: &str) -> GResult<Vec<Unit>> {
        let mut db = FileDb::new();
        let parsed = spool_parser::parse_source(src, SourceId(0), &mut db).unwrap();
        assert_eq!(parsed.errors, vec![]);
        TypeResolver::new(&db, &parsed.file).resolve_file(&parsed.file).unwrap();
        SemanticAnalyzer::new(&db).analyze_file(&parsed.file).unwrap();
        BytecodeGenerator::new(&db).generate(&parsed.file)
    }

    /// Résolu mais non analysé : les appels ne sont pas liés.
    fn generate_unchecked(src: &str) -> GResult<Vec<Unit>> {
        let mut db = FileDb::new();
        let parsed = spool_parser::parse_source(src, SourceId(0), &mut db).unwrap();
        TypeResolver::new(&db, &parsed.file).resolve_file(&parsed.file).unwrap();
        BytecodeGenerator::new(&db).generate(&parsed.file)
    }

    fn main_chunk(units: &[Unit]) -> &Chunk {
        units
            .iter()
            .find_map(|u| match u {
                Unit::Chunk(c) if c.kind == ChunkKind::Main => Some(c),
                _ => None,
            })
            .unwrap()
    }

    fn clazz<'u>(units: &'u [Unit], name: &str) -> &'u Clazz {
        units
            .iter()
            .find_map(|u| match u {
                Unit::Clazz(c) if c.name == name => Some(c),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn single_local() {
        let units = generate("main { var x: spool.core.number.Int32 = 1 }").unwrap();
        let main = main_chunk(&units);
        assert_eq!(main.code, vec![Get { index: 0, constant: true }, Declare { mutable: true }, ExitBlock { count: 1 }]);
        assert_eq!(main.constants.as_slice(), &[Constant::Int(1)]);
        assert_eq!(main.names.as_slice(), &["x".to_owned()]);
    }

    #[test]
    fn constants_and_operands_order() {
        let units = generate("main { const a: Int32 = 2 var b: Int32 = a - 1 }").unwrap();
        let main = main_chunk(&units);
        assert_eq!(
            main.code,
            vec![
                Get { index: 0, constant: true },
                Declare { mutable: false },
                Get { index: 1, constant: true },
                Get { index: 0, constant: false },
                Subtract,
                Declare { mutable: true },
                ExitBlock { count: 2 },
            ]
        );
    }

    #[test]
    fn if_without_else() {
        let units = generate("main { var x: Int32 = 1 if (x > 0) { x = 2 } }").unwrap();
        let main = main_chunk(&units);
        assert_eq!(
            main.code,
            vec![
                Get { index: 0, constant: true },
                Declare { mutable: true },
                Get { index: 1, constant: true },
                Get { index: 0, constant: false },
                Greater,
                LogicNegate,
                Jump { point: 0, conditional: true },
                Get { index: 2, constant: true },
                Set { slot: 0 },
                ExitBlock { count: 0 },
                ExitBlock { count: 1 },
            ]
        );
        assert_eq!(main.jumps.as_slice(), &[Some(10)]);
    }

    #[test]
    fn if_else_patches_both_points() {
        let units = generate("main { if (true) { var a: Int32 = 1 } else { var b: Int32 = 2 } }").unwrap();
        let main = main_chunk(&units);
        assert_eq!(
            main.code,
            vec![
                GetTrue,
                LogicNegate,
                Jump { point: 0, conditional: true },
                Get { index: 0, constant: true },
                Declare { mutable: true },
                ExitBlock { count: 1 },
                Jump { point: 1, conditional: false },
                Get { index: 1, constant: true },
                Declare { mutable: true },
                ExitBlock { count: 1 },
                ExitBlock { count: 0 },
            ]
        );
        // La branche vraie saute par-dessus le saut de sortie.
        assert_eq!(main.jumps.as_slice(), &[Some(7), Some(10)]);
    }

    #[test]
    fn loop_with_break_and_next() {
        let units =
            generate("main { var i: Int32 = 0 loop { i += 1 if (i < 3) { next } break } }").unwrap();
        let main = main_chunk(&units);
        assert_eq!(
            main.code,
            vec![
                Get { index: 0, constant: true },
                Declare { mutable: true },
                // début (point 0)
                Get { index: 1, constant: true },
                Get { index: 0, constant: false },
                Add,
                Set { slot: 0 },
                Get { index: 2, constant: true },
                Get { index: 0, constant: false },
                Less,
                LogicNegate,
                Jump { point: 2, conditional: true },
                Jump { point: 0, conditional: false },
                ExitBlock { count: 0 },
                Jump { point: 1, conditional: false },
                ExitBlock { count: 0 },
                Jump { point: 0, conditional: false },
                // fin (point 1)
                ExitBlock { count: 1 },
            ]
        );
        assert_eq!(main.jumps.as_slice(), &[Some(2), Some(16), Some(13)]);
    }

    #[test]
    fn nested_slots_count_every_ancestor() {
        let units = generate("main { var a: Int32 = 1 { var b: Int32 = 2 { var c: Int32 = a } } }").unwrap();
        let main = main_chunk(&units);
        assert!(main.code.contains(&Get { index: 0, constant: false }));
        assert_eq!(main.code.iter().filter(|i| matches!(i, ExitBlock { count: 1 })).count(), 3);
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let err = generate("main { break }").unwrap_err();
        assert!(matches!(err, CodegenError::JumpOutsideLoop { kind: "break", .. }));
        let err = generate("main { if (true) { next } }").unwrap_err();
        assert!(matches!(err, CodegenError::JumpOutsideLoop { kind: "next", .. }));
    }

    #[test]
    fn class_layout() {
        let units = generate(
            "class Counter {
                 var n: Int32 = 5
                 const label: String
                 func add(by: Int32) -> Int32 { return self.n + by }
             }",
        )
        .unwrap();
        let c = clazz(&units, "Counter");
        assert_eq!(c.super_name, "spool.core.Object");
        assert_eq!(
            c.properties,
            vec![
                Property { constant: false, name: "n".into(), type_name: "spool.core.number.Int32".into() },
                Property { constant: true, name: "label".into(), type_name: "spool.core.String".into() },
            ]
        );

        // Constructeur implicite : initialiseurs de champs uniquement.
        assert_eq!(c.constructors.len(), 1);
        let ctor = &c.constructors[0];
        assert_eq!(ctor.kind, ChunkKind::Constructor);
        assert_eq!(
            ctor.code,
            vec![Get { index: 0, constant: true }, Get { index: 0, constant: false }, InstanceSet { name: 1 }, ExitBlock {
                count: 1
            }]
        );
        assert_eq!(ctor.names.as_slice(), &["self".to_owned(), "n".to_owned()]);

        let add = &c.methods[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.params, vec!["spool.core.number.Int32".to_owned()]);
        assert_eq!(
            add.code,
            vec![
                Get { index: 1, constant: false },
                Get { index: 0, constant: false },
                InstanceGet { name: 2 },
                Add,
                Return,
                ExitBlock { count: 2 },
            ]
        );
    }

    #[test]
    fn explicit_constructor_runs_field_inits_first() {
        let units = generate(
            "class P {
                 var x: Int32 = 0
                 constructor(v: Int32) { self.x = v }
             }
             main { var p: P = new P(4) }",
        )
        .unwrap();
        let ctor = &clazz(&units, "P").constructors[0];
        assert_eq!(ctor.params, vec!["spool.core.number.Int32".to_owned()]);
        assert_eq!(
            ctor.code,
            vec![
                Get { index: 0, constant: true },
                Get { index: 0, constant: false },
                InstanceSet { name: 2 },
                Get { index: 1, constant: false },
                Get { index: 0, constant: false },
                InstanceSet { name: 2 },
                ExitBlock { count: 2 },
            ]
        );

        let main = main_chunk(&units);
        assert_eq!(
            main.code,
            vec![
                Get { index: 0, constant: true },
                GetType { name: 0 },
                New { ctor: 0 },
                Declare { mutable: true },
                ExitBlock { count: 1 },
            ]
        );
        assert_eq!(main.names.as_slice(), &["P".to_owned(), "p".to_owned()]);
    }

    #[test]
    fn method_calls_push_args_then_receiver() {
        let units = generate("main { new Console().println(\"hi\") }").unwrap();
        let main = main_chunk(&units);
        assert_eq!(
            main.code,
            vec![
                Get { index: 0, constant: true },
                GetType { name: 0 },
                New { ctor: 0 },
                CallInstance { name: 1 },
                ExitBlock { count: 0 },
            ]
        );
        assert_eq!(main.names.as_slice(), &["spool.core.Console".to_owned(), "println".to_owned()]);
        assert_eq!(main.constants.as_slice(), &[Constant::Str("hi".into())]);
        // Classe native : aucune unité.
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn unbound_constructor_call_is_rejected() {
        let err = generate_unchecked("class A { } main { var a: A = new A() }").unwrap_err();
        assert!(matches!(err, CodegenError::UnresolvedCall { .. }));
    }

    #[test]
    fn locals_need_initializers() {
        let err = generate_unchecked("main { var a: Int32 }").unwrap_err();
        assert!(matches!(err, CodegenError::MissingInitializer { .. }));
    }

    #[test]
    fn redeclaration_in_same_block_is_rejected() {
        let err = generate_unchecked("main { var a: Int32 = 1 var a: Int32 = 2 }").unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateVariable { .. }));
    }

    #[test]
    fn booleans_and_unary_ops() {
        let units = generate("main { var b: Boolean = !false var n: Int32 = -3 }").unwrap();
        let main = main_chunk(&units);
        assert_eq!(
            main.code,
            vec![
                GetFalse,
                LogicNegate,
                Declare { mutable: true },
                Get { index: 0, constant: true },
                NumNegate,
                Declare { mutable: true },
                ExitBlock { count: 2 },
            ]
        );
    }
}
