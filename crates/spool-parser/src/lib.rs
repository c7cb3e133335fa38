//! spool-parser : parseur du langage Spool
//!
//! Branches :
//! - `spool-lexer` pour la tokenisation
//! - `spool-ast` pour l’AST cible et la [`FileDb`] partagée
//!
//! Grammaire (essentiel) :
//! ```text
//! file        := ("namespace" path)? ("use" path)* decl*
//! decl        := "main" body
//!              | "native"? "class" ident (":" path)? "{" member* "}"
//! member      := ("var" | "const") variable
//!              | "constructor" "(" params? ")" body
//!              | "func" ident "(" params? ")" ("->" path)? body
//! variable    := ident ":" path ("=" expr)?
//! params      := ident ":" path ("," ident ":" path)*
//! body        := "{" stmt* "}"
//!
//! stmt        := ("var" | "const") variable
//!              | body
//!              | "if" "(" expr ")" body ("else" stmt)?
//!              | "loop" body
//!              | "next" | "break"
//!              | "return" expr?            (valeur sur la même ligne)
//!              | expr
//!
//! expr        := assignment
//! assignment  := or (("=" | "+=" | "-=" | "*=" | "/=" | "^=") assignment)?
//! or          := and ("or" and)*
//! and         := equality ("and" equality)*
//! equality    := relational (("==" | "!=") relational)*
//! relational  := additive (("<" | ">" | "<=" | ">=") additive)*
//! additive    := multiplicative (("+" | "-") multiplicative)*
//! multiplicative := unary (("*" | "/") unary)*
//! unary       := ("!" | "-") unary | power
//! power       := call ("^" call)*           (associatif à gauche)
//! call        := primary ("(" args? ")" | "." ident)*
//! primary     := STRING | NUMBER | BOOL | ident | "(" expr ")" | "new" path "(" args? ")"
//! args        := expr ("," expr)*           (32 au plus)
//! ```
//!
//! Reprise sur erreur : une erreur dans une déclaration top-level est
//! consignée, la déclaration est abandonnée et l’analyse reprend au prochain
//! `main` / `class` / `native`.

#![deny(missing_docs)]

use std::cell::OnceCell;

use spool_ast::{self as ast, Decl, FileDb, FileNode, Import, TypeRef};
use spool_core::{SourceId, Span};
use spool_lexer::{Keyword, LexError, Lexer, LexerOptions, Token, TokenKind};

/// Nombre maximal d’arguments d’un appel.
pub const MAX_ARGS: usize = 32;

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreur de parsing avec position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{span}: {message}")]
pub struct ParseError {
    /// Localisation du jeton fautif.
    pub span: ast::Span,
    /// Message humain.
    pub message: String,
}

impl ParseError {
    fn new(span: ast::Span, message: impl Into<String>) -> Self {
        Self { span, message: message.into() }
    }
}

type PResult<T> = Result<T, ParseError>;

/// Résultat d’un parsing : le fichier et les déclarations rejetées.
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    /// Fichier (déclarations valides seulement).
    pub file: FileNode,
    /// Une erreur par déclaration abandonnée.
    pub errors: Vec<ParseError>,
}

/// Tokenise puis parse `src`, en enregistrant les déclarations dans `db`.
///
/// Seule une erreur lexicale est fatale ; les erreurs syntaxiques sont
/// rapportées dans [`Parsed::errors`].
pub fn parse_source(src: &str, source: SourceId, db: &mut FileDb) -> Result<Parsed, LexError> {
    parse_source_with(src, source, LexerOptions::default(), db)
}

/// Variante de [`parse_source`] avec options de lexer.
pub fn parse_source_with(
    src: &str,
    source: SourceId,
    opts: LexerOptions,
    db: &mut FileDb,
) -> Result<Parsed, LexError> {
    let tokens = Lexer::with_options(src, source, opts).tokenize()?;
    Ok(Parser::new(tokens).parse(db))
}

/* ─────────────────────────── Parser ─────────────────────────── */

/// Parser Spool (un jeton d’anticipation, sans retour arrière).
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    namespace: String,
}

impl<'a> Parser<'a> {
    /// Crée un parser sur une suite de jetons.
    ///
    /// Un `Eof` est ajouté si la suite n’en finit pas par un (suite vide comprise).
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let eof = match tokens.last() {
                Some(t) => Token {
                    kind: TokenKind::Eof,
                    lexeme: "",
                    span: Span::new(t.span.source, t.span.end, t.span.end),
                    line: t.line,
                    column: t.column.saturating_add(u32::try_from(t.lexeme.len()).unwrap_or(u32::MAX)),
                },
                None => Token { kind: TokenKind::Eof, lexeme: "", span: Span::default(), line: 1, column: 1 },
            };
            tokens.push(eof);
        }
        Self { tokens, pos: 0, namespace: String::new() }
    }

    /// Parse un fichier complet et enregistre ses déclarations dans `db`.
    pub fn parse(&mut self, db: &mut FileDb) -> Parsed {
        let mut out = Parsed::default();

        if let Err(e) = self.parse_header(&mut out.file) {
            log::error!("dropping file header: {e}");
            out.errors.push(e);
            self.synchronize();
        }
        out.file.namespace.clone_from(&self.namespace);
        out.file.imports.extend(Import::default_imports());

        while !self.at_eof() {
            match self.parse_decl() {
                Ok(decl) => {
                    let name = self.qualify(decl.name());
                    log::trace!("registering `{name}`");
                    match db.insert(name.clone(), decl) {
                        Ok(entry) => {
                            out.file.declarations.insert(name, entry);
                        }
                        Err(e) => {
                            log::warn!("skipping `{name}`: {e}");
                        }
                    }
                }
                Err(e) => {
                    log::error!("dropping declaration: {e}");
                    out.errors.push(e);
                    self.synchronize();
                }
            }
        }

        log::debug!(
            "parsed {} declaration(s), {} dropped",
            out.file.declarations.len(),
            out.errors.len()
        );
        out
    }

    /* ─────────── En-tête ─────────── */

    fn parse_header(&mut self, file: &mut FileNode) -> PResult<()> {
        if self.eat_kw(Keyword::Namespace) {
            self.namespace = self.parse_path()?;
        }
        while self.eat_kw(Keyword::Use) {
            let path = self.parse_path()?;
            file.imports.push(Import::new(&path));
        }
        Ok(())
    }

    /* ─────────── Déclarations ─────────── */

    fn parse_decl(&mut self) -> PResult<Decl> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Kw(Keyword::Main) => {
                self.bump();
                let body = self.parse_body()?;
                Ok(Decl::Function(ast::FunctionNode {
                    name: "main".into(),
                    params: Vec::new(),
                    return_type: None,
                    body,
                    instance: false,
                    span: ast_span(&t),
                }))
            }
            TokenKind::Kw(Keyword::Native) => {
                self.bump();
                self.expect_kw(Keyword::Class)?;
                self.parse_class(true, ast_span(&t)).map(Decl::Type)
            }
            TokenKind::Kw(Keyword::Class) => {
                self.bump();
                self.parse_class(false, ast_span(&t)).map(Decl::Type)
            }
            _ => Err(err_here(&t, format!("expected `main`, `class` or `native class`, found `{}`", t.kind))),
        }
    }

    fn parse_class(&mut self, native: bool, span: ast::Span) -> PResult<ast::TypeNode> {
        let short = self.expect_ident()?;
        let name = self.qualify(short);
        let super_type = if self.eat(&TokenKind::Colon) {
            self.parse_type()?
        } else {
            TypeRef::new("spool.core.Object", span)
        };
        self.expect(&TokenKind::LBrace)?;

        let mut node = ast::TypeNode {
            name,
            native,
            super_type: Some(super_type),
            properties: Vec::new(),
            constructors: Vec::new(),
            functions: Vec::new(),
            span,
        };

        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let t = self.bump();
            match t.kind {
                TokenKind::Kw(Keyword::Var) => node.properties.push(self.parse_variable(false, ast_span(&t))?),
                TokenKind::Kw(Keyword::Const) => node.properties.push(self.parse_variable(true, ast_span(&t))?),
                TokenKind::Kw(Keyword::Constructor) => {
                    self.expect(&TokenKind::LParen)?;
                    let params = self.parse_params()?;
                    let body = self.parse_body()?;
                    node.constructors.push(ast::ConstructorNode { params, body, span: ast_span(&t) });
                }
                TokenKind::Kw(Keyword::Func) => {
                    let fname = self.expect_ident()?.to_owned();
                    self.expect(&TokenKind::LParen)?;
                    let mut params = vec![ast::Param {
                        name: "self".into(),
                        ty: TypeRef::new(node.name.clone(), ast_span(&t)),
                    }];
                    params.extend(self.parse_params()?);
                    let return_type = if self.eat(&TokenKind::Arrow) { Some(self.parse_type()?) } else { None };
                    let body = self.parse_body()?;
                    node.functions.push(ast::FunctionNode {
                        name: fname,
                        params,
                        return_type,
                        body,
                        instance: true,
                        span: ast_span(&t),
                    });
                }
                _ => {
                    return Err(err_here(
                        &t,
                        format!("expected `var`, `const`, `constructor` or `func`, found `{}`", t.kind),
                    ))
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(node)
    }

    /// Paramètres après `(` ; consomme `)`.
    fn parse_params(&mut self) -> PResult<Vec<ast::Param>> {
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let name = self.expect_ident()?.to_owned();
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(ast::Param { name, ty });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_variable(&mut self, constant: bool, span: ast::Span) -> PResult<ast::VariableNode> {
        let name = self.expect_ident()?.to_owned();
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let initializer = if self.eat(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
        Ok(ast::VariableNode { name, ty, constant, initializer, span })
    }

    fn parse_type(&mut self) -> PResult<TypeRef> {
        let span = ast_span(self.peek());
        Ok(TypeRef::new(self.parse_path()?, span))
    }

    fn parse_path(&mut self) -> PResult<String> {
        let mut path = self.expect_ident()?.to_owned();
        while self.eat(&TokenKind::Dot) {
            path.push('.');
            path.push_str(self.expect_ident()?);
        }
        Ok(path)
    }

    /* ─────────── Instructions ─────────── */

    /// `{ stmt* }`
    fn parse_body(&mut self) -> PResult<Vec<ast::Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<ast::Stmt> {
        let t = self.peek().clone();
        let span = ast_span(&t);
        match t.kind {
            TokenKind::Kw(Keyword::Var) => {
                self.bump();
                self.parse_variable(false, span).map(ast::Stmt::Var)
            }
            TokenKind::Kw(Keyword::Const) => {
                self.bump();
                self.parse_variable(true, span).map(ast::Stmt::Var)
            }
            TokenKind::LBrace => {
                let statements = self.parse_body()?;
                Ok(ast::Stmt::Block(ast::BlockNode { statements, span }))
            }
            TokenKind::Kw(Keyword::If) => {
                self.bump();
                self.expect(&TokenKind::LParen)?;
                let condition = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_body()?;
                let else_branch =
                    if self.eat_kw(Keyword::Else) { Some(Box::new(self.parse_stmt()?)) } else { None };
                Ok(ast::Stmt::If(ast::IfNode { condition, body, else_branch, span }))
            }
            TokenKind::Kw(Keyword::Loop) => {
                self.bump();
                let body = self.parse_body()?;
                Ok(ast::Stmt::Loop(ast::LoopNode { condition: None, pre: None, post: None, body, span }))
            }
            TokenKind::Kw(Keyword::Next) => {
                self.bump();
                Ok(ast::Stmt::Jump(ast::JumpNode { kind: ast::JumpKind::Next, span }))
            }
            TokenKind::Kw(Keyword::Break) => {
                self.bump();
                Ok(ast::Stmt::Jump(ast::JumpNode { kind: ast::JumpKind::Break, span }))
            }
            TokenKind::Kw(Keyword::Return) => {
                self.bump();
                let next = self.peek();
                let value = if next.line == t.line && next.kind != TokenKind::RBrace && next.kind != TokenKind::Eof {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(ast::Stmt::Return(ast::ReturnNode { value, span }))
            }
            _ => self.parse_expr().map(ast::Stmt::Expr),
        }
    }

    /* ─────────── Expressions ─────────── */

    /// Expression complète.
    pub fn parse_expr(&mut self) -> PResult<ast::Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<ast::Expr> {
        let target = self.parse_or()?;

        let compound = match self.peek().kind {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(ast::BinaryOp::Add),
            TokenKind::MinusAssign => Some(ast::BinaryOp::Sub),
            TokenKind::StarAssign => Some(ast::BinaryOp::Mul),
            TokenKind::SlashAssign => Some(ast::BinaryOp::Div),
            TokenKind::CaretAssign => Some(ast::BinaryOp::Pow),
            _ => return Ok(target),
        };
        let op_tok = self.bump();
        let rhs = self.parse_assignment()?;
        let span = target.span();

        let value = match compound {
            Some(op) => ast::Expr::Binary(ast::BinaryNode {
                left: Box::new(target.clone()),
                op,
                right: Box::new(rhs),
                span,
            }),
            None => rhs,
        };

        match target {
            ast::Expr::Id(id) => {
                Ok(ast::Expr::Assignment(ast::AssignmentNode { name: id.name, value: Box::new(value), span }))
            }
            ast::Expr::Get(get) => Ok(ast::Expr::Set(ast::SetNode {
                source: get.source,
                name: get.name,
                value: Box::new(value),
                span,
                binding: OnceCell::new(),
            })),
            _ => Err(err_here(&op_tok, "invalid assignment target")),
        }
    }

    fn parse_or(&mut self) -> PResult<ast::Expr> {
        let mut left = self.parse_and()?;
        while self.eat_kw(Keyword::Or) {
            let right = self.parse_and()?;
            left = binary(left, ast::BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<ast::Expr> {
        let mut left = self.parse_equality()?;
        while self.eat_kw(Keyword::And) {
            let right = self.parse_equality()?;
            left = binary(left, ast::BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<ast::Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => ast::BinaryOp::Eq,
                TokenKind::NotEq => ast::BinaryOp::Ne,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_relational()?;
            left = binary(left, op, right);
        }
    }

    fn parse_relational(&mut self) -> PResult<ast::Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => ast::BinaryOp::Lt,
                TokenKind::Gt => ast::BinaryOp::Gt,
                TokenKind::Le => ast::BinaryOp::Le,
                TokenKind::Ge => ast::BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
    }

    fn parse_additive(&mut self) -> PResult<ast::Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => ast::BinaryOp::Add,
                TokenKind::Minus => ast::BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> PResult<ast::Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => ast::BinaryOp::Mul,
                TokenKind::Slash => ast::BinaryOp::Div,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
    }

    fn parse_unary(&mut self) -> PResult<ast::Expr> {
        let op = match self.peek().kind {
            TokenKind::Bang => ast::UnaryOp::Not,
            TokenKind::Minus => ast::UnaryOp::Neg,
            _ => return self.parse_power(),
        };
        let t = self.bump();
        let operand = self.parse_unary()?;
        Ok(ast::Expr::Unary(ast::UnaryNode { op, operand: Box::new(operand), span: ast_span(&t) }))
    }

    // `^` chaîne à gauche : 2^3^2 == (2^3)^2
    fn parse_power(&mut self) -> PResult<ast::Expr> {
        let mut left = self.parse_call()?;
        while self.eat(&TokenKind::Caret) {
            let right = self.parse_call()?;
            left = binary(left, ast::BinaryOp::Pow, right);
        }
        Ok(left)
    }

    fn parse_call(&mut self) -> PResult<ast::Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::LParen) {
                let args = self.parse_args()?;
                let span = expr.span();
                expr = ast::Expr::FunctionCall(ast::FunctionCallNode { callee: Box::new(expr), args, span });
            } else if self.eat(&TokenKind::Dot) {
                let name = self.expect_ident()?.to_owned();
                let span = expr.span();
                expr = ast::Expr::Get(ast::GetNode { source: Box::new(expr), name, span, binding: OnceCell::new() });
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> PResult<ast::Expr> {
        let t = self.bump();
        let span = ast_span(&t);
        let literal = |value| Ok(ast::Expr::Literal(ast::LiteralNode { value, span }));
        match t.kind {
            TokenKind::Str(s) => literal(ast::Literal::Str(s)),
            TokenKind::Number(n) => literal(ast::Literal::Int(n)),
            TokenKind::Bool(b) => literal(ast::Literal::Bool(b)),
            TokenKind::Ident(name) => Ok(ast::Expr::Id(ast::IdNode { name: name.to_owned(), span })),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Kw(Keyword::New) => {
                let ty = self.parse_type()?;
                self.expect(&TokenKind::LParen)?;
                let args = self.parse_args()?;
                Ok(ast::Expr::ConstructorCall(ast::ConstructorCallNode {
                    ty,
                    args,
                    span,
                    constructor: OnceCell::new(),
                }))
            }
            ref other => Err(err_here(&t, format!("expected expression, found `{other}`"))),
        }
    }

    /// Arguments après `(` ; consomme `)`.
    fn parse_args(&mut self) -> PResult<Vec<ast::Expr>> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    return Err(err_here(self.peek(), format!("cannot have more than {MAX_ARGS} arguments")));
                }
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    /* ─────────── Outils ─────────── */

    fn qualify(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{name}", self.namespace)
        }
    }

    /// Saute au prochain début de déclaration (au moins un jeton).
    fn synchronize(&mut self) {
        if !self.at_eof() {
            self.bump();
        }
        while !self.at_eof()
            && !matches!(self.peek().kind, TokenKind::Kw(Keyword::Main | Keyword::Class | Keyword::Native))
        {
            self.bump();
        }
    }

    #[inline]
    fn peek(&self) -> &Token<'a> {
        // `new` garantit un `Eof` final ; on ne le dépasse jamais.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token<'a> {
        let t = self.peek().clone();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    #[inline]
    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    #[inline]
    fn check(&self, kind: &TokenKind<'_>) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind<'_>) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: Keyword) -> bool {
        self.eat(&TokenKind::Kw(kw))
    }

    fn expect(&mut self, kind: &TokenKind<'_>) -> PResult<Token<'a>> {
        if self.check(kind) {
            return Ok(self.bump());
        }
        let t = self.peek();
        Err(err_here(t, format!("expected `{kind}`, found `{}`", t.kind)))
    }

    fn expect_kw(&mut self, kw: Keyword) -> PResult<Token<'a>> {
        self.expect(&TokenKind::Kw(kw))
    }

    fn expect_ident(&mut self) -> PResult<&'a str> {
        let t = self.peek();
        if let TokenKind::Ident(s) = t.kind {
            self.bump();
            Ok(s)
        } else {
            Err(err_here(t, format!("expected identifier, found `{}`", t.kind)))
        }
    }
}

/* ─────────────────────────── Helpers ─────────────────────────── */

fn binary(left: ast::Expr, op: ast::BinaryOp, right: ast::Expr) -> ast::Expr {
    let span = left.span();
    ast::Expr::Binary(ast::BinaryNode { left: Box::new(left), op, right: Box::new(right), span })
}

fn ast_span(tok: &Token<'_>) -> ast::Span {
    ast::Span::new(tok.line, tok.column, tok.span.start.0)
}

fn err_here(tok: &Token<'_>, message: impl Into<String>) -> ParseError {
    ParseError::new(ast_span(tok), message)
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use spool_ast::{BinaryOp, DeclRef, Expr, Literal, Stmt};

    fn parse(src: &str) -> (Parsed, FileDb) {
        let mut db = FileDb::new();
        let parsed = parse_source(src, SourceId(0), &mut db).expect("lex ok");
        (parsed, db)
    }

    #[test]
    fn missing_eof_is_supplied() {
        let mut db = FileDb::new();
        let parsed = Parser::new(Vec::new()).parse(&mut db);
        assert!(parsed.errors.is_empty());
        assert!(parsed.file.declarations.is_empty());

        let mut tokens = Lexer::new("main { var x: Int32 = 1 }", SourceId(0)).tokenize().expect("lex ok");
        assert_eq!(tokens.pop().map(|t| t.kind), Some(TokenKind::Eof));
        let parsed = Parser::new(tokens).parse(&mut db);
        assert_eq!(parsed.errors, vec![]);
        assert!(parsed.file.declarations.contains_key("main"));

        let mut tokens = Lexer::new("main {", SourceId(0)).tokenize().expect("lex ok");
        tokens.pop();
        let parsed = Parser::new(tokens).parse(&mut FileDb::new());
        assert_eq!(parsed.errors.len(), 1);
    }

    fn main_body(src: &str) -> Vec<Stmt> {
        let (parsed, db) = parse(src);
        assert_eq!(parsed.errors, vec![]);
        match parsed.file.declarations.get("main") {
            Some(DeclRef::Function(id)) => db.function(*id).body.clone(),
            other => panic!("no main: {other:?}"),
        }
    }

    fn first_expr(src: &str) -> Expr {
        match main_body(src).into_iter().next() {
            Some(Stmt::Expr(e)) => e,
            Some(Stmt::Var(v)) => v.initializer.expect("initializer"),
            other => panic!("unexpected {other:?}"),
        }
    }

    fn int(e: &Expr) -> i32 {
        match e {
            Expr::Literal(l) => match l.value {
                Literal::Int(n) => n,
                ref v => panic!("not an int: {v:?}"),
            },
            other => panic!("not a literal: {other:?}"),
        }
    }

    #[test]
    fn main_with_variable() {
        let body = main_body("main { var x: spool.core.number.Int32 = 1 }");
        assert_eq!(body.len(), 1);
        let Stmt::Var(v) = &body[0] else { panic!("expected var") };
        assert_eq!(v.name, "x");
        assert_eq!(v.ty.name, "spool.core.number.Int32");
        assert!(!v.constant);
        assert_eq!(int(v.initializer.as_ref().unwrap()), 1);
    }

    #[test]
    fn power_is_left_associative() {
        let Expr::Binary(outer) = first_expr("main { 2 ^ 3 ^ 2 }") else { panic!("expected binary") };
        assert_eq!(outer.op, BinaryOp::Pow);
        assert_eq!(int(&outer.right), 2);
        let Expr::Binary(inner) = *outer.left else { panic!("expected nested binary") };
        assert_eq!((int(&inner.left), int(&inner.right)), (2, 3));
    }

    #[test]
    fn precedence_mul_over_add() {
        let Expr::Binary(add) = first_expr("main { 1 + 2 * 3 }") else { panic!() };
        assert_eq!(add.op, BinaryOp::Add);
        assert!(matches!(*add.right, Expr::Binary(ref m) if m.op == BinaryOp::Mul));
    }

    #[test]
    fn assignment_targets() {
        assert!(matches!(first_expr("main { a = 1 }"), Expr::Assignment(ref a) if a.name == "a"));
        assert!(matches!(first_expr("main { a.b = 1 }"), Expr::Set(ref s) if s.name == "b"));

        let (parsed, _) = parse("main { 1 = 2 }");
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].message.contains("invalid assignment target"));
        assert!(parsed.file.declarations.is_empty());
    }

    #[test]
    fn compound_assignment_desugars() {
        let Expr::Assignment(a) = first_expr("main { x += 2 }") else { panic!() };
        let Expr::Binary(b) = *a.value else { panic!() };
        assert_eq!(b.op, BinaryOp::Add);
        assert!(matches!(*b.left, Expr::Id(ref id) if id.name == "x"));
        assert_eq!(int(&b.right), 2);
    }

    #[test]
    fn argument_cap() {
        let args = |n: usize| (0..n).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
        let (ok, _) = parse(&format!("main {{ c.f({}) }}", args(32)));
        assert_eq!(ok.errors, vec![]);
        let (ko, _) = parse(&format!("main {{ c.f({}) }}", args(33)));
        assert_eq!(ko.errors.len(), 1);
        assert!(ko.errors[0].message.contains("more than 32"));
    }

    #[test]
    fn class_members_and_namespace() {
        let (parsed, db) = parse(
            "namespace app.geo
             use spool.core.String
             class Point : Shape {
                 var x: Int32 = 0
                 const name: String = \"p\"
                 constructor(x: Int32) { self.x = x }
                 func len(k: Int32) -> Int32 { return k }
             }",
        );
        assert_eq!(parsed.errors, vec![]);
        assert_eq!(parsed.file.namespace, "app.geo");
        assert_eq!(parsed.file.imports[0].name(), "spool.core.String");
        let Some(DeclRef::Type(id)) = parsed.file.declarations.get("app.geo.Point").copied() else {
            panic!("class not registered")
        };
        let t = db.type_node(id);
        assert_eq!(t.super_type.as_ref().unwrap().name, "Shape");
        assert_eq!(t.properties.len(), 2);
        assert!(t.properties[1].constant);
        assert_eq!(t.constructors[0].params.len(), 1);
        let f = &t.functions[0];
        assert_eq!(f.params[0].name, "self");
        assert_eq!(f.params[0].ty.name, "app.geo.Point");
        assert_eq!(f.return_type.as_ref().unwrap().name, "Int32");
        assert!(matches!(f.body[0], Stmt::Return(ref r) if r.value.is_some()));
    }

    #[test]
    fn default_supertype_is_object() {
        let (parsed, db) = parse("class A { }");
        let Some(DeclRef::Type(id)) = parsed.file.declarations.get("A").copied() else { panic!() };
        assert_eq!(db.type_node(id).super_type.as_ref().unwrap().name, "spool.core.Object");
    }

    #[test]
    fn recovery_skips_to_next_declaration() {
        let (parsed, _) = parse("class A { var } class B { } main { }");
        assert_eq!(parsed.errors.len(), 1);
        let names: Vec<_> = parsed.file.declarations.keys().cloned().collect();
        assert_eq!(names, vec!["B".to_owned(), "main".to_owned()]);
    }

    #[test]
    fn control_flow_statements() {
        let body = main_body("main { if (a) { next } else if (b) { } else { break } loop { break } return }");
        let Stmt::If(i) = &body[0] else { panic!() };
        assert!(matches!(i.else_branch.as_deref(), Some(Stmt::If(_))));
        assert!(matches!(body[1], Stmt::Loop(ref l) if l.condition.is_none() && l.body.len() == 1));
        assert!(matches!(body[2], Stmt::Return(ref r) if r.value.is_none()));
    }

    #[test]
    fn method_call_chain() {
        let Expr::FunctionCall(call) = first_expr("main { new Console().println(\"hi\") }") else { panic!() };
        let Expr::Get(get) = *call.callee else { panic!() };
        assert_eq!(get.name, "println");
        assert!(matches!(*get.source, Expr::ConstructorCall(ref c) if c.ty.name == "Console"));
        assert!(matches!(call.args[0], Expr::Literal(ref l) if l.value == Literal::Str("hi".into())));
    }

    #[test]
    fn lex_errors_are_fatal() {
        let mut db = FileDb::new();
        assert!(parse_source("main { # }", SourceId(0), &mut db).is_err());
    }
}
