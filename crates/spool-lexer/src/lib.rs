//! spool-lexer : analyse lexicale pour Spool
//!
//! Faits saillants :
//! - `Lexer` + `LexerOptions` : commentaires `//` et `/* */` (imbriqués), identifiants/mots-clés,
//!   entiers décimaux 32 bits, chaînes avec échappements simples, booléens `true`/`false`
//! - opérateurs gloutons : `+=` avant `+`, `==` avant `=`, `<=` avant `<`, `->` avant `-`…
//! - `Span`/`SourceId` + **LineMap** pour `(ligne, colonne)`
//! - toute entrée non reconnue lève une [`LexError`] (jamais ignorée silencieusement)
//!
//! Exemple éclair :
//! ```
//! use spool_lexer::{lex, TokenKind};
//!
//! let toks = lex("a+=1").unwrap();
//! assert_eq!(toks[1].kind, TokenKind::PlusAssign);
//! ```

#![deny(missing_docs)]

use core::fmt;

use spool_core::{Pos, SourceId, Span};

/* ─────────────────────────── Options & LineMap ─────────────────────────── */

/// Options du lexer.
#[derive(Debug, Clone, Copy)]
pub struct LexerOptions {
    /// Ignorer les commentaires ligne `// ...`.
    pub line_comments: bool,
    /// Ignorer les commentaires blocs `/* ... */` (imbriqués).
    pub block_comments: bool,
}

impl Default for LexerOptions {
    fn default() -> Self { Self { line_comments: true, block_comments: true } }
}

/// Débuts de lignes d’un fichier `.spool`, pour situer les diagnostics.
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Offset de chaque début de ligne ; le premier vaut 0.
    pub line_starts: Vec<u32>,
}

impl LineMap {
    /// Relève les `\n` de la source.
    pub fn new(src: &str) -> Self {
        let mut ls = Vec::with_capacity(64);
        ls.push(0);
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                ls.push(to_u32(i) + 1);
            }
        }
        Self { line_starts: ls }
    }

    /// Ligne et colonne (à partir de 1) d’un offset.
    pub fn line_col(&self, pos: Pos) -> (u32, u32) {
        let off = pos.0;
        let idx = match self.line_starts.binary_search(&off) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[idx];
        (to_u32(idx) + 1, off.saturating_sub(line_start) + 1)
    }
}

/* ─────────────────────────── Tokens ─────────────────────────── */

/// Mots réservés de Spool. `true`/`false` sont lexés en [`TokenKind::Bool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// `func` : déclare une méthode (ou une fonction top-level).
    Func,
    /// `class` : ouvre une déclaration de classe.
    Class,
    /// `new T(args)` : appel de constructeur.
    New,
    /// `constructor(params)` dans le corps d’une classe.
    Constructor,
    /// `var` : variable mutable (locale, champ ou globale).
    Var,
    /// `const` : variable non réassignable.
    Const,
    /// `namespace a.b` : préfixe des noms canoniques du fichier.
    Namespace,
    /// `use a.b.C` : import d’un type.
    Use,
    /// `native class` : classe implémentée par la VM.
    Native,
    /// `if (cond)`
    If,
    /// `else`, suivi d’une instruction (bloc ou autre `if`).
    Else,
    /// `loop { … }` : boucle sans condition, quittée par `break`.
    Loop,
    /// `next` : reprend la boucle courante.
    Next,
    /// `break` : quitte la boucle courante.
    Break,
    /// `return [expr]`
    Return,
    /// `main { … }` : point d’entrée.
    Main,
    /// `and` logique sur `Boolean`.
    And,
    /// `or` logique sur `Boolean`.
    Or,
}

impl Keyword {
    /// Texte source du mot-clé.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Func => "func",
            Self::Class => "class",
            Self::New => "new",
            Self::Constructor => "constructor",
            Self::Var => "var",
            Self::Const => "const",
            Self::Namespace => "namespace",
            Self::Use => "use",
            Self::Native => "native",
            Self::If => "if",
            Self::Else => "else",
            Self::Loop => "loop",
            Self::Next => "next",
            Self::Break => "break",
            Self::Return => "return",
            Self::Main => "main",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Genre de jeton lexical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// Toujours le dernier jeton produit par [`Lexer::tokenize`].
    Eof,
    /// Nom de variable, de membre ou segment de type (`spool`, `Int32`…).
    Ident(&'a str),
    /// Mot réservé.
    Kw(Keyword),
    /// Entier décimal ; au-delà de `i32::MAX` c’est une erreur.
    Number(i32),
    /// Littéral chaîne (décodée, sans guillemets).
    Str(String),
    /// `true` / `false`.
    Bool(bool),
    /// `(` : paramètres, arguments, conditions et groupement.
    LParen,
    /// `)`
    RParen,
    /// `{` : ouvre un bloc ou un corps de classe.
    LBrace,
    /// `}`
    RBrace,
    /// `[` (réservé aux tableaux).
    LBracket,
    /// `]`
    RBracket,
    /// `,` entre paramètres ou arguments.
    Comma,
    /// `.` : accès membre et chemins qualifiés.
    Dot,
    /// `:` : annotation de type ou supertype.
    Colon,
    /// `->` : type de retour d’une méthode.
    Arrow,
    /// `+` : addition numérique ou concaténation de `String`.
    Plus,
    /// `+=`, réécrit par le parser en `x = x + e`.
    PlusAssign,
    /// `-` binaire, ou négation numérique en préfixe.
    Minus,
    /// `-=`
    MinusAssign,
    /// `*`
    Star,
    /// `*=`
    StarAssign,
    /// `/`
    Slash,
    /// `/=`
    SlashAssign,
    /// `^` : puissance, associative à gauche.
    Caret,
    /// `^=`
    CaretAssign,
    /// `=` : initialisation ou affectation.
    Assign,
    /// `==` sur deux valeurs de même type.
    EqEq,
    /// `!` : négation logique.
    Bang,
    /// `!=`
    NotEq,
    /// `<` numérique.
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eof => "end of file",
            Self::Ident(s) => return write!(f, "identifier `{s}`"),
            Self::Kw(k) => return write!(f, "`{}`", k.as_str()),
            Self::Number(n) => return write!(f, "number {n}"),
            Self::Str(s) => return write!(f, "string {s:?}"),
            Self::Bool(b) => return write!(f, "`{b}`"),
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBrace => "`{`",
            Self::RBrace => "`}`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::Comma => "`,`",
            Self::Dot => "`.`",
            Self::Colon => "`:`",
            Self::Arrow => "`->`",
            Self::Plus => "`+`",
            Self::PlusAssign => "`+=`",
            Self::Minus => "`-`",
            Self::MinusAssign => "`-=`",
            Self::Star => "`*`",
            Self::StarAssign => "`*=`",
            Self::Slash => "`/`",
            Self::SlashAssign => "`/=`",
            Self::Caret => "`^`",
            Self::CaretAssign => "`^=`",
            Self::Assign => "`=`",
            Self::EqEq => "`==`",
            Self::Bang => "`!`",
            Self::NotEq => "`!=`",
            Self::Lt => "`<`",
            Self::Le => "`<=`",
            Self::Gt => "`>`",
            Self::Ge => "`>=`",
        };
        f.write_str(s)
    }
}

/// Jeton : genre, texte source brut, span et position (ligne/colonne 1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Genre.
    pub kind: TokenKind<'a>,
    /// Texte source exact (vide pour `Eof`).
    pub lexeme: &'a str,
    /// Localisation.
    pub span: Span,
    /// Ligne (1-based).
    pub line: u32,
    /// Colonne (1-based, en octets).
    pub column: u32,
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Genre d’erreur lexicale.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexErrorKind {
    /// Caractère inattendu.
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    /// Commentaire bloc non terminé.
    #[error("unterminated block comment")]
    UnterminatedBlockComment,
    /// Chaîne non terminée.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// Séquence d’échappement invalide.
    #[error("invalid escape sequence `\\{0}`")]
    InvalidEscape(char),
    /// Dépassement entier i32.
    #[error("integer literal `{0}` overflows a 32-bit integer")]
    IntOverflow(String),
}

/// Erreur lexicale avec localisation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: {kind}")]
pub struct LexError {
    /// Localisation.
    pub span: Span,
    /// Ligne (1-based).
    pub line: u32,
    /// Colonne (1-based).
    pub column: u32,
    /// Genre d’erreur.
    pub kind: LexErrorKind,
}

/* ─────────────────────────── Lexer ─────────────────────────── */

/// Tokenise toute la source avec les options par défaut (ajoute `Eof` final).
pub fn lex(src: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(src, SourceId::default()).tokenize()
}

/// Analyseur lexical (itératif).
pub struct Lexer<'a> {
    src: &'a str,
    /// Position courante en bytes.
    off: usize,
    /// Id de la source.
    source: SourceId,
    /// Options.
    opts: LexerOptions,
    /// Table des lignes (exposée pour diagnostics).
    pub lines: LineMap,
}

impl<'a> Lexer<'a> {
    /// Crée un lexer avec options par défaut.
    pub fn new(src: &'a str, source: SourceId) -> Self {
        Self::with_options(src, source, LexerOptions::default())
    }

    /// Crée un lexer avec `LexerOptions`.
    pub fn with_options(src: &'a str, source: SourceId, opts: LexerOptions) -> Self {
        Self { src, off: 0, source, opts, lines: LineMap::new(src) }
    }

    /// Prochain jeton ; `Eof` est renvoyé indéfiniment en fin de source.
    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        self.skip_ws_and_comments()?;
        let start = self.off;
        let Some(c) = self.bump() else {
            return Ok(self.token(TokenKind::Eof, start));
        };

        let kind = match c {
            ch if is_ident_start(ch) => {
                self.consume_while(is_ident_continue);
                let s = &self.src[start..self.off];
                match s {
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    _ => keyword_of(s).map_or(TokenKind::Ident(s), TokenKind::Kw),
                }
            }
            ch if ch.is_ascii_digit() => {
                self.consume_while(|c| c.is_ascii_digit());
                let raw = &self.src[start..self.off];
                let v = raw
                    .parse::<i32>()
                    .map_err(|_| self.err_from(start, LexErrorKind::IntOverflow(raw.to_owned())))?;
                TokenKind::Number(v)
            }
            '"' => TokenKind::Str(self.lex_string(start)?),

            '+' => if self.eat('=') { TokenKind::PlusAssign } else { TokenKind::Plus },
            '-' => {
                if self.eat('=') { TokenKind::MinusAssign } else if self.eat('>') { TokenKind::Arrow } else { TokenKind::Minus }
            }
            '*' => if self.eat('=') { TokenKind::StarAssign } else { TokenKind::Star },
            '/' => if self.eat('=') { TokenKind::SlashAssign } else { TokenKind::Slash },
            '^' => if self.eat('=') { TokenKind::CaretAssign } else { TokenKind::Caret },
            '=' => if self.eat('=') { TokenKind::EqEq } else { TokenKind::Assign },
            '!' => if self.eat('=') { TokenKind::NotEq } else { TokenKind::Bang },
            '<' => if self.eat('=') { TokenKind::Le } else { TokenKind::Lt },
            '>' => if self.eat('=') { TokenKind::Ge } else { TokenKind::Gt },

            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,

            other => return Err(self.err_from(start, LexErrorKind::UnexpectedChar(other))),
        };

        Ok(self.token(kind, start))
    }

    /// Tokenise toute la source (ajoute `Eof` final).
    pub fn tokenize(mut self) -> Result<Vec<Token<'a>>, LexError> {
        let mut out = Vec::new();
        loop {
            let t = self.next_token()?;
            let is_eof = t.kind == TokenKind::Eof;
            out.push(t);
            if is_eof {
                break;
            }
        }
        #[cfg(feature = "trace")]
        log::trace!("lexed {} tokens from source {}", out.len(), self.source.0);
        Ok(out)
    }

    /* ────────── Primitives internes ────────── */

    #[inline]
    fn peek(&self) -> Option<char> { self.src[self.off..].chars().next() }
    #[inline]
    fn peek2(&self) -> Option<char> { self.src[self.off..].chars().nth(1) }
    #[inline]
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.off += c.len_utf8();
        Some(c)
    }
    #[inline]
    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.off += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn consume_while(&mut self, mut p: impl FnMut(char) -> bool) {
        while let Some(c) = self.peek() {
            if !p(c) {
                break;
            }
            self.off += c.len_utf8();
        }
    }

    fn skip_ws_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            self.consume_while(char::is_whitespace);
            if self.opts.line_comments && self.peek() == Some('/') && self.peek2() == Some('/') {
                self.consume_while(|c| c != '\n');
                continue;
            }
            if self.opts.block_comments && self.peek() == Some('/') && self.peek2() == Some('*') {
                let start = self.off;
                self.off += 2;
                let mut depth = 1u32;
                while depth > 0 {
                    match (self.peek(), self.peek2()) {
                        (None, _) => return Err(self.err_from(start, LexErrorKind::UnterminatedBlockComment)),
                        (Some('/'), Some('*')) => {
                            self.off += 2;
                            depth += 1;
                        }
                        (Some('*'), Some('/')) => {
                            self.off += 2;
                            depth -= 1;
                        }
                        (Some(c), _) => self.off += c.len_utf8(),
                    }
                }
                continue;
            }
            return Ok(());
        }
    }

    fn lex_string(&mut self, start_quote: usize) -> Result<String, LexError> {
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| self.err_from(start_quote, LexErrorKind::UnterminatedString))?;
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let esc = self.bump().ok_or_else(|| self.err_from(start_quote, LexErrorKind::UnterminatedString))?;
                    match esc {
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        other => return Err(self.err_from(self.off - 2, LexErrorKind::InvalidEscape(other))),
                    }
                }
                other => out.push(other),
            }
        }
    }

    /* ────────── Spans / erreurs ────────── */

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.source, Pos(to_u32(start)), Pos(to_u32(self.off)))
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        let span = self.span_from(start);
        let (line, column) = self.lines.line_col(span.start);
        Token { kind, lexeme: &self.src[start..self.off], span, line, column }
    }

    fn err_from(&self, start: usize, kind: LexErrorKind) -> LexError {
        let span = self.span_from(start);
        let (line, column) = self.lines.line_col(span.start);
        LexError { span, line, column, kind }
    }
}

/* ─────────────────────────── Helpers ─────────────────────────── */

#[inline]
fn is_ident_start(c: char) -> bool { c.is_alphabetic() }

#[inline]
fn is_ident_continue(c: char) -> bool { c.is_alphabetic() || c.is_ascii_digit() }

#[allow(clippy::cast_possible_truncation)]
#[inline]
const fn to_u32(v: usize) -> u32 { if v > u32::MAX as usize { u32::MAX } else { v as u32 } }

#[inline]
fn keyword_of(s: &str) -> Option<Keyword> {
    use Keyword::{And, Break, Class, Const, Constructor, Else, Func, If, Loop, Main, Namespace, Native, New, Next, Or, Return, Use, Var};
    Some(match s {
        "func" => Func,
        "class" => Class,
        "new" => New,
        "constructor" => Constructor,
        "var" => Var,
        "const" => Const,
        "namespace" => Namespace,
        "use" => Use,
        "native" => Native,
        "if" => If,
        "else" => Else,
        "loop" => Loop,
        "next" => Next,
        "break" => Break,
        "return" => Return,
        "main" => Main,
        "and" => And,
        "or" => Or,
        _ => return None,
    })
}

/* ─────────────────────────── Tests ─────────────────────────── */
