//! Recursive-descent parser.
//!
//! Every production hands its pieces to [`Sema`], which builds and checks
//! the node on the spot. Syntax errors are reported and the parser
//! resynchronises at the next statement or top-level declaration, so one
//! run reports as much as possible.

use thiserror::Error;
use tracing::debug;

use crate::ast::{AssignOp, BinaryOp, KeywordKind, Node, NodeId, UnaryOp};
use crate::error::{Diag, DiagKind, FatalError, Pos, SemanticError};
use crate::lexer::{tokenize, Tok, Token};
use crate::parser_support::{check_variadic_position, resolve_param_list, ParamEntry};
use crate::sema::{CompositeElem, Loc, ParamGroup, Sema, VarName};
use crate::value::{ConstValue, LitKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("syntax error: unexpected {found}, expected {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
        loc: Loc,
    },
    #[error("syntax error: {message}")]
    Invalid { message: &'static str, loc: Loc },
    #[error("{what} are not supported")]
    Unsupported { what: &'static str, loc: Loc },
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl ParseError {
    pub fn diag(&self) -> Diag {
        match self {
            ParseError::Unexpected { loc, .. } | ParseError::Invalid { loc, .. } => {
                Diag::error(DiagKind::Syntax, loc.span, loc.pos, self.to_string())
            }
            ParseError::Unsupported { what, loc } => SemanticError::Unsupported {
                what: (*what).to_string(),
            }
            .at(loc.span, loc.pos),
            ParseError::Fatal(f) => f.diag(),
        }
    }
}

type PResult<T> = Result<T, ParseError>;

/// Result of a simple statement; a lone expression is only a statement
/// once the caller knows it is not a condition.
enum Simple {
    Expr(NodeId),
    Stmts(Vec<NodeId>),
    Range(NodeId),
}

pub struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    idx: usize,
    prev: Loc,
    /// Below zero inside `if`/`for` headers, where `T {` opens the body.
    expr_lev: i32,
    last_error: Option<Pos>,
    pub sema: Sema,
}

/// Lexes and parses `src`, returning the file node.
pub fn parse(src: &str, mut sema: Sema) -> (NodeId, Sema) {
    let (tokens, lex_diags) = tokenize(src);
    debug!(tokens = tokens.len(), lex_errors = lex_diags.len(), "lexed");
    sema.diags.extend(lex_diags);
    let mut parser = Parser::new(tokens, sema);
    let root = parser.parse_file();
    debug!(nodes = parser.sema.ast.len(), "parsed");
    (root, parser.sema)
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token<'src>>, sema: Sema) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| !matches!(t.tok, Tok::Error))
            .collect();
        Self {
            tokens,
            idx: 0,
            prev: Loc::default(),
            expr_lev: 0,
            last_error: None,
            sema,
        }
    }

    pub fn into_sema(self) -> Sema {
        self.sema
    }

    // -------------------------------------------------------------------------
    // Token cursor
    // -------------------------------------------------------------------------

    #[inline]
    fn peek(&self) -> Option<&Tok<'src>> {
        self.tokens.get(self.idx).map(|t| &t.tok)
    }

    #[inline]
    fn peek_at(&self, n: usize) -> Option<&Tok<'src>> {
        self.tokens.get(self.idx + n).map(|t| &t.tok)
    }

    #[inline]
    fn at(&self, tok: &Tok<'src>) -> bool {
        self.peek() == Some(tok)
    }

    fn loc(&self) -> Loc {
        match self.tokens.get(self.idx) {
            Some(t) => Loc::new(t.span, t.pos),
            None => Loc::new(crate::error::Span::empty_at(self.prev.span.end as usize), self.prev.pos),
        }
    }

    fn bump(&mut self) -> Loc {
        let loc = self.loc();
        if self.idx < self.tokens.len() {
            self.idx += 1;
        }
        self.prev = loc;
        loc
    }

    fn eat(&mut self, tok: &Tok<'src>) -> bool {
        if self.at(tok) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok<'src>, expected: &'static str) -> PResult<Loc> {
        if self.at(tok) {
            Ok(self.bump())
        } else {
            self.unexpected(expected)
        }
    }

    fn unexpected<T>(&self, expected: &'static str) -> PResult<T> {
        let found = match self.tokens.get(self.idx) {
            None => "EOF".to_string(),
            Some(t) if t.is_synthesized_semi() => "newline".to_string(),
            Some(t) => t.tok.to_string(),
        };
        Err(ParseError::Unexpected {
            found,
            expected,
            loc: self.loc(),
        })
    }

    fn unsupported<T>(&self, what: &'static str) -> PResult<T> {
        Err(ParseError::Unsupported { what, loc: self.loc() })
    }

    fn skip_semis(&mut self) {
        while self.eat(&Tok::Semi) {}
    }

    fn ident(&mut self) -> PResult<VarName> {
        match self.peek() {
            Some(&Tok::Ident(name)) => {
                let loc = self.bump();
                Ok(VarName::new(name, loc))
            }
            _ => self.unexpected("name"),
        }
    }

    fn ident_list(&mut self) -> PResult<Vec<VarName>> {
        let mut names = vec![self.ident()?];
        while self.eat(&Tok::Comma) {
            names.push(self.ident()?);
        }
        Ok(names)
    }

    // -------------------------------------------------------------------------
    // Error recovery
    // -------------------------------------------------------------------------

    fn report(&mut self, err: ParseError) {
        let diag = err.diag();
        if diag.kind == DiagKind::Syntax && self.last_error == Some(diag.pos) {
            return;
        }
        self.last_error = Some(diag.pos);
        self.sema.push_diag(diag);
    }

    /// Skips to just past the next `;` of the current block, or to its
    /// closing `}`.
    fn sync_stmt(&mut self) {
        let mut depth = 0u32;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::LBrace => depth += 1,
                Tok::RBrace if depth == 0 => return,
                Tok::RBrace => depth -= 1,
                Tok::Semi if depth == 0 => {
                    self.bump();
                    return;
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Skips to the next top-level declaration keyword.
    fn sync_top(&mut self) {
        let mut depth = 0u32;
        let mut line_start = self
            .idx
            .checked_sub(1)
            .is_some_and(|i| matches!(self.tokens[i].tok, Tok::Semi));
        while let Some(tok) = self.peek() {
            match tok {
                Tok::KwFunc | Tok::KwVar | Tok::KwConst | Tok::KwType | Tok::KwImport
                    if depth == 0 && line_start =>
                {
                    return
                }
                Tok::LBrace => depth += 1,
                Tok::RBrace => depth = depth.saturating_sub(1),
                _ => {}
            }
            line_start = matches!(tok, Tok::Semi);
            self.bump();
        }
    }

    // -------------------------------------------------------------------------
    // Source file
    // -------------------------------------------------------------------------

    pub fn parse_file(&mut self) -> NodeId {
        let start = self.loc();
        self.skip_semis();

        if self.eat(&Tok::KwPackage) {
            match self.ident() {
                Ok(name) => self.sema.package_clause(&name.name),
                Err(e) => self.report(e),
            }
            self.end_decl();
        }

        let mut imports = Vec::new();
        loop {
            self.skip_semis();
            if !self.at(&Tok::KwImport) {
                break;
            }
            match self.import_decl() {
                Ok(nodes) => imports.extend(nodes),
                Err(e) => {
                    self.report(e);
                    self.sync_top();
                    continue;
                }
            }
            self.end_decl();
        }

        let mut decls = Vec::new();
        loop {
            self.skip_semis();
            if self.peek().is_none() {
                break;
            }
            let cp = self.sema.checkpoint();
            let before = self.idx;
            match self.top_decl() {
                Ok(nodes) => {
                    decls.extend(nodes);
                    self.end_decl();
                }
                Err(e) => {
                    self.report(e);
                    self.sema.restore(cp);
                    self.expr_lev = 0;
                    if self.idx == before {
                        self.bump();
                    }
                    self.sync_top();
                }
            }
        }

        let end = self.prev;
        self.sema.file(imports, decls, start.to(end))
    }

    /// A top-level declaration ends at `;` or the end of input.
    fn end_decl(&mut self) {
        if self.peek().is_none() || self.eat(&Tok::Semi) {
            return;
        }
        let err = self.unexpected::<()>("; after top level declaration");
        if let Err(e) = err {
            self.report(e);
        }
        self.sync_top();
    }

    fn top_decl(&mut self) -> PResult<Vec<NodeId>> {
        match self.peek() {
            Some(Tok::KwFunc) => Ok(vec![self.func_decl()?]),
            Some(Tok::KwVar | Tok::KwConst | Tok::KwType) => self.decl(),
            Some(Tok::KwImport) => Err(ParseError::Invalid {
                message: "imports must appear before other declarations",
                loc: self.loc(),
            }),
            _ => Err(ParseError::Invalid {
                message: "non-declaration statement outside function body",
                loc: self.loc(),
            }),
        }
    }

    fn import_decl(&mut self) -> PResult<Vec<NodeId>> {
        self.bump();
        if !self.eat(&Tok::LParen) {
            return Ok(vec![self.import_spec()?]);
        }
        let mut out = Vec::new();
        loop {
            self.skip_semis();
            if self.eat(&Tok::RParen) {
                return Ok(out);
            }
            out.push(self.import_spec()?);
            if !self.at(&Tok::RParen) {
                self.expect(&Tok::Semi, ";")?;
            }
        }
    }

    fn import_spec(&mut self) -> PResult<NodeId> {
        let start = self.loc();
        let alias = match self.peek() {
            Some(Tok::Ident(_)) => Some(self.ident()?),
            Some(Tok::Dot) => Some(VarName::new(".", self.bump())),
            _ => None,
        };
        let path = match self.peek() {
            Some(Tok::Lit(lit)) if lit.kind == LitKind::String => match &lit.value {
                ConstValue::Str(s) => s.clone(),
                other => other.to_string(),
            },
            _ => return self.unexpected("import path"),
        };
        let end = self.bump();
        Ok(self.sema.import(alias, path, start.to(end)))
    }

    // -------------------------------------------------------------------------
    // Declarations
    // -------------------------------------------------------------------------

    fn decl(&mut self) -> PResult<Vec<NodeId>> {
        match self.peek() {
            Some(Tok::KwVar) => self.grouped(|p| p.var_spec(false)),
            Some(Tok::KwConst) => self.grouped(|p| p.var_spec(true)),
            Some(Tok::KwType) => self.grouped(Self::type_spec),
            _ => self.unexpected("declaration"),
        }
    }

    /// `kw spec` or `kw ( spec; spec; ... )`.
    fn grouped(&mut self, spec: fn(&mut Self) -> PResult<Vec<NodeId>>) -> PResult<Vec<NodeId>> {
        self.bump();
        if !self.eat(&Tok::LParen) {
            return spec(self);
        }
        let mut out = Vec::new();
        loop {
            self.skip_semis();
            if self.eat(&Tok::RParen) {
                return Ok(out);
            }
            match spec(self) {
                Ok(nodes) => out.extend(nodes),
                Err(ParseError::Fatal(f)) => self.report(ParseError::Fatal(f)),
                Err(e) => return Err(e),
            }
            if !self.at(&Tok::RParen) {
                self.expect(&Tok::Semi, "; or )")?;
            }
        }
    }

    fn var_spec(&mut self, is_const: bool) -> PResult<Vec<NodeId>> {
        let start = self.loc();
        let names = self.ident_list()?;
        let ty = if self.at(&Tok::Assign) || self.at(&Tok::Semi) || self.at(&Tok::RParen) {
            None
        } else {
            Some(self.ty()?)
        };
        let values = if self.eat(&Tok::Assign) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        if !is_const && ty.is_none() && values.is_empty() {
            return self.unexpected("type");
        }
        let loc = start.to(self.prev);
        Ok(self.sema.var_spec(names, ty, values, is_const, loc)?)
    }

    fn type_spec(&mut self) -> PResult<Vec<NodeId>> {
        let start = self.loc();
        let name = self.ident()?;
        let alias = self.eat(&Tok::Assign);
        let ty = self.ty()?;
        let loc = start.to(self.prev);
        Ok(vec![self.sema.type_decl(name, ty, alias, loc)])
    }

    fn func_decl(&mut self) -> PResult<NodeId> {
        let start = self.bump();
        if self.at(&Tok::LParen) {
            return self.unsupported("methods");
        }
        let name = self.ident()?;
        let (params, results) = self.signature()?;
        let header = self.sema.begin_function(name, params, results);
        let body = if self.at(&Tok::LBrace) {
            Some(self.block()?)
        } else {
            None
        };
        let loc = start.to(self.prev);
        Ok(self.sema.end_function(header, body, loc))
    }

    fn signature(&mut self) -> PResult<(Vec<ParamGroup>, Vec<ParamGroup>)> {
        let params = self.param_list()?;
        check_variadic_position(&mut self.sema, &params);
        let results = if self.at(&Tok::LParen) {
            self.param_list()?
        } else if self.starts_type() {
            let loc = self.loc();
            let ty = self.ty()?;
            vec![ParamGroup {
                names: Vec::new(),
                ty,
                variadic: false,
                loc: loc.to(self.prev),
            }]
        } else {
            Vec::new()
        };
        Ok((params, results))
    }

    fn param_list(&mut self) -> PResult<Vec<ParamGroup>> {
        self.expect(&Tok::LParen, "(")?;
        let mut entries = Vec::new();
        while !self.at(&Tok::RParen) {
            entries.push(self.param_entry()?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(&Tok::RParen, ")")?;
        Ok(resolve_param_list(&mut self.sema, entries))
    }

    fn param_entry(&mut self) -> PResult<ParamEntry> {
        let start = self.loc();
        match (self.peek(), self.peek_at(1)) {
            (Some(Tok::Ident(_)), Some(Tok::Comma | Tok::RParen)) => Ok(ParamEntry::Bare(self.ident()?)),
            (Some(Tok::Ident(_)), Some(Tok::Dot)) => {
                let ty = self.ty()?;
                Ok(ParamEntry::Typed {
                    name: None,
                    ty,
                    variadic: false,
                    loc: start.to(self.prev),
                })
            }
            (Some(Tok::Ident(_)), _) => {
                let name = self.ident()?;
                let variadic = self.eat(&Tok::Ellipsis);
                let ty = self.ty()?;
                Ok(ParamEntry::Typed {
                    name: Some(name),
                    ty,
                    variadic,
                    loc: start.to(self.prev),
                })
            }
            (Some(Tok::Ellipsis), _) => {
                self.bump();
                let ty = self.ty()?;
                Ok(ParamEntry::Typed {
                    name: None,
                    ty,
                    variadic: true,
                    loc: start.to(self.prev),
                })
            }
            _ => {
                let ty = self.ty()?;
                Ok(ParamEntry::Typed {
                    name: None,
                    ty,
                    variadic: false,
                    loc: start.to(self.prev),
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Types
    // -------------------------------------------------------------------------

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Tok::TypeName(_)
                    | Tok::Ident(_)
                    | Tok::LBrack
                    | Tok::KwStruct
                    | Tok::KwFunc
                    | Tok::Star
                    | Tok::KwMap
                    | Tok::KwChan
                    | Tok::KwInterface
            )
        )
    }

    fn ty(&mut self) -> PResult<NodeId> {
        let start = self.loc();
        match self.peek() {
            Some(&Tok::TypeName(name)) => {
                self.bump();
                Ok(self.sema.basic_type(name, start))
            }
            Some(&Tok::Ident(name)) => {
                if self.peek_at(1) == Some(&Tok::Dot) {
                    return self.unsupported("package-qualified types");
                }
                self.bump();
                Ok(self.sema.named_type(name, start))
            }
            Some(Tok::LBrack) => {
                self.bump();
                if self.eat(&Tok::RBrack) {
                    let elem = self.ty()?;
                    return Ok(self.sema.slice_type(elem, start.to(self.prev)));
                }
                let len = if self.eat(&Tok::Ellipsis) {
                    None
                } else {
                    let old = self.expr_lev;
                    self.expr_lev += 1;
                    let len = self.expr();
                    self.expr_lev = old;
                    Some(len?)
                };
                self.expect(&Tok::RBrack, "]")?;
                let elem = self.ty()?;
                Ok(self.sema.array_type(len, elem, start.to(self.prev)))
            }
            Some(Tok::KwStruct) => self.struct_type(),
            Some(Tok::KwFunc) => {
                self.bump();
                let (params, results) = self.signature()?;
                Ok(self.sema.func_type(params, results, start.to(self.prev)))
            }
            Some(Tok::LParen) => {
                self.bump();
                let ty = self.ty()?;
                self.expect(&Tok::RParen, ")")?;
                Ok(ty)
            }
            Some(Tok::Star) => self.unsupported("pointer types"),
            Some(Tok::KwMap) => self.unsupported("map types"),
            Some(Tok::KwChan) => self.unsupported("channel types"),
            Some(Tok::KwInterface) => self.unsupported("interface types"),
            _ => self.unexpected("type"),
        }
    }

    fn struct_type(&mut self) -> PResult<NodeId> {
        let start = self.bump();
        self.expect(&Tok::LBrace, "{")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semis();
            if self.at(&Tok::RBrace) {
                break;
            }
            let names = self.ident_list()?;
            let ty = self.ty()?;
            fields.push((names, ty));
            if !self.at(&Tok::RBrace) {
                self.expect(&Tok::Semi, "; or }")?;
            }
        }
        let end = self.expect(&Tok::RBrace, "}")?;
        Ok(self.sema.struct_type(fields, start.to(end)))
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    /// `{ ... }` in a scope of its own. A function body's scope nests inside
    /// the one holding the parameters.
    fn block(&mut self) -> PResult<NodeId> {
        let start = self.expect(&Tok::LBrace, "{")?;
        let old = self.expr_lev;
        self.expr_lev = 0;
        self.sema.open_scope();
        let stmts = self.stmt_list();
        self.sema.close_scope();
        self.expr_lev = old;
        let end = self.expect(&Tok::RBrace, "}")?;
        Ok(self.sema.block(stmts, start.to(end)))
    }

    fn stmt_list(&mut self) -> Vec<NodeId> {
        let mut out = Vec::new();
        loop {
            self.skip_semis();
            if matches!(self.peek(), None | Some(Tok::RBrace)) {
                return out;
            }
            let cp = self.sema.checkpoint();
            let before = self.idx;
            match self.stmt() {
                Ok(nodes) => {
                    out.extend(nodes);
                    if !self.eat(&Tok::Semi) && !matches!(self.peek(), None | Some(Tok::RBrace)) {
                        if let Err(e) = self.unexpected::<()>("; at end of statement") {
                            self.report(e);
                        }
                        self.sync_stmt();
                    }
                }
                Err(e) => {
                    self.report(e);
                    self.sema.restore(cp);
                    self.expr_lev = 0;
                    self.sync_stmt();
                    if self.idx == before && !matches!(self.peek(), None | Some(Tok::RBrace)) {
                        self.bump();
                    }
                }
            }
        }
    }

    fn stmt(&mut self) -> PResult<Vec<NodeId>> {
        let start = self.loc();
        let kind = match self.peek() {
            Some(Tok::KwVar | Tok::KwConst | Tok::KwType) => return self.decl(),
            Some(Tok::LBrace) => return Ok(vec![self.block()?]),
            Some(Tok::KwIf) => return Ok(vec![self.if_stmt()?]),
            Some(Tok::KwFor) => return Ok(vec![self.for_stmt()?]),
            Some(Tok::KwSwitch) => return self.unsupported("switch statements"),
            Some(Tok::KwSelect) => return self.unsupported("select statements"),
            Some(Tok::KwGo) => return self.unsupported("go statements"),
            Some(Tok::KwDefer) => return self.unsupported("defer statements"),
            Some(Tok::KwGoto) => return self.unsupported("goto statements"),
            Some(Tok::KwReturn) => KeywordKind::Return,
            Some(Tok::KwBreak) => KeywordKind::Break,
            Some(Tok::KwContinue) => KeywordKind::Continue,
            Some(Tok::KwFallthrough) => KeywordKind::Fallthrough,
            _ => {
                let simple = self.simple_stmt(false)?;
                return Ok(match simple {
                    Simple::Expr(e) => vec![self.sema.expr_stmt(e)],
                    Simple::Stmts(nodes) => nodes,
                    Simple::Range(r) => vec![r],
                });
            }
        };
        self.bump();
        let values = if kind == KeywordKind::Return && !matches!(self.peek(), None | Some(Tok::Semi | Tok::RBrace)) {
            self.expr_list()?
        } else {
            Vec::new()
        };
        if matches!(kind, KeywordKind::Break | KeywordKind::Continue) && matches!(self.peek(), Some(Tok::Ident(_))) {
            return self.unsupported("labeled branch statements");
        }
        let loc = start.to(self.prev);
        Ok(vec![self.sema.keyword(kind, values, loc)])
    }

    /// Collapses a simple statement to one node.
    fn simple_node(&mut self, simple: Simple, loc: Loc) -> NodeId {
        match simple {
            Simple::Expr(e) => self.sema.expr_stmt(e),
            Simple::Stmts(nodes) if nodes.len() == 1 => nodes[0],
            Simple::Stmts(nodes) => self.sema.block(nodes, loc),
            Simple::Range(r) => r,
        }
    }

    fn at_short_var_decl(&self) -> bool {
        let mut i = 0;
        loop {
            if !matches!(self.peek_at(i), Some(Tok::Ident(_))) {
                return false;
            }
            match self.peek_at(i + 1) {
                Some(Tok::Comma) => i += 2,
                Some(Tok::Define) => return true,
                _ => return false,
            }
        }
    }

    fn simple_stmt(&mut self, range_ok: bool) -> PResult<Simple> {
        let start = self.loc();

        if range_ok && self.eat(&Tok::KwRange) {
            let expr = self.expr()?;
            let loc = start.to(self.prev);
            return Ok(Simple::Range(self.sema.range_define(Vec::new(), expr, loc)));
        }

        if self.at_short_var_decl() {
            let names = self.ident_list()?;
            self.expect(&Tok::Define, ":=")?;
            if range_ok && self.eat(&Tok::KwRange) {
                let expr = self.expr()?;
                let loc = start.to(self.prev);
                return Ok(Simple::Range(self.sema.range_define(names, expr, loc)));
            }
            let values = self.expr_list()?;
            let loc = start.to(self.prev);
            return Ok(Simple::Stmts(self.sema.short_var_decl(names, values, loc)?));
        }

        let lhs = self.lhs_list()?;
        let op = match self.peek() {
            Some(Tok::Assign) => Some(AssignOp::PLAIN),
            Some(tok) => compound_op(tok).map(|op| AssignOp(Some(op))),
            None => None,
        };
        if let Some(op) = op {
            self.bump();
            if op == AssignOp::PLAIN && range_ok && self.eat(&Tok::KwRange) {
                let expr = self.expr()?;
                let loc = start.to(self.prev);
                return Ok(Simple::Range(self.sema.range_assign(lhs, expr, loc)));
            }
            let values = self.expr_list()?;
            let loc = start.to(self.prev);
            return Ok(Simple::Stmts(vec![self.sema.assign(op, lhs, values, loc)?]));
        }

        match (self.peek(), lhs.as_slice()) {
            (Some(Tok::Inc | Tok::Dec), [target]) => {
                let inc = self.at(&Tok::Inc);
                self.bump();
                let loc = start.to(self.prev);
                Ok(Simple::Stmts(vec![self.sema.inc_dec(*target, inc, loc)]))
            }
            (Some(Tok::Define), _) => Err(ParseError::Invalid {
                message: "non-name on left side of :=",
                loc: self.loc(),
            }),
            (Some(Tok::Colon), [_]) => self.unsupported("labeled statements"),
            (_, [expr]) => Ok(Simple::Expr(*expr)),
            _ => self.unexpected(":= or = or comma"),
        }
    }

    /// Left-hand side list; `_` is only valid here.
    fn lhs_list(&mut self) -> PResult<Vec<NodeId>> {
        let mut out = vec![self.lhs_expr()?];
        while self.eat(&Tok::Comma) {
            out.push(self.lhs_expr()?);
        }
        Ok(out)
    }

    fn lhs_expr(&mut self) -> PResult<NodeId> {
        let blank = matches!(self.peek(), Some(Tok::Ident("_")))
            && matches!(
                self.peek_at(1),
                Some(tok) if matches!(tok, Tok::Comma | Tok::Assign) || compound_op(tok).is_some()
            );
        if blank {
            let loc = self.bump();
            return Ok(self.sema.blank(loc));
        }
        self.expr()
    }

    fn if_stmt(&mut self) -> PResult<NodeId> {
        let start = self.bump();
        self.sema.open_scope();
        let result = self.if_rest(start);
        self.sema.close_scope();
        result
    }

    fn if_rest(&mut self, start: Loc) -> PResult<NodeId> {
        let old = self.expr_lev;
        self.expr_lev = -1;
        let mut init = None;
        let cond = if self.at(&Tok::LBrace) {
            return Err(ParseError::Invalid {
                message: "missing condition in if statement",
                loc: self.loc(),
            });
        } else if self.eat(&Tok::Semi) {
            self.expr()?
        } else {
            let sloc = self.loc();
            let simple = self.simple_stmt(false)?;
            if self.eat(&Tok::Semi) {
                let loc = sloc.to(self.prev);
                init = Some(self.simple_node(simple, loc));
                self.expr()?
            } else {
                match simple {
                    Simple::Expr(e) => e,
                    _ => {
                        return Err(ParseError::Invalid {
                            message: "cannot use assignment as value",
                            loc: sloc,
                        })
                    }
                }
            }
        };
        self.expr_lev = old;

        let then = self.block()?;
        let els = if self.eat(&Tok::KwElse) {
            match self.peek() {
                Some(Tok::KwIf) => Some(self.if_stmt()?),
                Some(Tok::LBrace) => Some(self.block()?),
                _ => return self.unexpected("if statement or block"),
            }
        } else {
            None
        };
        let loc = start.to(self.prev);
        Ok(self.sema.if_stmt(init, cond, then, els, loc))
    }

    fn for_stmt(&mut self) -> PResult<NodeId> {
        let start = self.bump();
        self.sema.open_scope();
        let result = self.for_rest(start);
        self.sema.close_scope();
        result
    }

    fn for_rest(&mut self, start: Loc) -> PResult<NodeId> {
        let old = self.expr_lev;
        self.expr_lev = -1;
        let header = if self.at(&Tok::LBrace) {
            None
        } else {
            Some(self.for_header()?)
        };
        self.expr_lev = old;

        self.sema.enter_loop();
        let body = self.block();
        self.sema.exit_loop();
        let body = body?;
        let loc = start.to(self.prev);
        Ok(self.sema.for_stmt(header, body, loc))
    }

    fn for_header(&mut self) -> PResult<NodeId> {
        let start = self.loc();
        let mut init = None;
        if !self.at(&Tok::Semi) {
            let simple = self.simple_stmt(true)?;
            match simple {
                Simple::Range(r) => return Ok(r),
                Simple::Expr(cond) if self.at(&Tok::LBrace) => {
                    let loc = start.to(self.prev);
                    return Ok(self.sema.for_clause(None, Some(cond), None, loc));
                }
                other => {
                    let loc = start.to(self.prev);
                    init = Some(self.simple_node(other, loc));
                }
            }
        }
        self.expect(&Tok::Semi, "{ after for clause")?;
        let cond = if self.at(&Tok::Semi) {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(&Tok::Semi, "; after for loop condition")?;
        let post = if self.at(&Tok::LBrace) {
            None
        } else {
            let ploc = self.loc();
            let simple = self.simple_stmt(false)?;
            if let Simple::Stmts(nodes) = &simple {
                let declares = nodes
                    .iter()
                    .any(|&n| matches!(self.sema.ast.node(n), Node::VarDecl { .. }));
                if declares {
                    return Err(ParseError::Invalid {
                        message: "cannot declare in post statement of for loop",
                        loc: ploc,
                    });
                }
            }
            let loc = ploc.to(self.prev);
            Some(self.simple_node(simple, loc))
        };
        let loc = start.to(self.prev);
        Ok(self.sema.for_clause(init, cond, post, loc))
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    fn expr_list(&mut self) -> PResult<Vec<NodeId>> {
        let mut out = vec![self.expr()?];
        while self.eat(&Tok::Comma) {
            out.push(self.expr()?);
        }
        Ok(out)
    }

    pub fn expr(&mut self) -> PResult<NodeId> {
        self.binary_expr(1)
    }

    fn binary_expr(&mut self, min_prec: u8) -> PResult<NodeId> {
        let mut left = self.unary_expr()?;
        while let Some(op) = self.peek().and_then(binary_op) {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.bump();
            let right = self.binary_expr(prec + 1)?;
            let loc = self.sema.loc(left).to(self.sema.loc(right));
            left = self.sema.binop(op, left, right, loc);
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> PResult<NodeId> {
        let op = match self.peek() {
            Some(Tok::Plus) => UnaryOp::Plus,
            Some(Tok::Minus) => UnaryOp::Neg,
            Some(Tok::Bang) => UnaryOp::Not,
            Some(Tok::Caret) => UnaryOp::BitNot,
            Some(Tok::Star) => UnaryOp::Deref,
            Some(Tok::Amp) => UnaryOp::Addr,
            Some(Tok::Arrow) => return self.unsupported("channel operations"),
            _ => return self.primary_expr(),
        };
        let start = self.bump();
        let operand = self.unary_expr()?;
        let loc = start.to(self.sema.loc(operand));
        Ok(self.sema.unary(op, operand, loc))
    }

    fn primary_expr(&mut self) -> PResult<NodeId> {
        let start = self.loc();
        let mut x = self.operand()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.bump();
                    let field = self.ident()?;
                    x = self.sema.selector(x, &field.name, start.to(field.loc));
                }
                Some(Tok::LBrack) => {
                    self.bump();
                    self.expr_lev += 1;
                    let index = self.expr();
                    self.expr_lev -= 1;
                    let index = index?;
                    if self.at(&Tok::Colon) {
                        return self.unsupported("slice expressions");
                    }
                    let end = self.expect(&Tok::RBrack, "]")?;
                    x = self.sema.index(x, index, start.to(end));
                }
                Some(Tok::LParen) => {
                    self.bump();
                    self.expr_lev += 1;
                    let args = self.call_args();
                    self.expr_lev -= 1;
                    let args = args?;
                    let end = self.expect(&Tok::RParen, ")")?;
                    x = self.sema.call(x, args, start.to(end));
                }
                Some(Tok::LBrace) if self.is_literal_type(x) => {
                    x = self.composite_lit(x)?;
                }
                _ => return Ok(x),
            }
        }
    }

    fn call_args(&mut self) -> PResult<Vec<NodeId>> {
        let mut args = Vec::new();
        while !self.at(&Tok::RParen) {
            args.push(self.expr()?);
            if self.at(&Tok::Ellipsis) {
                return self.unsupported("variadic argument spreads");
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// Whether `{` after `x` opens a composite literal. A bare type name
    /// does not inside `if`/`for` headers.
    fn is_literal_type(&self, x: NodeId) -> bool {
        match self.sema.ast.node(x) {
            Node::ArrayType { .. } | Node::SliceType { .. } | Node::StructType { .. } => true,
            Node::Ident { .. } => self.expr_lev >= 0 && self.sema.is_type_expr(x),
            _ => false,
        }
    }

    fn operand(&mut self) -> PResult<NodeId> {
        let start = self.loc();
        match self.peek() {
            Some(Tok::Lit(lit)) => {
                let lit = lit.clone();
                self.bump();
                Ok(self.sema.lit(lit, start))
            }
            Some(&Tok::Ident(name)) => {
                self.bump();
                if self.at(&Tok::Dot) && self.sema.is_package(name) {
                    self.bump();
                    let member = self.ident()?;
                    return Ok(self.sema.qualified(name, &member.name, start.to(member.loc)));
                }
                Ok(self.sema.ident_ref(name, start))
            }
            Some(&Tok::TypeName(name)) => {
                self.bump();
                Ok(self.sema.basic_type(name, start))
            }
            Some(Tok::LParen) => {
                self.bump();
                let old = self.expr_lev;
                self.expr_lev = self.expr_lev.max(0) + 1;
                let x = self.expr();
                self.expr_lev = old;
                let x = x?;
                self.expect(&Tok::RParen, ")")?;
                Ok(x)
            }
            Some(Tok::LBrack | Tok::KwStruct) => self.ty(),
            Some(Tok::KwFunc) => self.func_lit(),
            _ => self.unexpected("expression"),
        }
    }

    fn func_lit(&mut self) -> PResult<NodeId> {
        let start = self.bump();
        let (params, results) = self.signature()?;
        if !self.at(&Tok::LBrace) {
            return Ok(self.sema.func_type(params, results, start.to(self.prev)));
        }
        let header = self.sema.begin_func_lit(params, results);
        let body = self.block()?;
        let loc = start.to(self.prev);
        Ok(self.sema.end_func_lit(header, body, loc))
    }

    fn composite_lit(&mut self, ty: NodeId) -> PResult<NodeId> {
        let start = self.sema.loc(ty);
        let is_struct = self
            .sema
            .ast
            .ty(ty)
            .is_some_and(|t| self.sema.types.fields(t).is_some());
        self.bump();
        let old = self.expr_lev;
        self.expr_lev = 0;
        let elems = self.composite_elems(is_struct);
        self.expr_lev = old;
        let elems = elems?;
        let end = self.expect(&Tok::RBrace, "}")?;
        Ok(self.sema.composite(ty, elems, start.to(end)))
    }

    fn composite_elems(&mut self, is_struct: bool) -> PResult<Vec<CompositeElem>> {
        let mut elems = Vec::new();
        loop {
            self.skip_semis();
            if self.at(&Tok::RBrace) {
                return Ok(elems);
            }
            let start = self.loc();
            let field = match (self.peek(), self.peek_at(1)) {
                (Some(&Tok::Ident(name)), Some(Tok::Colon)) if is_struct => {
                    self.bump();
                    self.bump();
                    Some(name.to_string())
                }
                _ => None,
            };
            let first = self.element_value()?;
            let (key, value) = if field.is_none() && self.eat(&Tok::Colon) {
                (Some(first), self.element_value()?)
            } else {
                (None, first)
            };
            elems.push(CompositeElem {
                field,
                key,
                value,
                loc: start.to(self.prev),
            });
            self.skip_semis();
            if !self.eat(&Tok::Comma) {
                return Ok(elems);
            }
        }
    }

    fn element_value(&mut self) -> PResult<NodeId> {
        if self.at(&Tok::LBrace) {
            return self.unsupported("composite literals with elided types");
        }
        self.expr()
    }
}

fn binary_op(tok: &Tok<'_>) -> Option<BinaryOp> {
    Some(match tok {
        Tok::LOr => BinaryOp::LOr,
        Tok::LAnd => BinaryOp::LAnd,
        Tok::EqEq => BinaryOp::Eq,
        Tok::NotEq => BinaryOp::Ne,
        Tok::Lt => BinaryOp::Lt,
        Tok::Le => BinaryOp::Le,
        Tok::Gt => BinaryOp::Gt,
        Tok::Ge => BinaryOp::Ge,
        Tok::Plus => BinaryOp::Add,
        Tok::Minus => BinaryOp::Sub,
        Tok::Pipe => BinaryOp::Or,
        Tok::Caret => BinaryOp::Xor,
        Tok::Star => BinaryOp::Mul,
        Tok::Slash => BinaryOp::Div,
        Tok::Percent => BinaryOp::Rem,
        Tok::Shl => BinaryOp::Shl,
        Tok::Shr => BinaryOp::Shr,
        Tok::Amp => BinaryOp::And,
        Tok::AndNot => BinaryOp::AndNot,
        _ => return None,
    })
}

fn compound_op(tok: &Tok<'_>) -> Option<BinaryOp> {
    Some(match tok {
        Tok::AddAssign => BinaryOp::Add,
        Tok::SubAssign => BinaryOp::Sub,
        Tok::MulAssign => BinaryOp::Mul,
        Tok::DivAssign => BinaryOp::Div,
        Tok::ModAssign => BinaryOp::Rem,
        Tok::AndAssign => BinaryOp::And,
        Tok::OrAssign => BinaryOp::Or,
        Tok::XorAssign => BinaryOp::Xor,
        Tok::ShlAssign => BinaryOp::Shl,
        Tok::ShrAssign => BinaryOp::Shr,
        Tok::AndNotAssign => BinaryOp::AndNot,
        _ => return None,
    })
}
