//! Semantic actions.
//!
//! The parser calls into [`Sema`] as it recognises each production; every
//! action allocates its node and immediately performs the checks its already
//! built children allow. Problems are pushed to the diagnostics list and the
//! offending node gets the `unknown` type, so one run surfaces as many
//! errors as possible. Types that depend on declarations further down the
//! file are marked pending and settled by [`fixup`].

mod decl;
mod expr;
pub mod fixup;
mod stmt;

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, Node, NodeId, NodeInfo};
use crate::error::{Diag, DiagKind, Diagnostics, Pos, SemanticError, Span};
use crate::symbols::{Redeclared, SymbolId, SymbolKind, SymbolTable, ROOT_SCOPE};
use crate::types::{BasicKind, TypeId, TypeKind, TypeTable};
use crate::value::{ConstValue, LitKind};

pub use decl::{FuncHeader, ParamGroup, VarName};
pub use expr::CompositeElem;

/// Source location of a construct: byte span plus line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    pub span: Span,
    pub pos: Pos,
}

impl Loc {
    pub const fn new(span: Span, pos: Pos) -> Self {
        Self { span, pos }
    }

    /// From the start of `self` to the end of `other`.
    pub fn to(self, other: Loc) -> Loc {
        Loc {
            span: self.span.to(other.span),
            pos: self.pos,
        }
    }
}

#[derive(Debug)]
struct FuncCtx {
    results: Vec<Option<TypeId>>,
    named_results: Vec<SymbolId>,
    loops: u32,
}

/// Saved nesting state, restored after a syntax error unwinds mid-block.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    scopes: usize,
    funcs: usize,
    loops: u32,
}

#[derive(Debug)]
pub struct Sema {
    pub ast: Ast,
    pub symbols: SymbolTable,
    pub types: TypeTable,
    pub diags: Diagnostics,
    pub package: Option<String>,
    check_unused: bool,
    require_main: bool,
    funcs: Vec<FuncCtx>,
    pending_syms: HashSet<SymbolId>,
    param_sites: HashMap<SymbolId, Vec<Pos>>,
    /// Result types expected by `return` statements with pending values.
    pending_returns: HashMap<NodeId, Vec<Option<TypeId>>>,
    lit_count: u32,
    range_count: u32,
}

impl Default for Sema {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl Sema {
    pub fn new(check_unused: bool, require_main: bool) -> Self {
        Self {
            ast: Ast::new(),
            symbols: SymbolTable::new(),
            types: TypeTable::new(),
            diags: Diagnostics::default(),
            package: None,
            check_unused,
            require_main,
            funcs: Vec::new(),
            pending_syms: HashSet::new(),
            param_sites: HashMap::new(),
            pending_returns: HashMap::new(),
            lit_count: 0,
            range_count: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    pub(crate) fn report(&mut self, err: SemanticError, loc: Loc) {
        self.diags.push(err.at(loc.span, loc.pos));
    }

    pub(crate) fn report_node(&mut self, err: SemanticError, id: NodeId) {
        let loc = self.loc(id);
        self.report(err, loc);
    }

    pub(crate) fn report_related(&mut self, err: SemanticError, loc: Loc, note: &str, at: Option<Pos>) {
        let mut diag = err.at(loc.span, loc.pos);
        if let Some(at) = at {
            diag = diag.with_related(note, at);
        }
        self.diags.push(diag);
    }

    pub(crate) fn report_redeclared(&mut self, err: Redeclared, loc: Loc) {
        let diag = SemanticError::Redeclared { name: err.name }.at(loc.span, loc.pos);
        let diag = match err.previous {
            Some(prev) => diag.with_related("previous declaration", prev),
            None => diag,
        };
        self.diags.push(diag);
    }

    pub fn push_diag(&mut self, diag: Diag) {
        self.diags.push(diag);
    }

    #[inline]
    pub(crate) fn loc(&self, id: NodeId) -> Loc {
        Loc::new(self.ast.span(id), self.ast.pos(id))
    }

    pub(crate) fn alloc(&mut self, node: Node, loc: Loc) -> NodeId {
        self.ast.alloc(node, loc.span, NodeInfo::typed(loc.pos, None))
    }

    pub(crate) fn type_name(&self, ty: Option<TypeId>) -> String {
        self.types.display(ty)
    }

    // -------------------------------------------------------------------------
    // Scopes and nesting
    // -------------------------------------------------------------------------

    pub fn open_scope(&mut self) {
        self.symbols.enter_scope();
    }

    pub fn close_scope(&mut self) {
        self.symbols.leave_scope();
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            scopes: self.symbols.depth(),
            funcs: self.funcs.len(),
            loops: self.funcs.last().map_or(0, |f| f.loops),
        }
    }

    pub fn restore(&mut self, cp: Checkpoint) {
        while self.symbols.depth() > cp.scopes {
            self.symbols.leave_scope();
        }
        self.funcs.truncate(cp.funcs);
        if let Some(f) = self.funcs.last_mut() {
            f.loops = cp.loops;
        }
    }

    pub fn enter_loop(&mut self) {
        if let Some(f) = self.funcs.last_mut() {
            f.loops += 1;
        }
    }

    pub fn exit_loop(&mut self) {
        if let Some(f) = self.funcs.last_mut() {
            f.loops = f.loops.saturating_sub(1);
        }
    }

    fn in_loop(&self) -> bool {
        self.funcs.last().is_some_and(|f| f.loops > 0)
    }

    pub fn at_package_level(&self) -> bool {
        self.symbols.current_scope() == ROOT_SCOPE
    }

    // -------------------------------------------------------------------------
    // Constant typing rules
    // -------------------------------------------------------------------------

    /// Kind an untyped constant of type `ty` was written as.
    pub(crate) fn lit_kind_of(&self, ty: TypeId) -> Option<LitKind> {
        let t = &self.types;
        Some(if ty == t.rune() {
            LitKind::Rune
        } else if t.is_integer(ty) {
            LitKind::Int
        } else if t.is_float(ty) {
            LitKind::Float
        } else if t.is_string(ty) {
            LitKind::String
        } else if t.is_bool(ty) {
            LitKind::Bool
        } else {
            return None;
        })
    }

    pub(crate) fn default_type(&self, kind: LitKind) -> TypeId {
        match kind {
            LitKind::Int => self.types.int(),
            LitKind::Float => self.types.float64(),
            LitKind::Rune => self.types.rune(),
            LitKind::String => self.types.string(),
            LitKind::Bool => self.types.bool(),
        }
    }

    fn basic_kind(&self, ty: TypeId) -> Option<BasicKind> {
        match self.types.get(self.types.underlying(ty)).kind {
            TypeKind::Basic(k) => Some(k),
            _ => None,
        }
    }

    fn int_fits(&self, v: i64, target: TypeId) -> bool {
        let (lo, hi): (i128, i128) = match self.basic_kind(target) {
            Some(BasicKind::Int8) => (i8::MIN.into(), i8::MAX.into()),
            Some(BasicKind::Int16) => (i16::MIN.into(), i16::MAX.into()),
            Some(BasicKind::Int32) => (i32::MIN.into(), i32::MAX.into()),
            Some(BasicKind::Uint8) => (0, u8::MAX.into()),
            Some(BasicKind::Uint16) => (0, u16::MAX.into()),
            Some(BasicKind::Uint32) => (0, u32::MAX.into()),
            Some(BasicKind::Uint | BasicKind::Uint64 | BasicKind::Uintptr) => (0, u64::MAX.into()),
            _ => (i64::MIN.into(), i64::MAX.into()),
        };
        (lo..=hi).contains(&i128::from(v))
    }

    /// Whether an untyped constant of `kind` may take type `target`.
    fn untyped_fits(&self, kind: LitKind, value: Option<&ConstValue>, target: TypeId) -> bool {
        let t = &self.types;
        match kind {
            LitKind::Int | LitKind::Rune => {
                if t.is_integer(target) {
                    value.and_then(ConstValue::as_int).map_or(true, |v| self.int_fits(v, target))
                } else {
                    t.is_numeric(target)
                }
            }
            LitKind::Float => {
                t.is_float(target)
                    || (t.is_numeric(target)
                        && !t.is_integer(target))
                    || (t.is_integer(target)
                        && matches!(value, Some(ConstValue::Float(f)) if f.fract() == 0.0))
            }
            LitKind::String => t.is_string(target),
            LitKind::Bool => t.is_bool(target),
        }
    }

    /// Whether a value described by `info` may be stored in a `target`.
    pub(crate) fn assignable(&self, info: &NodeInfo, target: Option<TypeId>) -> bool {
        let (Some(ty), Some(target)) = (info.ty, target) else {
            return true;
        };
        match info.untyped {
            Some(kind) => self.untyped_fits(kind, info.value.as_ref(), target),
            None => ty == target,
        }
    }

    /// Constant `value` represented in type `target`.
    pub(crate) fn convert_const(&self, value: &ConstValue, target: TypeId) -> Option<ConstValue> {
        self.types.convert_const(value, target)
    }

    /// Reports a no-value or multi-value call used where one value is needed.
    pub(crate) fn expect_value(&mut self, id: NodeId) -> bool {
        let info = self.ast.info(id);
        let err = if info.no_value {
            SemanticError::NoValue {
                call: self.describe(id),
            }
        } else if info.multi {
            SemanticError::MultipleValue {
                call: self.describe(id),
            }
        } else {
            return true;
        };
        self.report_node(err, id);
        false
    }

    /// Short source-like rendering used in messages.
    pub(crate) fn describe(&self, id: NodeId) -> String {
        match self.ast.node(id) {
            Node::Ident { name, .. } => name.clone(),
            Node::QualifiedIdent { package, name } => format!("{package}.{name}"),
            Node::Literal(lit) => lit.value.to_string(),
            Node::FunctionCall { callee, .. } => format!("{}()", self.describe(*callee)),
            Node::Selector { base, field } => format!("{}.{field}", self.describe(*base)),
            Node::Index { base, .. } => format!("{}[...]", self.describe(*base)),
            other => other.kind_name().to_ascii_lowercase(),
        }
    }

    pub(crate) fn is_pending(&self, id: NodeId) -> bool {
        self.ast.info(id).pending
    }

    /// Whether `id` denotes a type rather than a value.
    pub fn is_type_expr(&self, id: NodeId) -> bool {
        match self.ast.node(id) {
            Node::TypeName(_)
            | Node::ArrayType { .. }
            | Node::SliceType { .. }
            | Node::StructType { .. }
            | Node::FuncType { .. } => true,
            Node::Ident { sym: Some(sym), .. } => {
                self.symbols.symbol(*sym).kind == SymbolKind::TypeName
            }
            _ => false,
        }
    }

    pub fn is_package(&self, name: &str) -> bool {
        self.symbols
            .get_declared(name)
            .is_some_and(|id| self.symbols.symbol(id).kind == SymbolKind::Package)
    }

    // -------------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------------

    /// Settles forward references and runs the end-of-unit checks.
    pub fn finish(&mut self, root: NodeId) {
        fixup::run(self, root);

        if self.check_unused {
            for id in self.symbols.check_unused() {
                let sym = self.symbols.symbol(id);
                let pos = sym.decl.unwrap_or_default();
                let err = SemanticError::Unused {
                    name: sym.name.clone(),
                };
                self.report(err, Loc::new(Span::default(), pos));
            }
        }

        if self.require_main && self.package.as_deref() == Some("main") {
            let has_main = self
                .symbols
                .get_declared("main")
                .is_some_and(|id| self.symbols.symbol(id).kind == SymbolKind::Func);
            if !has_main {
                self.report(SemanticError::MissingMain, Loc::new(Span::default(), Pos::new(1, 1)));
            }
        }
    }

    pub fn error_count(&self) -> usize {
        self.diags.error_count()
    }

    pub(crate) fn syntax_error(&mut self, message: impl Into<String>, loc: Loc) {
        self.diags
            .push(Diag::error(DiagKind::Syntax, loc.span, loc.pos, message));
    }
}
