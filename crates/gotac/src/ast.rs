//! # Annotated syntax tree
//!
//! Nodes live in one arena (`SpannedArena<Node>`) and refer to each other by
//! [`NodeId`]; child sequences are [`ListRef`]s into a shared buffer. Nothing is
//! shared or cyclic: every id appears as a child of exactly one parent.
//!
//! Semantic results are kept beside the tree, not inside it: for every node
//! the [`NodeInfo`] side table records its position, inferred type, whether it
//! is an untyped constant, its constant value, and whether its type still
//! depends on a forward reference (resolved by the fix-up pass).
//!
//! - `#[derive(WalkAst)]` generates `impl crate::walk::Walk` for [`Node`].
//! - Identifiers are bound to [`SymbolId`]s at construction.

use ast_derive::WalkAst;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};
use std::fmt;

use crate::error::{Pos, Span};
use crate::symbols::SymbolId;
use crate::types::TypeId;
use crate::value::{ConstValue, Lit, LitKind};

// =============================================================================
// Core Foundation Types
// =============================================================================

/// Type-safe identifier for arena-allocated nodes.
///
/// Every trait is implemented on `raw` alone, so none of them place a bound on
/// `T`.
#[repr(transparent)]
pub struct Id<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.raw)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> core::hash::Hash for Id<T> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> Id<T> {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn to_usize(&self) -> usize {
        self.raw as usize
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }
}

/// Typed reference into a centralized list buffer.
pub struct ListRef<T> {
    start: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for ListRef<T> {}

impl<T> Clone for ListRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for ListRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListRef({}..+{})", self.start, self.len)
    }
}

impl<T> PartialEq for ListRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.len == other.len
    }
}

impl<T> Eq for ListRef<T> {}

impl<T> Default for ListRef<T> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<T> ListRef<T> {
    pub const EMPTY: Self = Self {
        start: 0,
        len: 0,
        _marker: PhantomData,
    };

    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        Self {
            start,
            len,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    const fn range(&self) -> core::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

// =============================================================================
// Arena Allocation
// =============================================================================

/// Arena for nodes with associated spans, stored in parallel vectors.
#[derive(Debug)]
pub struct SpannedArena<T> {
    data: Vec<T>,
    spans: Vec<Span>,
}

impl<T> Default for SpannedArena<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            spans: Vec::new(),
        }
    }
}

impl<T> SpannedArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self, node: T, span: Span) -> Id<T> {
        let id = Id::from_raw(self.data.len() as u32);
        self.data.push(node);
        self.spans.push(span);
        id
    }

    #[inline]
    pub fn get(&self, id: Id<T>) -> &T {
        &self.data[id.to_usize()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.data[id.to_usize()]
    }

    #[inline]
    pub fn span(&self, id: Id<T>) -> Span {
        self.spans[id.to_usize()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        (0..self.data.len() as u32).map(Id::from_raw)
    }
}

impl<T> Index<Id<T>> for SpannedArena<T> {
    type Output = T;
    fn index(&self, id: Id<T>) -> &T {
        self.get(id)
    }
}

impl<T> IndexMut<Id<T>> for SpannedArena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        self.get_mut(id)
    }
}

pub type NodeId = Id<Node>;

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    AndNot,
    LAnd,
    LOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::LAnd => "&&",
            BinaryOp::LOr => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    /// Go binary precedence (5 binds tightest).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::And
            | BinaryOp::AndNot => 5,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
            BinaryOp::LAnd => 2,
            BinaryOp::LOr => 1,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LAnd | BinaryOp::LOr)
    }

    pub const fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::LAnd
                | BinaryOp::LOr
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
    Deref,
    Addr,
}

impl UnaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "^",
            UnaryOp::Deref => "*",
            UnaryOp::Addr => "&",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `=` or a compound assignment operator (`+=` carries `Some(Add)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssignOp(pub Option<BinaryOp>);

impl AssignOp {
    pub const PLAIN: AssignOp = AssignOp(None);
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(op) => write!(f, "{op}="),
            None => f.write_str("="),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordKind {
    Break,
    Continue,
    Return,
    Fallthrough,
}

impl KeywordKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            KeywordKind::Break => "break",
            KeywordKind::Continue => "continue",
            KeywordKind::Return => "return",
            KeywordKind::Fallthrough => "fallthrough",
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, PartialEq, WalkAst)]
pub enum Node {
    File {
        #[walk(skip)]
        package: Option<String>,
        imports: ListRef<NodeId>,
        decls: ListRef<NodeId>,
    },
    Import {
        #[walk(skip)]
        path: String,
        #[walk(skip)]
        sym: Option<SymbolId>,
    },

    // Expressions
    Literal(#[walk(skip)] Lit),
    /// `sym` is `None` when the name never resolved.
    Ident {
        #[walk(skip)]
        name: String,
        #[walk(skip)]
        sym: Option<SymbolId>,
    },
    /// `pkg.Name` where `pkg` is an imported package.
    QualifiedIdent {
        #[walk(skip)]
        package: String,
        #[walk(skip)]
        name: String,
    },
    BinOp {
        #[walk(skip)]
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    UnaryOp {
        #[walk(skip)]
        op: UnaryOp,
        operand: NodeId,
    },
    FunctionCall {
        callee: NodeId,
        args: ListRef<NodeId>,
    },
    Conversion {
        ty: NodeId,
        expr: NodeId,
    },
    Index {
        base: NodeId,
        index: NodeId,
    },
    Selector {
        base: NodeId,
        #[walk(skip)]
        field: String,
    },
    CompositeLit {
        ty: NodeId,
        elems: ListRef<NodeId>,
    },
    KeyedElement {
        #[walk(skip)]
        field: Option<String>,
        key: Option<NodeId>,
        value: NodeId,
    },
    FuncLit {
        #[walk(skip)]
        label: String,
        params: ListRef<NodeId>,
        results: ListRef<NodeId>,
        body: NodeId,
    },

    // Statements
    Assignment {
        #[walk(skip)]
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    },
    /// `a, b = b, a`: every value is evaluated before any store.
    ParallelAssign {
        targets: ListRef<NodeId>,
        values: ListRef<NodeId>,
    },
    VarDecl {
        #[walk(skip)]
        sym: SymbolId,
        ty: Option<NodeId>,
        init: Option<NodeId>,
        #[walk(skip)]
        is_const: bool,
    },
    TypeDecl {
        #[walk(skip)]
        name: String,
        ty: NodeId,
        #[walk(skip)]
        alias: bool,
    },
    ParameterDecl {
        #[walk(skip)]
        names: Vec<SymbolId>,
        ty: NodeId,
        #[walk(skip)]
        variadic: bool,
    },
    Function {
        #[walk(skip)]
        name: String,
        #[walk(skip)]
        sym: Option<SymbolId>,
        params: ListRef<NodeId>,
        results: ListRef<NodeId>,
        body: Option<NodeId>,
    },
    List(ListRef<NodeId>),
    IfStmt {
        init: Option<NodeId>,
        cond: NodeId,
        then: NodeId,
        els: Option<NodeId>,
    },
    ForStmt {
        header: Option<NodeId>,
        body: NodeId,
    },
    ForClause {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        post: Option<NodeId>,
    },
    /// `for key, value := range expr`; `counter` is the hidden index symbol.
    RangeClause {
        key: Option<NodeId>,
        value: Option<NodeId>,
        expr: NodeId,
        #[walk(skip)]
        define: bool,
        #[walk(skip)]
        counter: SymbolId,
    },
    Keyword {
        #[walk(skip)]
        kind: KeywordKind,
        values: ListRef<NodeId>,
    },

    // Types
    TypeName(#[walk(skip)] String),
    ArrayType {
        len: Option<NodeId>,
        elem: NodeId,
    },
    SliceType {
        elem: NodeId,
    },
    StructType {
        fields: ListRef<NodeId>,
    },
    FieldDecl {
        #[walk(skip)]
        names: Vec<String>,
        ty: NodeId,
    },
    FuncType {
        params: ListRef<NodeId>,
        results: ListRef<NodeId>,
    },

    /// Placeholder for a construct that failed to parse.
    Bad,
}

impl Node {
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Node::File { .. } => "File",
            Node::Import { .. } => "Import",
            Node::Literal(_) => "Literal",
            Node::Ident { .. } => "Ident",
            Node::QualifiedIdent { .. } => "QualifiedIdent",
            Node::BinOp { .. } => "BinOp",
            Node::UnaryOp { .. } => "UnaryOp",
            Node::FunctionCall { .. } => "FunctionCall",
            Node::Conversion { .. } => "Conversion",
            Node::Index { .. } => "Index",
            Node::Selector { .. } => "Selector",
            Node::CompositeLit { .. } => "CompositeLit",
            Node::KeyedElement { .. } => "KeyedElement",
            Node::FuncLit { .. } => "FuncLit",
            Node::Assignment { .. } => "Assignment",
            Node::ParallelAssign { .. } => "ParallelAssign",
            Node::VarDecl { .. } => "VarDecl",
            Node::TypeDecl { .. } => "TypeDecl",
            Node::ParameterDecl { .. } => "ParameterDecl",
            Node::Function { .. } => "Function",
            Node::List(_) => "List",
            Node::IfStmt { .. } => "IfStmt",
            Node::ForStmt { .. } => "ForStmt",
            Node::ForClause { .. } => "ForClause",
            Node::RangeClause { .. } => "RangeClause",
            Node::Keyword { .. } => "Keyword",
            Node::TypeName(_) => "TypeName",
            Node::ArrayType { .. } => "ArrayType",
            Node::SliceType { .. } => "SliceType",
            Node::StructType { .. } => "StructType",
            Node::FieldDecl { .. } => "FieldDecl",
            Node::FuncType { .. } => "FuncType",
            Node::Bad => "Bad",
        }
    }
}

// =============================================================================
// Side tables
// =============================================================================

/// Semantic annotations of one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInfo {
    pub pos: Pos,
    /// Inferred type; `None` is the `unknown` sentinel.
    pub ty: Option<TypeId>,
    /// Untyped constant kind, adapting to the context it is used in.
    pub untyped: Option<LitKind>,
    pub value: Option<ConstValue>,
    /// Type depends on a forward reference; revisited by the fix-up pass.
    pub pending: bool,
    /// Call of a function without results.
    pub no_value: bool,
    /// Call of a function with several results.
    pub multi: bool,
}

impl NodeInfo {
    pub fn typed(pos: Pos, ty: Option<TypeId>) -> Self {
        Self {
            pos,
            ty,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct Ast {
    pub nodes: SpannedArena<Node>,
    info: Vec<NodeInfo>,
    extras: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node, span: Span, info: NodeInfo) -> NodeId {
        let id = self.nodes.alloc(node, span);
        self.info.push(info);
        id
    }

    pub fn list(&mut self, items: impl IntoIterator<Item = NodeId>) -> ListRef<NodeId> {
        let start = self.extras.len() as u32;
        self.extras.extend(items);
        ListRef::new(start, self.extras.len() as u32 - start)
    }

    #[inline]
    pub fn slice(&self, r: ListRef<NodeId>) -> &[NodeId] {
        &self.extras[r.range()]
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.nodes.span(id)
    }

    #[inline]
    pub fn info(&self, id: NodeId) -> &NodeInfo {
        &self.info[id.to_usize()]
    }

    #[inline]
    pub fn info_mut(&mut self, id: NodeId) -> &mut NodeInfo {
        &mut self.info[id.to_usize()]
    }

    #[inline]
    pub fn ty(&self, id: NodeId) -> Option<TypeId> {
        self.info(id).ty
    }

    #[inline]
    pub fn pos(&self, id: NodeId) -> Pos {
        self.info(id).pos
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Symbol named by an identifier node.
    pub fn ident_symbol(&self, id: NodeId) -> Option<SymbolId> {
        match self.node(id) {
            Node::Ident { sym, .. } => *sym,
            _ => None,
        }
    }
}
