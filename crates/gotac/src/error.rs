use std::fmt;

use thiserror::Error;
use tracing::{error, warn};

/// Compact byte-span used across the compiler.
///
/// Offsets are `u32`; inputs above 4GiB clamp instead of panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32, // exclusive
}

impl Span {
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        let s = if start > u32::MAX as usize {
            u32::MAX
        } else {
            start as u32
        };
        let e = if end > u32::MAX as usize {
            u32::MAX
        } else {
            end as u32
        };
        Self { start: s, end: e }
    }

    #[inline]
    pub const fn empty_at(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub const fn from_range(range: std::ops::Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }

    /// Smallest span covering both `self` and `other`.
    #[inline]
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// Coarse error taxonomy: how each class of problem is recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Skipped, scanning resumes.
    Lexical,
    /// Recovered at the next statement or declaration boundary.
    Syntax,
    /// Checker substitutes `unknown` and continues.
    Semantic,
    /// Lowering gap, passed through.
    Generator,
    /// Aborts the enclosing declaration only.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    Lex,
    Syntax,
    Redeclaration,
    Undeclared,
    UndefinedType,
    TypeMismatch,
    InvalidOperation,
    ArgCount,
    ArgType,
    ConstAssign,
    NonBoolCondition,
    NotConstant,
    InvalidIndex,
    BranchOutsideLoop,
    ReturnMismatch,
    UnusedVariable,
    MissingMain,
    Unsupported,
    NotImplemented,
    Unpacking,
}

impl DiagKind {
    pub const fn category(self) -> Category {
        match self {
            DiagKind::Lex => Category::Lexical,
            DiagKind::Syntax => Category::Syntax,
            DiagKind::NotImplemented => Category::Generator,
            DiagKind::Unpacking => Category::Fatal,
            _ => Category::Semantic,
        }
    }
}

/// Secondary location attached to a diagnostic ("previously declared here").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Related {
    pub message: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diag {
    pub kind: DiagKind,
    pub severity: Severity,
    pub pos: Pos,
    pub span: Span,
    pub message: String,
    pub related: Option<Related>,
}

impl Diag {
    pub fn error(kind: DiagKind, span: Span, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            pos,
            span,
            message: message.into(),
            related: None,
        }
    }

    pub fn warning(kind: DiagKind, span: Span, pos: Pos, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, span, pos, message)
        }
    }

    pub fn with_related(mut self, message: impl Into<String>, pos: Pos) -> Self {
        self.related = Some(Related {
            message: message.into(),
            pos,
        });
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.pos, self.severity, self.message)?;
        if let Some(rel) = &self.related {
            write!(f, "\n\t{}: {}", rel.pos, rel.message)?;
        }
        Ok(())
    }
}

// =============================================================================
// Lexical errors
// =============================================================================

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexErrorKind {
    #[default]
    #[error("illegal character")]
    IllegalCharacter,
    #[error("invalid numeric literal")]
    InvalidNumber,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("invalid rune literal")]
    InvalidRune,
    #[error("newline in string literal")]
    NewlineInString,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated comment")]
    UnterminatedComment,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} at {pos}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
    pub pos: Pos,
}

impl LexError {
    pub fn diag(&self, text: &str) -> Diag {
        let message = match self.kind {
            LexErrorKind::IllegalCharacter => format!("illegal character {text:?}"),
            kind => kind.to_string(),
        };
        Diag::error(DiagKind::Lex, self.span, self.pos, message)
    }
}

// =============================================================================
// Semantic errors
// =============================================================================

/// Recoverable problems found while building the tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("`{name}` redeclared in this block")]
    Redeclared { name: String },
    #[error("no new variables on left side of :=")]
    NoNewVariables,
    #[error("undeclared name `{name}`")]
    Undeclared { name: String },
    #[error("undefined type `{name}`")]
    UndefinedType { name: String },
    #[error("`{name}` is not a type")]
    NotAType { name: String },
    #[error("type `{name}` is already defined")]
    TypeRedefined { name: String },
    #[error("invalid operation: mismatched types {left} and {right} for `{op}`")]
    MismatchedTypes {
        op: String,
        left: String,
        right: String,
    },
    #[error("invalid operation: operator `{op}` not defined on {ty}")]
    OperatorNotDefined { op: String, ty: String },
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },
    #[error("cannot use {value} value as {target} value in {context}")]
    CannotUse {
        value: String,
        target: String,
        context: &'static str,
    },
    #[error("cannot assign to constant `{name}`")]
    AssignToConstant { name: String },
    #[error("cannot assign to this expression")]
    NotAssignable,
    #[error("non-boolean condition in {stmt} statement (type {ty})")]
    NonBoolCondition { stmt: &'static str, ty: String },
    #[error("wrong number of arguments in call to `{name}`: have {have}, want {want}")]
    ArgCount {
        name: String,
        have: usize,
        want: String,
    },
    #[error("cannot use {have} as {want} value in argument {index} to `{name}`")]
    ArgType {
        name: String,
        index: usize,
        have: String,
        want: String,
    },
    #[error("cannot call non-function `{name}` (type {ty})")]
    NotAFunction { name: String, ty: String },
    #[error("{call} (no value) used as value")]
    NoValue { call: String },
    #[error("multiple-value {call} in single-value context")]
    MultipleValue { call: String },
    #[error("`{name}` is not a constant expression")]
    NotConstant { name: String },
    #[error("missing initializer for constant `{name}`")]
    MissingConstInit { name: String },
    #[error("array length must be a non-negative integer constant")]
    InvalidArrayLength,
    #[error("cannot index value of type {ty}")]
    NotIndexable { ty: String },
    #[error("index must be an integer (type {ty})")]
    NonIntegerIndex { ty: String },
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfRange { index: i64, len: u64 },
    #[error("too many elements in composite literal of type {ty}")]
    TooManyElements { ty: String },
    #[error("type {ty} has no field `{field}`")]
    UnknownField { ty: String, field: String },
    #[error("cannot convert {from} to {to}")]
    InvalidConversion { from: String, to: String },
    #[error("wrong number of return values: have {have}, want {want}")]
    ReturnCount { have: usize, want: usize },
    #[error("cannot use {have} as {want} value in return statement")]
    ReturnType { have: String, want: String },
    #[error("{keyword} is not in a loop")]
    BranchOutsideLoop { keyword: &'static str },
    #[error("declared and not used: `{name}`")]
    Unused { name: String },
    #[error("function `main` is undeclared in the main package")]
    MissingMain,
    #[error("{what} is not supported")]
    Unsupported { what: String },
}

impl SemanticError {
    pub const fn kind(&self) -> DiagKind {
        use SemanticError as E;
        match self {
            E::Redeclared { .. } | E::NoNewVariables | E::TypeRedefined { .. } => {
                DiagKind::Redeclaration
            }
            E::Undeclared { .. } => DiagKind::Undeclared,
            E::UndefinedType { .. } | E::NotAType { .. } => DiagKind::UndefinedType,
            E::MismatchedTypes { .. } | E::CannotUse { .. } | E::InvalidConversion { .. } => {
                DiagKind::TypeMismatch
            }
            E::OperatorNotDefined { .. }
            | E::InvalidOperation { .. }
            | E::NotAssignable
            | E::NotAFunction { .. }
            | E::NoValue { .. }
            | E::MultipleValue { .. }
            | E::TooManyElements { .. }
            | E::UnknownField { .. } => DiagKind::InvalidOperation,
            E::AssignToConstant { .. } => DiagKind::ConstAssign,
            E::NonBoolCondition { .. } => DiagKind::NonBoolCondition,
            E::ArgCount { .. } => DiagKind::ArgCount,
            E::ArgType { .. } => DiagKind::ArgType,
            E::NotConstant { .. } | E::MissingConstInit { .. } => DiagKind::NotConstant,
            E::InvalidArrayLength
            | E::NotIndexable { .. }
            | E::NonIntegerIndex { .. }
            | E::IndexOutOfRange { .. } => DiagKind::InvalidIndex,
            E::ReturnCount { .. } | E::ReturnType { .. } => DiagKind::ReturnMismatch,
            E::BranchOutsideLoop { .. } => DiagKind::BranchOutsideLoop,
            E::Unused { .. } => DiagKind::UnusedVariable,
            E::MissingMain => DiagKind::MissingMain,
            E::Unsupported { .. } => DiagKind::Unsupported,
        }
    }

    pub const fn severity(&self) -> Severity {
        match self {
            SemanticError::Unused { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn at(&self, span: Span, pos: Pos) -> Diag {
        let mut d = Diag::error(self.kind(), span, pos, self.to_string());
        d.severity = self.severity();
        d
    }
}

/// Unrecoverable failure of a single declaration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("assignment mismatch: {names} variable(s) but {values} value(s) (unpacking is not supported)")]
    UnpackingArity {
        names: usize,
        values: usize,
        span: Span,
        pos: Pos,
    },
}

impl FatalError {
    pub fn diag(&self) -> Diag {
        match self {
            FatalError::UnpackingArity { span, pos, .. } => {
                Diag::error(DiagKind::Unpacking, *span, *pos, self.to_string())
            }
        }
    }
}

// =============================================================================
// Diagnostic sinks
// =============================================================================

/// External reporting facility receiving every detected problem.
pub trait DiagnosticSink {
    fn report(&mut self, diag: &Diag);
}

/// Keeps every diagnostic; the default sink for tests.
#[derive(Debug, Default)]
pub struct Collector {
    diags: Vec<Diag>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diags(&self) -> &[Diag] {
        &self.diags
    }

    pub fn into_diags(self) -> Vec<Diag> {
        self.diags
    }

    pub fn error_count(&self) -> usize {
        self.diags.iter().filter(|d| d.is_error()).count()
    }
}

impl DiagnosticSink for Collector {
    fn report(&mut self, diag: &Diag) {
        self.diags.push(diag.clone());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&mut self, _: &Diag) {}
}

/// Forwards diagnostics to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diag: &Diag) {
        match diag.severity {
            Severity::Error => error!(line = diag.pos.line, col = diag.pos.col, kind = ?diag.kind, "{}", diag.message),
            Severity::Warning => warn!(line = diag.pos.line, col = diag.pos.col, kind = ?diag.kind, "{}", diag.message),
        }
    }
}

/// Side-channel list of recoverable problems accumulated during one compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    list: Vec<Diag>,
    errors: usize,
}

impl Diagnostics {
    pub fn push(&mut self, diag: Diag) {
        tracing::debug!(kind = ?diag.kind, "{diag}");
        if diag.is_error() {
            self.errors += 1;
        }
        self.list.push(diag);
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diag>) {
        for d in diags {
            self.push(d);
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn as_slice(&self) -> &[Diag] {
        &self.list
    }

    pub fn into_vec(self) -> Vec<Diag> {
        self.list
    }
}
