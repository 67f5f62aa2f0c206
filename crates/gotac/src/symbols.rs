//! Scope-stack symbol table.
//!
//! Scopes are named by dotted paths (`1`, `1.2`, `1.2.1`). Each depth keeps a
//! sibling counter that only ever grows while its parent is open, so a path is
//! never handed out twice in one compilation and a symbol declared in a closed
//! block can never collide with a later sibling's.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::error::Pos;
use crate::types::TypeId;
use crate::value::ConstValue;

pub const ROOT_SCOPE: &str = "1";

/// Names the language predeclares as functions.
pub const BUILTINS: [&str; 3] = ["len", "print", "println"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Var,
    Const,
    Param,
    Result,
    Func,
    TypeName,
    Package,
    Builtin,
    /// Compiler-introduced (range counters).
    Hidden,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope_id: String,
    pub kind: SymbolKind,
    /// Declaration site; `None` while the symbol is only pre-registered.
    pub decl: Option<Pos>,
    pub ty: Option<TypeId>,
    pub is_const: bool,
    /// Every store so far wrote `value`, a compile-time constant.
    pub const_flag: bool,
    /// Constant without an explicit type (`const x = 3`).
    pub untyped: bool,
    pub value: Option<ConstValue>,
    /// Lines of every read.
    pub uses: Vec<u32>,
}

impl Symbol {
    fn pending(name: &str, scope_id: &str) -> Self {
        Self {
            name: name.to_string(),
            scope_id: scope_id.to_string(),
            kind: SymbolKind::Var,
            decl: None,
            ty: None,
            is_const: false,
            const_flag: false,
            untyped: false,
            value: None,
            uses: Vec::new(),
        }
    }

    #[inline]
    pub fn is_declared(&self) -> bool {
        self.decl.is_some()
    }

    /// Value usable as a compile-time constant.
    pub fn constant(&self) -> Option<&ConstValue> {
        if self.is_const || self.const_flag {
            self.value.as_ref()
        } else {
            None
        }
    }
}

/// Declaration of a name already declared in the same block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("`{name}` redeclared in this block")]
pub struct Redeclared {
    pub name: String,
    pub existing: SymbolId,
    pub previous: Option<Pos>,
}

/// Everything known about a name at its declaration.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: SymbolKind,
    pub pos: Pos,
    pub ty: Option<TypeId>,
    pub is_const: bool,
    pub value: Option<ConstValue>,
}

impl Declaration {
    pub fn new(kind: SymbolKind, pos: Pos, ty: Option<TypeId>) -> Self {
        Self {
            kind,
            pos,
            ty,
            is_const: kind == SymbolKind::Const,
            value: None,
        }
    }

    pub fn with_value(mut self, value: Option<ConstValue>) -> Self {
        self.value = value;
        self
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: HashMap<String, HashMap<String, SymbolId>>,
    stack: Vec<String>,
    counters: Vec<u32>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            symbols: Vec::with_capacity(64),
            scopes: HashMap::new(),
            stack: vec![ROOT_SCOPE.to_string()],
            counters: vec![0; 4],
        };
        table.scopes.insert(ROOT_SCOPE.to_string(), HashMap::new());
        for name in BUILTINS {
            let id = table.add_if_not_exists(name);
            let sym = table.symbol_mut(id);
            sym.kind = SymbolKind::Builtin;
            sym.decl = Some(Pos::default());
        }
        table
    }

    // -------------------------------------------------------------------------
    // Scopes
    // -------------------------------------------------------------------------

    /// Depth of the innermost open scope; the root is depth 1.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn current_scope(&self) -> &str {
        self.stack.last().map_or(ROOT_SCOPE, String::as_str)
    }

    pub fn enter_scope(&mut self) -> &str {
        let depth = self.depth() + 1;
        if self.counters.len() <= depth + 1 {
            self.counters.resize(depth + 2, 0);
        }
        self.counters[depth] += 1;
        let path = format!("{}.{}", self.current_scope(), self.counters[depth]);
        tracing::trace!(scope = %path, "enter scope");
        self.scopes.entry(path.clone()).or_default();
        self.stack.push(path);
        self.current_scope()
    }

    /// Closes the innermost scope. The root scope is never closed.
    pub fn leave_scope(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let depth = self.depth();
        if let Some(path) = self.stack.pop() {
            tracing::trace!(scope = %path, "leave scope");
        }
        // Children of the closed scope restart numbering under the next sibling.
        if let Some(c) = self.counters.get_mut(depth + 1) {
            *c = 0;
        }
    }

    // -------------------------------------------------------------------------
    // Declarations
    // -------------------------------------------------------------------------

    fn insert(&mut self, scope: &str, name: &str) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::pending(name, scope));
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string(), id);
        id
    }

    /// Pre-registers `name` in the current scope without declaring it.
    pub fn add_if_not_exists(&mut self, name: &str) -> SymbolId {
        let scope = self.current_scope().to_string();
        match self.lookup_in(&scope, name) {
            Some(id) => id,
            None => self.insert(&scope, name),
        }
    }

    /// Pre-registers `name` at package level; used for forward references.
    pub fn add_global_if_not_exists(&mut self, name: &str) -> SymbolId {
        match self.lookup_in(ROOT_SCOPE, name) {
            Some(id) => id,
            None => self.insert(ROOT_SCOPE, name),
        }
    }

    /// Declares `name` in the current scope.
    ///
    /// A pre-registered symbol becomes declared in place, so earlier forward
    /// references resolve to it.
    pub fn declare_new_variable(&mut self, name: &str, decl: Declaration) -> Result<SymbolId, Redeclared> {
        let id = self.add_if_not_exists(name);
        let sym = &mut self.symbols[id.index()];
        if sym.is_declared() && name != "_" {
            return Err(Redeclared {
                name: name.to_string(),
                existing: id,
                previous: sym.decl,
            });
        }
        if sym.is_declared() {
            // Each blank identifier is a fresh, unreachable symbol.
            let scope = sym.scope_id.clone();
            let fresh = SymbolId(self.symbols.len() as u32);
            self.symbols.push(Symbol::pending(name, &scope));
            return Ok(self.fill(fresh, decl));
        }
        Ok(self.fill(id, decl))
    }

    fn fill(&mut self, id: SymbolId, decl: Declaration) -> SymbolId {
        let sym = &mut self.symbols[id.index()];
        sym.kind = decl.kind;
        sym.decl = Some(decl.pos);
        sym.ty = decl.ty;
        sym.is_const = decl.is_const;
        sym.const_flag = decl.is_const && decl.value.is_some();
        sym.value = decl.value;
        id
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    fn lookup_in(&self, scope: &str, name: &str) -> Option<SymbolId> {
        self.scopes.get(scope)?.get(name).copied()
    }

    /// Innermost-first search through the open scopes.
    pub fn get_symbol(&self, name: &str) -> Option<SymbolId> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| self.lookup_in(scope, name))
    }

    /// Like [`get_symbol`](Self::get_symbol) but skips pre-registered entries.
    pub fn get_declared(&self, name: &str) -> Option<SymbolId> {
        self.stack.iter().rev().find_map(|scope| {
            self.lookup_in(scope, name)
                .filter(|id| self.symbols[id.index()].is_declared())
        })
    }

    pub fn lookup_current(&self, name: &str) -> Option<SymbolId> {
        self.lookup_in(self.current_scope(), name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.get_declared(name).is_some()
    }

    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    #[inline]
    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    // -------------------------------------------------------------------------
    // Usage and constness
    // -------------------------------------------------------------------------

    pub fn record_use(&mut self, id: SymbolId, line: u32) {
        self.symbols[id.index()].uses.push(line);
    }

    /// Undoes the last use recorded at `line` (an identifier that turned out
    /// to be an assignment target).
    pub fn retract_use(&mut self, id: SymbolId, line: u32) {
        let uses = &mut self.symbols[id.index()].uses;
        if let Some(i) = uses.iter().rposition(|&l| l == line) {
            uses.remove(i);
        }
    }

    /// A store of the constant `value` into a variable that had none.
    pub fn set_const_flag(&mut self, id: SymbolId, value: ConstValue) {
        let sym = &mut self.symbols[id.index()];
        if !sym.is_const {
            sym.const_flag = true;
            sym.value = Some(value);
        }
    }

    pub fn clear_const_flag(&mut self, id: SymbolId) {
        let sym = &mut self.symbols[id.index()];
        if !sym.is_const {
            sym.const_flag = false;
            sym.value = None;
        }
    }

    /// Declared variables that are never read.
    ///
    /// Parameters, named results, `_`, package-level symbols, functions,
    /// types and packages are exempt.
    pub fn check_unused(&self) -> Vec<SymbolId> {
        self.iter()
            .filter(|(_, s)| {
                s.is_declared()
                    && s.uses.is_empty()
                    && s.name != "_"
                    && s.scope_id != ROOT_SCOPE
                    && matches!(s.kind, SymbolKind::Var | SymbolKind::Const)
            })
            .map(|(id, _)| id)
            .collect()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:<10} {:<9} {:<8} {:<6} {:<10} {}",
            "NAME", "SCOPE", "KIND", "DECL", "CONST", "VALUE", "USES"
        )?;
        for (_, s) in self.iter().filter(|(_, s)| s.kind != SymbolKind::Builtin) {
            let decl = s.decl.map_or_else(|| "-".to_string(), |p| p.to_string());
            let value = s.value.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
            let uses: Vec<String> = s.uses.iter().map(u32::to_string).collect();
            writeln!(
                f,
                "{:<16} {:<10} {:<9} {:<8} {:<6} {:<10} [{}]",
                s.name,
                s.scope_id,
                format!("{:?}", s.kind),
                decl,
                s.is_const || s.const_flag,
                value,
                uses.join(", ")
            )?;
        }
        Ok(())
    }
}
