//! Intermediate-code optimizer.
//!
//! A fixed pipeline, each pass running once per call: loop-invariant code
//! motion, constant folding with strength reduction, copy propagation and
//! dead-code elimination. Every pass consumes the previous pass's code and
//! returns a new [`IntermediateCode`].

pub mod copy_prop;
pub mod dce;
pub mod fold;
pub mod licm;

use tracing::debug;

use crate::symbols::{SymbolId, SymbolKind, SymbolTable, ROOT_SCOPE};
use crate::tac::{IntermediateCode, Place};
use crate::types::{TypeKind, TypeTable};

/// Tables the passes consult for variable constness, scope and types.
#[derive(Clone, Copy)]
pub struct OptContext<'a> {
    pub symbols: &'a SymbolTable,
    pub types: &'a TypeTable,
}

impl<'a> OptContext<'a> {
    pub fn new(symbols: &'a SymbolTable, types: &'a TypeTable) -> Self {
        Self { symbols, types }
    }

    /// Package-level variables are visible to every function.
    pub fn is_global(&self, sym: SymbolId) -> bool {
        self.symbols.symbol(sym).scope_id == ROOT_SCOPE
    }

    /// Stores to these variables are observable after the function returns.
    pub fn is_observable(&self, sym: SymbolId) -> bool {
        self.is_global(sym) || self.symbols.symbol(sym).kind == SymbolKind::Result
    }

    /// Basic-typed values; arrays and structs are copied by value and never
    /// aliased through propagation.
    pub fn is_scalar(&self, ic: &IntermediateCode, place: Place) -> bool {
        let ty = match place {
            Place::Temp(t) => ic.temp(t).ty,
            Place::Var(v) => self.symbols.symbol(v).ty,
        };
        ty.is_some_and(|t| matches!(self.types.get(self.types.underlying(t)).kind, TypeKind::Basic(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSet {
    pub licm: bool,
    pub fold: bool,
    pub copy_prop: bool,
    pub dce: bool,
}

impl Default for PassSet {
    fn default() -> Self {
        Self::all()
    }
}

impl PassSet {
    pub const fn all() -> Self {
        Self {
            licm: true,
            fold: true,
            copy_prop: true,
            dce: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            licm: false,
            fold: false,
            copy_prop: false,
            dce: false,
        }
    }

    pub const fn any_enabled(&self) -> bool {
        self.licm || self.fold || self.copy_prop || self.dce
    }
}

/// Runs the enabled passes in pipeline order.
pub fn optimize(ic: &IntermediateCode, ctx: OptContext<'_>, passes: PassSet) -> IntermediateCode {
    let mut code = ic.clone();
    let pipeline: [(&str, bool, fn(IntermediateCode, OptContext<'_>) -> IntermediateCode); 4] = [
        ("licm", passes.licm, licm::run),
        ("fold", passes.fold, fold::run),
        ("copy_prop", passes.copy_prop, copy_prop::run),
        ("dce", passes.dce, dce::run),
    ];
    for (name, enabled, pass) in pipeline {
        if !enabled {
            continue;
        }
        let before = code.len();
        code = pass(code, ctx);
        debug!(pass = name, before, after = code.len(), "optimization pass");
    }
    code
}
