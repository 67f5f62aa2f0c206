use crate::ast::{AssignOp, BinaryOp, KeywordKind, Node, NodeId, NodeInfo};
use crate::error::{FatalError, SemanticError};
use crate::symbols::{Declaration, SymbolId, SymbolKind};
use crate::types::{TypeId, TypeKind};
use crate::value::Lit;

use super::{Loc, Sema, VarName};

impl Sema {
    /// `_` on the left of an assignment.
    pub fn blank(&mut self, loc: Loc) -> NodeId {
        self.alloc(
            Node::Ident {
                name: "_".into(),
                sym: None,
            },
            loc,
        )
    }

    /// Identifier bound to `sym` without counting as a read.
    pub(crate) fn target_ident(&mut self, name: &str, sym: SymbolId, loc: Loc) -> NodeId {
        let id = self.alloc(
            Node::Ident {
                name: name.to_string(),
                sym: Some(sym),
            },
            loc,
        );
        self.infer_ident(id);
        id
    }

    fn is_blank(&self, id: NodeId) -> bool {
        matches!(self.ast.node(id), Node::Ident { name, sym: None } if name == "_")
    }

    // -------------------------------------------------------------------------
    // Assignments
    // -------------------------------------------------------------------------

    /// `a, b = x, y` or `a op= x`.
    pub fn assign(
        &mut self,
        op: AssignOp,
        targets: Vec<NodeId>,
        values: Vec<NodeId>,
        loc: Loc,
    ) -> Result<NodeId, FatalError> {
        if targets.len() != values.len() {
            return Err(FatalError::UnpackingArity {
                names: targets.len(),
                values: values.len(),
                span: loc.span,
                pos: loc.pos,
            });
        }
        if let ([target], [value]) = (targets.as_slice(), values.as_slice()) {
            return Ok(self.assign_one(op, *target, *value, loc));
        }
        if op != AssignOp::PLAIN {
            self.syntax_error(format!("unexpected {op}, expected := or = or comma"), loc);
        }

        for &t in &targets {
            self.check_target(t, true);
        }
        let targets = self.ast.list(targets);
        let values = self.ast.list(values);
        let id = self.alloc(Node::ParallelAssign { targets, values }, loc);
        self.infer_parallel(id);
        Ok(id)
    }

    pub(crate) fn assign_one(&mut self, op: AssignOp, target: NodeId, value: NodeId, loc: Loc) -> NodeId {
        self.check_target(target, op == AssignOp::PLAIN);
        let id = self.alloc(Node::Assignment { op, target, value }, loc);
        self.infer_assignment(id);
        id
    }

    /// `x++` and `x--`.
    pub fn inc_dec(&mut self, target: NodeId, inc: bool, loc: Loc) -> NodeId {
        let (op, text) = if inc {
            (BinaryOp::Add, "++")
        } else {
            (BinaryOp::Sub, "--")
        };
        let one = self.lit(Lit::int(1), loc);
        if let Some(ty) = self.ast.ty(target).filter(|&t| !self.types.is_numeric(t)) {
            self.report(
                SemanticError::OperatorNotDefined {
                    op: text.into(),
                    ty: self.type_name(Some(ty)),
                },
                loc,
            );
            self.check_target(target, false);
            return self.alloc(
                Node::Assignment {
                    op: AssignOp(Some(op)),
                    target,
                    value: one,
                },
                loc,
            );
        }
        self.assign_one(AssignOp(Some(op)), target, one, loc)
    }

    /// Reports targets that cannot be stored to. A plain store does not
    /// count as a read of the variable.
    fn check_target(&mut self, target: NodeId, plain: bool) {
        if self.is_blank(target) {
            return;
        }
        match *self.ast.node(target) {
            Node::Ident { sym: Some(sym), .. } => {
                let pos = self.ast.pos(target);
                if plain {
                    self.symbols.retract_use(sym, pos.line);
                }
                self.symbols.clear_const_flag(sym);
                let s = self.symbols.symbol(sym);
                let err = match s.kind {
                    SymbolKind::Const => Some(SemanticError::AssignToConstant { name: s.name.clone() }),
                    SymbolKind::Func
                    | SymbolKind::TypeName
                    | SymbolKind::Package
                    | SymbolKind::Builtin => Some(SemanticError::NotAssignable),
                    _ => None,
                };
                if let Some(err) = err {
                    self.report_node(err, target);
                }
            }
            Node::Index { base, .. } => {
                if self.ast.ty(base).is_some_and(|t| self.types.is_string(t)) {
                    self.report_node(
                        SemanticError::InvalidOperation {
                            reason: format!("cannot assign to {} (strings are immutable)", self.describe(target)),
                        },
                        target,
                    );
                }
            }
            Node::Selector { .. } | Node::UnaryOp { op: crate::ast::UnaryOp::Deref, .. } => {}
            Node::Ident { sym: None, .. } => {}
            _ => self.report_node(SemanticError::NotAssignable, target),
        }
    }

    pub(crate) fn infer_assignment(&mut self, id: NodeId) {
        let Node::Assignment { op, target, value } = *self.ast.node(id) else {
            return;
        };
        let pos = self.ast.pos(id);
        *self.ast.info_mut(id) = NodeInfo::typed(pos, None);
        if self.is_pending(target) || self.is_pending(value) {
            self.ast.info_mut(id).pending = true;
            return;
        }
        if !self.expect_value(value) {
            return;
        }
        if self.is_blank(target) {
            return;
        }
        let t = self.ast.info(target).clone();
        let v = self.ast.info(value).clone();

        let Some(bin) = op.0 else {
            self.check_assign_value(&v, t.ty, value, "assignment");
            return;
        };
        let (Some(tt), Some(vt)) = (t.ty, v.ty) else {
            return;
        };
        let rhs_ok = if bin.is_shift() {
            self.valid_shift_count(&v)
        } else {
            self.assignable(&v, Some(tt))
        };
        if !rhs_ok {
            self.report(
                SemanticError::MismatchedTypes {
                    op: bin.to_string(),
                    left: self.type_name(Some(tt)),
                    right: self.type_name(Some(vt)),
                },
                self.loc(id),
            );
        } else if !self.op_defined(bin, tt) {
            self.report(
                SemanticError::OperatorNotDefined {
                    op: bin.to_string(),
                    ty: self.type_name(Some(tt)),
                },
                self.loc(id),
            );
        } else if matches!(bin, BinaryOp::Div | BinaryOp::Rem)
            && self.types.is_integer(tt)
            && v.value.as_ref().is_some_and(|c| c.is_zero())
        {
            self.report_node(
                SemanticError::InvalidOperation {
                    reason: "division by zero".into(),
                },
                id,
            );
        }
    }

    pub(crate) fn infer_parallel(&mut self, id: NodeId) {
        let Node::ParallelAssign { targets, values } = *self.ast.node(id) else {
            return;
        };
        let pairs: Vec<(NodeId, NodeId)> = self
            .ast
            .slice(targets)
            .iter()
            .copied()
            .zip(self.ast.slice(values).iter().copied())
            .collect();
        if pairs
            .iter()
            .any(|&(t, v)| self.is_pending(t) || self.is_pending(v))
        {
            self.ast.info_mut(id).pending = true;
            return;
        }
        self.ast.info_mut(id).pending = false;
        for (t, v) in pairs {
            if !self.expect_value(v) || self.is_blank(t) {
                continue;
            }
            let target = self.ast.ty(t);
            let info = self.ast.info(v).clone();
            self.check_assign_value(&info, target, v, "assignment");
        }
    }

    // -------------------------------------------------------------------------
    // Simple statements and blocks
    // -------------------------------------------------------------------------

    /// Expression used as a statement; only calls may be.
    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        let is_call = matches!(self.ast.node(expr), Node::FunctionCall { .. });
        if !is_call && !matches!(self.ast.node(expr), Node::Bad) {
            self.report_node(
                SemanticError::InvalidOperation {
                    reason: format!("{} evaluated but not used", self.describe(expr)),
                },
                expr,
            );
        }
        expr
    }

    pub fn block(&mut self, stmts: Vec<NodeId>, loc: Loc) -> NodeId {
        let list = self.ast.list(stmts);
        self.alloc(Node::List(list), loc)
    }

    /// Placeholder for a construct that failed to parse.
    pub fn bad(&mut self, loc: Loc) -> NodeId {
        self.alloc(Node::Bad, loc)
    }

    // -------------------------------------------------------------------------
    // Control flow
    // -------------------------------------------------------------------------

    /// Checks a condition; returns `false` when it is still pending.
    pub(crate) fn check_cond(&mut self, cond: NodeId, stmt: &'static str) -> bool {
        if self.is_pending(cond) {
            return false;
        }
        if !self.expect_value(cond) {
            return true;
        }
        if let Some(ty) = self.ast.ty(cond).filter(|&t| !self.types.is_bool(t)) {
            self.report_node(
                SemanticError::NonBoolCondition {
                    stmt,
                    ty: self.type_name(Some(ty)),
                },
                cond,
            );
        }
        true
    }

    pub fn if_stmt(
        &mut self,
        init: Option<NodeId>,
        cond: NodeId,
        then: NodeId,
        els: Option<NodeId>,
        loc: Loc,
    ) -> NodeId {
        let settled = self.check_cond(cond, "if");
        let id = self.alloc(
            Node::IfStmt {
                init,
                cond,
                then,
                els,
            },
            loc,
        );
        self.ast.info_mut(id).pending = !settled;
        id
    }

    pub fn for_clause(
        &mut self,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        post: Option<NodeId>,
        loc: Loc,
    ) -> NodeId {
        let settled = cond.map_or(true, |c| self.check_cond(c, "for"));
        let id = self.alloc(Node::ForClause { init, cond, post }, loc);
        self.ast.info_mut(id).pending = !settled;
        id
    }

    pub fn for_stmt(&mut self, header: Option<NodeId>, body: NodeId, loc: Loc) -> NodeId {
        self.alloc(Node::ForStmt { header, body }, loc)
    }

    /// Key and value types when ranging over a value of type `ty`.
    fn range_types(&mut self, expr: NodeId) -> (Option<TypeId>, Option<TypeId>) {
        let int = Some(self.types.int());
        let Some(ty) = self.ast.ty(expr) else {
            return (int, None);
        };
        let underlying = self.types.underlying(ty);
        match self.types.get(underlying).kind {
            TypeKind::Array { elem, .. } | TypeKind::Slice { elem } => (int, Some(elem)),
            _ if self.types.is_string(ty) => (int, Some(self.types.rune())),
            _ => {
                self.report_node(
                    SemanticError::InvalidOperation {
                        reason: format!(
                            "cannot range over {} (type {})",
                            self.describe(expr),
                            self.type_name(Some(ty))
                        ),
                    },
                    expr,
                );
                (int, None)
            }
        }
    }

    /// Hidden index variable driving the lowered loop.
    fn range_counter(&mut self, loc: Loc) -> SymbolId {
        self.range_count += 1;
        let name = format!("range#{}", self.range_count);
        let decl = Declaration::new(SymbolKind::Hidden, loc.pos, Some(self.types.int()));
        match self.symbols.declare_new_variable(&name, decl) {
            Ok(sym) => sym,
            Err(e) => e.existing,
        }
    }

    fn check_range_arity(&mut self, n: usize, loc: Loc) {
        if n > 2 {
            self.syntax_error("range clause permits at most two iteration variables", loc);
        }
    }

    /// `for k, v := range expr`: the names are new variables of the loop
    /// scope.
    pub fn range_define(&mut self, names: Vec<VarName>, expr: NodeId, loc: Loc) -> NodeId {
        self.check_range_arity(names.len(), loc);
        self.expect_value(expr);
        let (key_ty, value_ty) = self.range_types(expr);
        let counter = self.range_counter(loc);

        let mut bound = [None, None];
        for (i, name) in names.into_iter().take(2).enumerate() {
            let ty = if i == 0 { key_ty } else { value_ty };
            let decl = Declaration::new(SymbolKind::Var, name.loc.pos, ty);
            let node = match self.symbols.declare_new_variable(&name.name, decl) {
                Ok(sym) => self.target_ident(&name.name, sym, name.loc),
                Err(e) => {
                    self.report_redeclared(e, name.loc);
                    self.blank(name.loc)
                }
            };
            bound[i] = Some(node);
        }
        let id = self.alloc(
            Node::RangeClause {
                key: bound[0],
                value: bound[1],
                expr,
                define: true,
                counter,
            },
            loc,
        );
        self.ast.info_mut(id).ty = self.ast.ty(expr);
        id
    }

    /// `for k, v = range expr` with existing targets.
    pub fn range_assign(&mut self, targets: Vec<NodeId>, expr: NodeId, loc: Loc) -> NodeId {
        self.check_range_arity(targets.len(), loc);
        self.expect_value(expr);
        let (key_ty, value_ty) = self.range_types(expr);
        let counter = self.range_counter(loc);

        for (i, &t) in targets.iter().take(2).enumerate() {
            self.check_target(t, true);
            if self.is_blank(t) || self.is_pending(t) {
                continue;
            }
            let want = if i == 0 { key_ty } else { value_ty };
            if let (Some(have), Some(target)) = (want, self.ast.ty(t)) {
                if have != target {
                    self.report_node(
                        SemanticError::CannotUse {
                            value: self.type_name(Some(have)),
                            target: self.type_name(Some(target)),
                            context: "range",
                        },
                        t,
                    );
                }
            }
        }
        let id = self.alloc(
            Node::RangeClause {
                key: targets.first().copied(),
                value: targets.get(1).copied(),
                expr,
                define: false,
                counter,
            },
            loc,
        );
        self.ast.info_mut(id).ty = self.ast.ty(expr);
        id
    }

    /// `break`, `continue`, `fallthrough` and `return`.
    pub fn keyword(&mut self, kind: KeywordKind, values: Vec<NodeId>, loc: Loc) -> NodeId {
        match kind {
            KeywordKind::Break | KeywordKind::Continue => {
                if !self.in_loop() {
                    self.report(
                        SemanticError::BranchOutsideLoop {
                            keyword: kind.as_str(),
                        },
                        loc,
                    );
                }
            }
            KeywordKind::Fallthrough => self.report(
                SemanticError::InvalidOperation {
                    reason: "fallthrough statement out of place".into(),
                },
                loc,
            ),
            KeywordKind::Return => {}
        }

        let list = self.ast.list(values.iter().copied());
        let id = self.alloc(Node::Keyword { kind, values: list }, loc);
        if kind == KeywordKind::Return {
            let (want, named) = match self.funcs.last() {
                Some(f) => (f.results.clone(), !f.named_results.is_empty()),
                None => (Vec::new(), false),
            };
            if values.is_empty() {
                if !want.is_empty() && !named {
                    self.report(
                        SemanticError::ReturnCount {
                            have: 0,
                            want: want.len(),
                        },
                        loc,
                    );
                }
            } else if values.iter().any(|&v| self.is_pending(v)) {
                self.ast.info_mut(id).pending = true;
                self.pending_returns.insert(id, want);
            } else {
                self.check_return(id, &values, &want);
            }
        }
        id
    }

    fn check_return(&mut self, id: NodeId, values: &[NodeId], want: &[Option<TypeId>]) {
        // `return f()` forwarding every result of a multi-value call.
        if let [single] = values {
            if self.ast.info(*single).multi {
                let have = self.call_results(*single);
                if have.len() != want.len()
                    || have.iter().zip(want).any(|(h, w)| w.is_some_and(|w| *h != w))
                {
                    self.report_node(
                        SemanticError::ReturnCount {
                            have: have.len(),
                            want: want.len(),
                        },
                        id,
                    );
                }
                return;
            }
        }
        if values.len() != want.len() {
            self.report_node(
                SemanticError::ReturnCount {
                    have: values.len(),
                    want: want.len(),
                },
                id,
            );
            return;
        }
        for (&v, &w) in values.iter().zip(want) {
            if !self.expect_value(v) {
                continue;
            }
            let info = self.ast.info(v).clone();
            if !self.assignable(&info, w) {
                self.report_node(
                    SemanticError::ReturnType {
                        have: self.type_name(info.ty),
                        want: self.type_name(w),
                    },
                    v,
                );
            }
        }
    }

    /// Result types of a call expression.
    fn call_results(&self, call: NodeId) -> Vec<TypeId> {
        let Node::FunctionCall { callee, .. } = *self.ast.node(call) else {
            return Vec::new();
        };
        self.ast
            .ty(callee)
            .and_then(|t| self.types.signature(t))
            .map(|sig| sig.results.clone())
            .unwrap_or_default()
    }

    /// Re-checks a statement whose operands were pending.
    pub(crate) fn infer_stmt(&mut self, id: NodeId) {
        match *self.ast.node(id) {
            Node::IfStmt { cond, .. } => {
                let settled = self.check_cond(cond, "if");
                self.ast.info_mut(id).pending = !settled;
            }
            Node::ForClause { cond: Some(cond), .. } => {
                let settled = self.check_cond(cond, "for");
                self.ast.info_mut(id).pending = !settled;
            }
            Node::Keyword {
                kind: KeywordKind::Return,
                values,
            } => {
                let values = self.ast.slice(values).to_vec();
                if values.iter().any(|&v| self.is_pending(v)) {
                    return;
                }
                self.ast.info_mut(id).pending = false;
                let want = self.pending_returns.remove(&id).unwrap_or_default();
                self.check_return(id, &values, &want);
            }
            _ => self.ast.info_mut(id).pending = false,
        }
    }
}
