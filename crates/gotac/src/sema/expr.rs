use crate::ast::{BinaryOp, Node, NodeId, NodeInfo, UnaryOp};
use crate::error::SemanticError;
use crate::symbols::SymbolKind;
use crate::types::{TypeId, TypeKind};
use crate::value::{ConstValue, Lit, LitKind};

use super::{Loc, Sema};

/// One element of a composite literal as written.
#[derive(Debug, Clone)]
pub struct CompositeElem {
    /// `Name: value` in a struct literal.
    pub field: Option<String>,
    /// `index: value` in an array or slice literal.
    pub key: Option<NodeId>,
    pub value: NodeId,
    pub loc: Loc,
}

impl Sema {
    pub fn lit(&mut self, lit: Lit, loc: Loc) -> NodeId {
        let info = NodeInfo {
            pos: loc.pos,
            ty: Some(self.default_type(lit.kind)),
            untyped: Some(lit.kind),
            value: Some(lit.value.clone()),
            ..NodeInfo::default()
        };
        self.ast.alloc(Node::Literal(lit), loc.span, info)
    }

    /// Identifier used as a value.
    ///
    /// Names not visible yet are pre-registered at package level: Go allows
    /// package-level declarations in any order, so the reference stays
    /// pending until the end of the unit.
    pub fn ident_ref(&mut self, name: &str, loc: Loc) -> NodeId {
        if name == "_" {
            self.report(
                SemanticError::InvalidOperation {
                    reason: "cannot use _ as value".into(),
                },
                loc,
            );
            return self.alloc(
                Node::Ident {
                    name: name.to_string(),
                    sym: None,
                },
                loc,
            );
        }

        let sym = match self.symbols.get_declared(name) {
            Some(sym) => sym,
            None => self.symbols.add_global_if_not_exists(name),
        };
        self.symbols.record_use(sym, loc.pos.line);

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

    /// `pkg.Name` for an imported package. Members of external packages are
    /// not modelled, so the node stays untyped.
    pub fn qualified(&mut self, package: &str, name: &str, loc: Loc) -> NodeId {
        if let Some(sym) = self.symbols.get_declared(package) {
            self.symbols.record_use(sym, loc.pos.line);
        }
        self.alloc(
            Node::QualifiedIdent {
                package: package.to_string(),
                name: name.to_string(),
            },
            loc,
        )
    }

    pub fn selector(&mut self, base: NodeId, field: &str, loc: Loc) -> NodeId {
        let id = self.alloc(
            Node::Selector {
                base,
                field: field.to_string(),
            },
            loc,
        );
        self.infer_selector(id);
        id
    }

    pub fn binop(&mut self, op: BinaryOp, left: NodeId, right: NodeId, loc: Loc) -> NodeId {
        let id = self.alloc(Node::BinOp { op, left, right }, loc);
        self.infer_binop(id);
        id
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId, loc: Loc) -> NodeId {
        if op == UnaryOp::Addr {
            // The variable may now change behind a pointer.
            if let Some(sym) = self.ast.ident_symbol(operand) {
                self.symbols.clear_const_flag(sym);
            }
        }
        let id = self.alloc(Node::UnaryOp { op, operand }, loc);
        self.infer_unary(id);
        id
    }

    /// `callee(args)`; a type in callee position makes it a conversion.
    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>, loc: Loc) -> NodeId {
        if self.is_type_expr(callee) {
            if let [arg] = args.as_slice() {
                return self.conversion(callee, *arg, loc);
            }
            let target = self.type_name(self.ast.ty(callee));
            self.report(
                SemanticError::InvalidOperation {
                    reason: format!("conversion to {target} takes exactly one argument"),
                },
                loc,
            );
        }
        let args = self.ast.list(args);
        let id = self.alloc(Node::FunctionCall { callee, args }, loc);
        self.infer_call(id);
        id
    }

    pub fn index(&mut self, base: NodeId, index: NodeId, loc: Loc) -> NodeId {
        let id = self.alloc(Node::Index { base, index }, loc);
        self.infer_index(id);
        id
    }

    pub fn conversion(&mut self, ty: NodeId, expr: NodeId, loc: Loc) -> NodeId {
        let id = self.alloc(Node::Conversion { ty, expr }, loc);
        self.infer_conversion(id);
        id
    }

    pub fn composite(&mut self, ty: NodeId, elems: Vec<CompositeElem>, loc: Loc) -> NodeId {
        // `[...]T{..}` takes its length from the element count.
        if let Node::ArrayType { len: None, elem } = *self.ast.node(ty) {
            if let Some(elem_ty) = self.ast.ty(elem) {
                let count = self.composite_extent(&elems);
                let arr = self.types.array_of(elem_ty, count);
                self.ast.info_mut(ty).ty = Some(arr);
            }
        }
        let lit_ty = self.ast.ty(ty);

        if let Some(lit_ty) = lit_ty {
            self.check_composite(lit_ty, &elems);
        }

        let mut ids = Vec::with_capacity(elems.len());
        for e in elems {
            let info = NodeInfo {
                pos: e.loc.pos,
                ty: self.ast.ty(e.value),
                ..NodeInfo::default()
            };
            let node = Node::KeyedElement {
                field: e.field,
                key: e.key,
                value: e.value,
            };
            ids.push(self.ast.alloc(node, e.loc.span, info));
        }
        let elems = self.ast.list(ids);
        let id = self.alloc(Node::CompositeLit { ty, elems }, loc);
        self.ast.info_mut(id).ty = lit_ty;
        id
    }

    fn composite_extent(&self, elems: &[CompositeElem]) -> u64 {
        let mut next = 0u64;
        let mut max = 0u64;
        for e in elems {
            let idx = e
                .key
                .and_then(|k| self.ast.info(k).value.as_ref()?.as_int())
                .and_then(|k| u64::try_from(k).ok())
                .unwrap_or(next);
            next = idx + 1;
            max = max.max(next);
        }
        max
    }

    fn check_composite(&mut self, lit_ty: TypeId, elems: &[CompositeElem]) {
        let underlying = self.types.underlying(lit_ty);
        match self.types.get(underlying).kind.clone() {
            TypeKind::Array { elem, .. } | TypeKind::Slice { elem } => {
                let len = self.types.array_len(lit_ty);
                let mut next = 0i64;
                for e in elems {
                    if e.field.is_some() {
                        self.report(
                            SemanticError::InvalidOperation {
                                reason: "field name in array or slice literal".into(),
                            },
                            e.loc,
                        );
                        continue;
                    }
                    let idx = match e.key {
                        Some(k) => match self.ast.info(k).value.as_ref().and_then(ConstValue::as_int) {
                            Some(i) if i >= 0 => i,
                            _ => {
                                self.report(SemanticError::InvalidArrayLength, e.loc);
                                next
                            }
                        },
                        None => next,
                    };
                    next = idx + 1;
                    if let Some(len) = len {
                        if idx as u64 >= len {
                            let err = match e.key {
                                Some(_) => SemanticError::IndexOutOfRange { index: idx, len },
                                None => SemanticError::TooManyElements {
                                    ty: self.type_name(Some(lit_ty)),
                                },
                            };
                            self.report(err, e.loc);
                            if e.key.is_none() {
                                break;
                            }
                        }
                    }
                    self.check_element(e.value, elem, "array or slice literal");
                }
            }
            TypeKind::Struct { fields } => {
                if elems.iter().any(|e| e.field.is_some()) {
                    for e in elems {
                        let Some(name) = &e.field else {
                            self.report(
                                SemanticError::InvalidOperation {
                                    reason: "mixture of field:value and value elements in struct literal"
                                        .into(),
                                },
                                e.loc,
                            );
                            continue;
                        };
                        match fields.iter().find(|f| &f.name == name) {
                            Some(f) => self.check_element(e.value, f.ty, "struct literal"),
                            None => self.report(
                                SemanticError::UnknownField {
                                    ty: self.type_name(Some(lit_ty)),
                                    field: name.clone(),
                                },
                                e.loc,
                            ),
                        }
                    }
                } else {
                    if elems.len() > fields.len() {
                        self.report(
                            SemanticError::TooManyElements {
                                ty: self.type_name(Some(lit_ty)),
                            },
                            elems[fields.len()].loc,
                        );
                    }
                    for (e, f) in elems.iter().zip(fields.iter()) {
                        self.check_element(e.value, f.ty, "struct literal");
                    }
                }
            }
            _ => {
                let loc = elems.first().map(|e| e.loc).unwrap_or_default();
                self.report(
                    SemanticError::InvalidOperation {
                        reason: format!(
                            "invalid composite literal type {}",
                            self.type_name(Some(lit_ty))
                        ),
                    },
                    loc,
                );
            }
        }
    }

    fn check_element(&mut self, value: NodeId, target: TypeId, context: &'static str) {
        if !self.expect_value(value) || self.is_pending(value) {
            return;
        }
        let info = self.ast.info(value).clone();
        if !self.assignable(&info, Some(target)) {
            self.report_node(
                SemanticError::CannotUse {
                    value: self.type_name(info.ty),
                    target: self.type_name(Some(target)),
                    context,
                },
                value,
            );
        }
    }

    // -------------------------------------------------------------------------
    // Inference (shared by construction and the fix-up pass)
    // -------------------------------------------------------------------------

    pub(crate) fn infer_ident(&mut self, id: NodeId) {
        let Node::Ident { sym: Some(sym), .. } = *self.ast.node(id) else {
            return;
        };
        let s = self.symbols.symbol(sym);
        let pending = !s.is_declared() || self.pending_syms.contains(&sym);
        let ty = s.ty;
        let untyped = if s.untyped { ty.and_then(|t| self.lit_kind_of(t)) } else { None };
        let value = if s.is_const { s.value.clone() } else { None };

        let info = self.ast.info_mut(id);
        info.ty = ty;
        info.untyped = untyped;
        info.value = value;
        info.pending = pending;
    }

    pub(crate) fn infer_selector(&mut self, id: NodeId) {
        let Node::Selector { base, ref field } = *self.ast.node(id) else {
            return;
        };
        let field = field.clone();
        if self.is_pending(base) {
            self.ast.info_mut(id).pending = true;
            return;
        }
        self.ast.info_mut(id).pending = false;
        let Some(bt) = self.ast.ty(base) else {
            return;
        };
        let found = self
            .types
            .fields(bt)
            .and_then(|fs| fs.iter().find(|f| f.name == field))
            .map(|f| f.ty);
        match found {
            Some(ty) => self.ast.info_mut(id).ty = Some(ty),
            None => self.report_node(
                SemanticError::UnknownField {
                    ty: self.type_name(Some(bt)),
                    field,
                },
                id,
            ),
        }
    }

    pub(crate) fn infer_binop(&mut self, id: NodeId) {
        let Node::BinOp { op, left, right } = *self.ast.node(id) else {
            return;
        };
        let pos = self.ast.pos(id);
        *self.ast.info_mut(id) = NodeInfo::typed(pos, None);

        if self.is_pending(left) || self.is_pending(right) {
            self.ast.info_mut(id).pending = true;
            return;
        }
        if !self.expect_value(left) | !self.expect_value(right) {
            return;
        }
        let l = self.ast.info(left).clone();
        let r = self.ast.info(right).clone();
        let (Some(lt), Some(rt)) = (l.ty, r.ty) else {
            return;
        };

        let mismatch = |s: &Sema| SemanticError::MismatchedTypes {
            op: op.to_string(),
            left: s.type_name(Some(lt)),
            right: s.type_name(Some(rt)),
        };

        // Type the operands share, and the untyped kind when both are untyped.
        let (operand_ty, untyped) = if op.is_shift() {
            if !self.valid_shift_count(&r) {
                self.report_node(
                    SemanticError::InvalidOperation {
                        reason: format!("shift count type {}, must be integer", self.type_name(Some(rt))),
                    },
                    id,
                );
                return;
            }
            (lt, l.untyped)
        } else {
            match (l.untyped, r.untyped) {
                (Some(a), Some(b)) => {
                    let mixed = a != b && (a.rank() == 0 || b.rank() == 0);
                    if mixed {
                        let err = mismatch(self);
                        self.report_node(err, id);
                        return;
                    }
                    let kind = if a.rank() >= b.rank() { a } else { b };
                    (self.default_type(kind), Some(kind))
                }
                (Some(_), None) if self.assignable(&l, Some(rt)) => (rt, None),
                (None, Some(_)) if self.assignable(&r, Some(lt)) => (lt, None),
                (None, None) if lt == rt => (lt, None),
                _ => {
                    let err = mismatch(self);
                    self.report_node(err, id);
                    return;
                }
            }
        };

        let defined = self.op_defined(op, operand_ty);
        if !defined {
            self.report_node(
                SemanticError::OperatorNotDefined {
                    op: op.to_string(),
                    ty: self.type_name(Some(operand_ty)),
                },
                id,
            );
            return;
        }

        if matches!(op, BinaryOp::Div | BinaryOp::Rem)
            && self.types.is_integer(operand_ty)
            && r.value.as_ref().is_some_and(ConstValue::is_zero)
        {
            self.report_node(
                SemanticError::InvalidOperation {
                    reason: "division by zero".into(),
                },
                id,
            );
        }

        let value = match (&l.value, &r.value) {
            (Some(a), Some(b)) if op.is_shift() => ConstValue::binary(op, a, b),
            (Some(a), Some(b)) => {
                let a = self.convert_const(a, operand_ty);
                let b = self.convert_const(b, operand_ty);
                a.zip(b).and_then(|(a, b)| ConstValue::binary(op, &a, &b))
            }
            _ => None,
        };

        let info = self.ast.info_mut(id);
        if op.is_comparison() {
            info.ty = Some(self.types.bool());
            info.untyped = Some(LitKind::Bool);
        } else {
            info.ty = Some(operand_ty);
            info.untyped = untyped;
        }
        info.value = value;
    }

    /// Whether binary `op` applies to operands of type `ty`.
    pub(crate) fn op_defined(&self, op: BinaryOp, ty: TypeId) -> bool {
        let t = &self.types;
        match op {
            BinaryOp::Add => t.is_numeric(ty) || t.is_string(ty),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => t.is_numeric(ty),
            BinaryOp::Rem
            | BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Xor
            | BinaryOp::AndNot
            | BinaryOp::Shl
            | BinaryOp::Shr => t.is_integer(ty),
            BinaryOp::LAnd | BinaryOp::LOr => t.is_bool(ty),
            BinaryOp::Eq | BinaryOp::Ne => t.is_comparable(ty),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => t.is_ordered(ty),
        }
    }

    /// Whether `info` can be used as a shift count.
    pub(crate) fn valid_shift_count(&self, info: &NodeInfo) -> bool {
        info.ty.map_or(true, |t| self.types.is_integer(t))
            || (info.untyped == Some(LitKind::Float)
                && matches!(info.value, Some(ConstValue::Float(f)) if f.fract() == 0.0))
    }

    pub(crate) fn infer_unary(&mut self, id: NodeId) {
        let Node::UnaryOp { op, operand } = *self.ast.node(id) else {
            return;
        };
        let pos = self.ast.pos(id);
        *self.ast.info_mut(id) = NodeInfo::typed(pos, None);

        if self.is_pending(operand) {
            self.ast.info_mut(id).pending = true;
            return;
        }
        if !self.expect_value(operand) {
            return;
        }
        let o = self.ast.info(operand).clone();
        let Some(ty) = o.ty else {
            return;
        };

        let t = &self.types;
        let defined = match op {
            UnaryOp::Plus | UnaryOp::Neg => t.is_numeric(ty),
            UnaryOp::Not => t.is_bool(ty),
            UnaryOp::BitNot => t.is_integer(ty),
            // Pointer types are not modelled.
            UnaryOp::Addr | UnaryOp::Deref => return,
        };
        if !defined {
            self.report_node(
                SemanticError::OperatorNotDefined {
                    op: op.to_string(),
                    ty: self.type_name(Some(ty)),
                },
                id,
            );
            return;
        }

        let value = o.value.as_ref().and_then(|v| ConstValue::unary(op, v));
        let info = self.ast.info_mut(id);
        info.ty = Some(ty);
        info.untyped = o.untyped;
        info.value = value;
    }

    pub(crate) fn infer_call(&mut self, id: NodeId) {
        let Node::FunctionCall { callee, args } = *self.ast.node(id) else {
            return;
        };
        let args: Vec<NodeId> = self.ast.slice(args).to_vec();
        let pos = self.ast.pos(id);
        *self.ast.info_mut(id) = NodeInfo::typed(pos, None);

        if self.is_pending(callee) || args.iter().any(|&a| self.is_pending(a)) {
            self.ast.info_mut(id).pending = true;
            return;
        }

        if let Some(sym) = self.ast.ident_symbol(callee) {
            if self.symbols.symbol(sym).kind == SymbolKind::Builtin {
                let name = self.symbols.symbol(sym).name.clone();
                self.builtin_call(id, &name, &args);
                return;
            }
        }

        let name = self.describe(callee);
        let Some(callee_ty) = self.ast.ty(callee) else {
            for &a in &args {
                self.expect_value(a);
            }
            return;
        };
        let Some(sig) = self.types.signature(callee_ty).cloned() else {
            self.report_node(
                SemanticError::NotAFunction {
                    name,
                    ty: self.type_name(Some(callee_ty)),
                },
                callee,
            );
            return;
        };

        let sites = self
            .ast
            .ident_symbol(callee)
            .and_then(|s| self.param_sites.get(&s))
            .cloned()
            .unwrap_or_default();
        let decl = self
            .ast
            .ident_symbol(callee)
            .and_then(|s| self.symbols.symbol(s).decl);

        let fixed = if sig.variadic {
            sig.params.len().saturating_sub(1)
        } else {
            sig.params.len()
        };
        let count_ok = if sig.variadic {
            args.len() >= fixed
        } else {
            args.len() == fixed
        };

        if !count_ok {
            let want: Vec<String> = sig
                .params
                .iter()
                .map(|&p| self.type_name(Some(p)))
                .collect();
            let err = SemanticError::ArgCount {
                name,
                have: args.len(),
                want: format!("({})", want.join(", ")),
            };
            let loc = self.loc(id);
            self.report_related(err, loc, "function declared here", decl);
        } else {
            for (i, &arg) in args.iter().enumerate() {
                if !self.expect_value(arg) {
                    continue;
                }
                let want = if sig.variadic && i >= fixed {
                    sig.params.last().and_then(|&p| self.types.elem(p))
                } else {
                    sig.params.get(i).copied()
                };
                let info = self.ast.info(arg).clone();
                if !self.assignable(&info, want) {
                    let err = SemanticError::ArgType {
                        name: name.clone(),
                        index: i + 1,
                        have: self.type_name(info.ty),
                        want: self.type_name(want),
                    };
                    let loc = self.loc(arg);
                    let site = sites.get(i.min(sites.len().saturating_sub(1))).copied().or(decl);
                    self.report_related(err, loc, "parameter declared here", site);
                }
            }
        }

        let info = self.ast.info_mut(id);
        match sig.results.as_slice() {
            [] => info.no_value = true,
            [one] => info.ty = Some(*one),
            _ => info.multi = true,
        }
    }

    fn builtin_call(&mut self, id: NodeId, name: &str, args: &[NodeId]) {
        for &a in args {
            self.expect_value(a);
        }
        if name != "len" {
            self.ast.info_mut(id).no_value = true;
            return;
        }

        let int = self.types.int();
        self.ast.info_mut(id).ty = Some(int);
        let [arg] = args else {
            self.report_node(
                SemanticError::ArgCount {
                    name: name.to_string(),
                    have: args.len(),
                    want: "(value)".into(),
                },
                id,
            );
            return;
        };
        let Some(ty) = self.ast.ty(*arg) else {
            return;
        };
        if let Some(len) = self.types.array_len(ty) {
            self.ast.info_mut(id).value = i64::try_from(len).ok().map(ConstValue::Int);
        } else if let Some(ConstValue::Str(s)) = &self.ast.info(*arg).value {
            let n = s.len() as i64;
            self.ast.info_mut(id).value = Some(ConstValue::Int(n));
        } else if self.types.elem(ty).is_none() {
            self.report_node(
                SemanticError::InvalidOperation {
                    reason: format!(
                        "invalid argument: {} (type {}) for len",
                        self.describe(*arg),
                        self.type_name(Some(ty))
                    ),
                },
                *arg,
            );
        }
    }

    pub(crate) fn infer_index(&mut self, id: NodeId) {
        let Node::Index { base, index } = *self.ast.node(id) else {
            return;
        };
        let pos = self.ast.pos(id);
        *self.ast.info_mut(id) = NodeInfo::typed(pos, None);

        if self.is_pending(base) || self.is_pending(index) {
            self.ast.info_mut(id).pending = true;
            return;
        }
        if !self.expect_value(base) | !self.expect_value(index) {
            return;
        }
        let Some(bt) = self.ast.ty(base) else {
            return;
        };
        let Some(elem) = self.types.elem(bt) else {
            self.report_node(
                SemanticError::NotIndexable {
                    ty: self.type_name(Some(bt)),
                },
                id,
            );
            return;
        };
        self.ast.info_mut(id).ty = Some(elem);

        let idx = self.ast.info(index).clone();
        let integral = match idx.untyped {
            Some(LitKind::Int | LitKind::Rune) => true,
            Some(LitKind::Float) => matches!(idx.value, Some(ConstValue::Float(f)) if f.fract() == 0.0),
            Some(_) => false,
            None => idx.ty.map_or(true, |t| self.types.is_integer(t)),
        };
        if !integral {
            self.report_node(
                SemanticError::NonIntegerIndex {
                    ty: self.type_name(idx.ty),
                },
                index,
            );
            return;
        }

        if let Some(i) = idx.value.as_ref().and_then(|v| v.to_int()).and_then(|v| v.as_int()) {
            let len = self.types.array_len(bt);
            if i < 0 || len.is_some_and(|len| i as u64 >= len) {
                self.report_node(
                    SemanticError::IndexOutOfRange {
                        index: i,
                        len: len.unwrap_or(0),
                    },
                    index,
                );
            }
        }
    }

    pub(crate) fn infer_conversion(&mut self, id: NodeId) {
        let Node::Conversion { ty, expr } = *self.ast.node(id) else {
            return;
        };
        let target = self.ast.ty(ty);
        let pos = self.ast.pos(id);
        *self.ast.info_mut(id) = NodeInfo::typed(pos, target);

        if self.is_pending(expr) {
            self.ast.info_mut(id).pending = true;
            return;
        }
        if !self.expect_value(expr) {
            return;
        }
        let e = self.ast.info(expr).clone();
        let (Some(target), Some(from)) = (target, e.ty) else {
            return;
        };

        let t = &self.types;
        let ok = self.assignable(&e, Some(target))
            || (t.is_numeric(from) && t.is_numeric(target))
            || ((t.is_integer(from) || t.is_string(from)) && t.is_string(target))
            || t.underlying(from) == t.underlying(target);
        if !ok {
            self.report_node(
                SemanticError::InvalidConversion {
                    from: self.type_name(Some(from)),
                    to: self.type_name(Some(target)),
                },
                id,
            );
            return;
        }

        if self.types.is_numeric(target) {
            let value = e.value.as_ref().and_then(|v| self.convert_const(v, target));
            self.ast.info_mut(id).value = value;
        }
    }
}
