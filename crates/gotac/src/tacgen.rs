//! Lowering of the checked tree into three-address code.
//!
//! Package-level initialisers come first, then every function in source
//! order, then function literals, which are emitted out of line under their
//! `FUNCTION_lit_N` label. Constructs without a lowering rule produce a
//! `NotImplemented` warning and a placeholder operand; generation never
//! stops early.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::ast::{Ast, BinaryOp, KeywordKind, ListRef, Node, NodeId, UnaryOp};
use crate::error::{Diag, DiagKind};
use crate::symbols::{SymbolId, SymbolKind, SymbolTable};
use crate::tac::{
    CallTarget, DoubleOp, IntermediateCode, Label, LoopRegion, Operand, Place, Quad, SingleOp,
};
use crate::types::{TypeId, TypeKind, TypeTable};
use crate::value::ConstValue;

/// Lowers the unit rooted at `root`.
pub fn generate(
    ast: &Ast,
    root: NodeId,
    symbols: &SymbolTable,
    types: &TypeTable,
) -> (IntermediateCode, Vec<Diag>) {
    let mut gen = TacGenerator::new(ast, symbols, types);
    gen.lower_file(root);
    gen.finish()
}

/// Branch targets of the innermost enclosing loop.
struct LoopTargets {
    continue_to: Label,
    break_to: Label,
}

pub struct TacGenerator<'a> {
    ast: &'a Ast,
    symbols: &'a SymbolTable,
    types: &'a TypeTable,
    ic: IntermediateCode,
    diags: Vec<Diag>,
    next_if: u32,
    next_loop: u32,
    loops: Vec<LoopTargets>,
    /// Function literals waiting to be emitted.
    lits: VecDeque<NodeId>,
    /// Result types and named result symbols of the function being lowered.
    results: Vec<TypeId>,
    named_results: Vec<SymbolId>,
}

impl<'a> TacGenerator<'a> {
    pub fn new(ast: &'a Ast, symbols: &'a SymbolTable, types: &'a TypeTable) -> Self {
        Self {
            ast,
            symbols,
            types,
            ic: IntermediateCode::new(),
            diags: Vec::new(),
            next_if: 0,
            next_loop: 0,
            loops: Vec::new(),
            lits: VecDeque::new(),
            results: Vec::new(),
            named_results: Vec::new(),
        }
    }

    pub fn finish(self) -> (IntermediateCode, Vec<Diag>) {
        debug!(
            quads = self.ic.len(),
            temps = self.ic.temps.len(),
            loops = self.ic.loops.len(),
            "TAC generated"
        );
        (self.ic, self.diags)
    }

    fn emit(&mut self, quad: Quad) {
        self.ic.push(quad);
    }

    fn var(&mut self, sym: SymbolId) -> Place {
        self.ic.name_var(sym, &self.symbols.symbol(sym).name);
        Place::Var(sym)
    }

    fn temp(&mut self, ty: Option<TypeId>) -> Place {
        Place::Temp(self.ic.new_temp(ty))
    }

    fn not_implemented(&mut self, id: NodeId) -> Operand {
        let kind = self.ast.node(id).kind_name();
        let pos = self.ast.pos(id);
        warn!(node = kind, line = pos.line, "no lowering rule");
        self.diags.push(Diag::warning(
            DiagKind::NotImplemented,
            self.ast.span(id),
            pos,
            format!("code generation for {kind} is not implemented"),
        ));
        Operand::int(0)
    }

    // -------------------------------------------------------------------------
    // Units and functions
    // -------------------------------------------------------------------------

    pub fn lower_file(&mut self, root: NodeId) {
        let ast = self.ast;
        let Node::File { decls, .. } = ast.node(root) else {
            self.not_implemented(root);
            return;
        };
        let decls = ast.slice(*decls);

        for &d in decls {
            if matches!(ast.node(d), Node::VarDecl { .. } | Node::List(_)) {
                self.stmt(d);
            }
        }
        for &d in decls {
            if let Node::Function {
                name,
                params,
                results,
                body: Some(body),
                ..
            } = ast.node(d)
            {
                self.function(Label::function(name.as_str()), d, *params, *results, *body);
            }
        }
        while let Some(lit) = self.lits.pop_front() {
            if let Node::FuncLit {
                label,
                params,
                results,
                body,
            } = ast.node(lit)
            {
                self.function(Label::function(label.as_str()), lit, *params, *results, *body);
            }
        }
    }

    fn function(
        &mut self,
        label: Label,
        id: NodeId,
        params: ListRef<NodeId>,
        results: ListRef<NodeId>,
        body: NodeId,
    ) {
        let ast = self.ast;
        trace!(%label, "lowering function");
        self.emit(Quad::Label(label));

        let mut slots: Vec<(Option<SymbolId>, Option<TypeId>)> = Vec::new();
        for &p in ast.slice(params) {
            if let Node::ParameterDecl { names, .. } = ast.node(p) {
                let ty = ast.ty(p);
                if names.is_empty() {
                    slots.push((None, ty));
                }
                slots.extend(names.iter().map(|&s| (Some(s), ty)));
            }
        }
        for (sym, ty) in slots.into_iter().rev() {
            let dest = match sym {
                Some(sym) => self.var(sym),
                None => self.temp(ty),
            };
            self.emit(Quad::Double {
                op: DoubleOp::Pop,
                dest,
                operand: None,
            });
        }

        let results_ty = ast
            .ty(id)
            .and_then(|t| self.types.signature(t))
            .map(|sig| sig.results.clone())
            .unwrap_or_default();
        let named: Vec<SymbolId> = ast
            .slice(results)
            .iter()
            .filter_map(|&r| match ast.node(r) {
                Node::ParameterDecl { names, .. } => Some(names.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        for &sym in &named {
            self.zero_init(sym);
        }
        let saved_results = std::mem::replace(&mut self.results, results_ty);
        let saved_named = std::mem::replace(&mut self.named_results, named);

        self.stmt(body);
        let returned = matches!(
            self.ic.quads.last(),
            Some(Quad::Single {
                op: SingleOp::Return,
                ..
            })
        );
        if !returned {
            self.lower_return(&[]);
        }

        self.results = saved_results;
        self.named_results = saved_named;
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    fn stmt(&mut self, id: NodeId) {
        let ast = self.ast;
        match ast.node(id) {
            Node::List(items) => {
                for &s in ast.slice(*items) {
                    self.stmt(s);
                }
            }
            Node::VarDecl {
                sym, init, is_const, ..
            } => {
                if *is_const {
                    return;
                }
                match init {
                    Some(init) => {
                        let ty = self.symbols.symbol(*sym).ty;
                        let src = self.expr_typed(*init, ty);
                        let dest = self.var(*sym);
                        self.emit(Quad::Assign { dest, src });
                    }
                    None => self.zero_init(*sym),
                }
            }
            Node::Assignment { op, target, value } => {
                let ty = ast.ty(*target);
                match op.0 {
                    None => {
                        let src = self.expr_typed(*value, ty);
                        self.store(*target, src);
                    }
                    Some(bin) => self.compound(bin, *target, *value),
                }
            }
            Node::ParallelAssign { targets, values } => {
                let targets = ast.slice(*targets);
                let mut staged = Vec::with_capacity(targets.len());
                for (&t, &v) in targets.iter().zip(ast.slice(*values)) {
                    let src = self.expr_typed(v, ast.ty(t));
                    let src = match src {
                        Operand::Const(_) | Operand::Func(_) => src,
                        other => {
                            let tmp = self.temp(ast.ty(t));
                            self.emit(Quad::Assign {
                                dest: tmp,
                                src: other,
                            });
                            tmp.into()
                        }
                    };
                    staged.push(src);
                }
                for (&t, src) in targets.iter().zip(staged) {
                    self.store(t, src);
                }
            }
            Node::IfStmt {
                init,
                cond,
                then,
                els,
            } => self.lower_if(*init, *cond, *then, *els),
            Node::ForStmt { header, body } => self.lower_for(*header, *body),
            Node::Keyword { kind, values } => match kind {
                KeywordKind::Return => {
                    let values = ast.slice(*values).to_vec();
                    self.lower_return(&values);
                }
                KeywordKind::Break | KeywordKind::Continue => {
                    let Some(targets) = self.loops.last() else {
                        return;
                    };
                    let to = if *kind == KeywordKind::Break {
                        targets.break_to.clone()
                    } else {
                        targets.continue_to.clone()
                    };
                    self.emit(Quad::GoTo(to));
                }
                KeywordKind::Fallthrough => {}
            },
            Node::TypeDecl { .. } | Node::Import { .. } | Node::Bad => {}
            Node::Function { .. } | Node::RangeClause { .. } | Node::ForClause { .. } => {
                self.not_implemented(id);
            }
            _ => {
                self.expr(id);
            }
        }
    }

    /// Zero value of a declaration without initializer.
    fn zero_init(&mut self, sym: SymbolId) {
        let Some(ty) = self.symbols.symbol(sym).ty else {
            return;
        };
        if let Some(zero) = self.zero_value(ty) {
            let dest = self.var(sym);
            self.emit(Quad::Assign {
                dest,
                src: Operand::Const(zero),
            });
            return;
        }
        let size = match self.types.get(self.types.underlying(ty)).kind {
            TypeKind::Array { .. } | TypeKind::Struct { .. } => self.types.storage(ty).unwrap_or(0),
            TypeKind::Slice { .. } => 0,
            _ => return,
        };
        let dest = self.var(sym);
        self.emit(Quad::Double {
            op: DoubleOp::Alloc,
            dest,
            operand: Some(Operand::int(size as i64)),
        });
    }

    fn zero_value(&self, ty: TypeId) -> Option<ConstValue> {
        let t = self.types;
        Some(if t.is_integer(ty) {
            ConstValue::Int(0)
        } else if t.is_float(ty) {
            ConstValue::Float(0.0)
        } else if t.is_bool(ty) {
            ConstValue::Bool(false)
        } else if t.is_string(ty) {
            ConstValue::Str(String::new())
        } else {
            return None;
        })
    }

    fn store(&mut self, target: NodeId, src: Operand) {
        let ast = self.ast;
        match ast.node(target) {
            Node::Ident { sym: Some(sym), .. } => {
                let dest = self.var(*sym);
                self.emit(Quad::Assign { dest, src });
            }
            Node::Ident { sym: None, .. } => {}
            Node::Index { base, index } => {
                let (base, addr) = self.index_address(*base, *index);
                self.emit(Quad::IndexStore { base, addr, src });
            }
            Node::Selector { base, field } => match self.field_address(*base, field) {
                Some((base, addr)) => self.emit(Quad::IndexStore { base, addr, src }),
                None => {
                    self.not_implemented(target);
                }
            },
            _ => {
                self.not_implemented(target);
            }
        }
    }

    /// `target op= value`, including `++` and `--`.
    fn compound(&mut self, op: BinaryOp, target: NodeId, value: NodeId) {
        let ty = self.ast.ty(target);
        let rhs = if op.is_shift() {
            self.expr(value)
        } else {
            self.expr_typed(value, ty)
        };
        if let Node::Ident { sym: Some(sym), .. } = *self.ast.node(target) {
            let dest = self.var(sym);
            self.emit(Quad::Op {
                dest,
                lhs: dest.into(),
                op,
                rhs,
            });
            return;
        }
        let lhs = self.expr(target);
        let dest = self.temp(ty);
        self.emit(Quad::Op { dest, lhs, op, rhs });
        self.store(target, dest.into());
    }

    fn lower_return(&mut self, values: &[NodeId]) {
        let ast = self.ast;
        let operand = match values {
            [] => match self.named_results.clone().as_slice() {
                [] => None,
                [one] => Some(self.var(*one).into()),
                many => {
                    for &sym in many {
                        let v = self.var(sym);
                        self.emit(Quad::Single {
                            op: SingleOp::Push,
                            operand: Some(v.into()),
                        });
                    }
                    None
                }
            },
            // `return f()` forwards every result of `f`.
            [one] if ast.info(*one).multi => {
                self.expr(*one);
                None
            }
            [one] => {
                let ty = self.results.first().copied();
                Some(self.expr_typed(*one, ty))
            }
            many => {
                let mut ops = Vec::with_capacity(many.len());
                for (i, &v) in many.iter().enumerate() {
                    let ty = self.results.get(i).copied();
                    ops.push(self.expr_typed(v, ty));
                }
                for op in ops {
                    self.emit(Quad::Single {
                        op: SingleOp::Push,
                        operand: Some(op),
                    });
                }
                None
            }
        };
        self.emit(Quad::Single {
            op: SingleOp::Return,
            operand,
        });
    }

    fn lower_if(&mut self, init: Option<NodeId>, cond: NodeId, then: NodeId, els: Option<NodeId>) {
        if let Some(init) = init {
            self.stmt(init);
        }
        let c = self.expr(cond);
        self.next_if += 1;
        let n = self.next_if;
        let on_true = Label::generated("if_true", n);
        let on_false = Label::generated("if_false", n);

        self.emit(Quad::CondGoTo {
            cond: c,
            on_true: on_true.clone(),
            on_false: Some(on_false.clone()),
        });
        self.emit(Quad::Label(on_true));
        self.stmt(then);
        match els {
            None => self.emit(Quad::Label(on_false)),
            Some(els) => {
                let end = Label::generated("if_end", n);
                self.emit(Quad::GoTo(end.clone()));
                self.emit(Quad::Label(on_false));
                self.stmt(els);
                self.emit(Quad::Label(end));
            }
        }
    }

    fn lower_for(&mut self, header: Option<NodeId>, body: NodeId) {
        self.next_loop += 1;
        let n = self.next_loop;
        let start = Label::generated("for_start", n);
        let body_label = Label::generated("for_body", n);
        let post_label = Label::generated("for_post", n);
        let end = Label::generated("for_end", n);

        let ast = self.ast;
        let (init, cond, post) = match header.map(|h| (h, ast.node(h))) {
            None => (None, None, None),
            Some((_, Node::ForClause { init, cond, post })) => (*init, *cond, *post),
            Some((
                h,
                Node::RangeClause {
                    key,
                    value,
                    expr,
                    counter,
                    ..
                },
            )) => {
                let range = RangeParts {
                    clause: h,
                    key: *key,
                    value: *value,
                    expr: *expr,
                    counter: *counter,
                };
                self.lower_range(range, body, [start, body_label, post_label, end]);
                return;
            }
            Some((h, _)) => {
                self.not_implemented(h);
                (None, None, None)
            }
        };

        if let Some(init) = init {
            self.stmt(init);
        }
        self.emit(Quad::Label(start.clone()));
        if let Some(cond) = cond {
            let c = self.expr(cond);
            self.emit(Quad::CondGoTo {
                cond: c,
                on_true: body_label.clone(),
                on_false: Some(end.clone()),
            });
        }
        self.emit(Quad::Label(body_label));
        self.loop_body(body, &post_label, &end);
        self.emit(Quad::Label(post_label));
        if let Some(post) = post {
            self.stmt(post);
        }
        self.close_loop(start, end);
    }

    fn loop_body(&mut self, body: NodeId, post: &Label, end: &Label) {
        self.loops.push(LoopTargets {
            continue_to: post.clone(),
            break_to: end.clone(),
        });
        self.stmt(body);
        self.loops.pop();
    }

    fn close_loop(&mut self, start: Label, end: Label) {
        self.emit(Quad::GoTo(start.clone()));
        self.emit(Quad::Label(end.clone()));
        self.ic.loops.push(LoopRegion { start, end });
    }

    /// `for k, v := range coll` over a hidden counter:
    /// `k = counter; v = coll[counter]` while `counter < len(coll)`.
    fn lower_range(&mut self, range: RangeParts, body: NodeId, labels: [Label; 4]) {
        let [start, body_label, post_label, end] = labels;
        let int = self.types.int();
        let coll_ty = self.ast.ty(range.expr);
        let coll = self.expr(range.expr);

        let counter = self.var(range.counter);
        self.emit(Quad::Assign {
            dest: counter,
            src: Operand::int(0),
        });
        let len = match coll_ty.and_then(|t| self.types.array_len(t)) {
            Some(n) => Operand::int(n as i64),
            None => match coll.as_const() {
                Some(ConstValue::Str(s)) => Operand::int(s.len() as i64),
                _ => {
                    self.emit(Quad::Single {
                        op: SingleOp::Push,
                        operand: Some(coll.clone()),
                    });
                    let dest = self.ic.new_temp(Some(int));
                    self.emit(Quad::Call {
                        target: CallTarget::Label(Label::function("len")),
                        argc: 1,
                        dest,
                    });
                    Operand::Temp(dest)
                }
            },
        };

        self.emit(Quad::Label(start.clone()));
        let more = self.temp(Some(self.types.bool()));
        self.emit(Quad::Op {
            dest: more,
            lhs: counter.into(),
            op: BinaryOp::Lt,
            rhs: len,
        });
        self.emit(Quad::CondGoTo {
            cond: more.into(),
            on_true: body_label.clone(),
            on_false: Some(end.clone()),
        });
        self.emit(Quad::Label(body_label));

        if let Some(key) = range.key {
            self.store(key, counter.into());
        }
        if let Some(value) = range.value {
            let elem = coll_ty.and_then(|t| self.types.elem(t));
            let size = elem.and_then(|e| self.types.storage(e)).unwrap_or(8);
            let addr = self.address(coll.clone(), counter.into(), size);
            let dest = self.temp(elem);
            self.emit(Quad::IndexLoad {
                dest,
                base: coll,
                addr,
            });
            self.store(value, dest.into());
        }
        trace!(clause = range.clause.raw(), "range loop");

        self.loop_body(body, &post_label, &end);
        self.emit(Quad::Label(post_label));
        self.emit(Quad::Op {
            dest: counter,
            lhs: counter.into(),
            op: BinaryOp::Add,
            rhs: Operand::int(1),
        });
        self.close_loop(start, end);
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    /// Lowers `id`, representing a constant result in type `ty`.
    fn expr_typed(&mut self, id: NodeId, ty: Option<TypeId>) -> Operand {
        match (self.expr(id), ty) {
            (Operand::Const(c), Some(ty)) => {
                let converted = self.types.convert_const(&c, ty);
                Operand::Const(converted.unwrap_or(c))
            }
            (op, _) => op,
        }
    }

    fn expr(&mut self, id: NodeId) -> Operand {
        let ast = self.ast;
        let info = ast.info(id);
        match ast.node(id) {
            Node::Literal(lit) => Operand::Const(lit.value.clone()),
            Node::Ident { sym: Some(sym), .. } => {
                let s = self.symbols.symbol(*sym);
                match s.kind {
                    SymbolKind::Const => match info.value.as_ref().or(s.value.as_ref()) {
                        Some(v) => Operand::Const(v.clone()),
                        None => self.not_implemented(id),
                    },
                    SymbolKind::Func | SymbolKind::Builtin => Operand::Func(Label::function(s.name.as_str())),
                    SymbolKind::TypeName | SymbolKind::Package => self.not_implemented(id),
                    _ => self.var(*sym).into(),
                }
            }
            Node::QualifiedIdent { package, name } => {
                Operand::Func(Label::function(format!("{package}.{name}")))
            }
            Node::BinOp { op, left, right } => self.binop(id, *op, *left, *right),
            Node::UnaryOp { op, operand } => {
                if let Some(v) = &info.value {
                    return Operand::Const(v.clone());
                }
                if *op == UnaryOp::Plus {
                    return self.expr(*operand);
                }
                let src = self.expr_typed(*operand, info.ty);
                let dest = self.temp(info.ty);
                self.emit(Quad::Unary {
                    dest,
                    op: *op,
                    operand: src,
                });
                dest.into()
            }
            Node::FunctionCall { callee, args } => self.call(id, *callee, *args),
            Node::Conversion { expr, .. } => {
                if let Some(v) = &info.value {
                    return Operand::Const(v.clone());
                }
                let src = self.expr(*expr);
                let Some(ty) = info.ty else {
                    return src;
                };
                let dest = self.temp(Some(ty));
                self.emit(Quad::Convert {
                    dest,
                    ty,
                    ty_name: self.types.name(ty).to_string(),
                    src,
                });
                dest.into()
            }
            Node::Index { base, index } => {
                let (base, addr) = self.index_address(*base, *index);
                let dest = self.temp(info.ty);
                self.emit(Quad::IndexLoad { dest, base, addr });
                dest.into()
            }
            Node::Selector { base, field } => match self.field_address(*base, field) {
                Some((base, addr)) => {
                    let dest = self.temp(info.ty);
                    self.emit(Quad::IndexLoad { dest, base, addr });
                    dest.into()
                }
                None => self.not_implemented(id),
            },
            Node::CompositeLit { elems, .. } => self.composite(id, *elems),
            Node::FuncLit { label, .. } => {
                self.lits.push_back(id);
                Operand::Func(Label::function(label.as_str()))
            }
            _ => self.not_implemented(id),
        }
    }

    fn binop(&mut self, id: NodeId, op: BinaryOp, left: NodeId, right: NodeId) -> Operand {
        let ast = self.ast;
        let ty = ast.ty(id);
        let (l, r) = (ast.info(left), ast.info(right));
        // Constants take the type of the other, typed operand.
        let operand_ty = if op.is_comparison() {
            if l.untyped.is_none() { l.ty } else { r.ty }
        } else {
            ty
        };
        let lhs = self.expr_typed(left, operand_ty);
        let rhs = if op.is_shift() {
            self.expr(right)
        } else {
            self.expr_typed(right, operand_ty)
        };
        let dest = self.temp(ty);
        self.emit(Quad::Op { dest, lhs, op, rhs });
        dest.into()
    }

    fn call(&mut self, id: NodeId, callee: NodeId, args: ListRef<NodeId>) -> Operand {
        let ast = self.ast;
        let info = ast.info(id);
        // `len` of an array or constant string.
        if let Some(v) = &info.value {
            return Operand::Const(v.clone());
        }

        let target = match self.expr(callee) {
            Operand::Func(label) => CallTarget::Label(label),
            other => CallTarget::Indirect(other),
        };
        let sig = ast
            .ty(callee)
            .and_then(|t| self.types.signature(t))
            .cloned()
            .unwrap_or_default();
        let fixed = if sig.variadic {
            sig.params.len().saturating_sub(1)
        } else {
            sig.params.len()
        };

        let args = ast.slice(args);
        let mut ops = Vec::with_capacity(args.len());
        for (i, &a) in args.iter().enumerate() {
            let want = if sig.variadic && i >= fixed {
                sig.params.last().and_then(|&p| self.types.elem(p))
            } else {
                sig.params.get(i).copied()
            };
            ops.push(self.expr_typed(a, want));
        }
        for op in ops {
            self.emit(Quad::Single {
                op: SingleOp::Push,
                operand: Some(op),
            });
        }
        let dest = self.ic.new_temp(info.ty);
        self.emit(Quad::Call {
            target,
            argc: args.len(),
            dest,
        });
        Operand::Temp(dest)
    }

    /// `t = base b; u = i * size; a = t + u`, returning the address.
    fn address(&mut self, base: Operand, index: Operand, size: u64) -> Operand {
        let int = Some(self.types.int());
        let b = self.temp(int);
        self.emit(Quad::Double {
            op: DoubleOp::Base,
            dest: b,
            operand: Some(base),
        });
        let offset = self.temp(int);
        self.emit(Quad::Op {
            dest: offset,
            lhs: index,
            op: BinaryOp::Mul,
            rhs: Operand::int(size as i64),
        });
        let addr = self.temp(int);
        self.emit(Quad::Op {
            dest: addr,
            lhs: b.into(),
            op: BinaryOp::Add,
            rhs: offset.into(),
        });
        addr.into()
    }

    fn index_address(&mut self, base: NodeId, index: NodeId) -> (Operand, Operand) {
        let elem = self.ast.ty(base).and_then(|t| self.types.elem(t));
        let size = elem.and_then(|e| self.types.storage(e)).unwrap_or(8);
        let int = Some(self.types.int());
        let b = self.expr(base);
        let i = self.expr_typed(index, int);
        let addr = self.address(b.clone(), i, size);
        (b, addr)
    }

    fn field_address(&mut self, base: NodeId, field: &str) -> Option<(Operand, Operand)> {
        let base_ty = self.ast.ty(base)?;
        let (offset, _) = self.types.field_offset(base_ty, field)?;
        let int = Some(self.types.int());
        let b = self.expr(base);
        let start = self.temp(int);
        self.emit(Quad::Double {
            op: DoubleOp::Base,
            dest: start,
            operand: Some(b.clone()),
        });
        let addr = self.temp(int);
        self.emit(Quad::Op {
            dest: addr,
            lhs: start.into(),
            op: BinaryOp::Add,
            rhs: Operand::int(offset as i64),
        });
        Some((b, addr.into()))
    }

    /// Storage for the literal, then one store per element at its constant
    /// byte offset.
    fn composite(&mut self, id: NodeId, elems: ListRef<NodeId>) -> Operand {
        let ast = self.ast;
        let Some(ty) = ast.ty(id) else {
            return self.not_implemented(id);
        };
        let fields = self.types.fields(ty).map(<[_]>::to_vec);
        let elem = self.types.elem(ty);
        let elem_size = elem.and_then(|e| self.types.storage(e)).unwrap_or(8);
        let elems = ast.slice(elems);

        let size = self
            .types
            .storage(ty)
            .unwrap_or(elem_size * elems.len() as u64);
        let dest = self.temp(Some(ty));
        self.emit(Quad::Double {
            op: DoubleOp::Alloc,
            dest,
            operand: Some(Operand::int(size as i64)),
        });

        let mut next = 0i64;
        for (i, &e) in elems.iter().enumerate() {
            let Node::KeyedElement { field, key, value } = ast.node(e) else {
                continue;
            };
            let (offset, value_ty) = match &fields {
                Some(fields) => {
                    let named = field.as_deref().or_else(|| fields.get(i).map(|f| f.name.as_str()));
                    match named.and_then(|f| self.types.field_offset(ty, f)) {
                        Some((off, fty)) => (off as i64, Some(fty)),
                        None => continue,
                    }
                }
                None => {
                    let idx = key
                        .and_then(|k| ast.info(k).value.as_ref()?.as_int())
                        .unwrap_or(next);
                    next = idx + 1;
                    (idx * elem_size as i64, elem)
                }
            };
            let src = self.expr_typed(*value, value_ty);
            self.emit(Quad::IndexStore {
                base: dest.into(),
                addr: Operand::int(offset),
                src,
            });
        }
        dest.into()
    }
}

struct RangeParts {
    clause: NodeId,
    key: Option<NodeId>,
    value: Option<NodeId>,
    expr: NodeId,
    counter: SymbolId,
}
