use crate::ast::{ListRef, Node, NodeId, NodeInfo};
use crate::error::{FatalError, SemanticError};
use crate::symbols::{Declaration, SymbolId, SymbolKind};
use crate::types::{Field, Signature, TypeId, TypeKind};
use crate::value::ConstValue;

use super::{FuncCtx, Loc, Sema};

/// A name being declared, with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarName {
    pub name: String,
    pub loc: Loc,
}

impl VarName {
    pub fn new(name: impl Into<String>, loc: Loc) -> Self {
        Self {
            name: name.into(),
            loc,
        }
    }
}

/// `a, b int` or `args ...string` after parameter grouping.
#[derive(Debug, Clone)]
pub struct ParamGroup {
    pub names: Vec<VarName>,
    pub ty: NodeId,
    pub variadic: bool,
    pub loc: Loc,
}

/// A function whose body is being parsed.
#[derive(Debug)]
pub struct FuncHeader {
    name: String,
    sym: Option<SymbolId>,
    ty: Option<TypeId>,
    params: ListRef<NodeId>,
    results: ListRef<NodeId>,
}

impl Sema {
    pub fn package_clause(&mut self, name: &str) {
        self.package = Some(name.to_string());
    }

    pub fn import(&mut self, alias: Option<VarName>, path: String, loc: Loc) -> NodeId {
        let name = match &alias {
            Some(a) => a.name.clone(),
            None => path.rsplit('/').next().unwrap_or(&path).to_string(),
        };
        let sym = if name == "_" || name == "." {
            None
        } else {
            let decl = Declaration::new(SymbolKind::Package, loc.pos, None);
            match self.symbols.declare_new_variable(&name, decl) {
                Ok(sym) => Some(sym),
                Err(e) => {
                    self.report_redeclared(e, alias.map_or(loc, |a| a.loc));
                    None
                }
            }
        };
        self.alloc(Node::Import { path, sym }, loc)
    }

    pub fn file(&mut self, imports: Vec<NodeId>, decls: Vec<NodeId>, loc: Loc) -> NodeId {
        let imports = self.ast.list(imports);
        let decls = self.ast.list(decls);
        let package = self.package.clone();
        self.alloc(
            Node::File {
                package,
                imports,
                decls,
            },
            loc,
        )
    }

    // -------------------------------------------------------------------------
    // Type expressions
    // -------------------------------------------------------------------------

    /// Predeclared type name (`int`, `string`, ...).
    pub fn basic_type(&mut self, name: &str, loc: Loc) -> NodeId {
        let ty = self.types.lookup(name);
        let id = self.alloc(Node::TypeName(name.to_string()), loc);
        self.ast.info_mut(id).ty = ty;
        id
    }

    /// Identifier in type position.
    pub fn named_type(&mut self, name: &str, loc: Loc) -> NodeId {
        let ty = match self.symbols.get_declared(name) {
            Some(sym) if self.symbols.symbol(sym).kind == SymbolKind::TypeName => {
                self.symbols.record_use(sym, loc.pos.line);
                self.symbols.symbol(sym).ty
            }
            Some(_) => {
                self.report(SemanticError::NotAType { name: name.into() }, loc);
                None
            }
            None => {
                self.report(SemanticError::UndefinedType { name: name.into() }, loc);
                None
            }
        };
        let id = self.alloc(Node::TypeName(name.to_string()), loc);
        self.ast.info_mut(id).ty = ty;
        id
    }

    /// `[len]elem`; `len` is `None` for `[...]elem`, which only a composite
    /// literal can complete.
    pub fn array_type(&mut self, len: Option<NodeId>, elem: NodeId, loc: Loc) -> NodeId {
        let id = self.alloc(Node::ArrayType { len, elem }, loc);
        let Some(len) = len else {
            return id;
        };
        let n = self
            .ast
            .info(len)
            .value
            .as_ref()
            .and_then(ConstValue::to_int)
            .and_then(|v| v.as_int())
            .and_then(|v| u64::try_from(v).ok());
        let ty = match n {
            Some(n) => self.ast.ty(elem).map(|e| self.types.array_of(e, n)),
            None => {
                self.report_node(SemanticError::InvalidArrayLength, len);
                None
            }
        };
        self.ast.info_mut(id).ty = ty;
        id
    }

    pub fn slice_type(&mut self, elem: NodeId, loc: Loc) -> NodeId {
        let id = self.alloc(Node::SliceType { elem }, loc);
        let ty = self.ast.ty(elem).map(|e| self.types.slice_of(e));
        self.ast.info_mut(id).ty = ty;
        id
    }

    pub fn struct_type(&mut self, fields: Vec<(Vec<VarName>, NodeId)>, loc: Loc) -> NodeId {
        let mut resolved: Option<Vec<Field>> = Some(Vec::new());
        let mut nodes = Vec::with_capacity(fields.len());
        for (names, ty) in fields {
            let field_ty = self.ast.ty(ty);
            for n in &names {
                let dup = resolved
                    .as_ref()
                    .is_some_and(|fs| fs.iter().any(|f| f.name == n.name));
                if dup {
                    self.report(SemanticError::Redeclared { name: n.name.clone() }, n.loc);
                }
                match (&mut resolved, field_ty) {
                    (Some(fs), Some(t)) => fs.push(Field {
                        name: n.name.clone(),
                        ty: t,
                    }),
                    _ => resolved = None,
                }
            }
            let loc = names.first().map_or(loc, |n| n.loc);
            let names = names.into_iter().map(|n| n.name).collect();
            let node = self.alloc(Node::FieldDecl { names, ty }, loc);
            self.ast.info_mut(node).ty = field_ty;
            nodes.push(node);
        }
        let fields = self.ast.list(nodes);
        let id = self.alloc(Node::StructType { fields }, loc);
        let ty = resolved.map(|fs| self.types.struct_of(fs));
        self.ast.info_mut(id).ty = ty;
        id
    }

    pub fn func_type(&mut self, params: Vec<ParamGroup>, results: Vec<ParamGroup>, loc: Loc) -> NodeId {
        let ty = self
            .signature_of(&params, &results)
            .map(|sig| self.types.function(sig));
        let params = self.param_nodes(params, None);
        let results = self.param_nodes(results, None);
        let id = self.alloc(Node::FuncType { params, results }, loc);
        self.ast.info_mut(id).ty = ty;
        id
    }

    fn group_type(&mut self, g: &ParamGroup) -> Option<TypeId> {
        let ty = self.ast.ty(g.ty)?;
        Some(if g.variadic {
            self.types.slice_of(ty)
        } else {
            ty
        })
    }

    /// Flattened types of a parameter list (`a, b int` counts twice).
    fn flat_types(&mut self, groups: &[ParamGroup]) -> Vec<Option<TypeId>> {
        let mut out = Vec::new();
        for g in groups {
            let ty = self.group_type(g);
            out.extend(std::iter::repeat(ty).take(g.names.len().max(1)));
        }
        out
    }

    fn signature_of(&mut self, params: &[ParamGroup], results: &[ParamGroup]) -> Option<Signature> {
        let variadic = params.last().is_some_and(|g| g.variadic);
        let params = self.flat_types(params).into_iter().collect::<Option<Vec<_>>>()?;
        let results = self.flat_types(results).into_iter().collect::<Option<Vec<_>>>()?;
        Some(Signature {
            params,
            variadic,
            results,
        })
    }

    /// Parameter nodes; with `kind` set the names are declared in the current
    /// scope.
    fn param_nodes(&mut self, groups: Vec<ParamGroup>, kind: Option<SymbolKind>) -> ListRef<NodeId> {
        let mut nodes = Vec::with_capacity(groups.len());
        for g in groups {
            let ty = self.group_type(&g);
            let mut syms = Vec::with_capacity(g.names.len());
            if let Some(kind) = kind {
                for n in &g.names {
                    let decl = Declaration::new(kind, n.loc.pos, ty);
                    match self.symbols.declare_new_variable(&n.name, decl) {
                        Ok(sym) => syms.push(sym),
                        Err(e) => self.report_redeclared(e, n.loc),
                    }
                }
            }
            let node = self.alloc(
                Node::ParameterDecl {
                    names: syms,
                    ty: g.ty,
                    variadic: g.variadic,
                },
                g.loc,
            );
            self.ast.info_mut(node).ty = ty;
            nodes.push(node);
        }
        self.ast.list(nodes)
    }

    // -------------------------------------------------------------------------
    // Declarations
    // -------------------------------------------------------------------------

    /// One `var` or `const` spec: `a, b T = x, y`.
    ///
    /// Identifier and value counts must match; destructuring a multi-value
    /// expression is not supported and fails the whole spec.
    pub fn var_spec(
        &mut self,
        names: Vec<VarName>,
        ty: Option<NodeId>,
        values: Vec<NodeId>,
        is_const: bool,
        loc: Loc,
    ) -> Result<Vec<NodeId>, FatalError> {
        if !values.is_empty() && values.len() != names.len() {
            return Err(FatalError::UnpackingArity {
                names: names.len(),
                values: values.len(),
                span: loc.span,
                pos: loc.pos,
            });
        }
        let declared = ty.and_then(|t| self.ast.ty(t));
        let mut out = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate() {
            let init = values.get(i).copied();
            if is_const && init.is_none() {
                self.report(
                    SemanticError::MissingConstInit {
                        name: name.name.clone(),
                    },
                    name.loc,
                );
            }
            out.push(self.declare_var(name, ty, declared, init, is_const));
        }
        Ok(out)
    }

    /// `a, b := x, y`. At least one name must be new in the current block;
    /// the others are plain assignments.
    pub fn short_var_decl(
        &mut self,
        names: Vec<VarName>,
        values: Vec<NodeId>,
        loc: Loc,
    ) -> Result<Vec<NodeId>, FatalError> {
        if values.len() != names.len() {
            return Err(FatalError::UnpackingArity {
                names: names.len(),
                values: values.len(),
                span: loc.span,
                pos: loc.pos,
            });
        }
        let existing: Vec<Option<SymbolId>> = names
            .iter()
            .map(|n| {
                self.symbols
                    .lookup_current(&n.name)
                    .filter(|&s| n.name != "_" && self.symbols.symbol(s).is_declared())
            })
            .collect();
        let fresh = names
            .iter()
            .zip(&existing)
            .any(|(n, e)| e.is_none() && n.name != "_");
        if !fresh {
            self.report(SemanticError::NoNewVariables, loc);
        }

        let mut out = Vec::with_capacity(names.len());
        for ((name, value), prior) in names.into_iter().zip(values).zip(existing) {
            let node = match prior {
                Some(sym) => {
                    let target = self.target_ident(&name.name, sym, name.loc);
                    self.assign_one(crate::ast::AssignOp::PLAIN, target, value, name.loc.to(self.loc(value)))
                }
                None => self.declare_var(name, None, None, Some(value), false),
            };
            out.push(node);
        }
        Ok(out)
    }

    fn declare_var(
        &mut self,
        name: VarName,
        ty_node: Option<NodeId>,
        declared: Option<TypeId>,
        init: Option<NodeId>,
        is_const: bool,
    ) -> NodeId {
        let mut sym_ty = declared;
        let mut value = None;
        let mut untyped = false;
        let mut pending = false;

        if let Some(init) = init {
            if self.is_pending(init) {
                pending = true;
            } else if self.expect_value(init) {
                let info = self.ast.info(init).clone();
                if is_const && info.value.is_none() && info.ty.is_some() {
                    self.report_node(
                        SemanticError::NotConstant {
                            name: self.describe(init),
                        },
                        init,
                    );
                }
                if ty_node.is_some() {
                    self.check_assign_value(&info, declared, init, "variable declaration");
                    value = match (info.value, declared) {
                        (Some(v), Some(t)) => self.convert_const(&v, t),
                        _ => None,
                    };
                } else {
                    sym_ty = match info.untyped {
                        Some(kind) => Some(self.default_type(kind)),
                        None => info.ty,
                    };
                    untyped = is_const && info.untyped.is_some();
                    value = info.value;
                }
            }
        }

        let kind = if is_const {
            SymbolKind::Const
        } else {
            SymbolKind::Var
        };
        let decl = Declaration::new(kind, name.loc.pos, sym_ty)
            .with_value(if is_const { value.clone() } else { None });
        let sym = match self.symbols.declare_new_variable(&name.name, decl) {
            Ok(sym) => {
                self.symbols.symbol_mut(sym).untyped = untyped;
                if let Some(v) = value.filter(|_| !is_const && self.is_scalar(sym_ty)) {
                    self.symbols.set_const_flag(sym, v);
                }
                if pending && ty_node.is_none() {
                    self.pending_syms.insert(sym);
                }
                sym
            }
            Err(e) => {
                let existing = e.existing;
                self.report_redeclared(e, name.loc);
                existing
            }
        };

        let span = init.map_or(name.loc.span, |i| name.loc.span.to(self.ast.span(i)));
        let info = NodeInfo {
            pos: name.loc.pos,
            ty: sym_ty,
            pending,
            ..NodeInfo::default()
        };
        self.ast.alloc(
            Node::VarDecl {
                sym,
                ty: ty_node,
                init,
                is_const,
            },
            span,
            info,
        )
    }

    fn is_scalar(&self, ty: Option<TypeId>) -> bool {
        ty.is_some_and(|t| matches!(self.types.get(self.types.underlying(t)).kind, TypeKind::Basic(_)))
    }

    pub(crate) fn check_assign_value(
        &mut self,
        info: &NodeInfo,
        target: Option<TypeId>,
        at: NodeId,
        context: &'static str,
    ) {
        if !self.assignable(info, target) {
            self.report_node(
                SemanticError::CannotUse {
                    value: self.type_name(info.ty),
                    target: self.type_name(target),
                    context,
                },
                at,
            );
        }
    }

    /// Re-types a declaration whose initializer was pending.
    pub(crate) fn infer_var_decl(&mut self, id: NodeId) {
        let Node::VarDecl {
            sym,
            ty,
            init: Some(init),
            ..
        } = *self.ast.node(id)
        else {
            return;
        };
        if self.is_pending(init) {
            return;
        }
        self.ast.info_mut(id).pending = false;
        self.pending_syms.remove(&sym);
        if !self.expect_value(init) {
            return;
        }
        let info = self.ast.info(init).clone();
        if ty.is_some() {
            let target = self.symbols.symbol(sym).ty;
            self.check_assign_value(&info, target, init, "variable declaration");
        } else {
            let resolved = match info.untyped {
                Some(kind) => Some(self.default_type(kind)),
                None => info.ty,
            };
            self.symbols.symbol_mut(sym).ty = resolved;
            self.ast.info_mut(id).ty = resolved;
        }
    }

    /// `type Name T` or `type Name = T`.
    pub fn type_decl(&mut self, name: VarName, ty: NodeId, alias: bool, loc: Loc) -> NodeId {
        let scope = self.symbols.current_scope().to_string();
        let already = self
            .symbols
            .lookup_current(&name.name)
            .is_some_and(|s| self.symbols.symbol(s).is_declared());

        let mut declared = None;
        if !already {
            if let Some(target) = self.ast.ty(ty) {
                let registered = if alias {
                    self.types.alias(&name.name, &scope, target)
                } else {
                    self.types.define_named(&name.name, &scope, target)
                };
                match registered {
                    Ok(id) => declared = Some(id),
                    Err(e) => self.report(e, name.loc),
                }
            }
        }

        let decl = Declaration::new(SymbolKind::TypeName, name.loc.pos, declared);
        if let Err(e) = self.symbols.declare_new_variable(&name.name, decl) {
            self.report_redeclared(e, name.loc);
        }

        let id = self.alloc(
            Node::TypeDecl {
                name: name.name,
                ty,
                alias,
            },
            loc,
        );
        self.ast.info_mut(id).ty = declared;
        id
    }

    // -------------------------------------------------------------------------
    // Functions
    // -------------------------------------------------------------------------

    /// Declares the function at package level, opens its scope and declares
    /// parameters and named results there. The body block opens its own
    /// scope inside this one.
    pub fn begin_function(
        &mut self,
        name: VarName,
        params: Vec<ParamGroup>,
        results: Vec<ParamGroup>,
    ) -> FuncHeader {
        let ty = self
            .signature_of(&params, &results)
            .map(|sig| self.types.function(sig));

        if name.name == "main" && (!params.is_empty() || !results.is_empty()) {
            self.report(
                SemanticError::InvalidOperation {
                    reason: "func main must have no arguments and no return values".into(),
                },
                name.loc,
            );
        }

        let decl = Declaration::new(SymbolKind::Func, name.loc.pos, ty);
        let sym = match self.symbols.declare_new_variable(&name.name, decl) {
            Ok(sym) => Some(sym),
            Err(e) => {
                self.report_redeclared(e, name.loc);
                None
            }
        };
        if let Some(sym) = sym {
            let sites = params
                .iter()
                .flat_map(|g| {
                    let n = g.names.len().max(1);
                    (0..n).map(move |i| g.names.get(i).map_or(g.loc.pos, |v| v.loc.pos))
                })
                .collect();
            self.param_sites.insert(sym, sites);
        }

        self.enter_function(name.name, sym, ty, params, results)
    }

    pub fn end_function(&mut self, header: FuncHeader, body: Option<NodeId>, loc: Loc) -> NodeId {
        self.leave_function();
        let id = self.alloc(
            Node::Function {
                name: header.name,
                sym: header.sym,
                params: header.params,
                results: header.results,
                body,
            },
            loc,
        );
        self.ast.info_mut(id).ty = header.ty;
        id
    }

    pub fn begin_func_lit(&mut self, params: Vec<ParamGroup>, results: Vec<ParamGroup>) -> FuncHeader {
        let ty = self
            .signature_of(&params, &results)
            .map(|sig| self.types.function(sig));
        self.lit_count += 1;
        let label = format!("lit_{}", self.lit_count);
        self.enter_function(label, None, ty, params, results)
    }

    pub fn end_func_lit(&mut self, header: FuncHeader, body: NodeId, loc: Loc) -> NodeId {
        self.leave_function();
        let id = self.alloc(
            Node::FuncLit {
                label: header.name,
                params: header.params,
                results: header.results,
                body,
            },
            loc,
        );
        self.ast.info_mut(id).ty = header.ty;
        id
    }

    fn enter_function(
        &mut self,
        name: String,
        sym: Option<SymbolId>,
        ty: Option<TypeId>,
        params: Vec<ParamGroup>,
        results: Vec<ParamGroup>,
    ) -> FuncHeader {
        let result_types = self.flat_types(&results);
        self.open_scope();
        let params = self.param_nodes(params, Some(SymbolKind::Param));
        let results = self.param_nodes(results, Some(SymbolKind::Result));
        let named_results = self
            .ast
            .slice(results)
            .iter()
            .flat_map(|&r| match self.ast.node(r) {
                Node::ParameterDecl { names, .. } => names.clone(),
                _ => Vec::new(),
            })
            .collect();
        self.funcs.push(FuncCtx {
            results: result_types,
            named_results,
            loops: 0,
        });
        FuncHeader {
            name,
            sym,
            ty,
            params,
            results,
        }
    }

    fn leave_function(&mut self) {
        self.funcs.pop();
        self.close_scope();
    }
}
