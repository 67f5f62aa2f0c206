use crate::ast::*;

// Core traits
pub trait Walk<'ast> {
    fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast Ast, v: &mut V);
}

pub trait Visitor<'ast> {
    /// Default: descend into the children.
    #[inline(always)]
    fn visit_node(&mut self, a: &'ast Ast, id: NodeId) {
        a.node(id).walk(a, self);
    }
}

impl<'ast> Walk<'ast> for NodeId {
    #[inline(always)]
    fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast Ast, v: &mut V) {
        v.visit_node(a, *self);
    }
}

impl<'ast> Walk<'ast> for ListRef<NodeId> {
    #[inline(always)]
    fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast Ast, v: &mut V) {
        for item in a.slice(*self) {
            item.walk(a, v);
        }
    }
}

impl<'ast, T: Walk<'ast>> Walk<'ast> for Option<T> {
    #[inline(always)]
    fn walk<V: Visitor<'ast> + ?Sized>(&self, a: &'ast Ast, v: &mut V) {
        if let Some(x) = self {
            x.walk(a, v);
        }
    }
}

/// Collects node ids children-first.
#[derive(Debug, Default)]
pub struct PostOrder {
    pub order: Vec<NodeId>,
}

impl<'ast> Visitor<'ast> for PostOrder {
    fn visit_node(&mut self, a: &'ast Ast, id: NodeId) {
        a.node(id).walk(a, self);
        self.order.push(id);
    }
}

/// Every node reachable from `root`, children before parents.
pub fn post_order(ast: &Ast, root: NodeId) -> Vec<NodeId> {
    let mut v = PostOrder::default();
    v.visit_node(ast, root);
    v.order
}

/// Counts reachable nodes per kind.
#[derive(Debug, Default)]
pub struct KindCounter {
    pub counts: std::collections::BTreeMap<&'static str, usize>,
}

impl<'ast> Visitor<'ast> for KindCounter {
    fn visit_node(&mut self, a: &'ast Ast, id: NodeId) {
        *self.counts.entry(a.node(id).kind_name()).or_default() += 1;
        a.node(id).walk(a, self);
    }
}
