//! Settles types that depended on forward references.
//!
//! Nodes built before a package-level name was declared carry the
//! `pending` flag. Once the whole unit is parsed every pending node is
//! re-inferred children-first; a round can unblock nodes that precede their
//! dependency in source order, so rounds repeat while progress is made.
//! Whatever is left refers to names that were never declared.

use tracing::debug;

use super::Sema;
use crate::ast::{Node, NodeId};
use crate::error::SemanticError;
use crate::walk::post_order;

const MAX_ROUNDS: usize = 8;

pub fn run(sema: &mut Sema, root: NodeId) {
    let order = post_order(&sema.ast, root);

    for round in 0..MAX_ROUNDS {
        let before = pending_count(sema, &order);
        if before == 0 {
            break;
        }
        refresh(sema, &order, true);
        let after = pending_count(sema, &order);
        debug!(round, before, after, "fix-up round");
        if after == before {
            break;
        }
    }

    let mut undeclared = 0usize;
    for &id in &order {
        if !sema.ast.info(id).pending {
            continue;
        }
        if let Node::Ident { sym: Some(sym), .. } = *sema.ast.node(id) {
            if !sema.symbols.symbol(sym).is_declared() {
                let name = sema.symbols.symbol(sym).name.clone();
                let err = SemanticError::Undeclared { name };
                sema.report_node(err, id);
                undeclared += 1;
            }
            sema.ast.info_mut(id).pending = false;
        }
    }
    if undeclared > 0 {
        debug!(undeclared, "unresolved references");
    }

    // Dependents of unresolved names end up `unknown`, which suppresses
    // follow-on errors.
    sema.pending_syms.clear();
    refresh(sema, &order, false);
    for &id in &order {
        sema.ast.info_mut(id).pending = false;
    }
}

fn pending_count(sema: &Sema, order: &[NodeId]) -> usize {
    order.iter().filter(|&&id| sema.ast.info(id).pending).count()
}

fn refresh(sema: &mut Sema, order: &[NodeId], idents: bool) {
    for &id in order {
        if !sema.ast.info(id).pending {
            continue;
        }
        match sema.ast.node(id) {
            Node::Ident { .. } if idents => sema.infer_ident(id),
            Node::Ident { .. } => {}
            Node::BinOp { .. } => sema.infer_binop(id),
            Node::UnaryOp { .. } => sema.infer_unary(id),
            Node::FunctionCall { .. } => sema.infer_call(id),
            Node::Index { .. } => sema.infer_index(id),
            Node::Selector { .. } => sema.infer_selector(id),
            Node::Conversion { .. } => sema.infer_conversion(id),
            Node::VarDecl { .. } => sema.infer_var_decl(id),
            Node::Assignment { .. } => sema.infer_assignment(id),
            Node::ParallelAssign { .. } => sema.infer_parallel(id),
            _ => sema.infer_stmt(id),
        }
    }
}
