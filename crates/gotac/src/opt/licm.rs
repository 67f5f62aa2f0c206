//! Loop-invariant code motion.
//!
//! Loop regions come from the generator's [`LoopRegion`] records, innermost
//! loops first. A pure instruction writing a temporary is hoisted in front
//! of the loop's start label when every operand it reads is a constant, a
//! temporary defined outside the loop or already hoisted, or a variable the
//! loop never stores to. Hoisted instructions keep their relative order.

use std::collections::HashSet;

use tracing::trace;

use super::OptContext;
use crate::ast::BinaryOp;
use crate::tac::{DoubleOp, IntermediateCode, LoopRegion, Operand, Place, Quad, TempId};

pub fn run(mut ic: IntermediateCode, ctx: OptContext<'_>) -> IntermediateCode {
    let regions = ic.loops.clone();
    for region in &regions {
        hoist(&mut ic, region, ctx);
    }
    ic
}

/// Instructions that may execute once instead of once per iteration.
fn movable(quad: &Quad) -> bool {
    match quad {
        Quad::Op { dest, op, rhs, .. } => {
            let safe = match op {
                BinaryOp::Div | BinaryOp::Rem => rhs.as_const().is_some_and(|c| !c.is_zero()),
                _ => true,
            };
            safe && matches!(dest, Place::Temp(_))
        }
        Quad::Unary { dest, .. } | Quad::Convert { dest, .. } | Quad::Assign { dest, .. } => {
            matches!(dest, Place::Temp(_))
        }
        Quad::Double {
            op: DoubleOp::Base,
            dest,
            ..
        } => matches!(dest, Place::Temp(_)),
        _ => false,
    }
}

fn hoist(ic: &mut IntermediateCode, region: &LoopRegion, ctx: OptContext<'_>) {
    let (Some(start), Some(end)) = (ic.position(&region.start), ic.position(&region.end)) else {
        return;
    };
    if end <= start {
        return;
    }
    let body = &ic.quads[start + 1..end];
    let defined: HashSet<Place> = body.iter().filter_map(Quad::dest).collect();
    let has_call = body.iter().any(|q| matches!(q, Quad::Call { .. }));

    let mut hoisted: HashSet<TempId> = HashSet::new();
    let mut moved = Vec::new();
    let mut kept = Vec::with_capacity(body.len());

    for quad in body {
        let invariant = movable(quad)
            && quad.reads().iter().all(|op| match op {
                Operand::Const(_) | Operand::Func(_) => true,
                Operand::Temp(t) => hoisted.contains(t) || !defined.contains(&Place::Temp(*t)),
                Operand::Var(v) => {
                    !defined.contains(&Place::Var(*v)) && !(has_call && ctx.is_global(*v))
                }
            });
        if invariant {
            if let Some(Place::Temp(t)) = quad.dest() {
                hoisted.insert(t);
            }
            trace!(quad = %ic.render(quad), loop_start = %region.start, "hoisted");
            moved.push(quad.clone());
        } else {
            kept.push(quad.clone());
        }
    }
    if moved.is_empty() {
        return;
    }

    let mut out = Vec::with_capacity(ic.quads.len());
    out.extend_from_slice(&ic.quads[..start]);
    out.extend(moved);
    out.push(ic.quads[start].clone());
    out.extend(kept);
    out.extend_from_slice(&ic.quads[end..]);
    ic.quads = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;
    use crate::tac::Label;
    use crate::types::TypeTable;

    #[test]
    fn hoists_constant_temp_before_start_label() {
        let (symbols, types) = (SymbolTable::new(), TypeTable::new());
        let mut ic = IntermediateCode::new();
        let t1 = ic.new_temp(None);
        let start = Label::generated("for_start", 1);
        let end = Label::generated("for_end", 1);
        ic.push(Quad::Label(start.clone()));
        ic.push(Quad::Op {
            dest: Place::Temp(t1),
            lhs: Operand::int(4),
            op: BinaryOp::Mul,
            rhs: Operand::int(8),
        });
        ic.push(Quad::GoTo(start.clone()));
        ic.push(Quad::Label(end.clone()));
        ic.loops.push(LoopRegion { start: start.clone(), end });

        let out = run(ic, OptContext::new(&symbols, &types));
        assert!(matches!(out.quads[0], Quad::Op { .. }));
        assert_eq!(out.quads[1], Quad::Label(start));
    }
}
