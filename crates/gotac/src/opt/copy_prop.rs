//! Copy propagation.
//!
//! Within a straight-line block, after `b = a` every read of `b` becomes a
//! read of `a` until either side is stored to again. The table is emptied at
//! labels and after jumps, and a call forgets every copy involving a
//! package-level variable. Copies whose destination is no longer read
//! anywhere are removed afterwards.

use std::collections::HashMap;

use tracing::trace;

use super::OptContext;
use crate::tac::{IntermediateCode, Operand, Place, Quad};

pub fn run(mut ic: IntermediateCode, ctx: OptContext<'_>) -> IntermediateCode {
    let mut copies: HashMap<Place, Operand> = HashMap::new();
    let global = |p: Option<Place>| matches!(p, Some(Place::Var(v)) if ctx.is_global(v));

    for i in 0..ic.quads.len() {
        if matches!(ic.quads[i], Quad::Label(_)) {
            copies.clear();
            continue;
        }

        let quad = &mut ic.quads[i];
        for op in quad.reads_mut() {
            if let Some(src) = op.place().and_then(|p| copies.get(&p)) {
                trace!(?op, ?src, "propagated copy");
                *op = src.clone();
            }
        }

        if let Some(dest) = quad.dest() {
            copies.remove(&dest);
            copies.retain(|_, src| src.place() != Some(dest));
        }
        if matches!(quad, Quad::Call { .. }) {
            copies.retain(|k, src| !global(Some(*k)) && !global(src.place()));
        }
        if quad.is_jump() {
            copies.clear();
            continue;
        }

        let copy = match &ic.quads[i] {
            Quad::Assign { dest, src } => src
                .place()
                .filter(|&s| s != *dest && ctx.is_scalar(&ic, s) && ctx.is_scalar(&ic, *dest))
                .map(|_| (*dest, src.clone())),
            _ => None,
        };
        if let Some((dest, src)) = copy {
            copies.insert(dest, src);
        }
    }

    let before = ic.len();
    let quads = std::mem::take(&mut ic.quads);
    let mut reads: HashMap<Place, usize> = HashMap::new();
    for op in quads.iter().flat_map(Quad::reads) {
        if let Some(p) = op.place() {
            *reads.entry(p).or_default() += 1;
        }
    }
    let mut kept = Vec::with_capacity(quads.len());
    for quad in &quads {
        let dead_copy = match quad {
            Quad::Assign { dest, src } if src.place().is_some() => {
                let removable = match dest {
                    Place::Temp(_) => true,
                    Place::Var(v) => !ctx.is_observable(*v),
                };
                let own = usize::from(src.place() == Some(*dest));
                removable && reads.get(dest).copied().unwrap_or(0) == own
            }
            _ => false,
        };
        if dead_copy {
            trace!(quad = %ic.render(quad), "elided copy");
        } else {
            kept.push(quad.clone());
        }
    }
    ic.quads = kept;
    trace!(removed = before - ic.len(), "copy propagation done");
    ic
}
