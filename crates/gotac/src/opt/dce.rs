//! Dead-code elimination.
//!
//! First, instructions after a `return` or unconditional jump are dropped up
//! to the next label. Then, until nothing changes, every instruction without
//! side effects whose destination no remaining instruction reads is removed.
//! Package-level variables and named results count as read.

use std::collections::HashMap;

use tracing::trace;

use super::OptContext;
use crate::tac::{IntermediateCode, Place, Quad};

pub fn run(mut ic: IntermediateCode, ctx: OptContext<'_>) -> IntermediateCode {
    let quads = std::mem::take(&mut ic.quads);
    let mut reachable = Vec::with_capacity(quads.len());
    let mut dead = false;
    for quad in quads {
        if dead && !matches!(quad, Quad::Label(_)) {
            trace!(quad = %ic.render(&quad), "unreachable");
            continue;
        }
        dead = quad.is_terminator();
        reachable.push(quad);
    }
    ic.quads = reachable;

    loop {
        let reads = read_counts(&ic.quads);
        let before = ic.len();
        let quads = std::mem::take(&mut ic.quads);
        let mut kept = Vec::with_capacity(quads.len());
        for quad in quads {
            if is_dead(&quad, &reads, ctx) {
                trace!(quad = %ic.render(&quad), "dead");
            } else {
                kept.push(quad);
            }
        }
        ic.quads = kept;
        if ic.len() == before {
            break;
        }
    }
    ic
}

fn read_counts(quads: &[Quad]) -> HashMap<Place, usize> {
    let mut reads: HashMap<Place, usize> = HashMap::new();
    for op in quads.iter().flat_map(Quad::reads) {
        if let Some(p) = op.place() {
            *reads.entry(p).or_default() += 1;
        }
    }
    reads
}

fn is_dead(quad: &Quad, reads: &HashMap<Place, usize>, ctx: OptContext<'_>) -> bool {
    if quad.has_side_effects() {
        return false;
    }
    let Some(dest) = quad.dest() else {
        return false;
    };
    if let Place::Var(v) = dest {
        if ctx.is_observable(v) {
            return false;
        }
    }
    // `x = x + 1` alone does not keep `x` alive.
    let own = quad.reads().iter().filter(|op| op.place() == Some(dest)).count();
    reads.get(&dest).copied().unwrap_or(0) <= own
}
