//! Constant folding and propagation with strength reduction.
//!
//! Reads of temporaries with a recorded value and of constant variables are
//! replaced by the constant. An operation on two constants becomes an
//! assignment of its result, evaluated in the destination's type: integer
//! destinations truncate and wrap to their width, float destinations divide
//! in floating point. Division or remainder by a constant zero is never
//! folded.
//!
//! With one constant operand, multiplication and division of integers by
//! `2^k` become shifts by `k`, and the algebraic identities (`x*1`, `x*0`,
//! `x+0`, `x-0`, `0/x`, `true&&x`, `false||x` and their mirrors) become
//! plain assignments.

use tracing::{trace, warn};

use super::OptContext;
use crate::ast::BinaryOp;
use crate::tac::{IntermediateCode, Operand, Place, Quad};
use crate::types::TypeId;
use crate::value::ConstValue;

pub fn run(mut ic: IntermediateCode, ctx: OptContext<'_>) -> IntermediateCode {
    for i in 0..ic.quads.len() {
        let mut quad = ic.quads[i].clone();
        substitute(&ic, &mut quad, ctx);
        let quad = simplify(&ic, quad, ctx);

        if let Quad::Assign {
            dest: Place::Temp(t),
            src: Operand::Const(c),
        } = &quad
        {
            if !ic.temp_mut(*t).set_value(c.clone()) {
                warn!(temp = %t, "temporary assigned two different constants");
            }
        }
        ic.quads[i] = quad;
    }
    ic
}

fn substitute(ic: &IntermediateCode, quad: &mut Quad, ctx: OptContext<'_>) {
    for op in quad.reads_mut() {
        let value = match op {
            Operand::Temp(t) => ic.temp(*t).value().cloned(),
            Operand::Var(v) => {
                let sym = ctx.symbols.symbol(*v);
                sym.constant().map(|c| match sym.ty {
                    Some(ty) => ctx.types.convert_const(c, ty).unwrap_or_else(|| c.clone()),
                    None => c.clone(),
                })
            }
            _ => None,
        };
        if let Some(value) = value {
            trace!(value = %value, "propagated constant");
            *op = Operand::Const(value);
        }
    }
}

fn dest_type(ic: &IntermediateCode, ctx: OptContext<'_>, dest: Place) -> Option<TypeId> {
    match dest {
        Place::Temp(t) => ic.temp(t).ty,
        Place::Var(v) => ctx.symbols.symbol(v).ty,
    }
}

fn simplify(ic: &IntermediateCode, quad: Quad, ctx: OptContext<'_>) -> Quad {
    match quad {
        Quad::Op { dest, lhs, op, rhs } => {
            let ty = dest_type(ic, ctx, dest);
            if let (Operand::Const(a), Operand::Const(b)) = (&lhs, &rhs) {
                if let Some(v) = evaluate(op, a, b, ty, ctx) {
                    trace!(%op, lhs = %a, rhs = %b, result = %v, "folded");
                    return Quad::Assign {
                        dest,
                        src: Operand::Const(v),
                    };
                }
                return Quad::Op { dest, lhs, op, rhs };
            }
            reduce(dest, lhs, op, rhs, ty, ctx)
        }
        Quad::Unary {
            dest,
            op,
            operand: Operand::Const(c),
        } => match ConstValue::unary(op, &c).and_then(|v| fit(v, dest_type(ic, ctx, dest), ctx)) {
            Some(v) => Quad::Assign {
                dest,
                src: Operand::Const(v),
            },
            None => Quad::Unary {
                dest,
                op,
                operand: Operand::Const(c),
            },
        },
        Quad::Convert {
            dest,
            ty,
            ty_name,
            src: Operand::Const(c),
        } => {
            let t = ctx.types;
            let folded = match &c {
                ConstValue::Int(_) | ConstValue::Float(_) if t.is_numeric(ty) => {
                    t.convert_const(&c, ty).and_then(|v| fit(v, Some(ty), ctx))
                }
                ConstValue::Str(_) if t.is_string(ty) => Some(c.clone()),
                ConstValue::Bool(_) if t.is_bool(ty) => Some(c.clone()),
                _ => None,
            };
            match folded {
                Some(v) => Quad::Assign {
                    dest,
                    src: Operand::Const(v),
                },
                None => Quad::Convert {
                    dest,
                    ty,
                    ty_name,
                    src: Operand::Const(c),
                },
            }
        }
        other => other,
    }
}

/// `a op b` in the destination's type.
fn evaluate(
    op: BinaryOp,
    a: &ConstValue,
    b: &ConstValue,
    ty: Option<TypeId>,
    ctx: OptContext<'_>,
) -> Option<ConstValue> {
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b.is_zero() {
        warn!(%op, "division by constant zero left unfolded");
        return None;
    }
    let v = if op.is_comparison() || op.is_logical() || op.is_shift() {
        ConstValue::binary(op, a, b)?
    } else {
        match ty {
            Some(ty) if ctx.types.is_float(ty) => ConstValue::binary(op, &a.to_float(), &b.to_float())?,
            Some(ty) if ctx.types.is_integer(ty) => {
                let (a, b) = (a.to_int()?, b.to_int()?);
                if b.is_zero() && matches!(op, BinaryOp::Div | BinaryOp::Rem) {
                    return None;
                }
                ConstValue::binary(op, &a, &b)?
            }
            _ => ConstValue::binary(op, a, b)?,
        }
    };
    fit(v, ty, ctx)
}

/// Integer results wrap to the width of an integer destination.
fn fit(v: ConstValue, ty: Option<TypeId>, ctx: OptContext<'_>) -> Option<ConstValue> {
    match (v, ty) {
        (ConstValue::Int(i), Some(ty)) if ctx.types.is_integer(ty) => {
            let wrapped = ctx.types.wrap_int(i, ty)?;
            if wrapped != i {
                trace!(value = i, wrapped, "wrapped to destination width");
            }
            Some(ConstValue::Int(wrapped))
        }
        (v, _) => Some(v),
    }
}

/// One constant operand: strength reduction and identities.
fn reduce(
    dest: Place,
    lhs: Operand,
    op: BinaryOp,
    rhs: Operand,
    ty: Option<TypeId>,
    ctx: OptContext<'_>,
) -> Quad {
    let integer = ty.is_some_and(|t| ctx.types.is_integer(t));
    let assign = |src: Operand| {
        trace!(%op, "identity simplified");
        Quad::Assign { dest, src }
    };
    let shift = |x: Operand, op: BinaryOp, k: u32| {
        trace!(%op, k, "strength reduced");
        Quad::Op {
            dest,
            lhs: x,
            op,
            rhs: Operand::int(i64::from(k)),
        }
    };
    let l = lhs.as_const().cloned();
    let r = rhs.as_const().cloned();

    match op {
        BinaryOp::Mul => {
            for (c, x) in [(&r, &lhs), (&l, &rhs)] {
                let Some(c) = c else { continue };
                if c.is_one() {
                    return assign(x.clone());
                }
                if c.is_zero() {
                    return assign(Operand::Const(c.zero_like()));
                }
                if let (true, Some(k)) = (integer, c.power_of_two()) {
                    return shift(x.clone(), BinaryOp::Shl, k);
                }
            }
        }
        BinaryOp::Div => {
            if let Some(c) = &r {
                if c.is_one() {
                    return assign(lhs);
                }
                if let (true, Some(k)) = (integer, c.power_of_two()) {
                    return shift(lhs, BinaryOp::Shr, k);
                }
            }
            if let Some(c) = &l {
                if c.is_zero() {
                    return assign(Operand::Const(c.zero_like()));
                }
            }
        }
        BinaryOp::Add => {
            if r.as_ref().is_some_and(ConstValue::is_zero) {
                return assign(lhs);
            }
            if l.as_ref().is_some_and(ConstValue::is_zero) {
                return assign(rhs);
            }
        }
        BinaryOp::Sub => {
            if r.as_ref().is_some_and(ConstValue::is_zero) {
                return assign(lhs);
            }
        }
        BinaryOp::LAnd | BinaryOp::LOr => {
            // `true` is the identity of `&&`, `false` of `||`.
            let identity = op == BinaryOp::LAnd;
            for (c, x) in [(&l, &rhs), (&r, &lhs)] {
                match c.as_ref().and_then(ConstValue::as_bool) {
                    Some(b) if b == identity => return assign(x.clone()),
                    Some(b) => return assign(Operand::Const(ConstValue::Bool(b))),
                    None => {}
                }
            }
        }
        _ => {}
    }
    Quad::Op { dest, lhs, op, rhs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;
    use crate::types::TypeTable;

    #[test]
    fn integer_destination_truncates_division() {
        let (symbols, types) = (SymbolTable::new(), TypeTable::new());
        let mut ic = IntermediateCode::new();
        let t = ic.new_temp(Some(types.int()));
        ic.push(Quad::Op {
            dest: Place::Temp(t),
            lhs: Operand::int(7),
            op: BinaryOp::Div,
            rhs: Operand::int(2),
        });
        let out = run(ic, OptContext::new(&symbols, &types));
        assert_eq!(
            out.quads[0],
            Quad::Assign {
                dest: Place::Temp(t),
                src: Operand::int(3)
            }
        );
    }

    #[test]
    fn zero_divisor_is_left_alone() {
        let (symbols, types) = (SymbolTable::new(), TypeTable::new());
        let mut ic = IntermediateCode::new();
        let t = ic.new_temp(Some(types.int()));
        let quad = Quad::Op {
            dest: Place::Temp(t),
            lhs: Operand::int(7),
            op: BinaryOp::Rem,
            rhs: Operand::int(0),
        };
        ic.push(quad.clone());
        let out = run(ic, OptContext::new(&symbols, &types));
        assert_eq!(out.quads[0], quad);
    }
}
