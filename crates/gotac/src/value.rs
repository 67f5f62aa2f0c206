//! Compile-time constant values.
//!
//! The lexer decodes literals into [`ConstValue`]s, the checker evaluates
//! constant expressions with them, and the folding pass reuses the same
//! arithmetic so both agree on overflow and division-by-zero behaviour.

use std::fmt;

use crate::ast::{BinaryOp, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// Primitive kind of a literal as written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LitKind {
    Int,
    Float,
    Rune,
    String,
    Bool,
}

impl LitKind {
    /// Name of the type an untyped constant of this kind defaults to.
    pub const fn default_type(self) -> &'static str {
        match self {
            LitKind::Int => "int",
            LitKind::Float => "float64",
            LitKind::Rune => "rune",
            LitKind::String => "string",
            LitKind::Bool => "bool",
        }
    }

    /// Rank used when two untyped constants meet: the larger kind wins.
    pub const fn rank(self) -> u8 {
        match self {
            LitKind::Bool | LitKind::String => 0,
            LitKind::Int => 1,
            LitKind::Rune => 2,
            LitKind::Float => 3,
        }
    }
}

/// A decoded literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Lit {
    pub kind: LitKind,
    pub value: ConstValue,
}

impl Lit {
    pub fn int(v: i64) -> Self {
        Self {
            kind: LitKind::Int,
            value: ConstValue::Int(v),
        }
    }

    pub fn float(v: f64) -> Self {
        Self {
            kind: LitKind::Float,
            value: ConstValue::Float(v),
        }
    }

    pub fn rune(c: char) -> Self {
        Self {
            kind: LitKind::Rune,
            value: ConstValue::Int(c as i64),
        }
    }

    pub fn string(s: String) -> Self {
        Self {
            kind: LitKind::String,
            value: ConstValue::Str(s),
        }
    }

    pub fn bool(b: bool) -> Self {
        Self {
            kind: LitKind::Bool,
            value: ConstValue::Bool(b),
        }
    }
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            ConstValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ConstValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            ConstValue::Int(v) => Some(v as f64),
            ConstValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            ConstValue::Int(v) => v == 0,
            ConstValue::Float(v) => v == 0.0,
            _ => false,
        }
    }

    pub fn is_one(&self) -> bool {
        match *self {
            ConstValue::Int(v) => v == 1,
            ConstValue::Float(v) => v == 1.0,
            _ => false,
        }
    }

    /// `Some(k)` when the value is the integer `2^k` with `k >= 1`.
    pub fn power_of_two(&self) -> Option<u32> {
        match *self {
            ConstValue::Int(v) if v > 1 && (v & (v - 1)) == 0 => Some(v.trailing_zeros()),
            _ => None,
        }
    }

    /// Zero value of the same shape (`0`, `0.0`, `false`, `""`).
    pub fn zero_like(&self) -> ConstValue {
        match self {
            ConstValue::Int(_) => ConstValue::Int(0),
            ConstValue::Float(_) => ConstValue::Float(0.0),
            ConstValue::Bool(_) => ConstValue::Bool(false),
            ConstValue::Str(_) => ConstValue::Str(String::new()),
        }
    }

    /// Integer to float conversion used when a constant is given a float type.
    pub fn to_float(&self) -> ConstValue {
        match *self {
            ConstValue::Int(v) => ConstValue::Float(v as f64),
            _ => self.clone(),
        }
    }

    /// Float to integer truncation; `None` when the value does not fit.
    pub fn to_int(&self) -> Option<ConstValue> {
        match *self {
            ConstValue::Int(v) => Some(ConstValue::Int(v)),
            ConstValue::Float(v) if v.is_finite() && v.abs() < 9.2e18 => {
                Some(ConstValue::Int(v.trunc() as i64))
            }
            _ => None,
        }
    }

    /// Evaluates `lhs op rhs`.
    ///
    /// Returns `None` when the operation is not defined on the operands, when
    /// integer arithmetic overflows, and for any division or remainder by a
    /// zero constant.
    pub fn binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
        use ConstValue::*;

        match (lhs, rhs) {
            (Int(a), Int(b)) => int_binary(op, *a, *b),
            (Float(_), Int(_)) | (Int(_), Float(_)) | (Float(_), Float(_)) => {
                float_binary(op, lhs.as_f64()?, rhs.as_f64()?)
            }
            (Bool(a), Bool(b)) => match op {
                BinaryOp::LAnd => Some(Bool(*a && *b)),
                BinaryOp::LOr => Some(Bool(*a || *b)),
                BinaryOp::Eq => Some(Bool(a == b)),
                BinaryOp::Ne => Some(Bool(a != b)),
                _ => None,
            },
            (Str(a), Str(b)) => match op {
                BinaryOp::Add => Some(Str(format!("{a}{b}"))),
                BinaryOp::Eq => Some(Bool(a == b)),
                BinaryOp::Ne => Some(Bool(a != b)),
                BinaryOp::Lt => Some(Bool(a < b)),
                BinaryOp::Le => Some(Bool(a <= b)),
                BinaryOp::Gt => Some(Bool(a > b)),
                BinaryOp::Ge => Some(Bool(a >= b)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn unary(op: UnaryOp, operand: &ConstValue) -> Option<ConstValue> {
        use ConstValue::*;

        match (op, operand) {
            (UnaryOp::Plus, Int(_) | Float(_)) => Some(operand.clone()),
            (UnaryOp::Neg, Int(v)) => v.checked_neg().map(Int),
            (UnaryOp::Neg, Float(v)) => Some(Float(-v)),
            (UnaryOp::Not, Bool(b)) => Some(Bool(!b)),
            (UnaryOp::BitNot, Int(v)) => Some(Int(!v)),
            _ => None,
        }
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Option<ConstValue> {
    use ConstValue::{Bool, Int};

    let v = match op {
        BinaryOp::Add => Int(a.checked_add(b)?),
        BinaryOp::Sub => Int(a.checked_sub(b)?),
        BinaryOp::Mul => Int(a.checked_mul(b)?),
        BinaryOp::Div => Int(a.checked_div(b)?),
        BinaryOp::Rem => Int(a.checked_rem(b)?),
        BinaryOp::Shl => Int(a.checked_shl(u32::try_from(b).ok()?)?),
        BinaryOp::Shr => Int(a.checked_shr(u32::try_from(b).ok()?)?),
        BinaryOp::And => Int(a & b),
        BinaryOp::Or => Int(a | b),
        BinaryOp::Xor => Int(a ^ b),
        BinaryOp::AndNot => Int(a & !b),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::Gt => Bool(a > b),
        BinaryOp::Ge => Bool(a >= b),
        BinaryOp::LAnd | BinaryOp::LOr => return None,
    };
    Some(v)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Option<ConstValue> {
    use ConstValue::{Bool, Float};

    let v = match op {
        BinaryOp::Add => Float(a + b),
        BinaryOp::Sub => Float(a - b),
        BinaryOp::Mul => Float(a * b),
        BinaryOp::Div if b != 0.0 => Float(a / b),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::Gt => Bool(a > b),
        BinaryOp::Ge => Bool(a >= b),
        _ => return None,
    };
    Some(v)
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v:?}"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_truncates() {
        let v = ConstValue::binary(BinaryOp::Div, &ConstValue::Int(7), &ConstValue::Int(2));
        assert_eq!(v, Some(ConstValue::Int(3)));
    }

    #[test]
    fn mixed_division_is_float() {
        let v = ConstValue::binary(BinaryOp::Div, &ConstValue::Float(7.0), &ConstValue::Int(2));
        assert_eq!(v, Some(ConstValue::Float(3.5)));
    }

    #[test]
    fn division_by_zero_is_not_evaluated() {
        for op in [BinaryOp::Div, BinaryOp::Rem] {
            assert_eq!(ConstValue::binary(op, &ConstValue::Int(1), &ConstValue::Int(0)), None);
        }
        assert_eq!(
            ConstValue::binary(BinaryOp::Div, &ConstValue::Float(1.0), &ConstValue::Float(0.0)),
            None
        );
    }

    #[test]
    fn overflow_is_not_evaluated() {
        let v = ConstValue::binary(BinaryOp::Mul, &ConstValue::Int(i64::MAX), &ConstValue::Int(2));
        assert_eq!(v, None);
    }

    #[test]
    fn power_of_two_detection() {
        assert_eq!(ConstValue::Int(8).power_of_two(), Some(3));
        assert_eq!(ConstValue::Int(1).power_of_two(), None);
        assert_eq!(ConstValue::Int(6).power_of_two(), None);
        assert_eq!(ConstValue::Float(8.0).power_of_two(), None);
    }

    #[test]
    fn comparisons_render_as_bool_constants() {
        let v = ConstValue::binary(BinaryOp::Gt, &ConstValue::Int(2), &ConstValue::Int(1));
        assert_eq!(v.map(|v| v.to_string()), Some("true".to_string()));
    }
}
