//! Three-address code.
//!
//! A flat list of [`Quad`]s per compilation unit. Operands are constants,
//! compiler temporaries ([`TempId`]) or source variables (by [`SymbolId`]).
//! Temporaries are defined exactly once; the optimizer relies on that.

use std::collections::HashMap;
use std::fmt;

use smallvec::SmallVec;

use crate::ast::{BinaryOp, UnaryOp};
use crate::symbols::SymbolId;
use crate::types::TypeId;
use crate::value::ConstValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(pub u32);

impl TempId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A compiler temporary. Its constant value can be set once.
#[derive(Debug, Clone, PartialEq)]
pub struct TempVar {
    pub id: TempId,
    pub ty: Option<TypeId>,
    value: Option<ConstValue>,
}

impl TempVar {
    pub fn value(&self) -> Option<&ConstValue> {
        self.value.as_ref()
    }

    /// Records the constant this temporary holds. Returns `false` if a
    /// different value was recorded before; the first value is kept.
    pub fn set_value(&mut self, value: ConstValue) -> bool {
        match &self.value {
            Some(v) => *v == value,
            None => {
                self.value = Some(value);
                true
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// `FUNCTION_<name>`.
    Function(String),
    /// `<prefix>_<n>`, e.g. `for_start_3`.
    Generated { prefix: &'static str, n: u32 },
}

impl Label {
    pub fn function(name: impl Into<String>) -> Self {
        Label::Function(name.into())
    }

    pub const fn generated(prefix: &'static str, n: u32) -> Self {
        Label::Generated { prefix, n }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Function(name) => write!(f, "FUNCTION_{name}"),
            Label::Generated { prefix, n } => write!(f, "{prefix}_{n}"),
        }
    }
}

/// Storage location: a temporary or a source variable (ActualVar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Place {
    Temp(TempId),
    Var(SymbolId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Const(ConstValue),
    Temp(TempId),
    Var(SymbolId),
    /// Address of a function, for indirect calls and function values.
    Func(Label),
}

impl Operand {
    pub fn place(&self) -> Option<Place> {
        match *self {
            Operand::Temp(t) => Some(Place::Temp(t)),
            Operand::Var(v) => Some(Place::Var(v)),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<&ConstValue> {
        match self {
            Operand::Const(c) => Some(c),
            _ => None,
        }
    }

    pub fn int(v: i64) -> Self {
        Operand::Const(ConstValue::Int(v))
    }
}

impl From<Place> for Operand {
    fn from(p: Place) -> Self {
        match p {
            Place::Temp(t) => Operand::Temp(t),
            Place::Var(v) => Operand::Var(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Label(Label),
    /// Call through a function-typed value.
    Indirect(Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleOp {
    Push,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleOp {
    /// Parameter pop in a function prologue.
    Pop,
    /// Base address of an array, slice or struct value.
    Base,
    /// Storage for a composite literal, size in bytes.
    Alloc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Quad {
    Op {
        dest: Place,
        lhs: Operand,
        op: BinaryOp,
        rhs: Operand,
    },
    Unary {
        dest: Place,
        op: UnaryOp,
        operand: Operand,
    },
    Assign {
        dest: Place,
        src: Operand,
    },
    Convert {
        dest: Place,
        ty: TypeId,
        ty_name: String,
        src: Operand,
    },
    Label(Label),
    GoTo(Label),
    CondGoTo {
        cond: Operand,
        on_true: Label,
        on_false: Option<Label>,
    },
    Call {
        target: CallTarget,
        argc: usize,
        dest: TempId,
    },
    Single {
        op: SingleOp,
        operand: Option<Operand>,
    },
    Double {
        op: DoubleOp,
        dest: Place,
        operand: Option<Operand>,
    },
    /// `dest = base[addr]`
    IndexLoad {
        dest: Place,
        base: Operand,
        addr: Operand,
    },
    /// `base[addr] = src`
    IndexStore {
        base: Operand,
        addr: Operand,
        src: Operand,
    },
}

impl Quad {
    pub fn dest(&self) -> Option<Place> {
        match *self {
            Quad::Op { dest, .. }
            | Quad::Unary { dest, .. }
            | Quad::Assign { dest, .. }
            | Quad::Convert { dest, .. }
            | Quad::Double { dest, .. }
            | Quad::IndexLoad { dest, .. } => Some(dest),
            Quad::Call { dest, .. } => Some(Place::Temp(dest)),
            _ => None,
        }
    }

    /// Operands read by this instruction.
    pub fn reads(&self) -> SmallVec<[&Operand; 3]> {
        let mut out = SmallVec::new();
        match self {
            Quad::Op { lhs, rhs, .. } => {
                out.push(lhs);
                out.push(rhs);
            }
            Quad::Unary { operand, .. } => out.push(operand),
            Quad::Assign { src, .. } | Quad::Convert { src, .. } => out.push(src),
            Quad::CondGoTo { cond, .. } => out.push(cond),
            Quad::Call {
                target: CallTarget::Indirect(op),
                ..
            } => out.push(op),
            Quad::Single { operand: Some(op), .. } | Quad::Double { operand: Some(op), .. } => {
                out.push(op)
            }
            Quad::IndexLoad { base, addr, .. } => {
                out.push(base);
                out.push(addr);
            }
            Quad::IndexStore { base, addr, src } => {
                out.push(base);
                out.push(addr);
                out.push(src);
            }
            _ => {}
        }
        out
    }

    pub fn reads_mut(&mut self) -> SmallVec<[&mut Operand; 3]> {
        let mut out = SmallVec::new();
        match self {
            Quad::Op { lhs, rhs, .. } => {
                out.push(lhs);
                out.push(rhs);
            }
            Quad::Unary { operand, .. } => out.push(operand),
            Quad::Assign { src, .. } | Quad::Convert { src, .. } => out.push(src),
            Quad::CondGoTo { cond, .. } => out.push(cond),
            Quad::Call {
                target: CallTarget::Indirect(op),
                ..
            } => out.push(op),
            Quad::Single { operand: Some(op), .. } | Quad::Double { operand: Some(op), .. } => {
                out.push(op)
            }
            Quad::IndexLoad { base, addr, .. } => {
                out.push(base);
                out.push(addr);
            }
            Quad::IndexStore { base, addr, src } => {
                out.push(base);
                out.push(addr);
                out.push(src);
            }
            _ => {}
        }
        out
    }

    pub fn reads_place(&self, place: Place) -> bool {
        self.reads().iter().any(|op| op.place() == Some(place))
    }

    /// Instructions that must survive even when their result is unused.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Quad::Label(_)
                | Quad::GoTo(_)
                | Quad::CondGoTo { .. }
                | Quad::Call { .. }
                | Quad::Single { .. }
                | Quad::Double { op: DoubleOp::Pop, .. }
                | Quad::IndexStore { .. }
        )
    }

    /// Control never falls through to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Quad::GoTo(_)
                | Quad::Single {
                    op: SingleOp::Return,
                    ..
                }
        )
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Quad::GoTo(_) | Quad::CondGoTo { .. }) || self.is_terminator()
    }
}

/// A lowered `for` loop: everything between the two labels is the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: Label,
    pub end: Label,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateCode {
    pub quads: Vec<Quad>,
    pub temps: Vec<TempVar>,
    pub loops: Vec<LoopRegion>,
    names: HashMap<SymbolId, String>,
}

impl IntermediateCode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn push(&mut self, quad: Quad) {
        self.quads.push(quad);
    }

    pub fn new_temp(&mut self, ty: Option<TypeId>) -> TempId {
        let id = TempId(self.temps.len() as u32 + 1);
        self.temps.push(TempVar { id, ty, value: None });
        id
    }

    pub fn temp(&self, id: TempId) -> &TempVar {
        &self.temps[id.index() - 1]
    }

    pub fn temp_mut(&mut self, id: TempId) -> &mut TempVar {
        &mut self.temps[id.index() - 1]
    }

    /// Registers the listing name of a variable.
    pub fn name_var(&mut self, sym: SymbolId, name: &str) {
        if self.names.contains_key(&sym) {
            return;
        }
        let taken = self.names.values().any(|n| n == name);
        let name = if taken {
            format!("{name}#{}", sym.index())
        } else {
            name.to_string()
        };
        self.names.insert(sym, name);
    }

    pub fn var_name(&self, sym: SymbolId) -> String {
        self.names
            .get(&sym)
            .cloned()
            .unwrap_or_else(|| format!("v{}", sym.index()))
    }

    pub fn position(&self, label: &Label) -> Option<usize> {
        self.quads
            .iter()
            .position(|q| matches!(q, Quad::Label(l) if l == label))
    }

    /// Number of instructions reading `place`.
    pub fn read_count(&self, place: Place) -> usize {
        self.quads.iter().filter(|q| q.reads_place(place)).count()
    }

    pub fn render<'a>(&'a self, quad: &'a Quad) -> Render<'a> {
        Render { ic: self, quad }
    }

    pub fn listing(&self) -> String {
        self.to_string()
    }

    fn operand(&self, op: &Operand) -> String {
        match op {
            Operand::Const(c) => c.to_string(),
            Operand::Temp(t) => t.to_string(),
            Operand::Var(v) => self.var_name(*v),
            Operand::Func(l) => l.to_string(),
        }
    }

    fn place(&self, p: Place) -> String {
        self.operand(&p.into())
    }
}

/// One instruction in listing syntax.
pub struct Render<'a> {
    ic: &'a IntermediateCode,
    quad: &'a Quad,
}

impl fmt::Display for Render<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ic = self.ic;
        let o = |op: &Operand| ic.operand(op);
        match self.quad {
            Quad::Op { dest, lhs, op, rhs } => {
                write!(f, "{} = {} {op} {}", ic.place(*dest), o(lhs), o(rhs))
            }
            Quad::Unary { dest, op, operand } => write!(f, "{} = {op}{}", ic.place(*dest), o(operand)),
            Quad::Assign { dest, src } => write!(f, "{} = {}", ic.place(*dest), o(src)),
            Quad::Convert {
                dest, ty_name, src, ..
            } => write!(f, "{} = ({ty_name}) {}", ic.place(*dest), o(src)),
            Quad::Label(l) => write!(f, "{l}:"),
            Quad::GoTo(l) => write!(f, "goto {l}"),
            Quad::CondGoTo {
                cond,
                on_true,
                on_false,
            } => {
                write!(f, "if {} goto {on_true}", o(cond))?;
                if let Some(l) = on_false {
                    write!(f, " else goto {l}")?;
                }
                Ok(())
            }
            Quad::Call { target, argc, dest } => {
                let target = match target {
                    CallTarget::Label(l) => l.to_string(),
                    CallTarget::Indirect(op) => o(op),
                };
                write!(f, "{dest} = call {target}, {argc}")
            }
            Quad::Single { op, operand } => {
                let name = match op {
                    SingleOp::Push => "push",
                    SingleOp::Return => "return",
                };
                match operand {
                    Some(v) => write!(f, "{name} {}", o(v)),
                    None => f.write_str(name),
                }
            }
            Quad::Double { op, dest, operand } => {
                let name = match op {
                    DoubleOp::Pop => return write!(f, "pop {}", ic.place(*dest)),
                    DoubleOp::Base => "base",
                    DoubleOp::Alloc => "alloc",
                };
                let arg = operand.as_ref().map(o).unwrap_or_default();
                write!(f, "{} = {name} {arg}", ic.place(*dest))
            }
            Quad::IndexLoad { dest, base, addr } => {
                write!(f, "{} = {}[{}]", ic.place(*dest), o(base), o(addr))
            }
            Quad::IndexStore { base, addr, src } => write!(f, "{}[{}] = {}", o(base), o(addr), o(src)),
        }
    }
}

impl fmt::Display for IntermediateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for q in &self.quads {
            match q {
                Quad::Label(_) => writeln!(f, "{}", self.render(q))?,
                _ => writeln!(f, "    {}", self.render(q))?,
            }
        }
        Ok(())
    }
}
