// crates/gotac/tests/opt_passes.rs
//
// Each pass on hand-built code, then the whole pipeline on small programs.

use gotac::ast::{BinaryOp, UnaryOp};
use gotac::error::Pos;
use gotac::opt::{copy_prop, dce, fold, licm};
use gotac::symbols::{Declaration, SymbolId, SymbolKind, SymbolTable};
use gotac::tac::{CallTarget, IntermediateCode, Label, LoopRegion, Operand, Place, Quad, SingleOp, TempId};
use gotac::types::{BasicKind, TypeTable};
use gotac::value::ConstValue;
use gotac::{compile, CompileOptions, OptContext, PassSet};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Tables plus code under construction.
struct Fixture {
    symbols: SymbolTable,
    types: TypeTable,
    ic: IntermediateCode,
}

impl Fixture {
    fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            types: TypeTable::new(),
            ic: IntermediateCode::new(),
        }
    }

    /// Package-level `int` variable.
    fn global(&mut self, name: &str) -> SymbolId {
        let decl = Declaration::new(SymbolKind::Var, Pos::new(1, 5), Some(self.types.int()));
        let id = self.symbols.declare_new_variable(name, decl).unwrap();
        self.ic.name_var(id, name);
        id
    }

    /// Function-local `int` variable.
    fn local(&mut self, name: &str) -> SymbolId {
        if self.symbols.depth() == 1 {
            self.symbols.enter_scope();
        }
        let decl = Declaration::new(SymbolKind::Var, Pos::new(2, 5), Some(self.types.int()));
        let id = self.symbols.declare_new_variable(name, decl).unwrap();
        self.ic.name_var(id, name);
        id
    }

    fn temp(&mut self) -> TempId {
        let ty = Some(self.types.int());
        self.ic.new_temp(ty)
    }

    fn op(&mut self, dest: Place, lhs: Operand, op: BinaryOp, rhs: Operand) {
        self.ic.push(Quad::Op { dest, lhs, op, rhs });
    }

    fn assign(&mut self, dest: Place, src: Operand) {
        self.ic.push(Quad::Assign { dest, src });
    }

    fn push(&mut self, v: Operand) {
        self.ic.push(Quad::Single {
            op: SingleOp::Push,
            operand: Some(v),
        });
    }

    fn ret(&mut self) {
        self.ic.push(Quad::Single {
            op: SingleOp::Return,
            operand: None,
        });
    }

    fn label(&mut self, l: &Label) {
        self.ic.push(Quad::Label(l.clone()));
    }

    /// `for_start_1:` ... `goto for_start_1` / `for_end_1:` around `body`.
    fn loop_around(&mut self, body: impl FnOnce(&mut Self)) {
        let start = Label::generated("for_start", 1);
        let end = Label::generated("for_end", 1);
        self.label(&start);
        body(self);
        self.ic.push(Quad::GoTo(start.clone()));
        self.label(&end);
        self.ic.loops.push(LoopRegion { start, end });
    }

    fn run(self, pass: fn(IntermediateCode, OptContext<'_>) -> IntermediateCode) -> String {
        let ctx = OptContext::new(&self.symbols, &self.types);
        pass(self.ic, ctx).listing()
    }
}

fn v(id: SymbolId) -> Operand {
    Operand::Var(id)
}

fn t(id: TempId) -> Operand {
    Operand::Temp(id)
}

fn code(listing: &str) -> String {
    listing.strip_prefix('\n').unwrap_or(listing).to_string()
}

#[test]
fn licm_hoists_invariant_chain() {
    let mut f = Fixture::new();
    let n = f.local("n");
    let s = f.local("s");
    let (t1, t2) = (f.temp(), f.temp());
    f.loop_around(|f| {
        f.op(Place::Temp(t1), v(n), BinaryOp::Mul, Operand::int(4));
        f.op(Place::Temp(t2), t(t1), BinaryOp::Add, Operand::int(1));
        f.op(Place::Var(s), v(s), BinaryOp::Add, t(t2));
    });
    assert_eq!(
        f.run(licm::run),
        code(
            r"
    t1 = n * 4
    t2 = t1 + 1
for_start_1:
    s = s + t2
    goto for_start_1
for_end_1:
"
        )
    );
}

#[test]
fn licm_keeps_reads_of_loop_variables() {
    let mut f = Fixture::new();
    let i = f.local("i");
    let t1 = f.temp();
    f.loop_around(|f| {
        f.op(Place::Temp(t1), v(i), BinaryOp::Mul, Operand::int(2));
        f.op(Place::Var(i), v(i), BinaryOp::Add, Operand::int(1));
    });
    let before = f.ic.listing();
    assert_eq!(f.run(licm::run), before);
}

#[test]
fn licm_keeps_globals_when_loop_calls() {
    let mut f = Fixture::new();
    let g = f.global("g");
    let (t1, t2) = (f.temp(), f.temp());
    f.loop_around(|f| {
        f.op(Place::Temp(t1), v(g), BinaryOp::Add, Operand::int(1));
        f.ic.push(Quad::Call {
            target: CallTarget::Label(Label::function("tick")),
            argc: 0,
            dest: t2,
        });
    });
    let before = f.ic.listing();
    assert_eq!(f.run(licm::run), before);
}

#[test]
fn licm_never_hoists_unguarded_division() {
    let mut f = Fixture::new();
    let d = f.local("d");
    let t1 = f.temp();
    f.loop_around(|f| {
        f.op(Place::Temp(t1), Operand::int(100), BinaryOp::Div, v(d));
    });
    let before = f.ic.listing();
    assert_eq!(f.run(licm::run), before);
}

#[test]
fn fold_strength_reduction_and_identities() {
    let mut f = Fixture::new();
    let x = f.local("x");
    let ts: Vec<TempId> = (0..6).map(|_| f.temp()).collect();
    f.op(Place::Temp(ts[0]), v(x), BinaryOp::Mul, Operand::int(8));
    f.op(Place::Temp(ts[1]), v(x), BinaryOp::Div, Operand::int(4));
    f.op(Place::Temp(ts[2]), Operand::int(1), BinaryOp::Mul, v(x));
    f.op(Place::Temp(ts[3]), v(x), BinaryOp::Sub, Operand::int(0));
    f.op(Place::Temp(ts[4]), Operand::int(0), BinaryOp::Div, v(x));
    // t5 is now known to be zero.
    f.op(Place::Temp(ts[5]), t(ts[4]), BinaryOp::Add, v(x));
    assert_eq!(
        f.run(fold::run),
        code(
            r"
    t1 = x << 3
    t2 = x >> 2
    t3 = x
    t4 = x
    t5 = 0
    t6 = x
"
        )
    );
}

#[test]
fn fold_leaves_float_multiplication_alone() {
    let mut f = Fixture::new();
    let x = f.local("x");
    let tf = f.ic.new_temp(Some(f.types.float64()));
    f.op(Place::Temp(tf), v(x), BinaryOp::Mul, Operand::Const(ConstValue::Float(8.0)));
    assert_eq!(f.run(fold::run), "    t1 = x * 8.0\n");
}

#[test]
fn fold_never_divides_by_zero() {
    let mut f = Fixture::new();
    let x = f.local("x");
    let (t1, t2) = (f.temp(), f.temp());
    f.op(Place::Temp(t1), v(x), BinaryOp::Div, Operand::int(0));
    f.op(Place::Temp(t2), Operand::int(5), BinaryOp::Rem, Operand::int(0));
    assert_eq!(f.run(fold::run), "    t1 = x / 0\n    t2 = 5 % 0\n");
}

#[test]
fn fold_wraps_to_destination_width() {
    let mut f = Fixture::new();
    let [i8_, u8_, u64_] = [BasicKind::Int8, BasicKind::Uint8, BasicKind::Uint64].map(|k| f.types.basic(k));
    let sum = f.ic.new_temp(Some(i8_));
    let under = f.ic.new_temp(Some(u8_));
    let shifted = f.ic.new_temp(Some(i8_));
    let flipped = f.ic.new_temp(Some(u8_));
    let wide = f.ic.new_temp(Some(u64_));
    f.op(Place::Temp(sum), Operand::int(100), BinaryOp::Add, Operand::int(100));
    f.op(Place::Temp(under), Operand::int(0), BinaryOp::Sub, Operand::int(1));
    f.op(Place::Temp(shifted), Operand::int(1), BinaryOp::Shl, Operand::int(7));
    f.ic.push(Quad::Unary {
        dest: Place::Temp(flipped),
        op: UnaryOp::BitNot,
        operand: Operand::int(0),
    });
    // No i64 holds 2^64 - 1.
    f.op(Place::Temp(wide), Operand::int(0), BinaryOp::Sub, Operand::int(1));
    assert_eq!(
        f.run(fold::run),
        code(
            r"
    t1 = -56
    t2 = 255
    t3 = -128
    t4 = 255
    t5 = 0 - 1
"
        )
    );
}

#[test]
fn sized_integers_fold_like_the_machine() {
    let out = compile(
        "package main\nfunc main() {\n    var a int8 = 100\n    b := a + a\n    println(b)\n    var u uint8 = 0\n    w := u - 1\n    println(w)\n}\n",
        &CompileOptions::default(),
    );
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    let listing = out.ic.listing();
    assert!(listing.contains("    b = -56\n"), "{listing}");
    assert!(listing.contains("    w = 255\n"), "{listing}");
}

#[test]
fn fold_propagates_constants_and_flagged_variables() {
    let mut f = Fixture::new();
    let k = {
        let decl = Declaration::new(SymbolKind::Const, Pos::new(1, 7), Some(f.types.int()))
            .with_value(Some(ConstValue::Int(2)));
        let id = f.symbols.declare_new_variable("k", decl).unwrap();
        f.ic.name_var(id, "k");
        id
    };
    let y = f.local("y");
    f.symbols.set_const_flag(y, ConstValue::Int(5));
    let z = f.local("z");
    let (t1, t2) = (f.temp(), f.temp());
    f.op(Place::Temp(t1), v(k), BinaryOp::Mul, Operand::int(3));
    f.op(Place::Temp(t2), t(t1), BinaryOp::Add, v(y));
    f.assign(Place::Var(z), t(t2));
    f.push(v(z));
    assert_eq!(
        f.run(fold::run),
        code(
            r"
    t1 = 6
    t2 = 11
    z = 11
    push z
"
        )
    );
}

#[test]
fn copy_prop_within_a_block() {
    let mut f = Fixture::new();
    let a = f.local("a");
    let b = f.local("b");
    let t1 = f.temp();
    f.assign(Place::Var(a), v(b));
    f.op(Place::Temp(t1), v(a), BinaryOp::Add, Operand::int(1));
    f.push(t(t1));
    assert_eq!(f.run(copy_prop::run), "    t1 = b + 1\n    push t1\n");
}

#[test]
fn copy_chain_collapses_to_the_source() {
    let mut f = Fixture::new();
    let a = f.local("a");
    let b = f.local("b");
    let c = f.local("c");
    f.assign(Place::Var(b), v(a));
    f.assign(Place::Var(c), v(b));
    f.push(v(c));
    assert_eq!(f.run(copy_prop::run), "    push a\n");
}

#[test]
fn copy_prop_stops_at_labels() {
    let mut f = Fixture::new();
    let a = f.local("a");
    let b = f.local("b");
    let t1 = f.temp();
    f.assign(Place::Var(a), v(b));
    f.label(&Label::generated("for_body", 1));
    f.op(Place::Temp(t1), v(a), BinaryOp::Add, Operand::int(1));
    f.push(t(t1));
    let before = f.ic.listing();
    assert_eq!(f.run(copy_prop::run), before);
}

#[test]
fn copy_prop_forgets_overwritten_source() {
    let mut f = Fixture::new();
    let a = f.local("a");
    let b = f.local("b");
    let t1 = f.temp();
    f.assign(Place::Var(a), v(b));
    f.assign(Place::Var(b), Operand::int(5));
    f.op(Place::Temp(t1), v(a), BinaryOp::Add, v(b));
    f.push(t(t1));
    let before = f.ic.listing();
    assert_eq!(f.run(copy_prop::run), before);
}

#[test]
fn copy_prop_keeps_global_copies() {
    let mut f = Fixture::new();
    let g = f.global("g");
    let b = f.local("b");
    f.assign(Place::Var(g), v(b));
    f.ret();
    assert_eq!(f.run(copy_prop::run), "    g = b\n    return\n");
}

#[test]
fn dce_drops_unreachable_code() {
    let mut f = Fixture::new();
    let x = f.local("x");
    f.ret();
    f.push(v(x));
    f.ic.push(Quad::GoTo(Label::generated("if_end", 1)));
    f.label(&Label::generated("if_false", 1));
    f.push(v(x));
    f.ret();
    assert_eq!(f.run(dce::run), "    return\nif_false_1:\n    push x\n    return\n");
}

#[test]
fn dce_removes_unread_locals_but_keeps_globals() {
    let mut f = Fixture::new();
    let g = f.global("g");
    let x = f.local("x");
    let (t1, t2) = (f.temp(), f.temp());
    f.op(Place::Temp(t1), v(x), BinaryOp::Add, Operand::int(1));
    f.assign(Place::Temp(t2), t(t1));
    f.assign(Place::Var(x), Operand::int(3));
    f.op(Place::Var(x), v(x), BinaryOp::Add, Operand::int(1));
    f.assign(Place::Var(g), Operand::int(7));
    f.ret();
    assert_eq!(f.run(dce::run), "    g = 7\n    return\n");
}

#[test]
fn pipeline_hoists_and_reduces() {
    let out = compile(
        r"package main

func sum(n int) int {
    s := 0
    for i := 0; i < n; i++ {
        k := n * 4
        s += k + i
    }
    return s
}

func main() {
    println(sum(10))
}
",
        &CompileOptions::default(),
    );
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    let main = "FUNCTION_main:
    push 10
    t4 = call FUNCTION_sum, 1
    push t4
    t5 = call FUNCTION_println, 1
    return
";
    assert_eq!(
        out.raw_ic.listing(),
        code(
            r"
FUNCTION_sum:
    pop n
    s = 0
    i = 0
for_start_1:
    t1 = i < n
    if t1 goto for_body_1 else goto for_end_1
for_body_1:
    t2 = n * 4
    k = t2
    t3 = k + i
    s = s + t3
for_post_1:
    i = i + 1
    goto for_start_1
for_end_1:
    return s
"
        ) + main
    );
    assert_eq!(
        out.ic.listing(),
        code(
            r"
FUNCTION_sum:
    pop n
    s = 0
    i = 0
    t2 = n << 2
for_start_1:
    t1 = i < n
    if t1 goto for_body_1 else goto for_end_1
for_body_1:
    t3 = t2 + i
    s = s + t3
for_post_1:
    i = i + 1
    goto for_start_1
for_end_1:
    return s
"
        ) + main
    );
}

#[test]
fn pipeline_on_range_loop() {
    let out = compile(
        "package main\nfunc main() {\n    var a [3]int\n    s := 0\n    for i, v := range a {\n        s += i * v\n    }\n    println(s)\n}\n",
        &CompileOptions::default(),
    );
    assert_eq!(
        out.ic.listing(),
        code(
            r"
FUNCTION_main:
    a = alloc 24
    s = 0
    range#1 = 0
    t2 = base a
for_start_1:
    t1 = range#1 < 3
    if t1 goto for_body_1 else goto for_end_1
for_body_1:
    t3 = range#1 << 3
    t4 = t2 + t3
    t5 = a[t4]
    t6 = range#1 * t5
    s = s + t6
for_post_1:
    range#1 = range#1 + 1
    goto for_start_1
for_end_1:
    push s
    t7 = call FUNCTION_println, 1
    return
"
        )
    );
}

#[test]
fn pipeline_drops_jump_after_return() {
    let src = r"package main

func sign(x int) int {
    if x < 0 {
        return -1
    } else if x == 0 {
        return 0
    }
    return 1
}

func main() {
    println(sign(3))
}
";
    let out = compile(src, &CompileOptions::default());
    let raw = out.raw_ic.listing();
    let expected: Vec<&str> = raw.lines().filter(|l| *l != "    goto if_end_1").collect();
    let optimized = out.ic.listing();
    assert_eq!(optimized.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn disabled_passes_leave_code_alone() {
    let src = "package main\nfunc main() {\n    x := 2 * 8\n    println(x)\n}\n";
    let only_fold = CompileOptions {
        passes: PassSet {
            fold: true,
            ..PassSet::none()
        },
        ..CompileOptions::default()
    };
    let folded = compile(src, &only_fold);
    // Folding rewrites in place; only dead-code elimination shrinks.
    assert_eq!(folded.ic.len(), folded.raw_ic.len());
    let raw = compile(src, &CompileOptions::unoptimized());
    assert_eq!(raw.ic, raw.raw_ic);
}

fn arithmetic() -> impl Strategy<Value = String> {
    let leaf = (0i64..10).prop_map(|v| v.to_string());
    leaf.prop_recursive(3, 16, 2, |inner| {
        (inner.clone(), prop::sample::select(vec!["+", "-", "*"]), inner)
            .prop_map(|(a, op, b)| format!("({a} {op} {b})"))
    })
}

fn eval(src: &str) -> i64 {
    // Tiny evaluator for the fully parenthesized output of `arithmetic`.
    fn expr(s: &[u8], i: &mut usize) -> i64 {
        if s[*i] == b'(' {
            *i += 1;
            let a = expr(s, i);
            *i += 1;
            let op = s[*i];
            *i += 2;
            let b = expr(s, i);
            *i += 1;
            match op {
                b'+' => a.wrapping_add(b),
                b'-' => a.wrapping_sub(b),
                _ => a.wrapping_mul(b),
            }
        } else {
            let start = *i;
            while *i < s.len() && s[*i].is_ascii_digit() {
                *i += 1;
            }
            std::str::from_utf8(&s[start..*i]).unwrap().parse().unwrap()
        }
    }
    expr(src.as_bytes(), &mut 0)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn folding_is_idempotent(e in arithmetic()) {
        let src = format!("package main\nvar r int\nfunc main() {{\n    x := 3\n    x = x + 1\n    r = {e} + x\n}}\n");
        let out = compile(&src, &CompileOptions::unoptimized());
        prop_assert!(!out.has_errors(), "{:#?}", out.diagnostics);
        let ctx = OptContext::new(&out.symbols, &out.types);
        let once = fold::run(out.raw_ic.clone(), ctx);
        let twice = fold::run(once.clone(), ctx);
        prop_assert_eq!(once.listing(), twice.listing());
    }

    #[test]
    fn constant_expressions_fold_to_their_value(e in arithmetic()) {
        let src = format!("package main\nvar r int\nfunc main() {{\n    r = {e}\n}}\n");
        let out = compile(&src, &CompileOptions::default());
        prop_assert!(!out.has_errors(), "{:#?}", out.diagnostics);
        // The package-level zero store comes first and is observable.
        let expected = format!("    r = 0\nFUNCTION_main:\n    r = {}\n    return\n", eval(&e));
        prop_assert_eq!(out.ic.listing(), expected);
    }
}
