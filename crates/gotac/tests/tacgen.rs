// crates/gotac/tests/tacgen.rs
//
// Unoptimized three-address listings for small programs. Names are kept
// distinct across functions so no `#n` suffixes appear.

use gotac::error::DiagKind;
use gotac::tac::Quad;
use gotac::{compile, Compilation, CompileOptions};
use pretty_assertions::assert_eq;

fn lower(src: &str) -> Compilation {
    compile(src, &CompileOptions::unoptimized())
}

/// Drops the newline that opens a raw string literal.
fn code(listing: &str) -> String {
    listing.strip_prefix('\n').unwrap_or(listing).to_string()
}

#[test]
fn if_without_else() {
    let out = lower("package main\nfunc main() {\n    if 2 > 1 {\n        a := 1\n    }\n}\n");
    assert!(!out.has_errors(), "{:#?}", out.diagnostics);
    assert_eq!(
        out.raw_ic.listing(),
        code(
            r"
FUNCTION_main:
    t1 = 2 > 1
    if t1 goto if_true_1 else goto if_false_1
if_true_1:
    a = 1
if_false_1:
    return
"
        )
    );
    // Unoptimized output is the generator's output.
    assert_eq!(out.ic, out.raw_ic);
}

#[test]
fn counted_for_loop() {
    let out = lower(
        "package main\nfunc main() {\n    s := 0\n    for i := 0; i < 3; i++ {\n        s += i\n    }\n    println(s)\n}\n",
    );
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    assert_eq!(
        out.raw_ic.listing(),
        code(
            r"
FUNCTION_main:
    s = 0
    i = 0
for_start_1:
    t1 = i < 3
    if t1 goto for_body_1 else goto for_end_1
for_body_1:
    s = s + i
for_post_1:
    i = i + 1
    goto for_start_1
for_end_1:
    push s
    t2 = call FUNCTION_println, 1
    return
"
        )
    );
    assert_eq!(out.raw_ic.loops.len(), 1);
    assert_eq!(out.raw_ic.loops[0].start.to_string(), "for_start_1");
    assert_eq!(out.raw_ic.loops[0].end.to_string(), "for_end_1");
}

#[test]
fn else_if_chain() {
    let out = lower(
        r"package main

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
",
    );
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    assert_eq!(
        out.raw_ic.listing(),
        code(
            r"
FUNCTION_sign:
    pop x
    t1 = x < 0
    if t1 goto if_true_1 else goto if_false_1
if_true_1:
    return -1
    goto if_end_1
if_false_1:
    t2 = x == 0
    if t2 goto if_true_2 else goto if_false_2
if_true_2:
    return 0
if_false_2:
if_end_1:
    return 1
FUNCTION_main:
    push 3
    t3 = call FUNCTION_sign, 1
    push t3
    t4 = call FUNCTION_println, 1
    return
"
        )
    );
}

#[test]
fn range_over_array() {
    let out = lower(
        "package main\nfunc main() {\n    var a [3]int\n    s := 0\n    for i, v := range a {\n        s += i * v\n    }\n    println(s)\n}\n",
    );
    assert!(out.diagnostics.is_empty(), "{:#?}", out.diagnostics);
    assert_eq!(
        out.raw_ic.listing(),
        code(
            r"
FUNCTION_main:
    a = alloc 24
    s = 0
    range#1 = 0
for_start_1:
    t1 = range#1 < 3
    if t1 goto for_body_1 else goto for_end_1
for_body_1:
    i = range#1
    t2 = base a
    t3 = range#1 * 8
    t4 = t2 + t3
    t5 = a[t4]
    v = t5
    t6 = i * v
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
fn parameters_pop_in_reverse() {
    let out = lower("package main\nfunc f(a, b int) {\n}\nfunc main() {\n    f(1)\n}\n");
    let kinds: Vec<DiagKind> = out.errors().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagKind::ArgCount]);
    // Code is still produced for a program with type errors.
    assert_eq!(
        out.raw_ic.listing(),
        code(
            r"
FUNCTION_f:
    pop b
    pop a
    return
FUNCTION_main:
    push 1
    t1 = call FUNCTION_f, 1
    return
"
        )
    );
}

#[test]
fn every_function_ends_in_return() {
    let out = lower("package main\nfunc a() {}\nfunc b() {}\nfunc main() {\n    a()\n    b()\n}\n");
    let labels = out
        .raw_ic
        .quads
        .iter()
        .enumerate()
        .filter(|(_, q)| matches!(q, Quad::Label(l) if l.to_string().starts_with("FUNCTION_")))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    assert_eq!(labels.len(), 3);
    for &i in &labels[1..] {
        assert_eq!(out.raw_ic.render(&out.raw_ic.quads[i - 1]).to_string(), "return");
    }
    assert_eq!(out.raw_ic.listing().lines().last(), Some("    return"));
}
