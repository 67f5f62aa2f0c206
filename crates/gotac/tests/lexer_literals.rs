// crates/gotac/tests/lexer_literals.rs
use gotac::lexer::{tokenize, Lexer, Tok};
use gotac::value::{ConstValue, Lit, LitKind};

fn lex1(input: &str) -> Tok<'_> {
    let (toks, diags) = tokenize(input);
    assert!(diags.is_empty(), "unexpected diags for {input:?}: {diags:?}");
    toks.into_iter().next().expect("at least one token").tok
}

fn lit(input: &str) -> Lit {
    match lex1(input) {
        Tok::Lit(lit) => lit,
        other => panic!("expected literal for {input:?}, got {other:?}"),
    }
}

fn int(input: &str) -> i64 {
    let l = lit(input);
    assert_eq!(l.kind, LitKind::Int, "{input:?}");
    l.value.as_int().unwrap()
}

fn float(input: &str) -> f64 {
    let l = lit(input);
    assert_eq!(l.kind, LitKind::Float, "{input:?}");
    match l.value {
        ConstValue::Float(v) => v,
        other => panic!("{input:?} decoded to {other:?}"),
    }
}

fn string(input: &str) -> String {
    let l = lit(input);
    assert_eq!(l.kind, LitKind::String, "{input:?}");
    match l.value {
        ConstValue::Str(s) => s,
        other => panic!("{input:?} decoded to {other:?}"),
    }
}

fn rune(input: &str) -> i64 {
    let l = lit(input);
    assert_eq!(l.kind, LitKind::Rune, "{input:?}");
    l.value.as_int().unwrap()
}

// -----------------------------------------------------------------------------
// Numbers
// -----------------------------------------------------------------------------

#[test]
fn decimal_ints() {
    assert_eq!(int("0"), 0);
    assert_eq!(int("42"), 42);
    assert_eq!(int("1_000_000"), 1_000_000);
    assert_eq!(int("9223372036854775807"), i64::MAX);
}

#[test]
fn prefixed_ints() {
    assert_eq!(int("0x1F"), 31);
    assert_eq!(int("0XfF"), 255);
    assert_eq!(int("0o17"), 15);
    assert_eq!(int("0b101"), 5);
    assert_eq!(int("0b_1010"), 10);
}

#[test]
fn legacy_octal() {
    assert_eq!(int("017"), 15);
    assert_eq!(int("00"), 0);
}

#[test]
fn floats() {
    assert_eq!(float("1.5"), 1.5);
    assert_eq!(float(".5"), 0.5);
    assert_eq!(float("1."), 1.0);
    assert_eq!(float("1e3"), 1000.0);
    assert_eq!(float("2.5e-1"), 0.25);
    assert_eq!(float("1_0.2_5"), 10.25);
}

#[test]
fn number_then_dot_ident() {
    let (toks, diags) = tokenize("x.y");
    assert!(diags.is_empty());
    assert!(matches!(toks[0].tok, Tok::Ident("x")));
    assert!(matches!(toks[1].tok, Tok::Dot));
    assert!(matches!(toks[2].tok, Tok::Ident("y")));
}

// -----------------------------------------------------------------------------
// Strings and runes
// -----------------------------------------------------------------------------

#[test]
fn interpreted_strings() {
    assert_eq!(string(r#""hello""#), "hello");
    assert_eq!(string(r#""""#), "");
    assert_eq!(string(r#""a\tb\n""#), "a\tb\n");
    assert_eq!(string(r#""q\"q""#), "q\"q");
    assert_eq!(string(r#""\\""#), "\\");
    assert_eq!(string(r#""\a\b\f\r\v""#), "\u{07}\u{08}\u{0C}\r\u{0B}");
}

#[test]
fn numeric_escapes() {
    assert_eq!(string(r#""\x41""#), "A");
    assert_eq!(string(r#""\101""#), "A");
    assert_eq!(string(r#""é""#), "é");
    assert_eq!(string(r#""\U0001F600""#), "\u{1F600}");
}

#[test]
fn raw_strings_are_not_decoded() {
    assert_eq!(string(r#"`a\nb`"#), "a\\nb");
    assert_eq!(string("`line1\nline2`"), "line1\nline2");
    assert_eq!(string("`cr\r\nlf`"), "cr\nlf");
}

#[test]
fn runes_decode_to_code_points() {
    assert_eq!(rune("'a'"), 97);
    assert_eq!(rune("'é'"), 0xe9);
    assert_eq!(rune(r"'\n'"), 10);
    assert_eq!(rune(r"'\''"), 39);
    assert_eq!(rune(r"'\x7f'"), 0x7f);
    assert_eq!(rune(r"'ዤ'"), 0x12e4);
}

#[test]
fn double_quote_rune_needs_no_escape() {
    assert_eq!(rune("'\"'"), 34);
}

// -----------------------------------------------------------------------------
// Words
// -----------------------------------------------------------------------------

#[test]
fn booleans_are_literals() {
    assert_eq!(lit("true"), Lit::bool(true));
    assert_eq!(lit("false"), Lit::bool(false));
}

#[test]
fn basic_type_names() {
    for name in ["int", "int8", "uint64", "float64", "byte", "rune", "string", "bool", "uintptr"] {
        assert_eq!(lex1(name), Tok::TypeName(name), "{name}");
    }
    assert_eq!(lex1("integer"), Tok::Ident("integer"));
    assert_eq!(lex1("Int"), Tok::Ident("Int"));
}

#[test]
fn keywords() {
    assert_eq!(lex1("func"), Tok::KwFunc);
    assert_eq!(lex1("range"), Tok::KwRange);
    assert_eq!(lex1("fallthrough"), Tok::KwFallthrough);
    assert_eq!(lex1("funcs"), Tok::Ident("funcs"));
}

#[test]
fn unicode_identifiers() {
    assert_eq!(lex1("π"), Tok::Ident("π"));
    assert_eq!(lex1("héllo_2"), Tok::Ident("héllo_2"));
    assert_eq!(lex1("_x"), Tok::Ident("_x"));
}

// -----------------------------------------------------------------------------
// Positions
// -----------------------------------------------------------------------------

#[test]
fn positions_are_one_based_and_count_chars() {
    let toks: Vec<_> = Lexer::new("a\n  bc\né := 1").collect();
    let pos: Vec<(u32, u32)> = toks
        .iter()
        .filter(|t| !t.is_synthesized_semi())
        .map(|t| (t.pos.line, t.pos.col))
        .collect();
    assert_eq!(pos, vec![(1, 1), (2, 3), (3, 1), (3, 3), (3, 6)]);
}

#[test]
fn leading_bom_is_skipped() {
    let (toks, diags) = tokenize("\u{FEFF}package main");
    assert!(diags.is_empty());
    assert_eq!(toks[0].tok, Tok::KwPackage);
    assert_eq!(toks[0].span.start, 3);
}

#[test]
fn spans_cover_the_source_text() {
    let src = r#"x := "hi" + 0x10"#;
    let (toks, _) = tokenize(src);
    let texts: Vec<&str> = toks
        .iter()
        .filter(|t| !t.is_synthesized_semi())
        .map(|t| &src[t.span.start as usize..t.span.end as usize])
        .collect();
    assert_eq!(texts, vec!["x", ":=", "\"hi\"", "+", "0x10"]);
}
