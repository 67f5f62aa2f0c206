// crates/gotac/tests/lexer_errors.rs
//
// Lexical errors are reported on the side and scanning continues; literal
// errors still produce a best-effort literal so the parser does not cascade.

use gotac::error::{Diag, DiagKind, Severity};
use gotac::lexer::{tokenize, Tok};
use gotac::value::{ConstValue, Lit};

fn lex_all(input: &str) -> (Vec<Tok<'_>>, Vec<Diag>) {
    let (toks, diags) = tokenize(input);
    (toks.into_iter().map(|t| t.tok).collect(), diags)
}

fn single_diag(input: &str) -> Diag {
    let (_, diags) = tokenize(input);
    assert_eq!(diags.len(), 1, "input={input:?} diags={diags:?}");
    let d = diags.into_iter().next().unwrap();
    assert_eq!(d.kind, DiagKind::Lex);
    assert_eq!(d.severity, Severity::Error);
    d
}

#[test]
fn illegal_character() {
    let (toks, diags) = lex_all("a @ b");
    assert_eq!(toks[1], Tok::Error);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "illegal character \"@\"");
    assert_eq!((diags[0].pos.line, diags[0].pos.col), (1, 3));
    assert_eq!(diags[0].to_string(), "1:3: error: illegal character \"@\"");
}

#[test]
fn scanning_continues_after_errors() {
    let (toks, diags) = lex_all("a @ b # c");
    assert_eq!(diags.len(), 2);
    assert_eq!(
        toks,
        vec![Tok::Ident("a"), Tok::Error, Tok::Ident("b"), Tok::Error, Tok::Ident("c"), Tok::Semi]
    );
}

#[test]
fn illegal_multibyte_character() {
    let d = single_diag("x := €");
    assert_eq!(d.message, "illegal character \"€\"");
    assert_eq!(d.span.len(), 3);
}

#[test]
fn error_position_on_later_line() {
    let d = single_diag("x\n  $");
    assert_eq!((d.pos.line, d.pos.col), (2, 3));
}

#[test]
fn invalid_numbers_yield_zero() {
    for src in ["09", "1__0", "1_", "0x", "0b102"] {
        let (toks, diags) = lex_all(src);
        assert_eq!(diags.len(), 1, "{src}: {diags:?}");
        assert_eq!(diags[0].message, "invalid numeric literal", "{src}");
        assert_eq!(toks[0], Tok::Lit(Lit::int(0)), "{src}");
    }
}

#[test]
fn newline_in_string() {
    let (toks, diags) = lex_all("\"abc\nx");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "newline in string literal");
    assert_eq!(
        toks,
        vec![
            Tok::Lit(Lit::string("abc".into())),
            Tok::Semi,
            Tok::Ident("x"),
            Tok::Semi
        ]
    );
}

#[test]
fn unterminated_string() {
    let (toks, diags) = lex_all("\"abc");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "unterminated string literal");
    assert_eq!(toks[0], Tok::Lit(Lit::string("abc".into())));

    let d = single_diag("`raw");
    assert_eq!(d.message, "unterminated string literal");
}

#[test]
fn invalid_escape_keeps_raw_body() {
    let (toks, diags) = lex_all(r#""a\qb""#);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "invalid escape sequence");
    assert_eq!(toks[0], Tok::Lit(Lit::string(r"a\qb".into())));

    single_diag(r#""\400""#);
    single_diag(r#""\xZ1""#);
    single_diag(r#""\uD800""#);
}

#[test]
fn invalid_runes() {
    for src in ["'ab'", "''", r"'\q'", "'a"] {
        let (toks, diags) = lex_all(src);
        assert_eq!(diags.len(), 1, "{src}: {diags:?}");
        assert_eq!(diags[0].message, "invalid rune literal", "{src}");
        assert!(
            matches!(&toks[0], Tok::Lit(l) if l.value == ConstValue::Int(0xFFFD)),
            "{src}: {:?}",
            toks[0]
        );
    }
}

#[test]
fn unterminated_comment() {
    let (toks, diags) = lex_all("/* never closed");
    assert!(toks.is_empty());
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "unterminated comment");
}

#[test]
fn unterminated_comment_with_newline_ends_statement() {
    let (toks, diags) = tokenize("x /* a\nb");
    assert_eq!(diags.len(), 1);
    assert_eq!(toks.len(), 2);
    assert!(toks[1].is_synthesized_semi());
    assert_eq!(toks[1].span.start, 2);
}

#[test]
fn non_leading_bom_is_illegal() {
    let d = single_diag("x\u{FEFF}");
    assert!(d.message.starts_with("illegal character"));
}
