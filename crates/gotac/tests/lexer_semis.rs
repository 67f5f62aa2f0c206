// crates/gotac/tests/lexer_semis.rs
use gotac::lexer::{Lexer, Tok};
use gotac::value::Lit;

/// Offsets of every inserted `;`.
fn injected_semis(input: &str) -> Vec<u32> {
    Lexer::new(input)
        .filter(|t| t.is_synthesized_semi())
        .map(|t| t.span.start)
        .collect()
}

fn toks(input: &str) -> Vec<Tok<'_>> {
    Lexer::new(input).map(|t| t.tok).collect()
}

/// Tokens after which a line break ends the statement.
const ENDERS: &[&str] = &[
    "foo", "int", "123", "1.2", "'x'", "\"x\"", "`x`", "true",
    ")", "]", "}", "++", "--",
    "break", "continue", "fallthrough", "return",
];

/// Everything else, operators and keywords alike.
const NON_ENDERS: &str = "+ - * / % & | ^ << >> &^ += -= *= /= %= &= |= ^= <<= >>= &^= \
    && || <- == != < > <= >= = ! := ... ( [ { , . : ; \
    case chan const default defer else for func go goto if import interface \
    map package range select struct switch type var";

#[test]
fn statement_enders_take_one_semicolon() {
    for src in ENDERS {
        for input in [format!("{src}\n"), src.to_string()] {
            let toks: Vec<_> = Lexer::new(&input).collect();
            let semis = toks.iter().filter(|t| t.is_synthesized_semi()).count();
            assert_eq!(semis, 1, "input={input:?}");
            assert!(toks.last().unwrap().is_synthesized_semi(), "input={input:?}");
        }
    }
}

#[test]
fn other_tokens_take_none() {
    for src in NON_ENDERS.split_whitespace() {
        let input = format!("{src}\n");
        assert_eq!(injected_semis(&input), Vec::<u32>::new(), "input={input:?}");
    }
}

#[test]
fn leading_bom_and_empty_input() {
    assert!(toks("").is_empty());
    assert_eq!(toks("\u{FEFF};"), vec![Tok::Semi]);
    assert_eq!(toks(";\n"), vec![Tok::Semi]);
}

#[test]
fn comments_after_an_identifier() {
    for input in [
        "foo//comment\n",
        "foo//comment",
        "foo/*comment*/\n",
        "foo/*\n*/",
        "foo/*comment*/    \n",
        "foo/*\n*/    ",
        "foo    // comment\n",
        "foo    /*\n*/",
    ] {
        assert_eq!(toks(input), vec![Tok::Ident("foo"), Tok::Semi], "input={input:?}");
    }
}

#[test]
fn return_before_closing_brace() {
    let src = "package main\n\nfunc main() {\n\tif {\n\t\treturn /* */ }\n}\n";
    assert_eq!(
        toks(src),
        vec![
            Tok::KwPackage,
            Tok::Ident("main"),
            Tok::Semi,
            Tok::KwFunc,
            Tok::Ident("main"),
            Tok::LParen,
            Tok::RParen,
            Tok::LBrace,
            Tok::KwIf,
            Tok::LBrace,
            Tok::KwReturn,
            Tok::RBrace,
            Tok::Semi,
            Tok::RBrace,
            Tok::Semi,
        ]
    );
    assert_eq!(toks("package main"), vec![Tok::KwPackage, Tok::Ident("main"), Tok::Semi]);
}

#[test]
fn statement_sequence() {
    let src = "x := 1\nx++\nreturn x\n";
    assert_eq!(
        toks(src),
        vec![
            Tok::Ident("x"),
            Tok::Define,
            Tok::Lit(Lit::int(1)),
            Tok::Semi,
            Tok::Ident("x"),
            Tok::Inc,
            Tok::Semi,
            Tok::KwReturn,
            Tok::Ident("x"),
            Tok::Semi,
        ]
    );
}

#[test]
fn no_semi_inside_open_expression() {
    // A trailing operator keeps the expression open across the newline.
    assert_eq!(injected_semis("a +\nb\n"), vec![5]);
    assert_eq!(injected_semis("f(a,\nb)\n"), vec![7]);
}

#[test]
fn blank_lines_insert_once() {
    // Without a trailing newline the last semicolon sits at end of input.
    assert_eq!(injected_semis("x\n\n\ny"), vec![1, 5]);
    assert_eq!(injected_semis("x\n\n\ny\n"), vec![1, 5]);
}

#[test]
fn semi_sits_on_the_newline() {
    let toks: Vec<_> = Lexer::new("ab\ncd").collect();
    assert!(toks[1].is_synthesized_semi());
    assert_eq!(toks[1].span.start, 2);
    assert_eq!((toks[1].pos.line, toks[1].pos.col), (1, 3));
}

#[test]
fn explicit_semi_is_not_synthesized() {
    let toks: Vec<_> = Lexer::new("x;").collect();
    assert_eq!(toks.len(), 2);
    assert!(matches!(toks[1].tok, Tok::Semi));
    assert!(!toks[1].is_synthesized_semi());
}

#[test]
fn comment_newline_equivalence() {
    let a = injected_semis("x/*\n*/y");
    let b = injected_semis("x\ny");
    assert_eq!(a.len(), b.len());
}

#[test]
fn semicolon_insertion_windows_newline_crlf() {
    assert_eq!(injected_semis("x\r\ny"), vec![1, 4]);
}

#[test]
fn semicolon_insertion_block_comment_with_cr_acts_like_newline() {
    assert_eq!(injected_semis("x/*\r*/y"), vec![3, 7]);
}

#[test]
fn block_comment_newline_does_not_insert_after_if() {
    assert_eq!(injected_semis("if/*\n*/x"), vec![8]);
}

#[test]
fn line_comment_at_eof_ok() {
    let src = "x//c";
    assert_eq!(injected_semis(src), vec![src.len() as u32]);
}

#[test]
fn line_comment_before_crlf_ok() {
    let src = "x//c\r\ny";
    let cr_pos = src.find('\r').unwrap() as u32;
    assert_eq!(injected_semis(src), vec![cr_pos, src.len() as u32]);
}

#[test]
fn semicolon_insertion_after_break_continue_fallthrough() {
    assert_eq!(injected_semis("break\nx"), vec![5, 7]);
    assert_eq!(injected_semis("continue\nx"), vec![8, 10]);
    assert_eq!(injected_semis("fallthrough\nx"), vec![11, 13]);
}

#[test]
fn semicolon_insertion_after_inc_dec() {
    assert_eq!(injected_semis("x++\ny"), vec![3, 5]);
    assert_eq!(injected_semis("x--\ny"), vec![3, 5]);
}

#[test]
fn semicolon_insertion_after_closing_delimiters() {
    assert_eq!(injected_semis("f()\ng"), vec![3, 5]);
    assert_eq!(injected_semis("a[0]\nb"), vec![4, 6]);
    assert_eq!(injected_semis("}\n}"), vec![1, 3]);
}
