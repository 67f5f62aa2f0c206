//! Go-subset lexer (Logos) with automatic semicolon insertion.
//!
//! The raw DFA is generated by Logos; the [`Lexer`] wrapper owns the single
//! secondary mode ("insert-semicolon") entered after any token that can end a
//! statement. While in that mode the next newline becomes a synthesized `;`
//! positioned at the newline; any other token silently leaves the mode.
//!
//! Literals are decoded here, so the parser receives typed values instead of
//! source slices. Lexical errors are collected in a side list and scanning
//! always continues.

use crate::error::{Diag, LexError, LexErrorKind, Pos, Span};
use crate::value::Lit;
use logos::{Lexer as LogosLexer, Logos};
use memchr::{memchr, memchr2, memchr3};
use std::ops::Range;

// =============================================================================
// 0. Shared helpers
// =============================================================================

#[inline(always)]
const fn first_newline_offset(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if matches!(bytes[i], b'\n' | b'\r') {
            return Some(i);
        }
        i += 1;
    }

    None
}

#[inline(always)]
const fn is_dec_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

// One canonical hex LUT for the whole lexer (escapes and number munch).
const HEX_LUT: [u8; 256] = {
    let mut t = [0xFFu8; 256];

    let mut i = b'0';
    while i <= b'9' {
        t[i as usize] = i - b'0';
        i += 1;
    }

    let mut i = b'a';
    while i <= b'f' {
        t[i as usize] = (i - b'a') + 10;
        i += 1;
    }

    let mut i = b'A';
    while i <= b'F' {
        t[i as usize] = (i - b'A') + 10;
        i += 1;
    }

    t
};

#[inline(always)]
const fn is_hex_digit(b: u8) -> bool {
    HEX_LUT[b as usize] != 0xFF
}

#[inline(always)]
const fn hex_value(b: u8) -> u32 {
    HEX_LUT[b as usize] as u32
}

// =============================================================================
// 1. Comment scanners
// =============================================================================

#[inline]
fn lex_line_comment(lex: &mut LogosLexer<'_, RawTok>) -> logos::Skip {
    let rem = lex.remainder().as_bytes();
    let end = memchr2(b'\n', b'\r', rem).unwrap_or(rem.len());
    lex.bump(end);
    logos::Skip
}

#[inline]
fn lex_block_comment(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    let mut search_start = 0;

    while let Some(star_pos) = memchr(b'*', &rem[search_start..]) {
        let abs_pos = search_start + star_pos;

        if rem.get(abs_pos + 1) == Some(&b'/') {
            lex.bump(abs_pos + 2);
            return Ok(());
        }

        search_start = abs_pos + 1;
    }

    lex.bump(rem.len());
    Err(LexErrorKind::UnterminatedComment)
}

// =============================================================================
// 2. String / rune scanners
// =============================================================================

/// Interpreted string: stops at the closing quote, or reports a raw newline
/// and resumes scanning on the next line.
#[inline]
fn lex_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    let mut i = 0;

    while let Some(off) = memchr3(b'"', b'\\', b'\n', &rem[i..]) {
        let at = i + off;
        match rem[at] {
            b'"' => {
                lex.bump(at + 1);
                return Ok(());
            }
            b'\\' => {
                if matches!(rem.get(at + 1), None | Some(b'\n' | b'\r')) {
                    i = at + 1;
                } else {
                    i = at + 2;
                }
                if i >= rem.len() {
                    break;
                }
            }
            _ => {
                let end = if at > 0 && rem[at - 1] == b'\r' { at - 1 } else { at };
                lex.bump(end);
                return Err(LexErrorKind::NewlineInString);
            }
        }
    }

    lex.bump(rem.len());
    Err(LexErrorKind::UnterminatedString)
}

#[inline]
fn lex_raw_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    match memchr(b'`', rem) {
        Some(end) => {
            lex.bump(end + 1);
            Ok(())
        }
        None => {
            lex.bump(rem.len());
            Err(LexErrorKind::UnterminatedString)
        }
    }
}

#[inline]
fn lex_rune(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    // An escaped quote (`'\''`) must not close the literal.
    let skip = if rem.first() == Some(&b'\\') { 2.min(rem.len()) } else { 0 };

    match memchr2(b'\'', b'\n', &rem[skip..]) {
        Some(off) if rem[skip + off] == b'\'' => {
            lex.bump(skip + off + 1);
            Ok(())
        }
        Some(off) => {
            lex.bump(skip + off);
            Err(LexErrorKind::InvalidRune)
        }
        None => {
            lex.bump(rem.len());
            Err(LexErrorKind::InvalidRune)
        }
    }
}

mod esc {
    use super::{hex_value, is_hex_digit};
    use crate::error::LexErrorKind;

    fn take_digits(
        it: &mut std::str::Chars<'_>,
        n: usize,
        radix: u32,
        first: Option<char>,
    ) -> Result<u32, LexErrorKind> {
        let mut acc = 0u32;
        let mut pending = first;
        for _ in 0..n {
            let c = match pending.take() {
                Some(c) => c,
                None => it.next().ok_or(LexErrorKind::InvalidEscape)?,
            };
            let ok = match radix {
                16 => c.is_ascii() && is_hex_digit(c as u8),
                _ => matches!(c, '0'..='7'),
            };
            if !ok {
                return Err(LexErrorKind::InvalidEscape);
            }
            acc = acc * radix + hex_value(c as u8);
        }
        Ok(acc)
    }

    /// Decodes Go escapes. `quote` is the delimiter that may be escaped.
    pub fn decode(body: &str, quote: char) -> Result<String, LexErrorKind> {
        let mut out = String::with_capacity(body.len());
        let mut it = body.chars();

        while let Some(c) = it.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }

            let e = it.next().ok_or(LexErrorKind::InvalidEscape)?;
            let decoded = match e {
                'a' => '\u{07}',
                'b' => '\u{08}',
                'f' => '\u{0C}',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                'v' => '\u{0B}',
                '\\' => '\\',
                q if q == quote => q,
                'x' => char::from(take_digits(&mut it, 2, 16, None)? as u8),
                'u' => char::from_u32(take_digits(&mut it, 4, 16, None)?)
                    .ok_or(LexErrorKind::InvalidEscape)?,
                'U' => char::from_u32(take_digits(&mut it, 8, 16, None)?)
                    .ok_or(LexErrorKind::InvalidEscape)?,
                d @ '0'..='7' => {
                    let v = take_digits(&mut it, 3, 8, Some(d))?;
                    if v > 255 {
                        return Err(LexErrorKind::InvalidEscape);
                    }
                    char::from(v as u8)
                }
                _ => return Err(LexErrorKind::InvalidEscape),
            };
            out.push(decoded);
        }

        Ok(out)
    }

    pub fn decode_rune(body: &str) -> Result<char, LexErrorKind> {
        let s = decode(body, '\'').map_err(|_| LexErrorKind::InvalidRune)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(LexErrorKind::InvalidRune),
        }
    }
}

// =============================================================================
// 3. Numbers (maximal munch in callback, decoding in wrapper)
// =============================================================================

mod num {
    use super::{is_dec_digit, is_hex_digit};
    use crate::error::LexErrorKind;
    use crate::value::Lit;
    use logos::Lexer as LogosLexer;

    #[inline]
    fn munch(bytes: &[u8], mut i: usize, pred: impl Fn(u8) -> bool) -> usize {
        while i < bytes.len() && (pred(bytes[i]) || bytes[i] == b'_') {
            i += 1;
        }
        i
    }

    pub fn lex_number(lex: &mut LogosLexer<'_, super::RawTok>) -> Result<(), LexErrorKind> {
        let bytes = lex.source().as_bytes();
        let Range { start, end } = lex.span();
        let mut i = start;

        let radix_prefix = bytes[i] == b'0'
            && matches!(bytes.get(i + 1), Some(b'x' | b'X' | b'b' | b'B' | b'o' | b'O'));

        if radix_prefix {
            i = munch(bytes, i + 2, is_hex_digit);
        } else {
            i = munch(bytes, i, is_dec_digit);
            if bytes.get(i) == Some(&b'.') {
                i = munch(bytes, i + 1, is_dec_digit);
            }
            if matches!(bytes.get(i), Some(b'e' | b'E')) {
                let mut j = i + 1;
                if matches!(bytes.get(j), Some(b'+' | b'-')) {
                    j += 1;
                }
                if bytes.get(j).copied().is_some_and(is_dec_digit) {
                    i = munch(bytes, j, is_dec_digit);
                }
            }
        }

        lex.bump(i.saturating_sub(end));
        Ok(())
    }

    use std::ops::Range;

    pub fn decode(text: &str) -> Result<Lit, LexErrorKind> {
        if text.starts_with('_') || text.ends_with('_') || text.contains("__") {
            return Err(LexErrorKind::InvalidNumber);
        }
        let clean: String = text.chars().filter(|&c| c != '_').collect();
        let lower = clean.to_ascii_lowercase();

        let radix = match lower.get(..2) {
            Some("0x") => Some(16),
            Some("0b") => Some(2),
            Some("0o") => Some(8),
            _ => None,
        };
        if let Some(radix) = radix {
            return i64::from_str_radix(&lower[2..], radix)
                .map(Lit::int)
                .map_err(|_| LexErrorKind::InvalidNumber);
        }

        if lower.contains(['.', 'e']) {
            return lower
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Lit::float)
                .ok_or(LexErrorKind::InvalidNumber);
        }

        // Legacy octal: leading zero followed by more digits.
        if lower.len() > 1 && lower.starts_with('0') {
            return i64::from_str_radix(&lower[1..], 8)
                .map(Lit::int)
                .map_err(|_| LexErrorKind::InvalidNumber);
        }

        lower
            .parse::<i64>()
            .map(Lit::int)
            .map_err(|_| LexErrorKind::InvalidNumber)
    }
}

// =============================================================================
// 4. Raw token definition (DFA generated by logos)
// =============================================================================

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\f]+")]
#[rustfmt::skip]
enum RawTok {
    #[token("\u{FEFF}")] Bom,

    // Trivia
    #[regex(r"\r\n|\n|\r")] Newline,
    #[token("//", lex_line_comment)] _LineComment,
    #[token("/*", lex_block_comment)] BlockComment,

    // Identifiers, keywords and type names are split in the wrapper.
    #[regex(r"[_\p{L}][_\p{L}\p{Nd}]*")] Ident,

    #[regex(r"[0-9]|\.[0-9]", num::lex_number)] Number,

    #[token("`", lex_raw_string)] RawString,
    #[token("\"", lex_string)] String,
    #[token("'", lex_rune)] Rune,

    // Operators
    #[token("...")] Ellipsis,
    #[token("<<=")] ShlAssign,
    #[token(">>=")] ShrAssign,
    #[token("&^=")] AndNotAssign,
    #[token("+=")] AddAssign,
    #[token("-=")] SubAssign,
    #[token("*=")] MulAssign,
    #[token("/=")] DivAssign,
    #[token("%=")] ModAssign,
    #[token("&=")] AndAssign,
    #[token("|=")] OrAssign,
    #[token("^=")] XorAssign,
    #[token("<<")] Shl,
    #[token(">>")] Shr,
    #[token("&^")] AndNot,
    #[token("&&")] LAnd,
    #[token("||")] LOr,
    #[token("==")] EqEq,
    #[token("!=")] NotEq,
    #[token("<=")] Le,
    #[token(">=")] Ge,
    #[token("++")] Inc,
    #[token("--")] Dec,
    #[token(":=")] Define,
    #[token("<-")] Arrow,
    #[token("=")] Assign,
    #[token("+")] Plus,
    #[token("-")] Minus,
    #[token("*")] Star,
    #[token("/")] Slash,
    #[token("%")] Percent,
    #[token("&")] Amp,
    #[token("|")] Pipe,
    #[token("^")] Caret,
    #[token("!")] Bang,
    #[token("<")] Lt,
    #[token(">")] Gt,

    // Delimiters
    #[token("(")] LParen,
    #[token(")")] RParen,
    #[token("[")] LBrack,
    #[token("]")] RBrack,
    #[token("{")] LBrace,
    #[token("}")] RBrace,
    #[token(",")] Comma,
    #[token(";")] Semi,
    #[token(":")] Colon,
    #[token(".")] Dot,

    // Catch-all (lowest priority)
    #[regex(r".", priority = 0)] Error,
}

impl RawTok {
    #[inline]
    #[rustfmt::skip]
    fn to_simple_token<'src>(self) -> Tok<'src> {
        macro_rules! simple_tok {
            ($($raw:ident => $tok:ident),* $(,)?) => {
                match self {
                    $(Self::$raw => Tok::$tok,)*
                    _ => Tok::Error,
                }
            };
        }

        simple_tok! {
            Ellipsis => Ellipsis, ShlAssign => ShlAssign, ShrAssign => ShrAssign, AndNotAssign => AndNotAssign,
            AddAssign => AddAssign, SubAssign => SubAssign, MulAssign => MulAssign, DivAssign => DivAssign,
            ModAssign => ModAssign, AndAssign => AndAssign, OrAssign => OrAssign, XorAssign => XorAssign,
            Shl => Shl, Shr => Shr, AndNot => AndNot, LAnd => LAnd, LOr => LOr, EqEq => EqEq, NotEq => NotEq,
            Le => Le, Ge => Ge, Inc => Inc, Dec => Dec, Define => Define, Arrow => Arrow,
            Assign => Assign, Plus => Plus, Minus => Minus, Star => Star, Slash => Slash, Percent => Percent,
            Amp => Amp, Pipe => Pipe, Caret => Caret, Bang => Bang, Lt => Lt, Gt => Gt,

            LParen => LParen, RParen => RParen, LBrack => LBrack, RBrack => RBrack, LBrace => LBrace,
            RBrace => RBrace, Comma => Comma, Semi => Semi, Colon => Colon, Dot => Dot,
        }
    }
}

// =============================================================================
// 5. Keyword and basic-type tables
// =============================================================================

/// Predeclared type names, emitted as [`Tok::TypeName`].
pub const BASIC_TYPE_NAMES: [&str; 19] = [
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64",
    "float32", "float64", "complex64", "complex128", "byte", "bool", "rune", "string", "uintptr",
];

#[rustfmt::skip]
fn keyword<'src>(s: &str) -> Option<Tok<'src>> {
    Some(match s {
        "break" => Tok::KwBreak, "case" => Tok::KwCase, "chan" => Tok::KwChan,
        "const" => Tok::KwConst, "continue" => Tok::KwContinue, "default" => Tok::KwDefault,
        "defer" => Tok::KwDefer, "else" => Tok::KwElse, "fallthrough" => Tok::KwFallthrough,
        "for" => Tok::KwFor, "func" => Tok::KwFunc, "go" => Tok::KwGo, "goto" => Tok::KwGoto,
        "if" => Tok::KwIf, "import" => Tok::KwImport, "interface" => Tok::KwInterface,
        "map" => Tok::KwMap, "package" => Tok::KwPackage, "range" => Tok::KwRange,
        "return" => Tok::KwReturn, "select" => Tok::KwSelect, "struct" => Tok::KwStruct,
        "switch" => Tok::KwSwitch, "type" => Tok::KwType, "var" => Tok::KwVar,
        _ => return None,
    })
}

fn classify_word(s: &str) -> Tok<'_> {
    if let Some(kw) = keyword(s) {
        return kw;
    }
    match s {
        "true" => Tok::Lit(Lit::bool(true)),
        "false" => Tok::Lit(Lit::bool(false)),
        _ if BASIC_TYPE_NAMES.contains(&s) => Tok::TypeName(s),
        _ => Tok::Ident(s),
    }
}

// =============================================================================
// 6. Public token definition
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Tok<'input> {
    Ident(&'input str),
    TypeName(&'input str),
    Lit(Lit),

    // Keywords
    KwBreak,
    KwCase,
    KwChan,
    KwConst,
    KwContinue,
    KwDefault,
    KwDefer,
    KwElse,
    KwFallthrough,
    KwFor,
    KwFunc,
    KwGo,
    KwGoto,
    KwIf,
    KwImport,
    KwInterface,
    KwMap,
    KwPackage,
    KwRange,
    KwReturn,
    KwSelect,
    KwStruct,
    KwSwitch,
    KwType,
    KwVar,

    // Operators / Delimiters
    Ellipsis,
    ShlAssign,
    ShrAssign,
    AndNotAssign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    EqEq,
    NotEq,
    Le,
    Ge,
    Inc,
    Dec,
    Define,
    Arrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Bang,
    Lt,
    Gt,
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,

    Error,
}

impl Tok<'_> {
    /// Tokens after which a newline terminates the statement.
    #[inline]
    pub fn ends_statement(&self) -> bool {
        matches!(
            self,
            Tok::Ident(_)
                | Tok::TypeName(_)
                | Tok::Lit(_)
                | Tok::KwBreak
                | Tok::KwContinue
                | Tok::KwFallthrough
                | Tok::KwReturn
                | Tok::Inc
                | Tok::Dec
                | Tok::RParen
                | Tok::RBrack
                | Tok::RBrace
        )
    }
}

impl std::fmt::Display for Tok<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tok::Ident(s) | Tok::TypeName(s) => write!(f, "`{s}`"),
            Tok::Lit(lit) => write!(f, "literal {}", lit.value),
            Tok::Semi => f.write_str("`;`"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    pub tok: Tok<'src>,
    pub span: Span,
    pub pos: Pos,
}

impl Token<'_> {
    /// A `;` produced by the insertion rule rather than written in the source.
    #[inline]
    pub fn is_synthesized_semi(&self) -> bool {
        matches!(self.tok, Tok::Semi) && self.span.is_empty()
    }
}

// =============================================================================
// 7. Line index
// =============================================================================

/// Byte offset to line/column mapping.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(src: &str) -> Self {
        let mut starts = Vec::with_capacity(src.len() / 32 + 1);
        starts.push(0);
        starts.extend(memchr::memchr_iter(b'\n', src.as_bytes()).map(|i| (i + 1) as u32));
        Self { starts }
    }

    pub fn pos(&self, src: &str, offset: usize) -> Pos {
        let line = self.starts.partition_point(|&s| s as usize <= offset).max(1);
        let line_start = self.starts[line - 1] as usize;
        let col = src
            .get(line_start..offset)
            .map_or(offset.saturating_sub(line_start), |s| s.chars().count());
        Pos::new(line as u32, col as u32 + 1)
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

// =============================================================================
// 8. Lexer wrapper: semicolon insertion + literal decoding + diags
// =============================================================================

pub struct Lexer<'src> {
    src: &'src str,
    logos: LogosLexer<'src, RawTok>,
    lines: LineIndex,
    pending: Option<Token<'src>>,
    diags: Vec<Diag>,
    insert_semi: bool,
    eof_done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str) -> Self {
        Self {
            src: input,
            logos: RawTok::lexer(input),
            lines: LineIndex::new(input),
            pending: None,
            diags: Vec::with_capacity(16),
            insert_semi: false,
            eof_done: false,
        }
    }

    pub fn take_diags(&mut self) -> Vec<Diag> {
        std::mem::take(&mut self.diags)
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    #[inline]
    fn pos(&self, offset: usize) -> Pos {
        self.lines.pos(self.src, offset)
    }

    #[inline]
    fn push_lex_diag(&mut self, kind: LexErrorKind, span: Range<usize>) {
        let err = LexError {
            kind,
            span: Span::from_range(span.clone()),
            pos: self.pos(span.start),
        };
        let text = self.src.get(span).unwrap_or_default();
        self.diags.push(err.diag(text));
    }

    #[inline]
    fn emit_semi_at(&mut self, offset: usize) {
        self.insert_semi = false;
        self.pending = Some(Token {
            tok: Tok::Semi,
            span: Span::empty_at(offset),
            pos: self.pos(offset),
        });
    }

    #[inline]
    fn token(&mut self, tok: Tok<'src>, span: Range<usize>) -> Token<'src> {
        self.insert_semi = tok.ends_statement();
        Token {
            pos: self.pos(span.start),
            span: Span::from_range(span),
            tok,
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token<'src>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tok) = self.pending.take() {
                return Some(tok);
            }

            if self.eof_done {
                return None;
            }

            match self.logos.next() {
                None => {
                    // Don't return yet: a pending `;` is emitted on the next turn.
                    self.handle_eof();
                }
                Some(Err(kind)) => {
                    if let Some(tok) = self.handle_lex_error(kind) {
                        return Some(tok);
                    }
                }
                Some(Ok(raw)) => {
                    if let Some(tok) = self.handle_raw_token(raw) {
                        return Some(tok);
                    }
                }
            }
        }
    }
}

impl<'src> Lexer<'src> {
    #[inline]
    fn handle_eof(&mut self) {
        self.eof_done = true;

        // Behaves as if the buffer ended with a newline.
        if self.insert_semi {
            self.emit_semi_at(self.src.len());
        }
    }

    /// Reports the error; literal errors still yield a best-effort literal so
    /// the parser does not cascade.
    fn handle_lex_error(&mut self, kind: LexErrorKind) -> Option<Token<'src>> {
        let span = self.logos.span();
        let slice = self.logos.slice();
        self.push_lex_diag(kind, span.clone());

        let lit = match kind {
            LexErrorKind::NewlineInString | LexErrorKind::UnterminatedString => {
                Lit::string(slice.get(1..).unwrap_or_default().to_string())
            }
            LexErrorKind::InvalidRune => Lit::rune(char::REPLACEMENT_CHARACTER),
            LexErrorKind::InvalidNumber => Lit::int(0),
            LexErrorKind::UnterminatedComment => {
                if self.insert_semi && first_newline_offset(slice).is_some() {
                    self.emit_semi_at(span.start);
                }
                return None;
            }
            _ => return None,
        };
        Some(self.token(Tok::Lit(lit), span))
    }

    fn handle_raw_token(&mut self, raw: RawTok) -> Option<Token<'src>> {
        let span = self.logos.span();
        let slice = self.logos.slice();

        match raw {
            RawTok::Bom if span.start == 0 => None,
            RawTok::Newline => {
                if self.insert_semi {
                    self.emit_semi_at(span.start);
                }
                None
            }
            RawTok::BlockComment => {
                if self.insert_semi {
                    if let Some(off) = first_newline_offset(slice) {
                        self.emit_semi_at(span.start + off);
                    }
                }
                None
            }
            RawTok::_LineComment => None,
            RawTok::Bom | RawTok::Error => {
                self.push_lex_diag(LexErrorKind::IllegalCharacter, span.clone());
                Some(Token {
                    tok: Tok::Error,
                    pos: self.pos(span.start),
                    span: Span::from_range(span),
                })
            }
            RawTok::Ident => Some(self.token(classify_word(slice), span)),
            RawTok::Number => {
                let lit = num::decode(slice).unwrap_or_else(|kind| {
                    self.push_lex_diag(kind, span.clone());
                    Lit::int(0)
                });
                Some(self.token(Tok::Lit(lit), span))
            }
            RawTok::String => {
                let body = &slice[1..slice.len() - 1];
                let lit = match esc::decode(body, '"') {
                    Ok(s) => Lit::string(s),
                    Err(kind) => {
                        self.push_lex_diag(kind, span.clone());
                        Lit::string(body.to_string())
                    }
                };
                Some(self.token(Tok::Lit(lit), span))
            }
            RawTok::RawString => {
                let body = slice[1..slice.len() - 1].replace('\r', "");
                Some(self.token(Tok::Lit(Lit::string(body)), span))
            }
            RawTok::Rune => {
                let body = &slice[1..slice.len() - 1];
                let lit = match esc::decode_rune(body) {
                    Ok(c) => Lit::rune(c),
                    Err(kind) => {
                        self.push_lex_diag(kind, span.clone());
                        Lit::rune(char::REPLACEMENT_CHARACTER)
                    }
                };
                Some(self.token(Tok::Lit(lit), span))
            }
            simple => Some(self.token(simple.to_simple_token(), span)),
        }
    }
}

/// Lexes a whole buffer, returning tokens and lexical diagnostics.
pub fn tokenize(src: &str) -> (Vec<Token<'_>>, Vec<Diag>) {
    let mut lx = Lexer::new(src);
    let toks: Vec<_> = lx.by_ref().collect();
    (toks, lx.take_diags())
}
