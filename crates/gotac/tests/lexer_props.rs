use gotac::lexer::{Lexer, Tok};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]
    #[test]
    fn never_panics_and_progresses(s in ".*") {
        let lx = Lexer::new(&s);

        // Max progress we have seen in the stream (end positions).
        let mut max_end = 0u32;

        // End position of the last real (non-inserted) token.
        let mut last_real_end = 0u32;

        let max_steps = s.len().saturating_mul(4) + 64;

        for (steps, token) in lx.enumerate() {
            let (start, end) = (token.span.start, token.span.end);
            let tok = &token.tok;

            // 1) spans must be in-bounds
            prop_assert!(start <= end, "start>end: ({start},{end}) tok={tok:?} input={s:?}");
            prop_assert!(end as usize <= s.len(), "end out of bounds: ({start},{end}) len={} tok={tok:?} input={s:?}", s.len());
            prop_assert!(token.pos.line >= 1 && token.pos.col >= 1);

            if !token.is_synthesized_semi() {
                // 2) Real tokens must be monotonic (cannot overlap backwards)
                prop_assert!(
                    start >= last_real_end,
                    "real token moved backwards: start={start} < last_real_end={last_real_end} tok={tok:?} input={s:?}"
                );
                last_real_end = end;
                prop_assert!(
                    end >= max_end,
                    "real token end regressed: end={end} < max_end={max_end} tok={tok:?} input={s:?}"
                );
            } else {
                // 3) Inserted semis never appear before the consumed frontier.
                prop_assert!(
                    start >= max_end,
                    "inserted semi before progress: pos={start} < max_end={max_end} input={s:?}"
                );
            }

            max_end = max_end.max(end);

            // 4) Anti-hang guard
            prop_assert!(
                steps <= max_steps,
                "too many steps (possible hang): steps={steps} max_steps={max_steps} len={} input={s:?}",
                s.len()
            );
        }
    }

    #[test]
    fn inserted_semis_follow_statement_enders(s in "[a-z0-9(){}\\[\\]+;\n ]{0,64}") {
        let toks: Vec<_> = Lexer::new(&s).collect();
        for (i, t) in toks.iter().enumerate() {
            if t.is_synthesized_semi() {
                prop_assert!(i > 0, "leading inserted semi in {s:?}");
                prop_assert!(
                    toks[i - 1].tok.ends_statement(),
                    "semi after {:?} in {s:?}",
                    toks[i - 1].tok
                );
            }
        }
    }

    #[test]
    fn trailing_newline_is_irrelevant(s in "[a-z0-9(){}+ ]{0,48}") {
        let a: Vec<Tok<'_>> = Lexer::new(&s).map(|t| t.tok).collect();
        let with_nl = format!("{s}\n");
        let b: Vec<Tok<'_>> = Lexer::new(&with_nl).map(|t| t.tok).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn decimal_ints_roundtrip(v in 1u32..=u32::MAX) {
        let src = v.to_string();
        let toks: Vec<_> = Lexer::new(&src).collect();
        prop_assert_eq!(&toks[0].tok, &Tok::Lit(gotac::value::Lit::int(v as i64)));
    }
}
