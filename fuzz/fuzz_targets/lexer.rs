#![no_main]

use gotac::lexer::{Lexer, Tok};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);

    let mut lx = Lexer::new(&s);

    let mut max_end = 0u32;
    let mut last_real_end = 0u32;
    let mut steps = 0usize;
    let max_steps = s.len().saturating_mul(4) + 64;
    let mut prev_semi = false;

    for tok in lx.by_ref() {
        let (start, end) = (tok.span.start, tok.span.end);
        assert!(start <= end);
        assert!(end as usize <= s.len());
        assert!(tok.pos.line >= 1 && tok.pos.col >= 1);

        if tok.is_synthesized_semi() {
            assert!(start >= max_end);
            // Insertion never stacks two `;` back to back.
            assert!(!prev_semi);
        } else {
            assert!(start >= last_real_end);
            last_real_end = end;
            assert!(end >= max_end);
        }
        prev_semi = matches!(tok.tok, Tok::Semi);

        max_end = max_end.max(end);

        steps += 1;
        assert!(steps <= max_steps);
    }
    let _ = lx.take_diags();
});
