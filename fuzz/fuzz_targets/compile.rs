#![no_main]

use gotac::{compile, CompileOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);

    // Any input must come back as a compilation, never a panic.
    let out = compile(&s, &CompileOptions::default());

    // Optimizing never grows the code.
    assert!(out.ic.len() <= out.raw_ic.len());
    let _ = out.ic.listing();
});
