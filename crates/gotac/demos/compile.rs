use std::env;

use gotac::{compile_with_sink, CompileOptions, TracingSink};

fn main() {
    let mut args = env::args().skip(1);
    let mut options = CompileOptions::default();
    let mut path = None;
    for arg in args.by_ref() {
        match arg.as_str() {
            "--no-opt" => options = CompileOptions::unoptimized(),
            _ => path = Some(arg),
        }
    }
    let Some(path) = path else {
        eprintln!("usage: cargo run --example compile -- [--no-opt] <file.go>");
        std::process::exit(2);
    };

    let src = std::fs::read_to_string(&path).unwrap_or_else(|e| {
        eprintln!("{path}: {e}");
        std::process::exit(2);
    });

    let out = compile_with_sink(&src, &options, &mut TracingSink);
    for d in &out.diagnostics {
        eprintln!("{path}:{d}");
    }
    if out.has_errors() {
        eprintln!("compilation failed");
        std::process::exit(1);
    }
    print!("{}", out.ic.listing());
}
