// crates/gotac/tests/corpus.rs
//
// Whole programs from tests/testdata. Several use parts of Go outside the
// supported subset; those must still come back with diagnostics, never a
// panic.

use std::fs;
use std::path::{Path, PathBuf};

use gotac::error::DiagKind;
use gotac::{compile, CompileOptions};
use walkdir::WalkDir;

fn corpus() -> Vec<PathBuf> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/testdata");
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|x| x == "go"))
        .collect();
    files.sort();
    files
}

#[test]
fn corpus_is_present() {
    assert!(corpus().len() >= 5);
}

#[test]
fn every_file_compiles_without_panicking() {
    for path in corpus() {
        let src = fs::read_to_string(&path).unwrap();
        let lines = src.lines().count() as u32 + 1;
        let out = compile(&src, &CompileOptions::default());

        for d in &out.diagnostics {
            assert!(
                d.pos.line >= 1 && d.pos.line <= lines,
                "{}: diagnostic outside the file: {d}",
                path.display()
            );
        }
        assert!(out.ic.len() <= out.raw_ic.len(), "{}", path.display());
        // Every function label survives optimization.
        let functions = |ic: &gotac::IntermediateCode| {
            ic.quads
                .iter()
                .filter(|q| matches!(q, gotac::Quad::Label(l) if l.to_string().starts_with("FUNCTION_")))
                .count()
        };
        assert_eq!(functions(&out.raw_ic), functions(&out.ic), "{}", path.display());
    }
}

#[test]
fn call_checks_report_every_bad_call() {
    let path = corpus()
        .into_iter()
        .find(|p| p.ends_with("func_call_check_err.go"))
        .unwrap();
    let out = compile(&fs::read_to_string(path).unwrap(), &CompileOptions::unoptimized());
    let count = |kind: DiagKind| out.errors().filter(|d| d.kind == kind).count();
    assert!(count(DiagKind::ArgCount) >= 3, "{:#?}", out.diagnostics);
    assert!(count(DiagKind::ArgType) >= 3, "{:#?}", out.diagnostics);
    assert!(count(DiagKind::UndefinedType) >= 1, "{:#?}", out.diagnostics);
}

#[test]
fn unoptimized_and_optimized_agree_on_diagnostics() {
    for path in corpus() {
        let src = fs::read_to_string(&path).unwrap();
        let a = compile(&src, &CompileOptions::default());
        let b = compile(&src, &CompileOptions::unoptimized());
        assert_eq!(a.diagnostics, b.diagnostics, "{}", path.display());
        assert_eq!(a.raw_ic, b.raw_ic, "{}", path.display());
    }
}
