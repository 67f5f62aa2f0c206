//! One compilation of one source buffer.
//!
//! All state (symbol and type tables, temporary and label counters) lives in
//! the values created here, so compilations never share anything and may run
//! side by side.

use tracing::field::Empty;
use tracing::{debug, debug_span, Span};

use crate::ast::{Ast, NodeId};
use crate::error::{Diag, DiagnosticSink, Severity};
use crate::opt::{self, OptContext, PassSet};
use crate::parser;
use crate::sema::Sema;
use crate::symbols::SymbolTable;
use crate::tac::IntermediateCode;
use crate::tacgen;
use crate::types::TypeTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub passes: PassSet,
    /// Report declared but unread local variables.
    pub check_unused: bool,
    /// Package `main` must declare `func main`.
    pub require_main: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            passes: PassSet::all(),
            check_unused: true,
            require_main: true,
        }
    }
}

impl CompileOptions {
    /// Front end and generator only.
    pub fn unoptimized() -> Self {
        Self {
            passes: PassSet::none(),
            ..Self::default()
        }
    }

    pub fn optimize(&self) -> bool {
        self.passes.any_enabled()
    }
}

#[derive(Debug)]
pub struct Compilation {
    pub package: Option<String>,
    pub ast: Ast,
    pub root: Option<NodeId>,
    pub symbols: SymbolTable,
    pub types: TypeTable,
    /// Code as generated.
    pub raw_ic: IntermediateCode,
    /// Code after the enabled optimization passes.
    pub ic: IntermediateCode,
    /// Every problem found, in detection order.
    pub diagnostics: Vec<Diag>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diag::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diag> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diag> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }
}

/// Compiles `source`, keeping diagnostics in the result only.
pub fn compile(source: &str, options: &CompileOptions) -> Compilation {
    let _span = debug_span!("compile", package = Empty, bytes = source.len()).entered();
    run(source, options)
}

/// Compiles `source` and forwards every diagnostic to `sink` as well.
pub fn compile_with_sink(
    source: &str,
    options: &CompileOptions,
    sink: &mut dyn DiagnosticSink,
) -> Compilation {
    let _span = debug_span!("compile", package = Empty, bytes = source.len()).entered();
    let compilation = run(source, options);
    for diag in &compilation.diagnostics {
        sink.report(diag);
    }
    compilation
}

fn run(source: &str, options: &CompileOptions) -> Compilation {
    let owned;
    let source = if source.ends_with('\n') {
        source
    } else {
        owned = format!("{source}\n");
        owned.as_str()
    };

    let sema = Sema::new(options.check_unused, options.require_main);
    let (root, mut sema) = parser::parse(source, sema);
    sema.finish(root);
    if let Some(package) = &sema.package {
        Span::current().record("package", package.as_str());
    }
    debug!(
        package = sema.package.as_deref().unwrap_or(""),
        errors = sema.error_count(),
        "front end done"
    );

    let (raw_ic, gen_diags) = tacgen::generate(&sema.ast, root, &sema.symbols, &sema.types);
    sema.diags.extend(gen_diags);

    let ic = if options.optimize() {
        let ctx = OptContext::new(&sema.symbols, &sema.types);
        opt::optimize(&raw_ic, ctx, options.passes)
    } else {
        raw_ic.clone()
    };

    Compilation {
        package: sema.package,
        ast: sema.ast,
        root: Some(root),
        symbols: sema.symbols,
        types: sema.types,
        raw_ic,
        ic,
        diagnostics: sema.diags.into_vec(),
    }
}
