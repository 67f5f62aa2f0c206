//! Front end and three-address-code compiler for a subset of Go.
//!
//! - Lexer uses Logos and implements Go semicolon insertion.
//! - A recursive-descent parser builds an arena AST and type-checks it as it goes.
//! - The generator lowers the checked tree to quadruples, which a fixed
//!   pipeline of passes then optimizes.
//!
//! [`compile`] runs the whole pipeline over one source buffer.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod opt;
pub mod parser;
pub mod parser_support;
pub mod sema;
pub mod session;
pub mod symbols;
pub mod tac;
pub mod tacgen;
pub mod types;
pub mod value;
pub mod walk;

// Re-exports for convenience
pub use error::{Collector, Diag, DiagKind, DiagnosticSink, NullSink, Severity, TracingSink};
pub use lexer::{tokenize, Lexer, Tok, Token};
pub use opt::{optimize, OptContext, PassSet};
pub use parser::Parser;
pub use session::{compile, compile_with_sink, Compilation, CompileOptions};
pub use symbols::SymbolTable;
pub use tac::{IntermediateCode, Quad};
pub use tacgen::TacGenerator;
pub use types::TypeTable;
