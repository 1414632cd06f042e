//! Compiler front end for ADL, a language for declaring command-line
//! argument schemas.
//!
//! Source text goes through four phases: the preprocessing lexer, the
//! shift-reduce parser, symbol table construction and reference checking.
//! Every phase reports problems into a shared [`Diagnostics`] sink and the
//! driver stops after the first phase that recorded an error.
//!
//! # Quick start
//!
//! ## Compile a source string
//!
//! ```
//! use adl_compiler::{Diagnostics, Options, compile_source};
//!
//! let source = "<int> { .pattern r\"[0-9]+\"; }\ncount <int> { min 0; }\n";
//! let mut diagnostics = Diagnostics::new();
//! let ast = compile_source("cli.adl", source, &Options::default(), &mut diagnostics).unwrap();
//! assert!(!diagnostics.has_errors());
//! assert!(ast.table().contains("count"));
//! ```
//!
//! ## Re-format a file
//!
//! ```
//! use adl_compiler::{Diagnostics, Options, compile_source, format};
//!
//! let mut diagnostics = Diagnostics::new();
//! let ast = compile_source("a.adl", "<t>{.name \"t\";}", &Options::default(), &mut diagnostics)
//!     .unwrap();
//! assert_eq!(format(&ast), "<t> {\n\t.name \"t\";\n}\n");
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod ast;
pub mod diagnostics;
pub mod formatter;
pub mod lexer;
pub mod parser;
pub mod passes;
pub mod preprocessor;
pub mod symbol_table;
pub mod token;

use std::fmt;
use std::io;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

pub use ast::{Ast, AstError, Node, NodeId, NodeKind, NodeType};
pub use diagnostics::{
    Colors, Diagnostic, DiagnosticKind, Diagnostics, Note, Severity, Warning, WarningKind,
};
pub use formatter::format;
pub use lexer::{LexError, LexErrorKind, Lexer, tokenize};
pub use parser::{ParseErrorKind, parse};
pub use passes::{build_symbol_table, check_references};
pub use preprocessor::{MacroErrorKind, Preprocessor};
pub use symbol_table::{SemanticErrorKind, SymbolTable, SymbolTableEntry};
pub use token::{Breadcrumb, Category, Span, Token, TokenKind};

/// Unrecoverable failure that aborts the current phase.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source file could not be read.
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
        /// Location of the `#include` that named the file, if any.
        span: Option<Span>,
    },
    /// A lexer error that leaves nothing to resume from.
    #[error("{0}")]
    Lex(#[from] LexError),
    /// Misuse of the syntax tree.
    #[error("internal compiler error: {0}")]
    Ast(#[from] AstError),
}

/// Settings for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Names defined before the first line is read, as with `-D`.
    pub defines: Vec<String>,
    /// Print the root symbol table after a successful run.
    pub print_symbols: bool,
    /// Print the formatted tree after a successful run.
    pub print_ast: bool,
}

/// Compiler phase, reported as the point where compilation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    BuildSymbolTable,
    CheckReferences,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::BuildSymbolTable => write!(f, "symbol table construction"),
            Self::CheckReferences => write!(f, "reference checking"),
        }
    }
}

/// Compile the file at `path`.
///
/// Returns the checked tree, or the first phase that recorded errors.
/// Diagnostics from every phase that ran are left in `diagnostics`.
pub fn compile(path: &Path, options: &Options, diagnostics: &mut Diagnostics) -> Result<Ast, Phase> {
    let breadcrumb: Breadcrumb = Rc::from(vec![path.display().to_string()]);
    match Preprocessor::open(path, &options.defines) {
        Ok(source) => run(source, &breadcrumb, diagnostics),
        Err(error) => {
            diagnostics.report(error, &breadcrumb);
            Err(Phase::Parse)
        }
    }
}

/// Compile `source` as if it were read from a file called `name`.
pub fn compile_source(
    name: &str,
    source: &str,
    options: &Options,
    diagnostics: &mut Diagnostics,
) -> Result<Ast, Phase> {
    let breadcrumb: Breadcrumb = Rc::from(vec![name.to_string()]);
    let source = Preprocessor::from_source(name, source, &options.defines);
    run(source, &breadcrumb, diagnostics)
}

fn run(
    source: Preprocessor,
    breadcrumb: &Breadcrumb,
    diagnostics: &mut Diagnostics,
) -> Result<Ast, Phase> {
    debug!(phase = %Phase::Parse, "starting");
    let mut ast = match parse(source, diagnostics) {
        Ok(ast) => ast,
        Err(error) => {
            diagnostics.report(error, breadcrumb);
            return Err(Phase::Parse);
        }
    };
    finish(Phase::Parse, diagnostics)?;

    debug!(phase = %Phase::BuildSymbolTable, "starting");
    if let Err(error) = build_symbol_table(&mut ast, diagnostics) {
        diagnostics.report(error.into(), breadcrumb);
    }
    finish(Phase::BuildSymbolTable, diagnostics)?;

    debug!(phase = %Phase::CheckReferences, "starting");
    if let Err(error) = check_references(&mut ast, diagnostics) {
        diagnostics.report(error.into(), breadcrumb);
    }
    finish(Phase::CheckReferences, diagnostics)?;
    Ok(ast)
}

const fn finish(phase: Phase, diagnostics: &Diagnostics) -> Result<(), Phase> {
    if diagnostics.has_errors() {
        Err(phase)
    } else {
        Ok(())
    }
}
