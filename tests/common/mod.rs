#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use adl_compiler::{
    Ast, DiagnosticKind, Diagnostics, Options, Phase, Preprocessor, Token, TokenKind,
    compile_source, tokenize,
};

/// Compile `source` with default options.
pub fn compile_str(source: &str) -> (Result<Ast, Phase>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let result = compile_source("test.adl", source, &Options::default(), &mut diagnostics);
    (result, diagnostics)
}

/// Compile `source` and fail the test on any error.
pub fn compile_ok(source: &str) -> Ast {
    let (result, diagnostics) = compile_str(source);
    assert!(
        !diagnostics.has_errors(),
        "unexpected errors:\n{}\n--- source ---\n{source}",
        render(&diagnostics)
    );
    result.unwrap_or_else(|phase| panic!("compilation stopped at {phase}"))
}

/// Tokenize `source` with a fresh sink.
pub fn lex(source: &str) -> (Vec<Token>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let tokens = tokenize(source, &mut diagnostics).expect("tokenize failed");
    (tokens, diagnostics)
}

pub fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
    tokens.iter().map(|t| t.kind.clone()).collect()
}

/// Every token the preprocessor yields for the file at `path`.
pub fn preprocess(path: &Path, defines: &[&str]) -> (Vec<Token>, Diagnostics) {
    let defines: Vec<String> = defines.iter().map(|d| (*d).to_string()).collect();
    let mut preprocessor = Preprocessor::open(path, &defines).expect("open failed");
    let mut diagnostics = Diagnostics::new();
    let mut tokens = Vec::new();
    loop {
        let token = preprocessor.pop(&mut diagnostics).expect("preprocess failed");
        if token.kind == TokenKind::Empty {
            return (tokens, diagnostics);
        }
        tokens.push(token);
    }
}

/// Write `files` into `dir` and return the path of the first one.
pub fn write_files(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(&path, content).expect("write file");
    }
    dir.join(files[0].0)
}

/// Plain-text rendering of every diagnostic.
pub fn render(diagnostics: &Diagnostics) -> String {
    diagnostics.render(&adl_compiler::Colors::plain())
}

/// Messages of all errors, in order.
pub fn error_messages(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|d| !matches!(d.kind, DiagnosticKind::Warning(_)))
        .map(|d| d.kind.to_string())
        .collect()
}
