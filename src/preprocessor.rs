//! Include handling and conditional compilation on top of the lexer.
//!
//! One [`Lexer`] is kept per open file. `#include` pushes a new one, and
//! running out of input in an included file pops back to the includer.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::Error;
use crate::diagnostics::{Diagnostics, Warning};
use crate::lexer::Lexer;
use crate::token::{Breadcrumb, Span, Token, TokenKind};

/// Files available through `#include <identifier>`.
const SYSTEM_FILES: &[(&str, &str)] = &[("stdtypes", include_str!("../adl/stdtypes.adl"))];

/// Classifies a preprocessor error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroErrorKind {
    /// `#name` that is not a known directive.
    UnknownMacro(String),
    /// Directive given the wrong kind of argument.
    IllegalMacroValue {
        directive: String,
        found: String,
        expected: &'static str,
    },
    /// `#include name` where `name` is not a system file.
    IllegalSystemFile { name: String },
    /// `#endif` without an open `#ifdef` or `#ifndef` in the same file.
    UnmatchedEndif,
    /// `#ifdef` or `#ifndef` still open at the end of its file.
    UnterminatedConditional { directive: String },
}

impl fmt::Display for MacroErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMacro(name) => write!(f, "unknown macro '#{name}'"),
            Self::IllegalMacroValue {
                directive,
                found,
                expected,
            } => write!(
                f,
                "illegal value for '#{directive}': expected {expected}, got {found}"
            ),
            Self::IllegalSystemFile { name } => {
                let valid: Vec<_> = SYSTEM_FILES.iter().map(|(name, _)| *name).collect();
                write!(
                    f,
                    "unknown system file '{name}' (valid names are: {})",
                    valid.join(", ")
                )
            }
            Self::UnmatchedEndif => write!(f, "'#endif' without a matching '#ifdef'"),
            Self::UnterminatedConditional { directive } => {
                write!(f, "'#{directive}' without a matching '#endif'")
            }
        }
    }
}

#[derive(Debug)]
struct Frame {
    lexer: Lexer,
    /// Directory relative includes are resolved against.
    dir: Option<PathBuf>,
    /// Conditional blocks opened in this file and not yet closed.
    conditionals: Vec<(String, Span)>,
}

/// Token stream of a root file with its includes spliced in.
#[derive(Debug)]
pub struct Preprocessor {
    root: Frame,
    includes: Vec<Frame>,
    seen: HashSet<PathBuf>,
    defines: Vec<String>,
    done: bool,
}

impl Preprocessor {
    /// Open the root file at `path`.
    pub fn open(path: &Path, defines: &[String]) -> Result<Self, Error> {
        let name = path.display().to_string();
        let lexer = Lexer::open(path, Rc::from(vec![name]))?;
        let dir = path.parent().map(Path::to_path_buf);
        let mut preprocessor = Self::with_root(lexer, dir, defines);
        preprocessor.seen.insert(canonical(path));
        Ok(preprocessor)
    }

    /// Use `source` as the root file. Relative includes resolve against the
    /// working directory.
    pub fn from_source(name: &str, source: &str, defines: &[String]) -> Self {
        let lexer = Lexer::new(source, Rc::from(vec![name.to_string()]));
        Self::with_root(lexer, None, defines)
    }

    fn with_root(lexer: Lexer, dir: Option<PathBuf>, defines: &[String]) -> Self {
        Self {
            root: Frame {
                lexer,
                dir,
                conditionals: Vec::new(),
            },
            includes: Vec::new(),
            seen: HashSet::new(),
            defines: defines.to_vec(),
            done: false,
        }
    }

    /// Breadcrumb of the file tokens are currently read from.
    #[must_use]
    pub fn breadcrumb(&self) -> &Breadcrumb {
        self.includes
            .last()
            .unwrap_or(&self.root)
            .lexer
            .breadcrumb()
    }

    /// Whether the root file is used up.
    #[must_use]
    pub const fn eof(&self) -> bool {
        self.done
    }

    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.defines.iter().any(|d| d == name)
    }

    /// Paths that have been included so far, including the root file when
    /// it was opened from disk.
    pub fn included(&self) -> impl Iterator<Item = &Path> {
        self.seen.iter().map(PathBuf::as_path)
    }

    /// Return a token to the front of the stream.
    pub fn push(&mut self, token: Token) {
        self.current().lexer.push(token);
    }

    /// Return the next token without removing it.
    pub fn peek(&mut self, diagnostics: &mut Diagnostics) -> Result<Token, Error> {
        let token = self.pop(diagnostics)?;
        self.push(token.clone());
        Ok(token)
    }

    /// Remove and return the next token, running any directives on the way.
    pub fn pop(&mut self, diagnostics: &mut Diagnostics) -> Result<Token, Error> {
        loop {
            let token = self.current().lexer.pop(diagnostics)?;
            match token.kind {
                TokenKind::Macro => self.directive(token, diagnostics)?,
                TokenKind::Empty => {
                    for (directive, span) in self.current().conditionals.drain(..) {
                        let kind = MacroErrorKind::UnterminatedConditional { directive };
                        diagnostics.error(kind, span);
                    }
                    if self.includes.pop().is_some() {
                        debug!("end of included file");
                    } else {
                        self.done = true;
                        return Ok(token);
                    }
                }
                _ => return Ok(token),
            }
        }
    }

    fn current(&mut self) -> &mut Frame {
        self.includes.last_mut().unwrap_or(&mut self.root)
    }

    fn directive(&mut self, token: Token, diagnostics: &mut Diagnostics) -> Result<(), Error> {
        match token.text.as_str() {
            "include" => self.include(&token, diagnostics),
            "define" | "def" => {
                if let Some(name) = self.identifier_argument(&token, diagnostics)? {
                    if self.is_defined(&name.text) {
                        let warning = Warning::DuplicateDefine { name: name.text };
                        diagnostics.warning(warning, name.span);
                    } else {
                        debug!(name = %name.text, "define");
                        self.defines.push(name.text);
                    }
                }
                Ok(())
            }
            "undefine" | "undef" => {
                if let Some(name) = self.identifier_argument(&token, diagnostics)? {
                    if self.is_defined(&name.text) {
                        debug!(name = %name.text, "undefine");
                        self.defines.retain(|d| *d != name.text);
                    } else {
                        let warning = Warning::MissingDefine { name: name.text };
                        diagnostics.warning(warning, name.span);
                    }
                }
                Ok(())
            }
            "ifdef" => self.conditional(token, true, diagnostics),
            "ifndef" => self.conditional(token, false, diagnostics),
            "endif" => {
                if self.current().conditionals.pop().is_none() {
                    diagnostics.error(MacroErrorKind::UnmatchedEndif, token.span);
                }
                Ok(())
            }
            other => {
                diagnostics.error(MacroErrorKind::UnknownMacro(other.to_string()), token.span);
                Ok(())
            }
        }
    }

    /// Next token of the current file, which must be an identifier. Anything
    /// else is reported and put back.
    fn identifier_argument(
        &mut self,
        directive: &Token,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Token>, Error> {
        let argument = self.current().lexer.pop(diagnostics)?;
        if argument.kind == TokenKind::Identifier {
            return Ok(Some(argument));
        }
        let span = if argument.kind == TokenKind::Empty {
            directive.span.clone()
        } else {
            argument.span.clone()
        };
        diagnostics.error(
            MacroErrorKind::IllegalMacroValue {
                directive: directive.text.clone(),
                found: argument.kind.to_string(),
                expected: "identifier",
            },
            span,
        );
        self.current().lexer.push(argument);
        Ok(None)
    }

    fn include(&mut self, directive: &Token, diagnostics: &mut Diagnostics) -> Result<(), Error> {
        let argument = self.current().lexer.pop(diagnostics)?;
        match argument.kind {
            TokenKind::String => self.include_local(&argument),
            TokenKind::Identifier => {
                self.include_system(&argument, diagnostics);
                Ok(())
            }
            _ => {
                let span = if argument.kind == TokenKind::Empty {
                    directive.span.clone()
                } else {
                    argument.span.clone()
                };
                diagnostics.error(
                    MacroErrorKind::IllegalMacroValue {
                        directive: directive.text.clone(),
                        found: argument.kind.to_string(),
                        expected: "string or built-in identifier",
                    },
                    span,
                );
                self.current().lexer.push(argument);
                Ok(())
            }
        }
    }

    fn include_local(&mut self, argument: &Token) -> Result<(), Error> {
        let path = match &self.current().dir {
            Some(dir) => dir.join(&argument.text),
            None => PathBuf::from(&argument.text),
        };
        if !self.seen.insert(canonical(&path)) {
            debug!(path = %path.display(), "already included, skipping");
            return Ok(());
        }

        debug!(path = %path.display(), "including file");
        let breadcrumb = self.nested_breadcrumb(&argument.text);
        let lexer = Lexer::open(&path, breadcrumb).map_err(|error| match error {
            Error::Io { path, source, .. } => Error::Io {
                path,
                source,
                span: Some(argument.span.clone()),
            },
            other => other,
        })?;
        self.includes.push(Frame {
            lexer,
            dir: path.parent().map(Path::to_path_buf),
            conditionals: Vec::new(),
        });
        Ok(())
    }

    fn include_system(&mut self, argument: &Token, diagnostics: &mut Diagnostics) {
        let Some((name, source)) = SYSTEM_FILES
            .iter()
            .find(|(name, _)| *name == argument.text)
        else {
            diagnostics.error(
                MacroErrorKind::IllegalSystemFile {
                    name: argument.text.clone(),
                },
                argument.span.clone(),
            );
            return;
        };

        if !self.seen.insert(PathBuf::from(format!("<{name}>"))) {
            debug!(name, "system file already included, skipping");
            return;
        }

        debug!(name, "including system file");
        let breadcrumb = self.nested_breadcrumb(&format!("<{name}>"));
        self.includes.push(Frame {
            lexer: Lexer::new(*source, breadcrumb),
            dir: None,
            conditionals: Vec::new(),
        });
    }

    fn nested_breadcrumb(&self, name: &str) -> Breadcrumb {
        let mut crumbs = self.breadcrumb().to_vec();
        crumbs.push(name.to_string());
        Rc::from(crumbs)
    }

    fn conditional(
        &mut self,
        directive: Token,
        want_defined: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), Error> {
        let Some(name) = self.identifier_argument(&directive, diagnostics)? else {
            return Ok(());
        };
        if self.is_defined(&name.text) == want_defined {
            self.current()
                .conditionals
                .push((directive.text, directive.span));
            return Ok(());
        }
        debug!(directive = %directive.text, name = %name.text, "skipping conditional block");
        self.skip_conditional(directive, diagnostics)
    }

    /// Drop tokens up to the `#endif` that closes the current block.
    /// Problems inside the skipped text are not reported.
    fn skip_conditional(
        &mut self,
        directive: Token,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), Error> {
        let mut skipped = Diagnostics::new();
        let mut depth = 0_usize;
        loop {
            let token = self.current().lexer.pop(&mut skipped)?;
            match (&token.kind, token.text.as_str()) {
                (TokenKind::Empty, _) => {
                    diagnostics.error(
                        MacroErrorKind::UnterminatedConditional {
                            directive: directive.text,
                        },
                        directive.span,
                    );
                    self.current().lexer.push(token);
                    return Ok(());
                }
                (TokenKind::Macro, "ifdef" | "ifndef") => depth += 1,
                (TokenKind::Macro, "endif") => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
