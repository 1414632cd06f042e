//! Location-tagged errors and warnings collected across compiler phases.
//!
//! Phases never abort on user errors. They push into a [`Diagnostics`]
//! sink, and the driver checks [`Diagnostics::error_count`] at each phase
//! boundary.

use std::env;
use std::fmt::{self, Write as _};
use std::rc::Rc;

use crate::Error;
use crate::ast::AstError;
use crate::lexer::LexErrorKind;
use crate::parser::ParseErrorKind;
use crate::preprocessor::MacroErrorKind;
use crate::symbol_table::SemanticErrorKind;
use crate::token::{Breadcrumb, Span};

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Note => f.write_str("note"),
        }
    }
}

/// Warning classes. The name is what `[-W<name>]` and `@suppress <name>` use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    IntegerOverflow,
    IntegerUnderflow,
    FloatOverflow,
    DuplicateDefine,
    MissingDefine,
    EmptyStatement,
    StraySemicolon,
    StraySuppress,
}

impl WarningKind {
    pub const ALL: [Self; 8] = [
        Self::IntegerOverflow,
        Self::IntegerUnderflow,
        Self::FloatOverflow,
        Self::DuplicateDefine,
        Self::MissingDefine,
        Self::EmptyStatement,
        Self::StraySemicolon,
        Self::StraySuppress,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IntegerOverflow => "integer-overflow",
            Self::IntegerUnderflow => "integer-underflow",
            Self::FloatOverflow => "float-overflow",
            Self::DuplicateDefine => "duplicate-define",
            Self::MissingDefine => "missing-define",
            Self::EmptyStatement => "empty-statement",
            Self::StraySemicolon => "stray-semicolon",
            Self::StraySuppress => "stray-suppress",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// A warning together with the details its message needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    IntegerOverflow { literal: String },
    IntegerUnderflow { literal: String },
    FloatOverflow { literal: String },
    DuplicateDefine { name: String },
    MissingDefine { name: String },
    EmptyStatement,
    StraySemicolon,
    /// `@suppress` with nothing after it to apply to.
    StraySuppress,
}

impl Warning {
    #[must_use]
    pub const fn kind(&self) -> WarningKind {
        match self {
            Self::IntegerOverflow { .. } => WarningKind::IntegerOverflow,
            Self::IntegerUnderflow { .. } => WarningKind::IntegerUnderflow,
            Self::FloatOverflow { .. } => WarningKind::FloatOverflow,
            Self::DuplicateDefine { .. } => WarningKind::DuplicateDefine,
            Self::MissingDefine { .. } => WarningKind::MissingDefine,
            Self::EmptyStatement => WarningKind::EmptyStatement,
            Self::StraySemicolon => WarningKind::StraySemicolon,
            Self::StraySuppress => WarningKind::StraySuppress,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntegerOverflow { literal } => write!(
                f,
                "integer literal '{literal}' overflows, clamped to {}",
                i64::MAX
            ),
            Self::IntegerUnderflow { literal } => write!(
                f,
                "integer literal '{literal}' underflows, clamped to {}",
                i64::MIN
            ),
            Self::FloatOverflow { literal } => {
                write!(f, "decimal literal '{literal}' is out of range")
            }
            Self::DuplicateDefine { name } => write!(f, "'{name}' is already defined"),
            Self::MissingDefine { name } => {
                write!(f, "cannot undefine '{name}', it is not defined")
            }
            Self::EmptyStatement => write!(f, "empty property statement encountered"),
            Self::StraySemicolon => write!(f, "unnecessary semicolon encountered"),
            Self::StraySuppress => write!(f, "'@suppress' at end of file applies to nothing"),
        }
    }
}

/// What went wrong, grouped by the phase that noticed it.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    Lex(LexErrorKind),
    Macro(MacroErrorKind),
    Parse(ParseErrorKind),
    Semantic(SemanticErrorKind),
    Io { path: String, message: String },
    Internal(AstError),
    Warning(Warning),
}

impl DiagnosticKind {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Warning(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(kind) => write!(f, "{kind}"),
            Self::Macro(kind) => write!(f, "{kind}"),
            Self::Parse(kind) => write!(f, "{kind}"),
            Self::Semantic(kind) => write!(f, "{kind}"),
            Self::Io { path, message } => write!(f, "cannot read '{path}': {message}"),
            Self::Internal(error) => write!(f, "internal compiler error: {error}"),
            Self::Warning(warning) => write!(f, "{warning}"),
        }
    }
}

impl From<LexErrorKind> for DiagnosticKind {
    fn from(kind: LexErrorKind) -> Self {
        Self::Lex(kind)
    }
}

impl From<MacroErrorKind> for DiagnosticKind {
    fn from(kind: MacroErrorKind) -> Self {
        Self::Macro(kind)
    }
}

impl From<ParseErrorKind> for DiagnosticKind {
    fn from(kind: ParseErrorKind) -> Self {
        Self::Parse(kind)
    }
}

impl From<SemanticErrorKind> for DiagnosticKind {
    fn from(kind: SemanticErrorKind) -> Self {
        Self::Semantic(kind)
    }
}

impl From<AstError> for DiagnosticKind {
    fn from(error: AstError) -> Self {
        Self::Internal(error)
    }
}

/// Secondary location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
    pub span: Span,
}

impl Note {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Missing for whole-file problems such as an unreadable root file.
    pub span: Option<Span>,
    /// Used for the location line when there is no span.
    pub breadcrumb: Breadcrumb,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn new(kind: impl Into<DiagnosticKind>, span: Span) -> Self {
        Self {
            kind: kind.into(),
            breadcrumb: Rc::clone(&span.breadcrumb),
            span: Some(span),
            notes: Vec::new(),
        }
    }

    /// A diagnostic that points at a whole file rather than a position.
    pub fn in_file(kind: impl Into<DiagnosticKind>, breadcrumb: Breadcrumb) -> Self {
        Self {
            kind: kind.into(),
            span: None,
            breadcrumb,
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Render in GCC style, including source excerpt and notes.
    #[must_use]
    pub fn render(&self, colors: &Colors) -> String {
        let mut out = String::new();
        let warning = match &self.kind {
            DiagnosticKind::Warning(warning) => Some(warning.kind()),
            _ => None,
        };
        write_block(
            &mut out,
            colors,
            self.severity(),
            &self.kind.to_string(),
            self.span.as_ref(),
            &self.breadcrumb,
            warning,
        );
        for note in &self.notes {
            write_block(
                &mut out,
                colors,
                Severity::Note,
                &note.message,
                Some(&note.span),
                &note.span.breadcrumb,
                None,
            );
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&Colors::plain()))
    }
}

fn write_block(
    out: &mut String,
    colors: &Colors,
    severity: Severity,
    message: &str,
    span: Option<&Span>,
    breadcrumb: &[String],
    warning: Option<WarningKind>,
) {
    let (file, parents) = match breadcrumb.split_last() {
        Some((file, parents)) => (file.as_str(), parents),
        None => ("<input>", &[][..]),
    };
    for parent in parents {
        let _ = writeln!(out, "{}{parent}:{}", colors.bold, colors.reset);
        out.push_str("--> ");
    }

    match span {
        Some(span) => {
            let _ = write!(
                out,
                "{}{file}:{}:{}:{} ",
                colors.bold, span.start.line, span.start.column, colors.reset
            );
        }
        None => {
            let _ = write!(out, "{}{file}:{} ", colors.bold, colors.reset);
        }
    }

    let color = colors.for_severity(severity);
    let _ = write!(out, "{color}{severity}:{} {message}", colors.reset);
    if let Some(kind) = warning {
        let _ = write!(out, " [-W{}]", kind.name());
    }
    out.push('\n');

    if let Some(span) = span {
        write_excerpt(out, span, color, colors.reset);
    }
}

fn write_excerpt(out: &mut String, span: &Span, color: &str, reset: &str) {
    let excerpt = &span.excerpt;
    let Some((first, rest)) = excerpt.lines.split_first() else {
        return;
    };

    let _ = writeln!(out, "{:>5} | {first}", span.start.line);

    let start = span
        .start
        .column
        .saturating_sub(excerpt.first_column)
        .min(first.len());
    let end = if span.end.line == span.start.line {
        span.end.column.saturating_sub(excerpt.first_column)
    } else {
        first.len().saturating_sub(1)
    };
    let width = end.saturating_sub(start) + 1;
    let _ = writeln!(
        out,
        "      | {}{color}{}{reset}",
        " ".repeat(start),
        "^".repeat(width)
    );

    for (offset, line) in rest.iter().enumerate() {
        let _ = writeln!(out, "{:>5} | {line}", span.start.line + offset + 1);
    }
}

/// ANSI escape codes for diagnostic rendering.
///
/// All codes are empty when `NO_COLOR` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colors {
    pub bold: &'static str,
    pub red: &'static str,
    pub magenta: &'static str,
    pub cyan: &'static str,
    pub reset: &'static str,
}

impl Colors {
    /// Colored output unless `NO_COLOR` is set.
    #[must_use]
    pub fn detect() -> Self {
        if env::var_os("NO_COLOR").is_some() {
            Self::plain()
        } else {
            Self::ansi()
        }
    }

    #[must_use]
    pub const fn ansi() -> Self {
        Self {
            bold: "\u{1b}[1m",
            red: "\u{1b}[31m",
            magenta: "\u{1b}[35m",
            cyan: "\u{1b}[36m",
            reset: "\u{1b}[0m",
        }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self {
            bold: "",
            red: "",
            magenta: "",
            cyan: "",
            reset: "",
        }
    }

    const fn for_severity(&self, severity: Severity) -> &'static str {
        match severity {
            Severity::Error => self.red,
            Severity::Warning => self.magenta,
            Severity::Note => self.cyan,
        }
    }
}

impl Default for Colors {
    fn default() -> Self {
        Self::detect()
    }
}

/// Collects diagnostics from every phase of one compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
    suppressed: Vec<WarningKind>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic. Suppressed warnings are dropped.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match &diagnostic.kind {
            DiagnosticKind::Warning(warning) => {
                if self.is_suppressed(warning.kind()) {
                    tracing::trace!(warning = warning.kind().name(), "suppressed");
                    return;
                }
                self.warnings += 1;
            }
            _ => self.errors += 1,
        }
        self.entries.push(diagnostic);
    }

    pub fn error(&mut self, kind: impl Into<DiagnosticKind>, span: Span) {
        self.push(Diagnostic::new(kind, span));
    }

    pub fn error_with_note(&mut self, kind: impl Into<DiagnosticKind>, span: Span, note: Note) {
        self.push(Diagnostic::new(kind, span).with_note(note));
    }

    pub fn warning(&mut self, warning: Warning, span: Span) {
        self.push(Diagnostic::new(DiagnosticKind::Warning(warning), span));
    }

    /// Record an unrecoverable error that aborted a phase.
    pub fn report(&mut self, error: Error, breadcrumb: &Breadcrumb) {
        let diagnostic = match error {
            Error::Io { path, source, span } => {
                let kind = DiagnosticKind::Io {
                    path,
                    message: source.to_string(),
                };
                match span {
                    Some(span) => Diagnostic::new(kind, span),
                    None => Diagnostic::in_file(kind, Rc::clone(breadcrumb)),
                }
            }
            Error::Lex(error) => {
                let diagnostic = Diagnostic::new(error.kind, error.span);
                match error.note {
                    Some(note) => diagnostic.with_note(note),
                    None => diagnostic,
                }
            }
            Error::Ast(error) => Diagnostic::in_file(error, Rc::clone(breadcrumb)),
        };
        self.push(diagnostic);
    }

    /// Drop warnings of `kind` from now on.
    pub fn suppress(&mut self, kind: WarningKind) {
        if !self.suppressed.contains(&kind) {
            self.suppressed.push(kind);
        }
    }

    #[must_use]
    pub fn is_suppressed(&self, kind: WarningKind) -> bool {
        self.suppressed.contains(&kind)
    }

    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors
    }

    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings
    }

    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.errors > 0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Forget every entry and suppression.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Render every entry.
    #[must_use]
    pub fn render(&self, colors: &Colors) -> String {
        self.entries.iter().map(|d| d.render(colors)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Excerpt, Position};

    fn span(files: &[&str], line: usize, start: usize, end: usize, text: &str) -> Span {
        Span {
            breadcrumb: files.iter().map(|f| (*f).to_string()).collect(),
            start: Position::new(line, start),
            end: Position::new(line, end),
            excerpt: Rc::new(Excerpt::of_line(text.as_bytes(), start)),
        }
    }

    #[test]
    fn warning_names_round_trip() {
        for kind in WarningKind::ALL {
            assert_eq!(WarningKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(WarningKind::from_name("nonsense"), None);
    }

    #[test]
    fn counts_errors_and_warnings_separately() {
        let mut diagnostics = Diagnostics::new();
        let at = span(&["a.adl"], 1, 1, 1, "x");
        diagnostics.error(LexErrorKind::EmptyShortlabel, at.clone());
        diagnostics.warning(Warning::StraySemicolon, at);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn suppressed_warnings_are_dropped() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.suppress(WarningKind::StraySemicolon);
        diagnostics.warning(Warning::StraySemicolon, span(&["a.adl"], 1, 1, 1, ";"));
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn renders_gcc_style_error() {
        let diagnostic = Diagnostic::new(
            LexErrorKind::EmptyShortlabel,
            span(&["main.adl"], 3, 5, 6, "    - foo"),
        );
        let text = diagnostic.render(&Colors::plain());
        assert_eq!(
            text,
            "main.adl:3:5: error: empty shortlabel\n    3 |     - foo\n      |     ^^\n"
        );
    }

    #[test]
    fn renders_breadcrumb_and_warning_tag() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::Warning(Warning::StraySemicolon),
            span(&["main.adl", "inc.adl"], 1, 2, 2, "};"),
        );
        let text = diagnostic.render(&Colors::plain());
        assert!(text.starts_with("main.adl:\n--> inc.adl:1:2: warning: "));
        assert!(text.contains("[-Wstray-semicolon]"));
    }

    #[test]
    fn renders_note_after_primary() {
        let first = span(&["a.adl"], 1, 1, 3, "foo <int> {}");
        let second = span(&["a.adl"], 2, 1, 3, "foo <int> {}");
        let diagnostic = Diagnostic::new(
            SemanticErrorKind::DuplicateArgument {
                name: "foo".to_string(),
            },
            second,
        )
        .with_note(Note::new("previous definition is here", first));
        let text = diagnostic.render(&Colors::plain());
        let error_at = text.find("a.adl:2:1: error").expect("primary");
        let note_at = text.find("a.adl:1:1: note").expect("note");
        assert!(error_at < note_at);
    }

    #[test]
    fn span_less_diagnostic_has_file_only() {
        let diagnostic = Diagnostic::in_file(
            DiagnosticKind::Io {
                path: "missing.adl".to_string(),
                message: "not found".to_string(),
            },
            Rc::from(vec!["missing.adl".to_string()]),
        );
        assert_eq!(
            diagnostic.render(&Colors::plain()),
            "missing.adl: error: cannot read 'missing.adl': not found\n"
        );
    }
}
