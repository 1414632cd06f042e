use std::fmt;
use std::rc::Rc;

/// Ordered list of file names from the root file down to the file a
/// token came from.
pub type Breadcrumb = Rc<[String]>;

/// Longest excerpt kept for a single source line.
pub const MAX_EXCERPT: usize = 50;

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// The source lines covered by a span, for diagnostics.
///
/// Long lines are cut down to [`MAX_EXCERPT`] bytes around the start of the
/// span; `first_column` is the column of the first byte kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Excerpt {
    pub first_column: usize,
    pub lines: Vec<String>,
}

impl Excerpt {
    /// Cut `line` down to a window around `column`.
    #[must_use]
    pub fn of_line(line: &[u8], column: usize) -> Self {
        if line.len() <= MAX_EXCERPT {
            return Self {
                first_column: 1,
                lines: vec![String::from_utf8_lossy(line).into_owned()],
            };
        }
        let start = column
            .saturating_sub(1)
            .saturating_sub(MAX_EXCERPT / 2)
            .min(line.len() - MAX_EXCERPT);
        Self {
            first_column: start + 1,
            lines: vec![String::from_utf8_lossy(&line[start..start + MAX_EXCERPT]).into_owned()],
        }
    }
}

/// Source location of a token or node: start and end position
/// (end column inclusive) plus the originating file breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub breadcrumb: Breadcrumb,
    pub start: Position,
    pub end: Position,
    pub excerpt: Rc<Excerpt>,
}

impl Span {
    /// File the span points into, if it has one.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.breadcrumb.last().map(String::as_str)
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.start.line
    }

    #[must_use]
    pub const fn column(&self) -> usize {
        self.start.column
    }

    /// Span starting at `self` and ending where `other` ends.
    #[must_use]
    pub fn to(&self, other: &Self) -> Self {
        if other.end < self.start {
            return other.to(self);
        }
        let mut merged = self.clone();
        merged.end = other.end;
        merged
    }
}

/// How an identifier was written, which decides its namespace key and the
/// diagnostic reported when it cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Plain identifier naming a positional argument.
    Identifier,
    /// `-x`
    Shortlabel,
    /// `--name`
    Longlabel,
    /// `<name>`
    Type,
    /// The `meta` keyword.
    Meta,
    /// `.name` property keyword.
    Property,
}

impl Category {
    /// The identifier as it appears in source.
    #[must_use]
    pub fn external(self, name: &str) -> String {
        match self {
            Self::Identifier | Self::Meta => name.to_string(),
            Self::Shortlabel => format!("-{name}"),
            Self::Longlabel => format!("--{name}"),
            Self::Type => format!("<{name}>"),
            Self::Property => format!(".{name}"),
        }
    }
}

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare word such as `name` or `meta`.
    Identifier,
    /// `-x`; text holds the single character.
    Shortlabel,
    /// `--name`; text holds the name.
    Longlabel,
    /// `<name>`; text holds the name.
    Type,
    /// `.name` property keyword; text holds the name.
    Property,
    /// `target.property`; text holds the target.
    Reference { category: Category, property: String },
    /// `"..."` with escapes resolved.
    String,
    /// `r"..."`
    Regex,
    Number(i64),
    Decimal(f64),
    /// `(true)` or `(false)`.
    Boolean(bool),
    /// `++{ ... }++`; text holds the code between the delimiters.
    Snippet,
    LSquare,
    RSquare,
    LCurly,
    RCurly,
    Semicolon,
    /// `...`
    TripleDot,
    /// `#name`
    Macro,
    /// `@name`
    Modifier,
    /// End of input.
    Empty,
}

impl TokenKind {
    /// Whether the token can appear in a property's value list.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(
            self,
            Self::String
                | Self::Regex
                | Self::Number(_)
                | Self::Decimal(_)
                | Self::Boolean(_)
                | Self::Reference { .. }
                | Self::Snippet
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Identifier => "identifier",
            Self::Shortlabel => "shortlabel",
            Self::Longlabel => "longlabel",
            Self::Type => "type",
            Self::Property => "property keyword",
            Self::Reference { .. } => "reference",
            Self::String => "string",
            Self::Regex => "regex",
            Self::Number(_) => "number",
            Self::Decimal(_) => "decimal",
            Self::Boolean(_) => "boolean",
            Self::Snippet => "code snippet",
            Self::LSquare => "'['",
            Self::RSquare => "']'",
            Self::LCurly => "'{'",
            Self::RCurly => "'}'",
            Self::Semicolon => "';'",
            Self::TripleDot => "'...'",
            Self::Macro => "macro",
            Self::Modifier => "modifier",
            Self::Empty => "end of file",
        };
        f.write_str(name)
    }
}

/// A single token with its kind, text, and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    /// Compare kinds while ignoring payloads.
    #[must_use]
    pub fn is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_kept_whole() {
        let excerpt = Excerpt::of_line(b"<int> { .name 1; }", 3);
        assert_eq!(excerpt.first_column, 1);
        assert_eq!(excerpt.lines, vec!["<int> { .name 1; }".to_string()]);
    }

    #[test]
    fn long_line_centred_on_column() {
        let line = "x".repeat(200);
        let excerpt = Excerpt::of_line(line.as_bytes(), 100);
        assert_eq!(excerpt.lines[0].len(), MAX_EXCERPT);
        assert_eq!(excerpt.first_column, 100 - MAX_EXCERPT / 2);
    }

    #[test]
    fn long_line_window_clamped_to_end() {
        let line = "y".repeat(80);
        let excerpt = Excerpt::of_line(line.as_bytes(), 79);
        assert_eq!(excerpt.first_column, 31);
        assert_eq!(excerpt.lines[0].len(), MAX_EXCERPT);
    }

    #[test]
    fn external_forms() {
        assert_eq!(Category::Shortlabel.external("v"), "-v");
        assert_eq!(Category::Longlabel.external("verbose"), "--verbose");
        assert_eq!(Category::Type.external("int"), "<int>");
        assert_eq!(Category::Meta.external("meta"), "meta");
    }
}
