use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::Error;
use crate::diagnostics::{Diagnostics, Note, Warning};
use crate::token::{Breadcrumb, Category, Excerpt, Position, Span, Token, TokenKind};

/// Classifies a lexer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// `-` followed by whitespace or end of input.
    EmptyShortlabel,
    /// `-ab`: shortlabels are exactly one character.
    ShortlabelTooLong(String),
    /// `--` followed by whitespace or end of input.
    EmptyLonglabel,
    /// `<` without a closing `>` before whitespace or end of input.
    UnterminatedType,
    /// `<>`
    EmptyType,
    /// `name.` with no property after the dot.
    MissingProperty,
    /// Newline or end of input before the closing quote.
    UnterminatedString,
    /// `(...)` holding something other than `true` or `false`.
    InvalidBoolean(String),
    /// `---` not followed by a digit.
    InvalidNumber,
    /// `/*` without a closing `*/`.
    UnterminatedComment,
    /// `++{` without a closing `}++`.
    UnterminatedSnippet,
    /// `#` or `@` without a name.
    MissingName { sigil: char },
    /// Byte that cannot start any token.
    UnexpectedCharacter(char),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyShortlabel => write!(f, "empty shortlabel"),
            Self::ShortlabelTooLong(text) => write!(
                f,
                "shortlabel '-{text}' must be a single character, use '--{text}' for a longlabel"
            ),
            Self::EmptyLonglabel => write!(f, "empty longlabel"),
            Self::UnterminatedType => {
                write!(f, "unterminated type, expected '>' before whitespace")
            }
            Self::EmptyType => write!(f, "empty type name"),
            Self::MissingProperty => {
                write!(f, "expected a property name after '.' in reference")
            }
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::InvalidBoolean(text) => write!(
                f,
                "invalid boolean '({text})', expected '(true)' or '(false)'"
            ),
            Self::InvalidNumber => write!(f, "expected digits after '---'"),
            Self::UnterminatedComment => write!(f, "unterminated multi-line comment"),
            Self::UnterminatedSnippet => {
                write!(f, "unterminated code snippet, expected '}}++'")
            }
            Self::MissingName { sigil } => write!(f, "expected a name after '{sigil}'"),
            Self::UnexpectedCharacter(ch) => write!(f, "unexpected character: {ch}"),
        }
    }
}

/// Unrecoverable lexer error that aborts the current phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {}, column {}", span.start.line, span.start.column)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
    pub note: Option<Note>,
}

/// Tokenize a source string, stopping at end of input.
///
/// Recoverable problems are logged into `diagnostics`; the returned list
/// never contains the final `Empty` token.
pub fn tokenize(input: &str, diagnostics: &mut Diagnostics) -> Result<Vec<Token>, Error> {
    let mut lexer = Lexer::new(input, Rc::from(vec!["<input>".to_string()]));
    let mut tokens = Vec::new();
    loop {
        let token = lexer.pop(diagnostics)?;
        if token.kind == TokenKind::Empty {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    col: usize,
    line_start: usize,
}

enum Suffix {
    None,
    Property(String),
    Invalid,
}

/// On-demand tokenizer for a single source file.
///
/// Tokens pushed back with [`Lexer::push`] are returned first, last pushed
/// first.
#[derive(Debug)]
pub struct Lexer {
    input: Vec<u8>,
    pos: usize,
    line: usize,
    col: usize,
    line_start: usize,
    breadcrumb: Breadcrumb,
    pushed: Vec<Token>,
    exhausted: bool,
}

impl Lexer {
    pub fn new(input: impl Into<String>, breadcrumb: Breadcrumb) -> Self {
        let input = input.into().into_bytes();
        let start = if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
            3
        } else {
            0
        };
        Self {
            input,
            pos: start,
            line: 1,
            col: 1,
            line_start: start,
            breadcrumb,
            pushed: Vec::new(),
            exhausted: false,
        }
    }

    /// Read `path` and lex it. The last breadcrumb entry names the file.
    pub fn open(path: &Path, breadcrumb: Breadcrumb) -> Result<Self, Error> {
        let source = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
            span: None,
        })?;
        Ok(Self::new(source, breadcrumb))
    }

    #[must_use]
    pub const fn breadcrumb(&self) -> &Breadcrumb {
        &self.breadcrumb
    }

    /// Remove and return the next token. Returns `Empty` forever once the
    /// input is used up.
    pub fn pop(&mut self, diagnostics: &mut Diagnostics) -> Result<Token, Error> {
        match self.pushed.pop() {
            Some(token) => Ok(token),
            None => self.next_token(diagnostics),
        }
    }

    /// Return the next token without removing it.
    pub fn peek(&mut self, diagnostics: &mut Diagnostics) -> Result<Token, Error> {
        let token = self.pop(diagnostics)?;
        self.push(token.clone());
        Ok(token)
    }

    /// Return a token to the front of the stream.
    pub fn push(&mut self, token: Token) {
        self.pushed.push(token);
    }

    /// Whether the input is used up and nothing but `Empty` was pushed back.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.exhausted && self.pushed.iter().all(|t| t.kind == TokenKind::Empty)
    }

    fn next_token(&mut self, diagnostics: &mut Diagnostics) -> Result<Token, Error> {
        loop {
            self.skip_whitespace();
            let start = self.mark();
            let Some(ch) = self.peek_byte() else {
                self.exhausted = true;
                return Ok(self.token(start, TokenKind::Empty, String::new()));
            };

            let token = match ch {
                b'/' if self.peek_at(1) == Some(b'/') => {
                    self.skip_line();
                    None
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.skip_block_comment()?;
                    None
                }
                b'-' => self.read_dash(start, diagnostics),
                b'<' => self.read_type(start, diagnostics),
                b'.' => self.read_dot(start, diagnostics),
                b'"' => self.read_string(start, TokenKind::String, diagnostics)?,
                b'r' if self.peek_at(1) == Some(b'"') => {
                    self.advance();
                    self.read_string(start, TokenKind::Regex, diagnostics)?
                }
                b'(' => self.read_boolean(start, diagnostics),
                b'+' => self.read_snippet(start, diagnostics)?,
                b'0'..=b'9' => Some(self.read_number(start, false, diagnostics)),
                b'#' => self.read_sigil(start, TokenKind::Macro, diagnostics),
                b'@' => self.read_sigil(start, TokenKind::Modifier, diagnostics),
                b'{' => Some(self.punctuation(start, TokenKind::LCurly)),
                b'}' => Some(self.punctuation(start, TokenKind::RCurly)),
                b'[' => Some(self.punctuation(start, TokenKind::LSquare)),
                b']' => Some(self.punctuation(start, TokenKind::RSquare)),
                b';' => Some(self.punctuation(start, TokenKind::Semicolon)),
                c if is_ident_start(c) => self.read_identifier(start, diagnostics),
                _ => {
                    self.unexpected(start, diagnostics);
                    None
                }
            };

            if let Some(token) = token {
                return Ok(token);
            }
        }
    }

    // -- cursor --

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(&ch) = self.input.get(self.pos) {
            self.pos += 1;
            if ch == b'\n' {
                self.line += 1;
                self.col = 1;
                self.line_start = self.pos;
            } else {
                self.col += 1;
            }
        }
    }

    fn advance_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek_byte().is_some_and(&pred) {
            self.advance();
        }
    }

    const fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            col: self.col,
            line_start: self.line_start,
        }
    }

    fn text_from(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn skip_whitespace(&mut self) {
        self.advance_while(is_whitespace);
    }

    fn skip_to_whitespace(&mut self) {
        self.advance_while(|c| !is_whitespace(c));
    }

    fn skip_line(&mut self) {
        self.advance_while(|c| c != b'\n');
    }

    // -- spans --

    fn span(&self, start: Mark) -> Span {
        let end = Position::new(self.line, self.col.saturating_sub(1).max(1));
        let start_pos = Position::new(start.line, start.col);
        let end = end.max(start_pos);
        Span {
            breadcrumb: Rc::clone(&self.breadcrumb),
            start: start_pos,
            end,
            excerpt: Rc::new(self.excerpt(start, end.line)),
        }
    }

    fn excerpt(&self, start: Mark, end_line: usize) -> Excerpt {
        let mut excerpt = Excerpt::of_line(self.line_at(start.line_start), start.col);
        let mut line_start = start.line_start;
        for _ in start.line..end_line {
            let rest = self.input.get(line_start..).unwrap_or_default();
            let Some(offset) = rest.iter().position(|&c| c == b'\n') else {
                break;
            };
            line_start += offset + 1;
            let next = self.line_at(line_start);
            let cut = &next[..next.len().min(crate::token::MAX_EXCERPT)];
            excerpt.lines.push(String::from_utf8_lossy(cut).into_owned());
        }
        excerpt
    }

    fn line_at(&self, line_start: usize) -> &[u8] {
        let rest = self.input.get(line_start..).unwrap_or_default();
        let end = rest.iter().position(|&c| c == b'\n').unwrap_or(rest.len());
        let line = &rest[..end];
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    fn token(&self, start: Mark, kind: TokenKind, text: String) -> Token {
        Token {
            kind,
            text,
            span: self.span(start),
        }
    }

    fn punctuation(&mut self, start: Mark, kind: TokenKind) -> Token {
        self.advance();
        let text = self.text_from(start.pos);
        self.token(start, kind, text)
    }

    fn error(&self, start: Mark, kind: LexErrorKind, diagnostics: &mut Diagnostics) {
        diagnostics.error(kind, self.span(start));
    }

    fn fatal(&self, start: Mark, kind: LexErrorKind, note: Option<Note>) -> Error {
        Error::Lex(LexError {
            kind,
            span: self.span(start),
            note,
        })
    }

    fn unexpected(&mut self, start: Mark, diagnostics: &mut Diagnostics) {
        let rest = &self.input[self.pos..self.input.len().min(self.pos + 4)];
        let ch = String::from_utf8_lossy(rest)
            .chars()
            .next()
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.advance();
        self.error(start, LexErrorKind::UnexpectedCharacter(ch), diagnostics);
        self.skip_to_whitespace();
    }

    // -- states --

    /// `-x`, `--name`, `---12`, and their reference forms.
    fn read_dash(&mut self, start: Mark, diagnostics: &mut Diagnostics) -> Option<Token> {
        self.advance();
        match self.peek_byte() {
            None => {
                self.error(start, LexErrorKind::EmptyShortlabel, diagnostics);
                None
            }
            Some(c) if is_whitespace(c) => {
                self.error(start, LexErrorKind::EmptyShortlabel, diagnostics);
                None
            }
            Some(b'-') => {
                self.advance();
                self.read_longlabel(start, diagnostics)
            }
            Some(c) if c.is_ascii_alphanumeric() || c == b'?' => {
                let label_start = self.pos;
                self.advance();
                if self.peek_byte().is_some_and(is_ident_char) {
                    self.advance_while(is_ident_char);
                    let text = self.text_from(label_start);
                    self.error(start, LexErrorKind::ShortlabelTooLong(text), diagnostics);
                    return None;
                }
                let text = self.text_from(label_start);
                self.labelled(start, text, Category::Shortlabel, diagnostics)
            }
            Some(_) => {
                self.unexpected(start, diagnostics);
                None
            }
        }
    }

    fn read_longlabel(&mut self, start: Mark, diagnostics: &mut Diagnostics) -> Option<Token> {
        match self.peek_byte() {
            Some(b'-') => {
                self.advance();
                if self.peek_byte().is_some_and(|c| c.is_ascii_digit()) {
                    Some(self.read_number(start, true, diagnostics))
                } else {
                    self.error(start, LexErrorKind::InvalidNumber, diagnostics);
                    self.skip_to_whitespace();
                    None
                }
            }
            Some(c) if c.is_ascii_alphanumeric() || c == b'_' => {
                let label_start = self.pos;
                self.advance_while(is_ident_char);
                let text = self.text_from(label_start);
                self.labelled(start, text, Category::Longlabel, diagnostics)
            }
            None => {
                self.error(start, LexErrorKind::EmptyLonglabel, diagnostics);
                None
            }
            Some(c) if is_whitespace(c) => {
                self.error(start, LexErrorKind::EmptyLonglabel, diagnostics);
                None
            }
            Some(_) => {
                self.unexpected(start, diagnostics);
                None
            }
        }
    }

    fn read_identifier(&mut self, start: Mark, diagnostics: &mut Diagnostics) -> Option<Token> {
        self.advance_while(is_ident_char);
        let text = self.text_from(start.pos);
        let category = if text == "meta" {
            Category::Meta
        } else {
            Category::Identifier
        };
        self.labelled(start, text, category, diagnostics)
    }

    /// `<name>`; a `.prop` suffix makes it a reference, while `...` is left
    /// for the next token.
    fn read_type(&mut self, start: Mark, diagnostics: &mut Diagnostics) -> Option<Token> {
        self.advance();
        let name_start = self.pos;
        self.advance_while(|c| c != b'>' && !is_whitespace(c));
        if self.peek_byte() != Some(b'>') {
            self.error(start, LexErrorKind::UnterminatedType, diagnostics);
            return None;
        }
        let text = self.text_from(name_start);
        self.advance();
        if text.is_empty() {
            self.error(start, LexErrorKind::EmptyType, diagnostics);
            return None;
        }
        self.labelled(start, text, Category::Type, diagnostics)
    }

    /// Finish a label-like token, turning it into a reference when a
    /// `.property` suffix follows.
    fn labelled(
        &mut self,
        start: Mark,
        text: String,
        category: Category,
        diagnostics: &mut Diagnostics,
    ) -> Option<Token> {
        match self.read_suffix(start, diagnostics) {
            Suffix::Invalid => None,
            Suffix::Property(property) => Some(self.token(
                start,
                TokenKind::Reference { category, property },
                text,
            )),
            Suffix::None => {
                let kind = match category {
                    Category::Identifier | Category::Meta => TokenKind::Identifier,
                    Category::Shortlabel => TokenKind::Shortlabel,
                    Category::Longlabel => TokenKind::Longlabel,
                    Category::Type => TokenKind::Type,
                    Category::Property => TokenKind::Property,
                };
                Some(self.token(start, kind, text))
            }
        }
    }

    fn read_suffix(&mut self, start: Mark, diagnostics: &mut Diagnostics) -> Suffix {
        if self.peek_byte() != Some(b'.') || self.peek_at(1) == Some(b'.') {
            return Suffix::None;
        }
        self.advance();
        if !self.peek_byte().is_some_and(is_ident_start) {
            self.error(start, LexErrorKind::MissingProperty, diagnostics);
            self.skip_to_whitespace();
            return Suffix::Invalid;
        }
        let property_start = self.pos;
        self.advance_while(is_ident_char);
        Suffix::Property(self.text_from(property_start))
    }

    /// `...` or a `.name` property keyword.
    fn read_dot(&mut self, start: Mark, diagnostics: &mut Diagnostics) -> Option<Token> {
        if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') {
            self.advance();
            self.advance();
            self.advance();
            return Some(self.token(start, TokenKind::TripleDot, "...".to_string()));
        }
        if self.peek_at(1).is_some_and(is_ident_start) {
            self.advance();
            let name_start = self.pos;
            self.advance_while(is_ident_char);
            let text = self.text_from(name_start);
            return Some(self.token(start, TokenKind::Property, text));
        }
        self.unexpected(start, diagnostics);
        None
    }

    fn read_string(
        &mut self,
        start: Mark,
        kind: TokenKind,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Token>, Error> {
        let raw = kind == TokenKind::Regex;
        self.advance();
        let mut value = Vec::new();
        loop {
            match self.peek_byte() {
                None => {
                    return Err(self.fatal(start, LexErrorKind::UnterminatedString, None));
                }
                Some(b'\n') => {
                    self.error(start, LexErrorKind::UnterminatedString, diagnostics);
                    self.advance();
                    return Ok(None);
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.peek_byte() {
                        Some(b'"') => value.push(b'"'),
                        Some(c) if raw => value.extend_from_slice(&[b'\\', c]),
                        Some(b'n') => value.push(b'\n'),
                        Some(b't') => value.push(b'\t'),
                        Some(b'r') => value.push(b'\r'),
                        Some(b'\\') => value.push(b'\\'),
                        Some(b'\n') | None => {
                            value.push(b'\\');
                            continue;
                        }
                        Some(c) => value.extend_from_slice(&[b'\\', c]),
                    }
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        let text = String::from_utf8_lossy(&value).into_owned();
        Ok(Some(self.token(start, kind, text)))
    }

    fn read_boolean(&mut self, start: Mark, diagnostics: &mut Diagnostics) -> Option<Token> {
        self.advance();
        let inner_start = self.pos;
        self.advance_while(|c| c != b')' && !is_whitespace(c));
        let text = self.text_from(inner_start);
        let closed = self.peek_byte() == Some(b')');
        if closed {
            self.advance();
        }
        match (closed, text.as_str()) {
            (true, "true") => Some(self.token(start, TokenKind::Boolean(true), text)),
            (true, "false") => Some(self.token(start, TokenKind::Boolean(false), text)),
            _ => {
                self.error(start, LexErrorKind::InvalidBoolean(text), diagnostics);
                None
            }
        }
    }

    /// `++{ code }++`. Comments and string literals inside the code are
    /// skipped so they cannot end the block early.
    fn read_snippet(
        &mut self,
        start: Mark,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<Token>, Error> {
        if self.peek_at(1) != Some(b'+') || self.peek_at(2) != Some(b'{') {
            self.unexpected(start, diagnostics);
            return Ok(None);
        }
        self.advance();
        self.advance();
        self.advance();
        let code_start = self.pos;
        loop {
            match self.peek_byte() {
                None => {
                    return Err(self.fatal(start, LexErrorKind::UnterminatedSnippet, None));
                }
                Some(b'}') if self.peek_at(1) == Some(b'+') && self.peek_at(2) == Some(b'+') => {
                    let code = self.text_from(code_start);
                    self.advance();
                    self.advance();
                    self.advance();
                    return Ok(Some(self.token(start, TokenKind::Snippet, code)));
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_line(),
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment()?,
                Some(quote @ (b'"' | b'\'')) => self.skip_quoted(quote),
                Some(_) => self.advance(),
            }
        }
    }

    fn skip_quoted(&mut self, quote: u8) {
        self.advance();
        while let Some(c) = self.peek_byte() {
            match c {
                b'\\' => {
                    self.advance();
                    self.advance();
                }
                b'\n' => return,
                c if c == quote => {
                    self.advance();
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), Error> {
        let start = self.mark();
        self.advance();
        self.advance();
        loop {
            match self.peek_byte() {
                None => {
                    let mut opener = self.span(start);
                    opener.end = Position::new(start.line, start.col + 1);
                    let eof = self.mark();
                    return Err(self.fatal(
                        eof,
                        LexErrorKind::UnterminatedComment,
                        Some(Note::new("comment opened here", opener)),
                    ));
                }
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    /// Digits, optionally followed by `.digits`. Overflow clamps and warns.
    fn read_number(&mut self, start: Mark, negative: bool, diagnostics: &mut Diagnostics) -> Token {
        let digits_start = self.pos;
        self.advance_while(|c| c.is_ascii_digit());
        let is_decimal =
            self.peek_byte() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_decimal {
            self.advance();
            self.advance_while(|c| c.is_ascii_digit());
        }

        let digits = self.text_from(digits_start);
        let literal = if negative {
            format!("-{digits}")
        } else {
            digits.clone()
        };

        if is_decimal {
            let mut value = literal.parse::<f64>().unwrap_or(f64::INFINITY);
            if value.is_infinite() {
                diagnostics.warning(
                    Warning::FloatOverflow {
                        literal: literal.clone(),
                    },
                    self.span(start),
                );
                value = if negative { f64::MIN } else { f64::MAX };
            }
            return self.token(start, TokenKind::Decimal(value), literal);
        }

        let value = accumulate(&digits, negative).unwrap_or_else(|| {
            let warning = if negative {
                Warning::IntegerUnderflow {
                    literal: literal.clone(),
                }
            } else {
                Warning::IntegerOverflow {
                    literal: literal.clone(),
                }
            };
            diagnostics.warning(warning, self.span(start));
            if negative { i64::MIN } else { i64::MAX }
        });
        self.token(start, TokenKind::Number(value), literal)
    }

    /// `#name` or `@name`.
    fn read_sigil(
        &mut self,
        start: Mark,
        kind: TokenKind,
        diagnostics: &mut Diagnostics,
    ) -> Option<Token> {
        let sigil = char::from(self.input[self.pos]);
        self.advance();
        let name_start = self.pos;
        self.advance_while(is_ident_char);
        if self.pos == name_start {
            self.error(start, LexErrorKind::MissingName { sigil }, diagnostics);
            self.skip_to_whitespace();
            return None;
        }
        let text = self.text_from(name_start);
        Some(self.token(start, kind, text))
    }
}

/// Checked decimal accumulation; `None` on overflow.
fn accumulate(digits: &str, negative: bool) -> Option<i64> {
    digits.bytes().try_fold(0_i64, |acc, digit| {
        let digit = i64::from(digit - b'0');
        let acc = acc.checked_mul(10)?;
        if negative {
            acc.checked_sub(digit)
        } else {
            acc.checked_add(digit)
        }
    })
}

const fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

const fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

const fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
}
