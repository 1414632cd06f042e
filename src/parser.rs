use std::fmt;

use tracing::{debug, trace};

use crate::Error;
use crate::ast::{Ast, NodeId, NodeKind, NodeType};
use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::preprocessor::Preprocessor;
use crate::symbol_table::SymbolTable;
use crate::token::{Category, Span, Token, TokenKind};

/// Classifies a syntax error found in a stack that did not collapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// `;` outside of a definition body.
    StraySemicolon,
    /// Keyword followed directly by `;`.
    EmptyProperty { keyword: String },
    /// Values not closed by `;`.
    MissingSemicolon,
    /// Values with no keyword in front.
    MissingPropertyName,
    /// Properties outside of any `{ }`.
    MissingLCurly,
    UnterminatedLCurly,
    UnmatchedRCurly,
    MissingLSquare,
    UnterminatedLSquare,
    /// `{ }` with nothing naming it.
    NamelessBody,
    /// Positional without a type list.
    MissingTypes { name: String },
    /// `...` not following a type list.
    StrayVariadic,
    /// Modifier that is not `@suppress <warning>`, or a `@suppress` with
    /// no property after it.
    StrayModifier { name: String },
    /// `--long -s` instead of `-s --long`.
    MisorderedLabels { short: String, long: String },
    UnknownWarning { name: String },
    /// Catch-all when no specific cause is found.
    Unexpected,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StraySemicolon => write!(f, "stray ';' outside of a definition body"),
            Self::EmptyProperty { keyword } => write!(f, "property '{keyword}' has no values"),
            Self::MissingSemicolon => write!(f, "expected ';' after property values"),
            Self::MissingPropertyName => write!(f, "property values without a property name"),
            Self::MissingLCurly => write!(f, "properties outside of a definition body (missing '{{')"),
            Self::UnterminatedLCurly => write!(f, "unterminated '{{'"),
            Self::UnmatchedRCurly => write!(f, "'}}' without a matching '{{'"),
            Self::MissingLSquare => write!(f, "']' without a matching '['"),
            Self::UnterminatedLSquare => write!(f, "unterminated '['"),
            Self::NamelessBody => write!(f, "definition body without a name"),
            Self::MissingTypes { name } => write!(f, "positional '{name}' has no types"),
            Self::StrayVariadic => write!(f, "'...' must follow a type list"),
            Self::StrayModifier { name } => write!(f, "stray modifier '@{name}'"),
            Self::MisorderedLabels { short, long } => write!(
                f,
                "shortlabel '-{short}' must come before longlabel '--{long}'"
            ),
            Self::UnknownWarning { name } => {
                let known: Vec<_> = WarningKind::ALL.iter().map(|k| k.name()).collect();
                write!(f, "unknown warning '{name}' (expected one of {})", known.join(", "))
            }
            Self::Unexpected => write!(f, "Unexpected symbols."),
        }
    }
}

/// Entry on the parser stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Terminal(Token),
    NonTerminal(NodeId),
}

/// The parser stack. Depth 0 is the top.
#[derive(Debug, Default)]
pub struct SymbolStack {
    symbols: Vec<Symbol>,
}

impl SymbolStack {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbols: Vec::new(),
        }
    }

    pub fn push(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    pub fn pop(&mut self) -> Option<Symbol> {
        self.symbols.pop()
    }

    #[must_use]
    pub fn peek(&self, depth: usize) -> Option<&Symbol> {
        let index = self.symbols.len().checked_sub(depth + 1)?;
        self.symbols.get(index)
    }

    /// Remove the top `count` symbols, returned bottom first.
    pub fn split_off(&mut self, count: usize) -> Vec<Symbol> {
        let at = self.symbols.len().saturating_sub(count);
        self.symbols.split_off(at)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols from the bottom up.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

/// Shape of a stack symbol, as far as definition headers care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Ident,
    Meta,
    Short,
    Long,
    Type,
    Types,
    LSquare,
    RSquare,
    Dots,
    Other,
}

/// What the symbols in front of a body turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Header {
    TypeDef,
    Meta,
    Positional {
        optional: bool,
        variadic: bool,
    },
    Option {
        optional: bool,
        value_optional: bool,
        variadic: bool,
    },
}

/// Longest header: `[ -s --long ] [ <types> ... ]`.
const MAX_HEADER: usize = 8;

/// Match the definition header ending at the top of `tags`, returning it and
/// the number of symbols it covers.
fn match_header(tags: &[Tag]) -> Option<(Header, usize)> {
    use Tag::{Dots, Ident, LSquare, Long, Meta, RSquare, Short, Type, Types};

    match tags {
        [.., Type] => return Some((Header::TypeDef, 1)),
        [.., Meta] => return Some((Header::Meta, 1)),
        _ => {}
    }
    let (types_len, value_optional, variadic) = match tags {
        [.., LSquare, Types, Dots, RSquare] => (4, true, true),
        [.., LSquare, Types, RSquare] => (3, true, false),
        [.., Types, Dots] => (2, false, true),
        [.., Types] => (1, false, false),
        _ => (0, false, false),
    };
    let rest = &tags[..tags.len() - types_len];
    let (id_len, optional, labelled) = match rest {
        [.., LSquare, Short, Long, RSquare] => (4, true, true),
        [.., LSquare, Short | Long, RSquare] => (3, true, true),
        [.., LSquare, Ident, RSquare] => (3, true, false),
        [.., Short, Long] => (2, false, true),
        [.., Short | Long] => (1, false, true),
        [.., Ident] => (1, false, false),
        _ => return None,
    };
    let header = if labelled {
        Header::Option {
            optional,
            value_optional,
            variadic,
        }
    } else if types_len == 0 {
        return None;
    } else {
        // A bracketed type list on a positional makes the argument itself
        // optional.
        Header::Positional {
            optional: optional || value_optional,
            variadic,
        }
    };
    Some((header, id_len + types_len))
}

/// Leaf node for a token, if the token has one.
fn leaf_kind(token: &Token) -> Option<NodeKind> {
    let identifier = |category| NodeKind::Identifier {
        name: token.text.clone(),
        category,
    };
    let kind = match &token.kind {
        TokenKind::Identifier if token.text == "meta" => identifier(Category::Meta),
        TokenKind::Identifier => identifier(Category::Identifier),
        TokenKind::Shortlabel => identifier(Category::Shortlabel),
        TokenKind::Longlabel => identifier(Category::Longlabel),
        TokenKind::Type => identifier(Category::Type),
        TokenKind::Property => identifier(Category::Property),
        TokenKind::String => NodeKind::String(token.text.clone()),
        TokenKind::Regex => NodeKind::Regex(token.text.clone()),
        TokenKind::Number(value) => NodeKind::Number(*value),
        TokenKind::Decimal(value) => NodeKind::Decimal(*value),
        TokenKind::Boolean(value) => NodeKind::Boolean(*value),
        TokenKind::Snippet => NodeKind::Snippet(token.text.clone()),
        TokenKind::Reference { category, property } => NodeKind::Reference {
            target: token.text.clone(),
            category: *category,
            property: property.clone(),
            resolved: None,
        },
        _ => return None,
    };
    Some(kind)
}

/// Parse the stream of `source` into an [`Ast`].
///
/// Syntax errors are recorded in `diagnostics`; when there are any, the
/// returned tree has no root.
///
/// # Errors
///
/// Returns `Error` when reading the input fails outright, such as an
/// unreadable include or an unterminated block comment.
pub fn parse(source: Preprocessor, diagnostics: &mut Diagnostics) -> Result<Ast, Error> {
    Parser::new(source, diagnostics).parse()
}

/// Shift-reduce parser over a preprocessed token stream.
pub struct Parser<'a> {
    source: Preprocessor,
    ast: Ast,
    stack: SymbolStack,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(source: Preprocessor, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            source,
            ast: Ast::new(),
            stack: SymbolStack::new(),
            diagnostics,
        }
    }

    pub fn parse(mut self) -> Result<Ast, Error> {
        debug!(file = ?self.source.breadcrumb().first(), "parsing");
        let mut lookahead = self.source.pop(self.diagnostics)?;
        loop {
            if self.reduce()? {
                continue;
            }
            if lookahead.kind == TokenKind::Empty {
                break;
            }
            trace!(token = %lookahead.kind, text = %lookahead.text, "shift");
            self.stack.push(Symbol::Terminal(lookahead));
            lookahead = self.source.pop(self.diagnostics)?;
        }

        if self.stack.is_empty() {
            let file = self.ast.alloc(NodeKind::File, lookahead.span);
            self.ast.set_root(file)?;
            return Ok(self.ast);
        }
        if self.stack.len() == 1
            && let Some(file) = self.node_at(0, NodeType::FILE)
        {
            self.warn_trailing_suppress(file)?;
            self.ast.set_root(file)?;
            return Ok(self.ast);
        }
        debug!(symbols = self.stack.len(), "stack did not collapse");
        self.analyse(&lookahead.span);
        Ok(self.ast)
    }

    fn warn_trailing_suppress(&mut self, file: NodeId) -> Result<(), Error> {
        let Some(&last) = self.ast.children(file).last() else {
            return Ok(());
        };
        let node = self.ast.node(last)?;
        if node.node_type() == NodeType::SUPPRESS {
            self.diagnostics.warning(Warning::StraySuppress, node.span.clone());
        }
        Ok(())
    }

    // --- stack inspection

    fn token_at(&self, depth: usize) -> Option<&Token> {
        match self.stack.peek(depth)? {
            Symbol::Terminal(token) => Some(token),
            Symbol::NonTerminal(_) => None,
        }
    }

    fn is_token(&self, depth: usize, kind: &TokenKind) -> bool {
        self.token_at(depth).is_some_and(|t| t.is(kind))
    }

    /// Node at `depth` if its type is in `mask`.
    fn node_at(&self, depth: usize, mask: NodeType) -> Option<NodeId> {
        match self.stack.peek(depth)? {
            Symbol::NonTerminal(id) => {
                let node = self.ast.get(*id)?;
                node.node_type().intersects(mask).then_some(*id)
            }
            Symbol::Terminal(_) => None,
        }
    }

    fn is_keyword(&self, depth: usize) -> bool {
        self.is_token(depth, &TokenKind::Identifier) || self.is_token(depth, &TokenKind::Property)
    }

    fn tag_at(&self, depth: usize) -> Option<Tag> {
        let tag = match self.stack.peek(depth)? {
            Symbol::Terminal(token) => match token.kind {
                TokenKind::Identifier if token.text == "meta" => Tag::Meta,
                TokenKind::Identifier => Tag::Ident,
                TokenKind::Shortlabel => Tag::Short,
                TokenKind::Longlabel => Tag::Long,
                TokenKind::Type => Tag::Type,
                TokenKind::LSquare => Tag::LSquare,
                TokenKind::RSquare => Tag::RSquare,
                TokenKind::TripleDot => Tag::Dots,
                _ => Tag::Other,
            },
            Symbol::NonTerminal(_) if self.node_at(depth, NodeType::TYPES).is_some() => Tag::Types,
            Symbol::NonTerminal(_) => Tag::Other,
        };
        Some(tag)
    }

    fn pop_token(&mut self) -> Option<Token> {
        match self.stack.pop()? {
            Symbol::Terminal(token) => Some(token),
            symbol @ Symbol::NonTerminal(_) => {
                self.stack.push(symbol);
                None
            }
        }
    }

    fn widen(&mut self, id: NodeId, span: &Span) -> Result<(), Error> {
        let node = self.ast.node_mut(id)?;
        node.span = node.span.to(span);
        Ok(())
    }

    /// Allocate the leaf for `token` and attach it to `parent`.
    fn attach_leaf(&mut self, parent: NodeId, token: &Token) -> Result<(), Error> {
        if let Some(kind) = leaf_kind(token) {
            let leaf = self.ast.alloc(kind, token.span.clone());
            self.ast.add_child(parent, leaf)?;
        }
        Ok(())
    }

    // --- reductions

    /// Apply the first reduction that matches the top of the stack.
    fn reduce(&mut self) -> Result<bool, Error> {
        let top = match self.stack.peek(0) {
            None => return Ok(false),
            Some(Symbol::Terminal(token)) => Some(token.kind.clone()),
            Some(Symbol::NonTerminal(_)) => None,
        };
        match top {
            Some(kind) if kind.is_value() => self.reduce_value(),
            Some(TokenKind::Semicolon) => self.reduce_semicolon(),
            Some(TokenKind::Type) => self.reduce_type(),
            Some(TokenKind::Identifier) => self.reduce_suppress(),
            Some(TokenKind::RCurly) => self.reduce_body(),
            Some(_) => Ok(false),
            None if self.node_at(0, NodeType::CONFIG).is_some() => self.reduce_configs(),
            None if self.node_at(0, NodeType::TOPLEVEL).is_some() => self.reduce_file(),
            None => Ok(false),
        }
    }

    /// `Values := Value+`
    fn reduce_value(&mut self) -> Result<bool, Error> {
        let Some(token) = self.pop_token() else {
            return Ok(false);
        };
        let list = match self.node_at(0, NodeType::VALUES) {
            Some(list) => {
                self.widen(list, &token.span)?;
                list
            }
            None => {
                let list = self.ast.alloc(NodeKind::Values, token.span.clone());
                self.stack.push(Symbol::NonTerminal(list));
                list
            }
        };
        self.attach_leaf(list, &token)?;
        trace!(value = %token.kind, "reduce values");
        Ok(true)
    }

    /// `Config := Suppress* Keyword Values ';'`, plus dropping empty and
    /// doubled statements inside a body.
    fn reduce_semicolon(&mut self) -> Result<bool, Error> {
        if let Some(values) = self.node_at(1, NodeType::VALUES)
            && self.is_keyword(2)
        {
            let mut symbols = self.stack.split_off(3).into_iter();
            let (Some(Symbol::Terminal(keyword)), Some(_), Some(Symbol::Terminal(semicolon))) =
                (symbols.next(), symbols.next(), symbols.next())
            else {
                return Ok(false);
            };
            let config = self.ast.alloc(NodeKind::Config, keyword.span.to(&semicolon.span));

            let mut modifiers = Vec::new();
            while let Some(modifier) = self.node_at(0, NodeType::SUPPRESS) {
                self.stack.pop();
                modifiers.push(modifier);
            }
            for modifier in modifiers.into_iter().rev() {
                self.ast.add_child(config, modifier)?;
            }
            self.attach_leaf(config, &keyword)?;
            self.ast.add_child(config, values)?;
            self.stack.push(Symbol::NonTerminal(config));
            trace!(keyword = %keyword.text, "reduce config");
            return Ok(true);
        }

        let warning = if self.is_token(1, &TokenKind::LCurly) {
            Warning::EmptyStatement
        } else if self.node_at(1, NodeType::CONFIGS).is_some() {
            Warning::StraySemicolon
        } else {
            return Ok(false);
        };
        if let Some(semicolon) = self.pop_token() {
            self.diagnostics.warning(warning, semicolon.span);
        }
        Ok(true)
    }

    /// `Types := Type+`, when the type follows an argument name.
    fn reduce_type(&mut self) -> Result<bool, Error> {
        let existing = self.node_at(1, NodeType::TYPES);
        let follows_name = [
            TokenKind::Identifier,
            TokenKind::Shortlabel,
            TokenKind::Longlabel,
            TokenKind::LSquare,
            TokenKind::RSquare,
        ]
        .iter()
        .any(|kind| self.is_token(1, kind));
        if existing.is_none() && !follows_name {
            return Ok(false);
        }
        let Some(token) = self.pop_token() else {
            return Ok(false);
        };
        let list = match existing {
            Some(list) => {
                self.widen(list, &token.span)?;
                list
            }
            None => {
                let list = self.ast.alloc(
                    NodeKind::Types {
                        resolved: Vec::new(),
                    },
                    token.span.clone(),
                );
                self.stack.push(Symbol::NonTerminal(list));
                list
            }
        };
        self.attach_leaf(list, &token)?;
        trace!(name = %token.text, "reduce types");
        Ok(true)
    }

    /// `Suppress := Modifier("suppress") Identifier`
    fn reduce_suppress(&mut self) -> Result<bool, Error> {
        let is_suppress = self
            .token_at(1)
            .is_some_and(|t| t.kind == TokenKind::Modifier && t.text == "suppress");
        if !is_suppress {
            return Ok(false);
        }
        let mut symbols = self.stack.split_off(2).into_iter();
        let (Some(Symbol::Terminal(modifier)), Some(Symbol::Terminal(name))) =
            (symbols.next(), symbols.next())
        else {
            return Ok(false);
        };
        match WarningKind::from_name(&name.text) {
            Some(kind) => {
                debug!(warning = kind.name(), "suppressing");
                self.diagnostics.suppress(kind);
                let node = self
                    .ast
                    .alloc(NodeKind::Suppress(kind), modifier.span.to(&name.span));
                self.stack.push(Symbol::NonTerminal(node));
            }
            None => {
                let kind = ParseErrorKind::UnknownWarning { name: name.text };
                self.diagnostics.error(kind, name.span);
            }
        }
        Ok(true)
    }

    /// `Configs := Config+`
    fn reduce_configs(&mut self) -> Result<bool, Error> {
        let Some(Symbol::NonTerminal(config)) = self.stack.pop() else {
            return Ok(false);
        };
        let span = self.ast.node(config)?.span.clone();
        let list = match self.node_at(0, NodeType::CONFIGS) {
            Some(list) => {
                self.widen(list, &span)?;
                list
            }
            None => {
                let list = self.ast.alloc(NodeKind::Configs, span);
                self.stack.push(Symbol::NonTerminal(list));
                list
            }
        };
        self.ast.add_child(list, config)?;
        trace!("reduce configs");
        Ok(true)
    }

    /// `File := (Definition | Suppress)+`
    fn reduce_file(&mut self) -> Result<bool, Error> {
        let file = self.node_at(1, NodeType::FILE);
        if file.is_none() && self.stack.len() != 1 {
            return Ok(false);
        }
        let Some(Symbol::NonTerminal(definition)) = self.stack.pop() else {
            return Ok(false);
        };
        let span = self.ast.node(definition)?.span.clone();
        let file = match file {
            Some(file) => {
                self.widen(file, &span)?;
                file
            }
            None => {
                let file = self.ast.alloc(NodeKind::File, span);
                self.stack.push(Symbol::NonTerminal(file));
                file
            }
        };
        self.ast.add_child(file, definition)?;
        trace!("reduce file");
        Ok(true)
    }

    /// `Definition := Header '{' Configs? '}'`
    fn reduce_body(&mut self) -> Result<bool, Error> {
        let configs = self.node_at(1, NodeType::CONFIGS);
        let lcurly = if configs.is_some() { 2 } else { 1 };
        if !self.is_token(lcurly, &TokenKind::LCurly) {
            return Ok(false);
        }
        let mut tags: Vec<Tag> = (lcurly + 1..=lcurly + MAX_HEADER)
            .map_while(|depth| self.tag_at(depth))
            .collect();
        tags.reverse();
        let Some((header, header_len)) = match_header(&tags) else {
            return Ok(false);
        };

        let symbols = self.stack.split_off(header_len + lcurly + 1);
        let (Some(first), Some(Symbol::Terminal(rcurly))) = (symbols.first(), symbols.last())
        else {
            return Ok(false);
        };
        let start = match first {
            Symbol::Terminal(token) => token.span.clone(),
            Symbol::NonTerminal(id) => self.ast.node(*id)?.span.clone(),
        };
        let span = start.to(&rcurly.span);
        let kind = match header {
            Header::TypeDef => NodeKind::TypeDef {
                table: SymbolTable::new(),
            },
            Header::Meta => NodeKind::Meta {
                table: SymbolTable::new(),
            },
            Header::Positional { optional, variadic } => NodeKind::Positional {
                optional,
                variadic,
                table: SymbolTable::new(),
            },
            Header::Option {
                optional,
                value_optional,
                variadic,
            } => NodeKind::Option {
                optional,
                value_optional,
                variadic,
                table: SymbolTable::new(),
            },
        };
        let definition = self.ast.alloc(kind, span);

        for symbol in &symbols[..header_len] {
            match symbol {
                Symbol::Terminal(token) if header != Header::Meta => {
                    self.attach_leaf(definition, token)?;
                }
                Symbol::NonTerminal(types) => self.ast.add_child(definition, *types)?,
                Symbol::Terminal(_) => {}
            }
        }
        let configs = match configs {
            Some(configs) => configs,
            None => {
                let lcurly_span = match &symbols[header_len] {
                    Symbol::Terminal(token) => token.span.clone(),
                    Symbol::NonTerminal(_) => rcurly.span.clone(),
                };
                self.ast.alloc(NodeKind::Configs, lcurly_span.to(&rcurly.span))
            }
        };
        self.ast.add_child(definition, configs)?;
        self.stack.push(Symbol::NonTerminal(definition));
        trace!(?header, "reduce definition");
        Ok(true)
    }

    // --- error analysis

    /// Type and span of a non-terminal.
    fn node_info(&self, symbol: &Symbol) -> Option<(NodeType, Span)> {
        match symbol {
            Symbol::NonTerminal(id) => self.ast.get(*id).map(|n| (n.node_type(), n.span.clone())),
            Symbol::Terminal(_) => None,
        }
    }

    fn node_type_at(&self, symbols: &[&Symbol], index: Option<usize>) -> Option<(NodeType, Span)> {
        symbols.get(index?).and_then(|symbol| self.node_info(symbol))
    }

    /// Explain why the stack did not collapse. Always records at least one
    /// error.
    fn analyse(&mut self, end: &Span) {
        let errors = self.find_errors(end);
        for (kind, span) in errors {
            self.diagnostics.error(kind, span);
        }
    }

    fn find_errors(&self, end: &Span) -> Vec<(ParseErrorKind, Span)> {
        let symbols: Vec<&Symbol> = self.stack.iter().collect();
        let mut errors = Vec::new();
        let mut curlies: Vec<usize> = Vec::new();
        let mut squares: Vec<usize> = Vec::new();

        for (index, &symbol) in symbols.iter().enumerate() {
            let below = index.checked_sub(1);
            let Symbol::Terminal(t) = symbol else {
                match self.node_info(symbol) {
                    Some((NodeType::CONFIGS | NodeType::CONFIG, span)) if curlies.is_empty() => {
                        errors.push((ParseErrorKind::MissingLCurly, span));
                    }
                    Some((NodeType::SUPPRESS, span))
                        if !curlies.is_empty() && !self.begins_config(&symbols, index + 1) =>
                    {
                        let name = "suppress".to_string();
                        errors.push((ParseErrorKind::StrayModifier { name }, span));
                    }
                    Some((NodeType::VALUES, span)) if is_keyword_at(&symbols, below) => {
                        let closed = token_at(&symbols, Some(index + 1))
                            .is_some_and(|t| t.kind == TokenKind::Semicolon);
                        if !closed {
                            errors.push((ParseErrorKind::MissingSemicolon, span));
                        }
                    }
                    _ => {}
                }
                continue;
            };
            match t.kind {
                TokenKind::LCurly => curlies.push(index),
                TokenKind::RCurly => match curlies.pop() {
                    None => errors.push((ParseErrorKind::UnmatchedRCurly, t.span.clone())),
                    Some(open) => {
                        let body_is_clean = index - open == 1
                            || (index - open == 2
                                && self
                                    .node_type_at(&symbols, Some(open + 1))
                                    .is_some_and(|(ty, _)| ty == NodeType::CONFIGS));
                        if body_is_clean {
                            errors.extend(self.header_error(&symbols, open));
                        }
                    }
                },
                TokenKind::LSquare => squares.push(index),
                TokenKind::RSquare => {
                    if squares.pop().is_none() {
                        errors.push((ParseErrorKind::MissingLSquare, t.span.clone()));
                    }
                }
                TokenKind::Semicolon => {
                    if curlies.is_empty() {
                        errors.push((ParseErrorKind::StraySemicolon, t.span.clone()));
                    } else if let Some(keyword) = token_at(&symbols, below)
                        .filter(|_| is_keyword_at(&symbols, below))
                    {
                        let keyword = keyword.text.clone();
                        errors.push((ParseErrorKind::EmptyProperty { keyword }, t.span.clone()));
                    } else if let Some((NodeType::VALUES, span)) = self.node_type_at(&symbols, below) {
                        errors.push((ParseErrorKind::MissingPropertyName, span));
                    }
                }
                TokenKind::TripleDot => {
                    let after_types = self
                        .node_type_at(&symbols, below)
                        .is_some_and(|(ty, _)| ty == NodeType::TYPES);
                    if !after_types {
                        errors.push((ParseErrorKind::StrayVariadic, t.span.clone()));
                    }
                }
                TokenKind::Longlabel => {
                    if let Some((short, span)) = self.shortlabel_at(&symbols, index + 1) {
                        let long = t.text.clone();
                        errors.push((ParseErrorKind::MisorderedLabels { short, long }, span));
                    }
                }
                TokenKind::Modifier => {
                    let name = t.text.clone();
                    errors.push((ParseErrorKind::StrayModifier { name }, t.span.clone()));
                }
                _ => {}
            }
        }

        for open in curlies {
            if let Some(t) = token_at(&symbols, Some(open)) {
                errors.push((ParseErrorKind::UnterminatedLCurly, t.span.clone()));
            }
        }
        for open in squares {
            if let Some(t) = token_at(&symbols, Some(open)) {
                errors.push((ParseErrorKind::UnterminatedLSquare, t.span.clone()));
            }
        }
        if errors.is_empty() {
            let span = symbols
                .iter()
                .find_map(|&symbol| match symbol {
                    Symbol::Terminal(t) => Some(t.span.clone()),
                    Symbol::NonTerminal(_) => self
                        .node_info(symbol)
                        .filter(|(ty, _)| *ty != NodeType::FILE)
                        .map(|(_, span)| span),
                })
                .unwrap_or_else(|| end.clone());
            errors.push((ParseErrorKind::Unexpected, span));
        }
        errors
    }

    /// Whether the symbol at `index` can still be part of a config, which
    /// is a keyword or another `@suppress`.
    fn begins_config(&self, symbols: &[&Symbol], index: usize) -> bool {
        is_keyword_at(symbols, Some(index))
            || self
                .node_type_at(symbols, Some(index))
                .is_some_and(|(ty, _)| ty == NodeType::SUPPRESS)
    }

    /// Shortlabel at `index`, either still a token or already reduced as
    /// the first label of an option.
    fn shortlabel_at(&self, symbols: &[&Symbol], index: usize) -> Option<(String, Span)> {
        match symbols.get(index)? {
            Symbol::Terminal(t) if t.kind == TokenKind::Shortlabel => {
                Some((t.text.clone(), t.span.clone()))
            }
            Symbol::Terminal(_) => None,
            Symbol::NonTerminal(id) => {
                if self.ast.get(*id)?.node_type() != NodeType::OPTION {
                    return None;
                }
                self.ast
                    .identifiers(*id)
                    .into_iter()
                    .next()
                    .filter(|(_, category, _)| *category == Category::Shortlabel)
                    .map(|(name, _, span)| (name, span))
            }
        }
    }

    /// Cause of a well-formed body that was not reduced, judged by the
    /// symbol in front of its `{` at `open`.
    fn header_error(&self, symbols: &[&Symbol], open: usize) -> Option<(ParseErrorKind, Span)> {
        let lcurly = token_at(symbols, Some(open))?;
        let nameless = (ParseErrorKind::NamelessBody, lcurly.span.clone());
        let Some(below) = open.checked_sub(1) else {
            return Some(nameless);
        };
        let missing_types = |name: &Token| {
            let kind = ParseErrorKind::MissingTypes {
                name: name.text.clone(),
            };
            (kind, name.span.clone())
        };
        match symbols[below] {
            Symbol::Terminal(t) if t.kind == TokenKind::Identifier => Some(missing_types(t)),
            Symbol::Terminal(t) if t.kind == TokenKind::RSquare => token_at(symbols, below.checked_sub(1))
                .filter(|name| name.kind == TokenKind::Identifier)
                .map(missing_types),
            Symbol::Terminal(t) if matches!(t.kind, TokenKind::Semicolon | TokenKind::RCurly) => {
                Some(nameless)
            }
            Symbol::Terminal(_) => None,
            symbol @ Symbol::NonTerminal(_) => self
                .node_info(symbol)
                .filter(|(ty, _)| (NodeType::TOPLEVEL | NodeType::FILE).contains(*ty))
                .map(|_| nameless),
        }
    }
}

fn token_at<'s>(symbols: &[&'s Symbol], index: Option<usize>) -> Option<&'s Token> {
    match symbols.get(index?)? {
        Symbol::Terminal(token) => Some(token),
        Symbol::NonTerminal(_) => None,
    }
}

fn is_keyword_at(symbols: &[&Symbol], index: Option<usize>) -> bool {
    token_at(symbols, index)
        .is_some_and(|t| matches!(t.kind, TokenKind::Identifier | TokenKind::Property))
}
