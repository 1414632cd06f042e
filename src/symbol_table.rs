//! Name registries for definitions and their properties.
//!
//! The [`Ast`] owns one table for top-level names; every definition node
//! owns a nested table for its properties. Lookups go through [`raw_id`],
//! so `-v`, `--v` and `v` all land on the same key.

use std::fmt::{self, Write as _};

use crate::ast::{Ast, NodeId, NodeType};
use crate::diagnostics::{Diagnostics, Note};
use crate::token::Span;

/// Problems found while registering and resolving names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticErrorKind {
    DuplicateArgument { name: String },
    DuplicateType { name: String },
    DuplicateProperty { name: String },
    UnknownSymbol { name: String },
    UnknownType { name: String },
    NotAType { name: String, found: NodeType },
    UnknownMeta,
    UnknownArgument { name: String },
    UnknownProperty { target: String, property: String },
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateArgument { name } => {
                write!(f, "duplicate definition of argument '{name}'")
            }
            Self::DuplicateType { name } => write!(f, "duplicate definition of type '{name}'"),
            Self::DuplicateProperty { name } => {
                write!(f, "duplicate definition of property '{name}'")
            }
            Self::UnknownSymbol { name } => write!(f, "unknown symbol '{name}'"),
            Self::UnknownType { name } => write!(f, "undefined type '{name}'"),
            Self::NotAType { name, found } => {
                write!(f, "'{name}' names a {found}, not a type definition")
            }
            Self::UnknownMeta => f.write_str("reference to meta, but no meta block is defined"),
            Self::UnknownArgument { name } => write!(f, "undefined argument '{name}'"),
            Self::UnknownProperty { target, property } => {
                write!(f, "'{target}' has no property '{property}'")
            }
        }
    }
}

/// Normalized key for `id`.
///
/// Label dashes, type brackets and the property dot are stripped; `meta`
/// gets a key no user identifier can produce.
#[must_use]
pub fn raw_id(id: &str) -> String {
    if id == "meta" {
        return "[meta]".to_string();
    }
    let stripped = id
        .strip_prefix("--")
        .or_else(|| id.strip_prefix('-'))
        .or_else(|| id.strip_prefix('.'))
        .or_else(|| id.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')))
        .unwrap_or(id);
    stripped.to_string()
}

/// A registered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableEntry {
    /// The name as written.
    pub id: String,
    pub raw_id: String,
    pub node_type: NodeType,
    pub node: NodeId,
    /// Where the name was written, for duplicate notes.
    pub span: Span,
    /// Nodes that resolved against this entry.
    pub references: Vec<NodeId>,
}

/// Ordered list of entries with unique raw ids (meta excepted).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolTableEntry>,
}

impl SymbolTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `id` for `node`.
    ///
    /// A name already present is reported as a duplicate and not added,
    /// unless both are meta blocks; those are kept side by side and merged
    /// after the table is built. Returns whether an entry was added.
    pub fn add(
        &mut self,
        id: &str,
        node_type: NodeType,
        node: NodeId,
        span: Span,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let raw = raw_id(id);
        if node_type != NodeType::META
            && let Some(previous) = self.entries.iter().find(|e| e.raw_id == raw)
        {
            let name = id.to_string();
            let kind = match node_type {
                NodeType::TYPE_DEF => SemanticErrorKind::DuplicateType { name },
                NodeType::CONFIG => SemanticErrorKind::DuplicateProperty { name },
                _ => SemanticErrorKind::DuplicateArgument { name },
            };
            let note = Note::new("previous definition is here", previous.span.clone());
            diagnostics.error_with_note(kind, span, note);
            return false;
        }
        tracing::debug!(id, raw = %raw, kind = %node_type, "registered symbol");
        self.entries.push(SymbolTableEntry {
            id: id.to_string(),
            raw_id: raw,
            node_type,
            node,
            span,
            references: Vec::new(),
        });
        true
    }

    /// Remove the first entry matching `id`. Absent ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<SymbolTableEntry> {
        let raw = raw_id(id);
        let index = self.entries.iter().position(|e| e.raw_id == raw)?;
        Some(self.entries.remove(index))
    }

    /// Remove the entry at `index`, if there is one.
    pub fn remove_at(&mut self, index: usize) -> Option<SymbolTableEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SymbolTableEntry> {
        let raw = raw_id(id);
        self.entries.iter().find(|e| e.raw_id == raw)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SymbolTableEntry> {
        let raw = raw_id(id);
        self.entries.iter_mut().find(|e| e.raw_id == raw)
    }

    /// Like [`SymbolTable::get`], failing with `UnknownSymbol`.
    pub fn at(&self, id: &str) -> Result<&SymbolTableEntry, SemanticErrorKind> {
        self.get(id).ok_or_else(|| SemanticErrorKind::UnknownSymbol {
            name: id.to_string(),
        })
    }

    /// Record that `referrer` resolved against `id`. A referrer is only
    /// recorded once.
    pub fn add_reference(&mut self, id: &str, referrer: NodeId) -> bool {
        let Some(entry) = self.get_mut(id) else {
            return false;
        };
        if !entry.references.contains(&referrer) {
            entry.references.push(referrer);
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolTableEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Print the table with the nested tables of its definitions.
    #[must_use]
    pub fn render(&self, ast: &Ast) -> String {
        let mut out = String::new();
        self.write_nested(ast, &mut out, 0);
        out
    }

    fn write_nested(&self, ast: &Ast, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        for entry in &self.entries {
            let _ = write!(out, "{pad}{} {}", entry.node_type, entry.id);
            let nested = ast.nested_table(entry.node).filter(|t| !t.is_empty());
            if entry.references.is_empty() && nested.is_none() {
                out.push('\n');
                continue;
            }
            out.push_str(" [\n");
            write_references(ast, entry, out, &pad);
            if let Some(table) = nested {
                let _ = writeln!(out, "{pad}   nested table:");
                table.write_nested(ast, out, indent + 6);
            }
            let _ = writeln!(out, "{pad}]");
        }
    }
}

fn write_references(ast: &Ast, entry: &SymbolTableEntry, out: &mut String, pad: &str) {
    for referrer in &entry.references {
        if let Some(node) = ast.get(*referrer) {
            let _ = writeln!(
                out,
                "{pad}   referenced by a {} at line {}",
                node.node_type(),
                node.span.line()
            );
        }
    }
}

/// Flat listing, one entry per line.
impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "{} {}", entry.node_type, entry.id)?;
            if !entry.references.is_empty() {
                write!(f, " ({} references)", entry.references.len())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::ast::NodeKind;
    use crate::diagnostics::DiagnosticKind;
    use crate::token::{Excerpt, Position};

    fn span(line: usize) -> Span {
        Span {
            breadcrumb: Rc::from(vec!["t.adl".to_string()]),
            start: Position::new(line, 1),
            end: Position::new(line, 3),
            excerpt: Rc::new(Excerpt::default()),
        }
    }

    fn node(ast: &mut Ast, kind: NodeKind) -> NodeId {
        ast.alloc(kind, span(1))
    }

    #[test]
    fn raw_ids() {
        assert_eq!(raw_id("foo"), "foo");
        assert_eq!(raw_id("-f"), "f");
        assert_eq!(raw_id("--foo"), "foo");
        assert_eq!(raw_id("<int>"), "int");
        assert_eq!(raw_id(".name"), "name");
        assert_eq!(raw_id("meta"), "[meta]");
        assert_eq!(raw_id("--meta"), "meta");
    }

    #[test]
    fn labels_share_one_namespace() {
        let mut ast = Ast::new();
        let first = node(&mut ast, NodeKind::Configs);
        let mut table = SymbolTable::new();
        let mut diagnostics = Diagnostics::new();
        assert!(table.add("foo", NodeType::POSITIONAL, first, span(1), &mut diagnostics));
        assert!(table.contains("--foo"));
        assert!(table.contains("-foo"));
        assert!(!table.add("--foo", NodeType::OPTION, first, span(2), &mut diagnostics));
        assert_eq!(table.len(), 1);
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn duplicate_argument_cites_both_locations() {
        let mut ast = Ast::new();
        let id = node(&mut ast, NodeKind::Configs);
        let mut table = SymbolTable::new();
        let mut diagnostics = Diagnostics::new();
        table.add("foo", NodeType::POSITIONAL, id, span(1), &mut diagnostics);
        table.add("foo", NodeType::POSITIONAL, id, span(4), &mut diagnostics);
        let diagnostic = diagnostics.iter().next().expect("duplicate");
        assert_eq!(
            diagnostic.kind,
            DiagnosticKind::Semantic(SemanticErrorKind::DuplicateArgument {
                name: "foo".to_string()
            })
        );
        assert_eq!(diagnostic.span.as_ref().map(Span::line), Some(4));
        assert_eq!(diagnostic.notes[0].span.line(), 1);
    }

    #[test]
    fn duplicate_kind_follows_node_type() {
        let mut ast = Ast::new();
        let id = node(&mut ast, NodeKind::Configs);
        let mut table = SymbolTable::new();
        let mut diagnostics = Diagnostics::new();
        table.add("<int>", NodeType::TYPE_DEF, id, span(1), &mut diagnostics);
        table.add("<int>", NodeType::TYPE_DEF, id, span(2), &mut diagnostics);
        table.add(".name", NodeType::CONFIG, id, span(3), &mut diagnostics);
        table.add("name", NodeType::CONFIG, id, span(4), &mut diagnostics);
        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::Semantic(SemanticErrorKind::DuplicateType {
                    name: "<int>".to_string()
                }),
                DiagnosticKind::Semantic(SemanticErrorKind::DuplicateProperty {
                    name: "name".to_string()
                }),
            ]
        );
    }

    #[test]
    fn meta_duplicates_are_accepted() {
        let mut ast = Ast::new();
        let id = node(&mut ast, NodeKind::Configs);
        let mut table = SymbolTable::new();
        let mut diagnostics = Diagnostics::new();
        assert!(table.add("meta", NodeType::META, id, span(1), &mut diagnostics));
        assert!(table.add("meta", NodeType::META, id, span(5), &mut diagnostics));
        assert_eq!(table.len(), 2);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn at_reports_unknown_symbol() {
        let table = SymbolTable::new();
        assert_eq!(
            table.at("--missing"),
            Err(SemanticErrorKind::UnknownSymbol {
                name: "--missing".to_string()
            })
        );
    }

    #[test]
    fn remove_by_id_and_index() {
        let mut ast = Ast::new();
        let id = node(&mut ast, NodeKind::Configs);
        let mut table = SymbolTable::new();
        let mut diagnostics = Diagnostics::new();
        for name in ["a", "b", "c"] {
            table.add(name, NodeType::POSITIONAL, id, span(1), &mut diagnostics);
        }
        assert_eq!(table.remove("-b").map(|e| e.id), Some("b".to_string()));
        assert!(table.remove("b").is_none());
        assert_eq!(table.remove_at(1).map(|e| e.id), Some("c".to_string()));
        assert!(table.remove_at(5).is_none());
        assert_eq!(table.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn references_recorded_once() {
        let mut ast = Ast::new();
        let id = node(&mut ast, NodeKind::Configs);
        let referrer = node(&mut ast, NodeKind::Values);
        let mut table = SymbolTable::new();
        let mut diagnostics = Diagnostics::new();
        table.add("<int>", NodeType::TYPE_DEF, id, span(1), &mut diagnostics);
        assert!(table.add_reference("int", referrer));
        assert!(table.add_reference("int", referrer));
        assert!(!table.add_reference("float", referrer));
        assert_eq!(table.at("int").map(|e| e.references.len()), Ok(1));
    }

    #[test]
    fn render_nests_definition_tables() {
        let mut ast = Ast::new();
        let mut nested = SymbolTable::new();
        let mut diagnostics = Diagnostics::new();
        let config = node(&mut ast, NodeKind::Config);
        nested.add(".name", NodeType::CONFIG, config, span(2), &mut diagnostics);
        let typedef = node(&mut ast, NodeKind::TypeDef { table: nested });
        let mut root = SymbolTable::new();
        root.add("<int>", NodeType::TYPE_DEF, typedef, span(1), &mut diagnostics);
        assert_eq!(
            root.render(&ast),
            "type definition <int> [\n   nested table:\n      config .name\n]\n"
        );
        assert_eq!(root.to_string(), "type definition <int>\n");
    }
}
