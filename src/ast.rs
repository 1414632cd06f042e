//! Arena-backed syntax tree.
//!
//! Nodes live in a single [`Ast`] and refer to each other through
//! [`NodeId`]s. Each node has at most one parent; branch kinds only accept
//! children whose [`NodeType`] is on their whitelist. Subtrees are only ever
//! released by [`Ast::replace_child`] (and root replacement), which keeps
//! ownership changes in one place.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::diagnostics::WarningKind;
use crate::symbol_table::SymbolTable;
use crate::token::{Category, Span};

/// Set of node kinds, used for whitelists and traversal filters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeType(u32);

impl NodeType {
    pub const NONE: Self = Self(0);
    pub const FILE: Self = Self(1 << 0);
    pub const META: Self = Self(1 << 1);
    pub const TYPE_DEF: Self = Self(1 << 2);
    pub const POSITIONAL: Self = Self(1 << 3);
    pub const OPTION: Self = Self(1 << 4);
    pub const IDENTIFIER: Self = Self(1 << 5);
    pub const TYPES: Self = Self(1 << 6);
    pub const CONFIGS: Self = Self(1 << 7);
    pub const CONFIG: Self = Self(1 << 8);
    pub const VALUES: Self = Self(1 << 9);
    pub const STRING: Self = Self(1 << 10);
    pub const REGEX: Self = Self(1 << 11);
    pub const NUMBER: Self = Self(1 << 12);
    pub const DECIMAL: Self = Self(1 << 13);
    pub const BOOLEAN: Self = Self(1 << 14);
    pub const REFERENCE: Self = Self(1 << 15);
    pub const SNIPPET: Self = Self(1 << 16);
    pub const SUPPRESS: Self = Self(1 << 17);

    /// Anything that can sit in a value list.
    pub const VALUE_KINDS: Self = Self(
        Self::STRING.0
            | Self::REGEX.0
            | Self::NUMBER.0
            | Self::DECIMAL.0
            | Self::BOOLEAN.0
            | Self::REFERENCE.0
            | Self::SNIPPET.0,
    );
    /// Nodes that own a nested symbol table.
    pub const DEFINITIONS: Self =
        Self(Self::META.0 | Self::TYPE_DEF.0 | Self::POSITIONAL.0 | Self::OPTION.0);
    /// Nodes allowed directly under a file.
    pub const TOPLEVEL: Self = Self(Self::DEFINITIONS.0 | Self::SUPPRESS.0);

    const NAMES: [(Self, &'static str); 18] = [
        (Self::FILE, "file"),
        (Self::META, "meta"),
        (Self::TYPE_DEF, "type definition"),
        (Self::POSITIONAL, "positional"),
        (Self::OPTION, "option"),
        (Self::IDENTIFIER, "identifier"),
        (Self::TYPES, "types"),
        (Self::CONFIGS, "configs"),
        (Self::CONFIG, "config"),
        (Self::VALUES, "values"),
        (Self::STRING, "string"),
        (Self::REGEX, "regex"),
        (Self::NUMBER, "number"),
        (Self::DECIMAL, "decimal"),
        (Self::BOOLEAN, "boolean"),
        (Self::REFERENCE, "reference"),
        (Self::SNIPPET, "snippet"),
        (Self::SUPPRESS, "suppress"),
    ];

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every kind in `other` is also in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Names of the kinds in the set, in declaration order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(kind, _)| self.intersects(*kind))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl BitOr for NodeType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for NodeType {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Lists the kinds as "a, b and c".
impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.names().as_slice() {
            [] => f.write_str("nothing"),
            [only] => f.write_str(only),
            [init @ .., last] => write!(f, "{} and {last}", init.join(", ")),
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", self.names().join(" | "))
    }
}

/// Stable handle to a node in an [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Misuse of the tree API. These are bugs in the caller, not problems
/// with the source being compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AstError {
    #[error("cannot accept node of type {given} as child of {parent} (only allows {allowed})")]
    IllegalChild {
        parent: NodeType,
        given: NodeType,
        allowed: NodeType,
    },
    #[error("too many nodes given as child of {parent}; cannot accept more than {max} nodes")]
    MaximumChildren { parent: NodeType, max: usize },
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} already has a parent")]
    AlreadyAttached(NodeId),
    #[error("cannot use node of type {0} as the tree root")]
    IllegalRoot(NodeType),
}

/// Node payload. The variant decides the [`NodeType`], the whitelist and
/// the maximum child count.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    File,
    Meta {
        table: SymbolTable,
    },
    TypeDef {
        table: SymbolTable,
    },
    Positional {
        optional: bool,
        variadic: bool,
        table: SymbolTable,
    },
    Option {
        optional: bool,
        value_optional: bool,
        variadic: bool,
        table: SymbolTable,
    },
    /// Type list of a positional or option; `resolved` is filled in by the
    /// reference check, one slot per identifier child.
    Types {
        resolved: Vec<Option<NodeId>>,
    },
    Configs,
    /// Children: any `Suppress` modifiers, the keyword identifier, then the
    /// values.
    Config,
    Values,
    Identifier {
        name: String,
        category: Category,
    },
    String(String),
    Regex(String),
    Number(i64),
    Decimal(f64),
    Boolean(bool),
    Reference {
        target: String,
        category: Category,
        property: String,
        resolved: Option<NodeId>,
    },
    Snippet(String),
    Suppress(WarningKind),
}

impl NodeKind {
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::File => NodeType::FILE,
            Self::Meta { .. } => NodeType::META,
            Self::TypeDef { .. } => NodeType::TYPE_DEF,
            Self::Positional { .. } => NodeType::POSITIONAL,
            Self::Option { .. } => NodeType::OPTION,
            Self::Types { .. } => NodeType::TYPES,
            Self::Configs => NodeType::CONFIGS,
            Self::Config => NodeType::CONFIG,
            Self::Values => NodeType::VALUES,
            Self::Identifier { .. } => NodeType::IDENTIFIER,
            Self::String(_) => NodeType::STRING,
            Self::Regex(_) => NodeType::REGEX,
            Self::Number(_) => NodeType::NUMBER,
            Self::Decimal(_) => NodeType::DECIMAL,
            Self::Boolean(_) => NodeType::BOOLEAN,
            Self::Reference { .. } => NodeType::REFERENCE,
            Self::Snippet(_) => NodeType::SNIPPET,
            Self::Suppress(_) => NodeType::SUPPRESS,
        }
    }

    /// Kinds this node accepts as children. Empty for leaves.
    #[must_use]
    pub const fn whitelist(&self) -> NodeType {
        match self {
            Self::File => NodeType::TOPLEVEL,
            Self::Meta { .. } => NodeType::CONFIGS,
            Self::TypeDef { .. } => NodeType::IDENTIFIER.union(NodeType::CONFIGS),
            Self::Positional { .. } | Self::Option { .. } => NodeType::IDENTIFIER
                .union(NodeType::TYPES)
                .union(NodeType::CONFIGS),
            Self::Types { .. } => NodeType::IDENTIFIER,
            Self::Configs => NodeType::CONFIG,
            Self::Config => NodeType::SUPPRESS
                .union(NodeType::IDENTIFIER)
                .union(NodeType::VALUES),
            Self::Values => NodeType::VALUE_KINDS,
            _ => NodeType::NONE,
        }
    }

    /// Upper bound on the number of children, if any.
    #[must_use]
    pub const fn max_children(&self) -> Option<usize> {
        match self {
            Self::Meta { .. } => Some(1),
            Self::TypeDef { .. } => Some(2),
            Self::Positional { .. } => Some(3),
            Self::Option { .. } => Some(4),
            Self::File
            | Self::Types { .. }
            | Self::Configs
            | Self::Config
            | Self::Values => None,
            _ => Some(0),
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.whitelist().is_empty()
    }

    /// Nested property table of a definition.
    #[must_use]
    pub const fn table(&self) -> Option<&SymbolTable> {
        match self {
            Self::Meta { table }
            | Self::TypeDef { table }
            | Self::Positional { table, .. }
            | Self::Option { table, .. } => Some(table),
            _ => None,
        }
    }

    pub const fn table_mut(&mut self) -> Option<&mut SymbolTable> {
        match self {
            Self::Meta { table }
            | Self::TypeDef { table }
            | Self::Positional { table, .. }
            | Self::Option { table, .. } => Some(table),
            _ => None,
        }
    }
}

/// A node and its links.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The tree plus the root symbol table.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Option<Node>>,
    root: Option<NodeId>,
    table: SymbolTable,
}

impl Ast {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node.
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            kind,
            span,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, AstError> {
        self.get(id).ok_or(AstError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, AstError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(AstError::UnknownNode(id))
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Install `id` as the root. It must be a detached file node; a previous
    /// root is released.
    pub fn set_root(&mut self, id: NodeId) -> Result<(), AstError> {
        let node = self.node(id)?;
        if node.node_type() != NodeType::FILE {
            return Err(AstError::IllegalRoot(node.node_type()));
        }
        if node.parent.is_some() {
            return Err(AstError::AlreadyAttached(id));
        }
        if let Some(old) = self.root.replace(id)
            && old != id
        {
            self.free(old);
        }
        Ok(())
    }

    /// Root symbol table, holding top-level definition names.
    #[must_use]
    pub const fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub const fn table_mut(&mut self) -> &mut SymbolTable {
        &mut self.table
    }

    /// Children of `id`, empty if it does not exist.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// First child of `id` whose type is in `mask`.
    #[must_use]
    pub fn find_child(&self, id: NodeId, mask: NodeType) -> Option<NodeId> {
        self.children_of_type(id, mask).next()
    }

    /// Children of `id` whose type is in `mask`, in order.
    pub fn children_of_type(&self, id: NodeId, mask: NodeType) -> impl Iterator<Item = NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.get(*child).is_some_and(|n| n.node_type().intersects(mask)))
    }

    /// Attach the detached node `child` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), AstError> {
        let child_type = self.node(child)?.node_type();
        if self.node(child)?.parent.is_some() {
            return Err(AstError::AlreadyAttached(child));
        }
        let node = self.node(parent)?;
        if let Some(max) = node.kind.max_children()
            && node.children.len() >= max
        {
            return Err(AstError::MaximumChildren {
                parent: node.node_type(),
                max,
            });
        }
        let allowed = node.kind.whitelist();
        if !allowed.contains(child_type) {
            return Err(AstError::IllegalChild {
                parent: node.node_type(),
                given: child_type,
                allowed,
            });
        }
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Put `new` in place of the child of `parent` at `index` and release the
    /// old child's subtree. `new` is detached from wherever it was first.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        index: usize,
        new: NodeId,
    ) -> Result<(), AstError> {
        let node = self.node(parent)?;
        let old = *node.children.get(index).ok_or(AstError::UnknownNode(new))?;
        if old == new {
            return Ok(());
        }
        let allowed = node.kind.whitelist();
        let given = self.node(new)?.node_type();
        if !allowed.contains(given) {
            return Err(AstError::IllegalChild {
                parent: node.node_type(),
                given,
                allowed,
            });
        }

        self.detach(new)?;
        let parent_node = self.node_mut(parent)?;
        let Some(index) = parent_node.children.iter().position(|c| *c == old) else {
            return Err(AstError::UnknownNode(old));
        };
        parent_node.children[index] = new;
        self.node_mut(new)?.parent = Some(parent);
        self.free(old);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> Result<(), AstError> {
        if let Some(parent) = self.node_mut(id)?.parent.take() {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Release `id` and everything under it.
    fn free(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                pending.extend(node.children);
            }
        }
    }

    /// Walk the subtree at `id`, handing every node whose type intersects
    /// `mask` to `visit`.
    ///
    /// The node `visit` returns takes the visited node's place. Matching
    /// nodes are not descended into; `visit` can call
    /// [`Ast::traverse_children_with`] itself when it wants to recurse.
    /// Returns the node now at this position.
    pub fn traverse_with<S, F>(
        &mut self,
        id: NodeId,
        mask: NodeType,
        state: &mut S,
        visit: &mut F,
    ) -> Result<NodeId, AstError>
    where
        F: FnMut(&mut Self, NodeId, &mut S) -> Result<NodeId, AstError>,
    {
        if self.node(id)?.node_type().intersects(mask) {
            return visit(self, id, state);
        }
        self.traverse_children_with(id, mask, state, visit)?;
        Ok(id)
    }

    /// Traverse each child of `id` in order, installing replacements.
    pub fn traverse_children_with<S, F>(
        &mut self,
        id: NodeId,
        mask: NodeType,
        state: &mut S,
        visit: &mut F,
    ) -> Result<(), AstError>
    where
        F: FnMut(&mut Self, NodeId, &mut S) -> Result<NodeId, AstError>,
    {
        let mut index = 0;
        while let Some(&child) = self.node(id)?.children.get(index) {
            let new = self.traverse_with(child, mask, state, visit)?;
            let Some(at) = self.position(id, child)? else {
                // `visit` detached the child; its slot holds the next sibling.
                continue;
            };
            if new != child {
                self.replace_child(id, at, new)?;
            }
            // Installing `new` may have pulled it out of an earlier slot.
            index = self.position(id, new)?.map_or(at, |slot| slot + 1);
        }
        Ok(())
    }

    fn position(&self, parent: NodeId, child: NodeId) -> Result<Option<usize>, AstError> {
        Ok(self.node(parent)?.children.iter().position(|c| *c == child))
    }

    /// Stateless form of [`Ast::traverse_with`].
    pub fn traverse<F>(&mut self, id: NodeId, mask: NodeType, visit: &mut F) -> Result<NodeId, AstError>
    where
        F: FnMut(&mut Self, NodeId) -> Result<NodeId, AstError>,
    {
        self.traverse_with(id, mask, &mut (), &mut |ast: &mut Self, id, _: &mut ()| {
            visit(ast, id)
        })
    }

    /// Traverse from the root, installing a replacement root if `visit`
    /// returns one.
    pub fn walk_with<S, F>(&mut self, mask: NodeType, state: &mut S, visit: &mut F) -> Result<(), AstError>
    where
        F: FnMut(&mut Self, NodeId, &mut S) -> Result<NodeId, AstError>,
    {
        let Some(root) = self.root else {
            return Ok(());
        };
        let new = self.traverse_with(root, mask, state, visit)?;
        if new != root {
            self.set_root(new)?;
        }
        Ok(())
    }

    /// Nested table of the definition `id`.
    #[must_use]
    pub fn nested_table(&self, id: NodeId) -> Option<&SymbolTable> {
        self.get(id).and_then(|n| n.kind.table())
    }

    pub fn nested_table_mut(&mut self, id: NodeId) -> Option<&mut SymbolTable> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .and_then(|n| n.kind.table_mut())
    }

    /// Identifier children of `id` as `(name, category, span)`.
    #[must_use]
    pub fn identifiers(&self, id: NodeId) -> Vec<(String, Category, Span)> {
        self.children_of_type(id, NodeType::IDENTIFIER)
            .filter_map(|child| {
                let node = self.get(child)?;
                match &node.kind {
                    NodeKind::Identifier { name, category } => {
                        Some((name.clone(), *category, node.span.clone()))
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::token::{Excerpt, Position};

    fn span() -> Span {
        Span {
            breadcrumb: Rc::from(vec!["t.adl".to_string()]),
            start: Position::new(1, 1),
            end: Position::new(1, 1),
            excerpt: Rc::new(Excerpt::default()),
        }
    }

    fn ident(ast: &mut Ast, name: &str) -> NodeId {
        ast.alloc(
            NodeKind::Identifier {
                name: name.to_string(),
                category: Category::Identifier,
            },
            span(),
        )
    }

    fn values(ast: &mut Ast, numbers: &[i64]) -> NodeId {
        let list = ast.alloc(NodeKind::Values, span());
        for n in numbers {
            let leaf = ast.alloc(NodeKind::Number(*n), span());
            ast.add_child(list, leaf).expect("value");
        }
        list
    }

    #[test]
    fn type_sets() {
        assert!(NodeType::VALUE_KINDS.contains(NodeType::REFERENCE));
        assert!(!NodeType::VALUE_KINDS.contains(NodeType::IDENTIFIER));
        assert!((NodeType::META | NodeType::FILE).intersects(NodeType::FILE));
        assert_eq!(
            (NodeType::META | NodeType::FILE) & NodeType::FILE,
            NodeType::FILE
        );
    }

    #[test]
    fn type_listing() {
        assert_eq!(NodeType::NONE.to_string(), "nothing");
        assert_eq!(NodeType::CONFIGS.to_string(), "configs");
        assert_eq!(
            (NodeType::IDENTIFIER | NodeType::TYPES | NodeType::CONFIGS).to_string(),
            "identifier, types and configs"
        );
    }

    #[test]
    fn add_child_sets_parent() {
        let mut ast = Ast::new();
        let list = values(&mut ast, &[1, 2]);
        let children = ast.children(list).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(ast.parent(children[0]), Some(list));
    }

    #[test]
    fn whitelist_violation() {
        let mut ast = Ast::new();
        let configs = ast.alloc(NodeKind::Configs, span());
        let number = ast.alloc(NodeKind::Number(1), span());
        let error = ast.add_child(configs, number).expect_err("must reject");
        assert_eq!(
            error,
            AstError::IllegalChild {
                parent: NodeType::CONFIGS,
                given: NodeType::NUMBER,
                allowed: NodeType::CONFIG,
            }
        );
    }

    #[test]
    fn maximum_children() {
        let mut ast = Ast::new();
        let meta = ast.alloc(
            NodeKind::Meta {
                table: SymbolTable::new(),
            },
            span(),
        );
        let first = ast.alloc(NodeKind::Configs, span());
        let second = ast.alloc(NodeKind::Configs, span());
        ast.add_child(meta, first).expect("first");
        assert_eq!(
            ast.add_child(meta, second),
            Err(AstError::MaximumChildren {
                parent: NodeType::META,
                max: 1
            })
        );
    }

    #[test]
    fn leaves_reject_children() {
        let mut ast = Ast::new();
        let leaf = ident(&mut ast, "a");
        let other = ident(&mut ast, "b");
        assert!(matches!(
            ast.add_child(leaf, other),
            Err(AstError::MaximumChildren { max: 0, .. })
        ));
    }

    #[test]
    fn child_cannot_have_two_parents() {
        let mut ast = Ast::new();
        let a = ast.alloc(NodeKind::Values, span());
        let b = ast.alloc(NodeKind::Values, span());
        let leaf = ast.alloc(NodeKind::Boolean(true), span());
        ast.add_child(a, leaf).expect("first parent");
        assert_eq!(ast.add_child(b, leaf), Err(AstError::AlreadyAttached(leaf)));
    }

    #[test]
    fn traverse_stops_at_matches() {
        let mut ast = Ast::new();
        let list = values(&mut ast, &[1, 2, 3]);
        let mut seen = Vec::new();
        ast.traverse(list, NodeType::NUMBER, &mut |ast, id| {
            if let NodeKind::Number(n) = ast.node(id)?.kind {
                seen.push(n);
            }
            Ok(id)
        })
        .expect("traverse");
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn traverse_does_not_recurse_into_match() {
        let mut ast = Ast::new();
        let list = values(&mut ast, &[1]);
        let mut visits = 0;
        ast.traverse(list, NodeType::VALUES | NodeType::NUMBER, &mut |_, id| {
            visits += 1;
            Ok(id)
        })
        .expect("traverse");
        assert_eq!(visits, 1);
    }

    #[test]
    fn traverse_replaces_and_frees() {
        let mut ast = Ast::new();
        let list = values(&mut ast, &[1, 2]);
        let old = ast.children(list)[0];
        let before = ast.len();
        ast.traverse(list, NodeType::NUMBER, &mut |ast, id| {
            if matches!(ast.node(id)?.kind, NodeKind::Number(1)) {
                return Ok(ast.alloc(NodeKind::String("one".to_string()), span()));
            }
            Ok(id)
        })
        .expect("traverse");
        let new = ast.children(list)[0];
        assert_ne!(old, new);
        assert!(!ast.contains(old));
        assert_eq!(ast.parent(new), Some(list));
        assert_eq!(ast.len(), before);
        assert!(matches!(&ast.node(new).expect("new").kind, NodeKind::String(s) if s == "one"));
    }

    #[test]
    fn replacement_must_be_whitelisted() {
        let mut ast = Ast::new();
        let list = values(&mut ast, &[1]);
        let result = ast.traverse(list, NodeType::NUMBER, &mut |ast, _| {
            Ok(ast.alloc(NodeKind::Configs, span()))
        });
        assert!(matches!(result, Err(AstError::IllegalChild { .. })));
    }

    #[test]
    fn replacing_with_descendant_keeps_it_alive() {
        let mut ast = Ast::new();
        let configs = ast.alloc(NodeKind::Configs, span());
        let config = ast.alloc(NodeKind::Config, span());
        let keyword = ident(&mut ast, "name");
        ast.add_child(configs, config).expect("config");
        ast.add_child(config, keyword).expect("keyword");
        let inner = ast.alloc(NodeKind::Config, span());
        let holder = ast.alloc(NodeKind::Configs, span());
        ast.add_child(holder, inner).expect("inner");
        ast.replace_child(configs, 0, inner).expect("replace");
        assert!(!ast.contains(config));
        assert!(!ast.contains(keyword));
        assert_eq!(ast.parent(inner), Some(configs));
        assert!(ast.children(holder).is_empty());
    }

    #[test]
    fn replacing_with_earlier_sibling_visits_the_rest() {
        let mut ast = Ast::new();
        let list = values(&mut ast, &[1, 2, 3]);
        let first = ast.children(list)[0];
        let mut seen = Vec::new();
        ast.traverse(list, NodeType::NUMBER, &mut |ast, id| {
            let NodeKind::Number(n) = ast.node(id)?.kind else {
                return Ok(id);
            };
            seen.push(n);
            Ok(if n == 2 { first } else { id })
        })
        .expect("traverse");
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(ast.children(list).len(), 2);
        assert_eq!(ast.children(list)[0], first);
    }

    #[test]
    fn stateful_traverse_threads_state_in_order() {
        let mut ast = Ast::new();
        let list = values(&mut ast, &[3, 1, 2]);
        let mut order = Vec::new();
        ast.traverse_with(list, NodeType::NUMBER, &mut order, &mut |ast, id, order: &mut Vec<i64>| {
            if let NodeKind::Number(n) = ast.node(id)?.kind {
                order.push(n);
            }
            Ok(id)
        })
        .expect("traverse");
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn root_must_be_a_file() {
        let mut ast = Ast::new();
        let values = ast.alloc(NodeKind::Values, span());
        assert_eq!(
            ast.set_root(values),
            Err(AstError::IllegalRoot(NodeType::VALUES))
        );
        let file = ast.alloc(NodeKind::File, span());
        ast.set_root(file).expect("file root");
        assert_eq!(ast.root(), Some(file));
    }
}
