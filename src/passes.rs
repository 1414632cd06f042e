//! Semantic passes over a parsed [`Ast`].
//!
//! [`build_symbol_table`] fills the root table and the nested table of each
//! definition; [`check_references`] then resolves type lists and
//! `target.property` references against them. Both only report through
//! [`Diagnostics`]; an `Err` means the tree API was misused.

use tracing::debug;

use crate::ast::{Ast, AstError, NodeId, NodeKind, NodeType};
use crate::diagnostics::Diagnostics;
use crate::symbol_table::{SemanticErrorKind, SymbolTableEntry};
use crate::token::Category;

const BUILD_MASK: NodeType = NodeType::DEFINITIONS.union(NodeType::CONFIG);
const CHECK_MASK: NodeType = NodeType::TYPES.union(NodeType::REFERENCE);

/// State threaded through the first pass.
struct Builder<'d> {
    diagnostics: &'d mut Diagnostics,
    /// Definition whose body is being walked.
    definition: Option<NodeId>,
}

/// Register every definition and property name.
///
/// All tables are cleared first, so running the pass again over the same
/// tree yields the same tables. Multiple `meta` blocks are merged into the
/// first one afterwards.
pub fn build_symbol_table(ast: &mut Ast, diagnostics: &mut Diagnostics) -> Result<(), AstError> {
    debug!("building symbol table");
    ast.table_mut().clear();
    ast.walk_with(NodeType::DEFINITIONS, &mut (), &mut |ast: &mut Ast, id, _: &mut ()| {
        if let Some(table) = ast.nested_table_mut(id) {
            table.clear();
        }
        Ok(id)
    })?;

    let mut builder = Builder {
        diagnostics,
        definition: None,
    };
    ast.walk_with(BUILD_MASK, &mut builder, &mut register)?;
    merge_meta(ast, builder.diagnostics);
    Ok(())
}

fn register(ast: &mut Ast, id: NodeId, builder: &mut Builder<'_>) -> Result<NodeId, AstError> {
    let node = ast.node(id)?;
    let node_type = node.node_type();

    if node_type == NodeType::CONFIG {
        let Some(definition) = builder.definition else {
            return Ok(id);
        };
        if let Some((name, category, span)) = ast.identifiers(id).into_iter().next()
            && let Some(table) = ast.nested_table_mut(definition)
        {
            table.add(&category.external(&name), node_type, id, span, builder.diagnostics);
        }
        return Ok(id);
    }

    let aliases: Vec<_> = if node_type == NodeType::META {
        vec![("meta".to_string(), node.span.clone())]
    } else {
        ast.identifiers(id)
            .into_iter()
            .map(|(name, category, span)| (category.external(&name), span))
            .collect()
    };
    for (alias, span) in aliases {
        ast.table_mut()
            .add(&alias, node_type, id, span, builder.diagnostics);
    }

    let outer = builder.definition.replace(id);
    ast.traverse_children_with(id, BUILD_MASK, builder, &mut register)?;
    builder.definition = outer;
    Ok(id)
}

/// Fold the properties of every later `meta` entry into the first one and
/// drop the later entries.
fn merge_meta(ast: &mut Ast, diagnostics: &mut Diagnostics) {
    let metas: Vec<(usize, NodeId)> = ast
        .table()
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.node_type == NodeType::META)
        .map(|(index, entry)| (index, entry.node))
        .collect();
    let Some((&(_, first), later)) = metas.split_first() else {
        return;
    };

    for &(_, meta) in later {
        let properties: Vec<SymbolTableEntry> = ast
            .nested_table(meta)
            .map(|table| table.iter().cloned().collect())
            .unwrap_or_default();
        if let Some(table) = ast.nested_table_mut(first) {
            for entry in properties {
                table.add(&entry.id, entry.node_type, entry.node, entry.span, diagnostics);
            }
        }
    }
    for &(index, _) in later.iter().rev() {
        ast.table_mut().remove_at(index);
    }
    debug!(merged = later.len(), "merged meta blocks");
}

/// Resolve type lists and references against the tables built by
/// [`build_symbol_table`].
pub fn check_references(ast: &mut Ast, diagnostics: &mut Diagnostics) -> Result<(), AstError> {
    debug!("checking references");
    ast.walk_with(CHECK_MASK, diagnostics, &mut resolve)
}

fn resolve(ast: &mut Ast, id: NodeId, diagnostics: &mut Diagnostics) -> Result<NodeId, AstError> {
    match &ast.node(id)?.kind {
        NodeKind::Types { .. } => resolve_types(ast, id, diagnostics)?,
        NodeKind::Reference {
            target,
            category,
            property,
            ..
        } => {
            let target = category.external(target);
            let property = property.clone();
            let category = *category;
            resolve_reference(ast, id, &target, category, &property, diagnostics)?;
        }
        _ => {}
    }
    Ok(id)
}

/// Link each type name in the list to its type definition.
fn resolve_types(ast: &mut Ast, id: NodeId, diagnostics: &mut Diagnostics) -> Result<(), AstError> {
    let mut resolved = Vec::new();
    for (name, category, span) in ast.identifiers(id) {
        let external = category.external(&name);
        let target = match ast.table().get(&external) {
            None => {
                diagnostics.error(SemanticErrorKind::UnknownType { name: external }, span);
                None
            }
            Some(entry) if entry.node_type != NodeType::TYPE_DEF => {
                let found = entry.node_type;
                diagnostics.error(SemanticErrorKind::NotAType { name: external, found }, span);
                None
            }
            Some(entry) => {
                let definition = entry.node;
                ast.table_mut().add_reference(&external, id);
                Some(definition)
            }
        };
        resolved.push(target);
    }
    if let NodeKind::Types { resolved: slots } = &mut ast.node_mut(id)?.kind {
        *slots = resolved;
    }
    Ok(())
}

/// Link `target.property` to the config that defines the property.
fn resolve_reference(
    ast: &mut Ast,
    id: NodeId,
    target: &str,
    category: Category,
    property: &str,
    diagnostics: &mut Diagnostics,
) -> Result<(), AstError> {
    let span = ast.node(id)?.span.clone();
    let expected = match category {
        Category::Meta => NodeType::META,
        Category::Type => NodeType::TYPE_DEF,
        Category::Identifier
        | Category::Shortlabel
        | Category::Longlabel
        | Category::Property => NodeType::POSITIONAL | NodeType::OPTION,
    };
    // Raw ids are shared, so `<x>.p` can find the positional `x`.
    let definition = ast
        .table()
        .get(target)
        .filter(|entry| expected.intersects(entry.node_type))
        .map(|entry| entry.node);
    let Some(definition) = definition else {
        let kind = match category {
            Category::Meta => SemanticErrorKind::UnknownMeta,
            Category::Type => SemanticErrorKind::UnknownType {
                name: target.to_string(),
            },
            Category::Identifier
            | Category::Shortlabel
            | Category::Longlabel
            | Category::Property => SemanticErrorKind::UnknownArgument {
                name: target.to_string(),
            },
        };
        diagnostics.error(kind, span);
        return Ok(());
    };

    let config = ast
        .nested_table(definition)
        .and_then(|table| table.get(property))
        .map(|entry| entry.node);
    if config.is_some()
        && let Some(table) = ast.nested_table_mut(definition)
    {
        table.add_reference(property, id);
    } else {
        let kind = SemanticErrorKind::UnknownProperty {
            target: target.to_string(),
            property: property.to_string(),
        };
        diagnostics.error(kind, span);
    }
    if let NodeKind::Reference { resolved, .. } = &mut ast.node_mut(id)?.kind {
        *resolved = config;
    }
    Ok(())
}
