//! Pretty-printer that serializes an ADL syntax tree back into canonical text.
//!
//! Produces tab-indented output with a blank line between top-level items.

use std::fmt::Write as _;

use crate::ast::{Ast, NodeId, NodeKind, NodeType};

/// Format the tree under the root of `ast` as ADL source.
///
/// A tree without a root formats as an empty string.
#[must_use]
pub fn format(ast: &Ast) -> String {
    let mut out = String::new();
    let Some(root) = ast.root() else {
        return out;
    };
    for (i, item) in ast.children(root).iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        format_item(&mut out, ast, *item);
    }
    out
}

fn format_item(out: &mut String, ast: &Ast, id: NodeId) {
    let Some(node) = ast.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Suppress(kind) => {
            let _ = writeln!(out, "@suppress {}", kind.name());
            return;
        }
        NodeKind::Meta { .. } => out.push_str("meta"),
        NodeKind::TypeDef { .. } => format_labels(out, ast, id, false),
        NodeKind::Positional {
            optional, variadic, ..
        } => {
            format_labels(out, ast, id, *optional);
            format_types(out, ast, id, false, *variadic);
        }
        NodeKind::Option {
            optional,
            value_optional,
            variadic,
            ..
        } => {
            format_labels(out, ast, id, *optional);
            format_types(out, ast, id, *value_optional, *variadic);
        }
        _ => return,
    }
    format_body(out, ast, id);
}

/// Names of a definition, bracketed when the argument is optional.
fn format_labels(out: &mut String, ast: &Ast, id: NodeId, optional: bool) {
    let labels: Vec<String> = ast
        .identifiers(id)
        .into_iter()
        .map(|(name, category, _)| category.external(&name))
        .collect();
    if optional {
        let _ = write!(out, "[{}]", labels.join(" "));
    } else {
        out.push_str(&labels.join(" "));
    }
}

fn format_types(out: &mut String, ast: &Ast, id: NodeId, optional: bool, variadic: bool) {
    let Some(types) = ast.find_child(id, NodeType::TYPES) else {
        return;
    };
    let mut list: String = ast
        .identifiers(types)
        .into_iter()
        .map(|(name, category, _)| category.external(&name))
        .collect::<Vec<_>>()
        .join(" ");
    if variadic {
        list.push_str("...");
    }
    if optional {
        let _ = write!(out, " [{list}]");
    } else {
        let _ = write!(out, " {list}");
    }
}

fn format_body(out: &mut String, ast: &Ast, id: NodeId) {
    let configs: Vec<NodeId> = ast
        .find_child(id, NodeType::CONFIGS)
        .map(|configs| ast.children(configs).to_vec())
        .unwrap_or_default();
    if configs.is_empty() {
        out.push_str(" {}\n");
        return;
    }
    out.push_str(" {\n");
    for config in configs {
        format_config(out, ast, config);
    }
    out.push_str("}\n");
}

fn format_config(out: &mut String, ast: &Ast, id: NodeId) {
    out.push('\t');
    for child in ast.children(id) {
        let Some(node) = ast.get(*child) else {
            continue;
        };
        match &node.kind {
            NodeKind::Suppress(kind) => {
                let _ = write!(out, "@suppress {} ", kind.name());
            }
            NodeKind::Identifier { name, category } => out.push_str(&category.external(name)),
            NodeKind::Values => {
                for value in ast.children(*child) {
                    out.push(' ');
                    format_value(out, ast, *value);
                }
            }
            _ => {}
        }
    }
    out.push_str(";\n");
}

fn format_value(out: &mut String, ast: &Ast, id: NodeId) {
    let Some(node) = ast.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::String(text) => {
            out.push('"');
            for c in text.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
        NodeKind::Regex(text) => {
            let _ = write!(out, "r\"{}\"", text.replace('"', "\\\""));
        }
        // Negative literals are written with three dashes so they cannot be
        // read back as labels.
        NodeKind::Number(value) if *value < 0 => {
            let _ = write!(out, "---{}", value.unsigned_abs());
        }
        NodeKind::Number(value) => {
            let _ = write!(out, "{value}");
        }
        NodeKind::Decimal(value) => {
            let magnitude = value.abs().to_string();
            let sign = if value.is_sign_negative() { "---" } else { "" };
            let point = if magnitude.contains('.') { "" } else { ".0" };
            let _ = write!(out, "{sign}{magnitude}{point}");
        }
        NodeKind::Boolean(value) => {
            let _ = write!(out, "({value})");
        }
        NodeKind::Snippet(code) => {
            let _ = write!(out, "++{{{code}}}++");
        }
        NodeKind::Reference {
            target,
            category,
            property,
            ..
        } => {
            let _ = write!(out, "{}.{property}", category.external(target));
        }
        _ => {}
    }
}
