//! Symbol table construction and reference checking through the public
//! driver.

mod common;

use adl_compiler::{
    DiagnosticKind, Diagnostics, NodeKind, NodeType, Options, Phase, SemanticErrorKind,
    build_symbol_table, check_references, compile, compile_source,
};
use common::{compile_ok, compile_str, error_messages, render, write_files};

fn semantic_errors(diagnostics: &Diagnostics) -> Vec<SemanticErrorKind> {
    diagnostics
        .iter()
        .filter_map(|d| match &d.kind {
            DiagnosticKind::Semantic(kind) => Some(kind.clone()),
            _ => None,
        })
        .collect()
}

// -----------------------------------------------------------
// Building the symbol table.
// -----------------------------------------------------------

#[test]
fn root_table_lists_every_definition() {
    let ast = compile_ok(
        "#include stdtypes\n\
         meta { name \"tool\"; }\n\
         input <string> {}\n\
         [-v --verbose] {}\n",
    );
    let table = ast.table();
    assert!(table.contains("meta"));
    assert!(table.contains("input"));
    assert!(table.contains("--verbose"));
    assert!(table.contains("<int32>"));
    let input = table.get("input").expect("input entry");
    assert_eq!(input.node_type, NodeType::POSITIONAL);
}

#[test]
fn duplicate_raw_ids_cite_both_locations() {
    let (result, diagnostics) = compile_str("<t> {}\nfoo <t> {}\n[foo] <t> {}\n");
    assert_eq!(result.err(), Some(Phase::BuildSymbolTable));
    assert_eq!(
        semantic_errors(&diagnostics),
        vec![SemanticErrorKind::DuplicateArgument {
            name: "foo".to_string()
        }]
    );
    let text = render(&diagnostics);
    assert!(text.contains("test.adl:3:2: error: duplicate definition of argument 'foo'"), "{text}");
    assert!(text.contains("test.adl:2:1: note: previous definition is here"), "{text}");
}

#[test]
fn labels_and_positionals_share_a_namespace() {
    let (_, diagnostics) = compile_str("<t> {}\nname <t> {}\n--name {}\n");
    assert_eq!(
        semantic_errors(&diagnostics),
        vec![SemanticErrorKind::DuplicateArgument {
            name: "--name".to_string()
        }]
    );
}

#[test]
fn meta_blocks_merge_into_one_entry() {
    let ast = compile_ok("meta { name \"a\"; }\nmeta { version \"1\"; }\n");
    let metas: Vec<_> = ast
        .table()
        .iter()
        .filter(|entry| entry.node_type == NodeType::META)
        .collect();
    assert_eq!(metas.len(), 1);
    let nested = ast.nested_table(metas[0].node).expect("meta table");
    assert!(nested.contains("name"));
    assert!(nested.contains("version"));
}

#[test]
fn duplicate_property_in_merged_meta() {
    let (_, diagnostics) = compile_str("meta { name \"a\"; }\nmeta { name \"b\"; }\n");
    assert_eq!(
        semantic_errors(&diagnostics),
        vec![SemanticErrorKind::DuplicateProperty {
            name: "name".to_string()
        }]
    );
}

#[test]
fn duplicates_across_included_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = write_files(
        dir.path(),
        &[
            ("main.adl", "#include \"types.adl\"\n<port> {}\n"),
            ("types.adl", "<port> {}\n"),
        ],
    );
    let mut diagnostics = Diagnostics::new();
    let result = compile(&root, &Options::default(), &mut diagnostics);
    assert_eq!(result.err(), Some(Phase::BuildSymbolTable));
    let text = render(&diagnostics);
    assert!(text.contains("error: duplicate definition of type '<port>'"), "{text}");
    assert!(text.contains("--> types.adl:1:1: note: previous definition is here"), "{text}");
}

// -----------------------------------------------------------
// Checking references.
// -----------------------------------------------------------

#[test]
fn unknown_type_is_reported_once_at_its_use() {
    let (result, diagnostics) = compile_str("<int> {}\n-n <int> <nope> {}\n-m <int> {}\n");
    assert_eq!(result.err(), Some(Phase::CheckReferences));
    assert_eq!(
        error_messages(&diagnostics),
        vec!["undefined type '<nope>'".to_string()]
    );
    let span = diagnostics.iter().next().and_then(|d| d.span.clone()).expect("span");
    assert_eq!((span.start.line, span.start.column), (2, 10));
}

#[test]
fn every_unknown_is_reported() {
    let (_, diagnostics) = compile_str(
        "<t> { a x.y; b <u>.z; c meta.v; d arg.none; }\n\
         arg <t> { k 1; }\n",
    );
    let errors = semantic_errors(&diagnostics);
    assert!(errors.contains(&SemanticErrorKind::UnknownArgument {
        name: "x".to_string()
    }));
    assert!(errors.contains(&SemanticErrorKind::UnknownType {
        name: "<u>".to_string()
    }));
    assert!(errors.contains(&SemanticErrorKind::UnknownMeta));
    assert!(errors.contains(&SemanticErrorKind::UnknownProperty {
        target: "arg".to_string(),
        property: "none".to_string()
    }));
}

#[test]
fn references_link_to_their_config() {
    let ast = compile_ok("<int> {}\ncount <int> { min 1; max count.min; }\n");
    let count = ast.table().get("count").expect("count").node;
    let nested = ast.nested_table(count).expect("nested");
    let min = nested.get("min").expect("min");
    assert_eq!(min.references.len(), 1);

    let reference = min.references[0];
    let NodeKind::Reference { resolved, .. } = &ast.node(reference).expect("node").kind else {
        panic!("expected a reference node");
    };
    assert_eq!(*resolved, Some(min.node));
}

#[test]
fn type_lists_are_resolved() {
    let ast = compile_ok("<a> {}\n<b> {}\nx <a> <b> {}\n");
    let x = ast.table().get("x").expect("x").node;
    let types = ast.find_child(x, NodeType::TYPES).expect("types");
    let NodeKind::Types { resolved } = &ast.node(types).expect("types").kind else {
        panic!("expected a type list");
    };
    let a = ast.table().get("<a>").expect("a").node;
    let b = ast.table().get("<b>").expect("b").node;
    assert_eq!(resolved, &vec![Some(a), Some(b)]);
    assert_eq!(ast.table().get("<a>").expect("a").references, vec![types]);
}

#[test]
fn passes_are_idempotent() {
    let source = "meta { v 1; }\nmeta { w 2; }\n<int> {}\nn <int> { m n.m; }\n";
    let mut diagnostics = Diagnostics::new();
    let mut ast = compile_source("t.adl", source, &Options::default(), &mut diagnostics)
        .expect("clean compile");
    let entries = ast.table().len();
    let before = diagnostics.len();

    build_symbol_table(&mut ast, &mut diagnostics).expect("pass 1");
    check_references(&mut ast, &mut diagnostics).expect("pass 2");

    assert_eq!(diagnostics.len(), before);
    assert_eq!(ast.table().len(), entries);
    let n = ast.table().get("n").expect("n").node;
    let m = ast.nested_table(n).and_then(|t| t.get("m")).expect("m");
    assert_eq!(m.references.len(), 1);
}

#[test]
fn symbol_table_render_shows_nesting() {
    let ast = compile_ok("<int> { .name \"int\"; }\nn <int> {}\n");
    let text = ast.table().render(&ast);
    assert!(text.contains("<int>"), "{text}");
    assert!(text.contains(".name"), "{text}");
    assert!(text.contains("referenced by"), "{text}");
}
