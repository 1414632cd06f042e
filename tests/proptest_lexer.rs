//! Property-based tests with proptest.
//!
//! The lexer properties pin down the prefix disambiguation rules for
//! labels, numbers and identifiers. The compile properties generate
//! well-formed files and check that they compile cleanly and that the
//! formatter output is stable.

mod common;

use adl_compiler::{Category, LexErrorKind, TokenKind, format};
use common::{compile_ok, kinds, lex};
use proptest::prelude::*;

// -- Leaf strategies --

/// Identifier that cannot be mistaken for a keyword or a regex prefix.
fn identifier() -> impl Strategy<Value = String> {
    "[a-qs-z_][a-z0-9_]{0,12}".prop_filter("reserved", |s| s != "meta")
}

fn longlabel() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,12}"
}

fn type_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,10}"
}

fn string_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .:_-]{0,20}"
}

// -- Lexer properties --

proptest! {
    #[test]
    fn single_character_shortlabels(c in "[0-9a-zA-Z]") {
        let (tokens, diagnostics) = lex(&format!("-{c}"));
        prop_assert!(diagnostics.is_empty());
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(&tokens[0].kind, &TokenKind::Shortlabel);
        prop_assert_eq!(tokens[0].text.len(), 1);
        prop_assert_eq!(&tokens[0].text, &c);
    }

    #[test]
    fn lone_dash_recovers_before_identifier(name in identifier()) {
        let (tokens, diagnostics) = lex(&format!("- {name}"));
        prop_assert_eq!(diagnostics.error_count(), 1);
        let first = diagnostics.iter().next().map(|d| d.kind.clone());
        prop_assert_eq!(first, Some(LexErrorKind::EmptyShortlabel.into()));
        prop_assert_eq!(kinds(&tokens), vec![TokenKind::Identifier]);
        prop_assert_eq!(&tokens[0].text, &name);
    }

    #[test]
    fn longlabels_keep_their_name(name in longlabel()) {
        let (tokens, diagnostics) = lex(&format!("--{name}"));
        prop_assert!(diagnostics.is_empty());
        prop_assert_eq!(kinds(&tokens), vec![TokenKind::Longlabel]);
        prop_assert_eq!(&tokens[0].text, &name);
    }

    #[test]
    fn identifiers_with_property_are_references(
        target in identifier(),
        property in identifier(),
    ) {
        let (tokens, diagnostics) = lex(&format!("{target}.{property}"));
        prop_assert!(diagnostics.is_empty());
        prop_assert_eq!(tokens.len(), 1);
        prop_assert_eq!(
            &tokens[0].kind,
            &TokenKind::Reference { category: Category::Identifier, property }
        );
        prop_assert_eq!(&tokens[0].text, &target);
    }

    #[test]
    fn types_before_triple_dot_stay_types(name in type_name()) {
        let (tokens, diagnostics) = lex(&format!("<{name}>..."));
        prop_assert!(diagnostics.is_empty());
        prop_assert_eq!(kinds(&tokens), vec![TokenKind::Type, TokenKind::TripleDot]);
    }

    #[test]
    fn numbers_round_trip(value in any::<i64>()) {
        let source = if value < 0 {
            format!("---{}", value.unsigned_abs())
        } else {
            value.to_string()
        };
        let (tokens, diagnostics) = lex(&source);
        prop_assert!(diagnostics.is_empty());
        prop_assert_eq!(kinds(&tokens), vec![TokenKind::Number(value)]);
    }

    #[test]
    fn strings_keep_their_content(text in string_value()) {
        let (tokens, diagnostics) = lex(&format!("\"{text}\""));
        prop_assert!(diagnostics.is_empty());
        prop_assert_eq!(kinds(&tokens), vec![TokenKind::String]);
        prop_assert_eq!(&tokens[0].text, &text);
    }
}

// -- Generated files --

/// A type definition with a `.name` property.
fn typedef() -> impl Strategy<Value = (String, String)> {
    (type_name(), string_value()).prop_map(|(name, label)| {
        let source = format!("<{name}> {{\n\t.name \"{label}\";\n}}\n");
        (name, source)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_files_compile_and_format_stably(
        types in prop::collection::btree_map(type_name(), string_value(), 1..4),
        args in prop::collection::btree_set(identifier(), 0..4),
        min in 0_i64..1000,
    ) {
        // Types and arguments share one namespace, so keep them apart.
        let type_names: Vec<&String> = types.keys().collect();
        let mut source = String::new();
        for (name, label) in &types {
            source.push_str(&format!("<t_{name}> {{ .name \"{label}\"; }}\n"));
        }
        for (i, arg) in args.iter().enumerate() {
            let ty = type_names[i % type_names.len()];
            source.push_str(&format!("a_{arg} <t_{ty}> {{ min {min}; max a_{arg}.min; }}\n"));
        }

        let ast = compile_ok(&source);
        prop_assert_eq!(ast.table().len(), types.len() + args.len());

        let formatted = format(&ast);
        let again = format(&compile_ok(&formatted));
        prop_assert_eq!(formatted, again);
    }

    #[test]
    fn single_typedef_compiles((name, source) in typedef()) {
        let ast = compile_ok(&source);
        let expected = format!("<{name}>");
        prop_assert!(ast.table().contains(&expected));
    }
}
