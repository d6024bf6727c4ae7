//! Error handling tests for the parser.
//!
//! Covers unclosed delimiters, unexpected end of input, invalid tokens and
//! recovery across several broken declarations.

use lambdajob_parser::{ParseError, ParseErrorKind, parse_source};

/// Helper to verify that parsing fails with at least one error.
fn expect_error(source: &str) -> Vec<ParseError> {
    match parse_source(source, 0) {
        Ok(_) => panic!("Expected parse error, but parsing succeeded"),
        Err(errors) => {
            assert!(!errors.is_empty(), "Expected at least one error");
            errors
        }
    }
}

#[test]
fn test_unclosed_method_body() {
    let source = r#"
        partial class S : SystemBase {
            void OnUpdate() {
                Entities.ForEach((ref Foo f) => { f.Value = 1; }).Run();
    "#;

    let errors = expect_error(source);
    assert!(
        errors
            .iter()
            .any(|e| e.kind == ParseErrorKind::UnexpectedEof || e.message.contains("missing `}`")),
        "Should report unexpected end of input, got: {:?}",
        errors
    );
}

#[test]
fn test_unclosed_paren_in_call() {
    let source = r#"
        partial class S : SystemBase {
            void OnUpdate() {
                Entities.ForEach((ref Foo f) => { f.Value = 1; }.Run();
            }
        }
    "#;

    expect_error(source);
}

#[test]
fn test_missing_semicolon() {
    let source = r#"
        partial class S : SystemBase {
            void OnUpdate() {
                var x = 1
                var y = 2;
            }
        }
    "#;

    let errors = expect_error(source);
    assert!(
        errors.iter().any(|e| e.message.contains("expected `;`")),
        "Should mention the missing semicolon, got: {:?}",
        errors
    );
}

#[test]
fn test_invalid_token_reported_with_span() {
    let source = "partial class S { int a = 1 $ 2; }";

    let errors = expect_error(source);
    assert_eq!(errors[0].kind, ParseErrorKind::InvalidToken);
    let dollar = source.find('$').unwrap() as u32;
    assert_eq!(errors[0].span.start, dollar);
}

#[test]
fn test_mixed_typed_and_untyped_lambda_params() {
    let source = r#"
        partial class S : SystemBase {
            void OnUpdate() {
                Entities.ForEach((ref Foo f, g) => { }).Run();
            }
        }
    "#;

    let errors = expect_error(source);
    assert!(errors
        .iter()
        .any(|e| e.kind == ParseErrorKind::InvalidSyntax));
}

#[test]
fn test_recovery_reports_errors_in_separate_types() {
    let source = r#"
        partial class A : SystemBase {
            void OnUpdate() { int = ; }
        }
        partial class B : SystemBase {
            void OnUpdate() { x = ; }
        }
    "#;

    let errors = expect_error(source);
    assert!(
        errors.len() >= 2,
        "Each broken type should report its own error, got: {:?}",
        errors
    );
}

#[test]
fn test_error_message_names_found_token() {
    let source = "partial class S { void OnUpdate() { return 1 2; } }";

    let errors = expect_error(source);
    assert!(
        errors[0].message.contains("found `2`"),
        "got: {}",
        errors[0].message
    );
}
