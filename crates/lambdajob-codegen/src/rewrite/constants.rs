//! Inlining of `const` locals.

use lambdajob_ast::{Expr, ExprKind, Literal, LiteralKind, TypeRef, print_expr};

/// Source text that replaces a use of a `const` local declared as `ty`
/// with initializer `value`.
///
/// Integer literals get the suffix of a floating-point declared type so the
/// inlined value keeps its type (`const float k = 2;` inlines as `2f`).
/// Anything other than a literal is parenthesised.
pub fn const_text(value: &Expr, ty: Option<&TypeRef>) -> String {
    let value = value.unparenthesized();
    match &value.kind {
        ExprKind::Literal(literal) => literal_text(literal, ty),
        ExprKind::Unary { operand, .. } => match &operand.kind {
            ExprKind::Literal(literal) => {
                let printed = print_expr(value);
                format!("({})", printed.replacen(&literal.text, &literal_text(literal, ty), 1))
            }
            _ => format!("({})", print_expr(value)),
        },
        _ => format!("({})", print_expr(value)),
    }
}

fn literal_text(literal: &Literal, ty: Option<&TypeRef>) -> String {
    let declared = ty.map(|ty| ty.name.as_str());
    match (literal.kind, declared) {
        (LiteralKind::Int, Some("float")) => format!("{}f", literal.text),
        (LiteralKind::Int, Some("double")) => format!("{}d", literal.text),
        (LiteralKind::Double, Some("float")) if !literal.text.ends_with(['f', 'F']) => {
            format!("{}f", literal.text.trim_end_matches(['d', 'D']))
        }
        _ => literal.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdajob_ast::{Span, UnaryOp};

    fn literal(kind: LiteralKind, text: &str) -> Expr {
        Expr::synthetic(
            ExprKind::Literal(Literal {
                kind,
                text: text.to_string(),
            }),
            Span::zero(0),
        )
    }

    fn ty(name: &str) -> TypeRef {
        TypeRef::simple(name, Span::zero(0))
    }

    #[test]
    fn test_float_suffixes() {
        assert_eq!(const_text(&literal(LiteralKind::Int, "2"), Some(&ty("float"))), "2f");
        assert_eq!(const_text(&literal(LiteralKind::Int, "2"), Some(&ty("double"))), "2d");
        assert_eq!(const_text(&literal(LiteralKind::Float, "2.5f"), Some(&ty("float"))), "2.5f");
        assert_eq!(const_text(&literal(LiteralKind::Int, "7"), Some(&ty("int"))), "7");
        assert_eq!(const_text(&literal(LiteralKind::Int, "7"), None), "7");
    }

    #[test]
    fn test_negative_literal() {
        let negated = Expr::synthetic(
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(literal(LiteralKind::Int, "3")),
            },
            Span::zero(0),
        );
        assert_eq!(const_text(&negated, Some(&ty("float"))), "(-3f)");
    }

    #[test]
    fn test_expressions_are_parenthesised() {
        let sum = Expr::synthetic(
            ExprKind::Binary {
                op: lambdajob_ast::BinaryOp::Add,
                left: Box::new(literal(LiteralKind::Float, "1f")),
                right: Box::new(literal(LiteralKind::Float, "2f")),
            },
            Span::zero(0),
        );
        assert_eq!(const_text(&sum, Some(&ty("float"))), "(1f + 2f)");
    }
}
