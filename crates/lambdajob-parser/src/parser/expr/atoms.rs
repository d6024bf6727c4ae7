//! Atomic expressions: literals, names, `this`, `new`, parenthesised forms.

use super::super::types::{parse_type, try_parse_type_args};
use super::super::{ParseError, TokenStream};
use super::{parse_arguments, parse_expr};
use lambdajob_ast::{Expr, ExprKind, Literal, LiteralKind};
use lambdajob_lexer::Token;

/// Parse an atomic expression.
pub(super) fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let span = stream.current_span();

    let kind = match stream.peek().cloned() {
        Some(Token::Integer(text)) => {
            stream.advance();
            literal(LiteralKind::Int, text.to_string())
        }
        Some(Token::Real(text)) => {
            stream.advance();
            literal(real_kind(&text), text.to_string())
        }
        Some(Token::String(value)) => {
            stream.advance();
            literal(LiteralKind::String, format!("\"{}\"", escape(&value, '"')))
        }
        Some(Token::Char(value)) => {
            stream.advance();
            literal(
                LiteralKind::Char,
                format!("'{}'", escape(&value.to_string(), '\'')),
            )
        }
        Some(Token::True) => {
            stream.advance();
            literal(LiteralKind::Bool, "true".to_string())
        }
        Some(Token::False) => {
            stream.advance();
            literal(LiteralKind::Bool, "false".to_string())
        }
        Some(Token::Null) => {
            stream.advance();
            literal(LiteralKind::Null, "null".to_string())
        }
        Some(Token::Default) => {
            stream.advance();
            if stream.eat(&Token::LParen) {
                let ty = parse_type(stream)?;
                stream.expect(Token::RParen)?;
                literal(LiteralKind::Default, format!("default({})", ty))
            } else {
                literal(LiteralKind::Default, "default".to_string())
            }
        }
        Some(Token::This) => {
            stream.advance();
            ExprKind::This
        }
        Some(Token::Ident(name)) => {
            stream.advance();
            let type_args = try_parse_type_args(stream).unwrap_or_default();
            ExprKind::Name {
                name: name.to_string(),
                type_args,
            }
        }
        Some(Token::New) => {
            stream.advance();
            parse_new(stream)?
        }
        Some(Token::Nameof) => {
            stream.advance();
            stream.expect(Token::LParen)?;
            let inner = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            ExprKind::Nameof(Box::new(inner))
        }
        Some(Token::Typeof) => {
            stream.advance();
            stream.expect(Token::LParen)?;
            let ty = parse_type(stream)?;
            stream.expect(Token::RParen)?;
            ExprKind::Typeof(ty)
        }
        Some(Token::LParen) => {
            stream.advance();
            let inner = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            ExprKind::Paren(Box::new(inner))
        }
        other => {
            return Err(ParseError::unexpected_token(
                other.as_ref(),
                "in expression",
                span,
            ));
        }
    };

    Ok(Expr::new(stream.next_id(), kind, stream.span_from(start)))
}

fn literal(kind: LiteralKind, text: String) -> ExprKind {
    ExprKind::Literal(Literal { kind, text })
}

/// Literal kind of a real-number token from its suffix.
fn real_kind(text: &str) -> LiteralKind {
    match text.chars().last() {
        Some('f' | 'F') => LiteralKind::Float,
        Some('m' | 'M') => LiteralKind::Decimal,
        _ => LiteralKind::Double,
    }
}

/// Re-escape literal content for printing.
fn escape(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// `new T(args) { A = x }` or `new T { A = x }`; `new` already consumed.
fn parse_new(stream: &mut TokenStream) -> Result<ExprKind, ParseError> {
    let ty = parse_type(stream)?;

    let has_arg_list = matches!(stream.peek(), Some(Token::LParen));
    let args = if has_arg_list {
        parse_arguments(stream)?
    } else {
        Vec::new()
    };

    let mut initializer = Vec::new();
    if stream.eat(&Token::LBrace) {
        while !matches!(stream.peek(), Some(Token::RBrace) | None) {
            let name = stream.expect_ident("in object initializer")?;
            stream.expect(Token::Eq)?;
            initializer.push((name, parse_expr(stream)?));
            if !stream.eat(&Token::Comma) {
                break;
            }
        }
        stream.expect(Token::RBrace)?;
    } else if !has_arg_list {
        return Err(ParseError::invalid_syntax(
            "object creation requires an argument list or initializer",
            stream.current_span(),
        ));
    }

    Ok(ExprKind::New {
        ty,
        args,
        initializer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_kind_from_suffix() {
        assert_eq!(real_kind("1.5f"), LiteralKind::Float);
        assert_eq!(real_kind("2D"), LiteralKind::Double);
        assert_eq!(real_kind("0.25"), LiteralKind::Double);
        assert_eq!(real_kind("3m"), LiteralKind::Decimal);
    }

    #[test]
    fn test_escape_round_trips_quotes() {
        assert_eq!(escape("a\"b\n", '"'), "a\\\"b\\n");
        assert_eq!(escape("'", '\''), "\\'");
    }
}
