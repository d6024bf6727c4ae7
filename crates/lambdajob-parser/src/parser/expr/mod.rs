//! Expression parsing.
//!
//! - `pratt`: binary operators by precedence climbing, prefix/postfix forms
//! - `atoms`: literals, names, `new`, `this`, parenthesised forms
//! - `lambda`: lambda detection and parsing
//!
//! Assignment and the conditional operator sit above the Pratt loop because
//! both are right-associative and bind looser than every binary operator.

mod atoms;
mod lambda;
mod pratt;

use super::{ParseError, TokenStream};
use lambdajob_ast::{Argument, AssignOp, Expr, ExprKind, RefKind};
use lambdajob_lexer::Token;

/// Parse a full expression, including assignments and lambdas.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    if lambda::at_lambda(stream) {
        return lambda::parse_lambda(stream);
    }

    let start = stream.current_pos();
    let target = parse_conditional(stream)?;

    let Some(op) = stream.peek().and_then(assign_op) else {
        return Ok(target);
    };
    stream.advance();
    let value = parse_expr(stream)?;

    Ok(Expr::new(
        stream.next_id(),
        ExprKind::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        },
        stream.span_from(start),
    ))
}

fn assign_op(token: &Token) -> Option<AssignOp> {
    match token {
        Token::Eq => Some(AssignOp::Assign),
        Token::PlusEq => Some(AssignOp::Add),
        Token::MinusEq => Some(AssignOp::Sub),
        Token::StarEq => Some(AssignOp::Mul),
        Token::SlashEq => Some(AssignOp::Div),
        Token::PercentEq => Some(AssignOp::Mod),
        Token::AmpEq => Some(AssignOp::BitAnd),
        Token::PipeEq => Some(AssignOp::BitOr),
        Token::CaretEq => Some(AssignOp::BitXor),
        _ => None,
    }
}

/// `cond ? a : b`, right-associative.
fn parse_conditional(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let cond = pratt::parse_pratt(stream, 0)?;

    if !stream.eat(&Token::Question) {
        return Ok(cond);
    }
    let then = parse_expr(stream)?;
    stream.expect(Token::Colon)?;
    let otherwise = parse_expr(stream)?;

    Ok(Expr::new(
        stream.next_id(),
        ExprKind::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        },
        stream.span_from(start),
    ))
}

/// Parse a parenthesised argument list; the stream must be at `(`.
pub(super) fn parse_arguments(stream: &mut TokenStream) -> Result<Vec<Argument>, ParseError> {
    stream.expect(Token::LParen)?;
    let mut args = Vec::new();
    if stream.eat(&Token::RParen) {
        return Ok(args);
    }
    loop {
        args.push(parse_argument(stream)?);
        if stream.eat(&Token::Comma) {
            continue;
        }
        stream.expect(Token::RParen)?;
        return Ok(args);
    }
}

/// `[label:] [ref|in|out] expr`
fn parse_argument(stream: &mut TokenStream) -> Result<Argument, ParseError> {
    let label = match (stream.peek(), stream.peek_nth(1)) {
        (Some(Token::Ident(name)), Some(Token::Colon)) => {
            let name = name.to_string();
            stream.advance();
            stream.advance();
            Some(name)
        }
        _ => None,
    };

    let ref_kind = parse_ref_kind(stream);
    let value = parse_expr(stream)?;
    Ok(Argument {
        ref_kind,
        label,
        value,
    })
}

/// Consume an optional `ref`/`in`/`out` modifier.
pub(super) fn parse_ref_kind(stream: &mut TokenStream) -> RefKind {
    let kind = match stream.peek() {
        Some(Token::Ref) => RefKind::Ref,
        Some(Token::In) => RefKind::In,
        Some(Token::Out) => RefKind::Out,
        _ => return RefKind::None,
    };
    stream.advance();
    kind
}
