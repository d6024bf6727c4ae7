//! Lambda expressions: `x => ...`, `() => ...`, `(ref A a, in B b) => { ... }`.

use super::super::types::parse_type;
use super::super::{ParseError, TokenStream};
use super::{parse_expr, parse_ref_kind};
use crate::parser::stmt::parse_block;
use lambdajob_ast::{Expr, ExprKind, Lambda, LambdaBody, Param, RefKind};
use lambdajob_lexer::Token;

/// Whether a lambda starts at the current position.
pub(super) fn at_lambda(stream: &TokenStream) -> bool {
    let offset = usize::from(matches!(stream.peek(), Some(Token::Static)));
    match stream.peek_nth(offset) {
        Some(Token::Ident(_)) => matches!(stream.peek_nth(offset + 1), Some(Token::FatArrow)),
        Some(Token::LParen) => {
            let open = stream.current_pos() + offset;
            stream
                .matching_close(open)
                .is_some_and(|close| matches!(stream.token_at(close + 1), Some(Token::FatArrow)))
        }
        _ => false,
    }
}

/// Parse a lambda; the caller has checked [`at_lambda`].
pub(super) fn parse_lambda(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let is_static = stream.eat(&Token::Static);

    let params = if matches!(stream.peek(), Some(Token::Ident(_))) {
        let param_start = stream.current_pos();
        let name = stream.expect_ident("as lambda parameter")?;
        vec![Param {
            ref_kind: RefKind::None,
            ty: None,
            name,
            span: stream.span_from(param_start),
        }]
    } else {
        parse_lambda_params(stream)?
    };

    stream.expect(Token::FatArrow)?;

    let body = if matches!(stream.peek(), Some(Token::LBrace)) {
        LambdaBody::Block(parse_block(stream)?)
    } else {
        LambdaBody::Expr(Box::new(parse_expr(stream)?))
    };

    Ok(Expr::new(
        stream.next_id(),
        ExprKind::Lambda(Box::new(Lambda {
            params,
            body,
            is_static,
        })),
        stream.span_from(start),
    ))
}

/// `( [ref|in|out] [Type] name, ... )`
fn parse_lambda_params(stream: &mut TokenStream) -> Result<Vec<Param>, ParseError> {
    stream.expect(Token::LParen)?;
    let mut params = Vec::new();
    if stream.eat(&Token::RParen) {
        return Ok(params);
    }

    loop {
        let param_start = stream.current_pos();
        let ref_kind = parse_ref_kind(stream);
        let implicitly_typed = matches!(stream.peek(), Some(Token::Ident(_)))
            && matches!(stream.peek_nth(1), Some(Token::Comma | Token::RParen));

        let ty = if implicitly_typed {
            None
        } else {
            Some(parse_type(stream)?)
        };
        let name = stream.expect_ident("as lambda parameter name")?;
        params.push(Param {
            ref_kind,
            ty,
            name,
            span: stream.span_from(param_start),
        });

        if stream.eat(&Token::Comma) {
            continue;
        }
        stream.expect(Token::RParen)?;
        break;
    }

    let typed = params.iter().filter(|param| param.ty.is_some()).count();
    if typed != 0 && typed != params.len() {
        return Err(ParseError::invalid_syntax(
            "lambda parameters must be either all typed or all untyped",
            stream.current_span(),
        ));
    }

    Ok(params)
}
