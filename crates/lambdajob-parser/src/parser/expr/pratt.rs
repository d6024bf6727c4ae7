//! Pratt parser core - precedence climbing for binary and unary operators.

use super::super::types::{is_builtin_type, try_parse_type, try_parse_type_args};
use super::super::{ParseError, TokenStream};
use super::{atoms, parse_arguments, parse_expr};
use lambdajob_ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use lambdajob_lexer::Token;

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// Binary operator metadata: (precedence, associativity, op).
///
/// Higher precedence binds tighter.
fn binary_op_info(token: &Token) -> Option<(u8, Assoc, BinaryOp)> {
    match token {
        Token::QuestionQuestion => Some((5, Assoc::Right, BinaryOp::Coalesce)),
        Token::OrOr => Some((10, Assoc::Left, BinaryOp::Or)),
        Token::AndAnd => Some((20, Assoc::Left, BinaryOp::And)),
        Token::Pipe => Some((30, Assoc::Left, BinaryOp::BitOr)),
        Token::Caret => Some((40, Assoc::Left, BinaryOp::BitXor)),
        Token::Amp => Some((50, Assoc::Left, BinaryOp::BitAnd)),
        Token::EqEq => Some((60, Assoc::Left, BinaryOp::Eq)),
        Token::BangEq => Some((60, Assoc::Left, BinaryOp::Ne)),
        Token::Lt => Some((70, Assoc::Left, BinaryOp::Lt)),
        Token::LtEq => Some((70, Assoc::Left, BinaryOp::Le)),
        Token::Gt => Some((70, Assoc::Left, BinaryOp::Gt)),
        Token::GtEq => Some((70, Assoc::Left, BinaryOp::Ge)),
        Token::Plus => Some((80, Assoc::Left, BinaryOp::Add)),
        Token::Minus => Some((80, Assoc::Left, BinaryOp::Sub)),
        Token::Star => Some((90, Assoc::Left, BinaryOp::Mul)),
        Token::Slash => Some((90, Assoc::Left, BinaryOp::Div)),
        Token::Percent => Some((90, Assoc::Left, BinaryOp::Mod)),
        _ => None,
    }
}

/// Pratt parser - handles binary operators with precedence climbing.
pub(super) fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut left = parse_prefix(stream)?;

    while let Some(token) = stream.peek() {
        let Some((prec, assoc, op)) = binary_op_info(token) else {
            break;
        };
        if prec < min_prec {
            break;
        }
        stream.advance();

        let next_prec = if assoc == Assoc::Left { prec + 1 } else { prec };
        let right = parse_pratt(stream, next_prec)?;

        left = Expr::new(
            stream.next_id(),
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            stream.span_from(start),
        );
    }

    Ok(left)
}

/// Parse prefix expressions (unary operators, casts, atoms with postfix).
fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let op = match stream.peek() {
        Some(Token::Minus) => Some(UnaryOp::Neg),
        Some(Token::Plus) => Some(UnaryOp::Plus),
        Some(Token::Bang) => Some(UnaryOp::Not),
        Some(Token::Tilde) => Some(UnaryOp::BitNot),
        Some(Token::PlusPlus) => Some(UnaryOp::PreInc),
        Some(Token::MinusMinus) => Some(UnaryOp::PreDec),
        Some(Token::LParen) => return parse_cast_or_postfix(stream),
        _ => None,
    };

    let Some(op) = op else {
        return parse_postfix(stream);
    };
    stream.advance();
    let operand = parse_prefix(stream)?;

    Ok(Expr::new(
        stream.next_id(),
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        stream.span_from(start),
    ))
}

/// `(Type)operand` when the parenthesised tokens form a type and the next
/// token can start an operand; otherwise a parenthesised expression.
fn parse_cast_or_postfix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    stream.advance();

    if let Some(ty) = try_parse_type(stream) {
        if stream.eat(&Token::RParen) {
            let builtin = is_builtin_type(&ty.name) && ty.args.is_empty();
            let starts_operand = match stream.peek() {
                Some(
                    Token::Ident(_)
                    | Token::Integer(_)
                    | Token::Real(_)
                    | Token::String(_)
                    | Token::Char(_)
                    | Token::True
                    | Token::False
                    | Token::Null
                    | Token::This
                    | Token::New
                    | Token::Default
                    | Token::Typeof
                    | Token::Nameof
                    | Token::Bang
                    | Token::Tilde,
                ) => true,
                Some(Token::LParen | Token::Minus | Token::Plus) => builtin,
                _ => false,
            };
            if starts_operand {
                let operand = parse_prefix(stream)?;
                return Ok(Expr::new(
                    stream.next_id(),
                    ExprKind::Cast {
                        ty,
                        operand: Box::new(operand),
                    },
                    stream.span_from(start),
                ));
            }
        }
    }

    stream.reset(start);
    parse_postfix(stream)
}

/// Parse postfix forms: member access, invocation, element access, `++`/`--`.
fn parse_postfix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut expr = atoms::parse_atom(stream)?;

    loop {
        match stream.peek() {
            Some(Token::Dot) => {
                stream.advance();
                let name = stream.expect_ident("after `.`")?;
                let type_args = try_parse_type_args(stream).unwrap_or_default();
                expr = Expr::new(
                    stream.next_id(),
                    ExprKind::Member {
                        target: Box::new(expr),
                        name,
                        type_args,
                    },
                    stream.span_from(start),
                );
            }
            Some(Token::LParen) => {
                let args = parse_arguments(stream)?;
                expr = Expr::new(
                    stream.next_id(),
                    ExprKind::Invoke {
                        callee: Box::new(expr),
                        args,
                    },
                    stream.span_from(start),
                );
            }
            Some(Token::LBracket) => {
                stream.advance();
                let mut args = vec![parse_expr(stream)?];
                while stream.eat(&Token::Comma) {
                    args.push(parse_expr(stream)?);
                }
                stream.expect(Token::RBracket)?;
                expr = Expr::new(
                    stream.next_id(),
                    ExprKind::Index {
                        target: Box::new(expr),
                        args,
                    },
                    stream.span_from(start),
                );
            }
            Some(Token::PlusPlus | Token::MinusMinus) => {
                let op = if matches!(stream.peek(), Some(Token::PlusPlus)) {
                    UnaryOp::PostInc
                } else {
                    UnaryOp::PostDec
                };
                stream.advance();
                expr = Expr::new(
                    stream.next_id(),
                    ExprKind::Unary {
                        op,
                        operand: Box::new(expr),
                    },
                    stream.span_from(start),
                );
            }
            _ => break,
        }
    }

    Ok(expr)
}
