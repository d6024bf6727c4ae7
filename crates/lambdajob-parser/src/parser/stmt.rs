//! Statement and block parsing.
//!
//! Local declarations and expression statements share a prefix in C#
//! (`Foo x = ...;` vs `Foo.Bar = ...;`). The parser tries a declaration
//! first and rewinds to an expression statement when the tokens after the
//! type do not look like a declarator.

use super::decl::parse_method_rest;
use super::expr::parse_expr;
use super::types::{parse_type, try_parse_type};
use super::{ParseError, TokenStream};
use lambdajob_ast::{Block, LocalDecl, Modifier, Stmt, StmtKind, TypeRef, VarDeclarator};
use lambdajob_lexer::Token;

/// Parse `{ stmt* }`.
pub(super) fn parse_block(stream: &mut TokenStream) -> Result<Block, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LBrace)?;
    let mut stmts = Vec::new();
    while !matches!(stream.peek(), Some(Token::RBrace)) {
        if stream.at_end() {
            return Err(ParseError::unexpected_token(
                None,
                "while parsing block, missing `}`",
                stream.current_span(),
            ));
        }
        stmts.push(parse_stmt(stream)?);
    }
    stream.expect(Token::RBrace)?;
    Ok(Block {
        stmts,
        span: stream.span_from(start),
    })
}

/// Parse a single statement.
pub(super) fn parse_stmt(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();

    let kind = match stream.peek() {
        Some(Token::LBrace) => StmtKind::Block(parse_block(stream)?),
        Some(Token::Semicolon) => {
            stream.advance();
            StmtKind::Empty
        }
        Some(Token::If) => parse_if(stream)?,
        Some(Token::For) => parse_for(stream)?,
        Some(Token::Foreach) => parse_foreach(stream)?,
        Some(Token::While) => {
            stream.advance();
            stream.expect(Token::LParen)?;
            let cond = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            let body = Box::new(parse_stmt(stream)?);
            StmtKind::While { cond, body }
        }
        Some(Token::Do) => {
            stream.advance();
            let body = Box::new(parse_stmt(stream)?);
            stream.expect(Token::While)?;
            stream.expect(Token::LParen)?;
            let cond = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            stream.expect(Token::Semicolon)?;
            StmtKind::DoWhile { body, cond }
        }
        Some(Token::Return) => {
            stream.advance();
            let value = if matches!(stream.peek(), Some(Token::Semicolon)) {
                None
            } else {
                Some(parse_expr(stream)?)
            };
            stream.expect(Token::Semicolon)?;
            StmtKind::Return(value)
        }
        Some(Token::Break) => {
            stream.advance();
            stream.expect(Token::Semicolon)?;
            StmtKind::Break
        }
        Some(Token::Continue) => {
            stream.advance();
            stream.expect(Token::Semicolon)?;
            StmtKind::Continue
        }
        Some(Token::Const) => {
            stream.advance();
            let ty = parse_type(stream)?;
            let decl = parse_local_rest(stream, ty, true, false)?;
            stream.expect(Token::Semicolon)?;
            StmtKind::Local(decl)
        }
        Some(Token::Using) => {
            stream.advance();
            let ty = parse_type(stream)?;
            let decl = parse_local_rest(stream, ty, false, true)?;
            stream.expect(Token::Semicolon)?;
            StmtKind::Local(decl)
        }
        Some(Token::Static) => {
            stream.advance();
            let return_type = parse_type(stream)?;
            let function = parse_method_rest(stream, start, vec![Modifier::Static], Vec::new(), return_type)?;
            StmtKind::LocalFunction(Box::new(function))
        }
        _ => match declaration_head(stream, start) {
            Some((ty, DeclShape::Local)) => {
                let decl = parse_local_rest(stream, ty, false, false)?;
                stream.expect(Token::Semicolon)?;
                StmtKind::Local(decl)
            }
            Some((ty, DeclShape::Function)) => {
                let function = parse_method_rest(stream, start, Vec::new(), Vec::new(), ty)?;
                StmtKind::LocalFunction(Box::new(function))
            }
            None => {
                let expr = parse_expr(stream)?;
                stream.expect(Token::Semicolon)?;
                StmtKind::Expr(expr)
            }
        },
    };

    Ok(Stmt {
        id: stream.next_id(),
        kind,
        span: stream.span_from(start),
    })
}

/// What follows a leading type in statement position.
enum DeclShape {
    Local,
    Function,
}

/// Parse the type of a local declaration or local function, if the tokens
/// form one.
///
/// Leaves the stream at `start` when they do not.
fn declaration_head(stream: &mut TokenStream, start: usize) -> Option<(TypeRef, DeclShape)> {
    let ty = try_parse_type(stream)?;

    let shape = match (stream.peek(), stream.peek_nth(1)) {
        (Some(Token::Ident(_)), Some(Token::Eq | Token::Semicolon | Token::Comma)) => {
            DeclShape::Local
        }
        (Some(Token::Ident(_)), Some(Token::LParen | Token::Lt)) => DeclShape::Function,
        _ => {
            stream.reset(start);
            return None;
        }
    };
    Some((ty, shape))
}

/// Declarators after the type: `a = 1, b`.
fn parse_local_rest(
    stream: &mut TokenStream,
    ty: TypeRef,
    is_const: bool,
    is_using: bool,
) -> Result<LocalDecl, ParseError> {
    let mut declarators = Vec::new();
    loop {
        let start = stream.current_pos();
        let name = stream.expect_ident("as local variable name")?;
        let init = if stream.eat(&Token::Eq) {
            Some(parse_expr(stream)?)
        } else {
            None
        };
        declarators.push(VarDeclarator {
            name,
            init,
            span: stream.span_from(start),
        });
        if !stream.eat(&Token::Comma) {
            break;
        }
    }

    if is_const && declarators.iter().any(|declarator| declarator.init.is_none()) {
        return Err(ParseError::invalid_syntax(
            "const local requires an initializer",
            stream.current_span(),
        ));
    }

    Ok(LocalDecl {
        ty,
        declarators,
        is_const,
        is_using,
    })
}

fn parse_if(stream: &mut TokenStream) -> Result<StmtKind, ParseError> {
    stream.expect(Token::If)?;
    stream.expect(Token::LParen)?;
    let cond = parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    let then = Box::new(parse_stmt(stream)?);
    let otherwise = if stream.eat(&Token::Else) {
        Some(Box::new(parse_stmt(stream)?))
    } else {
        None
    };
    Ok(StmtKind::If {
        cond,
        then,
        otherwise,
    })
}

fn parse_for(stream: &mut TokenStream) -> Result<StmtKind, ParseError> {
    stream.expect(Token::For)?;
    stream.expect(Token::LParen)?;

    let mut init = Vec::new();
    if !matches!(stream.peek(), Some(Token::Semicolon)) {
        let start = stream.current_pos();
        match declaration_head(stream, start) {
            Some((ty, DeclShape::Local)) => {
                let decl = parse_local_rest(stream, ty, false, false)?;
                init.push(Stmt {
                    id: stream.next_id(),
                    kind: StmtKind::Local(decl),
                    span: stream.span_from(start),
                });
            }
            Some((_, DeclShape::Function)) => {
                return Err(ParseError::invalid_syntax(
                    "local function in for initializer",
                    stream.span_from(start),
                ));
            }
            None => loop {
                let expr_start = stream.current_pos();
                let expr = parse_expr(stream)?;
                init.push(Stmt {
                    id: stream.next_id(),
                    kind: StmtKind::Expr(expr),
                    span: stream.span_from(expr_start),
                });
                if !stream.eat(&Token::Comma) {
                    break;
                }
            },
        }
    }
    stream.expect(Token::Semicolon)?;

    let cond = if matches!(stream.peek(), Some(Token::Semicolon)) {
        None
    } else {
        Some(parse_expr(stream)?)
    };
    stream.expect(Token::Semicolon)?;

    let mut step = Vec::new();
    if !matches!(stream.peek(), Some(Token::RParen)) {
        step.push(parse_expr(stream)?);
        while stream.eat(&Token::Comma) {
            step.push(parse_expr(stream)?);
        }
    }
    stream.expect(Token::RParen)?;

    let body = Box::new(parse_stmt(stream)?);
    Ok(StmtKind::For {
        init,
        cond,
        step,
        body,
    })
}

fn parse_foreach(stream: &mut TokenStream) -> Result<StmtKind, ParseError> {
    stream.expect(Token::Foreach)?;
    stream.expect(Token::LParen)?;
    let ty = parse_type(stream)?;
    let name = stream.expect_ident("as foreach variable")?;
    stream.expect(Token::In)?;
    let iterable = parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    let body = Box::new(parse_stmt(stream)?);
    Ok(StmtKind::Foreach {
        ty,
        name,
        iterable,
        body,
    })
}
