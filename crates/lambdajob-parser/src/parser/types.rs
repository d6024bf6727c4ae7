//! Type reference parsing.

use super::{ParseError, TokenStream};
use lambdajob_ast::TypeRef;
use lambdajob_lexer::Token;

/// Keyword-like identifiers naming built-in types.
const BUILTIN_TYPES: &[&str] = &[
    "bool", "byte", "sbyte", "short", "ushort", "int", "uint", "long", "ulong", "float", "double",
    "decimal", "char", "string", "object", "void",
];

/// Whether `name` is a built-in type keyword.
pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Parse a type reference: `A.B<C, D>?[]`.
pub fn parse_type(stream: &mut TokenStream) -> Result<TypeRef, ParseError> {
    let start = stream.current_pos();
    let mut name = stream.expect_ident("in type position")?;

    while matches!(stream.peek(), Some(Token::Dot)) && matches!(stream.peek_nth(1), Some(Token::Ident(_))) {
        stream.advance();
        let segment = stream.expect_ident("in qualified type name")?;
        name.push('.');
        name.push_str(&segment);
    }

    let args = if matches!(stream.peek(), Some(Token::Lt)) {
        parse_type_args(stream)?
    } else {
        Vec::new()
    };

    // `Outer<T>.Inner` is not supported
    let mut ty = TypeRef {
        name,
        args,
        array_rank: 0,
        nullable: false,
        span: stream.span_from(start),
    };

    if matches!(stream.peek(), Some(Token::Question)) {
        stream.advance();
        ty.nullable = true;
    }

    while matches!(stream.peek(), Some(Token::LBracket)) && matches!(stream.peek_nth(1), Some(Token::RBracket)) {
        stream.advance();
        stream.advance();
        ty.array_rank += 1;
    }

    ty.span = stream.span_from(start);
    Ok(ty)
}

/// Parse `<T, U>`; the stream must be positioned at `<`.
pub fn parse_type_args(stream: &mut TokenStream) -> Result<Vec<TypeRef>, ParseError> {
    stream.expect(Token::Lt)?;
    let mut args = vec![parse_type(stream)?];
    while stream.eat(&Token::Comma) {
        args.push(parse_type(stream)?);
    }
    stream.expect(Token::Gt)?;
    Ok(args)
}

/// Speculatively parse a type argument list in expression position.
///
/// Succeeds only when the list is followed by a token that cannot continue a
/// relational expression, so `a < b` stays a comparison while
/// `GetComponent<Foo>(e)` becomes a generic name. On failure the stream is
/// left untouched.
pub fn try_parse_type_args(stream: &mut TokenStream) -> Option<Vec<TypeRef>> {
    if !matches!(stream.peek(), Some(Token::Lt)) {
        return None;
    }
    let start = stream.current_pos();
    match parse_type_args(stream) {
        Ok(args)
            if matches!(
                stream.peek(),
                Some(Token::LParen)
                    | Some(Token::Dot)
                    | Some(Token::RParen)
                    | Some(Token::Comma)
                    | Some(Token::Semicolon)
                    | Some(Token::RBracket)
            ) =>
        {
            Some(args)
        }
        _ => {
            stream.reset(start);
            None
        }
    }
}

/// Parse a type if one starts here, restoring the stream otherwise.
pub fn try_parse_type(stream: &mut TokenStream) -> Option<TypeRef> {
    let start = stream.current_pos();
    match parse_type(stream) {
        Ok(ty) => Some(ty),
        Err(_) => {
            stream.reset(start);
            None
        }
    }
}
