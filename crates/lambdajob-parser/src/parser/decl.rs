//! Declaration parsing: usings, namespaces, types and members.
//!
//! Errors inside one member do not stop the parse: the error is recorded,
//! the stream is synchronized to the next member boundary and parsing
//! continues, so a file with several mistakes reports all of them.

use super::expr::{parse_arguments, parse_expr, parse_ref_kind};
use super::stmt::parse_block;
use super::types::{parse_type, parse_type_args};
use super::{ParseError, TokenStream};
use lambdajob_ast::{
    AttributeUse, Block, CompilationUnit, FieldDecl, Member, MethodDecl, Modifier, Param, Stmt,
    StmtKind, TypeDecl, TypeDeclKind, TypeRef, VarDeclarator,
};
use lambdajob_lexer::Token;

/// Parse a whole file.
pub(super) fn parse_compilation_unit(
    stream: &mut TokenStream,
) -> Result<CompilationUnit, Vec<ParseError>> {
    let mut errors = Vec::new();
    let mut usings = Vec::new();
    let mut types = Vec::new();

    parse_scope(stream, None, &mut usings, &mut types, &mut errors, false);

    if errors.is_empty() {
        Ok(CompilationUnit {
            file_id: stream.file_id(),
            usings,
            types,
        })
    } else {
        Err(errors)
    }
}

/// Parse the contents of the file or of a `namespace { ... }` body.
fn parse_scope(
    stream: &mut TokenStream,
    namespace: Option<&str>,
    usings: &mut Vec<String>,
    types: &mut Vec<TypeDecl>,
    errors: &mut Vec<ParseError>,
    braced: bool,
) {
    let mut file_namespace: Option<String> = None;

    while let Some(token) = stream.peek() {
        let result = match token {
            Token::RBrace if braced => return,
            Token::Using => parse_using(stream).map(|name| usings.push(name)),
            Token::Namespace => parse_namespace(stream, namespace, usings, types, errors)
                .map(|file_scoped| {
                    if file_scoped.is_some() {
                        file_namespace = file_scoped;
                    }
                }),
            Token::Semicolon => {
                stream.advance();
                Ok(())
            }
            _ => {
                let ns = file_namespace.as_deref().or(namespace);
                parse_type_or_skip(stream, ns).map(|decl| types.extend(decl))
            }
        };

        if let Err(error) = result {
            errors.push(error);
            let before = stream.current_pos();
            stream.synchronize();
            if stream.current_pos() == before {
                stream.advance();
            }
        }
    }
}

/// `using A.B;` / `using static A.B;` / `using X = A.B;`
fn parse_using(stream: &mut TokenStream) -> Result<String, ParseError> {
    stream.expect(Token::Using)?;
    stream.eat(&Token::Static);
    if matches!(stream.peek_nth(1), Some(Token::Eq)) {
        stream.advance();
        stream.advance();
    }
    let name = parse_dotted_name(stream)?;
    stream.expect(Token::Semicolon)?;
    Ok(name)
}

fn parse_dotted_name(stream: &mut TokenStream) -> Result<String, ParseError> {
    let mut name = stream.expect_ident("in qualified name")?;
    while stream.eat(&Token::Dot) {
        name.push('.');
        name.push_str(&stream.expect_ident("in qualified name")?);
    }
    Ok(name)
}

/// Parse a namespace. Returns the name for a file-scoped namespace.
fn parse_namespace(
    stream: &mut TokenStream,
    outer: Option<&str>,
    usings: &mut Vec<String>,
    types: &mut Vec<TypeDecl>,
    errors: &mut Vec<ParseError>,
) -> Result<Option<String>, ParseError> {
    stream.expect(Token::Namespace)?;
    let name = parse_dotted_name(stream)?;
    let full = match outer {
        Some(outer) => format!("{}.{}", outer, name),
        None => name,
    };

    if stream.eat(&Token::Semicolon) {
        return Ok(Some(full));
    }

    stream.expect(Token::LBrace)?;
    parse_scope(stream, Some(&full), usings, types, errors, true);
    stream.expect(Token::RBrace)?;
    Ok(None)
}

/// Parse a type declaration, or skip an `enum` body. Returns `None` for
/// skipped declarations.
fn parse_type_or_skip(
    stream: &mut TokenStream,
    namespace: Option<&str>,
) -> Result<Option<TypeDecl>, ParseError> {
    let start = stream.current_pos();
    let attributes = parse_attributes(stream)?;
    let modifiers = parse_modifiers(stream);

    match stream.peek() {
        Some(Token::Struct | Token::Class | Token::Interface) => {
            parse_type_decl(stream, start, namespace, attributes, modifiers).map(Some)
        }
        Some(Token::Ident(word)) if &**word == "enum" => {
            skip_enum(stream)?;
            Ok(None)
        }
        other => Err(ParseError::unexpected_token(
            other,
            "at type declaration",
            stream.current_span(),
        )),
    }
}

/// `enum Name [: base] { ... }` carries no lambda jobs.
fn skip_enum(stream: &mut TokenStream) -> Result<(), ParseError> {
    stream.advance();
    stream.expect_ident("as enum name")?;
    if stream.eat(&Token::Colon) {
        parse_type(stream)?;
    }
    let open = stream.current_pos();
    let close = stream.matching_close(open).ok_or_else(|| {
        ParseError::unexpected_token(None, "while parsing enum body", stream.current_span())
    })?;
    stream.reset(close + 1);
    stream.eat(&Token::Semicolon);
    Ok(())
}

fn parse_type_decl(
    stream: &mut TokenStream,
    start: usize,
    namespace: Option<&str>,
    attributes: Vec<AttributeUse>,
    modifiers: Vec<Modifier>,
) -> Result<TypeDecl, ParseError> {
    let kind = match stream.advance() {
        Some(Token::Struct) => TypeDeclKind::Struct,
        Some(Token::Class) => TypeDeclKind::Class,
        _ => TypeDeclKind::Interface,
    };
    let name = stream.expect_ident("as type name")?;
    let type_params = parse_type_params(stream)?;

    let mut bases = Vec::new();
    if stream.eat(&Token::Colon) {
        bases.push(parse_type(stream)?);
        while stream.eat(&Token::Comma) {
            bases.push(parse_type(stream)?);
        }
    }
    skip_constraints(stream);

    stream.expect(Token::LBrace)?;

    let mut members = Vec::new();
    let mut nested = Vec::new();
    let mut errors = Vec::new();
    while !matches!(stream.peek(), Some(Token::RBrace)) {
        if stream.at_end() {
            return Err(ParseError::unexpected_token(
                None,
                "while parsing type body, missing `}`",
                stream.current_span(),
            ));
        }
        match parse_member(stream, &name, namespace) {
            Ok(MemberOrType::Member(member)) => members.push(member),
            Ok(MemberOrType::Type(decl)) => nested.push(decl),
            Ok(MemberOrType::Skipped) => {}
            Err(error) => {
                errors.push(error);
                let before = stream.current_pos();
                stream.synchronize();
                if stream.current_pos() == before {
                    stream.advance();
                }
            }
        }
    }
    stream.expect(Token::RBrace)?;
    stream.eat(&Token::Semicolon);

    // Report the first member error; the remaining ones are usually cascades.
    if let Some(error) = errors.into_iter().next() {
        return Err(error);
    }

    Ok(TypeDecl {
        name,
        namespace: namespace.map(str::to_string),
        kind,
        modifiers,
        attributes,
        type_params,
        bases,
        members,
        nested,
        span: stream.span_from(start),
    })
}

enum MemberOrType {
    Member(Member),
    Type(TypeDecl),
    Skipped,
}

/// Parse one member; nested types keep the enclosing namespace.
fn parse_member(
    stream: &mut TokenStream,
    type_name: &str,
    namespace: Option<&str>,
) -> Result<MemberOrType, ParseError> {
    let start = stream.current_pos();
    let attributes = parse_attributes(stream)?;
    let modifiers = parse_modifiers(stream);

    match stream.peek() {
        Some(Token::Struct | Token::Class | Token::Interface) => {
            return parse_type_decl(stream, start, namespace, attributes, modifiers)
                .map(MemberOrType::Type);
        }
        Some(Token::Ident(word)) if &**word == "enum" => {
            skip_enum(stream)?;
            return Ok(MemberOrType::Skipped);
        }
        Some(Token::Ident(word)) if &**word == type_name => {
            if matches!(stream.peek_nth(1), Some(Token::LParen)) {
                // Constructor: recorded as a method returning the type itself.
                let return_type = TypeRef::simple(type_name, stream.current_span());
                return parse_method_rest(stream, start, modifiers, attributes, return_type)
                    .map(|method| MemberOrType::Member(Member::Method(method)));
            }
        }
        _ => {}
    }

    let ty = parse_type(stream)?;

    match (stream.peek(), stream.peek_nth(1)) {
        (Some(Token::Ident(_)), Some(Token::LParen | Token::Lt)) => {
            parse_method_rest(stream, start, modifiers, attributes, ty)
                .map(|method| MemberOrType::Member(Member::Method(method)))
        }
        (Some(Token::Ident(_)), Some(Token::LBrace | Token::FatArrow)) => {
            parse_property(stream, start, modifiers, attributes, ty)
                .map(|field| MemberOrType::Member(Member::Field(field)))
        }
        (Some(Token::Ident(_)), _) => {
            let declarators = parse_field_declarators(stream)?;
            stream.expect(Token::Semicolon)?;
            Ok(MemberOrType::Member(Member::Field(FieldDecl {
                modifiers,
                attributes,
                ty,
                declarators,
                is_property: false,
                span: stream.span_from(start),
            })))
        }
        (other, _) => Err(ParseError::unexpected_token(
            other,
            "in member declaration",
            stream.current_span(),
        )),
    }
}

fn parse_field_declarators(stream: &mut TokenStream) -> Result<Vec<VarDeclarator>, ParseError> {
    let mut declarators = Vec::new();
    loop {
        let start = stream.current_pos();
        let name = stream.expect_ident("as field name")?;
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
            return Ok(declarators);
        }
    }
}

/// `Type Name { get; set; } [= init;]` or `Type Name => expr;`
///
/// Accessor bodies are skipped; the property is recorded as a field.
fn parse_property(
    stream: &mut TokenStream,
    start: usize,
    modifiers: Vec<Modifier>,
    attributes: Vec<AttributeUse>,
    ty: TypeRef,
) -> Result<FieldDecl, ParseError> {
    let name_start = stream.current_pos();
    let name = stream.expect_ident("as property name")?;
    let name_span = stream.span_from(name_start);

    let mut init = None;
    if stream.eat(&Token::FatArrow) {
        parse_expr(stream)?;
        stream.expect(Token::Semicolon)?;
    } else {
        let open = stream.current_pos();
        let close = stream.matching_close(open).ok_or_else(|| {
            ParseError::unexpected_token(None, "while parsing property accessors", stream.current_span())
        })?;
        stream.reset(close + 1);
        if stream.eat(&Token::Eq) {
            init = Some(parse_expr(stream)?);
            stream.expect(Token::Semicolon)?;
        }
    }

    Ok(FieldDecl {
        modifiers,
        attributes,
        ty,
        declarators: vec![VarDeclarator {
            name,
            init,
            span: name_span,
        }],
        is_property: true,
        span: stream.span_from(start),
    })
}

/// Name, type parameters, parameters and body of a method or local function.
pub(super) fn parse_method_rest(
    stream: &mut TokenStream,
    start: usize,
    modifiers: Vec<Modifier>,
    attributes: Vec<AttributeUse>,
    return_type: TypeRef,
) -> Result<MethodDecl, ParseError> {
    let name = stream.expect_ident("as method name")?;
    let type_params = parse_type_params(stream)?;
    let params = parse_params(stream)?;
    skip_constraints(stream);

    let body = match stream.peek() {
        Some(Token::LBrace) => Some(parse_block(stream)?),
        Some(Token::FatArrow) => {
            stream.advance();
            let body_start = stream.current_pos();
            let expr = parse_expr(stream)?;
            stream.expect(Token::Semicolon)?;
            let span = stream.span_from(body_start);
            let kind = if return_type.name == "void" {
                StmtKind::Expr(expr)
            } else {
                StmtKind::Return(Some(expr))
            };
            Some(Block {
                stmts: vec![Stmt {
                    id: stream.next_id(),
                    kind,
                    span,
                }],
                span,
            })
        }
        Some(Token::Semicolon) => {
            stream.advance();
            None
        }
        other => {
            return Err(ParseError::unexpected_token(
                other,
                "after method signature",
                stream.current_span(),
            ));
        }
    };

    Ok(MethodDecl {
        modifiers,
        attributes,
        return_type,
        name,
        type_params,
        params,
        body,
        span: stream.span_from(start),
    })
}

/// `(A a, ref B b, in C c = default)`
fn parse_params(stream: &mut TokenStream) -> Result<Vec<Param>, ParseError> {
    stream.expect(Token::LParen)?;
    let mut params = Vec::new();
    if stream.eat(&Token::RParen) {
        return Ok(params);
    }

    loop {
        let start = stream.current_pos();
        parse_attributes(stream)?;
        // `this` (extension receiver) and `params` carry no meaning here
        stream.eat(&Token::This);
        if matches!(stream.peek(), Some(Token::Ident(word)) if &**word == "params") {
            stream.advance();
        }
        let ref_kind = parse_ref_kind(stream);
        let ty = parse_type(stream)?;
        let name = stream.expect_ident("as parameter name")?;
        if stream.eat(&Token::Eq) {
            parse_expr(stream)?;
        }
        params.push(Param {
            ref_kind,
            ty: Some(ty),
            name,
            span: stream.span_from(start),
        });

        if stream.eat(&Token::Comma) {
            continue;
        }
        stream.expect(Token::RParen)?;
        return Ok(params);
    }
}

fn parse_type_params(stream: &mut TokenStream) -> Result<Vec<String>, ParseError> {
    if !matches!(stream.peek(), Some(Token::Lt)) {
        return Ok(Vec::new());
    }
    Ok(parse_type_args(stream)?
        .into_iter()
        .map(|ty| ty.name)
        .collect())
}

/// Skip `where T : struct, IComponentData` clauses up to the body.
fn skip_constraints(stream: &mut TokenStream) {
    while matches!(stream.peek(), Some(Token::Ident(word)) if &**word == "where") {
        while !matches!(
            stream.peek(),
            Some(Token::LBrace | Token::FatArrow | Token::Semicolon) | None
        ) {
            stream.advance();
        }
    }
}

/// Zero or more `[Attr(args), Other]` lists.
fn parse_attributes(stream: &mut TokenStream) -> Result<Vec<AttributeUse>, ParseError> {
    let mut attributes = Vec::new();
    while stream.eat(&Token::LBracket) {
        // Optional target: `[return: X]`, `[assembly: X]`
        if matches!(stream.peek_nth(1), Some(Token::Colon)) {
            stream.advance();
            stream.advance();
        }
        loop {
            let start = stream.current_pos();
            let name = parse_dotted_name(stream)?;
            let args = if matches!(stream.peek(), Some(Token::LParen)) {
                parse_arguments(stream)?
            } else {
                Vec::new()
            };
            attributes.push(AttributeUse {
                name,
                args,
                span: stream.span_from(start),
            });
            if !stream.eat(&Token::Comma) {
                break;
            }
        }
        stream.expect(Token::RBracket)?;
    }
    Ok(attributes)
}

fn parse_modifiers(stream: &mut TokenStream) -> Vec<Modifier> {
    let mut modifiers = Vec::new();
    loop {
        let modifier = match stream.peek() {
            Some(Token::Public) => Modifier::Public,
            Some(Token::Private) => Modifier::Private,
            Some(Token::Protected) => Modifier::Protected,
            Some(Token::Internal) => Modifier::Internal,
            Some(Token::Static) => Modifier::Static,
            Some(Token::Readonly) => Modifier::Readonly,
            Some(Token::Partial) => Modifier::Partial,
            Some(Token::Override) => Modifier::Override,
            Some(Token::Virtual) => Modifier::Virtual,
            Some(Token::Abstract) => Modifier::Abstract,
            Some(Token::Sealed) => Modifier::Sealed,
            Some(Token::Unsafe) => Modifier::Unsafe,
            Some(Token::Const) => Modifier::Const,
            _ => return modifiers,
        };
        stream.advance();
        modifiers.push(modifier);
    }
}
