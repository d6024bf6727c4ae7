//! Hand-written recursive descent parser.
//!
//! ## Architecture
//!
//! - `stream`: TokenStream wrapper with lookahead, backtracking and node ids
//! - `error`: ParseError
//! - `decl`: usings, namespaces, types and members
//! - `stmt`: statements and blocks
//! - `expr`: expressions (Pratt parsing, lambdas)
//! - `types`: type references and generic argument lists
//!
//! ## Public API
//!
//! ```rust,ignore
//! pub fn parse_source(source: &str, file_id: u16) -> Result<CompilationUnit, Vec<ParseError>>
//! pub fn parse_compilation_unit(tokens: &[(Token, Range<usize>)], file_id: u16) -> Result<CompilationUnit, Vec<ParseError>>
//! pub fn parse_expr_with_spans(tokens: &[(Token, Range<usize>)], file_id: u16) -> Result<Expr, Vec<ParseError>>
//! ```

mod error;
mod stream;

pub use error::{ParseError, ParseErrorKind};
use stream::TokenStream;

mod decl;
mod expr;
mod stmt;
mod types;

use lambdajob_ast::{CompilationUnit, Expr, Span};
use lambdajob_lexer::Token;
use std::ops::Range;

/// Lex and parse a whole source file.
///
/// Lexer failures are reported as [`ParseErrorKind::InvalidToken`] errors;
/// parsing only runs when the whole file lexed cleanly.
pub fn parse_source(source: &str, file_id: u16) -> Result<CompilationUnit, Vec<ParseError>> {
    let (tokens, invalid) = lambdajob_lexer::lex_with_spans(source);
    if !invalid.is_empty() {
        return Err(invalid
            .into_iter()
            .map(|range| {
                ParseError::invalid_token(Span::new(file_id, range.start as u32, range.end as u32))
            })
            .collect());
    }
    parse_compilation_unit(&tokens, file_id)
}

/// Parse a sequence of tokens with byte spans into a compilation unit.
///
/// # Returns
/// - `Ok(CompilationUnit)` if parsing succeeds
/// - `Err(Vec<ParseError>)` with every error found
pub fn parse_compilation_unit(
    tokens: &[(Token, Range<usize>)],
    file_id: u16,
) -> Result<CompilationUnit, Vec<ParseError>> {
    let mut stream = TokenStream::new(tokens, file_id);
    decl::parse_compilation_unit(&mut stream)
}

/// Parse a sequence of tokens with byte spans into one expression.
///
/// The whole input must be consumed.
pub fn parse_expr_with_spans(
    tokens: &[(Token, Range<usize>)],
    file_id: u16,
) -> Result<Expr, Vec<ParseError>> {
    if tokens.is_empty() {
        return Err(vec![ParseError::unexpected_token(
            None,
            "in expression",
            Span::zero(file_id),
        )]);
    }
    let mut stream = TokenStream::new(tokens, file_id);
    let expr = expr::parse_expr(&mut stream).map_err(|e| vec![e])?;
    if !stream.at_end() {
        return Err(vec![ParseError::unexpected_token(
            stream.peek(),
            "after expression",
            stream.current_span(),
        )]);
    }
    Ok(expr)
}
