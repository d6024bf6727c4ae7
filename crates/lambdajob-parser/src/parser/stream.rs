//! Token stream wrapper for the hand-written parser.

use lambdajob_ast::{NodeId, Span};
use lambdajob_lexer::Token;
use std::ops::Range;

/// Token stream with lookahead, backtracking and node-id allocation.
///
/// Each token is paired with its byte span from the source so error
/// messages and syntax nodes point at exact locations.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    file_id: u16,
    next_id: u32,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream from tokens with their byte spans.
    pub fn new(tokens: &'src [(Token, Range<usize>)], file_id: u16) -> Self {
        Self {
            tokens,
            pos: 0,
            file_id,
            next_id: 0,
        }
    }

    /// Allocate the next node id. Ids are never reused within one stream,
    /// including across backtracking.
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected token kind.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance if it matches.
    pub fn expect(&mut self, expected: Token) -> Result<Span, super::ParseError> {
        if self.check(&expected) {
            let start = self.pos;
            self.advance();
            Ok(self.span_from(start))
        } else {
            Err(super::ParseError::expected_token(
                expected,
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Expect an identifier and return its text.
    pub fn expect_ident(&mut self, context: &str) -> Result<String, super::ParseError> {
        let span = self.current_span();
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.to_string();
                self.pos += 1;
                Ok(name)
            }
            other => Err(super::ParseError::unexpected_token(other, context, span)),
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Get the current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Rewind to a position previously returned by `current_pos`.
    pub fn reset(&mut self, pos: usize) {
        debug_assert!(pos <= self.tokens.len());
        self.pos = pos;
    }

    /// Create a span from a starting position to the last consumed token.
    ///
    /// # Panics
    ///
    /// Panics if `start` position is out of bounds for the token stream.
    pub fn span_from(&self, start: usize) -> Span {
        assert!(
            start < self.tokens.len(),
            "span_from: start position {} out of bounds (stream length: {})",
            start,
            self.tokens.len()
        );

        let start_byte = self.tokens[start].1.start;
        let end_byte = if self.pos > start {
            self.tokens[self.pos - 1].1.end
        } else {
            start_byte
        };

        Span::new(self.file_id, start_byte as u32, end_byte as u32)
    }

    /// Get a span for the current token (or the end of input).
    pub fn current_span(&self) -> Span {
        if let Some((_, range)) = self.tokens.get(self.pos) {
            return Span::new(self.file_id, range.start as u32, range.end as u32);
        }
        // At EOF - use the end of the last token
        match self.tokens.last() {
            Some((_, range)) => Span::new(self.file_id, range.end as u32, range.end as u32),
            None => Span::zero(self.file_id),
        }
    }

    /// Find the position of the bracket closing the one at `open_pos`.
    ///
    /// Works for `(`/`)`, `[`/`]` and `{`/`}`; returns `None` when unbalanced.
    pub fn matching_close(&self, open_pos: usize) -> Option<usize> {
        let (open, close) = match self.tokens.get(open_pos).map(|(tok, _)| tok) {
            Some(Token::LParen) => (Token::LParen, Token::RParen),
            Some(Token::LBracket) => (Token::LBracket, Token::RBracket),
            Some(Token::LBrace) => (Token::LBrace, Token::RBrace),
            _ => return None,
        };
        let mut depth = 0usize;
        for (idx, (token, _)) in self.tokens.iter().enumerate().skip(open_pos) {
            if *token == open {
                depth += 1;
            } else if *token == close {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
        }
        None
    }

    /// Token at an absolute position.
    pub fn token_at(&self, pos: usize) -> Option<&Token> {
        self.tokens.get(pos).map(|(tok, _)| tok)
    }

    /// Skip to the next member or type boundary for error recovery.
    ///
    /// Stops after a `;` or `}` at the current nesting depth, or before a
    /// modifier or type keyword at depth zero.
    pub fn synchronize(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::LBrace => depth += 1,
                Token::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                Token::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                Token::Struct | Token::Class | Token::Interface | Token::Namespace
                    if depth == 0 =>
                {
                    return;
                }
                token if depth == 0 && token.is_modifier() => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Get the file_id for this token stream.
    pub fn file_id(&self) -> u16 {
        self.file_id
    }
}
