// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for the lambda-job source subset.
//!
//! This crate tokenizes the C#-flavoured source that hosts `Entities.ForEach`
//! and `Job.WithCode` lambda jobs, using logos.
//!
//! # Design
//!
//! - `Token`: all token types (keywords, operators, literals, identifiers)
//! - Comments and preprocessor lines are stripped during lexing (not tokens)
//! - Numeric literals keep their source text so constants can be inlined verbatim
//! - Built-in type names (`int`, `float`, `void`, ...) and contextual keywords
//!   (`var`, `get`, `set`) are plain identifiers; the parser decides
//!
//! # Examples
//!
//! ```
//! # use lambdajob_lexer::*;
//! # use logos::Logos;
//! let source = "Entities.ForEach((ref Translation t) => { t.Value += 1f; }).Run();";
//! let tokens: Vec<Result<Token, ()>> = Token::lexer(source).collect();
//! assert!(tokens.iter().all(Result::is_ok));
//! ```

use logos::Logos;
use std::rc::Rc;

/// Source token.
///
/// Uses `Rc<str>` payloads for cheap cloning throughout the parser pipeline.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line and doc comments
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")] // Skip block comments
#[logos(skip r"#[a-z][^\n]*")] // Skip preprocessor lines (#if, #region, ...)
pub enum Token {
    // === Keywords ===

    // Declarations
    /// Keyword `using`
    #[token("using")]
    Using,
    /// Keyword `namespace`
    #[token("namespace")]
    Namespace,
    /// Keyword `struct`
    #[token("struct")]
    Struct,
    /// Keyword `class`
    #[token("class")]
    Class,
    /// Keyword `interface`
    #[token("interface")]
    Interface,

    // Modifiers
    /// Keyword `public`
    #[token("public")]
    Public,
    /// Keyword `private`
    #[token("private")]
    Private,
    /// Keyword `protected`
    #[token("protected")]
    Protected,
    /// Keyword `internal`
    #[token("internal")]
    Internal,
    /// Keyword `static`
    #[token("static")]
    Static,
    /// Keyword `readonly`
    #[token("readonly")]
    Readonly,
    /// Keyword `partial`
    #[token("partial")]
    Partial,
    /// Keyword `override`
    #[token("override")]
    Override,
    /// Keyword `virtual`
    #[token("virtual")]
    Virtual,
    /// Keyword `abstract`
    #[token("abstract")]
    Abstract,
    /// Keyword `sealed`
    #[token("sealed")]
    Sealed,
    /// Keyword `unsafe`
    #[token("unsafe")]
    Unsafe,
    /// Keyword `const`
    #[token("const")]
    Const,

    // Parameter / argument modifiers
    /// Keyword `ref`
    #[token("ref")]
    Ref,
    /// Keyword `in`
    #[token("in")]
    In,
    /// Keyword `out`
    #[token("out")]
    Out,

    // Statements
    /// Keyword `return`
    #[token("return")]
    Return,
    /// Keyword `if`
    #[token("if")]
    If,
    /// Keyword `else`
    #[token("else")]
    Else,
    /// Keyword `for`
    #[token("for")]
    For,
    /// Keyword `foreach`
    #[token("foreach")]
    Foreach,
    /// Keyword `while`
    #[token("while")]
    While,
    /// Keyword `do`
    #[token("do")]
    Do,
    /// Keyword `break`
    #[token("break")]
    Break,
    /// Keyword `continue`
    #[token("continue")]
    Continue,

    // Expressions
    /// Keyword `new`
    #[token("new")]
    New,
    /// Keyword `this`
    #[token("this")]
    This,
    /// Keyword `null`
    #[token("null")]
    Null,
    /// Keyword `default`
    #[token("default")]
    Default,
    /// Keyword `nameof`
    #[token("nameof")]
    Nameof,
    /// Keyword `typeof`
    #[token("typeof")]
    Typeof,
    /// Boolean literal `true`
    #[token("true")]
    True,
    /// Boolean literal `false`
    #[token("false")]
    False,

    // === Operators ===

    // Arithmetic
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*`
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Operator `%`
    #[token("%")]
    Percent,
    /// Operator `++`
    #[token("++")]
    PlusPlus,
    /// Operator `--`
    #[token("--")]
    MinusMinus,

    // Comparison
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `!=`
    #[token("!=")]
    BangEq,
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `>`; `>>` is never a single token so nested generics close cleanly
    #[token(">")]
    Gt,
    /// Operator `>=`
    #[token(">=")]
    GtEq,

    // Logic and bits
    /// Operator `&&`
    #[token("&&")]
    AndAnd,
    /// Operator `||`
    #[token("||")]
    OrOr,
    /// Operator `!`
    #[token("!")]
    Bang,
    /// Operator `&`
    #[token("&")]
    Amp,
    /// Operator `|`
    #[token("|")]
    Pipe,
    /// Operator `^`
    #[token("^")]
    Caret,
    /// Operator `~`
    #[token("~")]
    Tilde,
    /// Operator `?`
    #[token("?")]
    Question,
    /// Operator `??`
    #[token("??")]
    QuestionQuestion,

    // Assignment
    /// Operator `=`
    #[token("=")]
    Eq,
    /// Operator `+=`
    #[token("+=")]
    PlusEq,
    /// Operator `-=`
    #[token("-=")]
    MinusEq,
    /// Operator `*=`
    #[token("*=")]
    StarEq,
    /// Operator `/=`
    #[token("/=")]
    SlashEq,
    /// Operator `%=`
    #[token("%=")]
    PercentEq,
    /// Operator `&=`
    #[token("&=")]
    AmpEq,
    /// Operator `|=`
    #[token("|=")]
    PipeEq,
    /// Operator `^=`
    #[token("^=")]
    CaretEq,

    // Other
    /// Operator `=>`
    #[token("=>")]
    FatArrow,
    /// Operator `:`
    #[token(":")]
    Colon,
    /// Operator `.`
    #[token(".")]
    Dot,
    /// Operator `,`
    #[token(",")]
    Comma,
    /// Operator `;`
    #[token(";")]
    Semicolon,

    // === Delimiters ===
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,
    /// Delimiter `{`
    #[token("{")]
    LBrace,
    /// Delimiter `}`
    #[token("}")]
    RBrace,
    /// Delimiter `[`
    #[token("[")]
    LBracket,
    /// Delimiter `]`
    #[token("]")]
    RBracket,

    // === Literals ===
    /// Integer literal with optional `u`/`l`/`ul` suffix, kept as source text.
    #[regex(r"[0-9]+([uU][lL]?|[lL][uU]?)?", |lex| Rc::from(lex.slice()))]
    #[regex(r"0[xX][0-9a-fA-F]+([uU][lL]?|[lL][uU]?)?", |lex| Rc::from(lex.slice()))]
    Integer(Rc<str>),

    /// Real literal (`1.5`, `2f`, `1e-3d`, `0.5m`), kept as source text.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?[fFdDmM]?", |lex| Rc::from(lex.slice()))]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+[fFdDmM]?", |lex| Rc::from(lex.slice()))]
    #[regex(r"[0-9]+[fFdDmM]", |lex| Rc::from(lex.slice()))]
    Real(Rc<str>),

    /// String literal; the payload is the unescaped content.
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1]).map(|s| Rc::from(s.as_str()))
    })]
    #[regex(r#"@"([^"]|"")*""#, |lex| {
        let s = lex.slice();
        Rc::from(s[2..s.len() - 1].replace("\"\"", "\"").as_str())
    })]
    String(Rc<str>),

    /// Character literal; the payload is the unescaped character.
    #[regex(r"'([^'\\\n]|\\.)'", |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1]).and_then(|s| s.chars().next())
    })]
    Char(char),

    /// Identifier, including built-in type names and contextual keywords.
    ///
    /// A leading `@` escapes a keyword (`@event`) and is dropped.
    #[regex(r"@?[a-zA-Z_][a-zA-Z0-9_]*", |lex| Rc::from(lex.slice().trim_start_matches('@')))]
    Ident(Rc<str>),
}

/// Unescape a string literal content.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                // Unsupported escape or trailing backslash
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

impl Token {
    /// Source text of a fixed token (keyword, operator, delimiter).
    ///
    /// Returns `None` for tokens that carry data.
    pub fn fixed_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Using => "using",
            Token::Namespace => "namespace",
            Token::Struct => "struct",
            Token::Class => "class",
            Token::Interface => "interface",
            Token::Public => "public",
            Token::Private => "private",
            Token::Protected => "protected",
            Token::Internal => "internal",
            Token::Static => "static",
            Token::Readonly => "readonly",
            Token::Partial => "partial",
            Token::Override => "override",
            Token::Virtual => "virtual",
            Token::Abstract => "abstract",
            Token::Sealed => "sealed",
            Token::Unsafe => "unsafe",
            Token::Const => "const",
            Token::Ref => "ref",
            Token::In => "in",
            Token::Out => "out",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::Foreach => "foreach",
            Token::While => "while",
            Token::Do => "do",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::New => "new",
            Token::This => "this",
            Token::Null => "null",
            Token::Default => "default",
            Token::Nameof => "nameof",
            Token::Typeof => "typeof",
            Token::True => "true",
            Token::False => "false",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Question => "?",
            Token::QuestionQuestion => "??",
            Token::Eq => "=",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::PercentEq => "%=",
            Token::AmpEq => "&=",
            Token::PipeEq => "|=",
            Token::CaretEq => "^=",
            Token::FatArrow => "=>",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Integer(_) | Token::Real(_) | Token::String(_) | Token::Char(_) | Token::Ident(_) => {
                return None;
            }
        };
        Some(text)
    }

    /// Whether this token is a declaration modifier keyword.
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Token::Public
                | Token::Private
                | Token::Protected
                | Token::Internal
                | Token::Static
                | Token::Readonly
                | Token::Partial
                | Token::Override
                | Token::Virtual
                | Token::Abstract
                | Token::Sealed
                | Token::Unsafe
                | Token::Const
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(text) | Token::Real(text) => write!(f, "{}", text),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Char(c) => write!(f, "'{}'", c),
            Token::Ident(id) => write!(f, "{}", id),
            other => write!(f, "{}", other.fixed_text().unwrap_or("?")),
        }
    }
}

/// Lex a whole source text into `(token, byte range)` pairs.
///
/// Invalid input is reported as the byte ranges that failed to lex; the
/// remaining tokens are still returned so callers can report every bad range
/// at once.
pub fn lex_with_spans(
    source: &str,
) -> (Vec<(Token, std::ops::Range<usize>)>, Vec<std::ops::Range<usize>>) {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut invalid = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => invalid.push(lexer.span()),
        }
    }
    (tokens, invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test helper: lex source and filter out errors.
    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source)
            .filter_map(|result| result.ok())
            .collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(Rc::from(s))
    }

    fn int(s: &str) -> Token {
        Token::Integer(Rc::from(s))
    }

    fn real(s: &str) -> Token {
        Token::Real(Rc::from(s))
    }

    #[test]
    fn test_keywords() {
        let tokens = lex("using namespace struct class ref in out");
        assert_eq!(
            tokens,
            vec![
                Token::Using,
                Token::Namespace,
                Token::Struct,
                Token::Class,
                Token::Ref,
                Token::In,
                Token::Out,
            ]
        );
    }

    #[test]
    fn test_builtin_types_are_identifiers() {
        let tokens = lex("int float var void");
        assert_eq!(
            tokens,
            vec![ident("int"), ident("float"), ident("var"), ident("void")]
        );
    }

    #[test]
    fn test_numbers_keep_source_text() {
        let tokens = lex("42 3.14 2f 1.5f 1e3 0.5d 7u 0xFF");
        assert_eq!(
            tokens,
            vec![
                int("42"),
                real("3.14"),
                real("2f"),
                real("1.5f"),
                real("1e3"),
                real("0.5d"),
                int("7u"),
                int("0xFF"),
            ]
        );
    }

    #[test]
    fn test_strings_and_chars() {
        let tokens = lex(r#""Move\n" @"a""b" 'c'"#);
        assert_eq!(
            tokens,
            vec![
                Token::String(Rc::from("Move\n")),
                Token::String(Rc::from("a\"b")),
                Token::Char('c'),
            ]
        );
    }

    #[test]
    fn test_lambda_header() {
        let tokens = lex("(ref Translation t, in Velocity v) =>");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Ref,
                ident("Translation"),
                ident("t"),
                Token::Comma,
                Token::In,
                ident("Velocity"),
                ident("v"),
                Token::RParen,
                Token::FatArrow,
            ]
        );
    }

    #[test]
    fn test_nested_generic_closes_with_two_tokens() {
        let tokens = lex("A<B<C>>");
        assert_eq!(
            tokens,
            vec![
                ident("A"),
                Token::Lt,
                ident("B"),
                Token::Lt,
                ident("C"),
                Token::Gt,
                Token::Gt,
            ]
        );
    }

    #[test]
    fn test_compound_assignment() {
        let tokens = lex("a += b; c++; --d;");
        assert_eq!(
            tokens,
            vec![
                ident("a"),
                Token::PlusEq,
                ident("b"),
                Token::Semicolon,
                ident("c"),
                Token::PlusPlus,
                Token::Semicolon,
                Token::MinusMinus,
                ident("d"),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_comments_and_preprocessor_are_skipped() {
        let source = "// line\n/// doc\n/* block\n */ #region Foo\nclass";
        assert_eq!(lex(source), vec![Token::Class]);
    }

    #[test]
    fn test_verbatim_identifier() {
        assert_eq!(lex("@class"), vec![ident("class")]);
    }

    #[test]
    fn test_lexer_error_detection() {
        let (tokens, invalid) = lex_with_spans("a $ b");
        assert_eq!(tokens.len(), 2);
        assert_eq!(invalid, vec![2..3]);
    }

    #[test]
    fn test_display_round_trips_fixed_tokens() {
        assert_eq!(Token::FatArrow.to_string(), "=>");
        assert_eq!(Token::Foreach.to_string(), "foreach");
        assert_eq!(Token::PipeEq.to_string(), "|=");
        assert_eq!(real("1.5f").to_string(), "1.5f");
    }
}
