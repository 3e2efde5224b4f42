//! Lexer for the query language using Logos.
//!
//! Clause keywords (`FROM`, `AS`, `WHERE`, `SELECT`) match in any ASCII case.
//! `predicate` and the literal keywords are lowercase only.

use logos::Logos;
use std::fmt;

use crate::Span;

/// Token types produced by the Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token<'src> {
    // ===== Keywords =====
    /// The `FROM` clause keyword.
    #[token("from", ignore(ascii_case))]
    From,
    /// The `AS` keyword inside a select item.
    #[token("as", ignore(ascii_case))]
    As,
    /// The `WHERE` clause keyword.
    #[token("where", ignore(ascii_case))]
    Where,
    /// The `SELECT` clause keyword.
    #[token("select", ignore(ascii_case))]
    Select,
    /// The `predicate` declaration keyword.
    #[token("predicate")]
    Predicate,
    /// The `true` literal.
    #[token("true")]
    True,
    /// The `false` literal.
    #[token("false")]
    False,
    /// The `null` literal.
    #[token("null")]
    Null,

    // ===== Literals =====
    /// An identifier: entity type, alias, attribute or method name.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'src str),

    /// An unsigned decimal number. Negation is the unary `-` operator.
    #[regex(r"\d+(\.\d+)?")]
    Number(&'src str),

    /// A double-quoted string (handles escape sequences).
    /// The slice includes the quotes.
    #[regex(r#""([^"\\]|\\.)*""#)]
    String(&'src str),

    // ===== Punctuation =====
    /// Left parenthesis `(`.
    #[token("(")]
    LParen,
    /// Right parenthesis `)`.
    #[token(")")]
    RParen,
    /// Left brace `{` opening a predicate body.
    #[token("{")]
    LBrace,
    /// Right brace `}` closing a predicate body.
    #[token("}")]
    RBrace,
    /// Comma `,` separator.
    #[token(",")]
    Comma,
    /// Semicolon `;` after a predicate declaration.
    #[token(";")]
    Semicolon,
    /// Dot `.` path separator.
    #[token(".")]
    Dot,

    // ===== Operators =====
    // Longer tokens first
    /// Logical or `||`.
    #[token("||")]
    OrOr,
    /// Logical and `&&`.
    #[token("&&")]
    AndAnd,
    /// Equality `==`.
    #[token("==")]
    EqEq,
    /// Inequality `!=`.
    #[token("!=")]
    NotEq,
    /// Less than or equal `<=`.
    #[token("<=")]
    LtEq,
    /// Greater than or equal `>=`.
    #[token(">=")]
    GtEq,
    /// Less than `<`.
    #[token("<")]
    Lt,
    /// Greater than `>`.
    #[token(">")]
    Gt,
    /// Plus `+`.
    #[token("+")]
    Plus,
    /// Minus `-`.
    #[token("-")]
    Minus,
    /// Star `*`.
    #[token("*")]
    Star,
    /// Slash `/`.
    #[token("/")]
    Slash,
    /// Percent `%`.
    #[token("%")]
    Percent,
    /// Logical not `!`.
    #[token("!")]
    Bang,

    /// Error token for unrecognized input.
    Error,
}

impl Token<'_> {
    /// Returns true if this token starts a clause and is used for error recovery.
    pub const fn is_clause_keyword(&self) -> bool {
        matches!(
            self,
            Self::Predicate | Self::From | Self::Where | Self::Select
        )
    }

    /// Returns true if this token can name a member after `.`.
    ///
    /// Keywords are reserved only at the start of a path, so `c.as` and
    /// `m.select` are ordinary attribute paths.
    pub const fn is_word(&self) -> bool {
        matches!(
            self,
            Self::Ident(_)
                | Self::From
                | Self::As
                | Self::Where
                | Self::Select
                | Self::Predicate
                | Self::True
                | Self::False
                | Self::Null
        )
    }

    /// Returns true if this token is a literal value.
    pub const fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::Number(_) | Self::True | Self::False | Self::Null
        )
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From => write!(f, "FROM"),
            Self::As => write!(f, "AS"),
            Self::Where => write!(f, "WHERE"),
            Self::Select => write!(f, "SELECT"),
            Self::Predicate => write!(f, "predicate"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Null => write!(f, "null"),
            Self::Ident(s) | Self::Number(s) | Self::String(s) => write!(f, "{s}"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::LBrace => write!(f, "{{"),
            Self::RBrace => write!(f, "}}"),
            Self::Comma => write!(f, ","),
            Self::Semicolon => write!(f, ";"),
            Self::Dot => write!(f, "."),
            Self::OrOr => write!(f, "||"),
            Self::AndAnd => write!(f, "&&"),
            Self::EqEq => write!(f, "=="),
            Self::NotEq => write!(f, "!="),
            Self::LtEq => write!(f, "<="),
            Self::GtEq => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Gt => write!(f, ">"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Bang => write!(f, "!"),
            Self::Error => write!(f, "<error>"),
        }
    }
}

/// Tokenize source code into a vector of (Token, Span) pairs.
///
/// Unrecognized input is kept in the stream as [`Token::Error`].
pub fn tokenize(source: &str) -> Vec<(Token<'_>, Span)> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = Span::from(lexer.span());
        tokens.push((result.unwrap_or(Token::Error), span));
    }

    tokens
}

/// Decode a string token's slice (quotes included) into its value.
///
/// Unknown escapes keep the escaped character.
pub fn unescape(quoted: &str) -> String {
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(quoted);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
