//! Query-language front end for pathql.
//!
//! This crate tokenizes and parses queries of the shape
//!
//! ```text
//! [predicate name(type ident, ...) { expr };]*
//! FROM entity AS alias[, entity AS alias]*
//! [WHERE expr]
//! SELECT projection[, projection]*
//! ```
//!
//! into a concrete syntax tree whose nodes are grammar productions. Consumers
//! traverse the tree as an ordered stream of enter/exit events through
//! [`walk`] and a [`Listener`].
//!
//! # Features
//!
//! - Logos lexer with case-insensitive clause keywords
//! - Error recovery at clause boundaries (every broken clause is reported)
//! - `line:column` locations on every syntax error
//!
//! # Example
//!
//! ```
//! use pathql_parser::{parse, Production};
//!
//! let tree = parse("FROM method AS m WHERE m.name == \"main\" SELECT m").unwrap();
//! assert_eq!(tree.production, Production::Query);
//! assert!(tree.child(Production::WhereClause).is_some());
//!
//! let errors = parse("FROM method AS SELECT m").unwrap_err();
//! assert_eq!(errors.to_string(), "1:15: unexpected 'SELECT', expected alias");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod logos_lexer;
mod parser;
mod span;
mod syntax;
mod walker;

pub use error::{ParseError, ParseErrorKind, SyntaxErrors};
pub use logos_lexer::Token;
pub use span::Span;
pub use syntax::{
    BinaryOperator, Production, SyntaxElement, SyntaxNode, SyntaxToken, UnaryOperator,
};
pub use walker::{walk, Listener, ParseEvent};

/// Parse a query.
///
/// Returns the `query` node, or the complete batch of syntax errors.
pub fn parse(source: &str) -> Result<SyntaxNode<'_>, SyntaxErrors> {
    parser::Parser::new(source).parse_query()
}

/// Parse a standalone expression.
///
/// The whole input must be one expression. Returns the `expression` node.
pub fn parse_expression(source: &str) -> Result<SyntaxNode<'_>, SyntaxErrors> {
    parser::Parser::new(source).parse_expression()
}
