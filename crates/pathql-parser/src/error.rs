//! Parse error types.

use crate::Span;
use std::fmt;
use thiserror::Error;

/// A parse error with location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// The span where the error occurred.
    pub span: Span,
    /// Line of the span start (1-based).
    pub line: usize,
    /// Column of the span start (0-based, in characters).
    pub column: usize,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl ParseError {
    /// Create a new parse error, locating `span` in `source`.
    #[must_use]
    pub fn new(kind: ParseErrorKind, span: Span, source: &str) -> Self {
        let (line, column) = span.location(source);
        Self {
            kind,
            span,
            line,
            column,
            hint: None,
        }
    }

    /// Add a hint for fixing this error.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Get a short label for the error.
    #[must_use]
    pub const fn label(&self) -> &str {
        match &self.kind {
            ParseErrorKind::UnrecognizedInput(_) => "unrecognized input",
            ParseErrorKind::UnclosedString => "unclosed string",
            ParseErrorKind::Unexpected { .. } => "unexpected token",
            ParseErrorKind::UnexpectedEof { .. } => "unexpected end of input",
            ParseErrorKind::TrailingInput(_) => "trailing input",
        }
    }

    /// Numeric code of the error kind.
    #[must_use]
    pub const fn kind_code(&self) -> u32 {
        match &self.kind {
            ParseErrorKind::UnrecognizedInput(_) => 1,
            ParseErrorKind::UnclosedString => 2,
            ParseErrorKind::Unexpected { .. } => 3,
            ParseErrorKind::UnexpectedEof { .. } => 4,
            ParseErrorKind::TrailingInput(_) => 5,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.kind)
    }
}

impl std::error::Error for ParseError {}

/// Kinds of parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Input the lexer does not recognize.
    #[error("unrecognized input '{0}'")]
    UnrecognizedInput(String),
    /// A string literal without its closing quote.
    #[error("unclosed string literal")]
    UnclosedString,
    /// A token other than the one the grammar allows here.
    #[error("unexpected '{found}', expected {expected}")]
    Unexpected {
        /// Text of the offending token.
        found: String,
        /// What the grammar allows at this point.
        expected: String,
    },
    /// Input ended while the grammar required more.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What the grammar allows at this point.
        expected: String,
    },
    /// Tokens after the SELECT clause.
    #[error("unexpected '{0}' after SELECT clause")]
    TrailingInput(String),
}

/// A non-empty batch of syntax errors for one source text.
///
/// Each error displays as `line:column: message`, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxErrors {
    errors: Vec<ParseError>,
}

impl SyntaxErrors {
    pub(crate) const fn new(errors: Vec<ParseError>) -> Self {
        Self { errors }
    }

    /// The errors, in source order.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.errors.iter()
    }

    /// Number of errors in the batch.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume the batch into its errors.
    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}

impl fmt::Display for SyntaxErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxErrors {}

impl<'a> IntoIterator for &'a SyntaxErrors {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_location() {
        let source = "FROM class AS c\nSELECT ?";
        let err = ParseError::new(
            ParseErrorKind::UnrecognizedInput("?".to_string()),
            Span::new(23, 24),
            source,
        );
        assert_eq!((err.line, err.column), (2, 7));
        assert_eq!(err.to_string(), "2:7: unrecognized input '?'");
    }

    #[test]
    fn test_parse_error_with_hint() {
        let err = ParseError::new(ParseErrorKind::UnclosedString, Span::new(0, 1), "\"")
            .with_hint("close the string with '\"'");
        assert!(err.hint.is_some());
        assert_eq!(err.label(), "unclosed string");
    }

    #[test]
    fn test_error_messages() {
        let test_cases = [
            (
                ParseErrorKind::Unexpected {
                    found: ")".to_string(),
                    expected: "expression".to_string(),
                },
                "unexpected ')', expected expression",
            ),
            (
                ParseErrorKind::UnexpectedEof {
                    expected: "SELECT".to_string(),
                },
                "unexpected end of input, expected SELECT",
            ),
            (
                ParseErrorKind::TrailingInput("x".to_string()),
                "unexpected 'x' after SELECT clause",
            ),
        ];

        for (kind, expected) in test_cases {
            assert_eq!(kind.to_string(), expected);
        }
    }

    #[test]
    fn test_syntax_errors_display_one_per_line() {
        let source = "a\nb";
        let errors = SyntaxErrors::new(vec![
            ParseError::new(ParseErrorKind::TrailingInput("a".into()), Span::new(0, 1), source),
            ParseError::new(ParseErrorKind::TrailingInput("b".into()), Span::new(2, 3), source),
        ]);
        assert_eq!(
            errors.to_string(),
            "1:0: unexpected 'a' after SELECT clause\n2:0: unexpected 'b' after SELECT clause"
        );
        assert_eq!(errors.len(), 2);
    }
}
