//! Concrete syntax tree.
//!
//! Every grammar production the parser enters becomes a [`SyntaxNode`], even
//! when it only passes a single operand through (an `and_expression` with no
//! `&&` still appears between `or_expression` and `equality_expression`).
//! Consumers decide what a node means by its [`Production`] and by whether it
//! carries operator tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::logos_lexer::Token;
use crate::Span;

/// Grammar productions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Production {
    /// A whole query.
    Query,
    /// `predicate name(type ident, ...) { expression }`.
    PredicateDeclaration,
    /// `type ident` inside a predicate declaration.
    Parameter,
    /// `FROM entity AS alias, ...`.
    FromClause,
    /// `entity AS alias`.
    SelectItem,
    /// `WHERE expression`.
    WhereClause,
    /// Top of the expression precedence chain.
    Expression,
    /// `a || b`.
    OrExpression,
    /// `a && b`.
    AndExpression,
    /// `a == b`, `a != b`.
    EqualityExpression,
    /// `a < b`, `a > b`, `a <= b`, `a >= b`.
    RelationalExpression,
    /// `a + b`, `a - b`.
    AdditiveExpression,
    /// `a * b`, `a / b`, `a % b`.
    MultiplicativeExpression,
    /// `!a`, `-a`.
    UnaryExpression,
    /// Parenthesised expression, call, path or literal.
    Primary,
    /// `name(arg, ...)`.
    PredicateInvocation,
    /// `alias.member(...)...` with at least one call.
    MethodChain,
    /// `alias.attribute...` without calls.
    Variable,
    /// One call argument.
    Argument,
    /// String, number, boolean or null literal.
    Value,
    /// `SELECT projection, ...`.
    SelectClause,
    /// One projection.
    SelectExpression,
}

impl Production {
    /// Name of the production as written in the grammar.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::PredicateDeclaration => "predicate_declaration",
            Self::Parameter => "parameter",
            Self::FromClause => "from_clause",
            Self::SelectItem => "select_item",
            Self::WhereClause => "where_clause",
            Self::Expression => "expression",
            Self::OrExpression => "or_expression",
            Self::AndExpression => "and_expression",
            Self::EqualityExpression => "equality_expression",
            Self::RelationalExpression => "relational_expression",
            Self::AdditiveExpression => "additive_expression",
            Self::MultiplicativeExpression => "multiplicative_expression",
            Self::UnaryExpression => "unary_expression",
            Self::Primary => "primary",
            Self::PredicateInvocation => "predicate_invocation",
            Self::MethodChain => "method_chain",
            Self::Variable => "variable",
            Self::Argument => "argument",
            Self::Value => "value",
            Self::SelectClause => "select_clause",
            Self::SelectExpression => "select_expression",
        }
    }

    /// Returns true for the binary-operator levels of the precedence chain.
    pub const fn is_binary_level(self) -> bool {
        matches!(
            self,
            Self::OrExpression
                | Self::AndExpression
                | Self::EqualityExpression
                | Self::RelationalExpression
                | Self::AdditiveExpression
                | Self::MultiplicativeExpression
        )
    }

    /// Returns true for the comparison levels (equality and relational).
    pub const fn is_comparison_level(self) -> bool {
        matches!(self, Self::EqualityExpression | Self::RelationalExpression)
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// `||`
    Or,
    /// `&&`
    And,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

impl BinaryOperator {
    /// The operator a token stands for in binary position.
    pub const fn from_token(token: &Token<'_>) -> Option<Self> {
        Some(match token {
            Token::OrOr => Self::Or,
            Token::AndAnd => Self::And,
            Token::EqEq => Self::Eq,
            Token::NotEq => Self::NotEq,
            Token::Lt => Self::Lt,
            Token::Gt => Self::Gt,
            Token::LtEq => Self::LtEq,
            Token::GtEq => Self::GtEq,
            Token::Plus => Self::Add,
            Token::Minus => Self::Sub,
            Token::Star => Self::Mul,
            Token::Slash => Self::Div,
            Token::Percent => Self::Rem,
            _ => return None,
        })
    }

    /// Source spelling of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }

    /// Binding power; higher binds tighter.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq => 3,
            Self::Lt | Self::Gt | Self::LtEq | Self::GtEq => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }

    /// `&&` and `||`.
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::Or | Self::And)
    }

    /// Equality and relational operators.
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::Gt | Self::LtEq | Self::GtEq
        )
    }

    /// Arithmetic operators.
    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// `!`
    Not,
    /// `-`
    Neg,
}

impl UnaryOperator {
    /// The operator a token stands for in prefix position.
    pub const fn from_token(token: &Token<'_>) -> Option<Self> {
        match token {
            Token::Bang => Some(Self::Not),
            Token::Minus => Some(Self::Neg),
            _ => None,
        }
    }

    /// Source spelling of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token in the syntax tree with its exact source slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxToken<'src> {
    /// Token kind.
    pub kind: Token<'src>,
    /// Source text of the token.
    pub text: &'src str,
    /// Source span.
    pub span: Span,
}

/// A child of a [`SyntaxNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxElement<'src> {
    /// A nested production.
    Node(SyntaxNode<'src>),
    /// A token.
    Token(SyntaxToken<'src>),
}

/// A production instance with its ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode<'src> {
    /// Production this node was parsed as.
    pub production: Production,
    /// Source span covering every child.
    pub span: Span,
    /// Children in source order.
    pub children: Vec<SyntaxElement<'src>>,
}

impl<'src> SyntaxNode<'src> {
    pub(crate) fn new(production: Production, children: Vec<SyntaxElement<'src>>) -> Self {
        let span = children
            .iter()
            .map(SyntaxElement::span)
            .reduce(|a, b| a.merge(&b))
            .unwrap_or_default();
        Self {
            production,
            span,
            children,
        }
    }

    /// Child nodes in order.
    pub fn nodes(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|child| match child {
            SyntaxElement::Node(node) => Some(node),
            SyntaxElement::Token(_) => None,
        })
    }

    /// Direct child tokens in order.
    pub fn tokens(&self) -> impl Iterator<Item = &SyntaxToken<'src>> {
        self.children.iter().filter_map(|child| match child {
            SyntaxElement::Token(token) => Some(token),
            SyntaxElement::Node(_) => None,
        })
    }

    /// First child node of the given production.
    pub fn child(&self, production: Production) -> Option<&Self> {
        self.nodes().find(|n| n.production == production)
    }

    /// Binary operators among the direct child tokens.
    ///
    /// Empty for a pass-through level of the precedence chain.
    pub fn operators(&self) -> Vec<BinaryOperator> {
        if !self.production.is_binary_level() {
            return Vec::new();
        }
        self.tokens()
            .filter_map(|t| BinaryOperator::from_token(&t.kind))
            .collect()
    }

    /// Prefix operator of a `unary_expression`, if any.
    pub fn unary_operator(&self) -> Option<UnaryOperator> {
        if self.production != Production::UnaryExpression {
            return None;
        }
        self.tokens()
            .next()
            .and_then(|t| UnaryOperator::from_token(&t.kind))
    }

    /// Number of child nodes.
    pub fn operand_count(&self) -> usize {
        self.nodes().count()
    }

    /// Every token under this node, in source order.
    pub fn descendant_tokens(&self) -> Vec<&SyntaxToken<'src>> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a SyntaxToken<'src>>) {
        for child in &self.children {
            match child {
                SyntaxElement::Node(node) => node.collect_tokens(out),
                SyntaxElement::Token(token) => out.push(token),
            }
        }
    }

    /// Token texts concatenated without whitespace.
    pub fn compact_text(&self) -> String {
        self.descendant_tokens().iter().map(|t| t.text).collect()
    }

    /// Exact source text of this node.
    pub fn source_text<'s>(&self, source: &'s str) -> &'s str {
        self.span.text(source)
    }

    /// Descend through single-child pass-through nodes to the innermost one.
    ///
    /// Stops at a node with operators, several children, or tokens.
    pub fn innermost(&self) -> &Self {
        let mut node = self;
        while node.children.len() == 1 {
            match &node.children[0] {
                SyntaxElement::Node(inner) => node = inner,
                SyntaxElement::Token(_) => break,
            }
        }
        node
    }
}

impl SyntaxElement<'_> {
    /// Source span of the element.
    pub const fn span(&self) -> Span {
        match self {
            Self::Node(node) => node.span,
            Self::Token(token) => token.span,
        }
    }
}

impl fmt::Display for SyntaxNode<'_> {
    /// S-expression rendering, for debugging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.production)?;
        for child in &self.children {
            match child {
                SyntaxElement::Node(node) => write!(f, " {node}")?,
                SyntaxElement::Token(token) => write!(f, " {}", token.text)?,
            }
        }
        write!(f, ")")
    }
}
