//! Recursive-descent parser over the Logos token stream.
//!
//! Every production the parser enters becomes a [`SyntaxNode`]; the expression
//! levels mirror the precedence chain one-to-one. On a syntax error the parser
//! records it and skips to the next clause keyword (`predicate`, `FROM`,
//! `WHERE`, `SELECT`) or end of input, so a single run reports every clause
//! that is broken.

use crate::error::{ParseError, ParseErrorKind, SyntaxErrors};
use crate::logos_lexer::{tokenize, Token};
use crate::syntax::{Production, SyntaxElement, SyntaxNode, SyntaxToken};
use crate::Span;

type PResult<T> = Result<T, ParseError>;

/// Shape of an identifier-led primary, decided by lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathShape {
    Invocation,
    MethodChain,
    Variable,
}

pub(crate) struct Parser<'src> {
    source: &'src str,
    tokens: Vec<SyntaxToken<'src>>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for (kind, span) in tokenize(source) {
            let text = span.text(source);
            if kind == Token::Error {
                let error_kind = if text.starts_with('"') {
                    ParseErrorKind::UnclosedString
                } else {
                    ParseErrorKind::UnrecognizedInput(text.to_string())
                };
                errors.push(ParseError::new(error_kind, span, source));
            } else {
                tokens.push(SyntaxToken { kind, text, span });
            }
        }

        Self {
            source,
            tokens,
            pos: 0,
            errors,
        }
    }

    /// Parse a whole query.
    pub(crate) fn parse_query(mut self) -> Result<SyntaxNode<'src>, SyntaxErrors> {
        let mut children = Vec::new();

        while self.check(&Token::Predicate) {
            match self.predicate_declaration() {
                Ok(node) => children.push(SyntaxElement::Node(node)),
                Err(err) => self.recover(err),
            }
        }

        match self.from_clause() {
            Ok(node) => children.push(SyntaxElement::Node(node)),
            Err(err) => self.recover(err),
        }

        if self.check(&Token::Where) {
            match self.where_clause() {
                Ok(node) => children.push(SyntaxElement::Node(node)),
                Err(err) => self.recover(err),
            }
        }

        match self.select_clause() {
            Ok(node) => children.push(SyntaxElement::Node(node)),
            Err(err) => self.recover(err),
        }

        if let Some(&token) = self.peek() {
            self.errors.push(ParseError::new(
                ParseErrorKind::TrailingInput(token.text.to_string()),
                token.span,
                self.source,
            ));
        }

        self.finish(SyntaxNode::new(Production::Query, children))
    }

    /// Parse a standalone expression covering the whole input.
    pub(crate) fn parse_expression(mut self) -> Result<SyntaxNode<'src>, SyntaxErrors> {
        match self.expression() {
            Ok(node) => {
                if self.peek().is_some() {
                    let err = self.error_here("end of expression");
                    self.errors.push(err);
                }
                self.finish(node)
            }
            Err(err) => {
                self.errors.push(err);
                self.finish(SyntaxNode::new(Production::Expression, Vec::new()))
            }
        }
    }

    fn finish(mut self, node: SyntaxNode<'src>) -> Result<SyntaxNode<'src>, SyntaxErrors> {
        if self.errors.is_empty() {
            Ok(node)
        } else {
            self.errors.sort_by_key(|e| e.span.start);
            Err(SyntaxErrors::new(self.errors))
        }
    }

    /// Record `err` and skip to the next clause keyword or end of input.
    fn recover(&mut self, err: ParseError) {
        self.errors.push(err);
        while let Some(token) = self.peek() {
            if token.kind.is_clause_keyword() {
                break;
            }
            self.pos += 1;
        }
    }

    // ===== Token helpers =====

    fn peek(&self) -> Option<&SyntaxToken<'src>> {
        self.tokens.get(self.pos)
    }

    fn kind_at(&self, index: usize) -> Option<Token<'src>> {
        self.tokens.get(index).map(|t| t.kind)
    }

    fn check(&self, kind: &Token<'src>) -> bool {
        self.peek()
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    fn eof_span(&self) -> Span {
        Span::new(self.source.len(), self.source.len())
    }

    fn error_here(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::new(
                ParseErrorKind::Unexpected {
                    found: token.text.to_string(),
                    expected: expected.to_string(),
                },
                token.span,
                self.source,
            ),
            None => ParseError::new(
                ParseErrorKind::UnexpectedEof {
                    expected: expected.to_string(),
                },
                self.eof_span(),
                self.source,
            ),
        }
    }

    fn advance(&mut self, expected: &str) -> PResult<SyntaxToken<'src>> {
        let token = *self.peek().ok_or_else(|| self.error_here(expected))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: &Token<'src>, expected: &str) -> PResult<SyntaxToken<'src>> {
        if self.check(kind) {
            self.advance(expected)
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> PResult<SyntaxToken<'src>> {
        self.expect(&Token::Ident(""), expected)
    }

    /// An identifier or keyword naming a member after `.`.
    fn expect_member(&mut self, expected: &str) -> PResult<SyntaxToken<'src>> {
        if self.peek().is_some_and(|t| t.kind.is_word()) {
            self.advance(expected)
        } else {
            Err(self.error_here(expected))
        }
    }

    // ===== Clauses =====

    fn predicate_declaration(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![SyntaxElement::Token(
            self.expect(&Token::Predicate, "'predicate'")?,
        )];
        children.push(SyntaxElement::Token(self.expect_ident("predicate name")?));
        children.push(SyntaxElement::Token(self.expect(&Token::LParen, "'('")?));

        if !self.check(&Token::RParen) {
            loop {
                children.push(SyntaxElement::Node(self.parameter()?));
                if !self.check(&Token::Comma) {
                    break;
                }
                children.push(SyntaxElement::Token(self.advance("','")?));
            }
        }

        children.push(SyntaxElement::Token(
            self.expect(&Token::RParen, "')' or ','")?,
        ));
        children.push(SyntaxElement::Token(self.expect(&Token::LBrace, "'{'")?));
        children.push(SyntaxElement::Node(self.expression()?));
        children.push(SyntaxElement::Token(self.expect(&Token::RBrace, "'}'")?));

        if self.check(&Token::Semicolon) {
            children.push(SyntaxElement::Token(self.advance("';'")?));
        }

        Ok(SyntaxNode::new(Production::PredicateDeclaration, children))
    }

    fn parameter(&mut self) -> PResult<SyntaxNode<'src>> {
        let param_type = self.expect_ident("parameter type")?;
        let name = self.expect_ident("parameter name")?;
        Ok(SyntaxNode::new(
            Production::Parameter,
            vec![SyntaxElement::Token(param_type), SyntaxElement::Token(name)],
        ))
    }

    fn from_clause(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![SyntaxElement::Token(self.expect(&Token::From, "FROM")?)];
        children.push(SyntaxElement::Node(self.select_item()?));
        while self.check(&Token::Comma) {
            children.push(SyntaxElement::Token(self.advance("','")?));
            children.push(SyntaxElement::Node(self.select_item()?));
        }
        Ok(SyntaxNode::new(Production::FromClause, children))
    }

    fn select_item(&mut self) -> PResult<SyntaxNode<'src>> {
        let entity = self.expect_ident("entity name")?;
        let as_token = self.expect(&Token::As, "AS")?;
        let alias = self.expect_ident("alias")?;
        Ok(SyntaxNode::new(
            Production::SelectItem,
            vec![
                SyntaxElement::Token(entity),
                SyntaxElement::Token(as_token),
                SyntaxElement::Token(alias),
            ],
        ))
    }

    fn where_clause(&mut self) -> PResult<SyntaxNode<'src>> {
        let keyword = self.expect(&Token::Where, "WHERE")?;
        let expression = self.expression()?;
        Ok(SyntaxNode::new(
            Production::WhereClause,
            vec![
                SyntaxElement::Token(keyword),
                SyntaxElement::Node(expression),
            ],
        ))
    }

    fn select_clause(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![SyntaxElement::Token(
            self.expect(&Token::Select, "SELECT")?,
        )];
        children.push(SyntaxElement::Node(self.select_expression()?));
        while self.check(&Token::Comma) {
            children.push(SyntaxElement::Token(self.advance("','")?));
            children.push(SyntaxElement::Node(self.select_expression()?));
        }
        Ok(SyntaxNode::new(Production::SelectClause, children))
    }

    fn select_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        let inner = match self.kind_at(self.pos) {
            Some(Token::Ident(_)) => match self.classify_path() {
                PathShape::MethodChain => self.method_chain()?,
                PathShape::Variable => self.variable()?,
                PathShape::Invocation => return Err(self.error_here("projection")),
            },
            Some(kind) if kind.is_literal() => self.value()?,
            _ => return Err(self.error_here("projection")),
        };
        Ok(SyntaxNode::new(
            Production::SelectExpression,
            vec![SyntaxElement::Node(inner)],
        ))
    }

    // ===== Expressions =====

    fn expression(&mut self) -> PResult<SyntaxNode<'src>> {
        let inner = self.or_expression()?;
        Ok(SyntaxNode::new(
            Production::Expression,
            vec![SyntaxElement::Node(inner)],
        ))
    }

    /// One binary precedence level: `next (op next)*`.
    fn binary_level(
        &mut self,
        production: Production,
        operators: &[Token<'src>],
        next: fn(&mut Self) -> PResult<SyntaxNode<'src>>,
    ) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![SyntaxElement::Node(next(self)?)];
        while let Some(&token) = self.peek() {
            if !operators.contains(&token.kind) {
                break;
            }
            self.pos += 1;
            children.push(SyntaxElement::Token(token));
            children.push(SyntaxElement::Node(next(self)?));
        }
        Ok(SyntaxNode::new(production, children))
    }

    fn or_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        self.binary_level(Production::OrExpression, &[Token::OrOr], Self::and_expression)
    }

    fn and_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        self.binary_level(
            Production::AndExpression,
            &[Token::AndAnd],
            Self::equality_expression,
        )
    }

    fn equality_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        self.binary_level(
            Production::EqualityExpression,
            &[Token::EqEq, Token::NotEq],
            Self::relational_expression,
        )
    }

    fn relational_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        self.binary_level(
            Production::RelationalExpression,
            &[Token::Lt, Token::Gt, Token::LtEq, Token::GtEq],
            Self::additive_expression,
        )
    }

    fn additive_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        self.binary_level(
            Production::AdditiveExpression,
            &[Token::Plus, Token::Minus],
            Self::multiplicative_expression,
        )
    }

    fn multiplicative_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        self.binary_level(
            Production::MultiplicativeExpression,
            &[Token::Star, Token::Slash, Token::Percent],
            Self::unary_expression,
        )
    }

    fn unary_expression(&mut self) -> PResult<SyntaxNode<'src>> {
        if let Some(&token) = self.peek() {
            if matches!(token.kind, Token::Bang | Token::Minus) {
                self.pos += 1;
                let operand = self.unary_expression()?;
                return Ok(SyntaxNode::new(
                    Production::UnaryExpression,
                    vec![SyntaxElement::Token(token), SyntaxElement::Node(operand)],
                ));
            }
        }
        let primary = self.primary()?;
        Ok(SyntaxNode::new(
            Production::UnaryExpression,
            vec![SyntaxElement::Node(primary)],
        ))
    }

    fn primary(&mut self) -> PResult<SyntaxNode<'src>> {
        let Some(&token) = self.peek() else {
            return Err(self.error_here("expression"));
        };

        let inner = match token.kind {
            Token::LParen => {
                self.pos += 1;
                let expression = self.expression()?;
                let close = self.expect(&Token::RParen, "')'")?;
                return Ok(SyntaxNode::new(
                    Production::Primary,
                    vec![
                        SyntaxElement::Token(token),
                        SyntaxElement::Node(expression),
                        SyntaxElement::Token(close),
                    ],
                ));
            }
            Token::Ident(_) => match self.classify_path() {
                PathShape::Invocation => self.predicate_invocation()?,
                PathShape::MethodChain => self.method_chain()?,
                PathShape::Variable => self.variable()?,
            },
            kind if kind.is_literal() => self.value()?,
            _ => return Err(self.error_here("expression")),
        };

        Ok(SyntaxNode::new(
            Production::Primary,
            vec![SyntaxElement::Node(inner)],
        ))
    }

    /// Decide what an identifier at the cursor starts.
    ///
    /// `name(` is an invocation, a dotted path with a `(` anywhere along it is
    /// a method chain, anything else is a variable.
    fn classify_path(&self) -> PathShape {
        let mut index = self.pos;
        let mut dotted = false;
        loop {
            match self.kind_at(index + 1) {
                Some(Token::LParen) if dotted => return PathShape::MethodChain,
                Some(Token::LParen) => return PathShape::Invocation,
                Some(Token::Dot) if self.kind_at(index + 2).is_some_and(|k| k.is_word()) => {
                    dotted = true;
                    index += 2;
                }
                _ => return PathShape::Variable,
            }
        }
    }

    fn predicate_invocation(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![SyntaxElement::Token(self.expect_ident("predicate name")?)];
        self.call_arguments(&mut children)?;
        Ok(SyntaxNode::new(Production::PredicateInvocation, children))
    }

    fn method_chain(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![SyntaxElement::Token(self.expect_ident("identifier")?)];
        while self.check(&Token::Dot) {
            children.push(SyntaxElement::Token(self.advance("'.'")?));
            children.push(SyntaxElement::Token(self.expect_member("member name")?));
            if self.check(&Token::LParen) {
                self.call_arguments(&mut children)?;
            }
        }
        Ok(SyntaxNode::new(Production::MethodChain, children))
    }

    fn call_arguments(&mut self, children: &mut Vec<SyntaxElement<'src>>) -> PResult<()> {
        children.push(SyntaxElement::Token(self.expect(&Token::LParen, "'('")?));
        if !self.check(&Token::RParen) {
            loop {
                let expression = self.expression()?;
                children.push(SyntaxElement::Node(SyntaxNode::new(
                    Production::Argument,
                    vec![SyntaxElement::Node(expression)],
                )));
                if !self.check(&Token::Comma) {
                    break;
                }
                children.push(SyntaxElement::Token(self.advance("','")?));
            }
        }
        children.push(SyntaxElement::Token(
            self.expect(&Token::RParen, "')' or ','")?,
        ));
        Ok(())
    }

    fn variable(&mut self) -> PResult<SyntaxNode<'src>> {
        let mut children = vec![SyntaxElement::Token(self.expect_ident("identifier")?)];
        while self.check(&Token::Dot) && self.kind_at(self.pos + 1).is_some_and(|k| k.is_word()) {
            children.push(SyntaxElement::Token(self.advance("'.'")?));
            children.push(SyntaxElement::Token(self.expect_member("attribute name")?));
        }
        Ok(SyntaxNode::new(Production::Variable, children))
    }

    fn value(&mut self) -> PResult<SyntaxNode<'src>> {
        match self.kind_at(self.pos) {
            Some(kind) if kind.is_literal() => {
                let token = self.advance("value")?;
                Ok(SyntaxNode::new(
                    Production::Value,
                    vec![SyntaxElement::Token(token)],
                ))
            }
            _ => Err(self.error_here("value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(source: &str) -> SyntaxNode<'_> {
        Parser::new(source)
            .parse_query()
            .unwrap_or_else(|e| panic!("expected no errors, got: {e}"))
    }

    fn errors(source: &str) -> SyntaxErrors {
        Parser::new(source)
            .parse_query()
            .expect_err("expected syntax errors")
    }

    #[test]
    fn test_parse_minimal_query() {
        let tree = query("FROM class AS c SELECT c");
        let productions: Vec<_> = tree.nodes().map(|n| n.production).collect();
        assert_eq!(
            productions,
            vec![Production::FromClause, Production::SelectClause]
        );
    }

    #[test]
    fn test_expression_levels_are_all_present() {
        let tree = Parser::new("a.b == 1").parse_expression().unwrap();
        let mut chain = Vec::new();
        let mut node = &tree;
        loop {
            chain.push(node.production);
            match node.nodes().next() {
                Some(child) if node.operand_count() == 1 => node = child,
                _ => break,
            }
        }
        assert_eq!(
            chain,
            vec![
                Production::Expression,
                Production::OrExpression,
                Production::AndExpression,
                Production::EqualityExpression,
            ]
        );
        assert_eq!(node.operand_count(), 2);
    }

    #[test]
    fn test_classify_paths() {
        let tree = Parser::new("isPublic(m) && m.getName() == m.name")
            .parse_expression()
            .unwrap();
        let text = tree.to_string();
        assert!(text.contains("(predicate_invocation isPublic ("));
        assert!(text.contains("(method_chain m . getName ( ))"));
        assert!(text.contains("(variable m . name)"));
    }

    #[test]
    fn test_chain_with_call_in_the_middle() {
        let tree = Parser::new("m.getClass().name").parse_expression().unwrap();
        assert!(tree.to_string().contains("(method_chain m . getClass ( ) . name)"));
    }

    #[test]
    fn test_keywords_are_members_after_dot() {
        let tree = query("FROM class AS c WHERE c.as == 1 && c.Select.from() SELECT c.where");
        let text = tree.to_string();
        assert!(text.contains("(variable c . as)"));
        assert!(text.contains("(method_chain c . Select . from ( ))"));
        assert!(text.contains("(variable c . where)"));

        let errs = errors("FROM class AS c WHERE as.x == 1 SELECT c");
        assert_eq!(errs.errors()[0].message(), "unexpected 'as', expected expression");
    }

    #[test]
    fn test_recovers_and_reports_every_clause() {
        let errs = errors("FROM class AS WHERE c.name == == 1 SELECT");
        assert_eq!(errs.len(), 3);
        let messages: Vec<_> = errs.iter().map(ParseError::message).collect();
        assert_eq!(messages[0], "unexpected 'WHERE', expected alias");
        assert_eq!(messages[1], "unexpected '==', expected expression");
        assert_eq!(messages[2], "unexpected end of input, expected projection");
    }

    #[test]
    fn test_lexer_errors_are_reported_in_order() {
        let errs = errors("FROM class AS c WHERE c.x == # SELECT c");
        assert_eq!(errs.errors()[0].kind, ParseErrorKind::UnrecognizedInput("#".into()));
        assert!(errs.len() >= 2);
    }

    #[test]
    fn test_trailing_input() {
        let errs = errors("FROM class AS c SELECT c c");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.errors()[0].kind, ParseErrorKind::TrailingInput("c".into()));
    }
}
