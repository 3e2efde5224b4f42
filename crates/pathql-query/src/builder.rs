//! Query construction from parse events.
//!
//! [`QueryBuilder`] listens to the enter/exit event stream of a parsed query
//! and assembles a [`Query`]. The WHERE expression is built on one explicit
//! stack:
//!
//! - entering a leaf (variable, value, method chain, predicate invocation)
//!   pushes the finished leaf;
//! - entering a precedence level that carries `k` operators pushes `k`
//!   pending operators;
//! - exiting that level pops its `k + 1` operands and the pending operators
//!   beneath them and pushes the left-associative fold.
//!
//! Predicate declaration bodies are kept as raw text and never tree-built here.
//! They are re-parsed and built when an invocation is evaluated.

use pathql_parser::{parse, walk, Listener, Production, SyntaxElement, SyntaxNode};

use crate::ast::{
    entity_for_alias, BinaryOperator, ExpressionNode, MethodCall, PredicateCall, Query,
    SelectItem, SelectKind, SelectOutput, UnaryOperator,
};
use crate::error::{QueryError, StructuralError};
use crate::predicate::{Parameter, Predicate, PredicateInvocation, PredicateRegistry};

/// Parse `source` and build its [`Query`].
///
/// ```
/// use pathql_query::build_query;
///
/// let query = build_query(
///     "FROM class AS c, method AS m WHERE c.name == \"A\" && m.name == \"run\" SELECT c, m.name",
/// )
/// .unwrap();
/// assert_eq!(query.expression, "(c.name == \"A\") && (m.name == \"run\")");
/// assert_eq!(query.condition, vec!["c.name==\"A\"", "m.name==\"run\""]);
/// assert_eq!(query.select_output.len(), 2);
/// ```
pub fn build_query(source: &str) -> Result<Query, QueryError> {
    let tree = parse(source)?;
    let mut builder = QueryBuilder::new(source);
    walk(&tree, &mut builder);
    builder.finish()
}

/// Build the expression tree of a standalone `expression` node.
///
/// `select_list` resolves method-call receivers and predicate argument types,
/// `predicates` resolves invocations.
pub fn build_expression(
    source: &str,
    node: &SyntaxNode<'_>,
    select_list: &[SelectItem],
    predicates: &PredicateRegistry,
) -> Result<ExpressionNode, QueryError> {
    build_nested(source, node, select_list, predicates).map(|(tree, _)| tree)
}

fn build_nested(
    source: &str,
    node: &SyntaxNode<'_>,
    select_list: &[SelectItem],
    predicates: &PredicateRegistry,
) -> Result<(ExpressionNode, Vec<PredicateInvocation>), QueryError> {
    let mut builder = QueryBuilder::for_expression(source, select_list, predicates);
    walk(node, &mut builder);
    if let Some(err) = builder.error.take() {
        return Err(err);
    }
    let tree = builder.take_root()?;
    Ok((tree, builder.query.predicate_invocations))
}

/// Compact token text of a call chain, split at its argument nodes.
fn call_segments(node: &SyntaxNode<'_>) -> Vec<String> {
    let mut segments = vec![String::new()];
    for child in &node.children {
        match child {
            SyntaxElement::Token(token) => {
                if let Some(last) = segments.last_mut() {
                    last.push_str(token.text);
                }
            }
            SyntaxElement::Node(_) => segments.push(String::new()),
        }
    }
    segments
}

enum StackEntry {
    Pending(BinaryOperator),
    PendingUnary(UnaryOperator),
    Node(ExpressionNode),
}

/// Builds a [`Query`] from parse events.
pub struct QueryBuilder<'a> {
    source: &'a str,
    query: Query,
    stack: Vec<StackEntry>,
    in_where: bool,
    in_declaration: bool,
    /// Nesting depth inside a call leaf whose events the stack ignores.
    opaque_depth: usize,
    error: Option<QueryError>,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder for a whole query parsed from `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            query: Query::default(),
            stack: Vec::new(),
            in_where: false,
            in_declaration: false,
            opaque_depth: 0,
            error: None,
        }
    }

    fn for_expression(
        source: &'a str,
        select_list: &[SelectItem],
        predicates: &PredicateRegistry,
    ) -> Self {
        let mut builder = Self::new(source);
        builder.query.select_list = select_list.to_vec();
        builder.query.predicates = predicates.clone();
        builder.in_where = true;
        builder
    }

    /// Finish building and return the query, or the first error seen.
    pub fn finish(self) -> Result<Query, QueryError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.query),
        }
    }

    fn fail(&mut self, err: impl Into<QueryError>) {
        let err = err.into();
        tracing::debug!("query build failed: {}", err);
        self.error = Some(err);
    }

    fn building(&self) -> bool {
        self.in_where && !self.in_declaration
    }

    fn take_root(&mut self) -> Result<ExpressionNode, QueryError> {
        if self.stack.len() != 1 {
            return Err(StructuralError::UnbalancedStack(self.stack.len()).into());
        }
        match self.stack.pop() {
            Some(StackEntry::Node(node)) => Ok(node),
            _ => Err(StructuralError::MalformedStack("expression".to_string()).into()),
        }
    }

    fn enter_select_item(&mut self, node: &SyntaxNode<'_>) {
        let mut tokens = node.tokens();
        let (Some(entity), Some(alias)) = (tokens.next(), tokens.nth(1)) else {
            self.fail(StructuralError::MissingNode);
            return;
        };
        if self.query.select_list.iter().any(|item| item.alias == alias.text) {
            self.fail(StructuralError::DuplicateAlias(alias.text.to_string()));
            return;
        }
        self.query.select_list.push(SelectItem {
            entity: entity.text.to_string(),
            alias: alias.text.to_string(),
        });
    }

    fn exit_predicate_declaration(&mut self, node: &SyntaxNode<'_>) {
        let Some(name) = node.tokens().nth(1) else {
            self.fail(StructuralError::MissingNode);
            return;
        };
        let parameters = node
            .nodes()
            .filter(|n| n.production == Production::Parameter)
            .filter_map(|param| {
                let mut tokens = param.tokens();
                Some(Parameter::new(tokens.nth(1)?.text, param.tokens().next()?.text))
            })
            .collect();
        let body = node
            .child(Production::Expression)
            .map(|body| body.source_text(self.source).to_string())
            .unwrap_or_default();

        self.query.predicates.declare(Predicate {
            name: name.text.to_string(),
            parameters,
            body,
        });
    }

    fn exit_select_expression(&mut self, node: &SyntaxNode<'_>) {
        let kind = match node.nodes().next().map(|inner| inner.production) {
            Some(Production::MethodChain) => SelectKind::MethodChain,
            Some(Production::Variable) => SelectKind::Variable,
            _ => SelectKind::String,
        };
        self.query.select_output.push(SelectOutput {
            text: node.compact_text(),
            kind,
        });
    }

    /// Build every `argument` child of a call node.
    fn arguments(&mut self, node: &SyntaxNode<'_>) -> Option<Vec<(String, ExpressionNode)>> {
        let mut args = Vec::new();
        for argument in node.nodes() {
            let Some(expression) = argument.child(Production::Expression) else {
                self.fail(StructuralError::MissingNode);
                return None;
            };
            let built = build_nested(
                self.source,
                expression,
                &self.query.select_list,
                &self.query.predicates,
            );
            match built {
                Ok((tree, invocations)) => {
                    self.query.predicate_invocations.extend(invocations);
                    args.push((expression.source_text(self.source).to_string(), tree));
                }
                Err(err) => {
                    self.fail(err);
                    return None;
                }
            }
        }
        Some(args)
    }

    fn enter_method_chain(&mut self, node: &SyntaxNode<'_>) {
        let receiver = node.tokens().next().map(|t| t.text).unwrap_or_default();
        let Some(args) = self.arguments(node) else {
            return;
        };
        let entity = entity_for_alias(&self.query.select_list, receiver)
            .unwrap_or_default()
            .to_string();
        tracing::debug!("method call `{}` on entity `{}`", node.compact_text(), entity);
        self.stack.push(StackEntry::Node(ExpressionNode::MethodCall(MethodCall {
            text: node.compact_text(),
            receiver: receiver.to_string(),
            entity,
            args: args.into_iter().map(|(_, tree)| tree).collect(),
            segments: call_segments(node),
        })));
    }

    fn enter_predicate_invocation(&mut self, node: &SyntaxNode<'_>) {
        let name = node.tokens().next().map(|t| t.text).unwrap_or_default();
        let Some(args) = self.arguments(node) else {
            return;
        };
        let (texts, trees): (Vec<String>, Vec<ExpressionNode>) = args.into_iter().unzip();

        match self
            .query
            .predicates
            .resolve(name, &texts, &self.query.select_list)
        {
            Ok(invocation) => {
                self.query.predicate_invocations.push(invocation);
                self.stack
                    .push(StackEntry::Node(ExpressionNode::PredicateCall(PredicateCall {
                        name: name.to_string(),
                        args: trees,
                    })));
            }
            Err(err) => self.fail(err),
        }
    }

    fn enter_expression_node(&mut self, node: &SyntaxNode<'_>) {
        match node.production {
            production if production.is_binary_level() => {
                for op in node.operators() {
                    self.stack.push(StackEntry::Pending(op));
                }
            }
            Production::UnaryExpression => {
                if let Some(op) = node.unary_operator() {
                    self.stack.push(StackEntry::PendingUnary(op));
                }
            }
            Production::Variable => {
                self.stack
                    .push(StackEntry::Node(ExpressionNode::variable(node.compact_text())));
            }
            Production::Value => {
                self.stack
                    .push(StackEntry::Node(ExpressionNode::literal(node.compact_text())));
            }
            Production::MethodChain => {
                self.enter_method_chain(node);
                self.opaque_depth = 1;
            }
            Production::PredicateInvocation => {
                self.enter_predicate_invocation(node);
                self.opaque_depth = 1;
            }
            _ => {}
        }
    }

    fn exit_expression_node(&mut self, node: &SyntaxNode<'_>) {
        let operators = node.operators();
        if !operators.is_empty() {
            if let Err(err) = self.fold_binary(node, &operators) {
                self.fail(err);
                return;
            }
            if node.production.is_comparison_level() {
                self.query.condition.push(node.compact_text());
            }
        } else if node.production == Production::UnaryExpression && node.unary_operator().is_some() {
            if let Err(err) = self.fold_unary(node) {
                self.fail(err);
            }
        }
    }

    /// Replace `operators.len() + 1` operands and their pending operators with
    /// one left-associative binary tree.
    fn fold_binary(
        &mut self,
        node: &SyntaxNode<'_>,
        operators: &[BinaryOperator],
    ) -> Result<(), StructuralError> {
        let malformed = || StructuralError::MalformedStack(node.compact_text());
        let operand_count = operators.len() + 1;
        if self.stack.len() < operand_count + operators.len() {
            return Err(malformed());
        }

        let operands = self.stack.split_off(self.stack.len() - operand_count);
        let pending = self.stack.split_off(self.stack.len() - operators.len());

        let mut operands = operands.into_iter().map(|entry| match entry {
            StackEntry::Node(node) => Ok(node),
            _ => Err(malformed()),
        });
        let mut tree = operands.next().ok_or_else(malformed)??;
        for (entry, right) in pending.into_iter().zip(operands) {
            let StackEntry::Pending(op) = entry else {
                return Err(malformed());
            };
            tree = ExpressionNode::binary(op, tree, right?);
        }

        self.stack.push(StackEntry::Node(tree));
        Ok(())
    }

    fn fold_unary(&mut self, node: &SyntaxNode<'_>) -> Result<(), StructuralError> {
        let operand = self.stack.pop();
        let pending = self.stack.pop();
        match (pending, operand) {
            (Some(StackEntry::PendingUnary(op)), Some(StackEntry::Node(operand))) => {
                self.stack
                    .push(StackEntry::Node(ExpressionNode::unary(op, operand)));
                Ok(())
            }
            _ => Err(StructuralError::MalformedStack(node.compact_text())),
        }
    }

    fn exit_where_clause(&mut self) {
        self.in_where = false;
        match self.take_root() {
            Ok(tree) => {
                self.query.expression = tree.to_string();
                tracing::debug!("WHERE expression: {}", self.query.expression);
                self.query.expression_tree = Some(tree);
            }
            Err(err) => self.fail(err),
        }
    }
}

impl<'src> Listener<'src> for QueryBuilder<'_> {
    fn enter(&mut self, node: &SyntaxNode<'src>) {
        if self.error.is_some() {
            return;
        }
        if self.opaque_depth > 0 {
            self.opaque_depth += 1;
            return;
        }
        match node.production {
            Production::PredicateDeclaration => self.in_declaration = true,
            Production::SelectItem => self.enter_select_item(node),
            Production::WhereClause => self.in_where = true,
            _ if self.building() => self.enter_expression_node(node),
            _ => {}
        }
    }

    fn exit(&mut self, node: &SyntaxNode<'src>) {
        if self.error.is_some() {
            return;
        }
        if self.opaque_depth > 0 {
            self.opaque_depth -= 1;
            return;
        }
        match node.production {
            Production::PredicateDeclaration => {
                self.in_declaration = false;
                self.exit_predicate_declaration(node);
            }
            Production::WhereClause => self.exit_where_clause(),
            Production::SelectExpression => self.exit_select_expression(node),
            _ if self.building() => self.exit_expression_node(node),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeType;
    use crate::error::PredicateResolutionError;

    fn where_tree(source: &str) -> ExpressionNode {
        build_query(source).unwrap().expression_tree.unwrap()
    }

    #[test]
    fn test_single_comparison() {
        let tree = where_tree("FROM class AS c WHERE c.name == \"MyClass\" SELECT c");
        let ExpressionNode::Binary(node) = &tree else {
            panic!("expected binary root, got {tree:?}");
        };
        assert_eq!(node.operator, BinaryOperator::Eq);
        assert_eq!(node.left, ExpressionNode::variable("c.name"));
        assert_eq!(node.right, ExpressionNode::literal("\"MyClass\""));
    }

    #[test]
    fn test_precedence_shapes_tree() {
        let tree = where_tree("FROM class AS c WHERE c.a == 1 || c.b == 2 && c.c == 3 SELECT c");
        assert_eq!(
            tree.to_string(),
            "(c.a == 1) || ((c.b == 2) && (c.c == 3))"
        );
    }

    #[test]
    fn test_chained_operators_fold_left() {
        let tree = where_tree("FROM class AS c WHERE c.a && c.b && c.c SELECT c");
        assert_eq!(tree.to_string(), "(c.a && c.b) && c.c");

        let tree = where_tree("FROM class AS c WHERE c.x - 1 - 2 > 0 SELECT c");
        assert_eq!(tree.to_string(), "((c.x - 1) - 2) > 0");
    }

    #[test]
    fn test_unary_nodes() {
        let tree = where_tree("FROM class AS c WHERE !(c.count > -1) SELECT c");
        assert_eq!(tree.node_type(), NodeType::Unary);
        assert_eq!(tree.to_string(), "!(c.count > -1)");
    }

    #[test]
    fn test_condition_records_comparisons_only() {
        let query = build_query(
            "FROM class AS c WHERE c.a == 1 && (c.b + 1 > 2 || c.flag) SELECT c",
        )
        .unwrap();
        assert_eq!(query.condition, vec!["c.a==1", "c.b+1>2"]);
    }

    #[test]
    fn test_method_chain_leaf() {
        let tree = where_tree(
            "FROM method AS m WHERE m.getName().startsWith(\"get\" + m.prefix) SELECT m",
        );
        let ExpressionNode::MethodCall(call) = &tree else {
            panic!("expected method call, got {tree:?}");
        };
        assert_eq!(call.receiver, "m");
        assert_eq!(call.entity, "method");
        assert_eq!(call.text, "m.getName().startsWith(\"get\"+m.prefix)");
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.args[0].to_string(), "\"get\" + m.prefix");
        assert_eq!(call.segments, vec!["m.getName().startsWith(", ")"]);
    }

    #[test]
    fn test_unknown_receiver_leaves_entity_empty() {
        let tree = where_tree("FROM method AS m WHERE x.isPublic() SELECT m");
        assert_eq!(tree.entity(), "");
    }

    #[test]
    fn test_select_output_kinds() {
        let query =
            build_query("FROM method AS m SELECT m, m.name, m.getName(), \"label\", 1").unwrap();
        let kinds: Vec<_> = query.select_output.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SelectKind::Variable,
                SelectKind::Variable,
                SelectKind::MethodChain,
                SelectKind::String,
                SelectKind::String
            ]
        );
        assert_eq!(query.select_output[2].text, "m.getName()");
        assert!(query.expression_tree.is_none());
        assert!(query.expression.is_empty());
    }

    #[test]
    fn test_predicate_declarations_keep_raw_body() {
        let query = build_query(
            "predicate isPublic(method m) { m.visibility  ==  \"public\" } \
             FROM method AS md WHERE isPublic(md) SELECT md",
        )
        .unwrap();
        let declared: Vec<_> = query.predicates.iter().collect();
        assert_eq!(declared.len(), 1);
        assert_eq!(declared[0].body, "m.visibility  ==  \"public\"");
        assert_eq!(declared[0].parameters, vec![Parameter::new("m", "method")]);

        // Body comparisons are not part of the WHERE condition list.
        assert!(query.condition.is_empty());
        assert_eq!(query.predicate_invocations.len(), 1);
        assert_eq!(query.predicate_invocations[0].parameters[0].param_type, "method");
        assert_eq!(query.expression, "isPublic(md)");
    }

    #[test]
    fn test_unresolved_predicate_aborts_build() {
        let err = build_query(
            "predicate isPublic(method m) { m.public } FROM class AS e1 WHERE isPublic(e1) SELECT e1",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Predicate(PredicateResolutionError::NoMatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_alias() {
        let err = build_query("FROM class AS c, method AS c SELECT c").unwrap_err();
        assert_eq!(
            err,
            QueryError::Structural(StructuralError::DuplicateAlias("c".to_string()))
        );
    }

    #[test]
    fn test_syntax_errors_skip_building() {
        let err = build_query("FROM class AS WHERE SELECT").unwrap_err();
        let QueryError::Syntax(errors) = err else {
            panic!("expected syntax errors");
        };
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_build_expression_standalone() {
        let source = "c.name == m.name";
        let node = pathql_parser::parse_expression(source).unwrap();
        let tree = build_expression(source, &node, &[], &PredicateRegistry::new()).unwrap();
        assert_eq!(tree.references(), vec!["c", "m"]);
    }
}
