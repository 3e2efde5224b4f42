//! Query AST types.
//!
//! The WHERE clause becomes an [`ExpressionNode`] tree; the rest of the query
//! is kept in flattened form on [`Query`].

use std::convert::Infallible;
use std::fmt;

use serde::Serialize;

pub use pathql_parser::{BinaryOperator, UnaryOperator};

use crate::predicate::{PredicateInvocation, PredicateRegistry};

/// A parsed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    /// `FROM` items in declaration order.
    pub select_list: Vec<SelectItem>,
    /// Canonical rendering of the WHERE expression (empty without WHERE).
    pub expression: String,
    /// Compact text of every comparison in the WHERE clause, in source order.
    pub condition: Vec<String>,
    /// Root of the WHERE expression.
    pub expression_tree: Option<ExpressionNode>,
    /// Predicate declarations.
    pub predicates: PredicateRegistry,
    /// Predicate invocations found in the WHERE clause, resolved.
    pub predicate_invocations: Vec<PredicateInvocation>,
    /// `SELECT` projections in order.
    pub select_output: Vec<SelectOutput>,
}

impl Query {
    /// Entity type bound to `alias`.
    pub fn entity_for_alias(&self, alias: &str) -> Option<&str> {
        entity_for_alias(&self.select_list, alias)
    }

    /// Entity types of the select list, without duplicates, in order.
    pub fn entities(&self) -> Vec<&str> {
        let mut entities: Vec<&str> = Vec::new();
        for item in &self.select_list {
            if !entities.contains(&item.entity.as_str()) {
                entities.push(&item.entity);
            }
        }
        entities
    }
}

pub(crate) fn entity_for_alias<'a>(select_list: &'a [SelectItem], alias: &str) -> Option<&'a str> {
    select_list
        .iter()
        .find(|item| item.alias == alias)
        .map(|item| item.entity.as_str())
}

/// `entity AS alias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectItem {
    /// Entity type.
    pub entity: String,
    /// Alias used in expressions.
    pub alias: String,
}

/// A projection in the SELECT clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOutput {
    /// Compact source text of the projection.
    pub text: String,
    /// What kind of projection it is.
    pub kind: SelectKind,
}

/// Kind of a SELECT projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectKind {
    /// A bare alias or a dotted attribute path.
    Variable,
    /// A path containing a method call.
    MethodChain,
    /// A literal.
    String,
}

impl fmt::Display for SelectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Variable => "variable",
            Self::MethodChain => "method_chain",
            Self::String => "string",
        })
    }
}

/// A node of the WHERE expression tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpressionNode {
    /// Binary operation.
    Binary(Box<BinaryNode>),
    /// Prefix operation.
    Unary(Box<UnaryNode>),
    /// Dotted attribute path such as `c.name`.
    Variable {
        /// Full path text.
        path: String,
        /// Path prefix before the first `.`.
        entity: String,
    },
    /// Literal exactly as written, quotes included.
    Literal {
        /// Source text.
        text: String,
    },
    /// Method-call chain such as `m.getName()`.
    MethodCall(MethodCall),
    /// Invocation of a declared predicate.
    PredicateCall(PredicateCall),
}

/// A binary operation with both operands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryNode {
    /// The operator.
    pub operator: BinaryOperator,
    /// Left operand.
    pub left: ExpressionNode,
    /// Right operand.
    pub right: ExpressionNode,
}

/// A prefix operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryNode {
    /// The operator.
    pub operator: UnaryOperator,
    /// The operand.
    pub operand: ExpressionNode,
}

/// A method-call chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCall {
    /// Compact source text of the whole chain.
    pub text: String,
    /// Identifier the chain starts from.
    pub receiver: String,
    /// Entity type of the receiver alias, empty when the alias is unknown.
    pub entity: String,
    /// Arguments of every call in the chain, in order.
    pub args: Vec<ExpressionNode>,
    /// Compact text around the arguments: argument `i` sits between
    /// `segments[i]` and `segments[i + 1]`.
    #[serde(skip)]
    pub segments: Vec<String>,
}

/// A predicate invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredicateCall {
    /// Predicate name.
    pub name: String,
    /// Arguments.
    pub args: Vec<ExpressionNode>,
}

/// Variant tag of an [`ExpressionNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// [`ExpressionNode::Binary`].
    Binary,
    /// [`ExpressionNode::Unary`].
    Unary,
    /// [`ExpressionNode::Variable`].
    Variable,
    /// [`ExpressionNode::Literal`].
    Literal,
    /// [`ExpressionNode::MethodCall`].
    MethodCall,
    /// [`ExpressionNode::PredicateCall`].
    PredicateCall,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Binary => "binary",
            Self::Unary => "unary",
            Self::Variable => "variable",
            Self::Literal => "literal",
            Self::MethodCall => "method_call",
            Self::PredicateCall => "predicate_call",
        })
    }
}

impl ExpressionNode {
    /// Build a binary node.
    pub fn binary(operator: BinaryOperator, left: Self, right: Self) -> Self {
        Self::Binary(Box::new(BinaryNode {
            operator,
            left,
            right,
        }))
    }

    /// Build a unary node.
    pub fn unary(operator: UnaryOperator, operand: Self) -> Self {
        Self::Unary(Box::new(UnaryNode { operator, operand }))
    }

    /// Build a variable node, deriving its entity prefix from the path.
    pub fn variable(path: impl Into<String>) -> Self {
        let path = path.into();
        let entity = path.split('.').next().unwrap_or_default().to_string();
        Self::Variable { path, entity }
    }

    /// Build a literal node from its source text.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal { text: text.into() }
    }

    /// Variant tag.
    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::Binary(_) => NodeType::Binary,
            Self::Unary(_) => NodeType::Unary,
            Self::Variable { .. } => NodeType::Variable,
            Self::Literal { .. } => NodeType::Literal,
            Self::MethodCall(_) => NodeType::MethodCall,
            Self::PredicateCall(_) => NodeType::PredicateCall,
        }
    }

    /// Operator text, path, literal text or call name.
    pub fn value(&self) -> &str {
        match self {
            Self::Binary(node) => node.operator.as_str(),
            Self::Unary(node) => node.operator.as_str(),
            Self::Variable { path, .. } => path,
            Self::Literal { text } => text,
            Self::MethodCall(call) => &call.text,
            Self::PredicateCall(call) => &call.name,
        }
    }

    /// Resolved entity of a leaf, empty when there is none.
    pub fn entity(&self) -> &str {
        match self {
            Self::Variable { entity, .. } => entity,
            Self::MethodCall(call) => &call.entity,
            _ => "",
        }
    }

    /// Distinct row references (variable prefixes and method receivers) in
    /// source order.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        fn add<'a>(name: &'a str, out: &mut Vec<&'a str>) {
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }

        match self {
            Self::Binary(node) => {
                node.left.collect_references(out);
                node.right.collect_references(out);
            }
            Self::Unary(node) => node.operand.collect_references(out),
            Self::Variable { entity, .. } => add(entity, out),
            Self::Literal { .. } => {}
            Self::MethodCall(call) => {
                add(&call.receiver, out);
                for arg in &call.args {
                    arg.collect_references(out);
                }
            }
            Self::PredicateCall(call) => {
                for arg in &call.args {
                    arg.collect_references(out);
                }
            }
        }
    }

    /// Whether a predicate call appears anywhere in the tree.
    pub fn contains_predicate_call(&self) -> bool {
        match self {
            Self::Binary(node) => {
                node.left.contains_predicate_call() || node.right.contains_predicate_call()
            }
            Self::Unary(node) => node.operand.contains_predicate_call(),
            Self::PredicateCall(_) => true,
            Self::MethodCall(call) => call.args.iter().any(Self::contains_predicate_call),
            Self::Variable { .. } | Self::Literal { .. } => false,
        }
    }

    /// Render the tree as expression text, rendering predicate calls with `call`.
    ///
    /// Operands are separated by single spaces and nested binary operations are
    /// parenthesised, so the output re-parses to the same tree.
    pub fn render<E, F>(&self, call: &mut F) -> Result<String, E>
    where
        F: FnMut(&PredicateCall) -> Result<String, E>,
    {
        Ok(match self {
            Self::Binary(node) => format!(
                "{} {} {}",
                node.left.render_operand(call)?,
                node.operator,
                node.right.render_operand(call)?
            ),
            Self::Unary(node) => {
                format!("{}{}", node.operator, node.operand.render_operand(call)?)
            }
            Self::Variable { path, .. } => path.clone(),
            Self::Literal { text } => text.clone(),
            Self::MethodCall(method) if self.contains_predicate_call() => {
                method.render_args(call)?
            }
            Self::MethodCall(method) => method.text.clone(),
            Self::PredicateCall(predicate) => call(predicate)?,
        })
    }

    fn render_operand<E, F>(&self, call: &mut F) -> Result<String, E>
    where
        F: FnMut(&PredicateCall) -> Result<String, E>,
    {
        let text = self.render(call)?;
        Ok(match self {
            Self::Binary(_) => format!("({text})"),
            _ => text,
        })
    }
}

impl MethodCall {
    /// Rebuild the chain text with every argument rendered through `call`.
    fn render_args<E, F>(&self, call: &mut F) -> Result<String, E>
    where
        F: FnMut(&PredicateCall) -> Result<String, E>,
    {
        if self.segments.len() != self.args.len() + 1 {
            return Ok(self.text.clone());
        }
        let mut text = self.segments[0].clone();
        for (arg, segment) in self.args.iter().zip(&self.segments[1..]) {
            text.push_str(&arg.render(call)?);
            text.push_str(segment);
        }
        Ok(text)
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.render(&mut |call: &PredicateCall| {
            Ok::<_, Infallible>(call.to_string())
        });
        match rendered {
            Ok(text) => f.write_str(&text),
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for PredicateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_eq(alias: &str, value: &str) -> ExpressionNode {
        ExpressionNode::binary(
            BinaryOperator::Eq,
            ExpressionNode::variable(format!("{alias}.name")),
            ExpressionNode::literal(format!("\"{value}\"")),
        )
    }

    #[test]
    fn test_variable_entity_is_path_prefix() {
        let node = ExpressionNode::variable("class.methods.count");
        assert_eq!(node.entity(), "class");
        assert_eq!(node.value(), "class.methods.count");
        assert_eq!(ExpressionNode::variable("m").entity(), "m");
    }

    #[test]
    fn test_display_parenthesises_nested_binaries() {
        let tree = ExpressionNode::binary(
            BinaryOperator::Or,
            ExpressionNode::binary(BinaryOperator::And, name_eq("c", "A"), name_eq("m", "b")),
            ExpressionNode::unary(UnaryOperator::Not, ExpressionNode::variable("c.isAbstract")),
        );
        assert_eq!(
            tree.to_string(),
            "((c.name == \"A\") && (m.name == \"b\")) || !c.isAbstract"
        );
    }

    #[test]
    fn test_references_are_distinct_and_ordered() {
        let tree = ExpressionNode::binary(
            BinaryOperator::And,
            name_eq("m", "x"),
            ExpressionNode::binary(
                BinaryOperator::Eq,
                ExpressionNode::MethodCall(MethodCall {
                    text: "c.getName()".to_string(),
                    receiver: "c".to_string(),
                    entity: "class".to_string(),
                    args: Vec::new(),
                    segments: vec!["c.getName()".to_string()],
                }),
                ExpressionNode::variable("m.owner"),
            ),
        );
        assert_eq!(tree.references(), vec!["m", "c"]);
    }

    #[test]
    fn test_predicate_call_display() {
        let call = ExpressionNode::PredicateCall(PredicateCall {
            name: "isPublic".to_string(),
            args: vec![ExpressionNode::variable("m"), ExpressionNode::literal("1")],
        });
        assert_eq!(call.to_string(), "isPublic(m, 1)");
        assert!(call.contains_predicate_call());
        assert_eq!(call.node_type(), NodeType::PredicateCall);
    }

    #[test]
    fn test_render_inlines_calls_inside_method_arguments() {
        let busy = PredicateCall {
            name: "busy".to_string(),
            args: vec![ExpressionNode::variable("c")],
        };
        let chain = ExpressionNode::MethodCall(MethodCall {
            text: "c.tags.contains(busy(c))".to_string(),
            receiver: "c".to_string(),
            entity: "class".to_string(),
            args: vec![ExpressionNode::PredicateCall(busy)],
            segments: vec!["c.tags.contains(".to_string(), ")".to_string()],
        });
        assert!(chain.contains_predicate_call());

        let rendered = chain.render(&mut |call: &PredicateCall| {
            Ok::<_, Infallible>(format!("({}.methodCount > 1)", call.args[0]))
        });
        assert_eq!(rendered, Ok("c.tags.contains((c.methodCount > 1))".to_string()));
        assert_eq!(chain.to_string(), "c.tags.contains(busy(c))");
    }

    #[test]
    fn test_query_entities_deduplicate() {
        let query = Query {
            select_list: vec![
                SelectItem {
                    entity: "class".to_string(),
                    alias: "a".to_string(),
                },
                SelectItem {
                    entity: "class".to_string(),
                    alias: "b".to_string(),
                },
            ],
            ..Query::default()
        };
        assert_eq!(query.entities(), vec!["class"]);
        assert_eq!(query.entity_for_alias("b"), Some("class"));
        assert_eq!(query.entity_for_alias("z"), None);
    }
}
