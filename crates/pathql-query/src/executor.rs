//! Expression evaluation engine.
//!
//! Evaluates an [`ExpressionNode`] tree bottom-up against an
//! [`EvaluationContext`]. Comparisons are classified as single- or
//! dual-entity: single-entity comparisons filter one entity's rows,
//! dual-entity comparisons pair rows of two entities (through a relationship
//! join when the entities are related, a cross join otherwise). `&&` and `||`
//! combine the surviving rows by row identity.
//!
//! Every node leaves an [`IntermediateResult`] in the trace. The first error
//! aborts the whole evaluation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pathql_core::{merge_rows, references, row_identity, EntityData, Row};
use pathql_parser::parse_expression;
use serde::Serialize;

use crate::ast::{
    entity_for_alias, BinaryOperator, ExpressionNode, NodeType, PredicateCall, Query, SelectItem,
};
use crate::builder::build_expression;
use crate::error::{DataError, QueryError, StructuralError};
use crate::predicate::PredicateRegistry;
use crate::relationship::RelationshipMap;
use crate::runtime::{Env, Runtime};

/// Entity type to one binding environment per row, index-aligned with the
/// entity's rows.
pub type ProxyEnv = HashMap<String, Vec<Env>>;

/// Data an evaluation reads. Never modified by evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Declared relationships between entity types.
    pub relationships: Arc<RelationshipMap>,
    /// Rows per entity type.
    pub entity_data: EntityData,
    /// Prepared binding environments per entity type.
    pub proxy_env: ProxyEnv,
}

impl EvaluationContext {
    /// Create a context without proxy environments.
    pub fn new(relationships: Arc<RelationshipMap>, entity_data: EntityData) -> Self {
        Self {
            relationships,
            entity_data,
            proxy_env: ProxyEnv::new(),
        }
    }

    /// Supply prepared environments for `entity`'s rows.
    #[must_use]
    pub fn with_proxy_env(mut self, entity: impl Into<String>, envs: Vec<Env>) -> Self {
        self.proxy_env.insert(entity.into(), envs);
        self
    }

    fn rows(&self, entity: &str) -> Result<&[Row], DataError> {
        self.entity_data
            .get(entity)
            .map(Vec::as_slice)
            .ok_or_else(|| DataError::MissingEntity(entity.to_string()))
    }

    /// Binding environment for every row of `entity`.
    ///
    /// Falls back to [`Env::from_row`] when no proxy environments are supplied.
    fn envs(&self, entity: &str, rows: &[Row]) -> Result<Vec<Env>, DataError> {
        match self.proxy_env.get(entity) {
            Some(envs) if envs.len() == rows.len() => Ok(envs.clone()),
            Some(envs) => Err(DataError::ProxyLength {
                entity: entity.to_string(),
                rows: rows.len(),
                envs: envs.len(),
            }),
            None => Ok(rows.iter().map(Env::from_row).collect()),
        }
    }
}

/// Whether a comparison involves one entity or two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonType {
    /// Filters the rows of one entity.
    SingleEntity,
    /// Pairs the rows of two entities.
    DualEntity,
}

/// Classify a node.
///
/// `&&`/`||` nodes are dual-entity when either side is. Other binary nodes
/// compare the entity prefix of each operand: a variable contributes its path
/// prefix, a literal or call contributes nothing, and a composite operand
/// contributes its single reference. Two different non-empty prefixes make the
/// node dual-entity.
///
/// ```
/// use pathql_query::{build_query, detect_comparison_type, ComparisonType};
///
/// let query = build_query("FROM class AS c WHERE class.name == method.name SELECT c").unwrap();
/// let tree = query.expression_tree.unwrap();
/// assert_eq!(detect_comparison_type(&tree).unwrap(), ComparisonType::DualEntity);
/// ```
pub fn detect_comparison_type(node: &ExpressionNode) -> Result<ComparisonType, StructuralError> {
    match node {
        ExpressionNode::Binary(binary) if binary.operator.is_logical() => {
            let left = detect_comparison_type(&binary.left)?;
            let right = detect_comparison_type(&binary.right)?;
            if left == ComparisonType::DualEntity || right == ComparisonType::DualEntity {
                Ok(ComparisonType::DualEntity)
            } else {
                Ok(ComparisonType::SingleEntity)
            }
        }
        ExpressionNode::Binary(binary) => {
            let left = operand_entity(&binary.left)?;
            let right = operand_entity(&binary.right)?;
            if left.is_empty() || right.is_empty() || left == right {
                Ok(ComparisonType::SingleEntity)
            } else {
                Ok(ComparisonType::DualEntity)
            }
        }
        ExpressionNode::Unary(_) => match node.references().len() {
            0 | 1 => Ok(ComparisonType::SingleEntity),
            2 => Ok(ComparisonType::DualEntity),
            _ => Err(StructuralError::UnsupportedShape(node.to_string())),
        },
        _ => Ok(ComparisonType::SingleEntity),
    }
}

fn operand_entity(operand: &ExpressionNode) -> Result<&str, StructuralError> {
    match operand {
        ExpressionNode::Variable { entity, .. } => Ok(entity),
        ExpressionNode::Literal { .. }
        | ExpressionNode::MethodCall(_)
        | ExpressionNode::PredicateCall(_) => Ok(""),
        ExpressionNode::Binary(_) | ExpressionNode::Unary(_) => {
            match operand.references().as_slice() {
                [] => Ok(""),
                [single] => Ok(*single),
                _ => Err(StructuralError::UnsupportedShape(operand.to_string())),
            }
        }
    }
}

/// Per-node evaluation record.
///
/// There is no error field: the first failure aborts the evaluation and is
/// returned as the `Err` of [`Evaluator::evaluate`] or [`Evaluator::execute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntermediateResult {
    /// Variant of the evaluated node.
    pub node_type: NodeType,
    /// Operator of a binary or unary node.
    pub operator: Option<String>,
    /// Rendered node.
    pub expression: String,
    /// Classification, for nodes evaluated as a comparison.
    pub comparison: Option<ComparisonType>,
    /// Surviving rows.
    pub data: Vec<Row>,
    /// Entity types the rows come from.
    pub entities: Vec<String>,
    /// Left operand, or the only operand.
    pub left: Option<Box<IntermediateResult>>,
    /// Right operand.
    pub right: Option<Box<IntermediateResult>>,
    /// Literal or path text of a leaf.
    pub value: Option<String>,
}

impl IntermediateResult {
    fn new(node: &ExpressionNode) -> Self {
        let operator = match node {
            ExpressionNode::Binary(binary) => Some(binary.operator.to_string()),
            ExpressionNode::Unary(unary) => Some(unary.operator.to_string()),
            _ => None,
        };
        let value = match node {
            ExpressionNode::Variable { .. } | ExpressionNode::Literal { .. } => {
                Some(node.value().to_string())
            }
            _ => None,
        };
        Self {
            node_type: node.node_type(),
            operator,
            expression: node.to_string(),
            comparison: None,
            data: Vec::new(),
            entities: Vec::new(),
            left: None,
            right: None,
            value,
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        if let Some(left) = &self.left {
            left.collect(out);
        }
        if let Some(right) = &self.right {
            right.collect(out);
        }
    }
}

/// Outcome of an evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    /// Surviving rows.
    pub data: Vec<Row>,
    /// Entity types the rows come from.
    pub entities: Vec<String>,
    /// Trace root.
    pub root: Option<IntermediateResult>,
}

impl EvaluationResult {
    /// Every intermediate result in pre-order: node, left subtree, right subtree.
    pub fn intermediates(&self) -> Vec<&IntermediateResult> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.collect(&mut out);
        }
        out
    }

    /// Number of surviving rows.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no row survived.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<IntermediateResult> for EvaluationResult {
    fn from(root: IntermediateResult) -> Self {
        Self {
            data: root.data.clone(),
            entities: root.entities.clone(),
            root: Some(root),
        }
    }
}

/// Evaluator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorOptions {
    /// Reuse compiled comparison programs across rows.
    pub cache_expressions: bool,
    /// Maximum nesting of predicate expansions.
    pub max_predicate_depth: usize,
    /// Maximum row pairs one dual-entity comparison may visit.
    pub max_join_pairs: Option<usize>,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            cache_expressions: true,
            max_predicate_depth: 16,
            max_join_pairs: None,
        }
    }
}

/// Names in scope while evaluating: aliases and predicate declarations.
#[derive(Clone, Copy)]
struct Scope<'s> {
    select_list: &'s [SelectItem],
    predicates: &'s PredicateRegistry,
}

impl<'s> Scope<'s> {
    /// Entity type a reference reads rows from.
    fn entity<'r>(&self, reference: &'r str) -> &'r str
    where
        's: 'r,
    {
        entity_for_alias(self.select_list, reference).unwrap_or(reference)
    }
}

/// Evaluates expression trees against one context.
pub struct Evaluator<'a> {
    context: &'a EvaluationContext,
    select_list: Vec<SelectItem>,
    predicates: PredicateRegistry,
    runtime: Runtime,
    options: EvaluatorOptions,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator with default options and no aliases.
    pub fn new(context: &'a EvaluationContext) -> Self {
        Self::with_options(context, EvaluatorOptions::default())
    }

    /// Create an evaluator with explicit options.
    pub fn with_options(context: &'a EvaluationContext, options: EvaluatorOptions) -> Self {
        Self {
            context,
            select_list: Vec::new(),
            predicates: PredicateRegistry::new(),
            runtime: Runtime::new(options.cache_expressions),
            options,
        }
    }

    /// Create an evaluator using a query's aliases and predicates.
    pub fn for_query(context: &'a EvaluationContext, query: &Query) -> Self {
        Self::new(context)
            .with_select_list(query.select_list.clone())
            .with_predicates(query.predicates.clone())
    }

    /// Aliases used to resolve references.
    #[must_use]
    pub fn with_select_list(mut self, select_list: Vec<SelectItem>) -> Self {
        self.select_list = select_list;
        self
    }

    /// Predicates available to invocations.
    #[must_use]
    pub fn with_predicates(mut self, predicates: PredicateRegistry) -> Self {
        self.predicates = predicates;
        self
    }

    /// Evaluate a tree.
    pub fn evaluate(&self, node: &ExpressionNode) -> Result<EvaluationResult, QueryError> {
        let scope = Scope {
            select_list: &self.select_list,
            predicates: &self.predicates,
        };
        self.evaluate_node(node, scope, 0).map(EvaluationResult::from)
    }

    /// Evaluate a query's WHERE expression with its aliases and predicates.
    ///
    /// Without WHERE every row of every selected entity is returned.
    pub fn execute(&self, query: &Query) -> Result<EvaluationResult, QueryError> {
        let scope = Scope {
            select_list: &query.select_list,
            predicates: &query.predicates,
        };
        match &query.expression_tree {
            Some(tree) => self.evaluate_node(tree, scope, 0).map(EvaluationResult::from),
            None => {
                let mut result = EvaluationResult::default();
                for entity in query.entities() {
                    result.data.extend_from_slice(self.context.rows(entity)?);
                    result.entities.push(entity.to_string());
                }
                Ok(result)
            }
        }
    }

    /// Evaluate a node in boolean position.
    fn evaluate_node(
        &self,
        node: &ExpressionNode,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<IntermediateResult, QueryError> {
        match node {
            ExpressionNode::Binary(binary) if binary.operator.is_logical() => {
                let left = self.evaluate_node(&binary.left, scope, depth)?;
                let right = self.evaluate_node(&binary.right, scope, depth)?;
                Ok(self.combine(node, binary.operator, left, right))
            }
            ExpressionNode::Binary(binary) => {
                let comparison = detect_comparison_type(node)?;
                let mut result = match comparison {
                    ComparisonType::SingleEntity => {
                        let reference = single_reference(node)?;
                        self.filter_single(node, reference, scope, depth)?
                    }
                    ComparisonType::DualEntity => {
                        let left = operand_entity(&binary.left)?;
                        let right = operand_entity(&binary.right)?;
                        self.filter_dual(node, left, right, scope, depth)?
                    }
                };
                result.comparison = Some(comparison);
                result.left = Some(Box::new(trace_value(&binary.left)));
                result.right = Some(Box::new(trace_value(&binary.right)));
                Ok(result)
            }
            ExpressionNode::Unary(unary) => {
                let mut result = self.filter_by_references(node, scope, depth)?;
                result.left = Some(Box::new(trace_value(&unary.operand)));
                Ok(result)
            }
            ExpressionNode::MethodCall(_) => self.filter_by_references(node, scope, depth),
            ExpressionNode::PredicateCall(call) => self.evaluate_predicate_call(node, call, scope, depth),
            ExpressionNode::Variable { .. } | ExpressionNode::Literal { .. } => {
                Ok(IntermediateResult::new(node))
            }
        }
    }

    /// Unary and method-call filters: one reference filters, two pair up.
    fn filter_by_references(
        &self,
        node: &ExpressionNode,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<IntermediateResult, QueryError> {
        let (comparison, mut result) = match node.references().as_slice() {
            [] => return Err(DataError::NoEntity(node.to_string()).into()),
            [reference] => (
                ComparisonType::SingleEntity,
                self.filter_single(node, reference, scope, depth)?,
            ),
            [left, right] => (
                ComparisonType::DualEntity,
                self.filter_dual(node, left, right, scope, depth)?,
            ),
            _ => return Err(StructuralError::UnsupportedShape(node.to_string()).into()),
        };
        result.comparison = Some(comparison);
        Ok(result)
    }

    /// Keep the rows of `reference`'s entity for which `node` holds.
    fn filter_single(
        &self,
        node: &ExpressionNode,
        reference: &str,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<IntermediateResult, QueryError> {
        let entity = scope.entity(reference);
        let text = self.runtime_text(node, scope, depth)?;
        let rows = self.context.rows(entity)?;
        let envs = self.context.envs(entity, rows)?;
        tracing::debug!(
            "single-entity filter `{}` over {} rows of `{}`",
            text,
            rows.len(),
            entity
        );

        let mut result = IntermediateResult::new(node);
        for (row, env) in rows.iter().zip(envs) {
            let env = Env::new().with_object(reference, env);
            let keep = self
                .runtime
                .evaluate(&text, &env)
                .map_err(|err| QueryError::runtime(&text, err))?;
            tracing::trace!("{} {:?} -> {}", entity, row_identity(row), keep);
            if keep {
                result.data.push(row.clone());
            }
        }
        result.entities.push(entity.to_string());
        Ok(result)
    }

    /// Pair the rows of two references' entities and keep the merged pairs
    /// for which `node` holds.
    fn filter_dual(
        &self,
        node: &ExpressionNode,
        left_ref: &str,
        right_ref: &str,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<IntermediateResult, QueryError> {
        let (left_entity, right_entity) = (scope.entity(left_ref), scope.entity(right_ref));
        let text = self.runtime_text(node, scope, depth)?;
        let left_rows = self.context.rows(left_entity)?;
        let right_rows = self.context.rows(right_entity)?;

        let pairs = left_rows.len().saturating_mul(right_rows.len());
        if let Some(limit) = self.options.max_join_pairs {
            if pairs > limit {
                return Err(DataError::JoinLimit {
                    left: left_entity.to_string(),
                    right: right_entity.to_string(),
                    limit,
                }
                .into());
            }
        }

        let left_envs = self.context.envs(left_entity, left_rows)?;
        let right_envs = self.context.envs(right_entity, right_rows)?;
        let related = self
            .context
            .relationships
            .has_relationship(left_entity, right_entity);
        tracing::debug!(
            "dual-entity {} `{}` over {} pairs of `{}` x `{}`",
            if related { "relationship join" } else { "cross join" },
            text,
            pairs,
            left_entity,
            right_entity
        );

        let mut result = IntermediateResult::new(node);
        for (left_row, left_env) in left_rows.iter().zip(&left_envs) {
            for (right_row, right_env) in right_rows.iter().zip(&right_envs) {
                if related
                    && !references(left_row, left_entity, right_row)
                    && !references(right_row, right_entity, left_row)
                {
                    continue;
                }
                let env = Env::new()
                    .with_object(left_ref, left_env.clone())
                    .with_object(right_ref, right_env.clone());
                let keep = self
                    .runtime
                    .evaluate(&text, &env)
                    .map_err(|err| QueryError::runtime(&text, err))?;
                if keep {
                    result
                        .data
                        .push(merge_rows(left_ref, left_row, right_ref, right_row));
                }
            }
        }
        push_entity(&mut result.entities, left_entity);
        push_entity(&mut result.entities, right_entity);
        Ok(result)
    }

    /// Combine the rows of two evaluated operands of `&&` or `||`.
    fn combine(
        &self,
        node: &ExpressionNode,
        operator: BinaryOperator,
        left: IntermediateResult,
        right: IntermediateResult,
    ) -> IntermediateResult {
        let mut result = IntermediateResult::new(node);
        result.data = match operator {
            BinaryOperator::And => match (left.entities.as_slice(), right.entities.as_slice()) {
                ([l], [r])
                    if l != r && self.context.relationships.has_relationship(l, r) =>
                {
                    tracing::debug!("joining `{}` and `{}` rows on their relationship", l, r);
                    relationship_join(&left.data, l, &right.data, r)
                }
                _ => intersection(&left.data, &right.data),
            },
            _ => union(&left.data, &right.data),
        };
        for entity in left.entities.iter().chain(&right.entities) {
            push_entity(&mut result.entities, entity);
        }
        result.left = Some(Box::new(left));
        result.right = Some(Box::new(right));
        result
    }

    /// Expand a predicate invocation and evaluate its body.
    fn evaluate_predicate_call(
        &self,
        node: &ExpressionNode,
        call: &PredicateCall,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<IntermediateResult, QueryError> {
        let tree = self.expand_tree(call, scope, depth)?;
        let inner = self.evaluate_node(&tree, scope, depth + 1)?;

        let mut result = IntermediateResult::new(node);
        result.data.clone_from(&inner.data);
        result.entities.clone_from(&inner.entities);
        result.left = Some(Box::new(inner));
        Ok(result)
    }

    /// Build the body of a call expanded at nesting `depth`.
    fn expand_tree(
        &self,
        call: &PredicateCall,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<ExpressionNode, QueryError> {
        if depth >= self.options.max_predicate_depth {
            return Err(StructuralError::PredicateDepth {
                name: call.name.clone(),
                limit: self.options.max_predicate_depth,
            }
            .into());
        }
        let body = expand_call(call, scope)?;
        tracing::debug!("expanded {} to `{}`", call, body);

        let syntax = parse_expression(&body).map_err(|errors| StructuralError::PredicateBody {
            name: call.name.clone(),
            errors,
        })?;
        build_expression(&body, &syntax, scope.select_list, scope.predicates)
    }

    /// Text handed to the runtime, with predicate calls inlined.
    fn runtime_text(
        &self,
        node: &ExpressionNode,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<String, QueryError> {
        if !node.contains_predicate_call() {
            return Ok(node.to_string());
        }
        node.render(&mut |call: &PredicateCall| self.inline_call(call, scope, depth))
    }

    /// Parenthesised runtime text of a call, with calls in its body inlined too.
    fn inline_call(
        &self,
        call: &PredicateCall,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<String, QueryError> {
        let tree = self.expand_tree(call, scope, depth)?;
        let text = self.runtime_text(&tree, scope, depth + 1)?;
        Ok(format!("({text})"))
    }
}

/// Resolve a call and substitute its arguments into the body.
fn expand_call(call: &PredicateCall, scope: Scope<'_>) -> Result<String, QueryError> {
    let args: Vec<String> = call.args.iter().map(ToString::to_string).collect();
    let invocation = scope
        .predicates
        .resolve(&call.name, &args, scope.select_list)?;
    Ok(invocation
        .predicate
        .map(|predicate| predicate.expand(&args))
        .unwrap_or_default())
}

/// The one reference of a single-entity comparison.
fn single_reference(node: &ExpressionNode) -> Result<&str, QueryError> {
    match node.references().as_slice() {
        [] => Err(DataError::NoEntity(node.to_string()).into()),
        [reference] => Ok(*reference),
        [first, second, ..] => Err(StructuralError::MixedReferences {
            expression: node.to_string(),
            first: (*first).to_string(),
            second: (*second).to_string(),
        }
        .into()),
    }
}

/// Trace entry for a node in value position.
fn trace_value(node: &ExpressionNode) -> IntermediateResult {
    let mut result = IntermediateResult::new(node);
    match node {
        ExpressionNode::Binary(binary) => {
            result.left = Some(Box::new(trace_value(&binary.left)));
            result.right = Some(Box::new(trace_value(&binary.right)));
        }
        ExpressionNode::Unary(unary) => {
            result.left = Some(Box::new(trace_value(&unary.operand)));
        }
        _ => {}
    }
    result
}

fn push_entity(entities: &mut Vec<String>, entity: &str) {
    if !entities.iter().any(|e| e == entity) {
        entities.push(entity.to_string());
    }
}

/// Rows of `left` whose id also occurs in `right`, deduplicated by id.
///
/// Rows without an identity are dropped.
pub fn intersection(left: &[Row], right: &[Row]) -> Vec<Row> {
    let right_ids: HashSet<String> = right.iter().filter_map(row_identity).collect();
    let mut seen = HashSet::new();
    left.iter()
        .filter(|row| {
            row_identity(row).is_some_and(|id| right_ids.contains(&id) && seen.insert(id))
        })
        .cloned()
        .collect()
}

/// Rows of `left` then `right`, deduplicated by id.
///
/// Rows without an identity are dropped.
pub fn union(left: &[Row], right: &[Row]) -> Vec<Row> {
    let mut seen = HashSet::new();
    left.iter()
        .chain(right)
        .filter(|row| row_identity(row).is_some_and(|id| seen.insert(id)))
        .cloned()
        .collect()
}

/// Rows of each side that reference, or are referenced by, a row of the other.
fn relationship_join(left: &[Row], left_entity: &str, right: &[Row], right_entity: &str) -> Vec<Row> {
    let linked = |row: &Row, entity: &str, others: &[Row], other_entity: &str| {
        others
            .iter()
            .any(|other| references(row, entity, other) || references(other, other_entity, row))
    };
    let from_left = left
        .iter()
        .filter(|row| linked(row, left_entity, right, right_entity));
    let from_right = right
        .iter()
        .filter(|row| linked(row, right_entity, left, left_entity));
    from_left.chain(from_right).cloned().collect()
}
