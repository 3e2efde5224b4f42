//! pathql query engine.
//!
//! This crate turns a parsed query into a [`Query`] and evaluates its WHERE
//! expression against entity rows.
//!
//! # Overview
//!
//! - [`build_query`] walks the parse events and builds the expression tree,
//!   registering predicate declarations and resolving their invocations.
//! - [`Evaluator`] classifies every comparison as single- or dual-entity,
//!   filters or joins rows accordingly, and combines `&&`/`||` operands by
//!   row identity.
//! - [`RelationshipMap`] decides between a relationship join and a cross join.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use pathql_core::{row, EntityData};
//! use pathql_query::{build_query, EvaluationContext, Evaluator, RelationshipMap};
//!
//! let query = build_query("FROM class AS c WHERE c.name == \"MyClass\" SELECT c").unwrap();
//!
//! let mut data = EntityData::new();
//! data.insert("class".to_string(), vec![row! { "id" => 1, "name" => "MyClass" }]);
//! let context = EvaluationContext::new(Arc::new(RelationshipMap::new()), data);
//!
//! let result = Evaluator::for_query(&context, &query).execute(&query).unwrap();
//! assert_eq!(result.data, vec![row! { "id" => 1, "name" => "MyClass" }]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod builder;
pub mod error;
pub mod executor;
pub mod predicate;
pub mod relationship;
pub mod runtime;

pub use ast::*;
pub use builder::{build_expression, build_query, QueryBuilder};
pub use error::{DataError, PredicateResolutionError, QueryError, RuntimeError, StructuralError};
pub use executor::{
    detect_comparison_type, intersection, union, ComparisonType, EvaluationContext,
    EvaluationResult, Evaluator, EvaluatorOptions, IntermediateResult, ProxyEnv,
};
pub use predicate::{Parameter, Predicate, PredicateInvocation, PredicateRegistry};
pub use relationship::RelationshipMap;

/// Evaluate a tree with default options and no aliases.
///
/// A missing tree is a [`StructuralError::MissingNode`].
pub fn evaluate_expression_tree(
    node: Option<&ExpressionNode>,
    context: &EvaluationContext,
) -> Result<EvaluationResult, QueryError> {
    let node = node.ok_or(StructuralError::MissingNode)?;
    Evaluator::new(context).evaluate(node)
}
