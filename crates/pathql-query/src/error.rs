//! Query error types.
//!
//! Every failure is terminal for the call that produced it: building stops at
//! the first resolution error and evaluation returns no rows once any node
//! fails.

use pathql_parser::SyntaxErrors;
use thiserror::Error;

/// A malformed or unsupported expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// No expression was supplied where one is required.
    #[error("missing expression node")]
    MissingNode,
    /// A comparison operand mixes several entity references.
    #[error("unsupported node shape: `{0}` references more than one entity")]
    UnsupportedShape(String),
    /// A single-entity comparison references two different rows.
    #[error("comparison `{expression}` references both `{first}` and `{second}`")]
    MixedReferences {
        /// Rendered comparison.
        expression: String,
        /// First reference.
        first: String,
        /// Second reference.
        second: String,
    },
    /// The builder stack did not reduce to a single root.
    #[error("expression stack holds {0} entries after the WHERE clause, expected 1")]
    UnbalancedStack(usize),
    /// An operator found the wrong kind of entries on the builder stack.
    #[error("malformed expression stack while closing `{0}`")]
    MalformedStack(String),
    /// Two select items share an alias.
    #[error("duplicate alias `{0}` in FROM clause")]
    DuplicateAlias(String),
    /// Predicate expansion nested too deeply.
    #[error("predicate `{name}` exceeds the expansion depth of {limit}")]
    PredicateDepth {
        /// Predicate being expanded.
        name: String,
        /// Configured limit.
        limit: usize,
    },
    /// An expanded predicate body is not a valid expression.
    #[error("body of predicate `{name}` does not parse after substitution: {errors}")]
    PredicateBody {
        /// Predicate being expanded.
        name: String,
        /// Syntax errors in the expanded body.
        errors: SyntaxErrors,
    },
}

/// Entity data that the expression needs but the context cannot supply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// No rows were supplied for a referenced entity type.
    #[error("no data for entity `{0}`")]
    MissingEntity(String),
    /// A comparison has nothing to filter.
    #[error("comparison `{0}` references no entity")]
    NoEntity(String),
    /// Proxy environments are not index-aligned with the rows.
    #[error("entity `{entity}` has {rows} rows but {envs} proxy environments")]
    ProxyLength {
        /// Entity type.
        entity: String,
        /// Number of rows.
        rows: usize,
        /// Number of environments.
        envs: usize,
    },
    /// A dual-entity comparison visits more pairs than allowed.
    #[error("comparison of `{left}` and `{right}` exceeds the limit of {limit} row pairs")]
    JoinLimit {
        /// Left entity.
        left: String,
        /// Right entity.
        right: String,
        /// Configured limit.
        limit: usize,
    },
}

/// A predicate invocation that does not bind to exactly one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateResolutionError {
    /// No declaration has this name.
    #[error("undefined predicate `{0}`")]
    Undefined(String),
    /// Declarations exist but none has the arity and parameter types.
    #[error("no matching predicate for `{name}({types})`")]
    NoMatch {
        /// Predicate name.
        name: String,
        /// Inferred argument types, comma separated.
        types: String,
    },
    /// More than one declaration matches.
    #[error("ambiguous invocation of `{name}`: {candidates} declarations match")]
    Ambiguous {
        /// Predicate name.
        name: String,
        /// Number of matching declarations.
        candidates: usize,
    },
}

/// Failure compiling or running a row expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The expression text does not compile.
    #[error("compile error: {0}")]
    Compile(String),
    /// A name is not bound in the environment.
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    /// An object has no such member.
    #[error("unknown member `{member}` on `{object}`")]
    UnknownMember {
        /// Path of the object.
        object: String,
        /// Missing member.
        member: String,
    },
    /// A call target is not a method.
    #[error("`{0}` is not callable")]
    NotCallable(String),
    /// Operand types do not fit the operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// The expression produced something other than a boolean.
    #[error("expression produced {0}, expected a boolean")]
    NotBoolean(String),
    /// A bound method reported failure.
    #[error("method `{name}` failed: {message}")]
    Method {
        /// Method name.
        name: String,
        /// Failure message.
        message: String,
    },
}

/// Error returned when building or evaluating a query fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query does not parse.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxErrors),
    /// The expression tree is malformed or unsupported.
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),
    /// Required entity data is missing or inconsistent.
    #[error("data error: {0}")]
    Data(#[from] DataError),
    /// A predicate invocation did not resolve.
    #[error("predicate resolution error: {0}")]
    Predicate(#[from] PredicateResolutionError),
    /// A row expression failed to compile or run.
    #[error("expression runtime error in `{expression}`: {source}")]
    Runtime {
        /// Expression text handed to the runtime.
        expression: String,
        /// Runtime failure.
        source: RuntimeError,
    },
}

impl QueryError {
    /// Wrap a runtime failure with the expression it came from.
    pub fn runtime(expression: impl Into<String>, source: RuntimeError) -> Self {
        Self::Runtime {
            expression: expression.into(),
            source,
        }
    }
}
