//! Predicate declarations and call-site resolution.
//!
//! Predicates may be overloaded by parameter type. An invocation binds to the
//! single declaration whose name, arity and parameter types match the call.
//! Argument types are inferred from the select list: the first alias whose
//! text occurs in the argument's source gives the argument its entity type.

use pathql_parser::logos_lexer::{tokenize, Token};
use serde::{Deserialize, Serialize};

use crate::ast::SelectItem;
use crate::error::PredicateResolutionError;

/// A typed predicate parameter, or an actual argument with its inferred type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, or the argument text at a call site.
    pub name: String,
    /// Declared or inferred entity type, empty when unknown.
    pub param_type: String,
    /// Default value. Declarations have no syntax for it, so it stays empty.
    pub default_value: String,
}

impl Parameter {
    /// Create a parameter without default.
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            default_value: String::new(),
        }
    }
}

/// A predicate declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Predicate name.
    pub name: String,
    /// Parameters in order.
    pub parameters: Vec<Parameter>,
    /// Body expression source text.
    pub body: String,
}

impl Predicate {
    /// Substitute call-site arguments for the parameters in the body.
    ///
    /// Only identifiers not preceded by `.` are replaced, so a parameter named
    /// like an attribute (`m.name` with parameter `name`) is left alone.
    /// Arguments that are not a plain path are parenthesised. Comments are
    /// dropped.
    ///
    /// ```
    /// use pathql_query::{Parameter, Predicate};
    ///
    /// let predicate = Predicate {
    ///     name: "named".to_string(),
    ///     parameters: vec![Parameter::new("m", "method"), Parameter::new("name", "")],
    ///     body: "m.name == name".to_string(),
    /// };
    /// let args = ["md".to_string(), "\"main\"".to_string()];
    /// assert_eq!(predicate.expand(&args), "md.name == \"main\"");
    /// ```
    pub fn expand(&self, args: &[String]) -> String {
        let mut out = String::with_capacity(self.body.len());
        let mut last_end = 0;
        let mut previous: Option<Token<'_>> = None;

        for (token, span) in tokenize(&self.body) {
            push_gap(&mut out, &self.body[last_end..span.start]);
            let text = span.text(&self.body);
            let replacement = match token {
                Token::Ident(name) if previous != Some(Token::Dot) => self
                    .parameters
                    .iter()
                    .zip(args)
                    .find(|(param, _)| param.name == name)
                    .map(|(_, arg)| arg),
                _ => None,
            };
            match replacement {
                Some(arg) if is_plain_path(arg) => out.push_str(arg),
                Some(arg) => {
                    out.push('(');
                    out.push_str(arg);
                    out.push(')');
                }
                None => out.push_str(text),
            }
            last_end = span.end;
            previous = Some(token);
        }

        push_gap(&mut out, &self.body[last_end..]);
        out
    }
}

/// Keep whitespace between tokens, collapse comments to a space.
fn push_gap(out: &mut String, gap: &str) {
    if gap.trim().is_empty() {
        out.push_str(gap);
    } else {
        out.push(' ');
    }
}

fn is_plain_path(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// A call site and the declaration it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateInvocation {
    /// Predicate name.
    pub name: String,
    /// Actual arguments with inferred types.
    pub parameters: Vec<Parameter>,
    /// Resolved declaration.
    pub predicate: Option<Predicate>,
}

/// Predicate declarations, overloads included, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateRegistry {
    declarations: Vec<Predicate>,
}

impl PredicateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. Overloads share a name.
    pub fn declare(&mut self, predicate: Predicate) {
        tracing::debug!(
            "declared predicate {}({})",
            predicate.name,
            predicate
                .parameters
                .iter()
                .map(|p| p.param_type.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.declarations.push(predicate);
    }

    /// Declarations named `name`.
    pub fn get<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Predicate> + 'a {
        self.declarations.iter().filter(move |p| p.name == name)
    }

    /// All declarations.
    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.declarations.iter()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Resolve a call of `name` with argument texts `args`.
    ///
    /// Filters by name, then arity, then positional parameter type against the
    /// type inferred for each argument.
    pub fn resolve(
        &self,
        name: &str,
        args: &[String],
        select_list: &[SelectItem],
    ) -> Result<PredicateInvocation, PredicateResolutionError> {
        let parameters: Vec<Parameter> = args
            .iter()
            .map(|arg| Parameter::new(arg.clone(), infer_type(arg, select_list)))
            .collect();

        let named: Vec<&Predicate> = self.get(name).collect();
        if named.is_empty() {
            return Err(PredicateResolutionError::Undefined(name.to_string()));
        }

        let matching: Vec<&Predicate> = named
            .into_iter()
            .filter(|p| p.parameters.len() == parameters.len())
            .filter(|p| {
                p.parameters
                    .iter()
                    .zip(&parameters)
                    .all(|(declared, actual)| declared.param_type == actual.param_type)
            })
            .collect();

        match matching.as_slice() {
            [predicate] => {
                tracing::debug!("resolved {}({})", name, args.join(", "));
                Ok(PredicateInvocation {
                    name: name.to_string(),
                    parameters,
                    predicate: Some((*predicate).clone()),
                })
            }
            [] => Err(PredicateResolutionError::NoMatch {
                name: name.to_string(),
                types: parameters
                    .iter()
                    .map(|p| p.param_type.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            candidates => Err(PredicateResolutionError::Ambiguous {
                name: name.to_string(),
                candidates: candidates.len(),
            }),
        }
    }
}

impl<'a> IntoIterator for &'a PredicateRegistry {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.declarations.iter()
    }
}

/// Entity type of the first select item whose alias occurs in `argument`.
pub fn infer_type(argument: &str, select_list: &[SelectItem]) -> String {
    select_list
        .iter()
        .find(|item| argument.contains(item.alias.as_str()))
        .map(|item| item.entity.clone())
        .unwrap_or_default()
}
