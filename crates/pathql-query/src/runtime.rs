//! Row expression runtime.
//!
//! Compiles comparison text into a small expression tree and evaluates it
//! against a binding environment. Bindings are plain values, nested objects
//! (one per row reference) or callables supplied by the host.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use pathql_core::{Row, Value};
use pathql_parser::logos_lexer::{tokenize, unescape, Token};
use pathql_parser::{BinaryOperator, Span, UnaryOperator};

use crate::error::RuntimeError;

type MethodFn = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// A host callable bound in an [`Env`].
#[derive(Clone)]
pub struct Method {
    name: String,
    func: Arc<MethodFn>,
}

impl Method {
    /// Wrap a closure as a method.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with evaluated arguments.
    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.func)(args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish_non_exhaustive()
    }
}

/// What a name is bound to.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A plain value.
    Value(Value),
    /// A nested environment, accessed with `.`.
    Object(Env),
    /// A callable.
    Method(Method),
}

/// A binding environment. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct Env {
    bindings: Arc<HashMap<String, Binding>>,
}

impl Env {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        Arc::make_mut(&mut self.bindings).insert(name.into(), binding);
    }

    /// Builder-style [`Env::insert`] of a value.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, Binding::Value(value.into()));
        self
    }

    /// Builder-style [`Env::insert`] of a nested environment.
    #[must_use]
    pub fn with_object(mut self, name: impl Into<String>, object: Self) -> Self {
        self.insert(name, Binding::Object(object));
        self
    }

    /// Builder-style [`Env::insert`] of a method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        let name = method.name.clone();
        self.insert(name, Binding::Method(method));
        self
    }

    /// Binding for `name`.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Environment exposing a row's attributes.
    ///
    /// Every attribute `name` is also reachable through a `getName()` getter
    /// unless the row has an attribute of that name itself.
    pub fn from_row(row: &Row) -> Self {
        let mut bindings = HashMap::with_capacity(row.len() * 2);
        for (key, value) in row {
            bindings.insert(key.clone(), Binding::Value(value.clone()));
        }
        for (key, value) in row {
            let getter = getter_name(key);
            if !row.contains_key(&getter) {
                bindings.insert(getter, Binding::Value(value.clone()));
            }
        }
        Self {
            bindings: Arc::new(bindings),
        }
    }
}

fn getter_name(attribute: &str) -> String {
    let mut chars = attribute.chars();
    match chars.next() {
        Some(first) => format!("get{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "get".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOperator, Box<Expr>),
    Binary(BinaryOperator, Box<Expr>, Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Ident(name) => write!(f, "{name}"),
            Self::Member(object, member) => write!(f, "{object}.{member}"),
            Self::Call(callee, _) => write!(f, "{callee}(..)"),
            Self::Unary(op, operand) => write!(f, "{op}{operand}"),
            Self::Binary(op, left, right) => write!(f, "({left} {op} {right})"),
        }
    }
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    root: Expr,
}

/// Compile expression text.
///
/// ```
/// use pathql_query::runtime::{compile, Env};
///
/// let program = compile("c.name == \"MyClass\" && c.methodCount > 2").unwrap();
/// let row = Env::new().with_value("name", "MyClass").with_value("methodCount", 3);
/// let env = Env::new().with_object("c", row);
/// assert_eq!(program.run(&env).unwrap(), true.into());
/// ```
pub fn compile(text: &str) -> Result<Program, RuntimeError> {
    let mut compiler = Compiler {
        source: text,
        tokens: tokenize(text),
        pos: 0,
    };
    let root = compiler.expression(0)?;
    if let Some((_, span)) = compiler.tokens.get(compiler.pos) {
        return Err(compiler.error_at(*span, "expected end of expression"));
    }
    Ok(Program {
        source: text.to_string(),
        root,
    })
}

struct Compiler<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, Span)>,
    pos: usize,
}

impl<'src> Compiler<'src> {
    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).map(|(token, _)| *token)
    }

    fn bump(&mut self) -> Option<(Token<'src>, Span)> {
        let next = self.tokens.get(self.pos).copied();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn error_at(&self, span: Span, expected: &str) -> RuntimeError {
        RuntimeError::Compile(format!(
            "unexpected '{}' at offset {}, {expected}",
            span.text(self.source),
            span.start
        ))
    }

    fn expect(&mut self, want: Token<'src>, expected: &str) -> Result<(), RuntimeError> {
        match self.bump() {
            Some((token, _)) if token == want => Ok(()),
            Some((_, span)) => Err(self.error_at(span, expected)),
            None => Err(RuntimeError::Compile(format!("unexpected end of input, {expected}"))),
        }
    }

    /// Precedence climbing over binary operators.
    fn expression(&mut self, min_precedence: u8) -> Result<Expr, RuntimeError> {
        let mut lhs = self.prefix()?;
        while let Some(op) = self.peek().as_ref().and_then(BinaryOperator::from_token) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(precedence + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, RuntimeError> {
        if let Some(op) = self.peek().as_ref().and_then(UnaryOperator::from_token) {
            self.pos += 1;
            let operand = self.prefix()?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        let primary = self.primary()?;
        self.postfix(primary)
    }

    fn primary(&mut self) -> Result<Expr, RuntimeError> {
        let Some((token, span)) = self.bump() else {
            return Err(RuntimeError::Compile(
                "unexpected end of input, expected operand".to_string(),
            ));
        };
        match token {
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen, "expected ')'")?;
                Ok(inner)
            }
            Token::Ident(name) => Ok(Expr::Ident(name.to_string())),
            Token::Number(text) => text
                .parse::<f64>()
                .map(|n| Expr::Literal(Value::Number(n)))
                .map_err(|_| self.error_at(span, "expected number")),
            Token::String(text) => Ok(Expr::Literal(Value::String(unescape(text)))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            _ => Err(self.error_at(span, "expected operand")),
        }
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, RuntimeError> {
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.bump() {
                        Some((token, span)) if token.is_word() => {
                            expr = Expr::Member(Box::new(expr), span.text(self.source).to_string());
                        }
                        Some((_, span)) => return Err(self.error_at(span, "expected member name")),
                        None => {
                            return Err(RuntimeError::Compile(
                                "unexpected end of input, expected member name".to_string(),
                            ));
                        }
                    }
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(Token::RParen) {
                        loop {
                            args.push(self.expression(0)?);
                            if self.peek() == Some(Token::Comma) {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen, "expected ')'")?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }
}

impl Program {
    /// Source text the program was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `env`.
    pub fn run(&self, env: &Env) -> Result<Value, RuntimeError> {
        evaluate_expr(&self.root, env)
    }
}

fn evaluate_expr(expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Unary(op, operand) => evaluate_unary_op(*op, operand, env),
        Expr::Binary(op, left, right) => evaluate_binary_op(*op, left, right, env),
        Expr::Ident(_) | Expr::Member(..) | Expr::Call(..) => match resolve(expr, env)? {
            Binding::Value(value) => Ok(value),
            Binding::Object(_) => Err(RuntimeError::TypeMismatch(format!(
                "`{expr}` is an object, not a value"
            ))),
            Binding::Method(method) => Err(RuntimeError::TypeMismatch(format!(
                "method `{}` used without a call",
                method.name
            ))),
        },
    }
}

/// Resolve a path or call to its binding.
fn resolve(expr: &Expr, env: &Env) -> Result<Binding, RuntimeError> {
    match expr {
        Expr::Ident(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownIdentifier(name.clone())),
        Expr::Member(object, member) => match resolve(object, env)? {
            Binding::Object(inner) => {
                inner
                    .get(member)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownMember {
                        object: object.to_string(),
                        member: member.clone(),
                    })
            }
            Binding::Value(value) => value_method(&value, member)
                .map(Binding::Method)
                .ok_or_else(|| RuntimeError::UnknownMember {
                    object: object.to_string(),
                    member: member.clone(),
                }),
            Binding::Method(method) => Err(RuntimeError::UnknownMember {
                object: method.name,
                member: member.clone(),
            }),
        },
        Expr::Call(callee, args) => {
            let args = args
                .iter()
                .map(|arg| evaluate_expr(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            match resolve(callee, env)? {
                Binding::Method(method) => method.call(&args).map(Binding::Value),
                // Getter-style proxy entries are plain values.
                Binding::Value(value) if args.is_empty() => Ok(Binding::Value(value)),
                _ => Err(RuntimeError::NotCallable(callee.to_string())),
            }
        }
        other => evaluate_expr(other, env).map(Binding::Value),
    }
}

/// Built-in methods on string and list values.
fn value_method(value: &Value, name: &str) -> Option<Method> {
    let receiver = value.clone();
    let method = match (value, name) {
        (Value::String(_) | Value::List(_), "length" | "size") => {
            Method::new(name, move |_| Ok(Value::from(length(&receiver))))
        }
        (Value::String(_) | Value::List(_), "isEmpty") => {
            Method::new(name, move |_| Ok(Value::Bool(length(&receiver) == 0)))
        }
        (Value::String(_) | Value::List(_), "contains") => {
            Method::new(name, move |args| match (&receiver, single_arg("contains", args)?) {
                (Value::String(s), Value::String(needle)) => Ok(Value::Bool(s.contains(needle.as_str()))),
                (Value::List(items), needle) => Ok(Value::Bool(items.iter().any(|i| i.loose_eq(needle)))),
                (_, other) => Err(RuntimeError::Method {
                    name: "contains".to_string(),
                    message: format!("expected a string argument, got {}", other.type_name()),
                }),
            })
        }
        (Value::String(_), "startsWith" | "endsWith") => {
            let method_name = name.to_string();
            Method::new(name, move |args| {
                let prefix = string_arg(&method_name, args)?;
                let s = receiver.as_str().unwrap_or_default();
                Ok(Value::Bool(if method_name == "startsWith" {
                    s.starts_with(prefix)
                } else {
                    s.ends_with(prefix)
                }))
            })
        }
        (Value::String(s), "toLowerCase") => {
            let lower = s.to_lowercase();
            Method::new(name, move |_| Ok(Value::String(lower.clone())))
        }
        (Value::String(s), "toUpperCase") => {
            let upper = s.to_uppercase();
            Method::new(name, move |_| Ok(Value::String(upper.clone())))
        }
        _ => return None,
    };
    Some(method)
}

fn length(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        _ => 0,
    }
}

fn single_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, RuntimeError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(RuntimeError::Method {
            name: name.to_string(),
            message: format!("expected 1 argument, got {}", args.len()),
        }),
    }
}

fn string_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a str, RuntimeError> {
    single_arg(name, args)?
        .as_str()
        .ok_or_else(|| RuntimeError::Method {
            name: name.to_string(),
            message: "expected a string argument".to_string(),
        })
}

fn evaluate_unary_op(op: UnaryOperator, operand: &Expr, env: &Env) -> Result<Value, RuntimeError> {
    let value = evaluate_expr(operand, env)?;
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!to_bool(&value)?)),
        UnaryOperator::Neg => match value {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(RuntimeError::TypeMismatch(format!(
                "negation requires a number, got {}",
                other.type_name()
            ))),
        },
    }
}

fn evaluate_binary_op(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    env: &Env,
) -> Result<Value, RuntimeError> {
    let left = evaluate_expr(left, env)?;
    // Logical operators short-circuit.
    match (op, to_bool(&left)) {
        (BinaryOperator::And, Ok(false)) => return Ok(Value::Bool(false)),
        (BinaryOperator::Or, Ok(true)) => return Ok(Value::Bool(true)),
        _ => {}
    }
    let right = evaluate_expr(right, env)?;
    apply_binary_op(op, &left, &right)
}

fn apply_binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOperator::And => Ok(Value::Bool(to_bool(left)? && to_bool(right)?)),
        BinaryOperator::Or => Ok(Value::Bool(to_bool(left)? || to_bool(right)?)),
        BinaryOperator::Eq => Ok(Value::Bool(left.loose_eq(right))),
        BinaryOperator::NotEq => Ok(Value::Bool(!left.loose_eq(right))),
        BinaryOperator::Lt => compare_values(left, right, std::cmp::Ordering::is_lt),
        BinaryOperator::LtEq => compare_values(left, right, std::cmp::Ordering::is_le),
        BinaryOperator::Gt => compare_values(left, right, std::cmp::Ordering::is_gt),
        BinaryOperator::GtEq => compare_values(left, right, std::cmp::Ordering::is_ge),
        BinaryOperator::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => arithmetic_op(op, left, right, |a, b| a + b),
        },
        BinaryOperator::Sub => arithmetic_op(op, left, right, |a, b| a - b),
        BinaryOperator::Mul => arithmetic_op(op, left, right, |a, b| a * b),
        BinaryOperator::Div => {
            check_divisor(right)?;
            arithmetic_op(op, left, right, |a, b| a / b)
        }
        BinaryOperator::Rem => {
            check_divisor(right)?;
            arithmetic_op(op, left, right, |a, b| a % b)
        }
    }
}

fn compare_values<F>(left: &Value, right: &Value, pred: F) -> Result<Value, RuntimeError>
where
    F: FnOnce(std::cmp::Ordering) -> bool,
{
    left.loose_cmp(right)
        .map(|ord| Value::Bool(pred(ord)))
        .ok_or_else(|| {
            RuntimeError::TypeMismatch(format!(
                "cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))
        })
}

fn arithmetic_op<F>(op: BinaryOperator, left: &Value, right: &Value, f: F) -> Result<Value, RuntimeError>
where
    F: FnOnce(f64, f64) -> f64,
{
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(*a, *b))),
        _ => Err(RuntimeError::TypeMismatch(format!(
            "`{op}` requires numbers, got {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn check_divisor(value: &Value) -> Result<(), RuntimeError> {
    match value {
        Value::Number(n) if *n == 0.0 => Err(RuntimeError::DivisionByZero),
        _ => Ok(()),
    }
}

fn to_bool(value: &Value) -> Result<bool, RuntimeError> {
    value.as_bool().ok_or_else(|| {
        RuntimeError::TypeMismatch(format!("expected boolean, got {}", value.type_name()))
    })
}

/// Compiles and runs expressions, caching compiled programs by text.
#[derive(Debug, Default)]
pub struct Runtime {
    cache: Option<Mutex<HashMap<String, Arc<Program>>>>,
}

impl Runtime {
    /// Create a runtime, with or without the compile cache.
    pub fn new(cache: bool) -> Self {
        Self {
            cache: cache.then(Mutex::default),
        }
    }

    /// Compile `text`, reusing a cached program when possible.
    pub fn compile(&self, text: &str) -> Result<Arc<Program>, RuntimeError> {
        let Some(cache) = &self.cache else {
            return compile(text).map(Arc::new);
        };
        if let Some(program) = cache.lock().get(text) {
            return Ok(Arc::clone(program));
        }
        tracing::debug!("compiling expression `{}`", text);
        let program = Arc::new(compile(text)?);
        cache.lock().insert(text.to_string(), Arc::clone(&program));
        Ok(program)
    }

    /// Evaluate `text` to a value.
    pub fn value(&self, text: &str, env: &Env) -> Result<Value, RuntimeError> {
        self.compile(text)?.run(env)
    }

    /// Evaluate `text`, requiring a boolean result.
    pub fn evaluate(&self, text: &str, env: &Env) -> Result<bool, RuntimeError> {
        match self.value(text, env)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::NotBoolean(other.type_name().to_string())),
        }
    }

    /// Number of cached programs.
    pub fn cached(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathql_core::row;

    fn class_env() -> Env {
        let class = Env::from_row(&row! {
            "id" => 1,
            "name" => "MyClass",
            "methodCount" => 3,
            "tags" => vec!["a", "b"],
        });
        Env::new().with_object("c", class)
    }

    fn eval(text: &str) -> Result<Value, RuntimeError> {
        compile(text)?.run(&class_env())
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("c.name == \"MyClass\""), Ok(Value::Bool(true)));
        assert_eq!(eval("c.methodCount >= 3"), Ok(Value::Bool(true)));
        assert_eq!(eval("c.methodCount < \"10\""), Ok(Value::Bool(true)));
        assert_eq!(eval("c.name != \"Other\""), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3 == 7"), Ok(Value::Bool(true)));
        assert_eq!(eval("(1 + 2) * 3"), Ok(Value::Number(9.0)));
        assert_eq!(eval("-c.methodCount + 4"), Ok(Value::Number(1.0)));
        assert_eq!(eval("10 - 4 - 3"), Ok(Value::Number(3.0)));
    }

    #[test]
    fn test_short_circuit() {
        // The right operand would fail if evaluated.
        assert_eq!(eval("false && c.missing"), Ok(Value::Bool(false)));
        assert_eq!(eval("true || c.missing"), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_getters_and_builtins() {
        assert_eq!(eval("c.getName()"), Ok(Value::from("MyClass")));
        assert_eq!(eval("c.name.startsWith(\"My\")"), Ok(Value::Bool(true)));
        assert_eq!(eval("c.tags.contains(\"b\")"), Ok(Value::Bool(true)));
        assert_eq!(eval("c.name.length()"), Ok(Value::Number(7.0)));
        assert_eq!(eval("c.name + \"!\""), Ok(Value::from("MyClass!")));
    }

    #[test]
    fn test_keyword_member_names() {
        let object = Env::from_row(&row! {
            "as" => 1,
            "select" => "all",
            "null" => true,
        });
        let env = Env::new().with_object("c", object);
        let program = compile("c.as == 1 && c.select == \"all\" && c.null").unwrap();
        assert_eq!(program.run(&env), Ok(Value::Bool(true)));
        assert!(matches!(compile("c.1"), Err(RuntimeError::Compile(_))));
    }

    #[test]
    fn test_host_methods() {
        let class = Env::new().with_method(Method::new("hasParam", |args| {
            Ok(Value::Bool(args.first() == Some(&Value::from("x"))))
        }));
        let env = Env::new().with_object("m", class);
        let program = compile("m.hasParam(\"x\")").unwrap();
        assert_eq!(program.run(&env), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            eval("x.name == 1"),
            Err(RuntimeError::UnknownIdentifier("x".to_string()))
        );
        assert!(matches!(
            eval("c.nope == 1"),
            Err(RuntimeError::UnknownMember { .. })
        ));
        assert!(matches!(eval("c == 1"), Err(RuntimeError::TypeMismatch(_))));
        assert!(matches!(eval("c.name > 1"), Err(RuntimeError::TypeMismatch(_))));
        assert!(matches!(eval("c.name(1)"), Err(RuntimeError::NotCallable(_))));
        assert_eq!(eval("1 / 0"), Err(RuntimeError::DivisionByZero));
        assert!(matches!(compile("c.name =="), Err(RuntimeError::Compile(_))));
        assert!(matches!(compile("c.name == 1 1"), Err(RuntimeError::Compile(_))));
        assert!(matches!(compile("c.name == $"), Err(RuntimeError::Compile(_))));
    }

    #[test]
    fn test_runtime_requires_boolean() {
        let runtime = Runtime::new(true);
        assert_eq!(
            runtime.evaluate("c.methodCount", &class_env()),
            Err(RuntimeError::NotBoolean("number".to_string()))
        );
    }

    #[test]
    fn test_cache_reuses_programs() {
        let runtime = Runtime::new(true);
        for _ in 0..3 {
            assert_eq!(runtime.evaluate("c.methodCount == 3", &class_env()), Ok(true));
        }
        assert_eq!(runtime.cached(), 1);

        let uncached = Runtime::new(false);
        assert_eq!(uncached.evaluate("c.methodCount == 3", &class_env()), Ok(true));
        assert_eq!(uncached.cached(), 0);
    }
}
