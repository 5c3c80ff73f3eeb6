use crate::environment::{EnvError, Environment, ScopeId};
use crate::lexer::{Token, TokenKind};
use crate::types::{Binding, Body, Clause, Expr, Value};
use std::io::Write;
use thiserror::Error;

// --- Evaluation Error ---
/// Raised while evaluating; aborts the current top-level expression.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("RuntimeError [line {line}, column {column}]: {message}", line = .token.line, column = .token.column)]
pub struct RuntimeError {
    pub token: Token, // Operator or identifier the error is reported against
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        "RuntimeError"
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// Allow easy conversion from EnvError
impl From<EnvError> for RuntimeError {
    fn from(err: EnvError) -> Self {
        let message = err.to_string();
        match err {
            EnvError::UndefinedIdentifier(token) => RuntimeError { token, message },
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, RuntimeError>;

/// What `interpret` does after a top-level expression fails.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the program at the first RuntimeError.
    #[default]
    Halt,
    /// Abandon only the failing top-level expression and run the rest.
    Continue,
}

// Extracts both operands as numbers or returns a type error naming the operator
macro_rules! expect_numbers {
    ($operator:expr, $left:expr, $right:expr) => {
        match ($left.as_number(), $right.as_number()) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                return Err(RuntimeError::new(
                    $operator,
                    format!(
                        "Binary operator \"{}\" only operates on numbers",
                        $operator.lexeme
                    ),
                ));
            }
        }
    };
}

/// Tree-walking evaluator.
///
/// Owns the scope arena and the output sink. Every evaluation call receives
/// the scope it runs in explicitly; a `let` opens a child scope, passes it
/// down, and closes it again before returning, on error paths too.
pub struct Interpreter<W: Write> {
    env: Environment,
    out: W,
    policy: ErrorPolicy,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W) -> Self {
        Self::with_policy(out, ErrorPolicy::default())
    }

    pub fn with_policy(out: W, policy: ErrorPolicy) -> Self {
        Interpreter {
            env: Environment::new(),
            out,
            policy,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs a program, returning the value of its last top-level expression
    /// (`null` for an empty program).
    ///
    /// Under `ErrorPolicy::Halt` the first error ends the run and is the only
    /// one returned. Under `ErrorPolicy::Continue` every failing top-level
    /// expression is skipped and all errors are returned together.
    pub fn interpret(&mut self, program: &[Expr]) -> Result<Value, Vec<RuntimeError>> {
        let global = self.env.global();
        let mut last = Value::Null;
        let mut errors = Vec::new();
        for expr in program {
            match self.evaluate(expr, global) {
                Ok(value) => last = value,
                Err(err) => {
                    errors.push(err);
                    if self.policy == ErrorPolicy::Halt {
                        break;
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(last)
        } else {
            Err(errors)
        }
    }

    /// Evaluates one expression in `scope`, operands before operators.
    pub fn evaluate(&mut self, expr: &Expr, scope: ScopeId) -> EvalResult {
        match expr {
            Expr::Literal(value) => Ok(*value),
            Expr::Variable(name) => Ok(self.env.get(scope, name)?), // EnvError -> RuntimeError
            Expr::Unary { operator, operand } => self.evaluate_unary(operator, operand, scope),
            Expr::Binary {
                operator,
                left,
                right,
            } => self.evaluate_binary(operator, left, right, scope),
            Expr::Logical {
                operator,
                left,
                right,
            } => self.evaluate_logical(operator, left, right, scope),
            Expr::Group(items) => self.evaluate_sequence(items, scope),
            Expr::Print { operator, body } => self.evaluate_print(operator, body, scope),
            Expr::Let { bindings, body } => self.evaluate_let(bindings, body, scope),
            Expr::If {
                condition,
                then_body,
                else_body,
            } => self.evaluate_if(condition, then_body, else_body.as_ref(), scope),
            Expr::Cond { clauses, else_body } => {
                self.evaluate_cond(clauses, else_body.as_ref(), scope)
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, operand: &Expr, scope: ScopeId) -> EvalResult {
        let value = self.evaluate(operand, scope)?;
        match operator.kind {
            TokenKind::Not => Ok(Value::Boolean(!value.is_truthy())),
            TokenKind::TrueQ => Ok(Value::Boolean(value.is_truthy())),
            TokenKind::Minus | TokenKind::Plus => {
                let n = value.as_number().ok_or_else(|| {
                    RuntimeError::new(
                        operator,
                        format!("Expected number after unary operator \"{}\"", operator.lexeme),
                    )
                })?;
                Ok(Value::Number(if operator.kind == TokenKind::Minus { -n } else { n }))
            }
            _ => Err(RuntimeError::new(
                operator,
                format!("Unknown unary operator \"{}\"", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(
        &mut self,
        operator: &Token,
        left: &Expr,
        right: &Expr,
        scope: ScopeId,
    ) -> EvalResult {
        let left = self.evaluate(left, scope)?;
        let right = self.evaluate(right, scope)?;

        match operator.kind {
            // Structural equality, any kinds may be compared
            TokenKind::EqualTo => Ok(Value::Boolean(left == right)),
            TokenKind::NotEqualTo => Ok(Value::Boolean(left != right)),

            TokenKind::Plus => {
                let (l, r) = expect_numbers!(operator, left, right);
                Ok(Value::Number(l + r))
            }
            TokenKind::Minus => {
                let (l, r) = expect_numbers!(operator, left, right);
                Ok(Value::Number(l - r))
            }
            TokenKind::Star => {
                let (l, r) = expect_numbers!(operator, left, right);
                Ok(Value::Number(l * r))
            }
            TokenKind::Slash | TokenKind::SlashSlash | TokenKind::Percent => {
                let (l, r) = expect_numbers!(operator, left, right);
                if r == 0.0 {
                    return Err(RuntimeError::new(operator, "Cannot divide by 0"));
                }
                Ok(Value::Number(match operator.kind {
                    TokenKind::Slash => l / r,
                    TokenKind::SlashSlash => (l / r).floor(),
                    _ => l % r,
                }))
            }

            TokenKind::Greater => {
                let (l, r) = expect_numbers!(operator, left, right);
                Ok(Value::Boolean(l > r))
            }
            TokenKind::GreaterEqual => {
                let (l, r) = expect_numbers!(operator, left, right);
                Ok(Value::Boolean(l >= r))
            }
            TokenKind::Less => {
                let (l, r) = expect_numbers!(operator, left, right);
                Ok(Value::Boolean(l < r))
            }
            TokenKind::LessEqual => {
                let (l, r) = expect_numbers!(operator, left, right);
                Ok(Value::Boolean(l <= r))
            }

            _ => Err(RuntimeError::new(
                operator,
                format!("Unknown binary operator \"{}\"", operator.lexeme),
            )),
        }
    }

    // Only evaluates `right` when `left` does not decide the result
    fn evaluate_logical(
        &mut self,
        operator: &Token,
        left: &Expr,
        right: &Expr,
        scope: ScopeId,
    ) -> EvalResult {
        let left = self.evaluate(left, scope)?;
        let decided = match operator.kind {
            TokenKind::Or => left.is_truthy(),
            _ => !left.is_truthy(),
        };
        if decided {
            Ok(left)
        } else {
            self.evaluate(right, scope)
        }
    }

    // Evaluates each expression in order; the last value is the result
    fn evaluate_sequence(&mut self, exprs: &[Expr], scope: ScopeId) -> EvalResult {
        let mut last = Value::Null;
        for expr in exprs {
            last = self.evaluate(expr, scope)?;
        }
        Ok(last)
    }

    fn evaluate_body(&mut self, body: &Body, scope: ScopeId) -> EvalResult {
        self.evaluate_sequence(&body.0, scope)
    }

    fn evaluate_print(&mut self, operator: &Token, body: &[Expr], scope: ScopeId) -> EvalResult {
        let newline = operator.kind == TokenKind::Println;
        for expr in body {
            let value = self.evaluate(expr, scope)?;
            let written = if newline {
                writeln!(self.out, "{}", value)
            } else {
                write!(self.out, "{}", value)
            };
            written
                .and_then(|_| self.out.flush())
                .map_err(|e| RuntimeError::new(operator, format!("Failed to write output: {}", e)))?;
        }
        Ok(Value::Null)
    }

    fn evaluate_let(&mut self, bindings: &[Binding], body: &Body, scope: ScopeId) -> EvalResult {
        let inner = self.env.push(scope);
        let result = self.evaluate_let_in(bindings, body, inner);
        // Popped whether or not the body succeeded
        self.env.pop(inner);
        result
    }

    fn evaluate_let_in(&mut self, bindings: &[Binding], body: &Body, inner: ScopeId) -> EvalResult {
        for binding in bindings {
            // Earlier bindings of the same let are already visible here
            let value = self.evaluate(&binding.value, inner)?;
            self.env.define(inner, &binding.name.lexeme, value);
        }
        self.evaluate_body(body, inner)
    }

    fn evaluate_if(
        &mut self,
        condition: &Expr,
        then_body: &Body,
        else_body: Option<&Body>,
        scope: ScopeId,
    ) -> EvalResult {
        if self.evaluate(condition, scope)?.is_truthy() {
            self.evaluate_body(then_body, scope)
        } else if let Some(else_body) = else_body {
            self.evaluate_body(else_body, scope)
        } else {
            Ok(Value::Null)
        }
    }

    fn evaluate_cond(
        &mut self,
        clauses: &[Clause],
        else_body: Option<&Body>,
        scope: ScopeId,
    ) -> EvalResult {
        for clause in clauses {
            if self.evaluate(&clause.condition, scope)?.is_truthy() {
                return self.evaluate_body(&clause.body, scope);
            }
        }
        match else_body {
            Some(body) => self.evaluate_body(body, scope),
            None => Ok(Value::Null),
        }
    }
}
