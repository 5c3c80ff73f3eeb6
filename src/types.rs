use crate::lexer::Token;
use std::fmt; // For custom display formatting

/// A runtime value. The language only has scalars, so values are `Copy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    Null,
}

impl Value {
    /// `null`, `false` and `0` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // f64's Display already drops the fractional part of whole values
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

/// One `name value` pair inside a `let`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Token,
    pub value: Expr,
}

/// A non-empty sequence of expressions; its value is the value of the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct Body(pub Vec<Expr>);

/// One `(condition body...)` arm of a `cond`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub condition: Expr,
    pub body: Body,
}

/// The AST. Built by the parser, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(Token),
    Unary {
        operator: Token,
        operand: Box<Expr>,
    },
    /// Strictly binary; `(+ 1 2 3)` arrives here as `(+ (+ 1 2) 3)`.
    Binary {
        operator: Token,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `and` / `or`, short-circuiting.
    Logical {
        operator: Token,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Group(Vec<Expr>),
    /// `print` or `println`, told apart by the operator token.
    Print {
        operator: Token,
        body: Vec<Expr>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Body,
    },
    If {
        condition: Box<Expr>,
        then_body: Body,
        else_body: Option<Body>,
    },
    Cond {
        clauses: Vec<Clause>,
        else_body: Option<Body>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(-0.0).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Number(1.0).is_truthy());
        assert!(Value::Number(-0.5).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(6.0).to_string(), "6");
        assert_eq!(Value::Number(-2.0).to_string(), "-2");
        assert_eq!(Value::Number(2.75).to_string(), "2.75");
        assert_eq!(Value::Number(0.1).to_string(), "0.1");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Boolean(false).to_string(), "false");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_equality_by_kind_and_content() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Boolean(false));
        assert_ne!(Value::Null, Value::Number(0.0));
        assert_ne!(Value::Boolean(true), Value::Number(1.0));
        assert_eq!(Value::Number(2.0), Value::Number(2.0));
    }
}
