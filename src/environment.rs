use crate::lexer::Token;
use crate::types::Value;
use std::collections::HashMap;
use thiserror::Error;

// --- Environment Error ---
// Converted into a RuntimeError by the evaluator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Undefined identifier \"{}\"", .0.lexeme)]
    UndefinedIdentifier(Token), // The identifier token, for its name and location
}

/// Handle to one scope frame in an `Environment`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Frame {
    parent: Option<ScopeId>,
    bindings: HashMap<String, Value>,
}

/// Arena of scope frames addressed by `ScopeId`.
///
/// Frame 0 is the global scope and has no parent. Every other frame is pushed
/// on entry to a `let` and popped when that `let` finishes, so the arena is a
/// stack and a child never outlives its parent.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Creates an environment holding only the global scope.
    pub fn new() -> Self {
        Environment {
            frames: vec![Frame::default()],
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Number of live frames, the global one included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a new scope enclosed by `parent`.
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.frames.push(Frame {
            parent: Some(parent),
            bindings: HashMap::new(),
        });
        ScopeId(self.frames.len() - 1)
    }

    /// Discards `scope` and anything opened after it. The global scope is never popped.
    pub fn pop(&mut self, scope: ScopeId) {
        debug_assert_eq!(scope.0 + 1, self.frames.len(), "scopes must be popped in LIFO order");
        self.frames.truncate(scope.0.max(1));
    }

    /// Defines a variable in `scope` itself, overwriting a binding of the same
    /// name in that frame. Enclosing frames are never touched.
    pub fn define(&mut self, scope: ScopeId, name: &str, value: Value) {
        self.frames[scope.0].bindings.insert(name.to_string(), value);
    }

    /// Looks up a variable, walking from `scope` out to the global frame.
    /// `name` is the referencing token, kept for error reporting.
    pub fn get(&self, scope: ScopeId, name: &Token) -> Result<Value, EnvError> {
        let mut current = Some(scope);
        while let Some(ScopeId(index)) = current {
            let frame = &self.frames[index];
            if let Some(value) = frame.bindings.get(&name.lexeme) {
                return Ok(*value);
            }
            current = frame.parent;
        }
        Err(EnvError::UndefinedIdentifier(name.clone()))
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    // Helper to get an identifier token for lookups
    fn ident(name: &str) -> Token {
        tokenize(name).remove(0)
    }

    #[test]
    fn test_define_and_get_global() {
        let mut env = Environment::new();
        let global = env.global();
        env.define(global, "x", Value::Number(10.0));
        assert_eq!(env.get(global, &ident("x")), Ok(Value::Number(10.0)));
    }

    #[test]
    fn test_get_undefined_global() {
        let env = Environment::new();
        let result = env.get(env.global(), &ident("y"));
        assert!(matches!(result, Err(EnvError::UndefinedIdentifier(t)) if t.lexeme == "y"));
    }

    #[test]
    fn test_define_and_get_enclosed() {
        let mut env = Environment::new();
        let global = env.global();
        env.define(global, "x", Value::Number(10.0));

        let local = env.push(global);
        env.define(local, "y", Value::Number(20.0));

        assert_eq!(env.get(local, &ident("y")), Ok(Value::Number(20.0)));
        assert_eq!(env.get(local, &ident("x")), Ok(Value::Number(10.0)));
        // y is invisible from the outside
        assert!(env.get(global, &ident("y")).is_err());
    }

    #[test]
    fn test_shadowing_leaves_outer_binding_alone() {
        let mut env = Environment::new();
        let global = env.global();
        env.define(global, "x", Value::Number(10.0));

        let local = env.push(global);
        env.define(local, "x", Value::Number(50.0));
        let inner = env.push(local);
        env.define(inner, "y", Value::Boolean(true));

        assert_eq!(env.get(inner, &ident("x")), Ok(Value::Number(50.0)));
        assert_eq!(env.get(inner, &ident("y")), Ok(Value::Boolean(true)));
        assert_eq!(env.get(global, &ident("x")), Ok(Value::Number(10.0)));

        env.pop(inner);
        env.pop(local);
        assert_eq!(env.get(global, &ident("x")), Ok(Value::Number(10.0)));
    }

    #[test]
    fn test_push_and_pop_keep_stack_discipline() {
        let mut env = Environment::new();
        let global = env.global();
        assert_eq!(env.depth(), 1);
        let outer = env.push(global);
        let inner = env.push(outer);
        assert_eq!(env.depth(), 3);
        env.pop(inner);
        assert_eq!(env.depth(), 2);
        env.pop(outer);
        assert_eq!(env.depth(), 1);
        // A popped frame's id is reused by the next push
        assert_eq!(env.push(global), outer);
    }
}
