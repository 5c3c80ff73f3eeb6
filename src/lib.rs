// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod source;
pub mod types;

use std::io::Write;

pub use environment::{EnvError, Environment, ScopeId};
pub use evaluator::{ErrorPolicy, EvalResult, Interpreter, RuntimeError};
pub use lexer::{KEYWORDS, Token, TokenKind, tokenize};
pub use parser::{ParseError, ParseResult, Parser, parse_str};
pub use source::Span;
pub use types::{Expr, Value};

/// Everything `run` can fail with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Nothing was evaluated.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// One error under `ErrorPolicy::Halt`, every failure under `Continue`.
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Runtime(Vec<RuntimeError>),
}

/// Lexes, parses and evaluates `source` in a fresh interpreter, writing
/// program output to `out`.
pub fn run<W: Write>(source: &str, out: W, policy: ErrorPolicy) -> Result<Value, Error> {
    let program = parse_str(source)?;
    Interpreter::with_policy(out, policy)
        .interpret(&program)
        .map_err(Error::Runtime)
}
