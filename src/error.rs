use std::fmt;
use thiserror::Error;

use crate::token::Kind;

#[derive(Debug, Error)]
pub enum MacroError {
    #[error("LexingError: {0}")]
    Lexing(#[from] LexingError),
    #[error("SyntaxError: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("RunError: {0}")]
    Run(#[from] RunError),
    #[error("TaskError: {0}")]
    Task(String),
    #[error("ConfigError: {0}")]
    Config(String),
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
    #[error("JsonError: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    MissingNumber,
    MissingQuote,
    MissingComma,
    UnbalancedParens,
    UnrecognizedOpcode(char),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexErrorKind::MissingNumber => write!(f, "expected a number"),
            LexErrorKind::MissingQuote => write!(f, "expected a single-quoted string"),
            LexErrorKind::MissingComma => write!(f, "expected a comma"),
            LexErrorKind::UnbalancedParens => write!(f, "unbalanced parentheses"),
            LexErrorKind::UnrecognizedOpcode(c) => write!(f, "unrecognized opcode {:?}", c),
        }
    }
}

/// A malformed token. `position` is a byte offset into the macro that was
/// being scanned; `context` is the opcode whose argument was expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct LexingError {
    pub kind: LexErrorKind,
    pub position: usize,
    pub context: Option<String>,
}

impl LexingError {
    pub fn new(kind: LexErrorKind, position: usize) -> Self {
        Self {
            kind,
            position,
            context: None,
        }
    }

    pub(crate) fn with_context(mut self, opcode: &str) -> Self {
        self.context.get_or_insert_with(|| opcode.to_string());
        self
    }

    pub(crate) fn offset(mut self, by: usize) -> Self {
        self.position += by;
        self
    }
}

impl fmt::Display for LexingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.context {
            Some(opcode) => write!(
                f,
                "{} after opcode '{}'\n  --> position {}",
                self.kind, opcode, self.position
            ),
            None => write!(f, "{}\n  --> position {}", self.kind, self.position),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxErrorKind {
    MissingArgument,
    UnknownOpcode,
    WrongTokenKind { expected: Kind, found: Kind },
    InvalidNumber(String),
    InvalidCount(String),
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyntaxErrorKind::MissingArgument => write!(f, "missing argument"),
            SyntaxErrorKind::UnknownOpcode => write!(f, "unknown opcode"),
            SyntaxErrorKind::WrongTokenKind { expected, found } => {
                write!(f, "expecting {:?} but got {:?}", expected, found)
            }
            SyntaxErrorKind::InvalidNumber(text) => write!(f, "invalid number {:?}", text),
            SyntaxErrorKind::InvalidCount(text) => {
                write!(f, "repeat count must be a non-negative integer, got {:?}", text)
            }
        }
    }
}

/// A token sequence that does not fit an opcode's arity.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub opcode: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new(kind: SyntaxErrorKind, opcode: &str, position: usize) -> Self {
        Self {
            kind,
            opcode: opcode.to_string(),
            position,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} for opcode '{}'\n  --> position {}",
            self.kind, self.opcode, self.position
        )
    }
}

/// Failure reported by an [`ActionExecutor`](crate::executor::ActionExecutor).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Outcome of an aborted run. `index` is the top-level command the run
/// stopped in; `call` / `calls` count executor calls.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("command {index} failed on call {call}: {source}")]
    Failed {
        index: usize,
        call: usize,
        #[source]
        source: ExecutionError,
    },
    #[error("cancelled before command {index} after {calls} calls")]
    Cancelled { index: usize, calls: usize },
}

impl RunError {
    pub fn index(&self) -> usize {
        match self {
            RunError::Failed { index, .. } | RunError::Cancelled { index, .. } => *index,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }
}
