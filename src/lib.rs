//! # automacro
//!
//! Tokenizer, command builder and interpreter for compact automation macros
//! such as `g100,200 c w'hello' f3(sd s0.5)`.
//!
//! A macro string is tokenized, built into a [`Command`] tree and only then
//! replayed through an [`ActionExecutor`]. A malformed macro never causes a
//! single action to run.
//!
//! ```
//! use automacro::{parse, Command, Number, Opcode};
//!
//! let commands = parse("d1,2 w'hello' f2(c)").unwrap();
//! assert_eq!(commands[0], Command::drag(Number::Int(1), Number::Int(2)));
//! assert_eq!(commands[1], Command::write("hello"));
//! assert_eq!(commands[2], Command::repeat(2, vec![Command::simple(Opcode::Click)]));
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod task;
pub mod token;

pub use command::{render, Command, Number, Opcode};
pub use config::Config;
pub use error::{ExecutionError, LexErrorKind, LexingError, MacroError, RunError, SyntaxError, SyntaxErrorKind};
pub use executor::{ActionExecutor, DryRunExecutor};
pub use interpreter::{CancelToken, Interpreter, RunSummary};
pub use lexer::tokenize;
pub use parser::build;
pub use task::{MacroTask, TaskReport};
pub use token::{Kind, Token};

/// Tokenizes and builds a macro. Either the whole macro is valid or nothing
/// is returned.
pub fn parse(source: &str) -> Result<Vec<Command>, MacroError> {
    let tokens = tokenize(source)?;
    Ok(build(&tokens)?)
}

/// Parses `source` completely, then executes it in order.
pub async fn run<E: ActionExecutor>(source: &str, executor: E) -> Result<RunSummary, MacroError> {
    let commands = parse(source)?;
    let summary = Interpreter::new(executor).run(&commands).await?;
    Ok(summary)
}
