use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::command::{Command, Number, Opcode};
use crate::error::ExecutionError;

/// Performs the real-world effect of one command.
///
/// The interpreter calls this once per leaf command, in program order, and
/// expands `Repeat` itself; implementations never see a `Repeat`.
#[async_trait]
pub trait ActionExecutor: Send {
    async fn execute(&mut self, command: &Command) -> Result<(), ExecutionError>;
}

#[async_trait]
impl<E: ActionExecutor + ?Sized> ActionExecutor for Box<E> {
    async fn execute(&mut self, command: &Command) -> Result<(), ExecutionError> {
        (**self).execute(command).await
    }
}

#[async_trait]
impl<E: ActionExecutor + ?Sized> ActionExecutor for &mut E {
    async fn execute(&mut self, command: &Command) -> Result<(), ExecutionError> {
        (**self).execute(command).await
    }
}

pub fn sleep_duration(seconds: Number) -> Result<Duration, ExecutionError> {
    Duration::try_from_secs_f64(seconds.as_f64()).map_err(|e| {
        ExecutionError::with_source(format!("invalid sleep duration {}", seconds), e)
    })
}

/// Human readable description of an action, used in logs.
pub fn describe(command: &Command) -> String {
    let n = |i: usize| {
        command
            .numbers
            .get(i)
            .map(Number::to_string)
            .unwrap_or_default()
    };
    match command.opcode {
        Opcode::Click => "click".to_string(),
        Opcode::LeftClick => "left click".to_string(),
        Opcode::MiddleClick => "middle click".to_string(),
        Opcode::RightClick => "right click".to_string(),
        Opcode::ScrollStart => "scroll start".to_string(),
        Opcode::ScrollDown => "scroll down".to_string(),
        Opcode::ScrollStop => "scroll stop".to_string(),
        Opcode::Goto => format!("move to ({}, {})", n(0), n(1)),
        Opcode::Drag => format!("drag by ({}, {})", n(0), n(1)),
        Opcode::Write => format!("write {:?}", command.text.as_deref().unwrap_or_default()),
        Opcode::Sleep => format!("sleep {}s", n(0)),
        Opcode::Repeat => format!("repeat {} times", command.count()),
    }
}

/// Executor that performs no input at all. Every action is logged and
/// recorded; `Sleep` still waits unless disabled, so timing is realistic.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    performed: Vec<String>,
    skip_sleep: bool,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_sleep() -> Self {
        Self {
            skip_sleep: true,
            ..Self::default()
        }
    }

    /// Rendered commands in the order they were executed.
    pub fn performed(&self) -> &[String] {
        &self.performed
    }
}

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn execute(&mut self, command: &Command) -> Result<(), ExecutionError> {
        match command.opcode {
            Opcode::Repeat => {
                return Err(ExecutionError::new(
                    "repeat must be expanded before execution",
                ))
            }
            Opcode::Sleep => {
                let seconds = command
                    .numbers
                    .first()
                    .copied()
                    .ok_or_else(|| ExecutionError::new("sleep without a duration"))?;
                let duration = sleep_duration(seconds)?;
                if !self.skip_sleep {
                    tokio::time::sleep(duration).await;
                }
            }
            _ => {}
        }

        info!(action = %describe(command), "dry run");
        self.performed.push(command.to_string());
        Ok(())
    }
}
