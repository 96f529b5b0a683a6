use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, trace, warn};

use crate::command::{Command, Opcode};
use crate::error::RunError;
use crate::executor::ActionExecutor;

/// Shared cancellation flag for a running macro.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                // Sender gone: nobody can cancel any more.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub calls: usize,
}

type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RunError>> + Send + 'a>>;

/// Replays a command tree through an [`ActionExecutor`], strictly in order.
///
/// Repeats are expanded here: each iteration runs every child to completion
/// before the next begins. Cancellation is checked before every command and
/// every iteration, and also interrupts a pending `Sleep` or pause.
pub struct Interpreter<E> {
    executor: E,
    cancel: CancelToken,
    pause: Duration,
    calls: usize,
}

impl<E: ActionExecutor> Interpreter<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            cancel: CancelToken::new(),
            pause: Duration::ZERO,
            calls: 0,
        }
    }

    /// Wait inserted after every executed action.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    pub async fn run(&mut self, commands: &[Command]) -> Result<RunSummary, RunError> {
        self.calls = 0;
        info!(commands = commands.len(), "running macro");

        for (index, command) in commands.iter().enumerate() {
            self.run_command(index, command).await?;
        }

        info!(calls = self.calls, "macro finished");
        Ok(RunSummary { calls: self.calls })
    }

    fn check_cancelled(&self, index: usize) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            warn!(index, calls = self.calls, "macro cancelled");
            return Err(RunError::Cancelled {
                index,
                calls: self.calls,
            });
        }
        Ok(())
    }

    /// `index` is the top-level command this one belongs to.
    fn run_command<'a>(&'a mut self, index: usize, command: &'a Command) -> RunFuture<'a> {
        Box::pin(async move {
            self.check_cancelled(index)?;

            if command.opcode != Opcode::Repeat {
                return self.dispatch(index, command).await;
            }

            for iteration in 0..command.count() {
                // Executors that never pend would otherwise starve whoever
                // holds the cancel token on a current-thread runtime.
                tokio::task::yield_now().await;
                self.check_cancelled(index)?;
                trace!(index, iteration, "repeat iteration");
                for child in &command.children {
                    self.run_command(index, child).await?;
                }
            }
            Ok(())
        })
    }

    async fn dispatch(&mut self, index: usize, command: &Command) -> Result<(), RunError> {
        let call = self.calls;
        trace!(index, call, command = %command, "execute");

        let result = if command.opcode == Opcode::Sleep {
            tokio::select! {
                result = self.executor.execute(command) => Some(result),
                _ = self.cancel.cancelled() => None,
            }
        } else {
            Some(self.executor.execute(command).await)
        };

        match result {
            None => return self.check_cancelled(index),
            Some(Err(source)) => {
                warn!(index, call, error = %source, "action failed");
                return Err(RunError::Failed {
                    index,
                    call,
                    source,
                });
            }
            Some(Ok(())) => self.calls += 1,
        }

        if self.pause.is_zero() {
            tokio::task::yield_now().await;
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(self.pause) => {}
            _ = self.cancel.cancelled() => {}
        }
        Ok(())
    }
}
