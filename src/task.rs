use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::command::Command;
use crate::error::{MacroError, RunError};
use crate::executor::ActionExecutor;
use crate::interpreter::{CancelToken, Interpreter, RunSummary};

/// What a finished macro task hands back: the outcome and the executor,
/// so callers can inspect what it did.
#[derive(Debug)]
pub struct TaskReport<E> {
    pub outcome: Result<RunSummary, RunError>,
    pub executor: E,
}

/// A macro running on the tokio runtime.
///
/// Completion is delivered through a oneshot channel. Dropping the task
/// does not stop the run; call [`cancel`](Self::cancel) for that.
pub struct MacroTask<E> {
    cancel: CancelToken,
    result: oneshot::Receiver<TaskReport<E>>,
    handle: JoinHandle<()>,
}

impl<E: ActionExecutor + 'static> MacroTask<E> {
    pub fn spawn(commands: Vec<Command>, mut interpreter: Interpreter<E>) -> Self {
        let cancel = interpreter.cancel_token();
        let (sender, result) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let outcome = interpreter.run(&commands).await;
            let report = TaskReport {
                outcome,
                executor: interpreter.into_executor(),
            };
            if sender.send(report).is_err() {
                debug!("macro result dropped, nobody is waiting");
            }
        });

        Self {
            cancel,
            result,
            handle,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> Result<TaskReport<E>, MacroError> {
        match self.result.await {
            Ok(report) => Ok(report),
            Err(_) => {
                let reason = match self.handle.await {
                    Err(e) => e.to_string(),
                    Ok(()) => "macro task ended without a result".to_string(),
                };
                Err(MacroError::Task(reason))
            }
        }
    }
}
