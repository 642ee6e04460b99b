//! Worker side of the protocol
//!
//! A worker owns no cross-task state: it asks for work, executes one
//! assignment at a time, reports, and repeats until told to exit.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::message::{TaskArgs, ToCoordinator, ToWorker, WorkerId};

/// The work function applied to each task.
///
/// `TaskArgs::Many` carries the elements of a structured task in producer
/// order; implementors dispatch on the variant explicitly.
#[async_trait]
pub trait Worker<T, R>: Send + Sync {
    async fn execute(&self, args: TaskArgs<T>) -> R;
}

/// Adapter turning a plain closure into a [`Worker`].
pub struct FnWorker<F>(pub F);

#[async_trait]
impl<T, R, F> Worker<T, R> for FnWorker<F>
where
    T: Send + 'static,
    R: Send,
    F: Fn(TaskArgs<T>) -> R + Send + Sync,
{
    async fn execute(&self, args: TaskArgs<T>) -> R {
        (self.0)(args)
    }
}

/// Request loop for one worker.
///
/// Sends exactly one READY per assignment request and one DONE per START
/// received. After an EXIT the loop stops and a single exit ack carrying
/// the worker's identity is sent. A panic inside `execute` kills the task
/// before the ack; the coordinator surfaces that as a channel closure.
pub(crate) async fn worker_loop<T, R>(
    id: WorkerId,
    host: Arc<str>,
    worker: Arc<dyn Worker<T, R>>,
    tx: mpsc::Sender<ToCoordinator<T, R>>,
    mut rx: mpsc::Receiver<ToWorker<T>>,
) where
    T: Clone + Send + 'static,
    R: Send + 'static,
{
    loop {
        if tx.send(ToCoordinator::Ready { worker: id }).await.is_err() {
            // Coordinator is gone; nothing left to report to.
            return;
        }
        let msg = match rx.recv().await {
            Some(msg) => msg,
            None => return,
        };
        match msg {
            ToWorker::Start { task } => {
                let started = Instant::now();
                let result = worker.execute(task.clone()).await;
                let done = ToCoordinator::Done {
                    worker: id,
                    host: host.clone(),
                    task,
                    elapsed: started.elapsed(),
                    result,
                };
                if tx.send(done).await.is_err() {
                    return;
                }
            }
            ToWorker::Exit => break,
        }
    }
    debug!(worker = %id, "request loop stopped, sending exit ack");
    let _ = tx.send(ToCoordinator::Exited { worker: id, host }).await;
}
