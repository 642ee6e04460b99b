//! Protocol types for coordinator/worker traffic
//!
//! Four tags travel between the two roles: READY, START, DONE and EXIT.
//! The sender's identity rides inside the message instead of on a channel
//! envelope, so the coordinator can serve a single shared inbox.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identity of one worker within a run. Index into the coordinator's
/// per-worker mailbox table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Argument slot for one task.
///
/// The producer of the task sequence decides up front whether a task is a
/// single opaque value or an ordered list of values to be spread across
/// the worker function's parameters. Keys the results map, so task
/// identity is the value itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskArgs<T> {
    One(T),
    Many(Vec<T>),
}

/// Worker-to-coordinator messages.
#[derive(Debug)]
pub enum ToCoordinator<T, R> {
    /// Worker is idle and requests an assignment.
    Ready { worker: WorkerId },
    /// Worker finished its current assignment.
    Done {
        worker: WorkerId,
        host: Arc<str>,
        task: TaskArgs<T>,
        elapsed: Duration,
        result: R,
    },
    /// Final ack: the worker's request loop has stopped.
    Exited { worker: WorkerId, host: Arc<str> },
}

/// Coordinator-to-worker messages.
#[derive(Debug)]
pub enum ToWorker<T> {
    /// Assignment of one task.
    Start { task: TaskArgs<T> },
    /// The sequence is exhausted; stop requesting work.
    Exit,
}
