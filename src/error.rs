use thiserror::Error;

use crate::message::WorkerId;

/// Scheduler errors. All of these are fatal for the run; nothing is
/// retried internally and no task is ever re-dispatched.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("initialize hook failed: {0}")]
    Initialize(#[source] anyhow::Error),

    /// Every worker sender is gone but fewer exit acks arrived than
    /// workers were spawned. A worker whose function panicked dies
    /// without acking; rather than block forever on an ack that can
    /// never come, the run fails fast and names the casualties.
    #[error("worker channels closed after {closed}/{expected} exit acks (panicked workers: {panicked:?})")]
    ChannelClosed {
        closed: usize,
        expected: usize,
        panicked: Vec<WorkerId>,
    },

    /// A message arrived that is impossible under the READY/START/DONE/EXIT
    /// contract, e.g. a DONE without an outstanding assignment. No recovery
    /// path exists for these.
    #[error("protocol violation: {0}")]
    Protocol(String),
}
