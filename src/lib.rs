//! taskpull - a coordinator/worker pull scheduler
//!
//! One coordinator hands independent units of work to a pool of workers
//! over tagged message channels and collects the results as they finish.
//! Assignment is first-available-first-served: whichever worker signals
//! READY next gets the next task from the (lazily consumed) sequence.
//! Once the sequence is exhausted every worker is told to EXIT and the
//! run ends when the last exit ack arrives.
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskpull::{FnWorker, NoHooks, Scheduler, TaskArgs};
//!
//! # async fn demo() -> Result<(), taskpull::SchedulerError> {
//! let scheduler = Scheduler::with_workers(2)?;
//! let results = scheduler
//!     .run(
//!         (1..=5).map(TaskArgs::One),
//!         Arc::new(FnWorker(|args: TaskArgs<i64>| match args {
//!             TaskArgs::One(x) => x * x,
//!             TaskArgs::Many(xs) => xs.iter().product(),
//!         })),
//!         &NoHooks,
//!     )
//!     .await?;
//! assert_eq!(results[&TaskArgs::One(3)], 9);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod hooks;
pub mod message;
pub mod worker;

pub use config::SchedulerConfig;
pub use coordinator::Scheduler;
pub use error::SchedulerError;
pub use hooks::{NoHooks, RunHooks};
pub use message::{TaskArgs, WorkerId};
pub use worker::{FnWorker, Worker};
