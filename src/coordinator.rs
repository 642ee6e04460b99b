//! Coordinator side of the protocol
//!
//! The coordinator owns the task cursor and the results map outright.
//! Its receive loop serializes every sequence advancement and every
//! results insertion, so no lock guards either one even though workers
//! run concurrently.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::hooks::RunHooks;
use crate::message::{TaskArgs, ToCoordinator, ToWorker, WorkerId};
use crate::worker::{worker_loop, Worker};

/// Coordinator lifecycle. `Accepting` while the sequence still yields,
/// `Draining` once the first EXIT went out, `Done` when every worker has
/// acked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Accepting,
    Draining,
    Done,
}

/// What the coordinator believes about one worker. Used to reject
/// messages that are impossible under the protocol contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Assigned,
    ExitRequested,
    Closed,
}

/// One-coordinator, N-worker pull scheduler.
///
/// Tasks are handed out first-available-first-served: whichever worker
/// signals READY next receives the next task from the sequence. The
/// scheduler holds no state between runs, so one instance can serve any
/// number of consecutive runs.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Shorthand for a default configuration with a fixed worker count.
    pub fn with_workers(workers: usize) -> Result<Self, SchedulerError> {
        Self::new(SchedulerConfig::default().with_workers(workers))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run the task sequence to exhaustion and return the results map.
    ///
    /// Blocks until every worker has sent its exit ack. Each task yielded
    /// by the sequence is assigned to exactly one worker exactly once; the
    /// returned map has one entry per distinct task value, keyed by the
    /// task itself.
    pub async fn run<T, R, I, H>(
        &self,
        tasks: I,
        worker: Arc<dyn Worker<T, R>>,
        hooks: &H,
    ) -> Result<HashMap<TaskArgs<T>, R>, SchedulerError>
    where
        T: Clone + Eq + Hash + Debug + Send + 'static,
        R: Debug + Send + 'static,
        I: IntoIterator<Item = TaskArgs<T>>,
        H: RunHooks + ?Sized,
    {
        let t0 = Instant::now();
        hooks.on_start().await.map_err(SchedulerError::Initialize)?;
        let t1 = Instant::now();
        info!(start = %Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"), "timer started");

        let workers = self.config.workers;
        info!(workers, "coordinator starting");

        let (tx, mut inbox) = mpsc::channel(self.config.channel_capacity);
        let mut mailboxes = Vec::with_capacity(workers);
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for index in 0..workers {
            let (mailbox, rx) = mpsc::channel(1);
            mailboxes.push(mailbox);
            handles.push(tokio::spawn(worker_loop(
                WorkerId(index),
                self.config.host.clone(),
                worker.clone(),
                tx.clone(),
                rx,
            )));
        }
        // The coordinator keeps no sender: once every worker is gone the
        // inbox closes instead of blocking forever.
        drop(tx);

        let mut tasks = tasks.into_iter();
        let mut results = HashMap::new();
        let mut states = vec![WorkerState::Idle; workers];
        let mut phase = Phase::Accepting;
        let mut closed = 0usize;

        while closed < workers {
            let msg = match inbox.recv().await {
                Some(msg) => msg,
                None => {
                    let panicked = reap_panicked(mem::take(&mut handles)).await;
                    return Err(SchedulerError::ChannelClosed {
                        closed,
                        expected: workers,
                        panicked,
                    });
                }
            };
            match msg {
                ToCoordinator::Ready { worker } => {
                    let state = states[worker.0];
                    if state != WorkerState::Idle {
                        return Err(SchedulerError::Protocol(format!(
                            "READY from worker {worker} in state {state:?}"
                        )));
                    }
                    match tasks.next() {
                        Some(task) => {
                            debug!(worker = %worker, task = ?task, "assigning task");
                            states[worker.0] = WorkerState::Assigned;
                            send_to(&mailboxes, worker, ToWorker::Start { task })?;
                        }
                        None => {
                            if phase == Phase::Accepting {
                                phase = Phase::Draining;
                                debug!(?phase, "task sequence exhausted");
                            }
                            states[worker.0] = WorkerState::ExitRequested;
                            send_to(&mailboxes, worker, ToWorker::Exit)?;
                        }
                    }
                }
                ToCoordinator::Done {
                    worker,
                    host,
                    task,
                    elapsed,
                    result,
                } => {
                    let state = states[worker.0];
                    if state != WorkerState::Assigned {
                        return Err(SchedulerError::Protocol(format!(
                            "DONE from worker {worker} in state {state:?}"
                        )));
                    }
                    states[worker.0] = WorkerState::Idle;
                    if self.config.log_results {
                        info!(worker = %worker, host = %host, elapsed_s = elapsed.as_secs_f64(), result = ?result, "returned data");
                    } else {
                        info!(worker = %worker, host = %host, elapsed_s = elapsed.as_secs_f64(), task = ?task, "returned data");
                    }
                    if results.insert(task, result).is_some() {
                        // Each task occurs once in the sequence, so a
                        // replacement means duplicate identities upstream.
                        warn!(worker = %worker, "result replaced an earlier entry for an identical task");
                    }
                }
                ToCoordinator::Exited { worker, host } => {
                    let state = states[worker.0];
                    if state != WorkerState::ExitRequested {
                        return Err(SchedulerError::Protocol(format!(
                            "EXIT ack from worker {worker} in state {state:?}"
                        )));
                    }
                    states[worker.0] = WorkerState::Closed;
                    closed += 1;
                    info!(worker = %worker, host = %host, still_working = workers - closed, "worker exited");
                }
            }
        }

        phase = Phase::Done;
        debug!(?phase, closed, "receive loop finished");
        drop(mailboxes);
        reap_panicked(handles).await;

        let t2 = Instant::now();
        info!(
            total_s = t2.duration_since(t0).as_secs_f64(),
            initialization_s = t1.duration_since(t0).as_secs_f64(),
            parallel_s = t2.duration_since(t1).as_secs_f64(),
            tasks = results.len(),
            "coordinator finishing"
        );

        if let Err(e) = hooks.on_complete().await {
            // Results are returned best-effort even when finalization fails.
            error!(error = %e, "completion hook failed");
        }
        Ok(results)
    }
}

fn send_to<T>(
    mailboxes: &[mpsc::Sender<ToWorker<T>>],
    worker: WorkerId,
    msg: ToWorker<T>,
) -> Result<(), SchedulerError> {
    // Capacity one and one outstanding message per worker by contract, so
    // a full mailbox is as impossible as a closed one.
    mailboxes[worker.0]
        .try_send(msg)
        .map_err(|_| SchedulerError::Protocol(format!("worker {worker} mailbox unavailable")))
}

/// Join finished worker tasks, returning the ids of any that panicked.
async fn reap_panicked(handles: Vec<JoinHandle<()>>) -> Vec<WorkerId> {
    let mut panicked = Vec::new();
    for (index, joined) in join_all(handles).await.into_iter().enumerate() {
        if let Err(e) = joined {
            if e.is_panic() {
                error!(worker = %WorkerId(index), "worker task panicked");
                panicked.push(WorkerId(index));
            }
        }
    }
    panicked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoHooks;
    use crate::worker::FnWorker;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn squares() -> Arc<dyn Worker<i64, i64>> {
        Arc::new(FnWorker(|args: TaskArgs<i64>| match args {
            TaskArgs::One(x) => x * x,
            TaskArgs::Many(xs) => xs.iter().sum(),
        }))
    }

    #[tokio::test]
    async fn five_tasks_two_workers() {
        let scheduler = Scheduler::with_workers(2).unwrap();
        let tasks = (1..=5).map(TaskArgs::One);
        let results = scheduler.run(tasks, squares(), &NoHooks).await.unwrap();

        let expected: HashMap<_, _> = [(1, 1), (2, 4), (3, 9), (4, 16), (5, 25)]
            .into_iter()
            .map(|(t, r)| (TaskArgs::One(t), r))
            .collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn empty_sequence_shuts_down_three_workers() {
        let scheduler = Scheduler::with_workers(3).unwrap();
        let results = scheduler
            .run(Vec::new(), squares(), &NoHooks)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn tuple_tasks_single_worker_run_in_sequence_order() {
        struct Recording {
            seen: Mutex<Vec<TaskArgs<i64>>>,
        }

        #[async_trait::async_trait]
        impl Worker<i64, i64> for Recording {
            async fn execute(&self, args: TaskArgs<i64>) -> i64 {
                self.seen.lock().unwrap().push(args.clone());
                match args {
                    TaskArgs::One(x) => x,
                    TaskArgs::Many(xs) => xs.iter().sum(),
                }
            }
        }

        let worker = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let scheduler = Scheduler::with_workers(1).unwrap();
        let tasks = vec![
            TaskArgs::Many(vec![2, 3]),
            TaskArgs::Many(vec![4, 5]),
        ];
        let results = scheduler
            .run(tasks.clone(), worker.clone(), &NoHooks)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[&TaskArgs::Many(vec![2, 3])], 5);
        assert_eq!(results[&TaskArgs::Many(vec![4, 5])], 9);
        // One worker means assignment order is the sequence order.
        assert_eq!(*worker.seen.lock().unwrap(), tasks);
    }

    #[tokio::test]
    async fn repeated_runs_yield_identical_results() {
        let scheduler = Scheduler::with_workers(4).unwrap();
        let first = scheduler
            .run((0..50).map(TaskArgs::One), squares(), &NoHooks)
            .await
            .unwrap();
        let second = scheduler
            .run((0..50).map(TaskArgs::One), squares(), &NoHooks)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 50);
    }

    #[tokio::test]
    async fn every_task_is_executed_exactly_once() {
        struct Counting {
            calls: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl Worker<u64, u64> for Counting {
            async fn execute(&self, args: TaskArgs<u64>) -> u64 {
                self.calls.fetch_add(1, Ordering::SeqCst);
                match args {
                    TaskArgs::One(x) => x + 1,
                    TaskArgs::Many(xs) => xs.iter().sum(),
                }
            }
        }

        let worker = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::with_workers(3).unwrap();
        let results = scheduler
            .run((0..200).map(TaskArgs::One), worker.clone(), &NoHooks)
            .await
            .unwrap();

        assert_eq!(results.len(), 200);
        assert_eq!(worker.calls.load(Ordering::SeqCst), 200);
    }

    #[tokio::test]
    async fn worker_panic_fails_the_run_instead_of_hanging() {
        // A worker that dies without acking can never satisfy the exit
        // count; the run fails once every worker channel has closed.
        let worker: Arc<dyn Worker<u32, u32>> =
            Arc::new(FnWorker(|args: TaskArgs<u32>| match args {
                TaskArgs::One(3) => panic!("task 3 is poisoned"),
                TaskArgs::One(x) => x,
                TaskArgs::Many(_) => 0,
            }));
        let scheduler = Scheduler::with_workers(2).unwrap();
        let err = scheduler
            .run((1..=5).map(TaskArgs::One), worker, &NoHooks)
            .await
            .unwrap_err();

        match err {
            SchedulerError::ChannelClosed {
                closed,
                expected,
                panicked,
            } => {
                assert_eq!(expected, 2);
                assert!(closed < 2);
                assert_eq!(panicked.len(), 1);
            }
            other => panic!("expected ChannelClosed, got {other}"),
        }
    }
}
