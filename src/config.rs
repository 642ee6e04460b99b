use std::sync::Arc;

use crate::error::SchedulerError;

/// Scheduling run configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker tasks to spawn.
    pub workers: usize,
    /// Capacity of the shared worker-to-coordinator inbox.
    pub channel_capacity: usize,
    /// When true, DONE progress lines show the computed result instead of
    /// the task that produced it.
    pub log_results: bool,
    /// Label attached to per-worker log lines, in place of a processor
    /// name on a multi-node run.
    pub host: Arc<str>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            channel_capacity: 64,
            log_results: false,
            host: default_host(),
        }
    }
}

fn default_host() -> Arc<str> {
    match std::env::var("HOSTNAME") {
        Ok(name) if !name.is_empty() => Arc::from(name.as_str()),
        _ => Arc::from(format!("pid-{}", std::process::id()).as_str()),
    }
}

impl SchedulerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_log_results(mut self, log_results: bool) -> Self {
        self.log_results = log_results;
        self
    }

    pub fn with_host(mut self, host: impl Into<Arc<str>>) -> Self {
        self.host = host.into();
        self
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.workers == 0 {
            return Err(SchedulerError::InvalidConfig(
                "at least one worker is required".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "channel capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
