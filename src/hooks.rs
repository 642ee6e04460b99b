//! Run lifecycle hooks
//!
//! Hooks bracket a scheduling run: `on_start` runs on the coordinator
//! before any worker is spawned, `on_complete` after the last exit ack.
//! They never see or mutate scheduler state.

use async_trait::async_trait;

/// Optional initialize/finalize callbacks for one scheduling run.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called once before the coordinator enters its receive loop. An
    /// error here aborts the run before any worker starts.
    async fn on_start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once after the receive loop terminates. An error here is
    /// logged; the results map is still returned to the caller.
    async fn on_complete(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hook set that does nothing.
pub struct NoHooks;

#[async_trait]
impl RunHooks for NoHooks {}
