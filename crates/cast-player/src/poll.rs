//! Position sampler that runs while the resource is playing.
//!
//! The loop itself never touches the resource: it only emits ticks stamped
//! with its epoch, and the owner samples `current_time` when a tick arrives.
//! `stop()` aborts the timer task and bumps the epoch, so a tick that was
//! already queued before the stop is rejected by [`PollLoop::accepts`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

pub type Epoch = u64;

/// Where ticks go.  The core forwards them into its event channel.
pub type TickSink = Arc<dyn Fn(Epoch) + Send + Sync>;

pub struct PollLoop {
    interval: Duration,
    sink: TickSink,
    epoch: Epoch,
    task: Option<AbortHandle>,
}

impl PollLoop {
    pub fn new(interval: Duration, sink: TickSink) -> Self {
        Self {
            interval,
            sink,
            epoch: 0,
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start ticking.  No-op when already running.  Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        self.epoch += 1;
        let epoch = self.epoch;
        let interval = self.interval;
        let sink = Arc::clone(&self.sink);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                sink(epoch);
            }
        });
        debug!("poll: started epoch {} every {:?}", epoch, interval);
        self.task = Some(handle.abort_handle());
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("poll: stopped epoch {}", self.epoch);
            self.epoch += 1;
        }
    }

    /// True only for ticks from the loop that is running right now.
    pub fn accepts(&self, epoch: Epoch) -> bool {
        self.task.is_some() && epoch == self.epoch
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
