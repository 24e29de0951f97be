//! Poll scheduling: a background interval worker, or polling on demand.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bridge::Bridge;
use crate::config::PollMode;

/// Background task that polls immediately, then once per interval.
///
/// The first failed poll ends the task; the bridge has already reported it
/// through its error callback. A fetch in flight is never interrupted:
/// [`close`](Self::close) waits for it to finish.
pub struct PollWorker {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollWorker {
    /// Spawn a worker with its own cancellation token.
    pub fn spawn(bridge: Arc<Bridge>, interval: Duration) -> Self {
        Self::spawn_with_token(bridge, interval, CancellationToken::new())
    }

    /// Spawn a worker that also stops when `token` is cancelled.
    pub fn spawn_with_token(
        bridge: Arc<Bridge>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(run(bridge, interval, token.clone()));
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Whether the task has exited, either after a failure or a close.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Signal the worker and wait until it has exited.
    pub async fn close(mut self) {
        info!("Poll worker close starting");
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Poll worker ended abnormally");
            }
        }
        info!("Poll worker close done");
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(bridge: Arc<Bridge>, interval: Duration, token: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "Polling started");

    if bridge.poll_once().await.is_err() {
        info!("Polling stopped after failure");
        return;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Polling loop exiting");
                return;
            }
            _ = ticker.tick() => {}
        }

        if bridge.poll_once().await.is_err() {
            info!("Polling stopped after failure");
            return;
        }
    }
}

/// The scheduling model a bridge runs under.
pub enum Scheduler {
    Interval(PollWorker),
    OnDemand,
}

impl Scheduler {
    /// Start the model selected by `mode`. On-demand starts nothing.
    pub fn start(
        mode: PollMode,
        bridge: Arc<Bridge>,
        interval: Duration,
        token: &CancellationToken,
    ) -> Self {
        match mode {
            PollMode::Interval => {
                Self::Interval(PollWorker::spawn_with_token(bridge, interval, token.child_token()))
            }
            PollMode::OnDemand => Self::OnDemand,
        }
    }

    pub fn mode(&self) -> PollMode {
        match self {
            Self::Interval(_) => PollMode::Interval,
            Self::OnDemand => PollMode::OnDemand,
        }
    }

    /// Stop background polling, if any, and wait for it.
    pub async fn close(self) {
        if let Self::Interval(worker) = self {
            worker.close().await;
        }
    }
}
