//! Single background worker that runs refresh cycles one after another.
//!
//! Every trigger source (score sync, periodic timer, HTTP API) sends its cause
//! through a [`RefreshHandle`]; the worker drains the queue in order, so two
//! cycles never interleave their pushes.

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{RefreshCause, RefreshCycle, RefreshError, RefreshOutcome};

enum Job {
    Fire(RefreshCause),
    Wait(
        RefreshCause,
        oneshot::Sender<Result<RefreshOutcome, RefreshError>>,
    ),
}

/// Cheap, cloneable sender side of the refresh queue.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<Job>,
}

impl RefreshHandle {
    /// Queue a cycle without waiting for it. Returns `false` if the request was
    /// dropped because the queue is full or the worker is gone.
    pub fn request(&self, cause: RefreshCause) -> bool {
        match self.tx.try_send(Job::Fire(cause)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                // A queued cycle will render the latest snapshot anyway.
                debug!("Refresh queue full, request dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Refresh worker stopped, request dropped");
                false
            }
        }
    }

    /// Queue a cycle behind any pending ones and wait for its outcome.
    pub async fn run_now(&self, cause: RefreshCause) -> Result<RefreshOutcome> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Job::Wait(cause, done_tx))
            .await
            .map_err(|_| anyhow!("refresh worker stopped"))?;
        let outcome = done_rx
            .await
            .map_err(|_| anyhow!("refresh worker dropped the request"))??;
        Ok(outcome)
    }
}

pub struct RefreshWorker;

impl RefreshWorker {
    /// Spawn the worker task. `queue` bounds the number of pending causes.
    ///
    /// Each cycle runs in its own task that the worker awaits, so a panicking
    /// collaborator fails that one cycle with [`RefreshError::Aborted`] and the
    /// worker keeps draining the queue.
    pub fn spawn(cycle: RefreshCycle, queue: usize) -> RefreshHandle {
        let (tx, mut rx) = mpsc::channel::<Job>(queue.max(1));

        tokio::spawn(async move {
            info!("Refresh worker started (queue={})", queue.max(1));
            while let Some(job) = rx.recv().await {
                match job {
                    Job::Fire(cause) => {
                        let result = run_isolated(&cycle, cause.clone()).await;
                        log_outcome(&cause, &result);
                    }
                    Job::Wait(cause, done) => {
                        let result = run_isolated(&cycle, cause.clone()).await;
                        log_outcome(&cause, &result);
                        // The caller may have given up waiting; that's fine.
                        let _ = done.send(result);
                    }
                }
            }
            info!("Refresh worker stopped");
        });

        RefreshHandle { tx }
    }
}

async fn run_isolated(
    cycle: &RefreshCycle,
    cause: RefreshCause,
) -> Result<RefreshOutcome, RefreshError> {
    let cycle = cycle.clone();
    match tokio::spawn(async move { cycle.run(cause).await }).await {
        Ok(result) => result,
        Err(e) => Err(RefreshError::Aborted(e.to_string())),
    }
}

/// Periodically request a refresh so widgets pick up data written by other
/// processes, and so the date key rolls over at midnight.
pub fn start_periodic_refresh(handle: RefreshHandle, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            handle.request(RefreshCause::ScoresUpdated);
        }
    });
}

fn log_outcome(cause: &RefreshCause, result: &Result<RefreshOutcome, RefreshError>) {
    match result {
        Ok(RefreshOutcome::Ignored) => debug!("Refresh for '{}' ignored", cause),
        Ok(RefreshOutcome::NothingToRender) => debug!("Refresh for '{}': nothing to render", cause),
        Ok(outcome) if outcome.is_partial() => {
            warn!("Refresh for '{}' partially failed, some widgets kept their old view", cause);
        }
        Ok(RefreshOutcome::Refreshed { .. }) => {}
        Err(e) => error!("Refresh for '{}' failed: {}", cause, e),
    }
}
