//! Per-target check scheduling.

use super::{CheckJob, Target};

use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// How much randomness is added to the schedule. 0.2 = ±20%.
const JITTER_FRACTION: f64 = 0.2;

/// Floor for the computed delay, so pathologically small intervals do not
/// turn into a hot loop.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Spawn one timer task per enabled target.
///
/// Each task enqueues an immediate first job, then one job every
/// `interval ± jitter` until shutdown fires. Enqueueing never blocks: a full
/// job queue drops the job with a warning so a slow consumer cannot make
/// the schedule drift.
pub fn start_schedulers(
    targets: &[Arc<Target>],
    jobs_tx: mpsc::Sender<CheckJob>,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(targets.len());

    for target in targets {
        if !target.enabled {
            continue;
        }

        let target = Arc::clone(target);
        let jobs_tx = jobs_tx.clone();
        let mut stop = shutdown.subscribe();

        handles.push(tokio::spawn(async move {
            enqueue_job(&jobs_tx, &target);

            loop {
                let delay = jittered_interval(target.interval);
                tokio::select! {
                    _ = stop.recv() => break,
                    _ = tokio::time::sleep(delay) => enqueue_job(&jobs_tx, &target),
                }
            }
        }));
    }

    handles
}

/// Draw the next delay uniformly from `[interval·(1−f), interval·(1+f)]`,
/// floored at `MIN_DELAY`.
fn jittered_interval(interval: Duration) -> Duration {
    if interval.is_zero() {
        return MIN_DELAY;
    }

    let factor = rand::thread_rng().gen_range(1.0 - JITTER_FRACTION..=1.0 + JITTER_FRACTION);
    interval.mul_f64(factor).max(MIN_DELAY)
}

fn enqueue_job(jobs_tx: &mpsc::Sender<CheckJob>, target: &Arc<Target>) {
    let job = CheckJob {
        target: Arc::clone(target),
        scheduled_at: Utc::now(),
        attempt: 1,
    };

    match jobs_tx.try_send(job) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(job)) => {
            tracing::warn!("job queue full; dropping job for target {}", job.target.name);
        }
        // Closed queue means the pipeline is shutting down.
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}
