//! Bounded, failure-isolated execution of per-track side-effect jobs.

use crate::error::Error;
use crate::jobs::JobKind;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

/// What a job is and which track it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLabel {
    pub kind: JobKind,
    /// Scanned file the job was derived from.
    pub path: PathBuf,
    pub track_id: String,
}
impl JobLabel {
    pub fn new(kind: JobKind, path: impl Into<PathBuf>, track_id: impl Into<String>) -> Self {
        Self { kind, path: path.into(), track_id: track_id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed(String),
    Panicked(String),
    /// Never started: cancelled while waiting for a permit, or submitted
    /// after cancellation.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub label: JobLabel,
    pub status: JobStatus,
}
impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// Runs submitted jobs on the tokio runtime, at most `concurrency` at a time.
///
/// A job's failure (or panic) is captured in its [`JobOutcome`] and has no
/// effect on any other job. Every submission, including ones refused after
/// cancellation, produces exactly one outcome from [`drain`](Self::drain).
#[derive(Debug)]
pub struct Scheduler {
    permits: Arc<Semaphore>,
    tasks: JoinSet<JobOutcome>,
    labels: HashMap<Id, JobLabel>,
    refused: Vec<JobOutcome>,
    cancel: CancellationToken,
}
impl Scheduler {
    pub fn new(concurrency: NonZeroUsize, cancel: CancellationToken) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.get())),
            tasks: JoinSet::new(),
            labels: HashMap::new(),
            refused: Vec::new(),
            cancel,
        }
    }

    /// Queue a job. Returns the task's id, or `None` if the scheduler has
    /// been cancelled, in which case the job is recorded as
    /// [`Cancelled`](JobStatus::Cancelled) without running.
    pub fn submit<F>(&mut self, label: JobLabel, job: F) -> Option<Id>
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            tracing::debug!(kind = %label.kind, track_id = %label.track_id, "Refusing job after cancellation");
            self.refused.push(JobOutcome { label, status: JobStatus::Cancelled });
            return None;
        }
        let permits = self.permits.clone();
        let cancel = self.cancel.clone();
        let task_label = label.clone();
        let handle = self.tasks.spawn(async move {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                return JobOutcome { label: task_label, status: JobStatus::Cancelled };
            };
            let status = match job.await {
                Ok(()) => JobStatus::Succeeded,
                Err(err) => JobStatus::Failed(reason(&err)),
            };
            JobOutcome { label: task_label, status }
        });
        let id = handle.id();
        self.labels.insert(id, label);
        Some(id)
    }

    /// Jobs submitted and not yet drained.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every submitted job, returning one outcome per submission in
    /// completion order.
    pub async fn drain(&mut self) -> Vec<JobOutcome> {
        let mut outcomes = std::mem::take(&mut self.refused);
        while let Some(joined) = self.tasks.join_next_with_id().await {
            let outcome = match joined {
                Ok((id, outcome)) => {
                    self.labels.remove(&id);
                    outcome
                },
                Err(err) => {
                    let Some(label) = self.labels.remove(&err.id()) else {
                        tracing::error!(%err, "Job finished without a label");
                        continue;
                    };
                    let status = if err.is_panic() { JobStatus::Panicked(panic_message(err)) } else { JobStatus::Cancelled };
                    JobOutcome { label, status }
                },
            };
            log_outcome(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// The machine's available parallelism, or one if that can't be determined.
pub fn default_concurrency() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Single-line description of an error, suitable for the failure log.
pub(crate) fn reason(err: &Error) -> String {
    (**err).to_string()
}

fn panic_message(err: tokio::task::JoinError) -> String {
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}

fn log_outcome(outcome: &JobOutcome) {
    let JobLabel { kind, path, track_id } = &outcome.label;
    match &outcome.status {
        JobStatus::Succeeded => tracing::debug!(%kind, %track_id, path = %path.display(), "Job finished"),
        JobStatus::Failed(reason) => tracing::warn!(%kind, %track_id, path = %path.display(), %reason, "Job failed"),
        JobStatus::Panicked(reason) => tracing::error!(%kind, %track_id, path = %path.display(), %reason, "Job panicked"),
        JobStatus::Cancelled => tracing::debug!(%kind, %track_id, path = %path.display(), "Job cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn label(n: usize) -> JobLabel {
        JobLabel::new(JobKind::Recompress, format!("{n}.szs"), n.to_string())
    }

    fn scheduler(concurrency: usize) -> Scheduler {
        Scheduler::new(NonZeroUsize::new(concurrency).unwrap(), CancellationToken::new())
    }

    async fn explode() -> Result<(), Error> {
        panic!("boom")
    }

    fn status_of(outcomes: &[JobOutcome], n: usize) -> &JobStatus {
        &outcomes.iter().find(|o| o.label == label(n)).unwrap().status
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut scheduler = scheduler(2);
        scheduler.submit(label(0), async { Ok(()) });
        scheduler.submit(label(1), async { Err(exn::Exn::from(ErrorKind::Tool("wszst exited with code 1".into()))) });
        scheduler.submit(label(2), explode());
        scheduler.submit(label(3), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        });
        let outcomes = scheduler.drain().await;
        assert_eq!(outcomes.len(), 4);
        assert_eq!(status_of(&outcomes, 0), &JobStatus::Succeeded);
        assert_eq!(status_of(&outcomes, 1), &JobStatus::Failed("wszst exited with code 1".to_string()));
        assert_eq!(status_of(&outcomes, 2), &JobStatus::Panicked("boom".to_string()));
        assert_eq!(status_of(&outcomes, 3), &JobStatus::Succeeded);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let mut scheduler = scheduler(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for n in 0..12 {
            let (running, peak) = (running.clone(), peak.clone());
            scheduler.submit(label(n), async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let outcomes = scheduler.drain().await;
        assert_eq!(outcomes.len(), 12);
        assert!(outcomes.iter().all(JobOutcome::is_success));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let cancel = CancellationToken::new();
        let mut scheduler = Scheduler::new(NonZeroUsize::MIN, cancel.clone());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        scheduler.submit(label(0), async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(())
        });
        // Waits behind job 0 for the only permit.
        scheduler.submit(label(1), async { Ok(()) });
        started_rx.await.unwrap();

        cancel.cancel();
        assert_eq!(scheduler.submit(label(2), async { Ok(()) }), None);
        let _ = release_tx.send(());

        let outcomes = scheduler.drain().await;
        assert_eq!(outcomes.len(), 3);
        // In flight: runs to completion.
        assert_eq!(status_of(&outcomes, 0), &JobStatus::Succeeded);
        assert_eq!(status_of(&outcomes, 1), &JobStatus::Cancelled);
        assert_eq!(status_of(&outcomes, 2), &JobStatus::Cancelled);
    }

    #[test]
    fn test_reason_uses_tool_message() {
        let err = exn::Exn::from(ErrorKind::Tool("wszst exited with code 2: bad".into()));
        assert_eq!(reason(&err), "wszst exited with code 2: bad");
        assert_eq!(reason(&exn::Exn::from(ErrorKind::Cancelled)), "Cancelled");
    }
}
