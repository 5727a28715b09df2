use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::future::{AbortHandle, BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::IntentFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum JobStatus {
    Active = 0,
    Completed = 1,
    Failed = 2,
    Cancelled = 3,
}

impl JobStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobStatus::Active,
            1 => JobStatus::Completed,
            2 => JobStatus::Failed,
            _ => JobStatus::Cancelled,
        }
    }
}

/// Record the final status. Only the first settlement wins.
pub(crate) fn settle(status: &AtomicU8, outcome: JobStatus) {
    let _ = status.compare_exchange(
        JobStatus::Active as u8,
        outcome as u8,
        Ordering::SeqCst,
        Ordering::SeqCst,
    );
}

type Completion = Shared<BoxFuture<'static, Result<(), IntentFailure>>>;

/// Handle to one dispatched intent.
///
/// Cloning is cheap; every clone observes the same completion.
#[derive(Clone)]
pub struct IntentJob {
    id: Uuid,
    name: Option<Arc<str>>,
    abort: AbortHandle,
    status: Arc<AtomicU8>,
    completion: Completion,
}

impl IntentJob {
    pub(crate) fn new(
        id: Uuid,
        name: Option<Arc<str>>,
        abort: AbortHandle,
        status: Arc<AtomicU8>,
        done: oneshot::Receiver<Result<(), IntentFailure>>,
    ) -> Self {
        // A dropped sender means the task was discarded before it settled.
        let completion = done
            .map(|received| received.unwrap_or(Err(IntentFailure::Cancelled)))
            .boxed()
            .shared();
        Self {
            id,
            name,
            abort,
            status,
            completion,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Request cancellation. The body stops at its next suspension point.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        match self.status() {
            JobStatus::Active => self.abort.is_aborted(),
            JobStatus::Cancelled => true,
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }

    /// True once the intent settled in any way.
    pub fn is_finished(&self) -> bool {
        self.status() != JobStatus::Active
    }

    /// Wait for the intent to settle.
    ///
    /// Failures routed to an exception handler resolve as `Ok(())`.
    pub async fn join(&self) -> Result<(), IntentFailure> {
        self.completion.clone().await
    }

    fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for IntentJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentJob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> (IntentJob, oneshot::Sender<Result<(), IntentFailure>>, Arc<AtomicU8>) {
        let (abort, _registration) = AbortHandle::new_pair();
        let status = Arc::new(AtomicU8::new(JobStatus::Active as u8));
        let (tx, rx) = oneshot::channel();
        let job = IntentJob::new(Uuid::new_v4(), Some("load".into()), abort, status.clone(), rx);
        (job, tx, status)
    }

    #[tokio::test]
    async fn clones_share_completion() {
        let (job, tx, status) = job();
        let other = job.clone();

        settle(&status, JobStatus::Completed);
        tx.send(Ok(())).expect("receiver alive");

        assert!(job.join().await.is_ok());
        assert!(other.join().await.is_ok());
        assert!(other.is_finished());
        assert!(!other.is_cancelled());
        assert_eq!(job.name(), Some("load"));
    }

    #[tokio::test]
    async fn dropped_sender_resolves_as_cancelled() {
        let (job, tx, _status) = job();
        drop(tx);
        let failure = job.join().await.expect_err("no result was delivered");
        assert!(failure.is_cancelled());
    }

    #[test]
    fn first_settlement_wins() {
        let (job, _tx, status) = job();
        settle(&status, JobStatus::Failed);
        settle(&status, JobStatus::Cancelled);
        assert!(job.is_finished());
        assert!(!job.is_cancelled());
    }

    #[test]
    fn cancel_marks_active_job() {
        let (job, _tx, _status) = job();
        assert!(!job.is_cancelled());
        job.cancel();
        assert!(job.is_cancelled());
        assert!(!job.is_finished());
    }
}
