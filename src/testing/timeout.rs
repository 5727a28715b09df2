//! Wall-clock deadlines for test waits.
//!
//! The deadline runs on an OS thread, so a paused or auto-advancing Tokio
//! clock neither fires it early nor stalls it.

use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;

/// Await `fut`, giving up after `limit` of real time.
///
/// Returns `None` on timeout.
pub(crate) async fn within<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    let (fired_tx, fired_rx) = oneshot::channel::<()>();
    // Dropping `_disarm` wakes the timer thread early so it exits.
    let (_disarm, armed) = mpsc::channel::<()>();

    let spawned = thread::Builder::new()
        .name("orbit-test-deadline".into())
        .spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = armed.recv_timeout(limit) {
                let _ = fired_tx.send(());
            }
        });
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "Deadline thread unavailable, waiting without a timeout");
        return Some(fut.await);
    }

    tokio::select! {
        biased;
        output = fut => Some(output),
        _ = fired_rx => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_future_wins() {
        assert_eq!(within(Duration::from_secs(5), async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn pending_future_times_out() {
        let result = within(Duration::from_millis(20), std::future::pending::<()>()).await;
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn paused_clock_does_not_fire_the_deadline() {
        let result = within(
            Duration::from_secs(5),
            tokio::time::sleep(Duration::from_secs(3600)),
        )
        .await;
        assert!(result.is_some());
    }
}
