//! The sequential task that drives every intent of one container.
//!
//! Intents arrive FIFO over an unbounded channel and are polled by this one
//! task, so bodies start in dispatch order and reductions never run
//! concurrently. An intent suspended in a transform does not hold the loop.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

pub(crate) type IntentTask = BoxFuture<'static, ()>;

pub(crate) async fn run(
    container_id: Uuid,
    mut intents: mpsc::UnboundedReceiver<IntentTask>,
    mut cancelled: watch::Receiver<bool>,
) {
    let mut running: FuturesUnordered<IntentTask> = FuturesUnordered::new();
    let mut accepting = true;
    tracing::debug!(container = %container_id, "Event loop started");

    loop {
        tokio::select! {
            biased;

            _ = cancelled.wait_for(|stop| *stop) => break,

            next = intents.recv(), if accepting => match next {
                Some(task) => running.push(task),
                None => accepting = false,
            },

            Some(()) = running.next(), if !running.is_empty() => {}
        }

        if !accepting && running.is_empty() {
            break;
        }
    }

    // Dropping the futures cancels whatever was still in flight.
    let abandoned = running.len();
    drop(running);
    tracing::debug!(
        container = %container_id,
        abandoned = abandoned,
        "Event loop stopped"
    );
}
