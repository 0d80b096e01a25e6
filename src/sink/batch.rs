use crate::dispatch::EventReceiver;
use crate::sink::delivery::DeliverBatch;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error};

/// Drain a sink queue into a buffer, flushing on a size-or-time trigger.
///
/// Two independent triggers request a flush: the buffer reaching
/// `batch_size`, and the elapsed-timeout timer. Both feed a single-slot
/// flush channel so overlapping triggers coalesce into one flush instead of
/// double-flushing. The timer re-arms only when a flush executes, so a
/// partially filled buffer is delivered within `batch_timeout` even under a
/// sparse stream.
pub async fn run_batch_sink<D: DeliverBatch>(
    name: String,
    batch_size: usize,
    batch_timeout: Duration,
    mut queue: EventReceiver,
    delivery: D,
) {
    let (flush_tx, mut flush_rx) = mpsc::channel::<()>(1);
    let mut batch: Vec<Value> = Vec::new();
    let timer = sleep(batch_timeout);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            received = queue.recv() => {
                let Some(event) = received else {
                    debug!(sink = %name, "queue closed, batch sink stopping");
                    break;
                };
                debug!(sink = %name, event_id = %event.id, "appending event to batch");
                batch.push(event.as_value());
                if batch.len() >= batch_size {
                    debug!(sink = %name, "batch size reached, requesting flush");
                    let _ = flush_tx.try_send(());
                }
            }
            _ = flush_rx.recv() => {
                if !batch.is_empty() {
                    let rows = std::mem::take(&mut batch);
                    debug!(sink = %name, rows = rows.len(), "flushing batch");
                    if let Err(e) = delivery.deliver_batch(rows).await {
                        error!(sink = %name, error = %e, "failed to deliver batch");
                    }
                }
                // An empty flush is a no-op but still re-arms the timer.
                timer.as_mut().reset(Instant::now() + batch_timeout);
            }
            () = &mut timer => {
                debug!(sink = %name, "batch timeout elapsed, requesting flush");
                let _ = flush_tx.try_send(());
                // Hold the deadline open until the flush request executes;
                // the flush branch sets the real deadline.
                timer.as_mut().reset(Instant::now() + batch_timeout);
            }
        }
    }
}
