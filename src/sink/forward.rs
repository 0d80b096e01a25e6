use crate::dispatch::EventReceiver;
use crate::sink::delivery::Deliver;
use tracing::{debug, error};

/// Drain a sink queue in FIFO order, serializing and delivering one event
/// at a time.
///
/// Every event is independent and at-most-once: a serialization or delivery
/// failure is logged and the next event proceeds; nothing is retried or
/// requeued.
pub async fn run_forward_sink<D: Deliver>(name: String, mut queue: EventReceiver, delivery: D) {
    while let Some(event) = queue.recv().await {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    sink = %name,
                    event_id = %event.id,
                    error = %e,
                    "failed to serialize event, dropped"
                );
                continue;
            }
        };

        match delivery.deliver(payload).await {
            Ok(()) => debug!(sink = %name, event_id = %event.id, "delivered event"),
            Err(e) => error!(
                sink = %name,
                event_id = %event.id,
                error = %e,
                "failed to deliver event"
            ),
        }
    }
    debug!(sink = %name, "queue closed, forward sink stopping");
}
