use crate::config::types::QUEUE_CAPACITY;
use crate::event::Event;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

pub type EventSender = mpsc::Sender<Arc<Event>>;
pub type EventReceiver = mpsc::Receiver<Arc<Event>>;

/// The name -> queue table. Built once, fully, before any producer task
/// starts; read-only thereafter, so lookups need no locking.
pub type SinkTable = Arc<HashMap<String, EventSender>>;

/// Create one bounded sink queue.
pub fn create_queue() -> (EventSender, EventReceiver) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Send an event to each destination queue in listed order.
///
/// Sends are awaited: a full queue blocks this producer, which is the
/// pipeline's backpressure mechanism. One stalled sink therefore stalls
/// delivery to every sink listed after it for this source file.
///
/// Config validation guarantees every output name resolves; a miss here is
/// a bug, logged and skipped rather than crashing the worker.
pub async fn dispatch(event: Arc<Event>, outputs: &[String], table: &SinkTable) {
    for name in outputs {
        match table.get(name) {
            Some(queue) => {
                if queue.send(Arc::clone(&event)).await.is_err() {
                    error!(sink = %name, "sink queue closed, event dropped");
                }
            }
            None => {
                debug_assert!(false, "dispatch to unconfigured sink '{name}'");
                error!(sink = %name, "dispatch to unconfigured sink, event skipped");
            }
        }
    }
}
