pub mod batch;
pub mod delivery;
pub mod forward;

use crate::config::types::{
    SinkKind, SinkSpec, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT_SECS,
};
use crate::dispatch::{create_queue, EventSender, SinkTable};
use crate::event::{rfc3339_now, Event, TIMESTAMP_FIELD};
use crate::inject::local_hostname;
use delivery::{HttpPublisher, IndexerClient, LoggerDelivery, NullDelivery, WarehouseClient};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to build http client for sink '{name}': {source}")]
    Client {
        name: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Build the full name -> queue table and spawn one worker task per
/// declared sink. The table is complete before this returns, so producers
/// can be started against it immediately; it is never mutated afterwards.
pub fn spawn_sinks(specs: &[SinkSpec]) -> Result<SinkTable, SinkError> {
    let mut table = HashMap::new();

    for spec in specs {
        let (queue_tx, queue_rx) = create_queue();

        match &spec.kind {
            SinkKind::Publisher {
                endpoint,
                topic,
                auth_token,
            } => {
                let publisher =
                    HttpPublisher::new(endpoint.clone(), topic.clone(), auth_token.clone())
                        .map_err(|e| SinkError::Client {
                            name: spec.name.clone(),
                            source: e,
                        })?;
                // Queued from its own task so it cannot race producers
                // already filling the channel.
                tokio::spawn(queue_hello_event(queue_tx.clone(), topic.clone()));
                tokio::spawn(forward::run_forward_sink(
                    spec.name.clone(),
                    queue_rx,
                    publisher,
                ));
            }
            SinkKind::Logger { enabled } => {
                tokio::spawn(forward::run_forward_sink(
                    spec.name.clone(),
                    queue_rx,
                    LoggerDelivery::new(spec.name.clone(), *enabled),
                ));
            }
            SinkKind::Warehouse {
                endpoint,
                project,
                batch_size,
                batch_timeout,
            } => {
                let (size, timeout) =
                    resolve_batch_params(&spec.name, *batch_size, *batch_timeout);
                let client = WarehouseClient::new(endpoint.clone(), project.clone()).map_err(
                    |e| SinkError::Client {
                        name: spec.name.clone(),
                        source: e,
                    },
                )?;
                tokio::spawn(batch::run_batch_sink(
                    spec.name.clone(),
                    size,
                    timeout,
                    queue_rx,
                    client,
                ));
            }
            SinkKind::Indexer { hosts, index } => {
                let indexer = IndexerClient::new(hosts.clone(), index.clone()).map_err(|e| {
                    SinkError::Client {
                        name: spec.name.clone(),
                        source: e,
                    }
                })?;
                tokio::spawn(forward::run_forward_sink(
                    spec.name.clone(),
                    queue_rx,
                    indexer,
                ));
            }
            SinkKind::Disabled => {
                tokio::spawn(forward::run_forward_sink(
                    spec.name.clone(),
                    queue_rx,
                    NullDelivery,
                ));
            }
        }

        table.insert(spec.name.clone(), queue_tx);
    }

    Ok(Arc::new(table))
}

/// Apply the fixed fallbacks for unset or zero batch parameters.
fn resolve_batch_params(name: &str, batch_size: usize, batch_timeout: u64) -> (usize, Duration) {
    let size = if batch_size == 0 {
        debug!(sink = %name, "batch_size not set, applying default of 500");
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    };
    let timeout = if batch_timeout == 0 {
        debug!(sink = %name, "batch_timeout not set, applying default of 30 seconds");
        DEFAULT_BATCH_TIMEOUT_SECS
    } else {
        batch_timeout
    };
    (size, Duration::from_secs(timeout))
}

/// Self-describing startup event, so the receiving side can track which
/// hosts and versions are sending in data.
fn hello_event(topic: &str) -> Event {
    let mut event = Event::new();
    event.set("topic", topic.into());
    event.set("fling_version", env!("CARGO_PKG_VERSION").into());
    event.set("hostname", local_hostname().into());
    event.set(TIMESTAMP_FIELD, rfc3339_now().into());
    event.set("message", "Starting up fling publisher sink".into());
    event
}

async fn queue_hello_event(queue: EventSender, topic: String) {
    if queue.send(Arc::new(hello_event(&topic))).await.is_ok() {
        info!(topic = %topic, "publisher init message queued");
    }
}
