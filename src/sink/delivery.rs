use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned status {0}")]
    Status(u16),
}

/// Delivery collaborator for forward sinks: hand off one serialized event.
#[async_trait]
pub trait Deliver: Send + Sync + 'static {
    async fn deliver(&self, payload: String) -> Result<(), DeliveryError>;
}

/// Delivery collaborator for batch sinks: hand off one batch of rows.
#[async_trait]
pub trait DeliverBatch: Send + Sync + 'static {
    async fn deliver_batch(&self, rows: Vec<Value>) -> Result<(), DeliveryError>;
}

/// Publishes single events to a message-bus HTTP endpoint.
pub struct HttpPublisher {
    endpoint: String,
    topic: String,
    auth_token: String,
    client: reqwest::Client,
}

impl HttpPublisher {
    pub fn new(
        endpoint: String,
        topic: String,
        auth_token: String,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        info!(endpoint = %endpoint, topic = %topic, "publisher client initialized");
        Ok(Self {
            endpoint,
            topic,
            auth_token,
            client,
        })
    }
}

#[async_trait]
impl Deliver for HttpPublisher {
    async fn deliver(&self, payload: String) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.auth_token)
            .json(&json!({ "topic": self.topic, "data": payload }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Writes events to the local structured log. A disabled logger still
/// drains its queue, it just discards what it receives.
pub struct LoggerDelivery {
    name: String,
    enabled: bool,
}

impl LoggerDelivery {
    pub fn new(name: String, enabled: bool) -> Self {
        Self { name, enabled }
    }
}

#[async_trait]
impl Deliver for LoggerDelivery {
    async fn deliver(&self, payload: String) -> Result<(), DeliveryError> {
        if self.enabled {
            info!(sink = %self.name, event = %payload, "event");
        }
        Ok(())
    }
}

/// Drain-and-discard collaborator for sinks declared `disabled`.
pub struct NullDelivery;

#[async_trait]
impl Deliver for NullDelivery {
    async fn deliver(&self, _payload: String) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Indexes single events as documents into a search cluster, spreading
/// requests across the configured hosts round-robin.
pub struct IndexerClient {
    hosts: Vec<String>,
    index: String,
    next_host: AtomicUsize,
    client: reqwest::Client,
}

impl IndexerClient {
    pub fn new(hosts: Vec<String>, index: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        info!(hosts = ?hosts, index = %index, "indexer client initialized");
        Ok(Self {
            hosts,
            index,
            next_host: AtomicUsize::new(0),
            client,
        })
    }

    fn pick_host(&self) -> &str {
        let turn = self.next_host.fetch_add(1, Ordering::Relaxed);
        &self.hosts[turn % self.hosts.len()]
    }

    fn document_url(&self, host: &str) -> String {
        format!("{}/{}/_doc", host.trim_end_matches('/'), self.index)
    }
}

#[async_trait]
impl Deliver for IndexerClient {
    async fn deliver(&self, payload: String) -> Result<(), DeliveryError> {
        let url = self.document_url(self.pick_host());
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Inserts batches of rows into an analytical warehouse endpoint.
pub struct WarehouseClient {
    endpoint: String,
    project: String,
    client: reqwest::Client,
}

impl WarehouseClient {
    pub fn new(endpoint: String, project: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        info!(endpoint = %endpoint, project = %project, "warehouse client initialized");
        Ok(Self {
            endpoint,
            project,
            client,
        })
    }
}

#[async_trait]
impl DeliverBatch for WarehouseClient {
    async fn deliver_batch(&self, rows: Vec<Value>) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "project": self.project, "rows": rows }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexer_rotates_hosts_in_turn() {
        let client = IndexerClient::new(
            vec![
                "http://search-1:9200".to_string(),
                "http://search-2:9200".to_string(),
            ],
            "logs".to_string(),
        )
        .unwrap();
        assert_eq!(client.pick_host(), "http://search-1:9200");
        assert_eq!(client.pick_host(), "http://search-2:9200");
        assert_eq!(client.pick_host(), "http://search-1:9200");
    }

    #[test]
    fn test_indexer_document_url_handles_trailing_slash() {
        let client = IndexerClient::new(
            vec!["http://search-1:9200/".to_string()],
            "logs".to_string(),
        )
        .unwrap();
        assert_eq!(
            client.document_url(client.pick_host()),
            "http://search-1:9200/logs/_doc"
        );
    }
}
