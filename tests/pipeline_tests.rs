//! End-to-end pipeline tests: tail a real file, dispatch through real sink
//! queues, and capture deliveries with in-memory collaborators.

use async_trait::async_trait;
use fling::config::types::{FileSpec, Injection, LineFormat, ReadStart};
use fling::dispatch::{create_queue, SinkTable};
use fling::event::{SOURCE_FIELD, TIMESTAMP_FIELD};
use fling::sink::batch::run_batch_sink;
use fling::sink::delivery::{Deliver, DeliverBatch, DeliveryError};
use fling::sink::forward::run_forward_sink;
use fling::source::TailWorker;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

#[derive(Clone, Default)]
struct CapturingDelivery {
    payloads: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Deliver for CapturingDelivery {
    async fn deliver(&self, payload: String) -> Result<(), DeliveryError> {
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CapturingBatchDelivery {
    batches: Arc<Mutex<Vec<Vec<Value>>>>,
}

#[async_trait]
impl DeliverBatch for CapturingBatchDelivery {
    async fn deliver_batch(&self, rows: Vec<Value>) -> Result<(), DeliveryError> {
        self.batches.lock().unwrap().push(rows);
        Ok(())
    }
}

fn file_spec(path: &std::path::Path, format: LineFormat, outputs: Vec<&str>) -> FileSpec {
    FileSpec {
        path: path.to_path_buf(),
        format,
        is_glob: false,
        glob_interval: 0,
        start: ReadStart::Beginning,
        outputs: outputs.into_iter().map(String::from).collect(),
        inject: Vec::new(),
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(3), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn plain_line_produces_expected_event_shape() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "something happened").unwrap();
    file.flush().unwrap();

    let (tx, rx) = create_queue();
    let table: SinkTable = Arc::new(HashMap::from([("capture".to_string(), tx)]));

    let delivery = CapturingDelivery::default();
    let payloads = delivery.payloads.clone();
    tokio::spawn(run_forward_sink("capture".to_string(), rx, delivery));

    let mut spec = file_spec(file.path(), LineFormat::Plain, vec!["capture"]);
    spec.inject = vec![Injection {
        field: "env".to_string(),
        value: "staging".to_string(),
        env_value: String::new(),
        hostname: false,
    }];
    let tail = tokio::spawn(TailWorker::new(file.path().to_path_buf(), spec, table).run());

    wait_until(|| !payloads.lock().unwrap().is_empty()).await;
    tail.abort();

    let payload = payloads.lock().unwrap()[0].clone();
    let event: serde_json::Map<String, Value> = serde_json::from_str(&payload).unwrap();
    assert_eq!(
        event.get("message"),
        Some(&Value::String("something happened".to_string()))
    );
    assert_eq!(
        event.get(SOURCE_FIELD),
        Some(&Value::String(file.path().display().to_string()))
    );
    assert_eq!(event.get("env"), Some(&Value::String("staging".to_string())));
    let ts = event.get(TIMESTAMP_FIELD).unwrap().as_str().unwrap();
    assert!(ts.ends_with('Z'), "generated timestamp is RFC 3339 UTC: {ts}");
}

#[tokio::test]
async fn upstream_timestamp_survives_serialization_byte_identical() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "{{\"@timestamp\":\"2023-03-14T01:59:26.535897932Z\",\"level\":\"info\"}}"
    )
    .unwrap();
    file.flush().unwrap();

    let (tx, rx) = create_queue();
    let table: SinkTable = Arc::new(HashMap::from([("capture".to_string(), tx)]));

    let delivery = CapturingDelivery::default();
    let payloads = delivery.payloads.clone();
    tokio::spawn(run_forward_sink("capture".to_string(), rx, delivery));

    let spec = file_spec(file.path(), LineFormat::Json, vec!["capture"]);
    let tail = tokio::spawn(TailWorker::new(file.path().to_path_buf(), spec, table).run());

    wait_until(|| !payloads.lock().unwrap().is_empty()).await;
    tail.abort();

    let payload = payloads.lock().unwrap()[0].clone();
    assert!(payload.contains("\"@timestamp\":\"2023-03-14T01:59:26.535897932Z\""));
}

#[tokio::test]
async fn one_file_fans_out_to_multiple_sinks_in_order() {
    let mut file = NamedTempFile::new().unwrap();
    for i in 0..5 {
        writeln!(file, "line {i}").unwrap();
    }
    file.flush().unwrap();

    let (tx_a, rx_a) = create_queue();
    let (tx_b, rx_b) = create_queue();
    let table: SinkTable = Arc::new(HashMap::from([
        ("first".to_string(), tx_a),
        ("second".to_string(), tx_b),
    ]));

    let delivery_a = CapturingDelivery::default();
    let delivery_b = CapturingDelivery::default();
    let payloads_a = delivery_a.payloads.clone();
    let payloads_b = delivery_b.payloads.clone();
    tokio::spawn(run_forward_sink("first".to_string(), rx_a, delivery_a));
    tokio::spawn(run_forward_sink("second".to_string(), rx_b, delivery_b));

    let spec = file_spec(file.path(), LineFormat::Plain, vec!["first", "second"]);
    let tail = tokio::spawn(TailWorker::new(file.path().to_path_buf(), spec, table).run());

    wait_until(|| payloads_a.lock().unwrap().len() == 5).await;
    wait_until(|| payloads_b.lock().unwrap().len() == 5).await;
    tail.abort();

    // Per-sink delivery order matches per-file line arrival order.
    for payloads in [payloads_a, payloads_b] {
        let got = payloads.lock().unwrap();
        for (i, payload) in got.iter().enumerate() {
            assert!(payload.contains(&format!("line {i}")));
        }
    }
}

#[tokio::test]
async fn tailed_lines_reach_a_batch_sink_as_one_flush() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "a").unwrap();
    writeln!(file, "b").unwrap();
    writeln!(file, "c").unwrap();
    file.flush().unwrap();

    let (tx, rx) = create_queue();
    let table: SinkTable = Arc::new(HashMap::from([("warehouse".to_string(), tx)]));

    let delivery = CapturingBatchDelivery::default();
    let batches = delivery.batches.clone();
    tokio::spawn(run_batch_sink(
        "warehouse".to_string(),
        3,
        Duration::from_secs(60),
        rx,
        delivery,
    ));

    let spec = file_spec(file.path(), LineFormat::Plain, vec!["warehouse"]);
    let tail = tokio::spawn(TailWorker::new(file.path().to_path_buf(), spec, table).run());

    wait_until(|| !batches.lock().unwrap().is_empty()).await;
    tail.abort();

    let got = batches.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].len(), 3);
    assert_eq!(
        got[0][0].get("message"),
        Some(&Value::String("a".to_string()))
    );
}
