use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Field recording which file an event came from. Always present after
/// processing.
pub const SOURCE_FIELD: &str = "fling.source";

/// Timestamp field. Set by the pipeline only when the line did not already
/// carry one.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// One structured log record flowing through the pipeline.
///
/// The id never leaves the process; it only correlates debug log lines
/// across workers that handle the same event.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: Uuid,
    fields: Map<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            fields: Map::new(),
        }
    }

    /// Parse a structured-JSON line into an event. The line must be a JSON
    /// object; anything else is a parse error.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        let fields: Map<String, Value> = serde_json::from_str(line)?;
        Ok(Self {
            id: Uuid::new_v4(),
            fields,
        })
    }

    /// Wrap a plain-text line under the `message` field.
    pub fn from_plain_line(line: &str) -> Self {
        let mut event = Self::new();
        event.set("message", Value::String(line.to_string()));
        event
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    /// Set a field only when it is absent, preserving any upstream value.
    pub fn set_if_absent(&mut self, field: &str, value: impl FnOnce() -> Value) {
        if !self.fields.contains_key(field) {
            self.fields.insert(field.to_string(), value());
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Serialize for a forward sink.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    /// The event as a JSON value, for batch sink rows.
    pub fn as_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

/// RFC 3339 timestamp with nanosecond precision, UTC.
pub fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
