use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Capacity of every sink queue, fixed at startup.
pub const QUEUE_CAPACITY: usize = 1000;

/// Fallback batch size for warehouse sinks when unset or zero.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Fallback batch timeout (seconds) for warehouse sinks when unset or zero.
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 30;

/// Fallback glob rescan interval (seconds) when unset or zero.
pub const DEFAULT_GLOB_INTERVAL_SECS: u64 = 30;

/// Top level structure of the config document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub rotations: Vec<RotationSpec>,
    #[serde(default)]
    pub sinks: Vec<SinkSpec>,
}

/// One file (or glob pattern) to tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub format: LineFormat,
    #[serde(default, rename = "glob")]
    pub is_glob: bool,
    /// Seconds between glob rescans; 0 selects the default.
    #[serde(default)]
    pub glob_interval: u64,
    /// Where to begin reading when the file is first opened.
    #[serde(default)]
    pub start: ReadStart,
    /// Destination sink names, dispatched in listed order.
    pub outputs: Vec<String>,
    #[serde(default)]
    pub inject: Vec<Injection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineFormat {
    /// Each line is a JSON object of event fields.
    Json,
    /// Each line is wrapped under the `message` field.
    #[default]
    Plain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStart {
    Beginning,
    /// Never replay historical content.
    #[default]
    End,
}

/// One enrichment rule. Exactly one source is active, chosen by priority:
/// `env_value` > `value` > `hostname`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Injection {
    pub field: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub env_value: String,
    #[serde(default)]
    pub hostname: bool,
}

/// A set of files to rotate and the command to run afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSpec {
    /// Path patterns, freshly glob-expanded every cycle.
    pub files: Vec<String>,
    #[serde(default)]
    pub command: Option<String>,
    /// Seconds between rotations; a value <= 0 is never scheduled.
    pub interval: i64,
}

/// A named delivery destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: SinkKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkKind {
    /// Forward sink publishing one serialized event at a time to a
    /// message-bus endpoint.
    Publisher {
        #[serde(default)]
        endpoint: String,
        #[serde(default)]
        topic: String,
        #[serde(default)]
        auth_token: String,
    },
    /// Forward sink writing events to the local structured log.
    Logger {
        #[serde(default = "default_true")]
        enabled: bool,
    },
    /// Batch-accumulate sink delivering rows to an analytical warehouse.
    Warehouse {
        #[serde(default)]
        endpoint: String,
        #[serde(default)]
        project: String,
        /// 0 selects the default of 500.
        #[serde(default)]
        batch_size: usize,
        /// Seconds; 0 selects the default of 30.
        #[serde(default)]
        batch_timeout: u64,
    },
    /// Forward sink indexing events into a search cluster, one document
    /// per event, rotating across hosts.
    Indexer {
        #[serde(default)]
        hosts: Vec<String>,
        #[serde(default)]
        index: String,
    },
    /// Declared but inert; drains and discards.
    Disabled,
}

fn default_true() -> bool {
    true
}

impl FileSpec {
    /// Effective glob rescan interval, applying the default for zero.
    pub fn effective_glob_interval(&self) -> u64 {
        if self.glob_interval == 0 {
            DEFAULT_GLOB_INTERVAL_SECS
        } else {
            self.glob_interval
        }
    }
}
