use crate::config::types::{FileSpec, LineFormat, ReadStart};
use crate::dispatch::{dispatch, SinkTable};
use crate::event::{rfc3339_now, Event, SOURCE_FIELD, TIMESTAMP_FIELD};
use crate::inject::apply_injections;
use serde_json::Value;
use std::fs::{File, Metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const OPEN_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Idle ceiling after which the worker stops and reopens the file even
/// without any error, guarding against descriptor staleness.
const FORCED_RESTART_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Tails one concrete file path: reads appended lines, enriches them into
/// events, and dispatches to every configured sink in listed order.
pub struct TailWorker {
    path: PathBuf,
    spec: FileSpec,
    table: SinkTable,
}

impl TailWorker {
    pub fn new(path: PathBuf, spec: FileSpec, table: SinkTable) -> Self {
        Self { path, spec, table }
    }

    /// Outer retry loop; runs until the process is terminated. Open
    /// failures are logged and retried, never fatal.
    pub async fn run(self) {
        let mut start = self.spec.start;
        loop {
            let (reader, inode) = match self.open(start) {
                Ok(opened) => opened,
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "couldn't tail file");
                    sleep(OPEN_RETRY_DELAY).await;
                    continue;
                }
            };
            info!(path = %self.path.display(), "tailing file");
            // Reopens never replay content already read.
            start = ReadStart::End;

            self.follow(reader, inode).await;
        }
    }

    fn open(&self, start: ReadStart) -> std::io::Result<(BufReader<File>, u64)> {
        let file = File::open(&self.path)?;
        let inode = get_inode(&file.metadata()?);
        let mut reader = BufReader::new(file);
        match start {
            ReadStart::Beginning => {
                reader.seek(SeekFrom::Start(0))?;
            }
            ReadStart::End => {
                reader.seek(SeekFrom::End(0))?;
            }
        }
        Ok((reader, inode))
    }

    /// Inner follow loop. Returning forces a stop-and-reopen cycle through
    /// the outer loop.
    async fn follow(&self, mut reader: BufReader<File>, mut inode: u64) {
        let restart_at = Instant::now() + FORCED_RESTART_INTERVAL;
        // A line flushed to disk without its newline accumulates here until
        // the rest of it arrives; read_line appends across polls.
        let mut pending = String::new();

        loop {
            if Instant::now() >= restart_at {
                debug!(path = %self.path.display(), "periodic restart of tail");
                self.emit(&pending).await;
                return;
            }

            match reader.read_line(&mut pending) {
                Ok(0) => {
                    // At EOF: if the path now points at a different file the
                    // old one was rotated away; pick up the replacement from
                    // its beginning. Otherwise poll for appended content.
                    match self.replaced(inode) {
                        Ok(true) => match self.open(ReadStart::Beginning) {
                            Ok((new_reader, new_inode)) => {
                                info!(path = %self.path.display(), "file replaced, reopening");
                                // Whatever was buffered is all the old file
                                // will ever yield.
                                self.emit(&pending).await;
                                pending.clear();
                                reader = new_reader;
                                inode = new_inode;
                                continue;
                            }
                            Err(e) => {
                                error!(
                                    path = %self.path.display(),
                                    error = %e,
                                    "failed to reopen replaced file"
                                );
                                return;
                            }
                        },
                        Ok(false) => {}
                        Err(e) => {
                            error!(path = %self.path.display(), error = %e, "failed to stat file");
                            return;
                        }
                    }
                    sleep(POLL_INTERVAL).await;
                }
                Ok(_) => {
                    if pending.ends_with('\n') {
                        self.emit(&pending).await;
                        pending.clear();
                    } else {
                        // Mid-line EOF; hold the fragment and wait for the
                        // writer to finish the line.
                        sleep(POLL_INTERVAL).await;
                    }
                }
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "error reading from file");
                    return;
                }
            }
        }
    }

    /// Enrich and dispatch one complete raw line. An empty buffer (nothing
    /// was pending) dispatches nothing.
    async fn emit(&self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let text = raw.trim_end_matches(&['\n', '\r'][..]);
        if let Some(mut event) = parse_line(text, self.spec.format, &self.path) {
            apply_injections(&mut event, &self.spec.inject);
            dispatch(Arc::new(event), &self.spec.outputs, &self.table).await;
        }
    }

    /// Whether the file at our path is no longer the one we hold open.
    /// A missing path is not a replacement: the writer may still be
    /// appending to the renamed file we have open.
    fn replaced(&self, inode: u64) -> std::io::Result<bool> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok(get_inode(&metadata) != inode),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Turn one line into an event, or drop it.
///
/// A JSON parse failure drops only this line; the stream continues. The
/// source field is always set; the timestamp only when the line did not
/// carry one.
pub fn parse_line(line: &str, format: LineFormat, path: &Path) -> Option<Event> {
    let mut event = match format {
        LineFormat::Json => match Event::from_json_line(line) {
            Ok(event) => event,
            Err(e) => {
                error!(message = %line, error = %e, "couldn't parse JSON log line, dropped");
                return None;
            }
        },
        LineFormat::Plain => Event::from_plain_line(line),
    };

    event.set(SOURCE_FIELD, Value::String(path.display().to_string()));
    event.set_if_absent(TIMESTAMP_FIELD, || Value::String(rfc3339_now()));
    Some(event)
}

#[cfg(unix)]
fn get_inode(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn get_inode(metadata: &Metadata) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    metadata.len().hash(&mut hasher);
    if let Ok(modified) = metadata.modified() {
        modified.hash(&mut hasher);
    }
    hasher.finish()
}
