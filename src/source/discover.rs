use crate::config::types::FileSpec;
use crate::dispatch::SinkTable;
use crate::source::tail::TailWorker;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Periodically expands a glob-style file spec and spawns a tail worker for
/// every newly observed concrete path.
pub struct GlobDiscovery {
    spec: FileSpec,
    table: SinkTable,
}

impl GlobDiscovery {
    pub fn new(spec: FileSpec, table: SinkTable) -> Self {
        Self { spec, table }
    }

    pub async fn run(self) {
        if self.spec.glob_interval == 0 {
            debug!(
                pattern = %self.spec.path.display(),
                "glob_interval not set, applying default of 30 seconds"
            );
        }
        let interval = Duration::from_secs(self.spec.effective_glob_interval());
        let pattern = self.spec.path.to_string_lossy().into_owned();

        // Paths stay in the seen set for the process lifetime. A file that
        // disappears and later exists again under the same path is not
        // re-attached, and its worker is never stopped.
        let mut seen: HashSet<PathBuf> = HashSet::new();

        loop {
            debug!(pattern = %pattern, "checking for new files in glob");
            for path in discover_new(&mut seen, &pattern) {
                info!(path = %path.display(), "adding tail for file");
                let worker =
                    TailWorker::new(path, self.spec.clone(), Arc::clone(&self.table));
                tokio::spawn(worker.run());
            }
            sleep(interval).await;
        }
    }
}

/// Expand a pattern and return only the paths not seen before, marking
/// them seen.
pub fn discover_new(seen: &mut HashSet<PathBuf>, pattern: &str) -> Vec<PathBuf> {
    expand_pattern(pattern)
        .into_iter()
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Expand a glob pattern to the regular files it currently matches.
pub fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(entries) => entries.flatten().filter(|path| path.is_file()).collect(),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "invalid glob pattern");
            Vec::new()
        }
    }
}
