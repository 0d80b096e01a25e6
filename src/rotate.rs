use crate::config::types::RotationSpec;
use crate::source::discover::expand_pattern;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

const ROTATED_SUFFIX: &str = ".old";

/// One rotation loop: sleep, rename every matched file, then run the
/// configured command. Runs until the process is terminated. Callers skip
/// specs with a non-positive interval.
pub async fn run_rotation(spec: RotationSpec) {
    let interval = Duration::from_secs(spec.interval as u64);
    loop {
        info!(seconds = spec.interval, "sleeping before rotate");
        sleep(interval).await;
        rotate_once(&spec).await;
    }
}

/// Perform one rotation cycle.
///
/// Patterns are expanded fresh each cycle so newly matching files are
/// picked up. A rename failure skips only that file. The command runs
/// after all rename attempts, regardless of how many succeeded — external
/// writers are expected to reopen their handles only once the files have
/// already been moved.
pub async fn rotate_once(spec: &RotationSpec) {
    for pattern in &spec.files {
        for file in expand_pattern(pattern) {
            match std::fs::rename(&file, rotated_path(&file)) {
                Ok(()) => info!(path = %file.display(), "moved log file"),
                Err(e) => {
                    error!(
                        path = %file.display(),
                        error = %e,
                        "unable to move log file in rotation"
                    );
                    continue;
                }
            }
        }
    }

    if let Some(command) = &spec.command {
        match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                info!(command = %command, "rotation command successful");
            }
            Ok(output) => {
                error!(
                    command = %command,
                    status = %output.status,
                    "rotate command failed"
                );
            }
            Err(e) => {
                error!(command = %command, error = %e, "rotate command failed");
            }
        }
    }
}

fn rotated_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}{}", path.display(), ROTATED_SUFFIX))
}
