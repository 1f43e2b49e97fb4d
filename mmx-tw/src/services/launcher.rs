//! External training process launcher
//!
//! Spawns exactly one training process per job, hands it the descriptor by
//! file path (never by command-line value), and captures combined
//! stdout/stderr as the job log. A non-zero exit is a reportable outcome,
//! not an error; only a failure to spawn at all is an `Err`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use mmx_common::paths::{JOB_DESCRIPTOR_FILE, TRAINING_LOG_FILE};
use mmx_common::store::ArtifactStore;
use mmx_common::{Error, Result};

use super::descriptor::JobDescriptor;

/// Result of one training invocation
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Exit code of the process, `None` if terminated by timeout or signal
    pub exit_code: Option<i32>,
    /// Whether the wall-clock limit expired before exit
    pub timed_out: bool,
    /// Combined stdout/stderr, also persisted as `training.log`
    pub log: String,
}

impl TrainOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Launches the external training binary
pub struct TrainerLauncher {
    binary: String,
    timeout: Duration,
    requested_cores: Option<usize>,
    work_dir: PathBuf,
}

impl TrainerLauncher {
    pub fn new(binary: impl Into<String>, timeout: Duration, requested_cores: Option<usize>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            requested_cores,
            work_dir: std::env::temp_dir(),
        }
    }

    /// Stage descriptor files under `dir` instead of the system temp dir
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Run one training job to completion (or timeout)
    ///
    /// The descriptor copy is persisted under the run prefix before the
    /// process starts; the captured log is persisted after it exits. The
    /// child is the sole writer of every other artifact under the run.
    pub async fn launch(
        &self,
        descriptor: &JobDescriptor,
        store: &dyn ArtifactStore,
    ) -> Result<TrainOutcome> {
        let run = descriptor.run_id()?;
        let descriptor_json = serde_json::to_vec_pretty(descriptor)?;
        store.put(&run.artifact_key(JOB_DESCRIPTOR_FILE), &descriptor_json)?;

        let descriptor_path = self
            .work_dir
            .join(format!("mmx_job_{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&descriptor_path, &descriptor_json).await?;

        // The host may hand us fewer cores than nominally requested; the
        // child must size its own parallelism from the effective value.
        let effective_cores = effective_parallelism();
        if let Some(requested) = self.requested_cores {
            if requested != effective_cores {
                warn!(
                    requested = requested,
                    effective = effective_cores,
                    "requested core count differs from effective parallelism"
                );
            }
        }

        info!(
            run = %run,
            binary = %self.binary,
            timeout_secs = self.timeout.as_secs(),
            "launching training process"
        );

        let mut child = match Command::new(&self.binary)
            .arg(&descriptor_path)
            .env("MMX_EFFECTIVE_CORES", effective_cores.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                // No process will ever read the staged descriptor now
                let _ = tokio::fs::remove_file(&descriptor_path).await;
                return Err(Error::Launch(format!(
                    "failed to spawn {}: {}",
                    self.binary, e
                )));
            }
        };

        let mut stdout = child.stdout.take().ok_or_else(|| {
            let _ = std::fs::remove_file(&descriptor_path);
            Error::Launch("child stdout not captured".to_string())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            let _ = std::fs::remove_file(&descriptor_path);
            Error::Launch("child stderr not captured".to_string())
        })?;

        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let (timed_out, status) = match timeout(self.timeout, async {
            let _ = tokio::join!(
                stdout.read_to_end(&mut out_buf),
                stderr.read_to_end(&mut err_buf)
            );
            child.wait().await
        })
        .await
        {
            Ok(wait_result) => (false, Some(wait_result?)),
            Err(_) => {
                warn!(run = %run, "training exceeded timeout, terminating");
                let _ = child.start_kill();
                let _ = child.wait().await;
                (true, None)
            }
        };

        let _ = tokio::fs::remove_file(&descriptor_path).await;

        let mut log = String::from_utf8_lossy(&out_buf).into_owned();
        if !err_buf.is_empty() {
            if !log.is_empty() && !log.ends_with('\n') {
                log.push('\n');
            }
            log.push_str(&String::from_utf8_lossy(&err_buf));
        }
        if timed_out {
            log.push_str(&format!(
                "\ntraining terminated after exceeding the {}s timeout\n",
                self.timeout.as_secs()
            ));
        }

        store.put(&run.artifact_key(TRAINING_LOG_FILE), log.as_bytes())?;

        let exit_code = status.and_then(|s| s.code());
        let outcome = TrainOutcome {
            exit_code,
            timed_out,
            log,
        };
        info!(
            run = %run,
            exit_code = ?outcome.exit_code,
            timed_out = outcome.timed_out,
            succeeded = outcome.succeeded(),
            "training process finished"
        );
        Ok(outcome)
    }
}

/// Effective available parallelism at runtime
///
/// Under fractional or cgroup-limited CPU quotas this can differ from the
/// nominally allocated core count, so it is always queried, never assumed.
pub fn effective_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::descriptor::{TrainingWindow, VariableRoles};
    use mmx_common::store::FsArtifactStore;
    use std::path::PathBuf;

    fn descriptor() -> JobDescriptor {
        JobDescriptor {
            revision: "r100".to_string(),
            segment: "de".to_string(),
            timestamp: "0827_143022".to_string(),
            iterations: 10,
            trials: 1,
            training_window: TrainingWindow::Fraction(0.8),
            variables: VariableRoles::default(),
            input_data_ref: PathBuf::from("/tmp/input.csv"),
            annotation_file: None,
            output_prefix: "robyn/r100/de/0827_143022".to_string(),
        }
    }

    #[cfg(unix)]
    fn script(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("trainer.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_captures_log_and_persists_artifacts() {
        let store_dir = tempfile::tempdir().unwrap();
        let script_dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(store_dir.path()).unwrap();
        let binary = script(script_dir.path(), "echo training started; echo done");

        let launcher = TrainerLauncher::new(binary, Duration::from_secs(10), None);
        let outcome = launcher.launch(&descriptor(), &store).await.unwrap();

        assert!(outcome.succeeded());
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.log.contains("training started"));
        assert!(store
            .exists("robyn/r100/de/0827_143022/job_descriptor.json")
            .unwrap());
        assert!(store
            .exists("robyn/r100/de/0827_143022/training.log")
            .unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_reported_not_raised() {
        let store_dir = tempfile::tempdir().unwrap();
        let script_dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(store_dir.path()).unwrap();
        let binary = script(script_dir.path(), "echo boom >&2; exit 3");

        let launcher = TrainerLauncher::new(binary, Duration::from_secs(10), None);
        let outcome = launcher.launch(&descriptor(), &store).await.unwrap();

        assert!(!outcome.succeeded());
        assert!(!outcome.timed_out);
        assert_eq!(outcome.exit_code, Some(3));
        assert!(outcome.log.contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_terminates_and_flags_the_job() {
        let store_dir = tempfile::tempdir().unwrap();
        let script_dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(store_dir.path()).unwrap();
        let binary = script(script_dir.path(), "sleep 30");

        let launcher = TrainerLauncher::new(binary, Duration::from_millis(300), None);
        let outcome = launcher.launch(&descriptor(), &store).await.unwrap();

        assert!(outcome.timed_out);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.log.contains("timeout"));
        // The log is still persisted for a timed-out run
        assert!(store
            .exists("robyn/r100/de/0827_143022/training.log")
            .unwrap());
    }

    #[tokio::test]
    async fn test_unspawnable_binary_is_launch_error() {
        let store_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(store_dir.path()).unwrap();

        let launcher = TrainerLauncher::new(
            "/nonexistent/mmx-trainer",
            Duration::from_secs(1),
            None,
        )
        .with_work_dir(work_dir.path());
        match launcher.launch(&descriptor(), &store).await {
            Err(Error::Launch(_)) => {}
            other => panic!("expected Launch error, got {:?}", other),
        }
        // The staged descriptor is removed on the failed-spawn path too
        let leftover = std::fs::read_dir(work_dir.path()).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_effective_parallelism_is_positive() {
        assert!(effective_parallelism() >= 1);
    }
}
