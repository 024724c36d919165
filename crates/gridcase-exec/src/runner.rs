//! External binary invocation
//!
//! Each case runs as a fully isolated subprocess in its own directory:
//! `<executable> <mode-flag> <case-file>` with stdout and stderr
//! captured. The seam is a trait so the engine can be driven without
//! the real model binary.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use gridcase_core::{CaseFile, Config, ExecutionRecord};

use crate::error::ExecError;

/// Something that can run one case
#[async_trait]
pub trait CaseRunner: Send + Sync {
    /// Run a case and capture its output
    async fn run(&self, case: &CaseFile) -> Result<ExecutionRecord, ExecError>;
}

/// Runs the configured external model binary
pub struct ModelRunner {
    executable: PathBuf,
    mode_flag: &'static str,
}

impl ModelRunner {
    /// Build a runner from the model configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            executable: config.model.executable.clone(),
            mode_flag: config.model.mode.flag(),
        }
    }
}

#[async_trait]
impl CaseRunner for ModelRunner {
    async fn run(&self, case: &CaseFile) -> Result<ExecutionRecord, ExecError> {
        debug!(dir = %case.dir.display(), file = %case.file, "running case");
        let output = Command::new(&self.executable)
            .arg(self.mode_flag)
            .arg(&case.file)
            .current_dir(&case.dir)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        Ok(ExecutionRecord {
            dir: case.dir.clone(),
            file: case.file.clone(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}
