//! Import handling for completed downloads
//!
//! When a tracked download completes, the tracker hands its output path to an
//! [`ImportHandler`]. Implementations can move files into a library, kick off
//! an external pipeline, or do nothing beyond acknowledging the completion.
//! A failed import is retried on the next reconciliation pass.

use crate::config::{ImportConfig, ImportMode};
use crate::error::ImportError;
use crate::types::TrackedDownload;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Trait for importing completed downloads
///
/// Implementations are called at most once per completed download per pass;
/// returning an error leaves the download unimported so the next pass tries
/// again.
#[async_trait]
pub trait ImportHandler: Send + Sync {
    /// Import the completed download's output
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be imported. The completion
    /// detector logs the error and retries on the next pass.
    async fn import(&self, download: &TrackedDownload) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Import handler that acknowledges completions without touching files
///
/// The default when no import pipeline is configured: completed downloads
/// are recorded in history and left in place at the client's output path.
pub struct NoOpImportHandler;

#[async_trait]
impl ImportHandler for NoOpImportHandler {
    async fn import(&self, _download: &TrackedDownload) -> crate::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Import handler that runs an external command per completed download
///
/// The command receives the configured arguments followed by the output path,
/// plus `GRABTRACK_*` environment variables describing the download. A
/// non-zero exit status or a timeout counts as a failed import.
pub struct CommandImportHandler {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandImportHandler {
    /// Build a handler around the given program
    pub fn new(program: PathBuf, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }

    fn env_vars(download: &TrackedDownload) -> HashMap<String, String> {
        let mut env_vars: HashMap<String, String> = HashMap::new();
        env_vars.insert("GRABTRACK_ID".to_string(), download.id.to_string());
        env_vars.insert("GRABTRACK_TITLE".to_string(), download.item.title.clone());
        env_vars.insert(
            "GRABTRACK_CLIENT".to_string(),
            download.item.client_name.clone(),
        );

        if let Some(cat) = &download.item.category {
            env_vars.insert("GRABTRACK_CATEGORY".to_string(), cat.clone());
        }

        if let Some(path) = &download.item.output_path {
            env_vars.insert("GRABTRACK_PATH".to_string(), path.display().to_string());
        }

        env_vars
    }
}

#[async_trait]
impl ImportHandler for CommandImportHandler {
    async fn import(&self, download: &TrackedDownload) -> crate::Result<()> {
        let output_path = download
            .item
            .output_path
            .as_ref()
            .ok_or_else(|| ImportError::OutputMissing {
                title: download.item.title.clone(),
            })?;

        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .arg(output_path)
                .envs(Self::env_vars(download))
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                if output.status.success() {
                    tracing::debug!(
                        program = ?self.program,
                        download_id = %download.id,
                        "import command succeeded"
                    );
                    Ok(())
                } else {
                    let exit_code = output.status.code();
                    tracing::warn!(
                        program = ?self.program,
                        download_id = %download.id,
                        code = ?exit_code,
                        "import command failed"
                    );
                    Err(ImportError::CommandFailed {
                        program: self.program.display().to_string(),
                        exit_code,
                    }
                    .into())
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    program = ?self.program,
                    download_id = %download.id,
                    error = %e,
                    "failed to run import command"
                );
                Err(ImportError::Failed {
                    title: download.item.title.clone(),
                    reason: e.to_string(),
                }
                .into())
            }
            Err(_) => {
                tracing::warn!(
                    program = ?self.program,
                    download_id = %download.id,
                    timeout = ?self.timeout,
                    "import command timed out"
                );
                Err(ImportError::Failed {
                    title: download.item.title.clone(),
                    reason: format!("import command timed out after {:?}", self.timeout),
                }
                .into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Build the import handler selected by the configuration
///
/// # Errors
///
/// Returns `Error::Config` when command mode is selected without a program.
pub fn from_config(config: &ImportConfig) -> crate::Result<Arc<dyn ImportHandler>> {
    match config.mode {
        ImportMode::Noop => Ok(Arc::new(NoOpImportHandler)),
        ImportMode::Command => {
            let program = config.command.clone().ok_or_else(|| crate::Error::Config {
                message: "import.mode is \"command\" but import.command is not set".into(),
                key: Some("import.command".into()),
            })?;
            Ok(Arc::new(CommandImportHandler::new(
                program,
                config.args.clone(),
                config.timeout,
            )))
        }
    }
}
