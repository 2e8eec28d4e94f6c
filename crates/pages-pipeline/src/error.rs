//! Pipeline errors.

use std::path::PathBuf;

use pages_filters::FilterError;

use crate::stage::StageKind;

/// Errors that can occur while running a task.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("'{stage}' failed on {}: {source}", .path.display())]
    Filter {
        stage: StageKind,
        path: PathBuf,
        #[source]
        source: FilterError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {}: {source}", .path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task aborted: {0}")]
    Join(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}
