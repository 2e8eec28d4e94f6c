//! Output directory cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Recursively deletes one directory.
#[derive(Debug, Clone)]
pub struct Cleanup {
    name: &'static str,
    dir: PathBuf,
}

impl Cleanup {
    pub fn new(name: &'static str, dir: impl Into<PathBuf>) -> Self {
        Self {
            name,
            dir: dir.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the directory. A directory that does not exist is not an error.
    pub async fn run(&self) -> Result<(), PipelineError> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::debug!("Removed {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PipelineError::Clean {
                path: self.dir.clone(),
                source,
            }),
        }
    }
}
