//! Trait definitions for content filters.

use std::path::{Path, PathBuf};

/// A file flowing through a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Directory the file was selected from
    pub base: PathBuf,

    /// Path relative to `base`, also used as the output path
    pub path: PathBuf,

    /// File contents
    pub contents: Vec<u8>,
}

impl Asset {
    /// Create an asset from its base directory, relative path and contents.
    pub fn new(base: impl Into<PathBuf>, path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            contents,
        }
    }

    /// Location of the file on disk when it was read.
    pub fn source_path(&self) -> PathBuf {
        self.base.join(&self.path)
    }

    /// Lowercased file extension, or an empty string.
    pub fn extension(&self) -> String {
        extension_of(&self.path)
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, FilterError> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| FilterError::Encoding(format!("{}: {}", self.path.display(), e)))
    }

    /// Replace the contents, keeping base and path.
    pub fn with_contents(self, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            ..self
        }
    }

    /// Change the file extension of the relative path.
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.path.set_extension(ext);
        self
    }
}

pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Errors that can occur while filtering an asset.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Sass error: {0}")]
    Sass(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("CSS error: {0}")]
    Css(String),

    #[error("Reference error: {0}")]
    Reference(String),

    #[error("Invalid UTF-8: {0}")]
    Encoding(String),
}

/// A content transform applied to each asset of a stage.
///
/// Filters are synchronous and may emit zero, one or several assets for
/// each input.
pub trait Filter: Send + Sync {
    /// Filter identifier used in logs (e.g., "sass", "uglify")
    fn name(&self) -> &'static str;

    /// Transform one asset.
    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError>;
}

/// Push an asset through an ordered chain of filters.
pub fn apply_chain(filters: &[std::sync::Arc<dyn Filter>], asset: Asset) -> Result<Vec<Asset>, FilterError> {
    let mut current = vec![asset];

    for filter in filters {
        let mut next = Vec::with_capacity(current.len());
        for asset in current {
            next.extend(filter.apply(asset)?);
        }
        current = next;
    }

    Ok(current)
}
