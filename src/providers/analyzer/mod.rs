//! Repository content analysis.

mod base;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::StageError;
use crate::model::DetectedInfo;

pub use base::{BaseAnalyzer, DirScan, NixpacksPlanSummary, scan_dir};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeError {
    #[error("cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("nixpacks: {0}")]
    Nixpacks(String),
}

impl AnalyzeError {
    pub fn as_label(&self) -> &'static str {
        match self {
            AnalyzeError::Io { .. } => "analyze_io",
            AnalyzeError::Nixpacks(_) => "analyze_nixpacks",
        }
    }
}

impl From<AnalyzeError> for StageError {
    fn from(e: AnalyzeError) -> Self {
        StageError::Infrastructure(e.to_string())
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync + 'static {
    /// Detects which builders can handle the tree at `path`.
    async fn detect(&self, path: &Path) -> Result<DetectedInfo, AnalyzeError>;
}
