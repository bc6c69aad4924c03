//! # Image builders.
//!
//! Two-phase contract:
//!
//! ```text
//! plan(config, path)              ─► Plan            (opaque, serializable)
//! build(user, repo, path, &Plan)  ─► BuiltImage      (image id + engine output)
//! ```
//!
//! A build that failed because of the user's code returns
//! [`BuildError::NotCompiled`] with the captured engine output; a builder that
//! could not even attempt the build returns any other variant.
//!
//! Every image is labeled with [`image_labels`].

mod docker;
mod nixpacks;

use std::fmt;
use std::path::{Component, Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StageError;
use crate::model::{BuildConfig, BuilderKind};

pub use docker::DockerBuilder;
pub use nixpacks::NixpacksBuilder;

/// Builder-specific recipe. The pipeline never looks inside.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan(String);

impl Plan {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plan({} bytes)", self.0.len())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltImage {
    pub image_id: String,
    pub output: String,
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The file the config references does not exist.
    #[error("missing build config: {0}")]
    MissingConfig(String),

    /// The referenced file exists but cannot be parsed.
    #[error("invalid build config: {0}")]
    InvalidConfig(String),

    /// The plan could not be decoded by the builder that produced it.
    #[error("invalid plan")]
    InvalidPlan,

    /// The user's source failed to build.
    #[error("image not compiled")]
    NotCompiled { output: String },

    /// The build engine is unavailable or misbehaved.
    #[error("build engine: {0}")]
    Engine(String),
}

impl BuildError {
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::MissingConfig(_) => "build_missing_config",
            BuildError::InvalidConfig(_) => "build_invalid_config",
            BuildError::InvalidPlan => "build_invalid_plan",
            BuildError::NotCompiled { .. } => "build_not_compiled",
            BuildError::Engine(_) => "build_engine",
        }
    }
}

impl From<BuildError> for StageError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::NotCompiled { output } if !output.trim().is_empty() => {
                StageError::BuildFailure {
                    message: "image not compiled".into(),
                    output,
                }
            }
            e @ (BuildError::MissingConfig(_) | BuildError::InvalidConfig(_)) => {
                StageError::Input(e.to_string())
            }
            e => StageError::Infrastructure(e.to_string()),
        }
    }
}

#[async_trait]
pub trait Builder: Send + Sync + 'static {
    fn kind(&self) -> BuilderKind;

    async fn plan(&self, config: &BuildConfig, path: &Path) -> Result<Plan, BuildError>;

    async fn build(
        &self,
        user_id: &str,
        repo: &str,
        path: &Path,
        plan: &Plan,
    ) -> Result<BuiltImage, BuildError>;
}

/// Traceability labels attached to every image.
pub fn image_labels(
    version: &str,
    kind: BuilderKind,
    repo: &str,
    user_id: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("org.ipaas.image-builder.version", version.to_string()),
        ("org.ipaas.image-builder.builder", kind.to_string()),
        ("application.repo", repo.to_string()),
        ("application.userID", user_id.to_string()),
        (
            "application.builtAt",
            chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
        ),
    ]
}

/// Interprets `rel` as a path inside a source tree.
///
/// A leading `/` is dropped; `None` when any component leaves the tree.
pub(crate) fn tree_relative(rel: &str) -> Option<&Path> {
    let rel = Path::new(rel.trim().trim_start_matches('/'));
    rel.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then_some(rel)
}
