//! Results returned by the source-control and analyzer collaborators.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::request::BuilderKind;

/// Result of fetching the source.
///
/// The directory at `path` belongs to the pipeline for the duration of one
/// request and is removed when the request finishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PulledRepoInfo {
    pub path: PathBuf,
    /// Canonical repository URL.
    pub repo_name: String,
    /// Commit actually checked out.
    pub pulled_commit: String,
}

impl PulledRepoInfo {
    /// Last path segment of the canonical name (`https://github.com/org/app` → `app`).
    pub fn short_name(&self) -> &str {
        self.repo_name
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit('/')
            .next()
            .unwrap_or("")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerInfo {
    pub dockerfiles: Vec<String>,
    pub dockerignore_found: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NixpacksInfo {
    pub providers: Vec<String>,
    /// Relative path of `nixpacks.json` / `nixpacks.toml`, empty if none.
    pub config_path: String,
    pub install_commands: Vec<String>,
    pub build_commands: Vec<String>,
    pub start_command: String,
    pub variables: BTreeMap<String, String>,
    pub nix_packages: Vec<String>,
    pub apt_packages: Vec<String>,
    pub nix_libraries: Vec<String>,
}

/// What the analyzer found at the requested root directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedInfo {
    pub builders: Vec<BuilderKind>,
    pub docker: Option<DockerInfo>,
    pub nixpacks: Option<NixpacksInfo>,
}

/// Buildability verdict derived from [`DetectedInfo`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoAnalysis {
    pub is_buildable: bool,
    pub reason: String,
    pub info: DetectedInfo,
}

impl RepoAnalysis {
    /// Judges buildability for a tree analyzed at `root`.
    pub fn from_detected(info: DetectedInfo, root: &str) -> Self {
        if !info.builders.is_empty() {
            return Self {
                is_buildable: true,
                reason: String::new(),
                info,
            };
        }
        let root = if root.is_empty() { "/" } else { root };
        let reason = match &info.docker {
            Some(d) if d.dockerignore_found => "no Dockerfile found and .dockerignore found, the dockerignore prevents our autobuilder from building the repo".to_string(),
            _ => format!(
                "no Dockerfile found and in {root} there are not enough information to automatically detect a build plan"
            ),
        };
        Self {
            is_buildable: false,
            reason,
            info,
        }
    }
}
