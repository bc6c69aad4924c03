//! # Build request (request queue body).
//!
//! ```text
//! { applicationID, pullInfo: { userID, token, repo, connector, branch, commit },
//!   buildPlan: { builder, rootDirectory, startCommand, dockerfilePath?,
//!                nixpacksPath?, envs:[{key,value}], nixPkgs?, nixLibs?, aptPkgs?,
//!                installCommand?, buildCommand? } }
//! ```
//!
//! Decoding is strict about shape (wrong types fail) and lenient about absence:
//! every optional field defaults to empty. An empty `builder` string means
//! "not chosen" rather than an unknown builder.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Image builder implementations known to the worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderKind {
    Docker,
    Nixpacks,
}

impl BuilderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuilderKind::Docker => "docker",
            BuilderKind::Nixpacks => "nixpacks",
        }
    }

    /// Parses a configured builder name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "docker" => Some(BuilderKind::Docker),
            "nixpacks" => Some(BuilderKind::Nixpacks),
            _ => None,
        }
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single environment variable injected into the build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Where and how to fetch the source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullInfo {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub token: String,
    pub repo: String,
    pub connector: String,
    pub branch: String,
    /// Commit to build; empty or `latest` builds the branch head.
    pub commit: String,
}

/// Recipe hints for building the image.
///
/// Either supplied by the caller or synthesized from a
/// [`RepoAnalysis`](crate::model::RepoAnalysis).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(deserialize_with = "empty_builder_as_none")]
    pub builder: Option<BuilderKind>,
    pub root_directory: String,
    pub start_command: String,

    // docker
    pub dockerfile_path: String,

    // nixpacks
    pub nixpacks_path: String,
    pub envs: Vec<KeyValue>,
    pub nix_pkgs: Vec<String>,
    pub nix_libs: Vec<String>,
    pub apt_pkgs: Vec<String>,
    pub install_command: String,
    pub build_command: String,
}

impl BuildConfig {
    /// True when the caller chose a recipe instead of asking for detection.
    pub fn is_explicit(&self) -> bool {
        self.builder.is_some() || !self.nixpacks_path.is_empty()
    }

    /// Builder that will execute this config.
    ///
    /// An unset builder with a nixpacks config file resolves to nixpacks.
    pub fn effective_builder(&self) -> Option<BuilderKind> {
        match self.builder {
            Some(kind) => Some(kind),
            None if !self.nixpacks_path.is_empty() => Some(BuilderKind::Nixpacks),
            None => None,
        }
    }
}

/// One unit of work pulled off the request queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildRequest {
    #[serde(rename = "applicationID")]
    pub application_id: String,
    #[serde(rename = "pullInfo")]
    pub pull_info: Option<PullInfo>,
    #[serde(rename = "buildPlan")]
    pub build_plan: Option<BuildConfig>,
}

impl BuildRequest {
    /// Decodes and shape-checks a delivery body.
    pub fn decode(body: &[u8]) -> Result<Self, String> {
        let req: BuildRequest = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        if req.application_id.trim().is_empty() {
            return Err("missing applicationID".into());
        }
        match &req.pull_info {
            None => Err("missing pullInfo".into()),
            Some(p) if p.repo.trim().is_empty() => Err("missing pullInfo.repo".into()),
            Some(_) => Ok(req),
        }
    }

    /// Pull info of a decoded request.
    ///
    /// [`BuildRequest::decode`] guarantees presence; a default is returned otherwise.
    pub fn pull(&self) -> PullInfo {
        self.pull_info.clone().unwrap_or_default()
    }

    /// Root directory requested by the caller (empty = repository root).
    pub fn root_directory(&self) -> &str {
        self.build_plan
            .as_ref()
            .map(|p| p.root_directory.as_str())
            .unwrap_or("")
    }
}

fn empty_builder_as_none<'de, D>(de: D) -> Result<Option<BuilderKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => BuilderKind::from_name(name)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown builder {name:?}"))),
    }
}
