//! Default analyzer: a directory scan plus `nixpacks detect` / `nixpacks plan`.
//!
//! Builder candidates:
//! - docker when at least one Dockerfile-like file exists;
//! - nixpacks when no `.dockerignore` is present and nixpacks recognized a
//!   provider or a `nixpacks.json|toml` is checked in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{AnalyzeError, Analyzer};
use crate::model::{BuilderKind, DetectedInfo, DockerInfo, NixpacksInfo};
use crate::providers::command;

pub struct BaseAnalyzer {
    nixpacks_bin: PathBuf,
}

impl Default for BaseAnalyzer {
    fn default() -> Self {
        Self::new("nixpacks")
    }
}

impl BaseAnalyzer {
    pub fn new(nixpacks_bin: impl Into<PathBuf>) -> Self {
        Self {
            nixpacks_bin: nixpacks_bin.into(),
        }
    }

    async fn nixpacks(&self, args: &[&str], path: &Path) -> Result<String, AnalyzeError> {
        let mut cmd = Command::new(&self.nixpacks_bin);
        cmd.args(args).arg(path);
        let out = command::run(&mut cmd)
            .await
            .map_err(|e| AnalyzeError::Nixpacks(format!("cannot run nixpacks: {e}")))?;
        if !out.success {
            return Err(AnalyzeError::Nixpacks(out.combined()));
        }
        Ok(out.stdout)
    }
}

#[async_trait]
impl Analyzer for BaseAnalyzer {
    async fn detect(&self, path: &Path) -> Result<DetectedInfo, AnalyzeError> {
        let owned = path.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || scan_dir(&owned))
            .await
            .map_err(|e| AnalyzeError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })??;

        let providers = parse_providers(&self.nixpacks(&["detect"], path).await?);
        let plan = if providers.is_empty() {
            NixpacksPlanSummary::default()
        } else {
            NixpacksPlanSummary::parse(&self.nixpacks(&["plan", "--format", "json"], path).await?)?
        };
        debug!(?providers, dockerfiles = ?scan.docker.dockerfiles, "analyzed tree");

        Ok(scan.into_detected(providers, plan))
    }
}

/// What a directory listing alone reveals.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirScan {
    pub docker: DockerInfo,
    pub nixpacks_config: String,
}

impl DirScan {
    fn into_detected(self, providers: Vec<String>, plan: NixpacksPlanSummary) -> DetectedInfo {
        let mut info = DetectedInfo::default();
        let docker = self.docker;

        if !docker.dockerfiles.is_empty() {
            info.builders.push(BuilderKind::Docker);
        }
        let blocked = docker.dockerignore_found;
        if !docker.dockerfiles.is_empty() || blocked {
            info.docker = Some(docker);
        }

        if !blocked && (!providers.is_empty() || !self.nixpacks_config.is_empty()) {
            info.builders.push(BuilderKind::Nixpacks);
            let mut nix = NixpacksInfo {
                providers,
                config_path: self.nixpacks_config,
                ..Default::default()
            };
            if !nix.providers.is_empty() {
                nix.start_command = plan.start_command;
                nix.build_commands = plan.build_commands;
                nix.install_commands = plan.install_commands;
                nix.variables = plan.variables;
            }
            info.nixpacks = Some(nix);
        }
        info
    }
}

/// Lists `path` (non-recursive) looking for Dockerfiles, `.dockerignore` and nixpacks configs.
pub fn scan_dir(path: &Path) -> Result<DirScan, AnalyzeError> {
    let io_err = |e: std::io::Error| AnalyzeError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let mut names: Vec<String> = std::fs::read_dir(path)
        .map_err(io_err)?
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut scan = DirScan::default();
    for name in names {
        let lower = name.to_lowercase();
        if lower == "nixpacks.json" || lower == "nixpacks.toml" {
            scan.nixpacks_config = name.clone();
        }
        if lower.starts_with("dockerfile") || lower.ends_with("dockerfile") {
            scan.docker.dockerfiles.push(name.clone());
        }
        if lower.ends_with(".dockerignore") {
            scan.docker.dockerignore_found = true;
        }
    }
    Ok(scan)
}

fn parse_providers(out: &str) -> Vec<String> {
    out.split([',', '\n'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// The parts of a generated nixpacks plan the worker cares about.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NixpacksPlanSummary {
    pub start_command: String,
    pub install_commands: Vec<String>,
    pub build_commands: Vec<String>,
    pub variables: BTreeMap<String, String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawPlan {
    variables: BTreeMap<String, String>,
    phases: BTreeMap<String, RawPhase>,
    start: RawStart,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawPhase {
    cmds: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawStart {
    cmd: Option<String>,
}

impl NixpacksPlanSummary {
    pub fn parse(json: &str) -> Result<Self, AnalyzeError> {
        let raw: RawPlan = serde_json::from_str(json)
            .map_err(|e| AnalyzeError::Nixpacks(format!("unreadable plan: {e}")))?;
        let mut phases = raw.phases;
        let mut cmds = |phase: &str| phases.remove(phase).map(|p| p.cmds).unwrap_or_default();
        Ok(Self {
            install_commands: cmds("install"),
            build_commands: cmds("build"),
            start_command: raw.start.cmd.unwrap_or_default(),
            variables: raw.variables,
        })
    }
}
