//! Build-config synthesis from a repository analysis.
//!
//! Preference order when the caller gave no explicit recipe:
//! 1. a discovered Dockerfile (`Dockerfile` itself, else the first candidate);
//! 2. a checked-in `nixpacks.json|toml` (builder left unset, resolved to nixpacks later);
//! 3. the plan nixpacks generated for the tree.

use crate::error::StageError;
use crate::model::{BuildConfig, BuilderKind, KeyValue, RepoAnalysis};

/// Synthesizes a [`BuildConfig`] rooted at `root`.
///
/// Fails with an input error carrying the analysis reason when the tree is not buildable.
pub fn synthesize(analysis: &RepoAnalysis, root: &str) -> Result<BuildConfig, StageError> {
    if !analysis.is_buildable {
        let reason = if analysis.reason.is_empty() {
            "not buildable".to_string()
        } else {
            analysis.reason.clone()
        };
        return Err(StageError::Input(reason));
    }

    let mut cfg = BuildConfig {
        root_directory: root.to_string(),
        ..Default::default()
    };

    let dockerfiles = analysis
        .info
        .docker
        .as_ref()
        .map(|d| d.dockerfiles.as_slice())
        .unwrap_or_default();

    if let Some(first) = dockerfiles.first() {
        cfg.builder = Some(BuilderKind::Docker);
        cfg.dockerfile_path = dockerfiles
            .iter()
            .find(|f| f.as_str() == "Dockerfile")
            .unwrap_or(first)
            .clone();
        return Ok(cfg);
    }

    let Some(nix) = analysis.info.nixpacks.as_ref() else {
        return Err(StageError::Input("not buildable".into()));
    };

    if !nix.config_path.is_empty() {
        cfg.nixpacks_path = nix.config_path.clone();
        return Ok(cfg);
    }

    cfg.builder = Some(BuilderKind::Nixpacks);
    cfg.envs = nix
        .variables
        .iter()
        .map(|(k, v)| KeyValue {
            key: k.clone(),
            value: v.clone(),
        })
        .collect();
    cfg.nix_pkgs = nix.nix_packages.clone();
    cfg.apt_pkgs = nix.apt_packages.clone();
    cfg.nix_libs = nix.nix_libraries.clone();
    cfg.install_command = nix.install_commands.join(" ");
    cfg.build_command = nix.build_commands.join(" ");
    cfg.start_command = nix.start_command.clone();
    Ok(cfg)
}
