use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use super::docker::{image_id, is_engine_unavailable};
use super::{BuildError, Builder, BuiltImage, Plan, image_labels, tree_relative};
use crate::model::{BuildConfig, BuilderKind};
use crate::providers::command;

/// Builds images with the `nixpacks` CLI; the plan is nixpacks' own JSON plan.
pub struct NixpacksBuilder {
    version: String,
    nixpacks_bin: PathBuf,
    docker_bin: PathBuf,
}

impl NixpacksBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            nixpacks_bin: PathBuf::from("nixpacks"),
            docker_bin: PathBuf::from("docker"),
        }
    }

    pub fn with_binaries(mut self, nixpacks: impl Into<PathBuf>, docker: impl Into<PathBuf>) -> Self {
        self.nixpacks_bin = nixpacks.into();
        self.docker_bin = docker.into();
        self
    }
}

/// `nixpacks plan` arguments for a build config (path excluded).
fn plan_args(config: &BuildConfig) -> Vec<String> {
    let mut args = vec!["plan".to_string(), "--format".into(), "json".into()];
    let mut flag = |name: &str, value: &str| {
        if !value.is_empty() {
            args.push(name.to_string());
            args.push(value.to_string());
        }
    };
    flag("--config", &config.nixpacks_path);
    flag("--install-cmd", &config.install_command);
    flag("--build-cmd", &config.build_command);
    flag("--start-cmd", &config.start_command);
    for kv in &config.envs {
        flag("--env", &format!("{}={}", kv.key, kv.value));
    }
    for p in &config.nix_pkgs {
        flag("--pkgs", p);
    }
    for p in &config.apt_pkgs {
        flag("--apt", p);
    }
    for p in &config.nix_libs {
        flag("--libs", p);
    }
    args
}

#[async_trait]
impl Builder for NixpacksBuilder {
    fn kind(&self) -> BuilderKind {
        BuilderKind::Nixpacks
    }

    async fn plan(&self, config: &BuildConfig, path: &Path) -> Result<Plan, BuildError> {
        if !config.nixpacks_path.is_empty() && tree_relative(&config.nixpacks_path).is_none() {
            return Err(BuildError::InvalidConfig(config.nixpacks_path.clone()));
        }
        if !config.nixpacks_path.is_empty()
            && !tokio::fs::try_exists(path.join(&config.nixpacks_path))
                .await
                .unwrap_or(false)
        {
            return Err(BuildError::MissingConfig(config.nixpacks_path.clone()));
        }

        let mut cmd = Command::new(&self.nixpacks_bin);
        cmd.args(plan_args(config)).arg(path);
        let out = command::run(&mut cmd)
            .await
            .map_err(|e| BuildError::Engine(format!("cannot run nixpacks: {e}")))?;
        if !out.success {
            let msg = out.combined();
            return Err(if !config.nixpacks_path.is_empty() && msg.to_lowercase().contains("parse") {
                BuildError::InvalidConfig(msg)
            } else {
                BuildError::Engine(msg)
            });
        }

        let raw = out.stdout.trim();
        serde_json::from_str::<serde_json::Value>(raw)
            .map_err(|e| BuildError::Engine(format!("nixpacks returned an unreadable plan: {e}")))?;
        Ok(Plan::new(raw))
    }

    async fn build(
        &self,
        user_id: &str,
        repo: &str,
        path: &Path,
        plan: &Plan,
    ) -> Result<BuiltImage, BuildError> {
        serde_json::from_str::<serde_json::Value>(plan.as_str())
            .map_err(|_| BuildError::InvalidPlan)?;
        let name = Uuid::new_v4().to_string();

        let mut cmd = Command::new(&self.nixpacks_bin);
        cmd.arg("build")
            .arg(path)
            .args(["--json-plan", plan.as_str(), "--name", &name]);
        for (k, v) in image_labels(&self.version, BuilderKind::Nixpacks, repo, user_id) {
            cmd.arg("--label").arg(format!("{k}={v}"));
        }

        info!(%repo, "nixpacks build");
        let out = command::run(&mut cmd)
            .await
            .map_err(|e| BuildError::Engine(format!("cannot run nixpacks: {e}")))?;
        if !out.success {
            return Err(if is_engine_unavailable(&out.stderr) {
                BuildError::Engine(out.stderr.trim().to_string())
            } else {
                BuildError::NotCompiled {
                    output: out.combined(),
                }
            });
        }

        let image_id = image_id(&self.docker_bin, &name).await?;
        debug!(%image_id, %name, "nixpacks build done");
        Ok(BuiltImage {
            image_id,
            output: out.combined(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyValue;

    #[test]
    fn plan_args_skip_empty_fields() {
        let cfg = BuildConfig {
            builder: Some(BuilderKind::Nixpacks),
            install_command: "npm ci".into(),
            start_command: "npm start".into(),
            envs: vec![KeyValue {
                key: "NODE_ENV".into(),
                value: "production".into(),
            }],
            nix_pkgs: vec!["ffmpeg".into()],
            ..Default::default()
        };
        let args = plan_args(&cfg);
        assert_eq!(
            args,
            vec![
                "plan", "--format", "json", "--install-cmd", "npm ci", "--start-cmd", "npm start",
                "--env", "NODE_ENV=production", "--pkgs", "ffmpeg",
            ]
        );
    }

    #[tokio::test]
    async fn missing_nixpacks_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BuildConfig {
            nixpacks_path: "nixpacks.toml".into(),
            ..Default::default()
        };
        let err = NixpacksBuilder::new("test").plan(&cfg, dir.path()).await.unwrap_err();
        assert_eq!(err, BuildError::MissingConfig("nixpacks.toml".into()));
    }

    #[tokio::test]
    async fn nixpacks_config_outside_tree_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BuildConfig {
            nixpacks_path: "../shared/nixpacks.toml".into(),
            ..Default::default()
        };
        let err = NixpacksBuilder::new("test").plan(&cfg, dir.path()).await.unwrap_err();
        assert_eq!(err, BuildError::InvalidConfig("../shared/nixpacks.toml".into()));
    }
}
