use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BuildError, Builder, BuiltImage, Plan, image_labels, tree_relative};
use crate::model::{BuildConfig, BuilderKind};
use crate::providers::command::{self, CommandOutput};

/// Builds images from a Dockerfile with the `docker` CLI.
pub struct DockerBuilder {
    version: String,
    docker_bin: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct DockerPlan {
    dockerfile_path: String,
    envs: BTreeMap<String, String>,
}

impl DockerBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            docker_bin: PathBuf::from("docker"),
        }
    }

    pub fn with_binary(mut self, bin: impl Into<PathBuf>) -> Self {
        self.docker_bin = bin.into();
        self
    }
}

#[async_trait]
impl Builder for DockerBuilder {
    fn kind(&self) -> BuilderKind {
        BuilderKind::Docker
    }

    async fn plan(&self, config: &BuildConfig, path: &Path) -> Result<Plan, BuildError> {
        let dockerfile = if config.dockerfile_path.is_empty() {
            "Dockerfile".to_string()
        } else {
            config.dockerfile_path.clone()
        };
        let Some(rel) = tree_relative(&dockerfile) else {
            return Err(BuildError::InvalidConfig(dockerfile.clone()));
        };
        let dockerfile = rel.to_string_lossy().into_owned();
        if !tokio::fs::try_exists(path.join(&dockerfile))
            .await
            .unwrap_or(false)
        {
            return Err(BuildError::MissingConfig(dockerfile));
        }
        let plan = DockerPlan {
            dockerfile_path: dockerfile,
            envs: config
                .envs
                .iter()
                .map(|kv| (kv.key.clone(), kv.value.clone()))
                .collect(),
        };
        serde_json::to_string(&plan)
            .map(Plan::new)
            .map_err(|e| BuildError::Engine(e.to_string()))
    }

    async fn build(
        &self,
        user_id: &str,
        repo: &str,
        path: &Path,
        plan: &Plan,
    ) -> Result<BuiltImage, BuildError> {
        let plan: DockerPlan =
            serde_json::from_str(plan.as_str()).map_err(|_| BuildError::InvalidPlan)?;
        let tag = Uuid::new_v4().to_string();

        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(["build", "--rm", "--force-rm", "-f"])
            .arg(path.join(&plan.dockerfile_path))
            .args(["-t", &tag]);
        for (k, v) in image_labels(&self.version, BuilderKind::Docker, repo, user_id) {
            cmd.arg("--label").arg(format!("{k}={v}"));
        }
        for (k, v) in &plan.envs {
            cmd.arg("--build-arg").arg(format!("{k}={v}"));
        }
        cmd.arg(path);

        info!(%repo, dockerfile = %plan.dockerfile_path, "docker build");
        let out = command::run(&mut cmd)
            .await
            .map_err(|e| BuildError::Engine(format!("cannot run docker: {e}")))?;
        if !out.success {
            return Err(classify_failure(&out));
        }

        let image_id = image_id(&self.docker_bin, &tag).await?;
        debug!(%image_id, %tag, "docker build done");
        Ok(BuiltImage {
            image_id,
            output: out.combined(),
        })
    }
}

fn classify_failure(out: &CommandOutput) -> BuildError {
    let stderr = out.stderr.as_str();
    if is_engine_unavailable(stderr) {
        BuildError::Engine(stderr.trim().to_string())
    } else if stderr.contains("Cannot locate specified Dockerfile") {
        BuildError::MissingConfig(stderr.trim().to_string())
    } else if stderr.contains("dockerfile parse error") {
        BuildError::InvalidConfig(stderr.trim().to_string())
    } else {
        BuildError::NotCompiled {
            output: out.combined(),
        }
    }
}

pub(super) fn is_engine_unavailable(stderr: &str) -> bool {
    stderr.contains("Cannot connect to the Docker daemon")
        || stderr.contains("permission denied while trying to connect to the Docker daemon")
}

/// Resolves a local tag to its image id.
pub(super) async fn image_id(docker_bin: &Path, tag: &str) -> Result<String, BuildError> {
    let out = command::run(Command::new(docker_bin).args(["images", "-q", tag]))
        .await
        .map_err(|e| BuildError::Engine(format!("cannot run docker: {e}")))?;
    let id = out.stdout.lines().next().unwrap_or_default().trim().to_string();
    if !out.success || id.is_empty() {
        return Err(BuildError::Engine(format!("image {tag} not found after build")));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyValue;

    #[tokio::test]
    async fn plan_requires_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BuildConfig {
            builder: Some(BuilderKind::Docker),
            dockerfile_path: "Dockerfile".into(),
            ..Default::default()
        };
        let err = DockerBuilder::new("test").plan(&cfg, dir.path()).await.unwrap_err();
        assert_eq!(err, BuildError::MissingConfig("Dockerfile".into()));
    }

    #[tokio::test]
    async fn dockerfile_outside_tree_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(tmp.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        let cfg = BuildConfig {
            builder: Some(BuilderKind::Docker),
            dockerfile_path: "../Dockerfile".into(),
            ..Default::default()
        };
        let err = DockerBuilder::new("test").plan(&cfg, &root).await.unwrap_err();
        assert_eq!(err, BuildError::InvalidConfig("../Dockerfile".into()));
    }

    #[tokio::test]
    async fn leading_slash_is_tree_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("deploy")).unwrap();
        std::fs::write(dir.path().join("deploy/Dockerfile"), "FROM scratch\n").unwrap();
        let cfg = BuildConfig {
            builder: Some(BuilderKind::Docker),
            dockerfile_path: "/deploy/Dockerfile".into(),
            ..Default::default()
        };
        let plan = DockerBuilder::new("test").plan(&cfg, dir.path()).await.unwrap();
        let decoded: DockerPlan = serde_json::from_str(plan.as_str()).unwrap();
        assert_eq!(decoded.dockerfile_path, "deploy/Dockerfile");
    }

    #[tokio::test]
    async fn plan_carries_dockerfile_and_envs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        let cfg = BuildConfig {
            builder: Some(BuilderKind::Docker),
            envs: vec![KeyValue {
                key: "PORT".into(),
                value: "8080".into(),
            }],
            ..Default::default()
        };
        let plan = DockerBuilder::new("test").plan(&cfg, dir.path()).await.unwrap();
        let decoded: DockerPlan = serde_json::from_str(plan.as_str()).unwrap();
        assert_eq!(decoded.dockerfile_path, "Dockerfile");
        assert_eq!(decoded.envs.get("PORT").map(String::as_str), Some("8080"));
    }

    #[tokio::test]
    async fn garbage_plan_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = DockerBuilder::new("test")
            .build("u", "r", dir.path(), &Plan::new("not json"))
            .await
            .unwrap_err();
        assert_eq!(err, BuildError::InvalidPlan);
    }

    #[test]
    fn failure_classification() {
        let engine = CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: "Cannot connect to the Docker daemon at unix:///var/run/docker.sock".into(),
        };
        assert!(matches!(classify_failure(&engine), BuildError::Engine(_)));

        let compile = CommandOutput {
            success: false,
            stdout: "Step 4/6 : RUN cargo build".into(),
            stderr: "error[E0308]: mismatched types".into(),
        };
        match classify_failure(&compile) {
            BuildError::NotCompiled { output } => assert!(output.contains("E0308")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
