use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use super::{Registry, RegistryError};
use crate::providers::command;

const TAG_TIMEOUT: Duration = Duration::from_secs(180);

/// Registry reached through the local docker daemon.
pub struct DockerRegistry {
    server: String,
    username: String,
    password: String,
    docker_bin: PathBuf,
}

impl DockerRegistry {
    /// Leave `username` and `password` empty for anonymous push.
    pub fn new(server: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        let reg = Self {
            server: server.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            docker_bin: PathBuf::from("docker"),
        };
        if reg.username.is_empty() {
            warn!(server = %reg.server, "no registry credentials configured, pushing anonymously");
        }
        reg
    }

    pub fn with_binary(mut self, bin: impl Into<PathBuf>) -> Self {
        self.docker_bin = bin.into();
        self
    }

    /// Full reference an image is tagged with.
    pub fn reference(&self, user: &str, app: &str) -> String {
        format!("{}/{}/{}", self.server, user, app)
    }

    async fn login(&self) -> Result<(), RegistryError> {
        let mut child = Command::new(&self.docker_bin)
            .args(["login", &self.server, "-u", &self.username, "--password-stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RegistryError::Login(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(self.password.as_bytes())
                .await
                .map_err(|e| RegistryError::Login(e.to_string()))?;
        }
        let out = child
            .wait_with_output()
            .await
            .map_err(|e| RegistryError::Login(e.to_string()))?;
        if !out.status.success() {
            return Err(RegistryError::Login(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for DockerRegistry {
    async fn tag_image(&self, image_id: &str, user: &str, app: &str) -> Result<String, RegistryError> {
        let reference = self.reference(user, app);
        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(["tag", image_id, &reference]);
        let out = tokio::time::timeout(TAG_TIMEOUT, command::run(&mut cmd))
            .await
            .map_err(|_| RegistryError::TagTimeout {
                image: image_id.to_string(),
            })?
            .map_err(|e| RegistryError::Tag(e.to_string()))?;
        if !out.success {
            return Err(RegistryError::Tag(out.combined()));
        }
        Ok(reference)
    }

    async fn push_image(&self, reference: &str) -> Result<(), RegistryError> {
        if !self.username.is_empty() {
            self.login().await?;
        }
        info!(%reference, "pushing image");
        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(["push", reference]);
        let out = command::run(&mut cmd)
            .await
            .map_err(|e| RegistryError::Push(e.to_string()))?;
        if !out.success {
            return Err(RegistryError::Push(out.combined()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_layout() {
        let reg = DockerRegistry::new("registry.local:5000/", "", "");
        assert_eq!(reg.reference("u1", "app:abc123"), "registry.local:5000/u1/app:abc123");
    }
}
