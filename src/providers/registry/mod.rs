//! Image registries.

mod docker;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::StageError;

pub use docker::DockerRegistry;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tagging {image} timed out")]
    TagTimeout { image: String },

    #[error("tag failed: {0}")]
    Tag(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("push failed: {0}")]
    Push(String),
}

impl RegistryError {
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::TagTimeout { .. } => "registry_tag_timeout",
            RegistryError::Tag(_) => "registry_tag",
            RegistryError::Login(_) => "registry_login",
            RegistryError::Push(_) => "registry_push",
        }
    }
}

impl From<RegistryError> for StageError {
    fn from(e: RegistryError) -> Self {
        StageError::Infrastructure(e.to_string())
    }
}

#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Tags a local image for this registry and returns the full reference.
    async fn tag_image(&self, image_id: &str, user: &str, app: &str)
    -> Result<String, RegistryError>;

    async fn push_image(&self, reference: &str) -> Result<(), RegistryError>;
}
