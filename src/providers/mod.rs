//! # External collaborators consumed by the pipeline.
//!
//! Each concern is a trait with one or more implementations, resolved once at
//! startup into an explicit capability map ([`Providers`]) and handed to the
//! orchestrator by reference:
//!
//! ```text
//! Providers {
//!   connectors: name        ─► Arc<dyn Connector>   (github)
//!   builders:   BuilderKind ─► Arc<dyn Builder>     (docker, nixpacks)
//!   analyzer:   Arc<dyn Analyzer>                   (base: fs scan + nixpacks CLI)
//!   registry:   Option<Arc<dyn Registry>>           (docker CLI)
//!   store:      Arc<dyn ApplicationStateStore>
//! }
//! ```
//!
//! Concrete implementations drive the `git`, `docker` and `nixpacks` binaries
//! through [`command::run`]; the GitHub API is reached with `reqwest`.

pub mod analyzer;
pub mod builder;
pub(crate) mod command;
pub mod connector;
pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::model::BuilderKind;
use crate::state::{ApplicationStateStore, MemoryStore};

pub use analyzer::{AnalyzeError, Analyzer, BaseAnalyzer};
pub use builder::{BuildError, Builder, BuiltImage, DockerBuilder, NixpacksBuilder, Plan};
pub(crate) use builder::tree_relative;
pub use connector::{Connector, ConnectorError, GithubConnector, RepoMetadata};
pub use registry::{DockerRegistry, Registry, RegistryError};

/// Capability map injected into the orchestrator.
#[derive(Clone)]
pub struct Providers {
    pub connectors: HashMap<String, Arc<dyn Connector>>,
    pub builders: HashMap<BuilderKind, Arc<dyn Builder>>,
    pub analyzer: Arc<dyn Analyzer>,
    pub registry: Option<Arc<dyn Registry>>,
    pub store: Arc<dyn ApplicationStateStore>,
}

impl Providers {
    /// Resolves every configured service into its implementation.
    ///
    /// Expects a validated config; unknown names are skipped. Download
    /// directories are created up front.
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, ConnectorError> {
        let user_agent = cfg.user_agent();

        let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
        for c in &cfg.services.connectors {
            if c.name != "github" {
                continue;
            }
            tokio::fs::create_dir_all(&c.download_directory)
                .await
                .map_err(|e| ConnectorError::Io(e.to_string()))?;
            let github = GithubConnector::new(&c.download_directory, &user_agent)?;
            connectors.insert(c.name.clone(), Arc::new(github));
        }

        let mut builders: HashMap<BuilderKind, Arc<dyn Builder>> = HashMap::new();
        for kind in cfg
            .services
            .builders
            .iter()
            .filter_map(|b| BuilderKind::from_name(&b.name))
        {
            let builder: Arc<dyn Builder> = match kind {
                BuilderKind::Docker => Arc::new(DockerBuilder::new(&cfg.app.version)),
                BuilderKind::Nixpacks => Arc::new(NixpacksBuilder::new(&cfg.app.version)),
            };
            builders.insert(kind, builder);
        }

        let registry = cfg
            .services
            .registries
            .iter()
            .find(|r| r.name == "docker")
            .map(|r| {
                if r.username.is_empty() || r.password.is_empty() {
                    warn!(server = %r.server_address, "registry credentials missing, pushing anonymously");
                }
                Arc::new(DockerRegistry::new(&r.server_address, &r.username, &r.password))
                    as Arc<dyn Registry>
            });

        info!(
            connectors = connectors.len(),
            builders = builders.len(),
            registry = registry.is_some(),
            driver = %cfg.database.driver,
            "providers resolved"
        );

        Ok(Self {
            connectors,
            builders,
            analyzer: Arc::new(BaseAnalyzer::default()),
            registry,
            store: Arc::new(MemoryStore::new()),
        })
    }

    pub fn connector(&self, name: &str) -> Option<&Arc<dyn Connector>> {
        self.connectors.get(name)
    }

    pub fn builder(&self, kind: BuilderKind) -> Option<&Arc<dyn Builder>> {
        self.builders.get(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuilderSection, ConnectorSection, RegistrySection};

    #[tokio::test]
    async fn resolves_configured_services() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");

        let mut cfg = AppConfig::default();
        cfg.services.connectors.push(ConnectorSection {
            name: "github".into(),
            download_directory: downloads.clone(),
        });
        cfg.services.builders.push(BuilderSection { name: "nixpacks".into() });
        cfg.services.builders.push(BuilderSection { name: "docker".into() });
        cfg.services.registries.push(RegistrySection {
            name: "docker".into(),
            server_address: "registry.example.com".into(),
            ..RegistrySection::default()
        });

        let providers = Providers::from_config(&cfg).await.unwrap();
        assert!(downloads.is_dir());
        assert!(providers.connector("github").is_some());
        assert!(providers.connector("gitlab").is_none());
        assert!(providers.builder(BuilderKind::Docker).is_some());
        assert!(providers.builder(BuilderKind::Nixpacks).is_some());
        assert!(providers.registry.is_some());
    }

    #[tokio::test]
    async fn registry_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.services.connectors.push(ConnectorSection {
            name: "github".into(),
            download_directory: dir.path().to_path_buf(),
        });
        cfg.services.builders.push(BuilderSection { name: "docker".into() });

        let providers = Providers::from_config(&cfg).await.unwrap();
        assert!(providers.registry.is_none());
        assert!(providers.builder(BuilderKind::Nixpacks).is_none());
    }
}
