//! # Orchestrator: one delivery, one response, one acknowledgement.
//!
//! ```text
//! decode ─► gate ─► mark_building ─► pull ─► analyze ─► plan ─► build ─► [push] ─► finalize
//!   │         │                        │                                   │
//!   │         └─ deleting: ack, no response                                └─ re-read state;
//!   │                                                                          deleting: ack, no response
//!   └─ any failure: cleanup ─► (user fault in pull..build: state=failed) ─► ack/nack ─► response
//! ```
//!
//! - Stages are linear; the first failure is terminal for the delivery.
//! - Cancellation is checked before every stage. A cancelled delivery is
//!   requeued without a response so its redelivery produces one.
//! - The working directory is reclaimed on every exit path.
//! - Stage errors never escape [`Orchestrator::handle`]; only broker I/O does.

use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerError, Delivery, ResponsePublisher};
use crate::error::StageError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{
    ApplicationState, BuildConfig, BuildRequest, BuildResponse, Fault, PullInfo, PulledRepoInfo,
    RepoAnalysis,
};
use crate::providers::{ConnectorError, Providers, tree_relative};
use crate::state::StoreError;

use super::fault::{AckAction, classify};
use super::plan;
use super::workdir::WorkDir;

/// Connector used when a request names none.
pub const DEFAULT_CONNECTOR: &str = "github";

const INEXISTING_ROOT: &str = "inexisting root directory";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Gate,
    MarkBuilding,
    Pull,
    Analyze,
    Plan,
    Build,
    Push,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Gate => "gate",
            Stage::MarkBuilding => "mark_building",
            Stage::Pull => "pull",
            Stage::Analyze => "analyze",
            Stage::Plan => "plan",
            Stage::Build => "build",
            Stage::Push => "push",
            Stage::Finalize => "finalize",
        }
    }

    /// Stages whose user faults move the application to `failed`.
    pub fn marks_failed(&self) -> bool {
        matches!(self, Stage::Pull | Stage::Analyze | Stage::Plan | Stage::Build)
    }
}

/// How a delivery ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(Fault),
    /// Acknowledged without building.
    Skipped,
    /// Requeued because shutdown was requested.
    Cancelled,
}

enum Halt {
    Failed(Stage, StageError),
    Skipped(Stage),
    Cancelled(Stage),
}

impl Halt {
    fn at(stage: Stage) -> impl FnOnce(StageError) -> Halt {
        move |err| Halt::Failed(stage, err)
    }
}

struct Job {
    request: BuildRequest,
    pull: PullInfo,
    response: BuildResponse,
    workdir: Option<WorkDir>,
}

/// Drives build requests through the pipeline using the injected collaborators.
pub struct Orchestrator {
    providers: Providers,
    bus: Bus,
}

impl Orchestrator {
    pub fn new(providers: Providers, bus: Bus) -> Self {
        Self { providers, bus }
    }

    /// Processes one delivery to completion.
    ///
    /// Returns an error only when the broker fails to settle the delivery;
    /// the caller treats that as a broken session.
    pub async fn handle(
        &self,
        delivery: Delivery,
        publisher: &ResponsePublisher,
        cancel: &CancellationToken,
    ) -> Result<Outcome, BrokerError> {
        self.bus.publish(Event::new(EventKind::DeliveryReceived));

        let request = match BuildRequest::decode(&delivery.body) {
            Ok(request) => request,
            Err(reason) => {
                debug!(body = %String::from_utf8_lossy(&delivery.body), "undecodable delivery");
                let response = BuildResponse::new("", "");
                return self
                    .finish_failed(
                        &delivery,
                        publisher,
                        response,
                        Stage::Decode,
                        StageError::Decode(reason),
                    )
                    .await;
            }
        };

        let pull = request.pull();
        let mut job = Job {
            response: BuildResponse::new(&request.application_id, &pull.repo),
            pull,
            request,
            workdir: None,
        };
        info!(
            application = %job.request.application_id,
            repo = %job.pull.repo,
            branch = %job.pull.branch,
            "build request received"
        );

        let result = self.drive(&mut job, cancel).await;
        if let Some(dir) = job.workdir.take() {
            // failures are logged by the guard
            let _ = dir.cleanup().await;
        }

        let app = job.request.application_id.as_str();
        match result {
            Ok(()) => {
                delivery.settle(AckAction::Ack).await?;
                let response = job.response.succeed();
                info!(application = app, image = %response.image_name, "image ready");
                self.bus.publish(
                    Event::new(EventKind::BuildSucceeded)
                        .with_application(app)
                        .with_reason(response.image_name.as_str()),
                );
                self.send(publisher, &response).await;
                Ok(Outcome::Succeeded)
            }
            Err(Halt::Skipped(stage)) => {
                delivery.settle(AckAction::Ack).await?;
                info!(application = app, stage = stage.as_str(), "application is being deleted, build skipped");
                self.bus.publish(
                    Event::new(EventKind::BuildSkipped)
                        .with_application(app)
                        .with_stage(stage.as_str()),
                );
                Ok(Outcome::Skipped)
            }
            Err(Halt::Cancelled(stage)) => {
                delivery.settle(AckAction::Nack { requeue: true }).await?;
                info!(application = app, stage = stage.as_str(), "shutdown requested, delivery requeued");
                self.bus.publish(
                    Event::new(EventKind::BuildCancelled)
                        .with_application(app)
                        .with_stage(stage.as_str()),
                );
                Ok(Outcome::Cancelled)
            }
            Err(Halt::Failed(stage, err)) => {
                if err.fault() == Fault::User && stage.marks_failed() {
                    if let Err(e) = self
                        .providers
                        .store
                        .update_state(app, ApplicationState::Failed)
                        .await
                    {
                        error!(application = app, error = %e, "cannot mark application failed");
                    }
                }
                self.finish_failed(&delivery, publisher, job.response, stage, err)
                    .await
            }
        }
    }

    async fn drive(&self, job: &mut Job, cancel: &CancellationToken) -> Result<(), Halt> {
        let store = &self.providers.store;
        let app = job.request.application_id.clone();

        checkpoint(cancel, Stage::Gate)?;
        match store.get_state(&app).await {
            Ok(state) if state.is_deleting() => return Err(Halt::Skipped(Stage::Gate)),
            Ok(state) => debug!(application = %app, state = %state, "gate passed"),
            Err(StoreError::NotFound(_)) => debug!(application = %app, "no recorded state, building"),
            Err(e) => return Err(Halt::Failed(Stage::Gate, StageError::Gate(e.to_string()))),
        }

        checkpoint(cancel, Stage::MarkBuilding)?;
        store
            .update_state(&app, ApplicationState::Building)
            .await
            .map_err(|e| StageError::Infrastructure(format!("cannot mark application building: {e}")))
            .map_err(Halt::at(Stage::MarkBuilding))?;

        checkpoint(cancel, Stage::Pull)?;
        let pulled = self.pull(&job.pull).await.map_err(Halt::at(Stage::Pull))?;
        job.workdir = Some(WorkDir::new(&pulled.path));
        job.response.build_commit = pulled.pulled_commit.clone();
        info!(application = %app, commit = %pulled.pulled_commit, "repository pulled");

        checkpoint(cancel, Stage::Analyze)?;
        let root_dir = job.request.root_directory().to_string();
        let root = resolve_root(&pulled.path, &root_dir)
            .await
            .map_err(Halt::at(Stage::Analyze))?;
        let detected = self
            .providers
            .analyzer
            .detect(&root)
            .await
            .map_err(|e| Halt::Failed(Stage::Analyze, e.into()))?;
        let analysis = RepoAnalysis::from_detected(detected, &root_dir);
        debug!(application = %app, buildable = analysis.is_buildable, builders = ?analysis.info.builders, "repository analyzed");

        checkpoint(cancel, Stage::Plan)?;
        let config = match job.request.build_plan.clone() {
            Some(explicit) if explicit.is_explicit() => explicit,
            _ => plan::synthesize(&analysis, &root_dir).map_err(Halt::at(Stage::Plan))?,
        };
        job.response.plan_used = Some(config.clone());

        checkpoint(cancel, Stage::Build)?;
        let image = self
            .build(&config, &job.pull, &root)
            .await
            .map_err(Halt::at(Stage::Build))?;
        job.response.image_id = image.image_id;
        job.response.build_output = image.output;

        let tag = format!("{}:{}", pulled.short_name(), pulled.pulled_commit);
        job.response.image_name = match &self.providers.registry {
            None => format!("applications/{tag}"),
            Some(registry) => {
                checkpoint(cancel, Stage::Push)?;
                self.recheck_deletion(&app).await?;
                let reference = registry
                    .tag_image(&job.response.image_id, &job.pull.user_id, &tag)
                    .await
                    .map_err(|e| Halt::Failed(Stage::Push, e.into()))?;
                registry
                    .push_image(&reference)
                    .await
                    .map_err(|e| Halt::Failed(Stage::Push, e.into()))?;
                info!(application = %app, reference = %reference, "image pushed");
                reference
            }
        };
        Ok(())
    }

    async fn pull(&self, pull: &PullInfo) -> Result<PulledRepoInfo, StageError> {
        let name = match pull.connector.trim() {
            "" => DEFAULT_CONNECTOR,
            name => name,
        };
        let connector = self
            .providers
            .connector(name)
            .ok_or_else(|| StageError::Input(format!("connector {name} not supported")))?;
        if pull.token.trim().is_empty() {
            return Err(ConnectorError::EmptyToken.into());
        }
        let pulled = connector
            .pull(&pull.user_id, &pull.branch, &pull.repo, &pull.commit, &pull.token)
            .await?;
        Ok(pulled)
    }

    async fn build(
        &self,
        config: &BuildConfig,
        pull: &PullInfo,
        root: &Path,
    ) -> Result<crate::providers::BuiltImage, StageError> {
        let kind = config
            .effective_builder()
            .ok_or_else(|| StageError::Input("no builder selected".into()))?;
        let builder = self
            .providers
            .builder(kind)
            .ok_or_else(|| StageError::Infrastructure(format!("builder {kind} not available")))?;

        let plan = builder.plan(config, root).await?;
        debug!(builder = %kind, plan = ?plan, "build planned");
        let image = builder.build(&pull.user_id, &pull.repo, root, &plan).await?;
        info!(builder = %kind, image = %image.image_id, "image built");
        Ok(image)
    }

    /// Skips the push when the application was deleted while building.
    async fn recheck_deletion(&self, app: &str) -> Result<(), Halt> {
        match self.providers.store.get_state(app).await {
            Ok(state) if state.is_deleting() => Err(Halt::Skipped(Stage::Push)),
            Ok(_) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => {
                warn!(application = app, error = %e, "cannot re-read application state, pushing anyway");
                Ok(())
            }
        }
    }

    async fn finish_failed(
        &self,
        delivery: &Delivery,
        publisher: &ResponsePublisher,
        response: BuildResponse,
        stage: Stage,
        err: StageError,
    ) -> Result<Outcome, BrokerError> {
        let (fault, action) = classify(&err);
        warn!(
            application = %response.application_id,
            stage = stage.as_str(),
            fault = fault.as_str(),
            kind = err.as_label(),
            error = %err,
            "stage failed"
        );

        let mut ev = Event::new(EventKind::StageFailed)
            .with_stage(stage.as_str())
            .with_fault(fault)
            .with_reason(err.to_string());
        if !response.application_id.is_empty() {
            ev = ev.with_application(response.application_id.as_str());
        }
        self.bus.publish(ev);

        delivery.settle(action).await?;

        let mut response = response.fail(fault, err.as_message());
        if !err.build_output().is_empty() {
            response.build_output = err.build_output().to_string();
        }
        self.send(publisher, &response).await;
        Ok(Outcome::Failed(fault))
    }

    async fn send(&self, publisher: &ResponsePublisher, response: &BuildResponse) {
        if let Err(e) = publisher.publish(response).await {
            error!(
                application = %response.application_id,
                kind = e.as_label(),
                error = %e,
                "cannot publish build response"
            );
        }
    }
}

fn checkpoint(cancel: &CancellationToken, next: Stage) -> Result<(), Halt> {
    if cancel.is_cancelled() {
        Err(Halt::Cancelled(next))
    } else {
        Ok(())
    }
}

/// Resolves the requested root directory inside the pulled tree.
///
/// Absolute paths are taken relative to the tree; `..` is rejected.
async fn resolve_root(base: &Path, root: &str) -> Result<PathBuf, StageError> {
    let Some(rel) = tree_relative(root) else {
        return Err(StageError::Input(INEXISTING_ROOT.into()));
    };

    let path = base.join(rel);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => Ok(path),
        Ok(_) => Err(StageError::Input(INEXISTING_ROOT.into())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(StageError::Input(INEXISTING_ROOT.into()))
        }
        Err(e) => Err(StageError::Infrastructure(format!(
            "cannot inspect root directory: {e}"
        ))),
    }
}
