//! In-memory collaborators shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::broker::{Acknowledge, Broker, BrokerError, Delivery, ResponseSink, Session};
use crate::events::{Event, EventKind};
use crate::model::{
    ApplicationState, BuildConfig, BuildResponse, BuilderKind, DetectedInfo, PulledRepoInfo,
};
use crate::pipeline::AckAction;
use crate::providers::{
    AnalyzeError, Analyzer, BuildError, Builder, BuiltImage, Connector, ConnectorError, Plan,
    Providers, Registry, RegistryError, RepoMetadata,
};
use crate::state::{ApplicationStateStore, MemoryStore, StoreError};
use crate::subscribers::Subscribe;

/// Subscriber that keeps every event it sees.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Shared log of acknowledgement decisions.
#[derive(Clone, Default)]
pub struct AckLog(Arc<Mutex<Vec<AckAction>>>);

impl AckLog {
    pub fn actions(&self) -> Vec<AckAction> {
        self.0.lock().unwrap().clone()
    }
}

struct MemoryAcker(AckLog);

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.0.0.lock().unwrap().push(AckAction::Ack);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.0.0.lock().unwrap().push(AckAction::Nack { requeue });
        Ok(())
    }
}

pub fn delivery(body: impl Into<Vec<u8>>) -> (Delivery, AckLog) {
    let log = AckLog::default();
    (Delivery::new(body.into(), MemoryAcker(log.clone())), log)
}

pub fn request_body(app: &str, repo: &str, branch: &str, plan: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "applicationID": app,
        "pullInfo": {
            "userID": "u1",
            "token": "t",
            "repo": repo,
            "connector": "",
            "branch": branch,
            "commit": ""
        },
        "buildPlan": plan,
    }))
    .unwrap()
}

#[derive(Default)]
pub struct MemorySink {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn responses(&self) -> Vec<BuildResponse> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|b| serde_json::from_slice(b).unwrap())
            .collect()
    }
}

#[async_trait]
impl ResponseSink for MemorySink {
    async fn publish(&self, body: Vec<u8>) -> Result<(), BrokerError> {
        if self.fail {
            return Err(BrokerError::Publish("channel closed".into()));
        }
        self.sent.lock().unwrap().push(body);
        Ok(())
    }
}

/// State store whose reads can be scripted ahead of the in-memory state.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    reads: Mutex<VecDeque<Result<ApplicationState, StoreError>>>,
    writes: Mutex<Vec<ApplicationState>>,
    fail_writes: bool,
}

impl ScriptedStore {
    pub fn seeded(app: &str, state: ApplicationState) -> Self {
        Self {
            inner: MemoryStore::with_states([(app, state)]),
            ..Default::default()
        }
    }

    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Queues a result returned by the next unscripted `get_state`.
    pub fn script_read(&self, result: Result<ApplicationState, StoreError>) {
        self.reads.lock().unwrap().push_back(result);
    }

    pub fn writes(&self) -> Vec<ApplicationState> {
        self.writes.lock().unwrap().clone()
    }

    pub async fn snapshot(&self, app: &str) -> Option<ApplicationState> {
        self.inner.snapshot(app).await
    }
}

#[async_trait]
impl ApplicationStateStore for ScriptedStore {
    async fn get_state(&self, application_id: &str) -> Result<ApplicationState, StoreError> {
        let scripted = self.reads.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => self.inner.get_state(application_id).await,
        }
    }

    async fn update_state(
        &self,
        application_id: &str,
        state: ApplicationState,
    ) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Backend("write refused".into()));
        }
        self.writes.lock().unwrap().push(state.clone());
        self.inner.update_state(application_id, state).await
    }
}

/// Connector that materializes a small tree under a temp directory.
pub struct FakeConnector {
    dir: PathBuf,
    fail: Option<ConnectorError>,
    cancel: Mutex<Option<CancellationToken>>,
    pulled: Mutex<Vec<PathBuf>>,
}

impl FakeConnector {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            fail: None,
            cancel: Mutex::new(None),
            pulled: Mutex::default(),
        }
    }

    pub fn failing(mut self, err: ConnectorError) -> Self {
        self.fail = Some(err);
        self
    }

    /// Cancels `token` right after the next successful pull.
    pub fn cancel_on_pull(&self, token: CancellationToken) {
        *self.cancel.lock().unwrap() = Some(token);
    }

    pub fn pulled(&self) -> Vec<PathBuf> {
        self.pulled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn validate_url(&self, url: &str, _token: &str) -> Result<String, ConnectorError> {
        Ok(format!("https://github.com/{url}"))
    }

    async fn metadata(&self, _url: &str, _token: &str) -> Result<RepoMetadata, ConnectorError> {
        Ok(RepoMetadata::default())
    }

    async fn pull(
        &self,
        user_id: &str,
        _branch: &str,
        url: &str,
        _commit: &str,
        _token: &str,
    ) -> Result<PulledRepoInfo, ConnectorError> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        let path = self.dir.join(format!("{user_id}-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(path.join("src")).await?;
        tokio::fs::write(path.join("package.json"), b"{\"name\":\"app\"}").await?;
        tokio::fs::write(path.join("src/index.js"), b"console.log(1)").await?;
        self.pulled.lock().unwrap().push(path.clone());

        if let Some(token) = self.cancel.lock().unwrap().take() {
            token.cancel();
        }
        Ok(PulledRepoInfo {
            path,
            repo_name: format!("https://github.com/{url}"),
            pulled_commit: "abc123".into(),
        })
    }
}

pub struct FakeAnalyzer {
    info: DetectedInfo,
    pub calls: AtomicUsize,
}

impl FakeAnalyzer {
    pub fn new(info: DetectedInfo) -> Self {
        Self {
            info,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn detect(&self, path: &Path) -> Result<DetectedInfo, AnalyzeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !path.is_dir() {
            return Err(AnalyzeError::Io {
                path: path.display().to_string(),
                reason: "not a directory".into(),
            });
        }
        Ok(self.info.clone())
    }
}

pub struct FakeBuilder {
    pub kind: BuilderKind,
    fail: Option<BuildError>,
    pub builds: AtomicUsize,
}

impl FakeBuilder {
    pub fn new(kind: BuilderKind) -> Self {
        Self {
            kind,
            fail: None,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, err: BuildError) -> Self {
        self.fail = Some(err);
        self
    }
}

#[async_trait]
impl Builder for FakeBuilder {
    fn kind(&self) -> BuilderKind {
        self.kind
    }

    async fn plan(&self, config: &BuildConfig, _path: &Path) -> Result<Plan, BuildError> {
        serde_json::to_string(config)
            .map(Plan::new)
            .map_err(|e| BuildError::InvalidConfig(e.to_string()))
    }

    async fn build(
        &self,
        _user_id: &str,
        _repo: &str,
        _path: &Path,
        _plan: &Plan,
    ) -> Result<BuiltImage, BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        Ok(BuiltImage {
            image_id: "sha256:feed".into(),
            output: "built".into(),
        })
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    fail: Option<RegistryError>,
    pushed: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn failing(err: RegistryError) -> Self {
        Self {
            fail: Some(err),
            pushed: Mutex::default(),
        }
    }

    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn tag_image(
        &self,
        _image_id: &str,
        user: &str,
        app: &str,
    ) -> Result<String, RegistryError> {
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        Ok(format!("registry.local/{user}/{app}"))
    }

    async fn push_image(&self, reference: &str) -> Result<(), RegistryError> {
        self.pushed.lock().unwrap().push(reference.to_string());
        Ok(())
    }
}

/// Capability map with no connectors, builders or registry.
pub fn providers(store: Arc<dyn ApplicationStateStore>, analyzer: Arc<dyn Analyzer>) -> Providers {
    Providers {
        connectors: HashMap::new(),
        builders: HashMap::new(),
        analyzer,
        registry: None,
        store,
    }
}

/// One scripted step of a fake broker session.
pub enum Step {
    Deliver(Vec<u8>),
    Fail(BrokerError),
    /// Consumer stream ends.
    End,
    Panic,
}

/// Broker whose sessions follow scripts; once a script runs out the session idles.
#[derive(Default)]
pub struct FakeBroker {
    scripts: Mutex<VecDeque<Result<Vec<Step>, BrokerError>>>,
    pub connects: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub acks: AckLog,
    pub sink: Arc<MemorySink>,
}

impl FakeBroker {
    pub fn script(self, session: Result<Vec<Step>, BrokerError>) -> Self {
        self.scripts.lock().unwrap().push_back(session);
        self
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn connect(&self) -> Result<Box<dyn Session>, BrokerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        let steps = match script {
            Some(Err(e)) => return Err(e),
            Some(Ok(steps)) => steps,
            None => Vec::new(),
        };
        Ok(Box::new(FakeSession {
            steps: steps.into(),
            acks: self.acks.clone(),
            sink: self.sink.clone(),
            closes: self.closes.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeSession {
    steps: VecDeque<Step>,
    acks: AckLog,
    sink: Arc<MemorySink>,
    closes: Arc<AtomicUsize>,
    closed: AtomicBool,
}

#[async_trait]
impl Session for FakeSession {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, BrokerError> {
        match self.steps.pop_front() {
            Some(Step::Deliver(body)) => Ok(Some(Delivery::new(body, MemoryAcker(self.acks.clone())))),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::End) => Ok(None),
            Some(Step::Panic) => panic!("session exploded"),
            None => futures::future::pending().await,
        }
    }

    fn sink(&self) -> Arc<dyn ResponseSink> {
        self.sink.clone()
    }

    async fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
